mod backend;
mod note_store;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use backend::{find_project_root, BlobStore, MemoryBlobStore, SqliteBlobStore, STORAGE_KEY};
pub use note_store::{NewNote, NoteStore, NoteUpdate, Resolution};

/// The store as shared between user-driven operations and the poller.
pub type SharedStore = Arc<Mutex<NoteStore>>;

pub fn shared(store: NoteStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}
