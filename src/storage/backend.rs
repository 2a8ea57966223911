use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{BlocknotesError, Result};

const BLOCKNOTES_DIR: &str = ".blocknotes";
const NOTES_DB: &str = "notes.db";

/// Key the whole note collection is stored under.
pub const STORAGE_KEY: &str = "blocknotes_db";

/// Persistence for the serialized note collection.
///
/// Implementations hold one opaque blob; the store decides its format.
pub trait BlobStore: Send {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, blob: &str) -> Result<()>;
}

/// Blob kept in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blob: Mutex<Option<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, blob: &str) -> Result<()> {
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob.to_string());
        Ok(())
    }
}

/// Blob kept in a key/value table inside `.blocknotes/notes.db`.
pub struct SqliteBlobStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBlobStore {
    /// Initialize a new blocknotes project under `root`.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(BLOCKNOTES_DIR);

        if dir.exists() {
            return Err(BlocknotesError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        Self::open_at(dir.join(NOTES_DB))
    }

    /// Open an existing blocknotes project under `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(BLOCKNOTES_DIR).join(NOTES_DB);

        if !path.exists() {
            return Err(BlocknotesError::NotInitialized);
        }

        Self::open_at(path)
    }

    fn open_at(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for SqliteBlobStore {
    fn load(&self) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                [STORAGE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, blob: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![STORAGE_KEY, blob],
        )?;
        Ok(())
    }
}

/// Walk up from `start` looking for a `.blocknotes/` directory.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start;
    loop {
        if current.join(BLOCKNOTES_DIR).exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start.to_path_buf(),
        }
    }
}
