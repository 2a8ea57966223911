//! The notes engine: local store, chain submission and confirmation polling
//! wired together.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::{ChainIndexer, ChainSubmitter, SubmitRequest};
use crate::config::Config;
use crate::entity::{Note, TxAction, View};
use crate::error::Result;
use crate::poller::{ConfirmationPoller, PollerConfig, PollerHandle};
use crate::storage::{shared, NewNote, NoteStore, NoteUpdate, SharedStore, SqliteBlobStore};
use crate::wallet::{self, Wallet, WalletProvider};

/// Entry point for note operations.
///
/// Mutations that change what a note says (create, update, delete, restore)
/// are anchored on chain; organizational changes stay local. The store lock
/// is never held across a submission.
pub struct Blocknotes {
    store: SharedStore,
    submitter: ChainSubmitter,
    config: Config,
}

impl Blocknotes {
    pub fn new(store: NoteStore, submitter: ChainSubmitter, config: Config) -> Self {
        Self {
            store: shared(store),
            submitter,
            config,
        }
    }

    /// Create `.blocknotes/` under `root` and open it.
    pub fn init(root: &Path, config: Config) -> Result<Self> {
        let backend = SqliteBlobStore::init(root)?;
        let submitter = ChainSubmitter::new(&config);
        Ok(Self::new(NoteStore::new(Box::new(backend)), submitter, config))
    }

    /// Open the existing project at `root`.
    pub fn open(root: &Path, config: Config) -> Result<Self> {
        let backend = SqliteBlobStore::open(root)?;
        let submitter = ChainSubmitter::new(&config);
        Ok(Self::new(NoteStore::new(Box::new(backend)), submitter, config))
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn submitter_mut(&mut self) -> &mut ChainSubmitter {
        &mut self.submitter
    }

    /// Connect `name` through `provider` and use it for future submissions.
    pub async fn connect_wallet(
        &mut self,
        provider: &dyn WalletProvider,
        name: &str,
    ) -> Result<Wallet> {
        let wallet = wallet::connect(provider, name, self.config.network).await?;
        info!("Connected {} wallet", wallet.name());
        self.submitter.set_wallet(Some(wallet.clone()));
        Ok(wallet)
    }

    pub fn disconnect_wallet(&mut self) {
        self.submitter.set_wallet(None);
    }

    pub async fn create_note(&self, mut new: NewNote) -> Result<Note> {
        if new.address.is_empty() {
            if let Some(wallet) = self.submitter.wallet() {
                new.address = wallet.address().await?;
            }
        }

        let note = self.store.lock().await.create(new)?;
        self.anchor(&note, TxAction::Create).await
    }

    /// Apply `update` and anchor the new content. An empty update is a no-op.
    pub async fn update_note(&self, id: &str, update: NoteUpdate) -> Result<Note> {
        let note = {
            let store = self.store.lock().await;
            let id = store.find(id)?.id;
            if update.is_empty() {
                return store.find(&id);
            }
            store.update(&id, update)?
        };
        self.anchor(&note, TxAction::Update).await
    }

    /// Submit a delete for the note and mark it for removal once the
    /// transaction confirms. In strict mode a failed submission leaves the
    /// note untouched.
    pub async fn delete_note(&self, id: &str) -> Result<Note> {
        let note = self.store.lock().await.find(id)?;
        let hash = self.submit(&note, TxAction::Delete).await?;

        let store = self.store.lock().await;
        store.attach_transaction(&note.id, &hash, TxAction::Delete)?;
        let note = store.mark_pending_delete(&note.id)?;
        info!("Note {} marked for deletion, waiting on {}", note.id, hash);
        Ok(note)
    }

    /// Bring a note back from the trash and anchor the restore.
    pub async fn restore_note(&self, id: &str) -> Result<Note> {
        let note = {
            let store = self.store.lock().await;
            let id = store.find(id)?.id;
            store.restore(&id)?
        };
        self.anchor(&note, TxAction::Restore).await
    }

    /// Step a note out of deferred deletion, typically after its delete
    /// transaction failed.
    pub async fn cancel_pending_delete(&self, id: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let id = store.find(id)?.id;
        store.clear_pending_delete(&id)
    }

    pub async fn archive_note(&self, id: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let id = store.find(id)?.id;
        store.archive(&id)
    }

    pub async fn unarchive_note(&self, id: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let id = store.find(id)?.id;
        store.unarchive(&id)
    }

    pub async fn trash_note(&self, id: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let id = store.find(id)?.id;
        store.trash(&id)
    }

    pub async fn change_color(&self, id: &str, color: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let id = store.find(id)?.id;
        store.change_color(&id, color)
    }

    /// Remove a note immediately without a chain transaction.
    pub async fn hard_delete(&self, id: &str) -> Result<Note> {
        let store = self.store.lock().await;
        let note = store.find(id)?;
        store.hard_delete(&note.id)?;
        Ok(note)
    }

    pub async fn get_note(&self, id: &str) -> Result<Note> {
        self.store.lock().await.find(id)
    }

    pub async fn list_notes(&self, view: View) -> Result<Vec<Note>> {
        self.store.lock().await.list_view(view)
    }

    pub async fn list_pending(&self) -> Result<Vec<Note>> {
        self.store.lock().await.list_pending()
    }

    pub async fn list_by_address(&self, address: &str) -> Result<Vec<Note>> {
        self.store.lock().await.list_by_address(address)
    }

    /// Build a poller over this engine's store.
    pub fn poller(&self, indexer: Arc<dyn ChainIndexer>, config: PollerConfig) -> ConfirmationPoller {
        ConfirmationPoller::new(self.store.clone(), indexer).with_config(config)
    }

    pub fn spawn_poller(
        &self,
        indexer: Arc<dyn ChainIndexer>,
        config: PollerConfig,
        cancel: CancellationToken,
    ) -> PollerHandle {
        self.poller(indexer, config).spawn(cancel)
    }

    async fn submit(&self, note: &Note, action: TxAction) -> Result<String> {
        let request = SubmitRequest {
            action,
            note_id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            receiver: self.config.receiver_address.clone(),
            min_payment: self.config.min_payment,
        };
        Ok(self.submitter.submit(&request).await?)
    }

    /// Submit `action` for `note` and record the resulting hash.
    async fn anchor(&self, note: &Note, action: TxAction) -> Result<Note> {
        let hash = match self.submit(note, action).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Note {} saved locally but not anchored: {}", note.id, e);
                return Err(e);
            }
        };

        debug!("Attaching {} to note {}", hash, note.id);
        self.store
            .lock()
            .await
            .attach_transaction(&note.id, &hash, action)
    }
}
