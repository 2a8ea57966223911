use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::BlobStore;
use crate::clock::{Clock, SystemClock};
use crate::entity::{Note, Transaction, TxAction, TxStatus, View};
use crate::error::{BlocknotesError, Result};

/// Fields supplied when a note is created.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub address: String,
    pub title: String,
    pub content: String,
    pub color: String,
    pub attachments: Vec<String>,
}

/// Update payload for a note. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub attachments: Option<Vec<String>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.color.is_none()
            && self.attachments.is_none()
    }
}

/// What `resolve_transaction` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The note's delete transaction confirmed; the note is gone.
    Removed,
    /// Status of the matching transaction (and the note) changed.
    Updated,
    /// Unknown note or hash.
    Ignored,
}

/// Authoritative local record of notes and their transaction histories.
///
/// Every operation reads the whole collection from the backend, applies one
/// change and writes it back, so callers that share the store behind a
/// mutex see each operation as atomic.
pub struct NoteStore {
    backend: Box<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl NoteStore {
    pub fn new(backend: Box<dyn BlobStore>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Box<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Load every note. An unreadable blob is treated as an empty store.
    fn load(&self) -> Result<Vec<Note>> {
        let Some(blob) = self.backend.load()? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Note>>(&blob) {
            Ok(notes) => Ok(notes),
            Err(e) => {
                warn!("Stored notes are unreadable, starting from an empty store: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, notes: &[Note]) -> Result<()> {
        let blob = serde_json::to_string(notes)?;
        self.backend.save(&blob)
    }

    /// Apply `f` to the note with `id` and persist the result.
    fn modify<F>(&self, id: &str, f: F) -> Result<Note>
    where
        F: FnOnce(&mut Note),
    {
        let mut notes = self.load()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| BlocknotesError::NoteNotFound(id.to_string()))?;

        f(note);
        note.updated_at = self.clock.now();
        let updated = note.clone();

        self.save(&notes)?;
        Ok(updated)
    }

    /// Create a note at the head of the collection, pending and unanchored.
    pub fn create(&self, new: NewNote) -> Result<Note> {
        let mut note = Note::new(new.address, new.title, self.clock.now());
        note.content = new.content;
        note.color = new.color;
        note.attachments = new.attachments;

        let mut notes = self.load()?;
        notes.insert(0, note.clone());
        self.save(&notes)?;

        debug!("Created note {}", note.id);
        Ok(note)
    }

    /// Merge `update` into the note. The new content is no longer anchored,
    /// so the note drops its hash and goes back to pending.
    pub fn update(&self, id: &str, update: NoteUpdate) -> Result<Note> {
        self.modify(id, |note| {
            if let Some(title) = update.title {
                note.title = title;
            }
            if let Some(content) = update.content {
                note.content = content;
            }
            if let Some(color) = update.color {
                note.color = color;
            }
            if let Some(attachments) = update.attachments {
                note.attachments = attachments;
            }
            note.tx_hash = None;
            note.pending_delete = false;
            note.refresh_status();
        })
    }

    /// Record a freshly submitted transaction as the note's latest.
    pub fn attach_transaction(&self, id: &str, hash: &str, action: TxAction) -> Result<Note> {
        let now = self.clock.now();
        self.modify(id, |note| {
            note.transactions
                .insert(0, Transaction::new(hash.to_string(), action, now));
            note.tx_hash = Some(hash.to_string());
            note.refresh_status();
        })
    }

    /// Fold a confirmation outcome for `hash` back into the note.
    ///
    /// A confirmed delete transaction on a note awaiting deletion removes the
    /// note.
    pub fn resolve_transaction(&self, id: &str, hash: &str, status: TxStatus) -> Result<Resolution> {
        let mut notes = self.load()?;
        let Some(pos) = notes.iter().position(|n| n.id == id) else {
            return Ok(Resolution::Ignored);
        };

        let note = &mut notes[pos];
        let is_head = note.tx_hash.as_deref() == Some(hash);
        let in_history = note.transactions.iter().any(|tx| tx.hash == hash);
        if !is_head && !in_history {
            return Ok(Resolution::Ignored);
        }

        let deletes = note
            .transactions
            .iter()
            .find(|tx| tx.hash == hash)
            .is_some_and(|tx| tx.action == TxAction::Delete);
        if note.pending_delete && is_head && deletes && status == TxStatus::Confirmed {
            notes.remove(pos);
            self.save(&notes)?;
            debug!("Delete of note {} confirmed by {}, removed", id, hash);
            return Ok(Resolution::Removed);
        }

        for tx in note.transactions.iter_mut().filter(|tx| tx.hash == hash) {
            tx.status = status;
        }
        if is_head {
            note.status = status;
        }
        note.refresh_status();
        note.updated_at = self.clock.now();

        self.save(&notes)?;
        Ok(Resolution::Updated)
    }

    pub fn archive(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| note.archived = true)
    }

    pub fn unarchive(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| note.archived = false)
    }

    pub fn trash(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| note.trashed = true)
    }

    /// Bring a note back from the trash into the main view. Any deletion in
    /// flight is abandoned.
    pub fn restore(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| {
            note.trashed = false;
            note.archived = false;
            note.pending_delete = false;
        })
    }

    pub fn change_color(&self, id: &str, color: &str) -> Result<Note> {
        self.modify(id, |note| note.color = color.to_string())
    }

    pub fn mark_pending_delete(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| note.pending_delete = true)
    }

    /// Step a note back out of deferred deletion, e.g. after its delete
    /// transaction failed.
    pub fn clear_pending_delete(&self, id: &str) -> Result<Note> {
        self.modify(id, |note| note.pending_delete = false)
    }

    /// Remove a note immediately, without touching the chain.
    pub fn hard_delete(&self, id: &str) -> Result<()> {
        let mut notes = self.load()?;
        let before = notes.len();
        notes.retain(|n| n.id != id);
        if notes.len() == before {
            return Err(BlocknotesError::NoteNotFound(id.to_string()));
        }
        self.save(&notes)
    }

    pub fn get(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.load()?.into_iter().find(|n| n.id == id))
    }

    /// Find a note by full id or unique id prefix.
    pub fn find(&self, id_or_prefix: &str) -> Result<Note> {
        let notes = self.load()?;
        if let Some(note) = notes.iter().find(|n| n.id == id_or_prefix) {
            return Ok(note.clone());
        }

        let mut matches = notes.into_iter().filter(|n| n.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(note), None) if !id_or_prefix.is_empty() => Ok(note),
            (Some(_), Some(_)) => Err(BlocknotesError::Storage(format!(
                "Ambiguous note id prefix '{}'",
                id_or_prefix
            ))),
            _ => Err(BlocknotesError::NoteNotFound(id_or_prefix.to_string())),
        }
    }

    /// All notes, most recently created first.
    pub fn list_all(&self) -> Result<Vec<Note>> {
        self.load()
    }

    /// Notes whose latest transaction still awaits confirmation.
    pub fn list_pending(&self) -> Result<Vec<Note>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|n| n.status == TxStatus::Pending && n.tx_hash.is_some())
            .collect())
    }

    pub fn list_by_address(&self, address: &str) -> Result<Vec<Note>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|n| n.address == address)
            .collect())
    }

    pub fn list_view(&self, view: View) -> Result<Vec<Note>> {
        Ok(self.load()?.into_iter().filter(|n| view.matches(n)).collect())
    }
}
