mod note;
mod transaction;

pub use note::Note;
pub use transaction::{Transaction, TxAction, TxStatus};

use serde::{Deserialize, Serialize};

/// Card color given to notes created without one.
pub const DEFAULT_COLOR: &str = "from-purple-500 to-pink-500";

/// Listing filters mirroring the note views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Neither archived nor trashed.
    #[default]
    All,
    /// Archived but not trashed.
    Archived,
    Trashed,
}

impl View {
    pub fn matches(&self, note: &Note) -> bool {
        match self {
            View::All => !note.archived && !note.trashed,
            View::Archived => note.archived && !note.trashed,
            View::Trashed => note.trashed,
        }
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(View::All),
            "archived" | "archive" => Ok(View::Archived),
            "trashed" | "trash" => Ok(View::Trashed),
            _ => Err(format!("Invalid view: {}", s)),
        }
    }
}
