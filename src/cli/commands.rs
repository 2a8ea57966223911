use clap::{Parser, Subcommand};

use crate::entity::DEFAULT_COLOR;

#[derive(Parser, Debug)]
#[command(name = "blocknotes")]
#[command(version, about = "Local-first notes anchored on Cardano")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a blocknotes project in the current directory
    Init,

    /// Add a new note and anchor it on chain
    Add {
        /// Note title
        title: String,

        /// Note content
        #[arg(short, long)]
        content: Option<String>,

        /// Read content from stdin
        #[arg(long, conflicts_with = "content")]
        stdin: bool,

        /// Card color
        #[arg(long, default_value = DEFAULT_COLOR)]
        color: String,

        /// Owner address (defaults to empty when no wallet is connected)
        #[arg(long)]
        address: Option<String>,

        /// Attachment reference (repeatable)
        #[arg(long = "attach", value_name = "REF")]
        attachments: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes
    List {
        /// Which view to list (all, archived, trashed)
        #[arg(long, default_value = "all")]
        view: String,

        /// Only notes owned by this address
        #[arg(long)]
        address: Option<String>,

        /// Only notes awaiting confirmation
        #[arg(long, conflicts_with_all = ["view", "address"])]
        pending: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a note and its transaction history
    Get {
        /// Note id or unique id prefix
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a note and anchor the new content
    Update {
        /// Note id or unique id prefix
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New content
        #[arg(short, long)]
        content: Option<String>,

        /// Read new content from stdin
        #[arg(long, conflicts_with = "content")]
        stdin: bool,

        /// New color
        #[arg(long)]
        color: Option<String>,

        /// Replace attachments (repeatable)
        #[arg(long = "attach", value_name = "REF")]
        attachments: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a note to the archive
    Archive {
        id: String,
    },

    /// Move an archived note back to the main view
    Unarchive {
        id: String,
    },

    /// Move a note to the trash
    Trash {
        id: String,
    },

    /// Restore a note from the trash
    Restore {
        id: String,
    },

    /// Change a note's color
    Color {
        id: String,
        color: String,
    },

    /// Delete a note
    ///
    /// By default a delete transaction is submitted and the note is removed
    /// once it confirms. --hard removes it right away without a transaction.
    Delete {
        /// Note id or unique id prefix
        id: String,

        /// Remove locally without submitting a transaction
        #[arg(long)]
        hard: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Clear a pending deletion instead of deleting
        #[arg(long, conflicts_with_all = ["hard", "force"])]
        cancel: bool,
    },

    /// Check pending transactions against the chain
    Sync {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,

        /// Output the pass report as JSON
        #[arg(long, conflicts_with = "watch")]
        json: bool,
    },
}
