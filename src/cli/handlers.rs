use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::Blocknotes;
use crate::chain::{is_placeholder, BlockfrostClient};
use crate::config::Config;
use crate::entity::{Note, View};
use crate::error::{BlocknotesError, Result};
use crate::poller::PollerConfig;
use crate::storage::{find_project_root, NewNote, NoteUpdate};

fn project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project_root(&cwd)
}

fn open_app() -> Result<Blocknotes> {
    let config = Config::from_env()?;
    Blocknotes::open(&project_root(), config)
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

fn print_note_line(note: &Note) {
    let mut flags = Vec::new();
    if note.archived {
        flags.push("archived");
    }
    if note.trashed {
        flags.push("trashed");
    }
    if note.pending_delete {
        flags.push("deleting");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    println!("  {} [{}] {}{}", note.short_id(), note.status, note.title, flags);
}

fn print_note(note: &Note) {
    println!("{} ({})", note.title, note.id);
    println!("Status: {}", note.status);
    if !note.address.is_empty() {
        println!("Owner: {}", note.address);
    }
    println!("Color: {}", note.color);
    if note.archived {
        println!("Archived: yes");
    }
    if note.trashed {
        println!("Trashed: yes");
    }
    if note.pending_delete {
        println!("Pending delete: yes");
    }
    if !note.attachments.is_empty() {
        println!("Attachments: {}", note.attachments.join(", "));
    }
    println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if !note.content.is_empty() {
        println!("\n{}", note.content);
    }

    if !note.transactions.is_empty() {
        println!("\nTransactions:");
        for tx in &note.transactions {
            let marker = if is_placeholder(&tx.hash) { " (local)" } else { "" };
            println!(
                "  {} {:<7} [{}] {}{}",
                tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                tx.action,
                tx.status,
                tx.hash,
                marker
            );
        }
    }
}

fn emit(note: &Note, json: bool, verb: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(note)?);
    } else {
        println!("{} note {} - {}", verb, note.short_id(), note.title);
    }
    Ok(())
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;
    let config = Config::from_env()?;
    Blocknotes::init(&root, config)?;

    println!("Initialized blocknotes project in {}", root.display());
    Ok(())
}

pub async fn handle_add(
    title: String,
    content: Option<String>,
    stdin: bool,
    color: String,
    address: Option<String>,
    attachments: Vec<String>,
    json: bool,
) -> Result<()> {
    let app = open_app()?;

    let content = if stdin {
        read_stdin()?
    } else {
        content.unwrap_or_default()
    };

    let note = app
        .create_note(NewNote {
            address: address.unwrap_or_default(),
            title,
            content,
            color,
            attachments,
        })
        .await?;

    emit(&note, json, "Created")
}

pub async fn handle_list(
    view: String,
    address: Option<String>,
    pending: bool,
    json: bool,
) -> Result<()> {
    let app = open_app()?;

    let view: View = view.parse().map_err(BlocknotesError::Config)?;
    let notes = if pending {
        app.list_pending().await?
    } else if let Some(address) = address {
        app.list_by_address(&address)
            .await?
            .into_iter()
            .filter(|n| view.matches(n))
            .collect()
    } else {
        app.list_notes(view).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No notes found.");
    } else {
        println!("Notes:\n");
        for note in &notes {
            print_note_line(note);
        }
    }

    Ok(())
}

pub async fn handle_get(id: String, json: bool) -> Result<()> {
    let app = open_app()?;
    let note = app.get_note(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        print_note(&note);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_update(
    id: String,
    title: Option<String>,
    content: Option<String>,
    stdin: bool,
    color: Option<String>,
    attachments: Vec<String>,
    json: bool,
) -> Result<()> {
    let app = open_app()?;

    let content = if stdin { Some(read_stdin()?) } else { content };
    let update = NoteUpdate {
        title,
        content,
        color,
        attachments: if attachments.is_empty() {
            None
        } else {
            Some(attachments)
        },
    };

    if update.is_empty() {
        eprintln!("Nothing to update.");
        return Ok(());
    }

    let note = app.update_note(&id, update).await?;
    emit(&note, json, "Updated")
}

pub async fn handle_archive(id: String) -> Result<()> {
    let note = open_app()?.archive_note(&id).await?;
    emit(&note, false, "Archived")
}

pub async fn handle_unarchive(id: String) -> Result<()> {
    let note = open_app()?.unarchive_note(&id).await?;
    emit(&note, false, "Unarchived")
}

pub async fn handle_trash(id: String) -> Result<()> {
    let note = open_app()?.trash_note(&id).await?;
    emit(&note, false, "Trashed")
}

pub async fn handle_restore(id: String) -> Result<()> {
    let note = open_app()?.restore_note(&id).await?;
    emit(&note, false, "Restored")
}

pub async fn handle_color(id: String, color: String) -> Result<()> {
    let note = open_app()?.change_color(&id, &color).await?;
    emit(&note, false, "Recolored")
}

pub async fn handle_delete(id: String, hard: bool, force: bool, cancel: bool) -> Result<()> {
    let app = open_app()?;

    if cancel {
        let note = app.cancel_pending_delete(&id).await?;
        return emit(&note, false, "Kept");
    }

    let note = app.get_note(&id).await?;

    // Confirm deletion unless --force is used
    if !force {
        eprintln!("Delete note {} - {}? [y/N] ", note.short_id(), note.title);

        if atty::is(atty::Stream::Stdin) {
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
        } else {
            return Err(BlocknotesError::Storage(
                "Use --force to delete in non-interactive mode".to_string(),
            ));
        }
    }

    if hard {
        let note = app.hard_delete(&note.id).await?;
        println!("Deleted note {} - {}", note.short_id(), note.title);
    } else {
        let note = app.delete_note(&note.id).await?;
        println!(
            "Deletion of note {} submitted, it will be removed once confirmed",
            note.short_id()
        );
    }

    Ok(())
}

pub async fn handle_sync(watch: bool, json: bool) -> Result<()> {
    let app = open_app()?;
    let indexer = Arc::new(BlockfrostClient::new(app.config())?);
    if !indexer.is_configured() {
        eprintln!("Warning: BLOCKFROST_PROJECT_ID is not set, on-chain transactions stay pending.");
    }

    if !watch {
        let report = app.poller(indexer, PollerConfig::default()).run_pass().await;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Checked {}, deferred {}: {} confirmed, {} failed, {} removed, {} errors",
                report.checked,
                report.deferred,
                report.confirmed,
                report.failed,
                report.removed,
                report.errors
            );
        }
        return Ok(());
    }

    let handle = app.spawn_poller(indexer, PollerConfig::default(), CancellationToken::new());
    println!("Watching pending transactions, press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping poller");
    handle.stop().await;
    Ok(())
}
