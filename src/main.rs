use clap::Parser;
use blocknotes::cli::{
    handle_add, handle_archive, handle_color, handle_delete, handle_get, handle_init, handle_list,
    handle_restore, handle_sync, handle_trash, handle_unarchive, handle_update, Cli, Commands,
};

#[tokio::main]
async fn main() {
    blocknotes::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Add {
            title,
            content,
            stdin,
            color,
            address,
            attachments,
            json,
        } => handle_add(title, content, stdin, color, address, attachments, json).await,
        Commands::List {
            view,
            address,
            pending,
            json,
        } => handle_list(view, address, pending, json).await,
        Commands::Get { id, json } => handle_get(id, json).await,
        Commands::Update {
            id,
            title,
            content,
            stdin,
            color,
            attachments,
            json,
        } => handle_update(id, title, content, stdin, color, attachments, json).await,
        Commands::Archive { id } => handle_archive(id).await,
        Commands::Unarchive { id } => handle_unarchive(id).await,
        Commands::Trash { id } => handle_trash(id).await,
        Commands::Restore { id } => handle_restore(id).await,
        Commands::Color { id, color } => handle_color(id, color).await,
        Commands::Delete {
            id,
            hard,
            force,
            cancel,
        } => handle_delete(id, hard, force, cancel).await,
        Commands::Sync { watch, json } => handle_sync(watch, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
