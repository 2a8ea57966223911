mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_add, handle_archive, handle_color, handle_delete, handle_get, handle_init, handle_list,
    handle_restore, handle_sync, handle_trash, handle_unarchive, handle_update,
};
