mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_add, handle_delete, handle_export, handle_get, handle_import, handle_init,
    handle_latest, handle_list, handle_qr, handle_scan, handle_set_state, handle_stats,
};
