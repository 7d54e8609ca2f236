//! Core process state shared by the server and `main`.

mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};
