mod server;

pub mod routes;
pub mod state;
pub mod utils;
pub mod ws;

// Public API for starting the webserver
pub use server::{build_app, serve, start_server};
pub use state::AppState;
