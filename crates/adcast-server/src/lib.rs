pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
