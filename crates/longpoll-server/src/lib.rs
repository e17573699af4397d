pub mod config;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::{build_router, start, AppState, ServerHandle};
pub use shutdown::ShutdownCoordinator;
