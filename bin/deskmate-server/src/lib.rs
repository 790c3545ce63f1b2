//! deskmate-server: HTTP surface over `deskmate-core`.
//!
//! The binary in `main.rs` wires configuration, tracing and the database;
//! everything reachable over HTTP lives here so integration tests can drive
//! the router directly.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod state;

pub use routes::build;
pub use state::AppState;
