//! Swapgraph marketplace HTTP API.
//!
//! Thin axum handlers over the `swapgraph-marketplace`/`swapgraph-policy`/
//! `swapgraph-ledger` domain crates: request parsing and tenancy/auth
//! extraction live here, every invariant and state transition lives in
//! the domain crates.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ApiError, Result};
pub use server::Server;
pub use state::AppState;
