//! Shared primitives for the swap-settlement marketplace runtime:
//! canonical JSON hashing and signing (C1), the shared error taxonomy,
//! environment-driven configuration, structured logging, actor identity,
//! and the signed export framework (C12) reused across domains.

pub mod actor;
pub mod canonical;
pub mod config;
pub mod error;
pub mod export;
pub mod signing;
pub mod telemetry;

pub use actor::{ActorRef, ActorType};
pub use error::{AppError, AppResult, ErrorCode};
