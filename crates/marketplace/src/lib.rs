//! The marketplace runtime: swap intents, cycle matching, commit,
//! settlement, and the vault lifecycle (C5-C10), composed over the
//! generic persistence (`swapgraph-store`), delegation/policy
//! (`swapgraph-policy`), and ledger (`swapgraph-ledger`) crates.

pub mod auth;
pub mod commit;
pub mod entities;
pub mod error;
pub mod intents;
pub mod matcher;
pub mod reservations;
pub mod settlement;
pub mod state;
pub mod vault;

pub use error::MarketplaceError;
pub use state::MarketplaceState;
