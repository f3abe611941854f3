//! Transparency Log (C13) and Liquidity & Reconciliation (C14), both
//! exported through the shared signed-export framework in `swapgraph-core`.

pub mod adapter;
pub mod error;
pub mod liquidity;
pub mod merkle;
pub mod transparency;

pub use adapter::LiquidityAdapterClient;
pub use error::LedgerError;
pub use liquidity::{
    take_snapshot, verify_inclusion, HoldingStatus, InventorySnapshot, LiquidityRegistry,
    Persona, Provider, ProviderStatus, ReserveOutcome, ReserveRequest,
};
pub use merkle::{build_inclusion_proof, merkle_root, verify_inclusion_proof, InclusionProof};
pub use transparency::{PublicationBatch, TransparencyLog};
