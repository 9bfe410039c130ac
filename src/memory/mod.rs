//! The memory engine: lifecycle, recall, embeddings backfill, and health.

pub mod embeddings;
pub mod forget;
pub mod health;
pub mod query;
pub mod scope;
pub mod search;
pub mod stats;
pub mod store;
pub mod transfer;
pub mod types;

pub use scope::{resolve_scope, ScopeArgs, ScopeFilter, ScopeIntent};
pub use search::RecallContext;
pub use store::{AddOptions, AddOutcome, UpdateChanges};
pub use types::{Memory, MemoryType, Scope};
