//! Storage layer for kgraph.
//!
//! [`GraphStore`] is the seam between ingestion, which stages and commits
//! batches, and queries, which read immutable snapshots. The in-memory backend
//! is always available; the durable backend lives behind the `persistent`
//! feature.

mod memory;
mod snapshot;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryGraphStore;
pub use traits::{CommitBatch, GraphStore, StorageError};

pub(crate) use traits::check_base_version;
