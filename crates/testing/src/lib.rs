//! Test utilities for the wallet ledger.
//!
//! In-memory collaborators with call counters, and small fixture builders
//! for addresses, hashes, transactions and ABIs.

mod fixtures;
mod mock;

pub use fixtures::*;
pub use mock::{MemoryAbiCache, MockChain, MockExplorer};
