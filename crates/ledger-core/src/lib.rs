//! In-memory proof-of-work ledger with longest-valid-chain consensus.

pub mod block;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod node;
pub mod pow;
pub mod validate;

pub use block::{genesis_block, Block, Transaction};
pub use consensus::{ChainFetcher, ChainResponse, Resolver, ResolverConfig};
pub use error::{FetchError, LedgerError, Result};
pub use ledger::Ledger;
pub use node::{generate_node_id, Node};
