use std::collections::BTreeSet;
use tracing::{debug, info};
use url::Url;

use crate::block::{genesis_block, Block, Transaction};
use crate::error::{LedgerError, Result};

/// The local copy of the chain plus the pool of transactions waiting for the
/// next block and the set of known peers.
///
/// `Ledger` does no locking itself; [`crate::node::Node`] owns it behind a
/// lock so every mutation is exclusive.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    peers: BTreeSet<String>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_genesis(genesis_block())
    }

    pub fn with_genesis(genesis: Block) -> Self {
        Self {
            chain: vec![genesis],
            pending: Vec::new(),
            peers: BTreeSet::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn last_block(&self) -> Result<&Block> {
        self.chain
            .last()
            .ok_or_else(|| LedgerError::InvariantViolation("chain is empty".into()))
    }

    /// Queue a transaction. Returns the index of the block that will hold it.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
    ) -> u64 {
        self.pending.push(Transaction::new(sender, recipient, amount));
        self.chain.len() as u64 + 1
    }

    /// Seal the pending pool into a new block and append it.
    ///
    /// Without `previous_hash` the digest of the current head is used.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block> {
        let head = self.last_block()?;
        let index = self.chain.len() as u64 + 1;
        if head.index + 1 != index {
            return Err(LedgerError::InvariantViolation(format!(
                "head index {} does not precede new index {index}",
                head.index
            )));
        }
        let previous_hash = match previous_hash {
            Some(h) => h,
            None => head.digest(),
        };

        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(index, transactions, proof, previous_hash);
        self.chain.push(block.clone());
        debug!(index, txs = block.transactions.len(), "block appended");
        Ok(block)
    }

    /// Remember a peer by the `host:port` authority of `address`.
    pub fn register_node(&mut self, address: &str) -> Result<()> {
        let authority = parse_authority(address)?;
        if self.peers.insert(authority.clone()) {
            info!(peer = %authority, "registered peer");
        }
        Ok(())
    }

    /// Swap in a whole new chain. The caller has already validated it.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<()> {
        if chain.is_empty() {
            return Err(LedgerError::InvariantViolation(
                "refusing to install an empty chain".into(),
            ));
        }
        self.chain = chain;
        Ok(())
    }
}

/// Extract `host[:port]` from a URL such as `http://192.168.0.5:5000`.
/// A bare `host:port` is read as an `http` URL.
pub fn parse_authority(address: &str) -> Result<String> {
    let invalid = |reason: &str| LedgerError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty address"));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => return Err(invalid("no host")),
    };
    // `port()` hides a port equal to the scheme default; keep it explicit.
    Ok(match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
