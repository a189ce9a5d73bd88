use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::block::{Block, Transaction};
use crate::consensus::{ChainFetcher, Resolver, ResolverConfig};
use crate::constants::{MINING_REWARD, REWARD_SENDER};
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::pow;

/// Random 32-char hex identifier credited with this node's mining rewards.
pub fn generate_node_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A ledger shared between request handlers, the miner and consensus.
///
/// Chain and pool sit behind one lock. Proof search runs outside it; the
/// `epoch` counter is bumped whenever consensus swaps the chain, which
/// aborts any search started against the old head.
pub struct Node<F> {
    ledger: RwLock<Ledger>,
    resolver: Resolver<F>,
    node_id: String,
    epoch: Arc<AtomicU64>,
}

impl<F: ChainFetcher> Node<F> {
    pub fn new(node_id: impl Into<String>, fetcher: F, config: ResolverConfig) -> Self {
        Self::with_ledger(Ledger::new(), node_id, fetcher, config)
    }

    pub fn with_ledger(
        ledger: Ledger,
        node_id: impl Into<String>,
        fetcher: F,
        config: ResolverConfig,
    ) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            resolver: Resolver::new(fetcher, config),
            node_id: node_id.into(),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Find a proof for the current head, credit the reward and seal the
    /// pending pool into a new block.
    ///
    /// If the head moves while searching (another block mined, or the chain
    /// replaced) the proof is stale and the search restarts on the new head.
    pub async fn mine(&self) -> Result<Block> {
        loop {
            let (last_proof, last_hash, epoch) = {
                let ledger = self.ledger.read().await;
                let head = ledger.last_block()?;
                (head.proof, head.digest(), self.epoch.load(Ordering::Acquire))
            };

            let counter = Arc::clone(&self.epoch);
            let found = tokio::task::spawn_blocking(move || {
                pow::mine_parallel_until(last_proof, || counter.load(Ordering::Acquire) != epoch)
            })
            .await
            .map_err(|e| LedgerError::Mining(e.to_string()))?;

            let Some(proof) = found else {
                debug!("chain replaced during proof search, restarting");
                continue;
            };

            let mut ledger = self.ledger.write().await;
            if ledger.last_block()?.digest() != last_hash {
                debug!(proof, "head moved during proof search, discarding proof");
                continue;
            }
            ledger.new_transaction(REWARD_SENDER, self.node_id.clone(), MINING_REWARD);
            let block = ledger.new_block(proof, Some(last_hash))?;
            info!(
                index = block.index,
                proof = block.proof,
                txs = block.transactions.len(),
                "mined block"
            );
            return Ok(block);
        }
    }

    /// Queue a transaction; returns the index of the block that will hold it.
    pub async fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
    ) -> u64 {
        self.ledger
            .write()
            .await
            .new_transaction(sender, recipient, amount)
    }

    /// Consistent snapshot of the chain and its length.
    pub async fn current_chain(&self) -> (Vec<Block>, usize) {
        let ledger = self.ledger.read().await;
        (ledger.chain().to_vec(), ledger.len())
    }

    pub async fn pending(&self) -> Vec<Transaction> {
        self.ledger.read().await.pending().to_vec()
    }

    pub async fn register_peer(&self, address: &str) -> Result<()> {
        self.ledger.write().await.register_node(address)
    }

    pub async fn peers(&self) -> Vec<String> {
        self.ledger.read().await.peers().iter().cloned().collect()
    }

    /// Adopt the longest valid chain among the peers if it beats ours.
    /// Returns whether the chain was replaced, and the chain now held.
    pub async fn resolve(&self) -> Result<(bool, Vec<Block>)> {
        let (local_len, peers) = {
            let ledger = self.ledger.read().await;
            (ledger.len(), ledger.peers().iter().cloned().collect::<Vec<_>>())
        };

        let best = self.resolver.best_chain(local_len, &peers).await;

        let mut ledger = self.ledger.write().await;
        let replaced = match best {
            // Our own chain may have grown while the peers were queried.
            Some(chain) if chain.len() > ledger.len() => {
                ledger.replace_chain(chain)?;
                self.epoch.fetch_add(1, Ordering::AcqRel);
                info!(length = ledger.len(), "local chain replaced");
                true
            }
            _ => false,
        };
        Ok((replaced, ledger.chain().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ChainResponse;
    use crate::error::FetchError;
    use crate::validate::is_valid_chain;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapFetcher {
        bodies: HashMap<String, Vec<u8>>,
    }

    impl ChainFetcher for MapFetcher {
        async fn fetch_chain(&self, peer: &str) -> std::result::Result<ChainResponse, FetchError> {
            match self.bodies.get(peer) {
                Some(body) => ChainResponse::from_json(body),
                None => Err(FetchError::Network(format!("{peer} unreachable"))),
            }
        }
    }

    fn test_node(fetcher: MapFetcher) -> Node<MapFetcher> {
        Node::new("miner-1", fetcher, ResolverConfig::default())
    }

    #[test]
    fn generated_ids_are_hex_and_distinct() {
        let a = generate_node_id();
        let b = generate_node_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn submit_then_mine() {
        let node = test_node(MapFetcher::default());
        assert_eq!(node.submit_transaction("0", "Alice", 1).await, 2);

        let block = node.mine().await.unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(
            block.transactions,
            vec![
                Transaction::new("0", "Alice", 1),
                Transaction::new("0", "miner-1", 1),
            ]
        );

        let (chain, len) = node.current_chain().await;
        assert_eq!(len, 2);
        assert!(is_valid_chain(&chain));
        assert!(node.pending().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mining_never_forks_the_chain() {
        let node = Arc::new(test_node(MapFetcher::default()));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let node = Arc::clone(&node);
                tokio::spawn(async move { node.mine().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let (chain, len) = node.current_chain().await;
        assert_eq!(len, 4);
        assert!(is_valid_chain(&chain));
        let indexes: Vec<u64> = chain.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
        for block in &chain[1..] {
            assert_eq!(block.transactions.len(), 1);
        }
    }

    #[tokio::test]
    async fn register_peer_reports_invalid_address() {
        let node = test_node(MapFetcher::default());
        node.register_peer("http://127.0.0.1:5001").await.unwrap();
        let err = node.register_peer("http://").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress { .. }));
        assert_eq!(node.peers().await, vec!["127.0.0.1:5001".to_string()]);
    }

    #[tokio::test]
    async fn resolve_without_peers_keeps_chain() {
        let node = test_node(MapFetcher::default());
        node.mine().await.unwrap();
        let (before, _) = node.current_chain().await;
        let (replaced, after) = node.resolve().await.unwrap();
        assert!(!replaced);
        assert_eq!(before, after);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn replacement_during_mining_yields_valid_chain() {
        let mut peer = Ledger::new();
        for _ in 0..4 {
            let proof = pow::mine(peer.last_block().unwrap().proof);
            peer.new_block(proof, None).unwrap();
        }
        let peer_chain = peer.chain().to_vec();

        let mut fetcher = MapFetcher::default();
        fetcher.bodies.insert(
            "peer:1".into(),
            serde_json::to_vec(&ChainResponse::from_chain(peer_chain.clone())).unwrap(),
        );
        let node = Arc::new(test_node(fetcher));
        node.register_peer("peer:1").await.unwrap();

        let miner = {
            let node = Arc::clone(&node);
            tokio::spawn(async move { node.mine().await })
        };
        let (replaced, _) = node.resolve().await.unwrap();
        let mined = miner.await.unwrap().unwrap();

        let (chain, len) = node.current_chain().await;
        assert!(replaced);
        assert!(is_valid_chain(&chain));
        assert_eq!(&chain[..5], &peer_chain[..]);
        match len {
            // Mining finished first; its block lost to the longer chain.
            5 => {}
            6 => assert_eq!(chain[5], mined),
            other => panic!("unexpected length {other}"),
        }
    }
}
