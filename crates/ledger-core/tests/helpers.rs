use std::collections::HashMap;
use std::time::Duration;

use ledger_core::{pow, Block, ChainFetcher, ChainResponse, FetchError, Ledger};

/// What a scripted peer does when asked for its chain.
#[derive(Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Status(u16),
    Hang,
}

#[derive(Default)]
pub struct ScriptedFetcher {
    replies: HashMap<String, Reply>,
}

impl ScriptedFetcher {
    pub fn with(mut self, peer: &str, reply: Reply) -> Self {
        self.replies.insert(peer.to_string(), reply);
        self
    }

    pub fn with_chain(self, peer: &str, chain: &[Block]) -> Self {
        let body = serde_json::to_vec(&ChainResponse::from_chain(chain.to_vec()))
            .expect("serialize chain");
        self.with(peer, Reply::Body(body))
    }
}

impl ChainFetcher for ScriptedFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        match self.replies.get(peer).cloned() {
            Some(Reply::Body(body)) => ChainResponse::from_json(&body),
            Some(Reply::Status(code)) => Err(FetchError::Status(code)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Timeout)
            }
            None => Err(FetchError::Network(format!("connection refused: {peer}"))),
        }
    }
}

/// Mine `extra` blocks on top of `ledger`, one transaction each.
pub fn extend(ledger: &mut Ledger, extra: usize) {
    for i in 0..extra {
        ledger.new_transaction("alice", "bob", i as i64 + 1);
        let proof = pow::mine(ledger.last_block().expect("head").proof);
        ledger.new_block(proof, None).expect("append");
    }
}

/// A fresh chain of `len` blocks, genesis included.
pub fn chain_of(len: usize) -> Vec<Block> {
    let mut ledger = Ledger::new();
    extend(&mut ledger, len - 1);
    ledger.chain().to_vec()
}
