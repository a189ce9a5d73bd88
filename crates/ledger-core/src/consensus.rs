//! Longest-valid-chain consensus.
//!
//! Every known peer is asked for its chain. Among the answers, the longest
//! chain that is strictly longer than ours and passes validation wins. All
//! peers are considered before a decision is made, and equal-length winners
//! are ordered by peer address, so the outcome does not depend on which peer
//! answers first.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::constants::{DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::error::FetchError;
use crate::validate::is_valid_chain;

/// Body of a node's `/chain` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn from_chain(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }

    /// Parse a peer's body. A `length` that disagrees with the number of
    /// blocks is treated as malformed.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        let resp: Self =
            serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        if resp.length != resp.chain.len() {
            return Err(FetchError::Malformed(format!(
                "length {} but {} blocks",
                resp.length,
                resp.chain.len()
            )));
        }
        Ok(resp)
    }
}

/// Source of peer chains. The node binary implements this over HTTP.
pub trait ChainFetcher: Send + Sync {
    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<ChainResponse, FetchError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Upper bound on a single peer fetch; a slower peer is skipped.
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

/// Chooses a replacement chain from the peers' answers.
#[derive(Debug)]
pub struct Resolver<F> {
    fetcher: F,
    config: ResolverConfig,
}

impl<F: ChainFetcher> Resolver<F> {
    pub fn new(fetcher: F, config: ResolverConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch every peer's chain concurrently. Failed, slow, or malformed
    /// peers are logged and left out.
    pub async fn fetch_all(&self, peers: &[String]) -> Vec<(String, ChainResponse)> {
        let limit = self.config.max_concurrent_fetches.max(1);
        let timeout = self.config.fetch_timeout;

        let results: Vec<(String, Result<ChainResponse, FetchError>)> = stream::iter(peers.iter().cloned())
            .map(|peer: String| async move {
                let res = match tokio::time::timeout(timeout, self.fetcher.fetch_chain(&peer)).await
                {
                    Ok(res) => res,
                    Err(_) => Err(FetchError::Timeout),
                };
                (peer, res)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(peer, res)| match res {
                Ok(resp) => Some((peer, resp)),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "skipping peer");
                    None
                }
            })
            .collect()
    }

    /// The longest valid peer chain strictly longer than `local_len`, if any.
    pub async fn best_chain(&self, local_len: usize, peers: &[String]) -> Option<Vec<Block>> {
        let candidates = self.fetch_all(peers).await;
        select_winner(local_len, candidates).map(|(peer, chain)| {
            info!(peer = %peer, length = chain.len(), "found longer valid chain");
            chain
        })
    }
}

/// Pick the longest valid candidate longer than `local_len`. Candidates are
/// visited in peer-address order so ties resolve the same way every time.
pub fn select_winner(
    local_len: usize,
    mut candidates: Vec<(String, ChainResponse)>,
) -> Option<(String, Vec<Block>)> {
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut max_length = local_len;
    let mut winner = None;
    for (peer, resp) in candidates {
        if resp.length <= max_length {
            continue;
        }
        if !is_valid_chain(&resp.chain) {
            debug!(peer = %peer, length = resp.length, "peer chain failed validation");
            continue;
        }
        max_length = resp.length;
        winner = Some((peer, resp.chain));
    }
    winner
}
