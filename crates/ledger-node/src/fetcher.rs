use std::time::Duration;

use ledger_core::{ChainFetcher, ChainResponse, FetchError};

use crate::constants::CHAIN_PATH;

/// Fetches a peer's chain with `GET http://{peer}/chain`.
#[derive(Clone, Debug)]
pub struct HttpChainFetcher {
    client: reqwest::Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        let url = format!("http://{peer}{CHAIN_PATH}");
        let res = self.client.get(&url).send().await.map_err(classify)?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = res.bytes().await.map_err(classify)?;
        ChainResponse::from_json(&body)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}
