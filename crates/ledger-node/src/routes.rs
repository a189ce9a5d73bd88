use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{ledger::parse_authority, Block, ChainResponse, LedgerError, Node, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::fetcher::HttpChainFetcher;

pub(crate) type SharedNode = Arc<Node<HttpChainFetcher>>;

pub(crate) fn router(node: SharedNode) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Mined {
    message: &'static str,
    index: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

#[derive(Deserialize)]
struct TxIn {
    sender: String,
    recipient: String,
    amount: i64,
}

#[derive(Deserialize)]
struct NodesIn {
    nodes: Option<Vec<String>>,
}

pub(crate) enum ApiError {
    BadRequest(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAddress { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Ledger(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Ledger(e) => {
                error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

async fn mine(State(node): State<SharedNode>) -> Result<Json<Mined>, ApiError> {
    let block: Block = node.mine().await?;
    Ok(Json(Mined {
        message: "New block forged",
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction(
    State(node): State<SharedNode>,
    payload: Result<Json<TxIn>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(tx) = payload.map_err(|e| ApiError::BadRequest(format!("Missing values: {e}")))?;
    let index = node
        .submit_transaction(tx.sender, tx.recipient, tx.amount)
        .await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Transaction will be added to Block {index}") })),
    ))
}

async fn full_chain(State(node): State<SharedNode>) -> Json<ChainResponse> {
    let (chain, length) = node.current_chain().await;
    Json(ChainResponse { chain, length })
}

async fn register_nodes(
    State(node): State<SharedNode>,
    payload: Result<Json<NodesIn>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let nodes = match body.nodes {
        Some(nodes) if !nodes.is_empty() => nodes,
        _ => {
            return Err(ApiError::BadRequest(
                "Error: please supply a valid list of nodes".into(),
            ))
        }
    };

    // Reject the whole request before touching the peer set.
    for address in &nodes {
        parse_authority(address)?;
    }
    for address in &nodes {
        node.register_peer(address).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New nodes have been added",
            "total_nodes": node.peers().await,
        })),
    ))
}

async fn consensus(State(node): State<SharedNode>) -> Result<Json<serde_json::Value>, ApiError> {
    let (replaced, chain) = node.resolve().await?;
    Ok(Json(if replaced {
        json!({ "message": "Our chain was replaced", "new_chain": chain })
    } else {
        json!({ "message": "Our chain is authoritative", "chain": chain })
    }))
}
