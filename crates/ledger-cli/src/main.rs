use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_NODE: &str = "http://127.0.0.1:5000";

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:5000)
    #[arg(long, global = true, default_value = DEFAULT_NODE)]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Mine the pending pool into a new block
    Mine,
    /// Print the node's chain
    Chain,
    /// Register peers with the node
    Register {
        /// Peer URLs, e.g. http://127.0.0.1:5001
        #[arg(required = true)]
        peers: Vec<String>,
    },
    /// Ask the node to adopt the longest valid chain among its peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: i64,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let req = match cli.cmd {
        Command::Submit {
            sender,
            recipient,
            amount,
        } => client
            .post(format!("{node}/transactions/new"))
            .json(&Tx {
                sender,
                recipient,
                amount,
            }),
        Command::Mine => client.get(format!("{node}/mine")),
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Register { peers } => client
            .post(format!("{node}/nodes/register"))
            .json(&Nodes { nodes: peers }),
        Command::Resolve => client.get(format!("{node}/nodes/resolve")),
    };

    debug!(?req, "sending request");
    let res = req.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
