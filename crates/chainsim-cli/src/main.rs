use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chainsim-cli")]
#[command(about = "CLI client for the chainsim ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure the genesis block exists and print it
    Genesis,
    /// Mine and append a block holding the given transaction records
    Append {
        /// Transaction records as JSON objects, repeatable
        #[arg(long = "tx", required = true)]
        txs: Vec<String>,
    },
    /// Print the full chain status
    Status,
    /// Run the reversible tamper demonstration against one block
    Tamper {
        /// Number of the block to tamper with
        block_number: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node;

    let res = match cli.cmd {
        Command::Genesis => client.post(format!("{node}/chain/genesis")).send().await?,
        Command::Append { txs } => {
            let mut records = Vec::with_capacity(txs.len());
            for tx in &txs {
                let value: Value = serde_json::from_str(tx)?;
                if !value.is_object() {
                    bail!("--tx must be a JSON object, got: {tx}");
                }
                records.push(value);
            }
            client
                .post(format!("{node}/chain/blocks"))
                .json(&serde_json::json!({ "transactions": records }))
                .send()
                .await?
        }
        Command::Status => client.get(format!("{node}/chain/status")).send().await?,
        Command::Tamper { block_number } => {
            client
                .post(format!("{node}/chain/tamper/{block_number}"))
                .send()
                .await?
        }
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {status}");
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
