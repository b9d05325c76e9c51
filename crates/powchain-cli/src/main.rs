use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use powchain_core::{Block, Chain};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain-cli")]
#[command(about = "CLI client for the powchain node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the full chain
    Chain,
    /// Mine a block with placeholder data
    Mine,
    /// Mine a block carrying the given data
    AddData {
        /// Payload; parsed as JSON when --json is set, otherwise sent as a string
        data: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch the chain and run the strict validator locally
    Validate {
        /// Difficulty the node mines at
        #[arg(long, default_value_t = powchain_core::constants::DEFAULT_DIFFICULTY)]
        difficulty: u32,
    },
    /// Create a wallet on the node
    WalletNew {
        #[arg(long)]
        label: Option<String>,
        #[arg(long, value_enum, default_value_t = NetworkArg::Mainnet)]
        network: NetworkArg,
        /// Ask the node to include the private key in the response
        #[arg(long)]
        include_private: bool,
    },
    /// Sign a message with the node's current wallet
    Sign { message: String },
    /// Verify a signature
    Verify {
        message: String,
        #[arg(long)]
        signature: String,
        #[arg(long)]
        public_key: String,
    },
}

#[derive(Serialize)]
struct WalletNewBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    network: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    message: String,
    signature_hex: String,
    public_key_hex: String,
}

fn data_payload(data: String, as_json: bool) -> Result<Value> {
    if as_json {
        serde_json::from_str(&data).context("--json payload is not valid JSON")
    } else {
        Ok(Value::String(data))
    }
}

/// Human summary of a locally validated chain.
fn validation_summary(blocks: Vec<Block>, difficulty: u32) -> Result<String> {
    let chain = Chain::from_blocks(blocks, difficulty)?;
    let linkage = if chain.is_valid() { "ok" } else { "BROKEN" };
    let strict = match chain.validate_strict() {
        Ok(()) => "ok".to_string(),
        Err(violation) => format!("FAILED ({violation})"),
    };
    Ok(format!(
        "blocks: {}\nlinkage: {linkage}\nstrict: {strict}",
        chain.len()
    ))
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
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
    debug!(%node, command = ?cli.cmd, "dispatching");

    match cli.cmd {
        Command::Chain => {
            print_response(client.get(format!("{node}/chain")).send().await?).await?;
        }
        Command::Mine => {
            print_response(client.post(format!("{node}/mine")).send().await?).await?;
        }
        Command::AddData { data, json } => {
            let body = json!({ "data": data_payload(data, json)? });
            let res = client.post(format!("{node}/add-data")).json(&body).send().await?;
            print_response(res).await?;
        }
        Command::Validate { difficulty } => {
            let blocks: Vec<Block> = client
                .get(format!("{node}/chain"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("node returned a malformed chain")?;
            println!("{}", validation_summary(blocks, difficulty)?);
        }
        Command::WalletNew {
            label,
            network,
            include_private,
        } => {
            let body = WalletNewBody {
                label,
                network: match network {
                    NetworkArg::Mainnet => "mainnet",
                    NetworkArg::Testnet => "testnet",
                },
            };
            let flag = if include_private { 1 } else { 0 };
            let res = client
                .post(format!("{node}/wallet/new?includePrivate={flag}"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Sign { message } => {
            let res = client
                .post(format!("{node}/wallet/sign"))
                .json(&json!({ "message": message }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Verify {
            message,
            signature,
            public_key,
        } => {
            let body = VerifyBody {
                message,
                signature_hex: signature,
                public_key_hex: public_key,
            };
            let res = client
                .post(format!("{node}/wallet/verify"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_data_with_json_flag() {
        let cli = Cli::try_parse_from(["powchain-cli", "add-data", "--json", r#"{"a":1}"#]).unwrap();
        match cli.cmd {
            Command::AddData { data, json } => {
                assert!(json);
                assert_eq!(data_payload(data, json).unwrap(), json!({ "a": 1 }));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.node, "http://127.0.0.1:8000");
    }

    #[test]
    fn plain_data_is_a_string() {
        assert_eq!(data_payload("{oops".into(), false).unwrap(), json!("{oops"));
        assert!(data_payload("{oops".into(), true).is_err());
    }

    #[test]
    fn wallet_new_flags() {
        let cli = Cli::try_parse_from([
            "powchain-cli",
            "--node",
            "http://10.0.0.1:9000",
            "wallet-new",
            "--network",
            "testnet",
            "--include-private",
        ])
        .unwrap();
        assert_eq!(cli.node, "http://10.0.0.1:9000");
        assert!(matches!(
            cli.cmd,
            Command::WalletNew {
                network: NetworkArg::Testnet,
                include_private: true,
                label: None
            }
        ));
    }

    #[test]
    fn summary_flags_tampering() {
        let mut chain = Chain::new(1).unwrap();
        chain.add_block(Block::with_data("a")).unwrap();
        let mut blocks = chain.snapshot();
        assert!(validation_summary(blocks.clone(), 1)
            .unwrap()
            .ends_with("strict: ok"));

        blocks[1].data = json!("b");
        let summary = validation_summary(blocks, 1).unwrap();
        assert!(summary.contains("linkage: ok"));
        assert!(summary.contains("strict: FAILED (block 1:"));
    }
}
