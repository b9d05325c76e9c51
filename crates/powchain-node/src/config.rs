use crate::constants::{DEFAULT_LISTEN, DEFAULT_PUBLIC_DIR};
use anyhow::{bail, Context, Result};
use clap::Parser;
use powchain_core::{constants::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY}, MiningStrategy};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(name = "powchain-node")]
#[command(about = "Proof-of-work hash chain node with a wallet helper")]
pub struct NodeConfig {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Directory served for any path that is not an API route
    #[arg(long, default_value = DEFAULT_PUBLIC_DIR)]
    pub public_dir: PathBuf,

    /// Required leading zero hex digits in every mined block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Nonce search strategy: sequential or parallel
    #[arg(long, default_value_t = MiningStrategy::Sequential)]
    pub strategy: MiningStrategy,

    /// Abort a single mine after this many seconds (no limit when unset)
    #[arg(long)]
    pub mine_timeout_secs: Option<u64>,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    pub cors: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            difficulty: DEFAULT_DIFFICULTY,
            strategy: MiningStrategy::Sequential,
            mine_timeout_secs: None,
            cors: false,
        }
    }
}

impl NodeConfig {
    /// Check the settings and return the parsed listen address.
    pub fn validate(&self) -> Result<SocketAddr> {
        if self.difficulty > MAX_DIFFICULTY {
            bail!(
                "difficulty {} exceeds the maximum of {MAX_DIFFICULTY}",
                self.difficulty
            );
        }
        if self.mine_timeout_secs == Some(0) {
            bail!("mine timeout must be at least one second");
        }
        self.listen
            .parse()
            .with_context(|| format!("invalid listen address `{}`", self.listen))
    }

    pub fn mine_timeout(&self) -> Option<Duration> {
        self.mine_timeout_secs.map(Duration::from_secs)
    }
}
