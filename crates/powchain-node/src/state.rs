use crate::{config::NodeConfig, error::ApiError};
use powchain_core::{Block, CancelToken, Chain, ChainViolation, CoreError};
use powchain_wallet::Wallet;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Everything the handlers share. Cheap to clone; tests build their own.
#[derive(Clone)]
pub struct AppState {
    chain: Arc<RwLock<Chain>>,
    /// Held for the whole prepare/mine/commit sequence so appends never interleave.
    append_lock: Arc<Mutex<()>>,
    wallet: Arc<RwLock<Option<Wallet>>>,
    shutdown: CancelToken,
    config: Arc<NodeConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub strict_valid: bool,
    pub length: usize,
    pub difficulty: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<ViolationOut>,
}

#[derive(Debug, Serialize)]
pub struct ViolationOut {
    #[serde(flatten)]
    pub violation: ChainViolation,
    pub message: String,
}

/// Cancels the request's token if the handler future is dropped mid-mine.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl AppState {
    pub fn new(config: NodeConfig) -> Result<Self, CoreError> {
        let chain = Chain::with_strategy(config.difficulty, config.strategy)?;
        info!(
            difficulty = config.difficulty,
            strategy = %config.strategy,
            "chain initialised with genesis block"
        );
        Ok(Self {
            chain: Arc::new(RwLock::new(chain)),
            append_lock: Arc::new(Mutex::new(())),
            wallet: Arc::new(RwLock::new(None)),
            shutdown: CancelToken::new(),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Cancelling this aborts every in-flight mine.
    pub fn shutdown_token(&self) -> &CancelToken {
        &self.shutdown
    }

    pub async fn snapshot(&self) -> Vec<Block> {
        self.chain.read().await.snapshot()
    }

    /// Mine a block carrying `data` on a blocking worker and append it.
    ///
    /// Readers keep access to the chain while the nonce search runs. If the mine is
    /// aborted (shutdown, timeout, dropped request) the candidate is discarded.
    pub async fn append(&self, data: Value) -> Result<Block, ApiError> {
        let _serial = self.append_lock.lock().await;

        let (candidate, difficulty, strategy) = {
            let chain = self.chain.read().await;
            (
                chain.prepare(Block::with_data(data))?,
                chain.difficulty(),
                chain.strategy(),
            )
        };
        debug!(index = candidate.index, %strategy, "mining candidate");

        let cancel = self.shutdown.child();
        let _guard = CancelOnDrop(cancel.clone());
        let timer = self.config.mine_timeout().map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                cancel.cancel();
            })
        });

        let mined =
            tokio::task::spawn_blocking(move || strategy.mine(candidate, difficulty, &cancel)).await;
        if let Some(timer) = timer {
            timer.abort();
        }
        let mined = mined.map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;

        let mut chain = self.chain.write().await;
        Ok(chain.commit(mined)?.clone())
    }

    pub async fn validation(&self) -> ValidationReport {
        let chain = self.chain.read().await;
        let strict = chain.validate_strict();
        ValidationReport {
            valid: chain.is_valid(),
            strict_valid: strict.is_ok(),
            length: chain.len(),
            difficulty: chain.difficulty(),
            violation: strict.err().map(|violation| ViolationOut {
                message: violation.to_string(),
                violation,
            }),
        }
    }

    /// Replace the in-memory wallet used by `/wallet/sign`.
    pub async fn install_wallet(&self, wallet: Wallet) {
        *self.wallet.write().await = Some(wallet);
    }

    pub async fn wallet(&self) -> Option<Wallet> {
        self.wallet.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(difficulty: u32) -> AppState {
        AppState::new(NodeConfig {
            difficulty,
            ..NodeConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn append_extends_snapshot() {
        let state = state(1);
        let block = state.append(json!("hello")).await.unwrap();
        assert_eq!(block.index, 1);

        let blocks = state.snapshot().await;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], block);
        assert_eq!(blocks[1].previous_hash, blocks[0].hash);
    }

    #[tokio::test]
    async fn shutdown_aborts_append() {
        let state = state(64);
        state.shutdown_token().cancel();
        let err = state.append(json!("never")).await.unwrap_err();
        assert!(matches!(err, ApiError::MiningAborted));
        assert_eq!(state.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn validation_report_for_fresh_chain() {
        let report = state(2).validation().await;
        assert!(report.valid);
        assert!(report.strict_valid);
        assert_eq!(report.length, 1);
        assert!(report.violation.is_none());
    }

    #[tokio::test]
    async fn wallet_slot_replaced() {
        let state = state(0);
        assert!(state.wallet().await.is_none());
        let wallet = Wallet::generate(Some("a".into()), Default::default());
        let address = wallet.address_p2pkh();
        state.install_wallet(wallet).await;
        assert_eq!(state.wallet().await.unwrap().address_p2pkh(), address);
    }
}
