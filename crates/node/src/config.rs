//! Node Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP RPC bind address
    pub rpc_addr: String,
    /// Data directory for the sled ledger
    pub data_dir: PathBuf,
    /// Save state every N commits (0 = only on shutdown)
    pub save_interval: u64,
    /// Run initLedger when the loaded ledger is empty
    pub seed_on_empty: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_addr: "127.0.0.1:7050".to_string(),
            data_dir: PathBuf::from("./data"),
            save_interval: 50,
            seed_on_empty: true,
        }
    }
}

impl NodeConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {:?}: {}", path, e))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {:?}: {}", path, e))?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(
        mut self,
        rpc_addr: Option<String>,
        data_dir: Option<PathBuf>,
        save_interval: Option<u64>,
    ) -> Self {
        if let Some(rpc_addr) = rpc_addr {
            self.rpc_addr = rpc_addr;
        }
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
        if let Some(save_interval) = save_interval {
            self.save_interval = save_interval;
        }
        self
    }
}
