//! RPC Server - JSON-RPC front end for the election ledger
//!
//! - Contract functions: initLedger, castVote, queryAllCandidates, ...
//! - Node methods: getLedgerEntry, getRevision, getHealth, getVersion

pub mod http_server;
pub mod methods;

pub use http_server::HttpRpcServer;
pub use methods::{RpcContext, RpcError};

/// RPC Server configuration
#[derive(Clone, Debug)]
pub struct RpcServerConfig {
    /// HTTP RPC bind address
    pub http_addr: String,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:7050".to_string(),
            verbose: false,
        }
    }
}
