//! RPC Methods - JSON-RPC method handlers
//!
//! Contract functions go straight to the ledger processor. A few node
//! methods expose raw ledger entries and health information.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ledger_runtime::{LedgerProcessor, Revision};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use vote_program::{Outcome, VoteError};

/// RPC context shared across handlers
pub struct RpcContext {
    pub processor: Arc<LedgerProcessor>,
}

// ============ Request/Response Types ============

#[derive(Debug)]
pub struct InvokeRequest {
    pub function: String,
    pub args: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetLedgerEntryRequest {
    pub key: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcContext_ {
    pub revision: Revision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub data: (String, String), // (data, encoding)
    #[serde(rename = "lastModifiedRevision")]
    pub last_modified_revision: Revision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetLedgerEntryResponse {
    pub context: RpcContext_,
    pub value: Option<LedgerEntry>,
}

// ============ RPC Handlers ============

/// Forward a contract function to the processor
///
/// Rejections come back as ordinary results; only dispatch and ledger
/// failures become RPC errors.
pub fn handle_invoke(ctx: &RpcContext, params: InvokeRequest) -> Result<Value, RpcError> {
    let result = ctx.processor.invoke(&params.function, &params.args);

    match result.outcome {
        Ok(outcome) => {
            if let Outcome::Rejected(rejection) = &outcome {
                tracing::debug!("{} rejected: {}", params.function, rejection);
            }
            Ok(payload_to_value(&outcome.payload()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle getLedgerEntry RPC method
pub fn handle_get_ledger_entry(
    ctx: &RpcContext,
    params: GetLedgerEntryRequest,
) -> Result<GetLedgerEntryResponse, RpcError> {
    let revision = ctx.processor.current_revision();

    let value = ctx
        .processor
        .store()
        .get_with_revision(&params.key)
        .map(|(data, last_modified_revision)| {
            let encoding = params.encoding.as_deref().unwrap_or("base64");
            let data = match encoding {
                "base58" => (bs58::encode(&data).into_string(), "base58".to_string()),
                _ => (BASE64.encode(&data), "base64".to_string()),
            };

            LedgerEntry {
                data,
                last_modified_revision,
            }
        });

    Ok(GetLedgerEntryResponse {
        context: RpcContext_ { revision },
        value,
    })
}

/// Handle getRevision RPC method
pub fn handle_get_revision(ctx: &RpcContext) -> Result<Revision, RpcError> {
    Ok(ctx.processor.current_revision())
}

/// Handle getHealth RPC method
pub fn handle_get_health() -> Result<String, RpcError> {
    Ok("ok".to_string())
}

/// JSON when the payload parses as JSON, a string otherwise, null when empty
pub fn payload_to_value(payload: &[u8]) -> Value {
    if payload.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    InternalError(String),
    #[error("{0}")]
    MethodNotFound(String),
}

impl From<VoteError> for RpcError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::InvalidFunctionName { .. } => RpcError::MethodNotFound(e.to_string()),
            VoteError::IncorrectArgumentCount { .. } => RpcError::InvalidParams(e.to_string()),
            VoteError::Ledger(_) | VoteError::Encoding(_) => RpcError::InternalError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RpcContext {
        RpcContext {
            processor: Arc::new(LedgerProcessor::default()),
        }
    }

    fn invoke(ctx: &RpcContext, function: &str, args: &[&str]) -> Result<Value, RpcError> {
        handle_invoke(
            ctx,
            InvokeRequest {
                function: function.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        )
    }

    #[test]
    fn test_payload_to_value() {
        assert_eq!(payload_to_value(b""), Value::Null);
        assert_eq!(payload_to_value(b"Election ended"), json!("Election ended"));
        assert_eq!(payload_to_value(br#"{"voted":true}"#), json!({"voted": true}));
    }

    #[test]
    fn test_invoke_returns_payloads() {
        let ctx = context();
        assert_eq!(invoke(&ctx, "initLedger", &[]).unwrap(), Value::Null);
        assert_eq!(
            invoke(&ctx, "queryVoter", &["VOTER3"]).unwrap(),
            json!({"voted": false})
        );
        assert_eq!(
            invoke(&ctx, "castVote", &["VOTER3", "CANDIDATE1"]).unwrap(),
            json!("Election has not started yet")
        );
    }

    #[test]
    fn test_invoke_errors() {
        let ctx = context();
        let err = invoke(&ctx, "dropTables", &[]).unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
        assert_eq!(err.to_string(), "Invalid Smart Contract function name.");

        let err = invoke(&ctx, "castVote", &["VOTER3"]).unwrap_err();
        assert!(matches!(err, RpcError::InvalidParams(_)));
    }

    #[test]
    fn test_get_ledger_entry() {
        let ctx = context();
        invoke(&ctx, "startElection", &[]).unwrap();

        let response = handle_get_ledger_entry(
            &ctx,
            GetLedgerEntryRequest {
                key: "ELECTION".to_string(),
                encoding: None,
            },
        )
        .unwrap();

        let entry = response.value.unwrap();
        assert_eq!(entry.data.1, "base64");
        assert_eq!(BASE64.decode(&entry.data.0).unwrap(), br#"{"ended":false}"#);
        assert_eq!(entry.last_modified_revision, 1);
        assert_eq!(response.context.revision, 1);

        let missing = handle_get_ledger_entry(
            &ctx,
            GetLedgerEntryRequest {
                key: "VOTER0".to_string(),
                encoding: Some("base58".to_string()),
            },
        )
        .unwrap();
        assert!(missing.value.is_none());
    }
}
