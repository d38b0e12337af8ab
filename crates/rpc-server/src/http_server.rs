//! HTTP JSON-RPC Server
//!
//! Every contract function is a JSON-RPC method taking an array of string
//! arguments. Node methods (`getLedgerEntry`, `getRevision`, `getHealth`,
//! `getVersion`) are answered before contract dispatch.

use crate::methods::{
    handle_get_health, handle_get_ledger_entry, handle_get_revision, handle_invoke,
    GetLedgerEntryRequest, InvokeRequest, RpcContext, RpcError,
};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use vote_program::VoteInstruction;

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: error_code(&e),
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// HTTP RPC Server
pub struct HttpRpcServer {
    context: Arc<RpcContext>,
}

impl HttpRpcServer {
    /// Create a new HTTP RPC server
    pub fn new(context: Arc<RpcContext>) -> Self {
        Self { context }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // Browser dashboards call the node directly
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/", post(handle_rpc))
            .layer(cors)
            .with_state(self.context)
    }

    /// Run the server until the listener fails or `shutdown` resolves
    pub async fn run<F>(self, addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP RPC server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Handle JSON-RPC request
async fn handle_rpc(
    State(context): State<Arc<RpcContext>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if request.jsonrpc != "2.0" {
        tracing::debug!("Request {} uses jsonrpc {:?}", request.id, request.jsonrpc);
    }

    // Invocations wait on the commit lock, so they run on the blocking pool
    let method = request.method;
    let params = request.params;
    let result = tokio::task::spawn_blocking(move || dispatch_method(&context, &method, params))
        .await
        .unwrap_or_else(|e| Err(RpcError::InternalError(format!("request task failed: {}", e))));

    (StatusCode::OK, Json(JsonRpcResponse::from_result(request.id, result)))
}

/// Dispatch to appropriate method handler
pub(crate) fn dispatch_method(
    ctx: &RpcContext,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    tracing::info!("RPC method called: {}", method);
    match method {
        "getLedgerEntry" => {
            let params: Vec<Value> = serde_json::from_value(params).unwrap_or_default();
            let key = params
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| RpcError::InvalidParams("Missing key".to_string()))?;

            let encoding = params
                .get(1)
                .and_then(|v| v.get("encoding"))
                .and_then(|v| v.as_str())
                .map(String::from);

            let request = GetLedgerEntryRequest {
                key: key.to_string(),
                encoding,
            };

            let response = handle_get_ledger_entry(ctx, request)?;
            to_value(response)
        }

        "getRevision" => {
            let revision = handle_get_revision(ctx)?;
            Ok(json!(revision))
        }

        "getHealth" => {
            let health = handle_get_health()?;
            Ok(json!(health))
        }

        "getVersion" => Ok(json!({
            "election-node": env!("CARGO_PKG_VERSION"),
            "functions": VoteInstruction::FUNCTION_NAMES,
        })),

        // Everything else is a contract function; unknown names are
        // reported by the program itself
        function => {
            let request = InvokeRequest {
                function: function.to_string(),
                args: string_params(params)?,
            };
            handle_invoke(ctx, request)
        }
    }
}

/// Contract arguments: a missing or null `params` means no arguments
fn string_params(params: Value) -> Result<Vec<String>, RpcError> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Array(values) => values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(RpcError::InvalidParams(format!(
                    "arguments must be strings, got {}",
                    other
                ))),
            })
            .collect(),
        other => Err(RpcError::InvalidParams(format!(
            "params must be an array of strings, got {}",
            other
        ))),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}

/// Map error to JSON-RPC error code
fn error_code(error: &RpcError) -> i32 {
    match error {
        RpcError::InvalidParams(_) => -32602,
        RpcError::MethodNotFound(_) => -32601,
        RpcError::InternalError(_) => -32603,
    }
}
