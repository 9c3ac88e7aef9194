//! Soroban RPC lookups.
//!
//! The contract binding asks for the latest ledger to pick a signature
//! expiration ledger when the caller did not supply one.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{Result, WebAuthError},
    transport::{HttpTransport, RequestBody, RequestContext},
};

/// Ledgers added to the latest ledger to get a signature expiration ledger.
pub const EXPIRATION_LEDGER_OFFSET: u32 = 10;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<LatestLedger>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct LatestLedger {
    sequence: u32,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC client for a Soroban RPC server.
#[derive(Debug, Clone)]
pub struct SorobanRpc {
    url: Url,
    transport: HttpTransport,
}

impl SorobanRpc {
    /// Creates a client for the RPC server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the transport may not contact
    /// `url`.
    pub fn new(url: Url, transport: HttpTransport) -> Result<Self> {
        transport.check_url(&url)?;
        Ok(Self { url, transport })
    }

    /// RPC server URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Sequence of the latest closed ledger.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::UnknownResponse`] for a non-2xx status, a
    /// JSON-RPC error or an unreadable body, and transport errors as they
    /// occur.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn latest_ledger(&self) -> Result<u32> {
        let body = RequestBody::Json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getLatestLedger",
        }));
        let ctx =
            RequestContext { url: &self.url, headers: &[], operation: "latest ledger lookup" };
        let response = self.transport.post(ctx, &body).await?;
        if !response.is_success() {
            return Err(WebAuthError::UnknownResponse {
                status: response.status,
                body: response.text(),
            });
        }

        match response.json::<RpcResponse>()? {
            RpcResponse { result: Some(ledger), .. } => {
                debug!(sequence = ledger.sequence, "latest ledger");
                Ok(ledger.sequence)
            }
            RpcResponse { error: Some(error), .. } => Err(WebAuthError::UnknownResponse {
                status: response.status,
                body: format!("rpc error {}: {}", error.code, error.message),
            }),
            RpcResponse { .. } => Err(WebAuthError::UnknownResponse {
                status: response.status,
                body: response.text(),
            }),
        }
    }

    /// Latest ledger plus [`EXPIRATION_LEDGER_OFFSET`].
    ///
    /// # Errors
    ///
    /// As for [`SorobanRpc::latest_ledger`].
    pub async fn expiration_ledger(&self) -> Result<u32> {
        Ok(self.latest_ledger().await?.saturating_add(EXPIRATION_LEDGER_OFFSET))
    }
}
