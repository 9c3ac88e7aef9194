//! HTTP plumbing.
//!
//! The transport layer knows about URLs, headers and status codes, never about
//! challenges or tokens. Mapping responses onto protocol outcomes happens in
//! [`exchange`](crate::exchange).
//!
//! # Examples
//!
//! ```rust,no_run
//! use stellar_web_auth::transport::{HttpTransport, RequestContext};
//! use url::Url;
//!
//! # async fn example() -> stellar_web_auth::error::Result<()> {
//! let transport = HttpTransport::new()?;
//! let url = Url::parse("https://testanchor.stellar.org/.well-known/stellar.toml").unwrap();
//!
//! let ctx = RequestContext { url: &url, headers: &[], operation: "service discovery" };
//! let response = transport.get(ctx, &[]).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;

use crate::error::{Result, WebAuthError};

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Request parameters shared by every call.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Full request URL.
    pub url: &'a url::Url,
    /// Additional HTTP headers to include.
    pub headers: &'a [(String, String)],
    /// Name of the operation, for timeout errors and spans.
    pub operation: &'static str,
}

/// Request body of a POST.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`.
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// Response from transport operations.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body as lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::UnknownResponse`] if the body is not the
    /// expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|_| WebAuthError::UnknownResponse {
            status: self.status,
            body: self.text(),
        })
    }
}
