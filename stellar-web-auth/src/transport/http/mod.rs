//! HTTP transport implementation using reqwest.

use std::{sync::LazyLock, time::Duration};

use reqwest::{Client, RequestBuilder};
use tracing::{debug, instrument};
use url::Url;

use super::{
    RequestBody, RequestContext, TransportResponse,
    config::{HttpConfig, HttpVersion},
};
use crate::error::{Result, WebAuthError};

/// Default HTTP client with connection pooling enabled.
///
/// Using a singleton avoids recreating the client per transport instance,
/// preserving connection pooling benefits across all default transports.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(10)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
});

/// Validates URL for security constraints.
///
/// Unless plain HTTP is allowed, the URL must be HTTPS and must not point to
/// a loopback host.
pub(crate) fn validate_url(url: &Url, allow_http: bool) -> Result<()> {
    if allow_http {
        return match url.scheme() {
            "https" | "http" => Ok(()),
            scheme => Err(WebAuthError::Config(format!("unsupported URL scheme '{scheme}'"))),
        };
    }

    if url.scheme() != "https" {
        return Err(WebAuthError::Config(format!("only HTTPS URLs are allowed: {url}")));
    }

    if let Some(host) = url.host_str()
        && (host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]")
    {
        return Err(WebAuthError::Config(format!("localhost URLs are not allowed: {url}")));
    }

    Ok(())
}

/// Validates header name and value for CRLF injection prevention.
pub(crate) fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.contains('\r') || name.contains('\n') || name.contains('\0') {
        return Err(WebAuthError::Config(
            "invalid header name: control characters not allowed".to_owned(),
        ));
    }
    if value.contains('\r') || value.contains('\n') || value.contains('\0') {
        return Err(WebAuthError::Config(
            "invalid header value: control characters not allowed".to_owned(),
        ));
    }
    Ok(())
}

/// Maps a send failure onto the error taxonomy.
fn send_error(error: reqwest::Error, operation: &'static str) -> WebAuthError {
    if error.is_timeout() {
        WebAuthError::Timeout { operation }
    } else {
        WebAuthError::Http(error)
    }
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::transport::{HttpConfig, HttpTransport, HttpVersion};
///
/// let config = HttpConfig {
///     timeout_secs: 15,
///     http_version: HttpVersion::Http1,
///     ..HttpConfig::default()
/// };
///
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert!(!transport.allows_http());
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    allow_http: bool,
}

impl HttpTransport {
    /// Creates a new HTTP transport with default settings.
    ///
    /// Uses a shared singleton client for connection pooling efficiency.
    ///
    /// # Errors
    ///
    /// This method is infallible but returns `Result` for API consistency.
    pub fn new() -> Result<Self> {
        Ok(Self { client: DEFAULT_HTTP_CLIENT.clone(), allow_http: false })
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the configuration is out of
    /// bounds, or [`WebAuthError::Http`] if the client cannot be built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        let client = builder.build().map_err(WebAuthError::Http)?;

        Ok(Self { client, allow_http: config.allow_http })
    }

    /// Returns `true` if plain-HTTP endpoints are permitted.
    #[must_use]
    pub const fn allows_http(&self) -> bool {
        self.allow_http
    }

    /// Checks that a URL may be contacted by this transport.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] for forbidden schemes or hosts.
    pub fn check_url(&self, url: &Url) -> Result<()> {
        validate_url(url, self.allow_http)
    }

    /// Sends a GET request with query parameters.
    ///
    /// Non-2xx statuses are returned, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Timeout`] on timeout, [`WebAuthError::Config`]
    /// for a forbidden URL or header, or [`WebAuthError::Http`] otherwise.
    #[instrument(skip(self, ctx, query), fields(url = %ctx.url, operation = ctx.operation))]
    pub async fn get(
        &self,
        ctx: RequestContext<'_>,
        query: &[(&str, &str)],
    ) -> Result<TransportResponse> {
        let request = self.prepare(ctx, self.client.get(ctx.url.clone()))?.query(query);
        self.execute(ctx, request).await
    }

    /// Sends a POST request.
    ///
    /// Non-2xx statuses are returned, not raised.
    ///
    /// # Errors
    ///
    /// As for [`HttpTransport::get`].
    #[instrument(skip(self, ctx, body), fields(url = %ctx.url, operation = ctx.operation))]
    pub async fn post(
        &self,
        ctx: RequestContext<'_>,
        body: &RequestBody,
    ) -> Result<TransportResponse> {
        let request = self.prepare(ctx, self.client.post(ctx.url.clone()))?;
        let request = match body {
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(fields) => request.form(fields),
        };
        self.execute(ctx, request).await
    }

    fn prepare(
        &self,
        ctx: RequestContext<'_>,
        mut request: RequestBuilder,
    ) -> Result<RequestBuilder> {
        validate_url(ctx.url, self.allow_http)?;

        for (name, value) in ctx.headers {
            validate_header(name, value)?;
            request = request.header(name.as_str(), value.as_str());
        }
        Ok(request.header("Accept", "application/json"))
    }

    async fn execute(
        &self,
        ctx: RequestContext<'_>,
        request: RequestBuilder,
    ) -> Result<TransportResponse> {
        let response = request.send().await.map_err(|e| send_error(e, ctx.operation))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| send_error(e, ctx.operation))?.to_vec();

        debug!(status, body_len = body.len(), "response received");
        Ok(TransportResponse { status, body })
    }
}
