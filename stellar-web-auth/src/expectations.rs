//! What the client expects a challenge to say.

use url::Url;

use crate::{
    error::{Result, WebAuthError},
    network::Network,
};

/// Values every challenge of one attempt is checked against.
///
/// Built once per attempt from the client configuration and the caller's
/// options, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectations {
    /// Address whose signature the server puts on every challenge.
    pub server_signing_key: String,
    /// Home domain the client authenticates to.
    pub home_domain: String,
    /// `host[:port]` of the auth endpoint.
    pub web_auth_domain: String,
    /// Address being authenticated.
    pub client_account: String,
    /// Client domain asked to attest the client, if any.
    pub client_domain: Option<String>,
    /// Signing address of the client domain, if known.
    pub client_domain_account: Option<String>,
    /// Network the challenge must be bound to.
    pub network: Network,
    /// Memo id requested for a shared account.
    pub memo: Option<u64>,
    /// Web-auth contract, for the contract binding.
    pub web_auth_contract: Option<String>,
    /// Seconds of clock skew tolerated on either side of the time bounds.
    pub grace_secs: u64,
}

impl Expectations {
    /// Returns `true` when the attempt involves a client domain.
    #[must_use]
    pub const fn expects_client_domain(&self) -> bool {
        self.client_domain_account.is_some()
    }
}

/// Derives the web-auth domain of an endpoint: the host, plus `:port` when
/// the URL carries an explicit non-default port.
///
/// # Errors
///
/// Returns [`WebAuthError::Config`] if the URL has no host.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::expectations::web_auth_domain_of;
/// use url::Url;
///
/// # fn example() -> stellar_web_auth::error::Result<()> {
/// let with_port = Url::parse("https://auth.example.com:8443/auth").unwrap();
/// assert_eq!(web_auth_domain_of(&with_port)?, "auth.example.com:8443");
///
/// let default_port = Url::parse("https://auth.example.com:443/auth").unwrap();
/// assert_eq!(web_auth_domain_of(&default_port)?, "auth.example.com");
/// # Ok(())
/// # }
/// ```
pub fn web_auth_domain_of(endpoint: &Url) -> Result<String> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| WebAuthError::Config(format!("endpoint '{endpoint}' has no host")))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}
