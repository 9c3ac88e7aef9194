//! Service discovery through a domain's `stellar.toml`.
//!
//! A service publishes its auth endpoints and signing key at
//! `https://<domain>/.well-known/stellar.toml`. The same file, published by a
//! client domain, names the key that attests its users.

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    address::Address,
    error::{Result, WebAuthError},
    network::Network,
    transport::{HttpTransport, RequestContext},
};

const WELL_KNOWN_PATH: &str = ".well-known/stellar.toml";

/// Auth-related fields of a `stellar.toml`.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::discovery::ServiceInfo;
///
/// # fn example() -> stellar_web_auth::error::Result<()> {
/// let info = ServiceInfo::from_toml(
///     "example.com",
///     r#"
///     WEB_AUTH_ENDPOINT = "https://auth.example.com/auth"
///     SIGNING_KEY = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"
///     "#,
/// )?;
/// assert_eq!(info.web_auth_endpoint()?.as_str(), "https://auth.example.com/auth");
/// assert!(info.web_auth_contract_id().is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceInfo {
    #[serde(skip)]
    domain: String,
    #[serde(rename = "WEB_AUTH_ENDPOINT")]
    web_auth_endpoint: Option<String>,
    #[serde(rename = "SIGNING_KEY")]
    signing_key: Option<String>,
    #[serde(rename = "WEB_AUTH_FOR_CONTRACTS_ENDPOINT")]
    web_auth_for_contracts_endpoint: Option<String>,
    #[serde(rename = "WEB_AUTH_CONTRACT_ID")]
    web_auth_contract_id: Option<String>,
    #[serde(rename = "NETWORK_PASSPHRASE")]
    network_passphrase: Option<String>,
}

impl ServiceInfo {
    /// Parses the text of a `stellar.toml` published by `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the text is not valid TOML.
    pub fn from_toml(domain: &str, text: &str) -> Result<Self> {
        let mut info: Self = toml::from_str(text).map_err(|e| {
            WebAuthError::Config(format!("invalid stellar.toml for '{domain}': {e}"))
        })?;
        info.domain = domain.to_owned();
        Ok(info)
    }

    /// Downloads and parses the `stellar.toml` of `domain`.
    ///
    /// The file is fetched over HTTPS, or plain HTTP when the transport
    /// allows it.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the file is missing or invalid, and
    /// transport errors as they occur.
    #[instrument(skip(transport))]
    pub async fn fetch(transport: &HttpTransport, domain: &str) -> Result<Self> {
        let url = stellar_toml_url(domain, transport.allows_http())?;
        let ctx = RequestContext { url: &url, headers: &[], operation: "service discovery" };
        let response = transport.get(ctx, &[]).await?;
        if !response.is_success() {
            return Err(WebAuthError::Config(format!(
                "stellar.toml for '{domain}' returned status {}",
                response.status
            )));
        }
        debug!(bytes = response.body.len(), "stellar.toml fetched");
        Self::from_toml(domain, &response.text())
    }

    /// Domain the file was published by.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Account-binding endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] if absent and
    /// [`WebAuthError::Config`] if not a URL.
    pub fn web_auth_endpoint(&self) -> Result<Url> {
        self.url_field(self.web_auth_endpoint.as_deref(), "WEB_AUTH_ENDPOINT")
    }

    /// Contract-binding endpoint.
    ///
    /// # Errors
    ///
    /// As for [`ServiceInfo::web_auth_endpoint`].
    pub fn web_auth_for_contracts_endpoint(&self) -> Result<Url> {
        self.url_field(
            self.web_auth_for_contracts_endpoint.as_deref(),
            "WEB_AUTH_FOR_CONTRACTS_ENDPOINT",
        )
    }

    /// Server signing key.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] if absent and
    /// [`WebAuthError::InvalidAddress`] if not a `G…` account.
    pub fn signing_key(&self) -> Result<&str> {
        let key = self.required(self.signing_key.as_deref(), "SIGNING_KEY")?;
        if !Address::parse(key)?.is_account() {
            return Err(WebAuthError::InvalidAddress {
                address: key.to_owned(),
                reason: "signing key must be a G... account".to_owned(),
            });
        }
        Ok(key)
    }

    /// Web-auth contract.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] if absent and
    /// [`WebAuthError::InvalidAddress`] if not a `C…` contract.
    pub fn web_auth_contract_id(&self) -> Result<&str> {
        let id = self.required(self.web_auth_contract_id.as_deref(), "WEB_AUTH_CONTRACT_ID")?;
        if !Address::parse(id)?.is_contract() {
            return Err(WebAuthError::InvalidAddress {
                address: id.to_owned(),
                reason: "web auth contract must be a C... address".to_owned(),
            });
        }
        Ok(id)
    }

    /// Declared network, if any.
    #[must_use]
    pub fn network(&self) -> Option<Network> {
        self.network_passphrase.as_deref().map(Network::new)
    }

    fn required<'a>(&self, value: Option<&'a str>, field: &'static str) -> Result<&'a str> {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| WebAuthError::MissingServiceField { domain: self.domain.clone(), field })
    }

    fn url_field(&self, value: Option<&str>, field: &'static str) -> Result<Url> {
        let raw = self.required(value, field)?;
        Url::parse(raw)
            .map_err(|e| WebAuthError::Config(format!("{field} '{raw}' is not a URL: {e}")))
    }
}

fn stellar_toml_url(domain: &str, allow_http: bool) -> Result<Url> {
    let scheme = if allow_http { "http" } else { "https" };
    Url::parse(&format!("{scheme}://{domain}/{WELL_KNOWN_PATH}"))
        .map_err(|e| WebAuthError::Config(format!("invalid domain '{domain}': {e}")))
}
