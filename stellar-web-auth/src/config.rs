//! Client configuration.
//!
//! A [`WebAuthConfig`] describes one authentication service. It is read from
//! TOML, or built from a domain's `stellar.toml` with
//! [`WebAuthConfig::from_service_info`].
//!
//! # Examples
//!
//! ```
//! use stellar_web_auth::config::WebAuthConfig;
//!
//! # fn example() -> stellar_web_auth::error::Result<()> {
//! let config = WebAuthConfig::from_toml(
//!     r#"
//!     home_domain = "example.com"
//!     server_signing_key = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"
//!     network_passphrase = "Test SDF Network ; September 2015"
//!     web_auth_endpoint = "https://auth.example.com/auth"
//!     body_encoding = "form"
//!
//!     [headers]
//!     X-Client-Name = "wallet"
//!
//!     [http]
//!     timeout_secs = 20
//!     "#,
//! )?;
//! assert_eq!(config.http.timeout_secs, 20);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    address::Address,
    discovery::ServiceInfo,
    error::{Result, WebAuthError},
    exchange::BodyEncoding,
    network::Network,
    transport::{
        HttpConfig,
        http::{validate_header, validate_url},
    },
};

/// Configuration of one authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthConfig {
    /// Home domain clients authenticate to.
    pub home_domain: String,

    /// Address of the key the server signs challenges with.
    pub server_signing_key: String,

    /// Network challenges must be bound to.
    pub network_passphrase: String,

    /// Account-binding endpoint.
    #[serde(default)]
    pub web_auth_endpoint: Option<String>,

    /// Contract-binding endpoint.
    #[serde(default)]
    pub web_auth_for_contracts_endpoint: Option<String>,

    /// Web-auth contract, `C…`.
    #[serde(default)]
    pub web_auth_contract_id: Option<String>,

    /// Soroban RPC server used to pick signature expiration ledgers.
    #[serde(default)]
    pub soroban_rpc_url: Option<String>,

    /// Seconds of clock skew tolerated around challenge time bounds.
    #[serde(default)]
    pub grace_secs: u64,

    /// Default encoding of token requests.
    #[serde(default)]
    pub body_encoding: BodyEncoding,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

impl WebAuthConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the text is not valid TOML, plus
    /// anything [`WebAuthConfig::validate`] rejects.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| WebAuthError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from a published `stellar.toml`.
    ///
    /// The home domain is the publishing domain. A network declared in the
    /// file must match `network`.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] without a signing key,
    /// [`WebAuthError::InvalidNetworkPassphrase`] on a network mismatch, and
    /// anything [`WebAuthConfig::validate`] rejects.
    pub fn from_service_info(
        info: &ServiceInfo,
        network: &Network,
        http: HttpConfig,
    ) -> Result<Self> {
        if let Some(declared) = info.network()
            && declared != *network
        {
            return Err(WebAuthError::InvalidNetworkPassphrase {
                expected: network.passphrase().to_owned(),
                actual: declared.passphrase().to_owned(),
            });
        }

        let config = Self {
            home_domain: info.domain().to_owned(),
            server_signing_key: info.signing_key()?.to_owned(),
            network_passphrase: network.passphrase().to_owned(),
            web_auth_endpoint: info.web_auth_endpoint().ok().map(String::from),
            web_auth_for_contracts_endpoint: info
                .web_auth_for_contracts_endpoint()
                .ok()
                .map(String::from),
            web_auth_contract_id: info.web_auth_contract_id().ok().map(str::to_owned),
            soroban_rpc_url: None,
            grace_secs: 0,
            body_encoding: BodyEncoding::default(),
            headers: BTreeMap::new(),
            http,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks that:
    /// - the home domain and network passphrase are not empty
    /// - the server key is a `G…` account and the contract a `C…` address
    /// - every URL parses and passes the transport's scheme rules
    /// - headers carry no control characters
    /// - the `[http]` section is within bounds
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] or [`WebAuthError::InvalidAddress`].
    pub fn validate(&self) -> Result<()> {
        if self.home_domain.trim().is_empty() {
            return Err(WebAuthError::Config("home_domain must not be empty".to_owned()));
        }
        if self.network_passphrase.is_empty() {
            return Err(WebAuthError::Config("network_passphrase must not be empty".to_owned()));
        }

        if !Address::parse(&self.server_signing_key)?.is_account() {
            return Err(WebAuthError::InvalidAddress {
                address: self.server_signing_key.clone(),
                reason: "server signing key must be a G... account".to_owned(),
            });
        }
        if let Some(contract) = &self.web_auth_contract_id
            && !Address::parse(contract)?.is_contract()
        {
            return Err(WebAuthError::InvalidAddress {
                address: contract.clone(),
                reason: "web auth contract must be a C... address".to_owned(),
            });
        }

        for (name, value) in [
            ("web_auth_endpoint", &self.web_auth_endpoint),
            ("web_auth_for_contracts_endpoint", &self.web_auth_for_contracts_endpoint),
            ("soroban_rpc_url", &self.soroban_rpc_url),
        ] {
            if let Some(value) = value {
                self.parse_url(name, value)?;
            }
        }

        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }

        self.http.validate()
    }

    /// The network.
    #[must_use]
    pub fn network(&self) -> Network {
        Network::new(self.network_passphrase.as_str())
    }

    /// Account-binding endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if it is not configured or invalid.
    pub fn account_endpoint(&self) -> Result<Url> {
        let raw = self.web_auth_endpoint.as_deref().ok_or_else(|| {
            WebAuthError::Config(
                "web_auth_endpoint is required for account authentication".to_owned(),
            )
        })?;
        self.parse_url("web_auth_endpoint", raw)
    }

    /// Contract-binding endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if it is not configured or invalid.
    pub fn contracts_endpoint(&self) -> Result<Url> {
        let raw = self.web_auth_for_contracts_endpoint.as_deref().ok_or_else(|| {
            WebAuthError::Config(
                "web_auth_for_contracts_endpoint is required for contract authentication"
                    .to_owned(),
            )
        })?;
        self.parse_url("web_auth_for_contracts_endpoint", raw)
    }

    /// Soroban RPC URL, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if it is invalid.
    pub fn rpc_url(&self) -> Result<Option<Url>> {
        self.soroban_rpc_url
            .as_deref()
            .map(|raw| self.parse_url("soroban_rpc_url", raw))
            .transpose()
    }

    /// Configured headers as ordered pairs.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers.iter().map(|(name, value)| (name.clone(), value.clone())).collect()
    }

    fn parse_url(&self, name: &str, raw: &str) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| WebAuthError::Config(format!("invalid {name} '{raw}': {e}")))?;
        validate_url(&url, self.http.allow_http)?;
        Ok(url)
    }
}
