//! Authentication clients.
//!
//! [`WebAuth`] authenticates `G…` and `M…` accounts with a transaction
//! challenge; [`ContractWebAuth`] authenticates `C…` contracts with
//! authorization entries. Both run the same four phases, each of which is
//! public for callers that need to step through them:
//!
//! 1. `challenge`: fetch a challenge from the endpoint;
//! 2. `validate`: check it against the [`Expectations`] of the attempt;
//! 3. `sign`: add the client-domain and client signatures;
//! 4. `submit`: exchange the signed challenge for a [`BearerToken`].
//!
//! `authenticate` runs them in order, after rejecting bad caller input and
//! before any network call. Every attempt gets an audit correlation id.
//!
//! [`BearerToken`]: crate::token::BearerToken

pub mod account;
pub mod contract;

use std::{fmt, sync::Arc, time::Instant};

use tracing::debug;
use url::Url;
use uuid::Uuid;

pub use account::WebAuth;
pub use contract::ContractWebAuth;

use crate::{
    address::Address,
    audit,
    codec::{ChallengeCodec, JsonCodec},
    config::WebAuthConfig,
    discovery::ServiceInfo,
    error::{ErrorStratum, Result, WebAuthError},
    exchange::{BodyEncoding, ChallengeQuery},
    expectations::{Expectations, web_auth_domain_of},
    keys::Keypair,
    network::Network,
    security::audit::{AuditEvent, AuditEventType, audit_log},
    signing::{ClientDomainSigner, SigningDelegate},
    transport::HttpTransport,
};

/// Per-attempt options.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::auth::AuthOptions;
///
/// let options = AuthOptions {
///     memo: Some(1234),
///     headers: vec![("X-Client-Name".to_owned(), "wallet".to_owned())],
///     ..AuthOptions::default()
/// };
/// assert!(options.client_domain.is_none());
/// ```
#[derive(Clone, Default)]
pub struct AuthOptions {
    /// Home domain to authenticate to. Defaults to the configured one.
    pub home_domain: Option<String>,
    /// Memo id for a shared `G…` account. Account binding only.
    pub memo: Option<u64>,
    /// Client domain asked to attest the client.
    pub client_domain: Option<String>,
    /// Signing address of the client domain. Looked up from the client
    /// domain's `stellar.toml` when neither this nor a local key is given.
    pub client_domain_account: Option<String>,
    /// Local client-domain key. Mutually exclusive with the delegate.
    pub client_domain_key: Option<Keypair>,
    /// External client-domain signer. Mutually exclusive with the key.
    pub client_domain_delegate: Option<Arc<dyn SigningDelegate>>,
    /// Signature expiration ledger. Contract binding only.
    pub signature_expiration_ledger: Option<u32>,
    /// Headers added to the configured ones.
    pub headers: Vec<(String, String)>,
    /// Token request encoding. Defaults to the configured one.
    pub body_encoding: Option<BodyEncoding>,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("home_domain", &self.home_domain)
            .field("memo", &self.memo)
            .field("client_domain", &self.client_domain)
            .field("client_domain_account", &self.client_domain_account)
            .field("client_domain_key", &self.client_domain_key)
            .field("client_domain_delegate", &self.client_domain_delegate.as_ref().map(|_| ".."))
            .field("signature_expiration_ledger", &self.signature_expiration_ledger)
            .field("headers", &self.headers)
            .field("body_encoding", &self.body_encoding)
            .finish()
    }
}

impl AuthOptions {
    /// Resolves the client-domain signer.
    ///
    /// # Errors
    ///
    /// - [`WebAuthError::ConflictingSigningMethod`] with both a key and a
    ///   delegate
    /// - [`WebAuthError::MissingClientDomainSigner`] with a client domain but
    ///   neither
    /// - [`WebAuthError::Config`] with a signer but no client domain
    pub fn client_domain_signer(&self) -> Result<Option<ClientDomainSigner>> {
        let signer = ClientDomainSigner::resolve(
            self.client_domain_key.clone(),
            self.client_domain_delegate.clone(),
        )?;
        match (&self.client_domain, &signer) {
            (Some(client_domain), None) => Err(WebAuthError::MissingClientDomainSigner {
                client_domain: client_domain.clone(),
            }),
            (None, Some(_)) => Err(WebAuthError::Config(
                "a client domain signer requires a client domain".to_owned(),
            )),
            _ => Ok(signer),
        }
    }
}

/// Settings shared by both clients.
#[derive(Debug, Clone)]
pub(crate) struct Service {
    pub(crate) endpoint: Url,
    pub(crate) web_auth_domain: String,
    pub(crate) home_domain: String,
    pub(crate) server_signing_key: String,
    pub(crate) network: Network,
    pub(crate) grace_secs: u64,
    pub(crate) body_encoding: BodyEncoding,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) transport: HttpTransport,
    pub(crate) codec: Arc<dyn ChallengeCodec>,
}

impl Service {
    pub(crate) fn new(config: &WebAuthConfig, endpoint: Url) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::with_config(&config.http)?;
        transport.check_url(&endpoint)?;
        let web_auth_domain = web_auth_domain_of(&endpoint)?;

        Ok(Self {
            endpoint,
            web_auth_domain,
            home_domain: config.home_domain.clone(),
            server_signing_key: config.server_signing_key.clone(),
            network: config.network(),
            grace_secs: config.grace_secs,
            body_encoding: config.body_encoding,
            headers: config.header_pairs(),
            transport,
            codec: Arc::new(JsonCodec),
        })
    }

    pub(crate) fn home_domain<'a>(&'a self, options: &'a AuthOptions) -> &'a str {
        options.home_domain.as_deref().unwrap_or(&self.home_domain)
    }

    pub(crate) fn query(
        &self,
        client: &str,
        memo: Option<u64>,
        options: &AuthOptions,
    ) -> ChallengeQuery {
        ChallengeQuery {
            account: client.to_owned(),
            memo,
            home_domain: Some(self.home_domain(options).to_owned()),
            client_domain: options.client_domain.clone(),
        }
    }

    pub(crate) fn headers(&self, options: &AuthOptions) -> Vec<(String, String)> {
        self.headers.iter().chain(&options.headers).cloned().collect()
    }

    pub(crate) fn body_encoding(&self, options: &AuthOptions) -> BodyEncoding {
        options.body_encoding.unwrap_or(self.body_encoding)
    }

    pub(crate) fn expectations(
        &self,
        client: &str,
        options: &AuthOptions,
        client_domain_account: Option<String>,
        web_auth_contract: Option<String>,
    ) -> Expectations {
        Expectations {
            server_signing_key: self.server_signing_key.clone(),
            home_domain: self.home_domain(options).to_owned(),
            web_auth_domain: self.web_auth_domain.clone(),
            client_account: client.to_owned(),
            client_domain: options.client_domain.clone(),
            client_domain_account,
            network: self.network.clone(),
            memo: options.memo,
            web_auth_contract,
            grace_secs: self.grace_secs,
        }
    }

    /// Works out which address signs for the client domain.
    ///
    /// An explicit address wins, then the local key, then the `SIGNING_KEY`
    /// the client domain publishes.
    pub(crate) async fn client_domain_account(
        &self,
        options: &AuthOptions,
        signer: Option<&ClientDomainSigner>,
    ) -> Result<Option<String>> {
        let Some(client_domain) = options.client_domain.as_deref() else {
            return Ok(None);
        };

        if let Some(account) = &options.client_domain_account {
            require_account(account, "client domain account must be a G... account")?;
            return Ok(Some(account.clone()));
        }
        if let Some(account) = signer.and_then(ClientDomainSigner::account_id) {
            return Ok(Some(account.to_owned()));
        }

        let info = ServiceInfo::fetch(&self.transport, client_domain).await?;
        let account = info.signing_key()?.to_owned();
        debug!(client_domain, "client domain signing key discovered");
        Ok(Some(account))
    }
}

pub(crate) fn require_account(address: &str, reason: &str) -> Result<Address> {
    let parsed = Address::parse(address)?;
    if parsed.is_account() {
        Ok(parsed)
    } else {
        Err(WebAuthError::InvalidAddress { address: address.to_owned(), reason: reason.to_owned() })
    }
}

/// Audit trail of one authentication attempt.
#[derive(Debug)]
pub(crate) struct Attempt<'a> {
    id: Uuid,
    started: Instant,
    endpoint: &'a Url,
    expectations: &'a Expectations,
}

impl<'a> Attempt<'a> {
    pub(crate) fn start(endpoint: &'a Url, expectations: &'a Expectations) -> Self {
        let attempt = Self { id: Uuid::new_v4(), started: Instant::now(), endpoint, expectations };
        audit!(
            AuditEventType::ChallengeRequested,
            &expectations.client_account,
            attempt.id,
            with_endpoint(endpoint.as_str()),
            with_home_domain(expectations.home_domain.as_str()),
        );
        attempt
    }

    fn event(&self, event_type: AuditEventType) -> AuditEvent {
        let event = AuditEvent::new(event_type, &self.expectations.client_account, self.id)
            .with_endpoint(self.endpoint.as_str())
            .with_home_domain(self.expectations.home_domain.as_str())
            .with_duration(self.started.elapsed());
        match &self.expectations.client_domain {
            Some(client_domain) => event.with_client_domain(client_domain.as_str()),
            None => event,
        }
    }

    pub(crate) fn record(&self, event_type: AuditEventType) {
        audit_log(&self.event(event_type));
    }

    /// Records a failure of the validation or signing phase.
    ///
    /// Only protocol violations are audited; caller and transport failures
    /// are not security events.
    pub(crate) fn rejected(&self, error: &WebAuthError) {
        let event_type = match error {
            WebAuthError::TransactionModified { .. } => AuditEventType::DelegateTamperingDetected,
            error if error.stratum() == ErrorStratum::Protocol => AuditEventType::ChallengeRejected,
            _ => return,
        };
        audit_log(&self.event(event_type).with_error(error.to_string()));
    }

    pub(crate) fn token_rejected(&self, error: &WebAuthError) {
        audit_log(&self.event(AuditEventType::TokenRejected).with_error(error.to_string()));
    }
}
