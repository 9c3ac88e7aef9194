//! Authentication of `G…` and `M…` accounts.

use std::sync::Arc;

use tracing::{info, instrument};
use url::Url;

use super::{Attempt, AuthOptions, Service};
use crate::{
    address::Address,
    challenge::{account::validate_transaction_challenge, check_network},
    codec::ChallengeCodec,
    config::WebAuthConfig,
    discovery::ServiceInfo,
    error::{Result, WebAuthError},
    exchange::{self, ChallengeKind, ChallengeResponse},
    expectations::Expectations,
    keys::Keypair,
    model::TransactionEnvelope,
    network::Network,
    security::audit::AuditEventType,
    signing::{self, ClientDomainSigner},
    token::BearerToken,
    transport::{HttpConfig, HttpTransport},
};

/// Web authentication client for accounts.
///
/// # Examples
///
/// ```rust,no_run
/// use stellar_web_auth::{
///     auth::{AuthOptions, WebAuth},
///     keys::Keypair,
///     network::Network,
///     transport::HttpConfig,
/// };
///
/// # async fn example() -> stellar_web_auth::error::Result<()> {
/// let auth =
///     WebAuth::from_domain("testanchor.stellar.org", &Network::testnet(), HttpConfig::default())
///         .await?;
/// let keypair =
///     Keypair::from_secret_seed("SBGWSG6BTNCKCOB3DIFBGCVMUPQFYPA2G4O34RMTB343OYPXU5DJDVMN")?;
///
/// let token = auth
///     .authenticate(keypair.account_id(), &[keypair.clone()], &AuthOptions::default())
///     .await?;
/// println!("{}", token.authorization_header());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebAuth {
    service: Service,
}

impl WebAuth {
    /// Creates a client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the configuration is invalid or has
    /// no `web_auth_endpoint`.
    pub fn new(config: &WebAuthConfig) -> Result<Self> {
        let endpoint = config.account_endpoint()?;
        Ok(Self { service: Service::new(config, endpoint)? })
    }

    /// Creates a client from the `stellar.toml` published by `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] if the file has no
    /// `WEB_AUTH_ENDPOINT` or `SIGNING_KEY`, plus the errors of
    /// [`ServiceInfo::fetch`] and [`WebAuthConfig::from_service_info`].
    #[instrument(skip(http))]
    pub async fn from_domain(domain: &str, network: &Network, http: HttpConfig) -> Result<Self> {
        let transport = HttpTransport::with_config(&http)?;
        let info = ServiceInfo::fetch(&transport, domain).await?;
        info.web_auth_endpoint()?;
        Self::new(&WebAuthConfig::from_service_info(&info, network, http)?)
    }

    /// Replaces the challenge codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ChallengeCodec>) -> Self {
        self.service.codec = codec;
        self
    }

    /// Auth endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.service.endpoint
    }

    /// Network challenges are bound to.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.service.network
    }

    /// Authenticates `client` and returns a bearer token.
    ///
    /// Caller input is checked before any request: `signers` must not be
    /// empty, `client` must be a `G…` or `M…` account, a memo needs a `G…`
    /// account, and the client-domain options must be consistent.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing phase. See [`WebAuthError`].
    #[instrument(skip(self, signers, options), fields(endpoint = %self.service.endpoint))]
    pub async fn authenticate(
        &self,
        client: &str,
        signers: &[Keypair],
        options: &AuthOptions,
    ) -> Result<BearerToken> {
        let signer = preflight(client, signers, options)?;
        let client_domain_account =
            self.service.client_domain_account(options, signer.as_ref()).await?;
        let expectations = self.expectations(client, options, client_domain_account);
        let attempt = Attempt::start(&self.service.endpoint, &expectations);

        let challenge = self.challenge(client, options).await?;
        let envelope =
            self.validate(&challenge, &expectations).inspect_err(|e| attempt.rejected(e))?;
        let signed = self
            .sign(envelope, signers, signer.as_ref())
            .await
            .inspect_err(|e| attempt.rejected(e))?;
        attempt.record(AuditEventType::ChallengeSigned);

        let token = self.submit(&signed, options).await.inspect_err(|e| attempt.token_rejected(e))?;
        attempt.record(AuditEventType::TokenIssued);
        info!(expires_at = token.claims().expires_at, "authenticated");
        Ok(token)
    }

    /// Expectations of an attempt for `client`.
    #[must_use]
    pub fn expectations(
        &self,
        client: &str,
        options: &AuthOptions,
        client_domain_account: Option<String>,
    ) -> Expectations {
        self.service.expectations(client, options, client_domain_account, None)
    }

    /// Fetches a challenge.
    ///
    /// # Errors
    ///
    /// See [`exchange::request_challenge`].
    pub async fn challenge(
        &self,
        client: &str,
        options: &AuthOptions,
    ) -> Result<ChallengeResponse> {
        let query = self.service.query(client, options.memo, options);
        exchange::request_challenge(
            &self.service.transport,
            &self.service.endpoint,
            ChallengeKind::Transaction,
            &query,
            &self.service.headers(options),
        )
        .await
    }

    /// Decodes and validates a challenge.
    ///
    /// A network passphrase declared by the server is checked first, then
    /// the transaction itself.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] for an undecodable challenge,
    /// [`WebAuthError::InvalidNetworkPassphrase`] for a foreign network, and
    /// anything [`validate_transaction_challenge`] rejects.
    pub fn validate(
        &self,
        challenge: &ChallengeResponse,
        expectations: &Expectations,
    ) -> Result<TransactionEnvelope> {
        let envelope = self.service.codec.decode_envelope(&challenge.challenge)?;
        check_network(challenge.network_passphrase.as_deref(), expectations)?;
        validate_transaction_challenge(&envelope, expectations, self.service.codec.as_ref())?;
        Ok(envelope)
    }

    /// Adds the client-domain and client signatures.
    ///
    /// # Errors
    ///
    /// See [`signing::sign_transaction`].
    pub async fn sign(
        &self,
        envelope: TransactionEnvelope,
        signers: &[Keypair],
        client_domain_signer: Option<&ClientDomainSigner>,
    ) -> Result<TransactionEnvelope> {
        signing::sign_transaction(
            envelope,
            signers,
            client_domain_signer,
            self.service.codec.as_ref(),
            &self.service.network,
        )
        .await
    }

    /// Exchanges a signed challenge for a token.
    ///
    /// # Errors
    ///
    /// See [`exchange::submit_challenge`].
    pub async fn submit(
        &self,
        envelope: &TransactionEnvelope,
        options: &AuthOptions,
    ) -> Result<BearerToken> {
        let encoded = self.service.codec.encode_envelope(envelope)?;
        exchange::submit_challenge(
            &self.service.transport,
            &self.service.endpoint,
            ChallengeKind::Transaction,
            &encoded,
            self.service.body_encoding(options),
            &self.service.headers(options),
        )
        .await
    }
}

fn preflight(
    client: &str,
    signers: &[Keypair],
    options: &AuthOptions,
) -> Result<Option<ClientDomainSigner>> {
    if signers.is_empty() {
        return Err(WebAuthError::EmptySigners);
    }

    let address = Address::parse(client)?;
    if address.is_contract() {
        return Err(WebAuthError::InvalidAddress {
            address: client.to_owned(),
            reason: "account authentication needs a G... or M... address".to_owned(),
        });
    }
    if address.is_muxed() && options.memo.is_some() {
        return Err(WebAuthError::MemoWithMuxedAccount { account: client.to_owned() });
    }

    options.client_domain_signer()
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;

    fn key(byte: u8) -> Keypair {
        Keypair::from_signing_key(SigningKey::from_bytes(&[byte; 32]))
    }

    #[test]
    fn test_preflight_requires_signers() {
        let client = key(1);
        let result = preflight(client.account_id(), &[], &AuthOptions::default());
        assert!(matches!(result, Err(WebAuthError::EmptySigners)));
    }

    #[test]
    fn test_preflight_rejects_contract_client() {
        let contract = Address::Contract([3u8; 32]).to_string();
        let result = preflight(&contract, &[key(1)], &AuthOptions::default());
        assert!(matches!(result, Err(WebAuthError::InvalidAddress { .. })));
    }

    #[test]
    fn test_preflight_rejects_memo_with_muxed() {
        let client = key(1);
        let muxed =
            Address::MuxedAccount { ed25519: client.verifying_key().to_bytes(), id: 9 }.to_string();
        let options = AuthOptions { memo: Some(5), ..AuthOptions::default() };
        let result = preflight(&muxed, &[client], &options);
        assert!(matches!(result, Err(WebAuthError::MemoWithMuxedAccount { .. })));
    }

    #[test]
    fn test_preflight_accepts_memo_with_account() {
        let client = key(1);
        let options = AuthOptions { memo: Some(5), ..AuthOptions::default() };
        assert!(preflight(client.account_id(), &[client.clone()], &options).unwrap().is_none());
    }

    #[test]
    fn test_new_requires_endpoint() {
        let config = WebAuthConfig::from_toml(&format!(
            "home_domain = \"example.com\"\n\
             server_signing_key = \"{}\"\n\
             network_passphrase = \"{}\"\n",
            key(2).account_id(),
            crate::network::TESTNET_PASSPHRASE
        ))
        .unwrap();
        assert!(matches!(WebAuth::new(&config), Err(WebAuthError::Config(_))));
    }
}
