//! Authentication of `C…` contract addresses.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;

use super::{Attempt, AuthOptions, Service};
use crate::{
    address::Address,
    challenge::contract::validate_entries_challenge,
    codec::ChallengeCodec,
    config::WebAuthConfig,
    discovery::ServiceInfo,
    error::{Result, WebAuthError},
    exchange::{self, ChallengeKind, ChallengeResponse},
    expectations::Expectations,
    keys::Keypair,
    model::AuthorizationEntry,
    network::Network,
    rpc::SorobanRpc,
    security::audit::AuditEventType,
    signing::{self, ClientDomainSigner},
    token::BearerToken,
    transport::{HttpConfig, HttpTransport},
};

/// Web authentication client for contracts.
///
/// The challenge is a list of authorization entries invoking the web-auth
/// contract. A contract client may authorize without any signature of its
/// own, so `signers` can be empty.
///
/// # Examples
///
/// ```rust,no_run
/// use stellar_web_auth::{
///     auth::{AuthOptions, ContractWebAuth},
///     keys::Keypair,
///     network::Network,
///     transport::HttpConfig,
/// };
///
/// # async fn example() -> stellar_web_auth::error::Result<()> {
/// let network = Network::testnet();
/// let auth =
///     ContractWebAuth::from_domain("testanchor.stellar.org", &network, HttpConfig::default())
///         .await?;
/// let signer =
///     Keypair::from_secret_seed("SBGWSG6BTNCKCOB3DIFBGCVMUPQFYPA2G4O34RMTB343OYPXU5DJDVMN")?;
///
/// let options =
///     AuthOptions { signature_expiration_ledger: Some(1_200_000), ..AuthOptions::default() };
/// let contract = "CA3D5KRYM6CB7OWQ6TWYRR3Z4T7GNZLKERYNZGGA5SOAOPIFY6YQGAXE";
/// let token = auth.authenticate(contract, &[signer], &options).await?;
/// println!("{}", token.claims().account);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ContractWebAuth {
    service: Service,
    contract: String,
    rpc: Option<SorobanRpc>,
}

impl ContractWebAuth {
    /// Creates a client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Config`] if the configuration is invalid or has
    /// no `web_auth_for_contracts_endpoint` or `web_auth_contract_id`.
    pub fn new(config: &WebAuthConfig) -> Result<Self> {
        let endpoint = config.contracts_endpoint()?;
        let contract = config.web_auth_contract_id.clone().ok_or_else(|| {
            WebAuthError::Config(
                "web_auth_contract_id is required for contract authentication".to_owned(),
            )
        })?;
        let service = Service::new(config, endpoint)?;
        let rpc = config
            .rpc_url()?
            .map(|url| SorobanRpc::new(url, service.transport.clone()))
            .transpose()?;
        Ok(Self { service, contract, rpc })
    }

    /// Creates a client from the `stellar.toml` published by `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::MissingServiceField`] if the file has no
    /// `WEB_AUTH_FOR_CONTRACTS_ENDPOINT`, `WEB_AUTH_CONTRACT_ID` or
    /// `SIGNING_KEY`, plus the errors of [`ServiceInfo::fetch`] and
    /// [`WebAuthConfig::from_service_info`].
    #[instrument(skip(http))]
    pub async fn from_domain(domain: &str, network: &Network, http: HttpConfig) -> Result<Self> {
        let transport = HttpTransport::with_config(&http)?;
        let info = ServiceInfo::fetch(&transport, domain).await?;
        info.web_auth_for_contracts_endpoint()?;
        info.web_auth_contract_id()?;
        Self::new(&WebAuthConfig::from_service_info(&info, network, http)?)
    }

    /// Uses a Soroban RPC server to pick signature expiration ledgers.
    #[must_use]
    pub fn with_rpc(mut self, rpc: SorobanRpc) -> Self {
        self.rpc = Some(rpc);
        self
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

    /// Web-auth contract.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Authenticates the contract `client` and returns a bearer token.
    ///
    /// Caller input is checked before any request: `client` must be a `C…`
    /// address, no memo may be given, and the client-domain options must be
    /// consistent.
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
        let signer = preflight(client, options)?;
        let client_domain_account =
            self.service.client_domain_account(options, signer.as_ref()).await?;
        let expectations = self.expectations(client, options, client_domain_account);
        let attempt = Attempt::start(&self.service.endpoint, &expectations);

        let challenge = self.challenge(client, options).await?;
        let entries =
            self.validate(&challenge, &expectations).inspect_err(|e| attempt.rejected(e))?;
        let expiration_ledger = self.expiration_ledger(options).await?;
        let signed = self
            .sign(entries, &expectations, signers, signer.as_ref(), expiration_ledger)
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
        let contract = Some(self.contract.clone());
        self.service.expectations(client, options, client_domain_account, contract)
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
        let query = self.service.query(client, None, options);
        exchange::request_challenge(
            &self.service.transport,
            &self.service.endpoint,
            ChallengeKind::AuthorizationEntries,
            &query,
            &self.service.headers(options),
        )
        .await
    }

    /// Decodes and validates a challenge.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] for an undecodable challenge and
    /// anything [`validate_entries_challenge`] rejects.
    pub fn validate(
        &self,
        challenge: &ChallengeResponse,
        expectations: &Expectations,
    ) -> Result<Vec<AuthorizationEntry>> {
        let entries = self.service.codec.decode_entries(&challenge.challenge)?;
        validate_entries_challenge(
            &entries,
            challenge.network_passphrase.as_deref(),
            expectations,
            self.service.codec.as_ref(),
        )?;
        Ok(entries)
    }

    /// Signature expiration ledger for an attempt.
    ///
    /// The caller's value, else the RPC server's latest ledger plus
    /// [`EXPIRATION_LEDGER_OFFSET`](crate::rpc::EXPIRATION_LEDGER_OFFSET),
    /// else `None` to keep what the server put on the entries.
    ///
    /// # Errors
    ///
    /// See [`SorobanRpc::latest_ledger`].
    pub async fn expiration_ledger(&self, options: &AuthOptions) -> Result<Option<u32>> {
        if let Some(ledger) = options.signature_expiration_ledger {
            return Ok(Some(ledger));
        }
        let Some(rpc) = &self.rpc else {
            return Ok(None);
        };
        let ledger = rpc.expiration_ledger().await?;
        debug!(ledger, "expiration ledger from rpc");
        Ok(Some(ledger))
    }

    /// Adds the client-domain and client signatures.
    ///
    /// # Errors
    ///
    /// See [`signing::sign_entries`].
    pub async fn sign(
        &self,
        entries: Vec<AuthorizationEntry>,
        expectations: &Expectations,
        signers: &[Keypair],
        client_domain_signer: Option<&ClientDomainSigner>,
        expiration_ledger: Option<u32>,
    ) -> Result<Vec<AuthorizationEntry>> {
        signing::sign_entries(
            entries,
            expectations,
            signers,
            client_domain_signer,
            expiration_ledger,
            self.service.codec.as_ref(),
        )
        .await
    }

    /// Exchanges signed entries for a token.
    ///
    /// # Errors
    ///
    /// See [`exchange::submit_challenge`].
    pub async fn submit(
        &self,
        entries: &[AuthorizationEntry],
        options: &AuthOptions,
    ) -> Result<BearerToken> {
        let encoded = self.service.codec.encode_entries(entries)?;
        exchange::submit_challenge(
            &self.service.transport,
            &self.service.endpoint,
            ChallengeKind::AuthorizationEntries,
            &encoded,
            self.service.body_encoding(options),
            &self.service.headers(options),
        )
        .await
    }
}

fn preflight(client: &str, options: &AuthOptions) -> Result<Option<ClientDomainSigner>> {
    if !Address::parse(client)?.is_contract() {
        return Err(WebAuthError::InvalidAddress {
            address: client.to_owned(),
            reason: "contract authentication needs a C... address".to_owned(),
        });
    }
    if options.memo.is_some() {
        return Err(WebAuthError::Config(
            "memos are not supported for contract authentication".to_owned(),
        ));
    }
    options.client_domain_signer()
}
