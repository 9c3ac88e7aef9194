//! Signing orchestration.
//!
//! Once a challenge validates, it collects signatures in a fixed order: the
//! server's (already present), then the client domain's, then the client's.
//! The client-domain signature comes from either a local [`Keypair`] or a
//! [`SigningDelegate`], an external signer that only ever sees the encoded
//! challenge.
//!
//! A delegate is not trusted. Whatever it returns is decoded again and
//! checked: the signing payload must be unchanged, every signature already
//! present must survive, and at least one new signature must appear. The
//! result is rebuilt as "previous signatures, then new ones", whatever order
//! the delegate used.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{
    challenge::{Role, classify},
    codec::{ChallengeCodec, SigningPayload},
    error::{BoxError, Result, WebAuthError},
    expectations::Expectations,
    keys::Keypair,
    model::{AuthorizationEntry, DecoratedSignature, EntrySignature, TransactionEnvelope},
    network::Network,
};

/// External signer for the client-domain signature.
///
/// Receives the encoded challenge carrying every signature collected so far
/// and returns it re-encoded with one or more signatures added. For the
/// account binding the challenge is the whole transaction envelope; for the
/// contract binding it is the client domain's authorization entry alone.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use stellar_web_auth::{error::BoxError, signing::SigningDelegate};
///
/// #[derive(Debug)]
/// struct RemoteSigner {
///     url: String,
/// }
///
/// #[async_trait]
/// impl SigningDelegate for RemoteSigner {
///     async fn sign(&self, encoded: String) -> Result<String, BoxError> {
///         // POST `encoded` to `self.url` and return the signed result.
///         Err(format!("{} is unreachable", self.url).into())
///     }
/// }
/// ```
#[async_trait]
pub trait SigningDelegate: Send + Sync {
    /// Signs an encoded challenge.
    ///
    /// # Errors
    ///
    /// Any error is passed to the caller of the authentication attempt as
    /// [`WebAuthError::Delegate`], unchanged.
    async fn sign(&self, encoded: String) -> std::result::Result<String, BoxError>;
}

/// How the client-domain signature is produced.
#[derive(Clone)]
pub enum ClientDomainSigner {
    /// A local key.
    Key(Keypair),
    /// An external signer.
    Delegate(Arc<dyn SigningDelegate>),
}

impl ClientDomainSigner {
    /// Picks the signing method from the two mutually exclusive options.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::ConflictingSigningMethod`] when both are set.
    pub fn resolve(
        key: Option<Keypair>,
        delegate: Option<Arc<dyn SigningDelegate>>,
    ) -> Result<Option<Self>> {
        match (key, delegate) {
            (Some(_), Some(_)) => Err(WebAuthError::ConflictingSigningMethod),
            (Some(key), None) => Ok(Some(Self::Key(key))),
            (None, Some(delegate)) => Ok(Some(Self::Delegate(delegate))),
            (None, None) => Ok(None),
        }
    }

    /// Account of the local key, if this is one.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key.account_id()),
            Self::Delegate(_) => None,
        }
    }
}

impl fmt::Debug for ClientDomainSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Delegate(_) => f.write_str("Delegate(..)"),
        }
    }
}

/// A challenge shape the delegate protocol can be run on.
pub(crate) trait Signable: Sized {
    type Signature: Clone + PartialEq;

    fn encode(&self, codec: &dyn ChallengeCodec) -> Result<String>;
    fn decode(codec: &dyn ChallengeCodec, encoded: &str) -> Result<Self>;
    fn payload(&self, codec: &dyn ChallengeCodec, network: &Network) -> Result<SigningPayload>;
    /// Address the challenge is bound to beyond its payload, if any.
    fn owner(&self) -> Option<&str>;
    fn signatures(&self) -> &[Self::Signature];
    fn set_signatures(&mut self, signatures: Vec<Self::Signature>);
    fn well_formed(signature: &Self::Signature) -> bool;
}

impl Signable for TransactionEnvelope {
    type Signature = DecoratedSignature;

    fn encode(&self, codec: &dyn ChallengeCodec) -> Result<String> {
        codec.encode_envelope(self)
    }

    fn decode(codec: &dyn ChallengeCodec, encoded: &str) -> Result<Self> {
        codec.decode_envelope(encoded)
    }

    fn payload(&self, codec: &dyn ChallengeCodec, network: &Network) -> Result<SigningPayload> {
        codec.transaction_payload(&self.tx, network)
    }

    fn owner(&self) -> Option<&str> {
        None
    }

    fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }

    fn set_signatures(&mut self, signatures: Vec<DecoratedSignature>) {
        self.signatures = signatures;
    }

    fn well_formed(signature: &DecoratedSignature) -> bool {
        signature.signature.len() == 64
    }
}

impl Signable for AuthorizationEntry {
    type Signature = EntrySignature;

    fn encode(&self, codec: &dyn ChallengeCodec) -> Result<String> {
        codec.encode_entry(self)
    }

    fn decode(codec: &dyn ChallengeCodec, encoded: &str) -> Result<Self> {
        codec.decode_entry(encoded)
    }

    fn payload(&self, codec: &dyn ChallengeCodec, network: &Network) -> Result<SigningPayload> {
        codec.entry_payload(self, network)
    }

    fn owner(&self) -> Option<&str> {
        Some(&self.credentials.address)
    }

    fn signatures(&self) -> &[EntrySignature] {
        &self.credentials.signatures
    }

    fn set_signatures(&mut self, signatures: Vec<EntrySignature>) {
        self.credentials.signatures = signatures;
    }

    fn well_formed(signature: &EntrySignature) -> bool {
        signature.signature.len() == 64 && !signature.public_key.is_empty()
    }
}

/// Runs a delegate over a challenge and checks what comes back.
///
/// # Errors
///
/// - [`WebAuthError::Delegate`] if the delegate fails
/// - [`WebAuthError::TransactionModified`] if the payload or owner changed,
///   or a previous signature was dropped
/// - [`WebAuthError::NoNewSignature`] if nothing well-formed was added
#[instrument(skip_all)]
pub(crate) async fn delegate_sign<T: Signable + Send + Sync>(
    challenge: T,
    delegate: &dyn SigningDelegate,
    codec: &dyn ChallengeCodec,
    network: &Network,
) -> Result<T> {
    let payload = challenge.payload(codec, network)?;
    let encoded = challenge.encode(codec)?;

    let returned = delegate.sign(encoded).await.map_err(WebAuthError::Delegate)?;
    let mut signed = T::decode(codec, &returned)?;

    if signed.payload(codec, network)? != payload {
        return Err(tampered("signing payload changed"));
    }
    if signed.owner() != challenge.owner() {
        return Err(tampered("credentials address changed"));
    }

    let previous = challenge.signatures();
    if previous.iter().any(|signature| !signed.signatures().contains(signature)) {
        return Err(tampered("a previous signature was removed"));
    }

    let mut added: Vec<T::Signature> = Vec::new();
    for signature in signed.signatures() {
        let is_new = !previous.contains(signature) && !added.contains(signature);
        if is_new && T::well_formed(signature) {
            added.push(signature.clone());
        }
    }
    if added.is_empty() {
        return Err(WebAuthError::NoNewSignature);
    }

    debug!(added = added.len(), "delegate added signatures");
    let mut ordered = previous.to_vec();
    ordered.extend(added);
    signed.set_signatures(ordered);
    Ok(signed)
}

fn tampered(detail: &str) -> WebAuthError {
    warn!(detail, "signing delegate tampered with the challenge");
    WebAuthError::modified(detail)
}

/// Adds the client-domain and client signatures to a transaction challenge.
///
/// # Errors
///
/// Returns [`WebAuthError::EmptySigners`] when `signers` is empty, and any
/// delegate error described on [`SigningDelegate`].
#[instrument(
    skip_all,
    fields(signers = signers.len(), client_domain = client_domain_signer.is_some())
)]
pub async fn sign_transaction(
    mut envelope: TransactionEnvelope,
    signers: &[Keypair],
    client_domain_signer: Option<&ClientDomainSigner>,
    codec: &dyn ChallengeCodec,
    network: &Network,
) -> Result<TransactionEnvelope> {
    if signers.is_empty() {
        return Err(WebAuthError::EmptySigners);
    }

    let payload = codec.transaction_payload(&envelope.tx, network)?;
    match client_domain_signer {
        Some(ClientDomainSigner::Key(key)) => {
            envelope.signatures.push(key.sign_decorated(&payload));
        }
        Some(ClientDomainSigner::Delegate(delegate)) => {
            envelope = delegate_sign(envelope, delegate.as_ref(), codec, network).await?;
        }
        None => {}
    }

    for signer in signers {
        envelope.signatures.push(signer.sign_decorated(&payload));
    }
    Ok(envelope)
}

/// Adds the client-domain and client signatures to an entry challenge.
///
/// Client and client-domain entries get `expiration_ledger`, when given,
/// before anything is signed. Server entries are never touched. An empty
/// `signers` list is allowed: a contract client may authorize without
/// signatures.
///
/// # Errors
///
/// Returns [`WebAuthError::MissingClientEntry`] when a client-domain signer
/// is given but no entry belongs to the client domain, and any delegate
/// error described on [`SigningDelegate`].
#[instrument(skip_all, fields(signers = signers.len(), expiration_ledger = ?expiration_ledger))]
pub async fn sign_entries(
    mut entries: Vec<AuthorizationEntry>,
    expectations: &Expectations,
    signers: &[Keypair],
    client_domain_signer: Option<&ClientDomainSigner>,
    expiration_ledger: Option<u32>,
    codec: &dyn ChallengeCodec,
) -> Result<Vec<AuthorizationEntry>> {
    let network = &expectations.network;

    if let Some(ledger) = expiration_ledger {
        for entry in &mut entries {
            let role = classify(&entry.credentials.address, expectations);
            if matches!(role, Role::Client | Role::ClientDomain) {
                entry.credentials.signature_expiration_ledger = ledger;
            }
        }
    }

    if let Some(signer) = client_domain_signer {
        let account = expectations.client_domain_account.as_deref().unwrap_or_default();
        let index = entries
            .iter()
            .position(|entry| {
                classify(&entry.credentials.address, expectations) == Role::ClientDomain
            })
            .ok_or_else(|| WebAuthError::MissingClientEntry { address: account.to_owned() })?;

        let entry = entries[index].clone();
        entries[index] = match signer {
            ClientDomainSigner::Key(key) => {
                let payload = codec.entry_payload(&entry, network)?;
                let mut entry = entry;
                entry.credentials.signatures.push(key.sign_entry(&payload));
                entry
            }
            ClientDomainSigner::Delegate(delegate) => {
                delegate_sign(entry, delegate.as_ref(), codec, network).await?
            }
        };
    }

    for entry in &mut entries {
        if classify(&entry.credentials.address, expectations) != Role::Client {
            continue;
        }
        let payload = codec.entry_payload(entry, network)?;
        for signer in signers {
            entry.credentials.signatures.push(signer.sign_entry(&payload));
        }
    }
    Ok(entries)
}
