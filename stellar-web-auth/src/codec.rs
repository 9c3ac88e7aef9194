//! Conversion between challenges and their transport strings.
//!
//! The wire format of transactions and authorization entries is owned by the
//! network, not by this crate. Everything here goes through the
//! [`ChallengeCodec`] trait so a production binary encoding can be plugged in
//! without touching validation or signing. [`JsonCodec`] is the bundled
//! implementation: canonical JSON wrapped in standard base64.
//!
//! # Signing payloads
//!
//! A signing payload is a 32-byte digest of the unsigned part of a challenge,
//! bound to a network. Two challenges with the same payload are
//! indistinguishable to a verifier, so every tamper check in the crate
//! compares payloads.

use std::fmt;

use base64::Engine;
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::{
    error::{Result, WebAuthError},
    model::{AuthorizationEntry, Transaction, TransactionEnvelope},
    network::Network,
};

/// Digest that signatures are made over.
pub type SigningPayload = [u8; 32];

/// Encodes, decodes and hashes challenges.
///
/// Implementations must be deterministic: decoding an encoded value and
/// hashing it again yields the same payload.
pub trait ChallengeCodec: fmt::Debug + Send + Sync {
    /// Encodes a signed transaction to its transport string.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the value cannot be encoded.
    fn encode_envelope(&self, envelope: &TransactionEnvelope) -> Result<String>;

    /// Decodes a signed transaction from its transport string.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the string is not a valid envelope.
    fn decode_envelope(&self, encoded: &str) -> Result<TransactionEnvelope>;

    /// Computes the payload signed by transaction signers.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the transaction cannot be encoded.
    fn transaction_payload(&self, tx: &Transaction, network: &Network) -> Result<SigningPayload>;

    /// Encodes one authorization entry.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the value cannot be encoded.
    fn encode_entry(&self, entry: &AuthorizationEntry) -> Result<String>;

    /// Decodes one authorization entry.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the string is not a valid entry.
    fn decode_entry(&self, encoded: &str) -> Result<AuthorizationEntry>;

    /// Encodes an entry list to its transport string.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the value cannot be encoded.
    fn encode_entries(&self, entries: &[AuthorizationEntry]) -> Result<String>;

    /// Decodes an entry list from its transport string.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the string is not a valid list.
    fn decode_entries(&self, encoded: &str) -> Result<Vec<AuthorizationEntry>>;

    /// Computes the payload signed by an entry's signers.
    ///
    /// Covers the nonce, the expiration ledger and the invocation, never the
    /// signatures.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::Codec`] if the entry cannot be encoded.
    fn entry_payload(&self, entry: &AuthorizationEntry, network: &Network)
    -> Result<SigningPayload>;
}

const TRANSACTION_TAG: &[u8] = b"ENVELOPE_TYPE_TX";
const AUTHORIZATION_TAG: &[u8] = b"ENVELOPE_TYPE_SOROBAN_AUTHORIZATION";

/// Canonical-JSON codec.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::{
///     codec::{ChallengeCodec, JsonCodec},
///     model::{Memo, Transaction, TransactionEnvelope},
///     network::Network,
/// };
///
/// # fn example() -> stellar_web_auth::error::Result<()> {
/// let tx = Transaction {
///     source_account: "GSERVER".to_owned(),
///     fee: 100,
///     sequence: 0,
///     time_bounds: None,
///     memo: Memo::None,
///     operations: Vec::new(),
/// };
/// let codec = JsonCodec;
/// let encoded = codec.encode_envelope(&TransactionEnvelope::new(tx.clone()))?;
/// let decoded = codec.decode_envelope(&encoded)?;
///
/// let network = Network::testnet();
/// assert_eq!(
///     codec.transaction_payload(&tx, &network)?,
///     codec.transaction_payload(&decoded.tx, &network)?,
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        let json = serde_json::to_vec(value)
            .map_err(|e| WebAuthError::Codec(format!("JSON encoding failed: {e}")))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T> {
        let json = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| WebAuthError::Codec(format!("invalid base64: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| WebAuthError::Codec(format!("invalid JSON: {e}")))
    }

    fn digest<T: Serialize + ?Sized>(
        network: &Network,
        tag: &[u8],
        value: &T,
    ) -> Result<SigningPayload> {
        let body = serde_json::to_vec(value)
            .map_err(|e| WebAuthError::Codec(format!("JSON encoding failed: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(network.id());
        hasher.update(tag);
        hasher.update(&body);
        Ok(hasher.finalize().into())
    }
}

#[derive(Serialize)]
struct EntryPreimage<'a> {
    nonce: i64,
    signature_expiration_ledger: u32,
    invocation: &'a crate::model::Invocation,
}

impl ChallengeCodec for JsonCodec {
    fn encode_envelope(&self, envelope: &TransactionEnvelope) -> Result<String> {
        Self::encode(envelope)
    }

    fn decode_envelope(&self, encoded: &str) -> Result<TransactionEnvelope> {
        Self::decode(encoded)
    }

    fn transaction_payload(&self, tx: &Transaction, network: &Network) -> Result<SigningPayload> {
        Self::digest(network, TRANSACTION_TAG, tx)
    }

    fn encode_entry(&self, entry: &AuthorizationEntry) -> Result<String> {
        Self::encode(entry)
    }

    fn decode_entry(&self, encoded: &str) -> Result<AuthorizationEntry> {
        Self::decode(encoded)
    }

    fn encode_entries(&self, entries: &[AuthorizationEntry]) -> Result<String> {
        Self::encode(entries)
    }

    fn decode_entries(&self, encoded: &str) -> Result<Vec<AuthorizationEntry>> {
        Self::decode(encoded)
    }

    fn entry_payload(
        &self,
        entry: &AuthorizationEntry,
        network: &Network,
    ) -> Result<SigningPayload> {
        let preimage = EntryPreimage {
            nonce: entry.credentials.nonce,
            signature_expiration_ledger: entry.credentials.signature_expiration_ledger,
            invocation: &entry.root_invocation,
        };
        Self::digest(network, AUTHORIZATION_TAG, &preimage)
    }
}
