//! Local ed25519 signing keys.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use signature::Signer;
use stellar_strkey::Strkey;
use tracing::instrument;

use crate::{
    address::{Address, hint_of},
    error::{Result, WebAuthError},
    model::{DecoratedSignature, EntrySignature},
};

/// An ed25519 keypair that signs challenge payloads.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use stellar_web_auth::keys::Keypair;
///
/// let keypair = Keypair::from_signing_key(SigningKey::from_bytes(&[1u8; 32]));
/// assert!(keypair.account_id().starts_with('G'));
///
/// let restored = Keypair::from_secret_seed(&keypair.secret_seed()).unwrap();
/// assert_eq!(restored.account_id(), keypair.account_id());
/// ```
pub struct Keypair {
    signing_key: SigningKey,
    account_id: String,
}

impl Keypair {
    /// Wraps an existing signing key.
    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let account_id = Address::Account(signing_key.verifying_key().to_bytes()).to_string();
        Self { signing_key, account_id }
    }

    /// Parses an `S…` secret seed.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::InvalidAddress`] if the seed does not decode to
    /// an ed25519 private key. The seed itself is never echoed in the error.
    pub fn from_secret_seed(seed: &str) -> Result<Self> {
        match Strkey::from_string(seed) {
            Ok(Strkey::PrivateKeyEd25519(key)) => {
                Ok(Self::from_signing_key(SigningKey::from_bytes(&key.0)))
            }
            _ => Err(WebAuthError::InvalidAddress {
                address: "<secret seed>".to_owned(),
                reason: "not a valid ed25519 secret seed".to_owned(),
            }),
        }
    }

    /// Returns the `S…` secret seed.
    #[must_use]
    pub fn secret_seed(&self) -> String {
        Strkey::PrivateKeyEd25519(stellar_strkey::ed25519::PrivateKey(self.signing_key.to_bytes()))
            .to_string()
    }

    /// Returns the `G…` account id.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the signature hint.
    #[must_use]
    pub fn hint(&self) -> [u8; 4] {
        hint_of(self.signing_key.verifying_key().as_bytes())
    }

    /// Signs a raw payload.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing_key.sign(payload).to_bytes()
    }

    /// Signs a transaction payload, producing a hinted signature.
    #[instrument(skip(self, payload), fields(account = %self.account_id))]
    #[must_use]
    pub fn sign_decorated(&self, payload: &[u8]) -> DecoratedSignature {
        DecoratedSignature { hint: self.hint(), signature: self.sign(payload).to_vec() }
    }

    /// Signs an authorization entry payload.
    #[instrument(skip(self, payload), fields(account = %self.account_id))]
    #[must_use]
    pub fn sign_entry(&self, payload: &[u8]) -> EntrySignature {
        EntrySignature {
            public_key: self.account_id.clone(),
            signature: self.sign(payload).to_vec(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair").field("account_id", &self.account_id).finish_non_exhaustive()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&self.signing_key.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::verify_with_key;

    fn keypair() -> Keypair {
        Keypair::from_signing_key(SigningKey::from_bytes(&[42u8; 32]))
    }

    #[test]
    fn test_seed_roundtrip() {
        let keypair = keypair();
        let seed = keypair.secret_seed();
        assert!(seed.starts_with('S'));
        let restored = Keypair::from_secret_seed(&seed).unwrap();
        assert_eq!(restored.account_id(), keypair.account_id());
    }

    #[test]
    fn test_account_id_is_not_a_seed() {
        let keypair = keypair();
        let result = Keypair::from_secret_seed(keypair.account_id());
        assert!(matches!(result, Err(WebAuthError::InvalidAddress { .. })));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = keypair();
        let debug = format!("{keypair:?}");
        assert!(debug.contains(keypair.account_id()));
        assert!(!debug.contains(&keypair.secret_seed()));
    }

    #[test]
    fn test_decorated_signature_verifies() {
        let keypair = keypair();
        let signature = keypair.sign_decorated(b"payload");
        assert_eq!(signature.hint, keypair.hint());
        assert!(verify_with_key(&keypair.verifying_key(), b"payload", &signature.signature));
    }

    #[test]
    fn test_entry_signature_names_signer() {
        let keypair = keypair();
        let signature = keypair.sign_entry(b"entry");
        assert_eq!(signature.public_key, keypair.account_id());
        assert_eq!(signature.signature.len(), 64);
    }
}
