//! Addresses that can authenticate: classic accounts, muxed accounts and
//! contracts, in their strkey text form (`G…`, `M…`, `C…`).

use std::{fmt, str::FromStr};

use ed25519_dalek::{Signature, VerifyingKey};
use signature::Verifier;
use stellar_strkey::{Contract, Strkey, ed25519};

use crate::error::{Result, WebAuthError};

/// A parsed address.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::address::Address;
///
/// let address: Address = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"
///     .parse()
///     .unwrap();
/// assert!(address.is_account());
/// assert_eq!(
///     address.to_string(),
///     "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Keypair-controlled account (`G…`).
    Account([u8; 32]),
    /// Account multiplexed with a 64-bit id (`M…`).
    MuxedAccount {
        /// Underlying ed25519 public key.
        ed25519: [u8; 32],
        /// Multiplexing id.
        id: u64,
    },
    /// Contract-controlled address (`C…`).
    Contract([u8; 32]),
}

impl Address {
    /// Parses a strkey address.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::InvalidAddress`] if the string is not a valid
    /// account, muxed account or contract strkey.
    pub fn parse(s: &str) -> Result<Self> {
        let strkey = Strkey::from_string(s).map_err(|e| WebAuthError::InvalidAddress {
            address: s.to_owned(),
            reason: format!("{e:?}"),
        })?;

        match strkey {
            Strkey::PublicKeyEd25519(key) => Ok(Self::Account(key.0)),
            Strkey::MuxedAccountEd25519(muxed) => {
                Ok(Self::MuxedAccount { ed25519: muxed.ed25519, id: muxed.id })
            }
            Strkey::Contract(contract) => Ok(Self::Contract(contract.0)),
            _ => Err(WebAuthError::InvalidAddress {
                address: s.to_owned(),
                reason: "not an account, muxed account or contract address".to_owned(),
            }),
        }
    }

    /// Returns `true` for plain `G…` accounts.
    #[must_use]
    pub const fn is_account(&self) -> bool {
        matches!(self, Self::Account(_))
    }

    /// Returns `true` for `M…` muxed accounts.
    #[must_use]
    pub const fn is_muxed(&self) -> bool {
        matches!(self, Self::MuxedAccount { .. })
    }

    /// Returns `true` for `C…` contract addresses.
    #[must_use]
    pub const fn is_contract(&self) -> bool {
        matches!(self, Self::Contract(_))
    }

    /// Returns the ed25519 key behind an account or muxed account.
    #[must_use]
    pub const fn ed25519(&self) -> Option<&[u8; 32]> {
        match self {
            Self::Account(key) | Self::MuxedAccount { ed25519: key, .. } => Some(key),
            Self::Contract(_) => None,
        }
    }

    /// Returns the ed25519 verifying key of an account.
    ///
    /// # Errors
    ///
    /// Returns [`WebAuthError::InvalidAddress`] for contracts and for bytes
    /// that are not a valid curve point.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = self.ed25519().ok_or_else(|| WebAuthError::InvalidAddress {
            address: self.to_string(),
            reason: "contract addresses have no signing key".to_owned(),
        })?;
        VerifyingKey::from_bytes(bytes).map_err(|e| WebAuthError::InvalidAddress {
            address: self.to_string(),
            reason: format!("not a valid ed25519 key: {e}"),
        })
    }

    /// Returns the four-byte signature hint (last bytes of the public key).
    #[must_use]
    pub fn signature_hint(&self) -> Option<[u8; 4]> {
        self.ed25519().map(|key| hint_of(key))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = match *self {
            Self::Account(key) => Strkey::PublicKeyEd25519(ed25519::PublicKey(key)).to_string(),
            Self::MuxedAccount { ed25519, id } => {
                Strkey::MuxedAccountEd25519(ed25519::MuxedAccount { ed25519, id }).to_string()
            }
            Self::Contract(hash) => Strkey::Contract(Contract(hash)).to_string(),
        };
        f.write_str(&encoded)
    }
}

impl FromStr for Address {
    type Err = WebAuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Signature hint of a raw ed25519 public key.
pub(crate) fn hint_of(key: &[u8; 32]) -> [u8; 4] {
    [key[28], key[29], key[30], key[31]]
}

/// Verifies an ed25519 signature made by the key behind `address`.
///
/// Returns `false` for anything that cannot verify, including contract
/// addresses and signatures that are not 64 bytes long.
pub(crate) fn verify_by_address(address: &str, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = Address::parse(address).and_then(|a| a.verifying_key()) else {
        return false;
    };
    verify_with_key(&key, payload, signature)
}

/// Verifies an ed25519 signature against a known key.
pub(crate) fn verify_with_key(key: &VerifyingKey, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    key.verify(payload, &Signature::from_bytes(&bytes)).is_ok()
}
