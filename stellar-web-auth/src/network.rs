//! Network identifiers.
//!
//! Signatures are made over payloads that embed the SHA-256 of the network
//! passphrase, so a challenge signed for one network never verifies on
//! another.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Passphrase of the public network.
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// Passphrase of the test network.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Passphrase of the future network.
pub const FUTURENET_PASSPHRASE: &str = "Test SDF Future Network ; October 2022";

/// A network, identified by its passphrase.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::network::Network;
///
/// let testnet = Network::testnet();
/// assert_eq!(testnet.passphrase(), "Test SDF Network ; September 2015");
/// assert_ne!(testnet.id(), Network::public().id());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network {
    passphrase: String,
}

impl Network {
    /// Creates a network from an arbitrary passphrase.
    #[must_use]
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self { passphrase: passphrase.into() }
    }

    /// The public network.
    #[must_use]
    pub fn public() -> Self {
        Self::new(PUBLIC_PASSPHRASE)
    }

    /// The test network.
    #[must_use]
    pub fn testnet() -> Self {
        Self::new(TESTNET_PASSPHRASE)
    }

    /// The future network.
    #[must_use]
    pub fn futurenet() -> Self {
        Self::new(FUTURENET_PASSPHRASE)
    }

    /// Returns the passphrase.
    #[must_use]
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Returns the network id, the SHA-256 of the passphrase.
    #[must_use]
    pub fn id(&self) -> [u8; 32] {
        Sha256::digest(self.passphrase.as_bytes()).into()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.passphrase)
    }
}
