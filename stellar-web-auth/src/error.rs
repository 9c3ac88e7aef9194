//! Error types for web authentication.
//!
//! Every failure an authentication attempt can hit maps to exactly one
//! [`WebAuthError`] variant. Variants carry the expected and actual values of
//! the check that failed so callers can render an actionable message without
//! parsing strings.
//!
//! # Error Strata
//!
//! - **Caller input** ([`WebAuthError::EmptySigners`],
//!   [`WebAuthError::ConflictingSigningMethod`], ...): detected before any
//!   network call. Fix the input.
//! - **Configuration** ([`WebAuthError::MissingServiceField`],
//!   [`WebAuthError::Config`]): the service metadata or local config is
//!   incomplete.
//! - **Protocol** (every challenge check, tampering, missing signatures):
//!   fatal for the attempt. Each one corresponds to a real attack or a server
//!   misconfiguration and is never downgraded.
//! - **Transport** ([`WebAuthError::Timeout`], [`WebAuthError::UnknownResponse`],
//!   ...): the caller may start a fresh attempt with a new challenge.
//! - **Delegate** ([`WebAuthError::Delegate`]): whatever the signing delegate
//!   raised, passed through untouched.
//!
//! Nothing in this crate retries on its own.
//!
//! # Examples
//!
//! ```
//! use stellar_web_auth::error::{ErrorStratum, WebAuthError};
//!
//! let err = WebAuthError::InvalidHomeDomain {
//!     expected: "good.com".to_owned(),
//!     actual: "evil.com".to_owned(),
//! };
//! assert_eq!(err.stratum(), ErrorStratum::Protocol);
//! assert!(err.to_string().contains("evil.com"));
//! ```

use thiserror::Error;

/// Boxed error returned by caller-supplied extension points.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for web authentication operations.
pub type Result<T> = std::result::Result<T, WebAuthError>;

/// Coarse classification of a [`WebAuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStratum {
    /// Bad arguments, detected before any network call.
    CallerInput,
    /// Missing or invalid configuration or service metadata.
    Configuration,
    /// The challenge or a signing step violated the protocol.
    Protocol,
    /// The network exchange failed or the server answered unexpectedly.
    Transport,
    /// The signing delegate failed.
    Delegate,
}

/// Errors that can occur during a web authentication attempt.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum WebAuthError {
    /// No signers were supplied for the account binding.
    #[error("at least one signer is required")]
    EmptySigners,

    /// Both a local client-domain key and a signing delegate were supplied.
    #[error("client domain signing key and signing delegate are mutually exclusive")]
    ConflictingSigningMethod,

    /// A client domain was requested without any way to sign for it.
    #[error("client domain '{client_domain}' requires a signing key or a signing delegate")]
    MissingClientDomainSigner {
        /// The requested client domain.
        client_domain: String,
    },

    /// An address or secret seed could not be parsed or has the wrong kind.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The offending input.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A memo was requested for a muxed client account.
    #[error("a memo cannot be used together with muxed account '{account}'")]
    MemoWithMuxedAccount {
        /// The muxed client account.
        account: String,
    },

    /// Service metadata is missing a field this binding needs.
    #[error("service metadata for '{domain}' has no {field}")]
    MissingServiceField {
        /// Domain whose metadata was read.
        domain: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// Local configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The challenge does not have the required shape.
    #[error("malformed challenge: {reason}")]
    Structural {
        /// Which structural rule was broken.
        reason: String,
    },

    /// The challenge memo does not match the requested memo.
    #[error("invalid challenge memo: expected {expected:?}, got {actual}")]
    InvalidMemo {
        /// Memo id the caller asked for, if any.
        expected: Option<u64>,
        /// Memo found on the challenge.
        actual: String,
    },

    /// The challenge time bounds are absent or do not include the current time.
    #[error("challenge is not valid at {now} (min_time {min_time:?}, max_time {max_time:?})")]
    Expired {
        /// Current unix time in seconds.
        now: u64,
        /// Lower bound on the challenge, if present.
        min_time: Option<u64>,
        /// Upper bound on the challenge, if present.
        max_time: Option<u64>,
    },

    /// The challenge names a different home domain.
    #[error("invalid home domain: expected '{expected}', got '{actual}'")]
    InvalidHomeDomain {
        /// Home domain the client authenticates to.
        expected: String,
        /// Home domain found on the challenge.
        actual: String,
    },

    /// The challenge names a different web-auth domain.
    #[error("invalid web auth domain: expected '{expected}', got '{actual}'")]
    InvalidWebAuthDomain {
        /// Host and port serving the auth endpoint.
        expected: String,
        /// Web-auth domain found on the challenge.
        actual: String,
    },

    /// A client-domain attestation was expected but the challenge has none.
    #[error("challenge has no client domain operation for account '{expected_account}'")]
    MissingClientDomain {
        /// Expected client-domain signing address.
        expected_account: String,
    },

    /// The server signature is missing, duplicated or does not verify.
    #[error("invalid server signature: {reason}")]
    InvalidServerSignature {
        /// Which part of the server signature check failed.
        reason: String,
    },

    /// An authorization entry targets a different contract.
    #[error("invalid contract address: expected '{expected}', got '{actual}'")]
    InvalidContractAddress {
        /// Web-auth contract address.
        expected: String,
        /// Contract address found on the entry.
        actual: String,
    },

    /// An authorization entry invokes a different function.
    #[error("invalid function name: expected '{expected}', got '{actual}'")]
    InvalidFunctionName {
        /// Required function name.
        expected: &'static str,
        /// Function name found on the entry.
        actual: String,
    },

    /// An authorization entry carries sub-invocations.
    #[error("authorization entry has {count} sub-invocations, expected none")]
    SubInvocationsFound {
        /// Number of sub-invocations found.
        count: usize,
    },

    /// The nonce argument is missing, empty or inconsistent across entries.
    #[error("invalid nonce: {reason}")]
    InvalidNonce {
        /// Which nonce rule was broken.
        reason: String,
    },

    /// The `account` argument does not name the client.
    #[error("invalid account: expected '{expected}', got '{actual}'")]
    InvalidAccount {
        /// Client address.
        expected: String,
        /// Account argument found on the entry.
        actual: String,
    },

    /// The invocation arguments are missing, inconsistent or wrong.
    #[error("invalid invocation arguments: {reason}")]
    InvalidArgs {
        /// Which argument rule was broken.
        reason: String,
    },

    /// No authorization entry is credentialed by the server.
    #[error("challenge has no server authorization entry")]
    MissingServerEntry,

    /// No authorization entry is credentialed by the given address.
    #[error("challenge has no authorization entry for '{address}'")]
    MissingClientEntry {
        /// Address that needed an entry.
        address: String,
    },

    /// The server issued the challenge for another network.
    #[error("invalid network passphrase: expected '{expected}', got '{actual}'")]
    InvalidNetworkPassphrase {
        /// Configured network passphrase.
        expected: String,
        /// Passphrase declared by the server.
        actual: String,
    },

    /// The signing delegate changed the unsigned part of the challenge.
    #[error("signing delegate modified the challenge: {detail}")]
    TransactionModified {
        /// What changed.
        detail: String,
    },

    /// The signing delegate returned no new valid signature.
    #[error("signing delegate did not add a new signature")]
    NoNewSignature,

    /// The signing delegate failed. The delegate's own error is passed through.
    #[error(transparent)]
    Delegate(BoxError),

    /// Requesting the challenge failed.
    #[error("challenge request failed (status {status:?}): {message}")]
    ChallengeRequest {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Server or transport message.
        message: String,
    },

    /// The server rejected the signed challenge.
    #[error("token submission rejected with status {status}: {message}")]
    TokenSubmission {
        /// HTTP status code.
        status: u16,
        /// The server's `error` message.
        message: String,
    },

    /// The server answered with a body or status this client does not understand.
    #[error("unknown response with status {status}: {body}")]
    UnknownResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body (lossy UTF-8).
        body: String,
    },

    /// The request timed out.
    #[error("{operation} timed out")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
    },

    /// HTTP client failure outside the cases above.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Encoding or decoding a challenge failed.
    #[error("challenge codec failed: {0}")]
    Codec(String),

    /// A low-level cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

impl WebAuthError {
    /// Returns the stratum this error belongs to.
    pub const fn stratum(&self) -> ErrorStratum {
        match self {
            Self::EmptySigners
            | Self::ConflictingSigningMethod
            | Self::MissingClientDomainSigner { .. }
            | Self::InvalidAddress { .. }
            | Self::MemoWithMuxedAccount { .. } => ErrorStratum::CallerInput,
            Self::MissingServiceField { .. } | Self::Config(_) => ErrorStratum::Configuration,
            Self::ChallengeRequest { .. }
            | Self::TokenSubmission { .. }
            | Self::UnknownResponse { .. }
            | Self::Timeout { .. }
            | Self::Http(_) => ErrorStratum::Transport,
            Self::Delegate(_) => ErrorStratum::Delegate,
            _ => ErrorStratum::Protocol,
        }
    }

    /// Returns `true` if starting a fresh attempt could succeed.
    ///
    /// Only transport failures qualify. A protocol failure will repeat until
    /// the server or the configuration changes.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.stratum(), ErrorStratum::Transport)
    }

    pub(crate) fn structural(reason: impl Into<String>) -> Self {
        Self::Structural { reason: reason.into() }
    }

    pub(crate) fn invalid_args(reason: impl Into<String>) -> Self {
        Self::InvalidArgs { reason: reason.into() }
    }

    pub(crate) fn server_signature(reason: impl Into<String>) -> Self {
        Self::InvalidServerSignature { reason: reason.into() }
    }

    pub(crate) fn modified(detail: impl Into<String>) -> Self {
        Self::TransactionModified { detail: detail.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WebAuthError::InvalidWebAuthDomain {
            expected: "a.com:8080".into(),
            actual: "a.com".into(),
        };
        assert_eq!(
            error.to_string(),
            "invalid web auth domain: expected 'a.com:8080', got 'a.com'"
        );
    }

    #[test]
    fn test_caller_input_stratum() {
        assert_eq!(WebAuthError::EmptySigners.stratum(), ErrorStratum::CallerInput);
        assert_eq!(WebAuthError::ConflictingSigningMethod.stratum(), ErrorStratum::CallerInput);
        assert!(!WebAuthError::EmptySigners.is_transient());
    }

    #[test]
    fn test_protocol_stratum() {
        assert_eq!(WebAuthError::MissingServerEntry.stratum(), ErrorStratum::Protocol);
        assert_eq!(WebAuthError::NoNewSignature.stratum(), ErrorStratum::Protocol);
        assert_eq!(WebAuthError::modified("payload").stratum(), ErrorStratum::Protocol);
    }

    #[test]
    fn test_transport_stratum_is_transient() {
        let error = WebAuthError::Timeout { operation: "token submission" };
        assert_eq!(error.stratum(), ErrorStratum::Transport);
        assert!(error.is_transient());
        assert_eq!(error.to_string(), "token submission timed out");
    }

    #[test]
    fn test_delegate_error_is_transparent() {
        let inner: BoxError = "hsm unavailable".into();
        let error = WebAuthError::Delegate(inner);
        assert_eq!(error.stratum(), ErrorStratum::Delegate);
        assert_eq!(error.to_string(), "hsm unavailable");
    }

    #[test]
    fn test_missing_service_field() {
        let error = WebAuthError::MissingServiceField {
            domain: "example.com".into(),
            field: "WEB_AUTH_ENDPOINT",
        };
        assert_eq!(error.stratum(), ErrorStratum::Configuration);
        assert!(error.to_string().contains("WEB_AUTH_ENDPOINT"));
    }
}
