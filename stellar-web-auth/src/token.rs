//! Bearer tokens issued by the authentication server.
//!
//! The token is a [RFC 7519](https://www.rfc-editor.org/rfc/rfc7519.html) JWT
//! signed by the server. This crate never verifies it: by the time a token
//! arrives, the server has already made its trust decision, and the token is
//! only ever sent back to that server. Claims are decoded for convenience.
//!
//! # Claims
//!
//! - `iss`: issuer (the auth endpoint)
//! - `sub`: authenticated account, `G…`, `M…` or `C…`
//! - `iat`: issued-at timestamp (Unix time)
//! - `exp`: expiration timestamp (Unix time)
//! - `client_domain`: attesting client domain, when one signed
//!
//! # Leniency
//!
//! Parsing never fails. A token that is not three dot-separated parts, whose
//! payload is not base64url JSON, or whose claims have the wrong types keeps
//! its raw string and decodes the unreadable claims to empty strings and
//! zeros. A zero expiry counts as expired.
//!
//! # Examples
//!
//! ```
//! use stellar_web_auth::token::BearerToken;
//!
//! let token = BearerToken::parse("not-a-jwt");
//! assert_eq!(token.as_str(), "not-a-jwt");
//! assert_eq!(token.claims().expires_at, 0);
//! assert!(token.is_expired());
//! ```

use std::{fmt, time::SystemTime};

use base64::Engine;
use serde::Serialize;
use serde_json::Value;

/// Claims decoded from a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    /// `iss`, or empty.
    pub issuer: String,
    /// `sub`, or empty.
    pub account: String,
    /// `iat`, or 0.
    pub issued_at: i64,
    /// `exp`, or 0.
    pub expires_at: i64,
    /// `client_domain`, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_domain: Option<String>,
}

/// A bearer token and its decoded claims.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    raw: String,
    claims: TokenClaims,
}

impl BearerToken {
    /// Parses a token. Never fails; see the module docs.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let claims = decode_claims(&raw).unwrap_or_default();
        Self { raw, claims }
    }

    /// The token exactly as the server sent it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Consumes the token, returning the raw string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.raw
    }

    /// Decoded claims.
    #[must_use]
    pub const fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Value for an `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.raw)
    }

    /// Returns `true` if the token is expired now.
    ///
    /// A clock before the Unix epoch counts as expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .is_none_or(|now| self.is_expired_at(now))
    }

    /// Returns `true` if the token is expired at `now` (Unix seconds).
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.claims.expires_at <= 0 || self.claims.expires_at <= now
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("raw", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

fn decode_claims(raw: &str) -> Option<TokenClaims> {
    let mut parts = raw.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let Value::Object(map) = serde_json::from_slice::<Value>(&bytes).ok()? else {
        return None;
    };

    let text = |key: &str| map.get(key).and_then(Value::as_str).unwrap_or_default().to_owned();
    let number = |key: &str| map.get(key).and_then(Value::as_i64).unwrap_or_default();
    Some(TokenClaims {
        issuer: text("iss"),
        account: text("sub"),
        issued_at: number("iat"),
        expires_at: number("exp"),
        client_domain: map.get("client_domain").and_then(Value::as_str).map(str::to_owned),
    })
}
