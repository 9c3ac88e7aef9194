//! Audit logging for security-relevant events.
//!
//! Every authentication attempt gets a correlation id. Challenge rejections,
//! delegate tampering and token outcomes are logged against it under the
//! `audit` tracing target, with addresses shortened and secrets stripped.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of auditable events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// A challenge was requested from the server.
    ChallengeRequested,
    /// A challenge failed validation.
    ChallengeRejected,
    /// A challenge was validated and signed.
    ChallengeSigned,
    /// A signing delegate returned a modified challenge.
    DelegateTamperingDetected,
    /// The server issued a token.
    TokenIssued,
    /// The server rejected the signed challenge.
    TokenRejected,
}

/// Details for audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AuditDetails {
    /// Auth endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Home domain authenticated to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_domain: Option<String>,
    /// Attesting client domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_domain: Option<String>,
    /// Error message, with secrets redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the attempt so far in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::security::audit::{AuditEvent, AuditEventType};
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(
///     AuditEventType::ChallengeRequested,
///     "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7",
///     Uuid::new_v4(),
/// )
/// .with_endpoint("https://auth.example.com/auth");
///
/// assert_eq!(event.account, "GAAZ…CWN7");
/// stellar_web_auth::security::audit::audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: SystemTime,
    /// What happened.
    pub event_type: AuditEventType,
    /// Authenticating account, redacted.
    pub account: String,
    /// Correlation id of the authentication attempt.
    pub attempt_id: Uuid,
    /// Contextual information.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event. The account is redacted on the way in.
    #[must_use]
    pub fn new(event_type: AuditEventType, account: &str, attempt_id: Uuid) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            account: redact_address(account),
            attempt_id,
            details: AuditDetails::default(),
        }
    }

    /// Adds the auth endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.details.endpoint = Some(endpoint.into());
        self
    }

    /// Adds the home domain.
    #[must_use]
    pub fn with_home_domain(mut self, home_domain: impl Into<String>) -> Self {
        self.details.home_domain = Some(home_domain.into());
        self
    }

    /// Adds the client domain.
    #[must_use]
    pub fn with_client_domain(mut self, client_domain: impl Into<String>) -> Self {
        self.details.client_domain = Some(client_domain.into());
        self
    }

    /// Adds an error message, stripping secret seeds and tokens from it.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.details.error = Some(redact_sensitive(&error.into()));
        self
    }

    /// Adds the elapsed time.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duration in ms fits u64 for practical values"
    )]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Logs audit event to tracing with target "audit".
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        account = %event.account,
        attempt_id = %event.attempt_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Shortens an address to its first and last four characters.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::security::audit::redact_address;
///
/// assert_eq!(
///     redact_address("GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"),
///     "GAAZ…CWN7"
/// );
/// assert_eq!(redact_address("short"), "short");
/// ```
#[must_use]
pub fn redact_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_owned();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Removes secret seeds and bearer tokens from free text.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::security::audit::redact_sensitive;
///
/// let msg = "bad seed SBGWSG6BTNCKCOB3DIFBGCVMUPQFYPA2G4O34RMTB343OYPXU5DJDVMN.";
/// let redacted = redact_sensitive(msg);
/// assert_eq!(redacted, "bad seed S[REDACTED].");
/// ```
#[must_use]
pub fn redact_sensitive(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut word = String::new();
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            word.push(ch);
        } else {
            push_redacted(&mut result, &word);
            word.clear();
            result.push(ch);
        }
    }
    push_redacted(&mut result, &word);
    result
}

fn push_redacted(out: &mut String, word: &str) {
    let core = word.trim_end_matches('.');
    let trailing = &word[core.len()..];
    if is_secret_seed(core) {
        out.push_str("S[REDACTED]");
    } else if is_token(core) {
        out.push_str("[REDACTED TOKEN]");
    } else {
        out.push_str(core);
    }
    out.push_str(trailing);
}

fn is_secret_seed(word: &str) -> bool {
    word.len() == 56
        && word.starts_with('S')
        && word.bytes().all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}

fn is_token(word: &str) -> bool {
    word.starts_with("eyJ") && word.matches('.').count() == 2
}

/// Convenience macro for audit logging.
///
/// # Examples
///
/// ```
/// use stellar_web_auth::{audit, security::audit::AuditEventType};
/// use uuid::Uuid;
///
/// audit!(AuditEventType::TokenIssued, "GCLIENTACCOUNT", Uuid::new_v4());
///
/// audit!(
///     AuditEventType::ChallengeRejected,
///     "GCLIENTACCOUNT",
///     Uuid::new_v4(),
///     with_home_domain("example.com"),
///     with_error("invalid home domain")
/// );
/// ```
#[macro_export]
macro_rules! audit {
    ($event_type:expr, $account:expr, $attempt_id:expr) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $account, $attempt_id)
        )
    };
    ($event_type:expr, $account:expr, $attempt_id:expr, $($method:ident($arg:expr)),+ $(,)?) => {
        $crate::security::audit::audit_log(
            &$crate::security::audit::AuditEvent::new($event_type, $account, $attempt_id)
                $(.$method($arg))+
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "SBGWSG6BTNCKCOB3DIFBGCVMUPQFYPA2G4O34RMTB343OYPXU5DJDVMN";

    #[test]
    fn test_redact_seed() {
        let redacted = redact_sensitive(&format!("failed to load {SEED}"));
        assert_eq!(redacted, "failed to load S[REDACTED]");
    }

    #[test]
    fn test_redact_token() {
        let redacted = redact_sensitive("token eyJhbGciOiJFZERTQSJ9.eyJzdWIiOiJHIn0.c2ln rejected");
        assert_eq!(redacted, "token [REDACTED TOKEN] rejected");
    }

    #[test]
    fn test_redact_sensitive_preserves_safe_data() {
        let msg = "invalid home domain: expected 'example.com', got 'evil.com'";
        assert_eq!(redact_sensitive(msg), msg);
        assert_eq!(redact_sensitive(""), "");
    }

    #[test]
    fn test_public_account_is_not_treated_as_seed() {
        let account = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7";
        assert_eq!(redact_sensitive(account), account);
    }

    #[test]
    fn test_redact_address_multibyte_safe() {
        assert_eq!(redact_address("ééééééééé"), "éééé…éééé");
    }

    #[test]
    fn test_audit_event_builder() {
        let attempt_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditEventType::ChallengeSigned, "GCLIENT1234567", attempt_id)
            .with_endpoint("https://auth.example.com")
            .with_home_domain("example.com")
            .with_client_domain("wallet.com")
            .with_duration(Duration::from_millis(1500));

        assert_eq!(event.account, "GCLI…4567");
        assert_eq!(event.attempt_id, attempt_id);
        assert_eq!(event.details.home_domain.as_deref(), Some("example.com"));
        assert_eq!(event.details.client_domain.as_deref(), Some("wallet.com"));
        assert_eq!(event.details.duration_ms, Some(1500));
    }

    #[test]
    fn test_audit_event_with_error() {
        let event = AuditEvent::new(AuditEventType::TokenRejected, "GCLIENT", Uuid::new_v4())
            .with_error(format!("seed {SEED} leaked"));
        let error = event.details.error.unwrap();
        assert!(!error.contains(SEED));
    }

    #[test]
    fn test_audit_event_serialization() {
        let event =
            AuditEvent::new(AuditEventType::DelegateTamperingDetected, "GCLIENT", Uuid::new_v4())
                .with_endpoint("https://auth.example.com");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("delegate_tampering_detected"));
        assert!(json.contains("auth.example.com"));
        assert!(!json.contains("home_domain"));
    }
}
