//! Security controls for authentication attempts.
//!
//! # Audit Logging
//!
//! The audit module records security-relevant outcomes (rejected challenges,
//! delegate tampering, issued and rejected tokens) as structured events:
//!
//! ```rust
//! use stellar_web_auth::security::audit::{AuditEvent, AuditEventType};
//! use uuid::Uuid;
//!
//! let event = AuditEvent::new(AuditEventType::ChallengeRejected, "GCLIENTACCOUNT", Uuid::new_v4())
//!     .with_home_domain("example.com")
//!     .with_error("invalid web auth domain");
//!
//! stellar_web_auth::security::audit::audit_log(&event);
//! ```
//!
//! # Security Considerations
//!
//! - Audit logs use a separate tracing target for easy filtering
//! - Addresses are shortened to their first and last four characters
//! - Secret seeds and bearer tokens are stripped from error messages
//! - A per-attempt correlation id links events of one authentication

pub mod audit;

pub use audit::{
    AuditDetails, AuditEvent, AuditEventType, audit_log, redact_address, redact_sensitive,
};
