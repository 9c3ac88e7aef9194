//! Stellar Web Authentication: challenge-response login for Stellar addresses
//!
//! A client proves control of an address to an authentication server by
//! signing a server-issued challenge, and receives a bearer token in return.
//! Two bindings are supported:
//!
//! - **Accounts** (`G…`, `M…`): the challenge is a transaction whose
//!   key/value operations carry the home domain, a nonce, the web-auth domain
//!   and optionally a client domain ([SEP-10]).
//! - **Contracts** (`C…`): the challenge is a list of authorization entries
//!   invoking `web_auth_verify` on the server's web-auth contract ([SEP-45]).
//!
//! Before signing anything the client checks the challenge against what it
//! expects: who issued it, for which domains, on which network, and for how
//! long. A challenge that fails any check is rejected with a distinct error.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► auth::{WebAuth, ContractWebAuth}
//!               │
//!               ├─ exchange ──────► transport (reqwest) ──► auth server
//!               ├─ challenge ─────► codec (payloads, encoding)
//!               ├─ signing ───────► keys / SigningDelegate
//!               └─ token
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stellar_web_auth::{
//!     auth::{AuthOptions, WebAuth},
//!     config::WebAuthConfig,
//!     keys::Keypair,
//! };
//!
//! # async fn example() -> stellar_web_auth::error::Result<()> {
//! let config = WebAuthConfig::from_toml(
//!     r#"
//!     home_domain = "example.com"
//!     server_signing_key = "GAAZI4TCR3TY5OJHCTJC2A4QSY6CJWJH5IAJTGKIN2ER7LBNVKOCCWN7"
//!     network_passphrase = "Test SDF Network ; September 2015"
//!     web_auth_endpoint = "https://auth.example.com/auth"
//!     "#,
//! )?;
//! let auth = WebAuth::new(&config)?;
//!
//! let keypair = Keypair::from_secret_seed(&std::env::var("CLIENT_SECRET").unwrap_or_default())?;
//! let token = auth
//!     .authenticate(keypair.account_id(), &[keypair.clone()], &AuthOptions::default())
//!     .await?;
//!
//! println!("Authorization: {}", token.authorization_header());
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`]: the two clients and their options
//! - [`challenge`]: challenge validation for both bindings
//! - [`signing`]: signing orchestration and the [`SigningDelegate`] seam
//! - [`codec`]: challenge encoding and signing payloads
//! - [`exchange`]: challenge and token HTTP round trips
//! - [`token`]: lenient bearer token parsing
//! - [`discovery`]: `stellar.toml` lookups
//! - [`rpc`]: Soroban RPC, for signature expiration ledgers
//! - [`config`], [`transport`]: configuration and HTTP plumbing
//! - [`security`]: audit logging
//! - [`error`]: the error taxonomy
//!
//! # Security Considerations
//!
//! - **HTTPS only**: plain HTTP and loopback endpoints are refused unless
//!   `allow_http` is set
//! - **No silent retries**: a failed check ends the attempt; a new attempt
//!   needs a new challenge
//! - **Delegates are untrusted**: whatever a [`SigningDelegate`] returns is
//!   decoded and compared with what it was given
//! - **Secrets stay out of logs**: keys never implement a revealing `Debug`,
//!   and audit events redact addresses, seeds and tokens
//!
//! [SEP-10]: https://github.com/stellar/stellar-protocol/blob/master/ecosystem/sep-0010.md
//! [SEP-45]: https://github.com/stellar/stellar-protocol/blob/master/ecosystem/sep-0045.md

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and wiremock"
)]

pub mod address;
pub mod auth;
pub mod challenge;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod expectations;
pub mod keys;
pub mod model;
pub mod network;
pub mod rpc;
pub mod security;
pub mod signing;
pub mod token;
pub mod transport;

pub use auth::{AuthOptions, ContractWebAuth, WebAuth};
pub use config::WebAuthConfig;
pub use error::{Result, WebAuthError};
pub use signing::SigningDelegate;
pub use token::BearerToken;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_clients_are_shareable_across_tasks() {
        assert_send_sync::<WebAuth>();
        assert_send_sync::<ContractWebAuth>();
        assert_send_sync::<AuthOptions>();
        assert_send_sync::<WebAuthError>();
    }
}
