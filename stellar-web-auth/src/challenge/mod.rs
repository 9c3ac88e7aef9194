//! Challenge validation.
//!
//! Both bindings ask the same questions of a challenge: who acts in it, and
//! what does it claim about the home domain, the web-auth domain and the
//! client domain. [`ChallengeView`] answers them for either shape so the
//! checks that mean the same thing in both bindings are written once.
//!
//! The binding-specific validators live in [`account`] and [`contract`]. They
//! run their checks in a fixed order and stop at the first failure, so a
//! given bad challenge always yields the same error.

pub mod account;
pub mod contract;

use crate::{
    error::{Result, WebAuthError},
    expectations::Expectations,
    model::TimeBounds,
};

/// Argument key of the home domain.
pub const HOME_DOMAIN_KEY: &str = "home_domain";
/// Argument and operation key of the web-auth domain.
pub const WEB_AUTH_DOMAIN_KEY: &str = "web_auth_domain";
/// Argument and operation key of the client domain.
pub const CLIENT_DOMAIN_KEY: &str = "client_domain";
/// Argument key of the client-domain signing address.
pub const CLIENT_DOMAIN_ACCOUNT_KEY: &str = "client_domain_account";
/// Argument key of the authenticated address.
pub const ACCOUNT_KEY: &str = "account";
/// Argument key of the server signing address.
pub const WEB_AUTH_DOMAIN_ACCOUNT_KEY: &str = "web_auth_domain_account";
/// Argument key of the challenge nonce.
pub const NONCE_KEY: &str = "nonce";

/// Part an address plays in a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The authentication server.
    Server,
    /// The address being authenticated.
    Client,
    /// The client domain attesting the client.
    ClientDomain,
    /// Nobody the client expects.
    Unknown,
}

/// Classifies an address against the expectation set.
#[must_use]
pub fn classify(address: &str, expectations: &Expectations) -> Role {
    if address == expectations.server_signing_key {
        Role::Server
    } else if address == expectations.client_account {
        Role::Client
    } else if expectations.client_domain_account.as_deref() == Some(address) {
        Role::ClientDomain
    } else {
        Role::Unknown
    }
}

/// Number of actors per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCensus {
    /// Server actors.
    pub server: usize,
    /// Client actors.
    pub client: usize,
    /// Client-domain actors.
    pub client_domain: usize,
    /// Unexpected actors.
    pub unknown: usize,
}

/// Read access to a challenge, independent of its shape.
pub trait ChallengeView {
    /// Addresses acting in the challenge, in challenge order.
    fn actors(&self) -> Vec<&str>;

    /// The value the challenge carries for a named argument, if any.
    fn argument(&self, name: &str) -> Option<String>;

    /// Counts actors per role.
    fn census(&self, expectations: &Expectations) -> RoleCensus {
        self.actors().into_iter().fold(RoleCensus::default(), |mut census, actor| {
            match classify(actor, expectations) {
                Role::Server => census.server += 1,
                Role::Client => census.client += 1,
                Role::ClientDomain => census.client_domain += 1,
                Role::Unknown => census.unknown += 1,
            }
            census
        })
    }
}

/// Checks the claimed home domain.
///
/// # Errors
///
/// Returns [`WebAuthError::InvalidHomeDomain`] unless the claim equals the
/// expected home domain exactly. A missing claim compares as empty.
pub fn check_home_domain(view: &impl ChallengeView, expectations: &Expectations) -> Result<()> {
    let actual = view.argument(HOME_DOMAIN_KEY).unwrap_or_default();
    if actual == expectations.home_domain {
        Ok(())
    } else {
        Err(WebAuthError::InvalidHomeDomain { expected: expectations.home_domain.clone(), actual })
    }
}

/// Checks the claimed web-auth domain, port included.
///
/// When `required` is false an absent claim passes.
///
/// # Errors
///
/// Returns [`WebAuthError::InvalidWebAuthDomain`] on any mismatch.
pub fn check_web_auth_domain(
    view: &impl ChallengeView,
    expectations: &Expectations,
    required: bool,
) -> Result<()> {
    match view.argument(WEB_AUTH_DOMAIN_KEY) {
        Some(actual) if actual == expectations.web_auth_domain => Ok(()),
        None if !required => Ok(()),
        actual => Err(WebAuthError::InvalidWebAuthDomain {
            expected: expectations.web_auth_domain.clone(),
            actual: actual.unwrap_or_default(),
        }),
    }
}

/// Checks a validity window against the current time.
///
/// A missing window, or one whose upper bound is 0, is treated as expired.
///
/// # Errors
///
/// Returns [`WebAuthError::Expired`] unless
/// `min_time - grace <= now <= max_time + grace`.
pub fn check_time_bounds(bounds: Option<TimeBounds>, now: u64, grace_secs: u64) -> Result<()> {
    let Some(bounds) = bounds else {
        return Err(WebAuthError::Expired { now, min_time: None, max_time: None });
    };
    let not_before = bounds.min_time.saturating_sub(grace_secs);
    let not_after = bounds.max_time.saturating_add(grace_secs);
    if bounds.max_time == 0 || now < not_before || now > not_after {
        return Err(WebAuthError::Expired {
            now,
            min_time: Some(bounds.min_time),
            max_time: Some(bounds.max_time),
        });
    }
    Ok(())
}

/// Checks the network passphrase the server declared, if it declared one.
///
/// # Errors
///
/// Returns [`WebAuthError::InvalidNetworkPassphrase`] on mismatch.
pub fn check_network(declared: Option<&str>, expectations: &Expectations) -> Result<()> {
    match declared {
        Some(actual) if actual != expectations.network.passphrase() => {
            Err(WebAuthError::InvalidNetworkPassphrase {
                expected: expectations.network.passphrase().to_owned(),
                actual: actual.to_owned(),
            })
        }
        _ => Ok(()),
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> Result<u64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| WebAuthError::Crypto(format!("system time error: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::network::Network;

    pub(crate) fn expectations() -> Expectations {
        Expectations {
            server_signing_key: "GSERVER".into(),
            home_domain: "example.com".into(),
            web_auth_domain: "auth.example.com:8443".into(),
            client_account: "GCLIENT".into(),
            client_domain: None,
            client_domain_account: None,
            network: Network::testnet(),
            memo: None,
            web_auth_contract: None,
            grace_secs: 0,
        }
    }

    struct MapView {
        actors: Vec<&'static str>,
        args: BTreeMap<&'static str, &'static str>,
    }

    impl ChallengeView for MapView {
        fn actors(&self) -> Vec<&str> {
            self.actors.clone()
        }

        fn argument(&self, name: &str) -> Option<String> {
            self.args.get(name).map(|v| (*v).to_owned())
        }
    }

    #[test]
    fn test_classify() {
        let mut expectations = expectations();
        expectations.client_domain_account = Some("GDOMAIN".into());
        assert_eq!(classify("GSERVER", &expectations), Role::Server);
        assert_eq!(classify("GCLIENT", &expectations), Role::Client);
        assert_eq!(classify("GDOMAIN", &expectations), Role::ClientDomain);
        assert_eq!(classify("GOTHER", &expectations), Role::Unknown);
    }

    #[test]
    fn test_census() {
        let view = MapView { actors: vec!["GCLIENT", "GSERVER", "GOTHER"], args: BTreeMap::new() };
        let census = view.census(&expectations());
        assert_eq!(census, RoleCensus { server: 1, client: 1, client_domain: 0, unknown: 1 });
    }

    #[test]
    fn test_web_auth_domain_port_matters() {
        let view = MapView {
            actors: Vec::new(),
            args: BTreeMap::from([(WEB_AUTH_DOMAIN_KEY, "auth.example.com")]),
        };
        let result = check_web_auth_domain(&view, &expectations(), false);
        assert!(matches!(result, Err(WebAuthError::InvalidWebAuthDomain { .. })));
    }

    #[test]
    fn test_web_auth_domain_optional_when_absent() {
        let view = MapView { actors: Vec::new(), args: BTreeMap::new() };
        assert!(check_web_auth_domain(&view, &expectations(), false).is_ok());
        assert!(check_web_auth_domain(&view, &expectations(), true).is_err());
    }

    #[test]
    fn test_home_domain_is_case_sensitive() {
        let args = BTreeMap::from([(HOME_DOMAIN_KEY, "Example.com")]);
        let view = MapView { actors: Vec::new(), args };
        let result = check_home_domain(&view, &expectations());
        assert!(matches!(result, Err(WebAuthError::InvalidHomeDomain { .. })));
    }

    #[test]
    fn test_time_bounds() {
        let bounds = Some(TimeBounds { min_time: 100, max_time: 200 });
        assert!(check_time_bounds(bounds, 150, 0).is_ok());
        assert!(check_time_bounds(bounds, 100, 0).is_ok());
        assert!(check_time_bounds(bounds, 200, 0).is_ok());
        assert!(check_time_bounds(bounds, 201, 0).is_err());
        assert!(check_time_bounds(bounds, 99, 0).is_err());
        assert!(check_time_bounds(bounds, 205, 10).is_ok());
        assert!(check_time_bounds(bounds, 95, 10).is_ok());
    }

    #[test]
    fn test_check_network() {
        let expectations = expectations();
        assert!(check_network(None, &expectations).is_ok());
        assert!(check_network(Some(crate::network::TESTNET_PASSPHRASE), &expectations).is_ok());
        assert!(matches!(
            check_network(Some(crate::network::PUBLIC_PASSPHRASE), &expectations),
            Err(WebAuthError::InvalidNetworkPassphrase { .. })
        ));
    }

    #[test]
    fn test_time_bounds_fail_closed() {
        assert!(matches!(
            check_time_bounds(None, 150, 0),
            Err(WebAuthError::Expired { min_time: None, max_time: None, .. })
        ));
        let unbounded = Some(TimeBounds { min_time: 0, max_time: 0 });
        assert!(check_time_bounds(unbounded, 150, 0).is_err());
    }
}
