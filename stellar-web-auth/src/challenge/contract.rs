//! Validation of authorization-entry challenges.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use super::{
    ACCOUNT_KEY, CLIENT_DOMAIN_ACCOUNT_KEY, CLIENT_DOMAIN_KEY, ChallengeView, NONCE_KEY, Role,
    WEB_AUTH_DOMAIN_ACCOUNT_KEY, check_home_domain, check_network, check_web_auth_domain, classify,
};
use crate::{
    address::verify_by_address,
    codec::ChallengeCodec,
    error::{Result, WebAuthError},
    expectations::Expectations,
    model::AuthorizationEntry,
};

/// Function every challenge entry must invoke.
pub const WEB_AUTH_VERIFY_FN: &str = "web_auth_verify";

/// [`ChallengeView`] over one authorization entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    entry: &'a AuthorizationEntry,
}

impl<'a> EntryView<'a> {
    /// Wraps an entry.
    #[must_use]
    pub const fn new(entry: &'a AuthorizationEntry) -> Self {
        Self { entry }
    }

    fn args(&self) -> Option<&'a BTreeMap<String, String>> {
        self.entry.root_invocation.single_map_arg()
    }
}

impl ChallengeView for EntryView<'_> {
    fn actors(&self) -> Vec<&str> {
        vec![self.entry.credentials.address.as_str()]
    }

    fn argument(&self, name: &str) -> Option<String> {
        self.args().and_then(|args| args.get(name)).cloned()
    }
}

/// [`ChallengeView`] over a whole entry list.
///
/// Arguments are read from the first entry; the validator guarantees they
/// agree across entries before anything relies on that.
#[derive(Debug, Clone, Copy)]
pub struct EntriesView<'a> {
    entries: &'a [AuthorizationEntry],
}

impl<'a> EntriesView<'a> {
    /// Wraps an entry list.
    #[must_use]
    pub const fn new(entries: &'a [AuthorizationEntry]) -> Self {
        Self { entries }
    }
}

impl ChallengeView for EntriesView<'_> {
    fn actors(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.credentials.address.as_str()).collect()
    }

    fn argument(&self, name: &str) -> Option<String> {
        self.entries.first().and_then(|entry| EntryView::new(entry).argument(name))
    }
}

/// Validates an authorization-entry challenge.
///
/// `declared_network` is the passphrase the server sent along with the
/// entries, if any.
///
/// Checks, in order: a non-empty list ([`WebAuthError::InvalidArgs`]); per
/// entry the contract, function, sub-invocations and argument shape; a
/// present, non-empty and shared nonce ([`WebAuthError::InvalidNonce`]);
/// `account`, then `home_domain`, then `web_auth_domain`, then
/// `web_auth_domain_account`, each across all entries; agreement of the
/// client-domain arguments; the server entry and its signature; the client
/// entry; the client-domain entry when one is expected; that no entry
/// belongs to anyone else; and finally the declared network. Exactly one
/// client-domain entry is allowed.
///
/// # Errors
///
/// Returns the error of the first failing check.
#[instrument(skip_all, fields(client = %expectations.client_account, entries = entries.len()))]
pub fn validate_entries_challenge(
    entries: &[AuthorizationEntry],
    declared_network: Option<&str>,
    expectations: &Expectations,
    codec: &dyn ChallengeCodec,
) -> Result<()> {
    if entries.is_empty() {
        return Err(WebAuthError::invalid_args("challenge has no authorization entries"));
    }

    let contract = expectations
        .web_auth_contract
        .as_deref()
        .ok_or_else(|| WebAuthError::Config("no web auth contract configured".to_owned()))?;
    for entry in entries {
        check_invocation_shape(entry, contract)?;
    }

    check_nonce(entries)?;

    check_entry_arguments(entries, expectations)?;
    for key in [CLIENT_DOMAIN_KEY, CLIENT_DOMAIN_ACCOUNT_KEY] {
        check_consistent(entries, key)?;
    }

    check_server_entry(entries, expectations, codec)?;
    check_client_entries(entries, expectations)?;
    check_network(declared_network, expectations)?;

    debug!("authorization entries challenge is valid");
    Ok(())
}

fn check_invocation_shape(entry: &AuthorizationEntry, contract: &str) -> Result<()> {
    let invocation = &entry.root_invocation;
    if invocation.contract_address != contract {
        return Err(WebAuthError::InvalidContractAddress {
            expected: contract.to_owned(),
            actual: invocation.contract_address.clone(),
        });
    }
    if invocation.function_name != WEB_AUTH_VERIFY_FN {
        return Err(WebAuthError::InvalidFunctionName {
            expected: WEB_AUTH_VERIFY_FN,
            actual: invocation.function_name.clone(),
        });
    }
    if !invocation.sub_invocations.is_empty() {
        return Err(WebAuthError::SubInvocationsFound { count: invocation.sub_invocations.len() });
    }
    if invocation.single_map_arg().is_none() {
        return Err(WebAuthError::invalid_args("invocation must take a single key/value map"));
    }
    Ok(())
}

fn check_nonce(entries: &[AuthorizationEntry]) -> Result<()> {
    let mut shared: Option<String> = None;
    for entry in entries {
        let nonce = EntryView::new(entry).argument(NONCE_KEY).unwrap_or_default();
        if nonce.is_empty() {
            return Err(WebAuthError::InvalidNonce {
                reason: format!("entry for '{}' has no nonce", entry.credentials.address),
            });
        }
        match &shared {
            Some(first) if *first != nonce => {
                return Err(WebAuthError::InvalidNonce {
                    reason: "nonce differs between entries".to_owned(),
                });
            }
            Some(_) => {}
            None => shared = Some(nonce),
        }
    }
    Ok(())
}

fn check_entry_arguments(
    entries: &[AuthorizationEntry],
    expectations: &Expectations,
) -> Result<()> {
    let views: Vec<_> = entries.iter().map(EntryView::new).collect();
    for view in &views {
        let account = view.argument(ACCOUNT_KEY).unwrap_or_default();
        if account != expectations.client_account {
            return Err(WebAuthError::InvalidAccount {
                expected: expectations.client_account.clone(),
                actual: account,
            });
        }
    }
    for view in &views {
        check_home_domain(view, expectations)?;
    }
    for view in &views {
        check_web_auth_domain(view, expectations, true)?;
    }
    for view in &views {
        let server = view.argument(WEB_AUTH_DOMAIN_ACCOUNT_KEY).unwrap_or_default();
        if server != expectations.server_signing_key {
            return Err(WebAuthError::invalid_args(format!(
                "web_auth_domain_account '{server}' is not the server signing key"
            )));
        }
    }
    Ok(())
}

fn check_consistent(entries: &[AuthorizationEntry], key: &str) -> Result<()> {
    let mut values = entries.iter().map(|entry| EntryView::new(entry).argument(key));
    let first = values.next().flatten();
    if values.all(|value| value == first) {
        Ok(())
    } else {
        Err(WebAuthError::invalid_args(format!("'{key}' differs between entries")))
    }
}

fn check_server_entry(
    entries: &[AuthorizationEntry],
    expectations: &Expectations,
    codec: &dyn ChallengeCodec,
) -> Result<()> {
    let server_entries: Vec<_> = entries
        .iter()
        .filter(|entry| classify(&entry.credentials.address, expectations) == Role::Server)
        .collect();
    let entry = match server_entries.as_slice() {
        [] => return Err(WebAuthError::MissingServerEntry),
        [entry] => *entry,
        more => {
            return Err(WebAuthError::invalid_args(format!(
                "expected one server entry, found {}",
                more.len()
            )));
        }
    };

    let payload = codec.entry_payload(entry, &expectations.network)?;
    let verified = entry.credentials.signatures.iter().any(|signature| {
        signature.public_key == expectations.server_signing_key
            && verify_by_address(&signature.public_key, &payload, &signature.signature)
    });
    if verified {
        Ok(())
    } else {
        Err(WebAuthError::server_signature("server entry is not signed by the server key"))
    }
}

fn check_client_entries(entries: &[AuthorizationEntry], expectations: &Expectations) -> Result<()> {
    let census = EntriesView::new(entries).census(expectations);
    if census.client == 0 {
        return Err(WebAuthError::MissingClientEntry {
            address: expectations.client_account.clone(),
        });
    }

    if let Some(expected_account) = expectations.client_domain_account.as_deref() {
        match census.client_domain {
            0 => {
                return Err(WebAuthError::MissingClientEntry {
                    address: expected_account.to_owned(),
                });
            }
            1 => {}
            more => {
                return Err(WebAuthError::invalid_args(format!(
                    "expected one client domain entry, found {more}"
                )));
            }
        }
        let view = EntriesView::new(entries);
        if view.argument(CLIENT_DOMAIN_ACCOUNT_KEY).as_deref() != Some(expected_account) {
            return Err(WebAuthError::invalid_args("client_domain_account does not match"));
        }
        if let Some(expected_domain) = expectations.client_domain.as_deref() {
            if view.argument(CLIENT_DOMAIN_KEY).as_deref() != Some(expected_domain) {
                return Err(WebAuthError::invalid_args("client_domain does not match"));
            }
        }
    }

    if census.unknown > 0 {
        return Err(WebAuthError::invalid_args(format!(
            "{} entries belong to unexpected addresses",
            census.unknown
        )));
    }
    Ok(())
}
