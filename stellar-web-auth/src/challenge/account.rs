//! Validation of transaction challenges.
//!
//! A valid challenge is a zero-sequence transaction from the server whose
//! first operation is a key/value write by the client under the key
//! `"<home_domain> auth"`, optionally followed by server-sourced writes
//! (`web_auth_domain`, ...) and a `client_domain` write sourced by the client
//! domain, bounded in time and signed exactly once, by the server.

use tracing::{debug, instrument};

use super::{
    CLIENT_DOMAIN_ACCOUNT_KEY, CLIENT_DOMAIN_KEY, ChallengeView, HOME_DOMAIN_KEY, Role,
    WEB_AUTH_DOMAIN_ACCOUNT_KEY, WEB_AUTH_DOMAIN_KEY, check_home_domain, check_time_bounds,
    check_web_auth_domain, classify,
};
use crate::{
    address::{Address, verify_by_address},
    codec::ChallengeCodec,
    error::{Result, WebAuthError},
    expectations::Expectations,
    model::{Memo, Operation, Transaction, TransactionEnvelope},
};

const HOME_DOMAIN_SUFFIX: &str = " auth";

/// [`ChallengeView`] over a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionView<'a> {
    tx: &'a Transaction,
}

impl<'a> TransactionView<'a> {
    /// Wraps a transaction.
    #[must_use]
    pub const fn new(tx: &'a Transaction) -> Self {
        Self { tx }
    }

    fn operation(&self, key: &str) -> Option<&'a Operation> {
        self.tx
            .operations
            .iter()
            .find(|op| op.as_manage_data().is_some_and(|(name, _)| name == key))
    }

    fn value_of(op: &Operation) -> Option<String> {
        op.as_manage_data()
            .and_then(|(_, value)| value)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl ChallengeView for TransactionView<'_> {
    fn actors(&self) -> Vec<&str> {
        self.tx.operations.iter().filter_map(|op| op.source_account.as_deref()).collect()
    }

    fn argument(&self, name: &str) -> Option<String> {
        let first = self.tx.operations.first();
        match name {
            HOME_DOMAIN_KEY => first.and_then(Operation::as_manage_data).map(|(key, _)| {
                key.strip_suffix(HOME_DOMAIN_SUFFIX).unwrap_or(key).to_owned()
            }),
            super::ACCOUNT_KEY => first.and_then(|op| op.source_account.clone()),
            super::NONCE_KEY => first.and_then(Self::value_of),
            WEB_AUTH_DOMAIN_ACCOUNT_KEY => {
                self.operation(WEB_AUTH_DOMAIN_KEY).and_then(|op| op.source_account.clone())
            }
            CLIENT_DOMAIN_ACCOUNT_KEY => {
                self.operation(CLIENT_DOMAIN_KEY).and_then(|op| op.source_account.clone())
            }
            key => self.operation(key).and_then(Self::value_of),
        }
    }
}

/// Validates a transaction challenge at the current time.
///
/// # Errors
///
/// Returns the error of the first failing check. See
/// [`validate_transaction_challenge_at`].
pub fn validate_transaction_challenge(
    envelope: &TransactionEnvelope,
    expectations: &Expectations,
    codec: &dyn ChallengeCodec,
) -> Result<()> {
    validate_transaction_challenge_at(envelope, expectations, codec, super::unix_now()?)
}

/// Validates a transaction challenge at a given unix time.
///
/// Checks, in order:
///
/// 1. source is the server and sequence is 0 ([`WebAuthError::Structural`]);
/// 2. operations: at least one, all key/value writes with a source; the first
///    by the client under `"<home_domain> auth"`
///    ([`WebAuthError::InvalidHomeDomain`]) with a non-empty value; the rest
///    by the server unless keyed `client_domain`; then the memo
///    ([`WebAuthError::InvalidMemo`]);
/// 3. time bounds ([`WebAuthError::Expired`]);
/// 4. the `web_auth_domain` write, if any
///    ([`WebAuthError::InvalidWebAuthDomain`]);
/// 5. the `client_domain` write, when a client-domain account is expected
///    ([`WebAuthError::MissingClientDomain`]);
/// 6. exactly one signature, by the server
///    ([`WebAuthError::InvalidServerSignature`]).
///
/// # Errors
///
/// Returns the error of the first failing check.
#[instrument(skip_all, fields(client = %expectations.client_account, now))]
pub fn validate_transaction_challenge_at(
    envelope: &TransactionEnvelope,
    expectations: &Expectations,
    codec: &dyn ChallengeCodec,
    now: u64,
) -> Result<()> {
    let tx = &envelope.tx;
    let view = TransactionView::new(tx);

    check_source_and_sequence(tx, expectations)?;
    check_operations(&view, tx, expectations)?;
    check_memo(tx, expectations)?;
    check_time_bounds(tx.time_bounds, now, expectations.grace_secs)?;
    let web_auth_domain_op = view.operation(WEB_AUTH_DOMAIN_KEY);
    check_web_auth_domain(&view, expectations, web_auth_domain_op.is_some())?;
    if let Some(op) = web_auth_domain_op {
        if op.source_account.as_deref() != Some(expectations.server_signing_key.as_str()) {
            return Err(WebAuthError::structural(
                "web_auth_domain operation is not sourced by the server",
            ));
        }
    }
    check_client_domain(&view, expectations)?;
    check_server_signature(envelope, expectations, codec)?;

    debug!(operations = tx.operations.len(), "transaction challenge is valid");
    Ok(())
}

fn check_source_and_sequence(tx: &Transaction, expectations: &Expectations) -> Result<()> {
    if tx.source_account != expectations.server_signing_key {
        return Err(WebAuthError::structural(format!(
            "transaction source '{}' is not the server account",
            tx.source_account
        )));
    }
    if tx.sequence != 0 {
        return Err(WebAuthError::structural(format!(
            "transaction sequence must be 0, got {}",
            tx.sequence
        )));
    }
    Ok(())
}

fn check_operations(
    view: &TransactionView<'_>,
    tx: &Transaction,
    expectations: &Expectations,
) -> Result<()> {
    let Some(first) = tx.operations.first() else {
        return Err(WebAuthError::structural("transaction has no operations"));
    };

    for (index, op) in tx.operations.iter().enumerate() {
        if op.as_manage_data().is_none() {
            return Err(WebAuthError::structural(format!(
                "operation {index} is not a key/value write"
            )));
        }
        if op.source_account.is_none() {
            return Err(WebAuthError::structural(format!(
                "operation {index} has no source account"
            )));
        }
    }

    if first.source_account.as_deref() != Some(expectations.client_account.as_str()) {
        return Err(WebAuthError::structural(
            "first operation is not sourced by the client account",
        ));
    }
    check_home_domain(view, expectations)?;
    if let Some((name, _)) = first.as_manage_data() {
        if !name.ends_with(HOME_DOMAIN_SUFFIX) {
            return Err(WebAuthError::InvalidHomeDomain {
                expected: expectations.home_domain.clone(),
                actual: name.to_owned(),
            });
        }
    }
    if view.argument(super::NONCE_KEY).is_none_or(|nonce| nonce.is_empty()) {
        return Err(WebAuthError::structural("first operation has an empty value"));
    }

    for (index, op) in tx.operations.iter().enumerate().skip(1) {
        let source = op.source_account.as_deref().unwrap_or_default();
        let is_client_domain =
            op.as_manage_data().is_some_and(|(name, _)| name == CLIENT_DOMAIN_KEY);
        if !is_client_domain && classify(source, expectations) != Role::Server {
            return Err(WebAuthError::structural(format!(
                "operation {index} is not sourced by the server account"
            )));
        }
    }
    Ok(())
}

fn check_memo(tx: &Transaction, expectations: &Expectations) -> Result<()> {
    let client_is_muxed = Address::parse(&expectations.client_account).is_ok_and(|a| a.is_muxed());
    let valid = match (&tx.memo, expectations.memo) {
        (Memo::None, None) => true,
        (Memo::Id(actual), Some(expected)) => *actual == expected && !client_is_muxed,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(WebAuthError::InvalidMemo { expected: expectations.memo, actual: tx.memo.to_string() })
    }
}

fn check_client_domain(view: &TransactionView<'_>, expectations: &Expectations) -> Result<()> {
    let Some(expected_account) = expectations.client_domain_account.as_deref() else {
        return Ok(());
    };
    match view.argument(CLIENT_DOMAIN_ACCOUNT_KEY) {
        Some(actual) if actual == expected_account => Ok(()),
        _ => Err(WebAuthError::MissingClientDomain {
            expected_account: expected_account.to_owned(),
        }),
    }
}

fn check_server_signature(
    envelope: &TransactionEnvelope,
    expectations: &Expectations,
    codec: &dyn ChallengeCodec,
) -> Result<()> {
    let [signature] = envelope.signatures.as_slice() else {
        return Err(WebAuthError::server_signature(format!(
            "expected exactly one signature, found {}",
            envelope.signatures.len()
        )));
    };
    let payload = codec.transaction_payload(&envelope.tx, &expectations.network)?;
    if verify_by_address(&expectations.server_signing_key, &payload, &signature.signature) {
        Ok(())
    } else {
        Err(WebAuthError::server_signature("signature does not verify against the server key"))
    }
}
