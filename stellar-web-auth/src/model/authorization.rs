use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One signer's authorization of a contract invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    /// Who authorizes, and their signatures.
    pub credentials: Credentials,
    /// The invocation being authorized.
    pub root_invocation: Invocation,
}

/// Address credentials of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Authorizing address (`G…` or `C…`).
    pub address: String,
    /// Replay-protection nonce of the entry.
    pub nonce: i64,
    /// Last ledger at which the signatures are valid.
    pub signature_expiration_ledger: u32,
    /// Signatures over the entry payload.
    #[serde(default)]
    pub signatures: Vec<EntrySignature>,
}

/// A signature on an authorization entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignature {
    /// Signer account (`G…`).
    pub public_key: String,
    /// Raw ed25519 signature.
    #[serde(with = "super::base64_bytes")]
    pub signature: Vec<u8>,
}

/// A contract function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Called contract (`C…`).
    pub contract_address: String,
    /// Called function.
    pub function_name: String,
    /// Call arguments.
    #[serde(default)]
    pub args: Vec<InvocationArg>,
    /// Nested calls authorized along with this one.
    #[serde(default)]
    pub sub_invocations: Vec<Invocation>,
}

impl Invocation {
    /// Returns the argument map when the call has exactly one map argument.
    #[must_use]
    pub fn single_map_arg(&self) -> Option<&BTreeMap<String, String>> {
        match self.args.as_slice() {
            [InvocationArg::Map(map)] => Some(map),
            _ => None,
        }
    }
}

/// A contract call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationArg {
    /// String-keyed map of strings.
    Map(BTreeMap<String, String>),
    /// Anything else.
    Value(serde_json::Value),
}
