use std::fmt;

use serde::{Deserialize, Serialize};

/// A transaction together with the signatures collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    /// The unsigned transaction.
    pub tx: Transaction,
    /// Signatures in the order they were added.
    #[serde(default)]
    pub signatures: Vec<DecoratedSignature>,
}

impl TransactionEnvelope {
    /// Wraps an unsigned transaction.
    #[must_use]
    pub const fn new(tx: Transaction) -> Self {
        Self { tx, signatures: Vec::new() }
    }
}

/// The unsigned part of an account-binding challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Source account (`G…` or `M…`).
    pub source_account: String,
    /// Fee in stroops.
    pub fee: u32,
    /// Sequence number. Challenges always carry 0.
    pub sequence: i64,
    /// Validity window, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_bounds: Option<TimeBounds>,
    /// Attached memo.
    #[serde(default)]
    pub memo: Memo,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
}

/// Inclusive validity window of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    /// Earliest valid time. 0 means unbounded.
    pub min_time: u64,
    /// Latest valid time.
    pub max_time: u64,
}

/// Transaction memo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Memo {
    /// No memo.
    #[default]
    None,
    /// 64-bit id memo.
    Id(u64),
    /// Text memo.
    Text(String),
    /// 32-byte hash memo.
    Hash([u8; 32]),
    /// 32-byte return-hash memo.
    Return([u8; 32]),
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Text(text) => write!(f, "text:{text}"),
            Self::Hash(_) => f.write_str("hash"),
            Self::Return(_) => f.write_str("return"),
        }
    }
}

/// One operation of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Explicit source account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    /// What the operation does.
    pub body: OperationBody,
}

impl Operation {
    /// Builds a key/value write sourced by `source`.
    #[must_use]
    pub fn manage_data(
        source: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            source_account: Some(source.into()),
            body: OperationBody::ManageData { name: name.into(), value: Some(value.into()) },
        }
    }

    /// Returns the key and value of a key/value write.
    #[must_use]
    pub fn as_manage_data(&self) -> Option<(&str, Option<&[u8]>)> {
        match &self.body {
            OperationBody::ManageData { name, value } => Some((name, value.as_deref())),
            OperationBody::Other { .. } => None,
        }
    }
}

/// Operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    /// Writes (or with `None`, deletes) a named data entry.
    ManageData {
        /// Entry key.
        name: String,
        /// Entry value.
        #[serde(default, with = "super::base64_bytes::option")]
        value: Option<Vec<u8>>,
    },
    /// Any other operation kind. Never valid in a challenge.
    Other {
        /// Operation kind as named by the server.
        kind: String,
    },
}

/// A signature tagged with the last four bytes of the signer's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    /// Signer hint.
    pub hint: [u8; 4],
    /// Raw ed25519 signature.
    #[serde(with = "super::base64_bytes")]
    pub signature: Vec<u8>,
}
