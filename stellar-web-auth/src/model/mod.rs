//! In-memory shapes of the two challenge kinds.
//!
//! The account binding exchanges a [`TransactionEnvelope`]; the contract
//! binding exchanges a list of [`AuthorizationEntry`] values. Both are plain
//! data. Turning them into transport strings and signing payloads is the job
//! of a [`ChallengeCodec`](crate::codec::ChallengeCodec).

mod authorization;
mod transaction;

pub use authorization::{AuthorizationEntry, Credentials, EntrySignature, Invocation, InvocationArg};
pub use transaction::{
    DecoratedSignature, Memo, Operation, OperationBody, TimeBounds, Transaction,
    TransactionEnvelope,
};

/// Serde helpers for byte fields carried as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }

    pub(crate) mod option {
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub(crate) fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => super::serialize(bytes, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|encoded| {
                    base64::engine::general_purpose::STANDARD
                        .decode(encoded.as_bytes())
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
