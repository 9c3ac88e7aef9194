//! Shared fixtures: a mock authentication server that issues real
//! challenges and checks the signatures it gets back.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use serde_json::{Value, json};
use stellar_web_auth::{
    address::Address,
    codec::{ChallengeCodec, JsonCodec},
    config::WebAuthConfig,
    keys::Keypair,
    model::{
        AuthorizationEntry, Credentials, Invocation, InvocationArg, Memo, Operation, TimeBounds,
        Transaction, TransactionEnvelope,
    },
    network::{Network, TESTNET_PASSPHRASE},
};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

pub const HOME_DOMAIN: &str = "example.com";
pub const ACCOUNT_PATH: &str = "/auth";
pub const CONTRACT_PATH: &str = "/contracts";

pub fn key(byte: u8) -> Keypair {
    Keypair::from_signing_key(SigningKey::from_bytes(&[byte; 32]))
}

pub fn contract_address(byte: u8) -> String {
    Address::Contract([byte; 32]).to_string()
}

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Unsigned JWT with the given subject, valid for an hour.
pub fn jwt(subject: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
    let claims = json!({
        "iss": "https://example.com/auth",
        "sub": subject,
        "iat": now(),
        "exp": now() + 3600,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// A running mock authentication server.
pub struct Anchor {
    pub server: MockServer,
    pub signing: Keypair,
    pub contract: String,
}

impl Anchor {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            signing: key(200),
            contract: contract_address(201),
        }
    }

    /// `host:port` of the mock server, which is also its web-auth domain.
    pub fn web_auth_domain(&self) -> String {
        self.server.address().to_string()
    }

    pub fn config_toml(&self) -> String {
        format!(
            r#"
            home_domain = "{HOME_DOMAIN}"
            server_signing_key = "{}"
            network_passphrase = "{TESTNET_PASSPHRASE}"
            web_auth_endpoint = "{}{ACCOUNT_PATH}"
            web_auth_for_contracts_endpoint = "{}{CONTRACT_PATH}"
            web_auth_contract_id = "{}"

            [http]
            allow_http = true
            timeout_secs = 5
            "#,
            self.signing.account_id(),
            self.server.uri(),
            self.server.uri(),
            self.contract,
        )
    }

    pub fn config(&self) -> WebAuthConfig {
        WebAuthConfig::from_toml(&self.config_toml()).unwrap()
    }

    /// A valid transaction challenge for `client`, unsigned.
    pub fn transaction(&self, client: &str) -> Transaction {
        Transaction {
            source_account: self.signing.account_id().to_owned(),
            fee: 200,
            sequence: 0,
            time_bounds: Some(TimeBounds { min_time: now() - 5, max_time: now() + 900 }),
            memo: Memo::None,
            operations: vec![
                Operation::manage_data(
                    client,
                    format!("{HOME_DOMAIN} auth"),
                    b"bm9uY2Utbm9uY2Utbm9uY2U=".to_vec(),
                ),
                Operation::manage_data(
                    self.signing.account_id(),
                    "web_auth_domain",
                    self.web_auth_domain().into_bytes(),
                ),
            ],
        }
    }

    /// Signs `tx` as the server and encodes it.
    pub fn sign_transaction(&self, tx: Transaction) -> String {
        let payload = JsonCodec.transaction_payload(&tx, &Network::testnet()).unwrap();
        let mut envelope = TransactionEnvelope::new(tx);
        envelope.signatures.push(self.signing.sign_decorated(&payload));
        JsonCodec.encode_envelope(&envelope).unwrap()
    }

    /// Arguments of a valid entry challenge for `client`.
    pub fn args(&self, client: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("account".to_owned(), client.to_owned()),
            ("home_domain".to_owned(), HOME_DOMAIN.to_owned()),
            ("web_auth_domain".to_owned(), self.web_auth_domain()),
            ("web_auth_domain_account".to_owned(), self.signing.account_id().to_owned()),
            ("nonce".to_owned(), "3f1c9a".to_owned()),
        ])
    }

    pub fn entry(&self, address: &str, args: BTreeMap<String, String>) -> AuthorizationEntry {
        AuthorizationEntry {
            credentials: Credentials {
                address: address.to_owned(),
                nonce: 7,
                signature_expiration_ledger: 500,
                signatures: Vec::new(),
            },
            root_invocation: Invocation {
                contract_address: self.contract.clone(),
                function_name: "web_auth_verify".to_owned(),
                args: vec![InvocationArg::Map(args)],
                sub_invocations: Vec::new(),
            },
        }
    }

    /// A server entry signed by the server.
    pub fn server_entry(&self, args: BTreeMap<String, String>) -> AuthorizationEntry {
        let mut entry = self.entry(self.signing.account_id(), args);
        let payload = JsonCodec.entry_payload(&entry, &Network::testnet()).unwrap();
        entry.credentials.signatures.push(self.signing.sign_entry(&payload));
        entry
    }

    pub async fn serve_transaction(&self, encoded: String) {
        Mock::given(method("GET"))
            .and(path(ACCOUNT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction": encoded,
                "network_passphrase": TESTNET_PASSPHRASE,
            })))
            .mount(&self.server)
            .await;
    }

    /// Serves a valid, server-signed challenge for `client`.
    pub async fn serve_challenge_for(&self, client: &str) {
        self.serve_transaction(self.sign_transaction(self.transaction(client))).await;
    }

    pub async fn serve_entries(&self, entries: &[AuthorizationEntry]) {
        Mock::given(method("GET"))
            .and(path(CONTRACT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_entries": JsonCodec.encode_entries(entries).unwrap(),
                "network_passphrase": TESTNET_PASSPHRASE,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn issue_token(&self, path_: &str, responder: impl Respond + 'static) {
        Mock::given(method("POST"))
            .and(path(path_))
            .respond_with(responder)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Fails the test on drop if anything is submitted to `path_`.
    pub async fn forbid_submission(&self, path_: &str) {
        Mock::given(method("POST"))
            .and(path(path_))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }
}

/// Reads the challenge field from a JSON or form body.
fn submitted(request: &Request, field: &str) -> Option<String> {
    if let Ok(body) = serde_json::from_slice::<Value>(&request.body) {
        return body.get(field).and_then(Value::as_str).map(str::to_owned);
    }
    url::form_urlencoded::parse(&request.body)
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.into_owned())
}

fn reject(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({ "error": message }))
}

fn verifies(key: &VerifyingKey, payload: &[u8], signature: &[u8]) -> bool {
    Signature::from_slice(signature).is_ok_and(|signature| key.verify(payload, &signature).is_ok())
}

/// Issues a token when the submitted transaction carries exactly the
/// expected signatures, in order. `None` accepts any 64-byte signature.
pub struct TransactionIssuer {
    pub expected: Vec<Option<VerifyingKey>>,
    pub token: String,
}

impl Respond for TransactionIssuer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(encoded) = submitted(request, "transaction") else {
            return reject("missing transaction");
        };
        let Ok(envelope) = JsonCodec.decode_envelope(&encoded) else {
            return reject("undecodable transaction");
        };
        let payload = JsonCodec.transaction_payload(&envelope.tx, &Network::testnet()).unwrap();
        if envelope.signatures.len() != self.expected.len() {
            return reject("wrong number of signatures");
        }
        for (signature, expected) in envelope.signatures.iter().zip(&self.expected) {
            let ok = match expected {
                Some(key) => verifies(key, &payload, &signature.signature),
                None => signature.signature.len() == 64,
            };
            if !ok {
                return reject("signature does not verify");
            }
        }
        ResponseTemplate::new(200).set_body_json(json!({ "token": self.token }))
    }
}

/// Issues a token when every client entry is signed by `signers` and
/// carries `expiration_ledger`.
pub struct EntriesIssuer {
    pub client: String,
    pub signers: Vec<VerifyingKey>,
    pub expiration_ledger: u32,
    pub token: String,
}

impl Respond for EntriesIssuer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(encoded) = submitted(request, "authorization_entries") else {
            return reject("missing authorization_entries");
        };
        let Ok(entries) = JsonCodec.decode_entries(&encoded) else {
            return reject("undecodable entries");
        };
        for entry in entries.iter().filter(|entry| entry.credentials.address == self.client) {
            if entry.credentials.signature_expiration_ledger != self.expiration_ledger {
                return reject("wrong expiration ledger");
            }
            let payload = JsonCodec.entry_payload(entry, &Network::testnet()).unwrap();
            let signatures = &entry.credentials.signatures;
            if signatures.len() != self.signers.len() {
                return reject("wrong number of signatures");
            }
            for (signature, key) in signatures.iter().zip(&self.signers) {
                if !verifies(key, &payload, &signature.signature) {
                    return reject("signature does not verify");
                }
            }
        }
        ResponseTemplate::new(200).set_body_json(json!({ "token": self.token }))
    }
}
