//! End-to-end tests of contract authentication against a mock server.

mod common;

use std::collections::BTreeMap;

use common::{Anchor, CONTRACT_PATH, EntriesIssuer, contract_address, jwt, key};
use serde_json::json;
use stellar_web_auth::{
    AuthOptions, ContractWebAuth, WebAuthConfig, WebAuthError,
    codec::{ChallengeCodec, JsonCodec},
    network::{Network, PUBLIC_PASSPHRASE},
    rpc::EXPIRATION_LEDGER_OFFSET,
};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_partial_json, method, path, query_param},
};

fn with_client_domain(
    mut args: BTreeMap<String, String>,
    account: &str,
) -> BTreeMap<String, String> {
    args.insert("client_domain".to_owned(), "wallet.example.com".to_owned());
    args.insert("client_domain_account".to_owned(), account.to_owned());
    args
}

#[tokio::test]
async fn test_authenticate_returns_server_token() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let signer = key(1);
    let token = jwt(&client);

    let args = anchor.args(&client);
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: client.clone(),
                signers: vec![signer.verifying_key()],
                expiration_ledger: 500,
                token: token.clone(),
            },
        )
        .await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let issued = auth.authenticate(&client, &[signer], &AuthOptions::default()).await.unwrap();

    assert_eq!(issued.as_str(), token);
    assert_eq!(issued.claims().account, client);
}

#[tokio::test]
async fn test_contract_without_signers() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);

    let args = anchor.args(&client);
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: client.clone(),
                signers: Vec::new(),
                expiration_ledger: 500,
                token: jwt(&client),
            },
        )
        .await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    assert!(auth.authenticate(&client, &[], &AuthOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_missing_server_entry() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);

    anchor.serve_entries(&[anchor.entry(&client, anchor.args(&client))]).await;
    anchor.forbid_submission(CONTRACT_PATH).await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let result = auth.authenticate(&client, &[key(1)], &AuthOptions::default()).await;
    assert!(matches!(result, Err(WebAuthError::MissingServerEntry)));
}

#[tokio::test]
async fn test_evil_home_domain() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);

    let mut args = anchor.args(&client);
    args.insert("home_domain".to_owned(), "evil.com".to_owned());
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor.forbid_submission(CONTRACT_PATH).await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let result = auth.authenticate(&client, &[key(1)], &AuthOptions::default()).await;
    assert!(matches!(
        result,
        Err(WebAuthError::InvalidHomeDomain { ref actual, .. }) if actual == "evil.com"
    ));
}

#[tokio::test]
async fn test_wrong_contract_is_rejected() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);

    let args = anchor.args(&client);
    let mut entries = vec![anchor.server_entry(args.clone()), anchor.entry(&client, args)];
    entries[1].root_invocation.contract_address = contract_address(9);
    anchor.serve_entries(&entries).await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let result = auth.authenticate(&client, &[key(1)], &AuthOptions::default()).await;
    assert!(matches!(result, Err(WebAuthError::InvalidContractAddress { .. })));
}

#[tokio::test]
async fn test_foreign_network_is_rejected() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);

    let args = anchor.args(&client);
    let entries = [anchor.server_entry(args.clone()), anchor.entry(&client, args)];
    Mock::given(method("GET"))
        .and(path(CONTRACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorization_entries": JsonCodec.encode_entries(&entries).unwrap(),
            "network_passphrase": PUBLIC_PASSPHRASE,
        })))
        .mount(&anchor.server)
        .await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let result = auth.authenticate(&client, &[key(1)], &AuthOptions::default()).await;
    assert!(matches!(result, Err(WebAuthError::InvalidNetworkPassphrase { .. })));
}

#[tokio::test]
async fn test_caller_expiration_ledger() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let signer = key(1);

    let args = anchor.args(&client);
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: client.clone(),
                signers: vec![signer.verifying_key()],
                expiration_ledger: 9_000,
                token: jwt(&client),
            },
        )
        .await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let options =
        AuthOptions { signature_expiration_ledger: Some(9_000), ..AuthOptions::default() };
    assert!(auth.authenticate(&client, &[signer], &options).await.is_ok());
}

#[tokio::test]
async fn test_expiration_ledger_from_rpc() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let signer = key(1);

    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "getLatestLedger"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"id": "ab12", "protocolVersion": 22, "sequence": 1_200},
        })))
        .expect(1)
        .mount(&anchor.server)
        .await;

    let args = anchor.args(&client);
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: client.clone(),
                signers: vec![signer.verifying_key()],
                expiration_ledger: 1_200 + EXPIRATION_LEDGER_OFFSET,
                token: jwt(&client),
            },
        )
        .await;

    let toml =
        format!("soroban_rpc_url = \"{}/rpc\"\n{}", anchor.server.uri(), anchor.config_toml());
    let auth = ContractWebAuth::new(&WebAuthConfig::from_toml(&toml).unwrap()).unwrap();
    assert!(auth.authenticate(&client, &[signer], &AuthOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_client_domain_key_signs_its_entry() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let signer = key(1);
    let domain = key(50);

    let args = with_client_domain(anchor.args(&client), domain.account_id());
    let entries = [
        anchor.server_entry(args.clone()),
        anchor.entry(&client, args.clone()),
        anchor.entry(domain.account_id(), args),
    ];
    Mock::given(method("GET"))
        .and(path(CONTRACT_PATH))
        .and(query_param("client_domain", "wallet.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorization_entries": JsonCodec.encode_entries(&entries).unwrap(),
        })))
        .mount(&anchor.server)
        .await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: domain.account_id().to_owned(),
                signers: vec![domain.verifying_key()],
                expiration_ledger: 500,
                token: jwt(&client),
            },
        )
        .await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let options = AuthOptions {
        client_domain: Some("wallet.example.com".into()),
        client_domain_key: Some(domain.clone()),
        ..AuthOptions::default()
    };
    assert!(auth.authenticate(&client, &[signer], &options).await.is_ok());
}

#[tokio::test]
async fn test_missing_client_domain_entry() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let domain = key(50);

    let args = with_client_domain(anchor.args(&client), domain.account_id());
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor.forbid_submission(CONTRACT_PATH).await;

    let auth = ContractWebAuth::new(&anchor.config()).unwrap();
    let options = AuthOptions {
        client_domain: Some("wallet.example.com".into()),
        client_domain_key: Some(domain.clone()),
        ..AuthOptions::default()
    };
    let result = auth.authenticate(&client, &[key(1)], &options).await;
    assert!(matches!(
        result,
        Err(WebAuthError::MissingClientEntry { ref address }) if address == domain.account_id()
    ));
}

#[tokio::test]
async fn test_caller_errors_precede_network() {
    let anchor = Anchor::start().await;
    let auth = ContractWebAuth::new(&anchor.config()).unwrap();

    let account = key(1);
    let result =
        auth.authenticate(account.account_id(), &[account.clone()], &AuthOptions::default()).await;
    assert!(matches!(result, Err(WebAuthError::InvalidAddress { .. })));

    let options = AuthOptions { memo: Some(3), ..AuthOptions::default() };
    let result = auth.authenticate(&contract_address(5), &[], &options).await;
    assert!(matches!(result, Err(WebAuthError::Config(_))));

    assert!(anchor.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_from_domain() {
    let anchor = Anchor::start().await;
    let client = contract_address(5);
    let domain = anchor.web_auth_domain();

    Mock::given(method("GET"))
        .and(path("/.well-known/stellar.toml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "WEB_AUTH_FOR_CONTRACTS_ENDPOINT = \"{}{CONTRACT_PATH}\"\n\
             WEB_AUTH_CONTRACT_ID = \"{}\"\n\
             SIGNING_KEY = \"{}\"\n",
            anchor.server.uri(),
            anchor.contract,
            anchor.signing.account_id()
        )))
        .mount(&anchor.server)
        .await;

    let mut args = anchor.args(&client);
    args.insert("home_domain".to_owned(), domain.clone());
    anchor.serve_entries(&[anchor.server_entry(args.clone()), anchor.entry(&client, args)]).await;
    anchor
        .issue_token(
            CONTRACT_PATH,
            EntriesIssuer {
                client: client.clone(),
                signers: Vec::new(),
                expiration_ledger: 500,
                token: jwt(&client),
            },
        )
        .await;

    let http = stellar_web_auth::transport::HttpConfig { allow_http: true, ..Default::default() };
    let auth = ContractWebAuth::from_domain(&domain, &Network::testnet(), http).await.unwrap();
    assert_eq!(auth.contract(), anchor.contract);
    assert!(auth.authenticate(&client, &[], &AuthOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_from_domain_without_contract_id() {
    let anchor = Anchor::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/stellar.toml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "WEB_AUTH_FOR_CONTRACTS_ENDPOINT = \"{}{CONTRACT_PATH}\"\nSIGNING_KEY = \"{}\"\n",
            anchor.server.uri(),
            anchor.signing.account_id()
        )))
        .mount(&anchor.server)
        .await;

    let http = stellar_web_auth::transport::HttpConfig { allow_http: true, ..Default::default() };
    let result =
        ContractWebAuth::from_domain(&anchor.web_auth_domain(), &Network::testnet(), http).await;
    assert!(matches!(
        result,
        Err(WebAuthError::MissingServiceField { field: "WEB_AUTH_CONTRACT_ID", .. })
    ));
}
