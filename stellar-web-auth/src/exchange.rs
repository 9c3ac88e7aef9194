//! The two HTTP round trips of an authentication attempt.
//!
//! `GET <endpoint>` fetches a challenge; `POST <endpoint>` submits the signed
//! challenge and returns a token. Each response status and body shape maps to
//! exactly one outcome:
//!
//! | Response | Outcome |
//! |---|---|
//! | 2xx with the challenge field | challenge |
//! | 2xx with `token` | [`BearerToken`] |
//! | 504, or no response in time | [`WebAuthError::Timeout`] |
//! | other non-2xx with `error` | [`WebAuthError::TokenSubmission`] |
//! | anything else | [`WebAuthError::UnknownResponse`] |
//!
//! Challenge GET failures surface as [`WebAuthError::ChallengeRequest`].

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    error::{Result, WebAuthError},
    token::BearerToken,
    transport::{HttpTransport, RequestBody, RequestContext, TransportResponse},
};

const GATEWAY_TIMEOUT: u16 = 504;

/// Which challenge shape is exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// A signed transaction (`transaction` field).
    Transaction,
    /// A list of authorization entries (`authorization_entries` field).
    AuthorizationEntries,
}

impl ChallengeKind {
    /// JSON field carrying the challenge in both directions.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::AuthorizationEntries => "authorization_entries",
        }
    }
}

/// Encoding of the token request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    /// `application/json`.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
}

/// Query parameters of a challenge request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeQuery {
    /// Address to authenticate.
    pub account: String,
    /// Memo id for a shared account.
    pub memo: Option<u64>,
    /// Home domain to authenticate to.
    pub home_domain: Option<String>,
    /// Client domain asked to attest.
    pub client_domain: Option<String>,
}

/// A challenge as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    /// Encoded challenge.
    pub challenge: String,
    /// Network passphrase the server declared, if any.
    pub network_passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChallengeResponse {
    transaction: Option<String>,
    authorization_entries: Option<String>,
    network_passphrase: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    token: Option<String>,
    error: Option<String>,
}

/// Requests a challenge.
///
/// # Errors
///
/// Returns [`WebAuthError::Timeout`] on timeout or 504,
/// [`WebAuthError::ChallengeRequest`] for any other failure to obtain the
/// challenge field, and [`WebAuthError::Config`] for a forbidden URL or header.
#[instrument(skip(transport, headers), fields(endpoint = %endpoint, account = %query.account))]
pub async fn request_challenge(
    transport: &HttpTransport,
    endpoint: &Url,
    kind: ChallengeKind,
    query: &ChallengeQuery,
    headers: &[(String, String)],
) -> Result<ChallengeResponse> {
    let memo = query.memo.map(|memo| memo.to_string());
    let mut params: Vec<(&str, &str)> = vec![("account", query.account.as_str())];
    if let Some(memo) = memo.as_deref() {
        params.push(("memo", memo));
    }
    if let Some(home_domain) = query.home_domain.as_deref() {
        params.push(("home_domain", home_domain));
    }
    if let Some(client_domain) = query.client_domain.as_deref() {
        params.push(("client_domain", client_domain));
    }

    let ctx = RequestContext { url: endpoint, headers, operation: "challenge request" };
    let response = match transport.get(ctx, &params).await {
        Ok(response) => response,
        Err(WebAuthError::Http(e)) => {
            return Err(WebAuthError::ChallengeRequest { status: None, message: e.to_string() });
        }
        Err(e) => return Err(e),
    };

    parse_challenge_response(&response, kind)
}

fn parse_challenge_response(
    response: &TransportResponse,
    kind: ChallengeKind,
) -> Result<ChallengeResponse> {
    if response.status == GATEWAY_TIMEOUT {
        return Err(WebAuthError::Timeout { operation: "challenge request" });
    }

    let raw: Option<RawChallengeResponse> = response.json().ok();
    if !response.is_success() {
        let message = raw.and_then(|raw| raw.error).unwrap_or_else(|| response.text());
        return Err(WebAuthError::ChallengeRequest { status: Some(response.status), message });
    }

    let raw = raw.ok_or_else(|| WebAuthError::ChallengeRequest {
        status: Some(response.status),
        message: "response is not a JSON object".to_owned(),
    })?;
    let challenge = match kind {
        ChallengeKind::Transaction => raw.transaction,
        ChallengeKind::AuthorizationEntries => raw.authorization_entries,
    };
    let challenge =
        challenge.filter(|c| !c.is_empty()).ok_or_else(|| WebAuthError::ChallengeRequest {
            status: Some(response.status),
            message: format!("response has no '{}' field", kind.field()),
        })?;

    debug!(kind = kind.field(), "challenge received");
    Ok(ChallengeResponse { challenge, network_passphrase: raw.network_passphrase })
}

/// Submits a signed challenge and returns the token.
///
/// # Errors
///
/// See the module documentation for the status mapping.
#[instrument(skip(transport, encoded, headers), fields(endpoint = %endpoint, encoding = ?encoding))]
pub async fn submit_challenge(
    transport: &HttpTransport,
    endpoint: &Url,
    kind: ChallengeKind,
    encoded: &str,
    encoding: BodyEncoding,
    headers: &[(String, String)],
) -> Result<BearerToken> {
    let field = kind.field().to_owned();
    let body = match encoding {
        BodyEncoding::Json => {
            let value = serde_json::Value::String(encoded.to_owned());
            let object = serde_json::Map::from_iter([(field, value)]);
            RequestBody::Json(serde_json::Value::Object(object))
        }
        BodyEncoding::Form => RequestBody::Form(vec![(field, encoded.to_owned())]),
    };

    let ctx = RequestContext { url: endpoint, headers, operation: "token submission" };
    let response = transport.post(ctx, &body).await?;
    parse_token_response(&response)
}

fn parse_token_response(response: &TransportResponse) -> Result<BearerToken> {
    if response.status == GATEWAY_TIMEOUT {
        return Err(WebAuthError::Timeout { operation: "token submission" });
    }

    let raw: Option<RawTokenResponse> = response.json().ok();
    match raw {
        Some(RawTokenResponse { token: Some(token), .. })
            if response.is_success() && !token.is_empty() =>
        {
            Ok(BearerToken::parse(token))
        }
        Some(RawTokenResponse { error: Some(message), .. }) if !response.is_success() => {
            warn!(status = response.status, %message, "token submission rejected");
            Err(WebAuthError::TokenSubmission { status: response.status, message })
        }
        _ => Err(WebAuthError::UnknownResponse { status: response.status, body: response.text() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TESTNET_PASSPHRASE;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse { status, body: body.as_bytes().to_vec() }
    }

    #[test]
    fn test_token_success() {
        let token = parse_token_response(&response(200, r#"{"token":"a.b.c"}"#)).unwrap();
        assert_eq!(token.as_str(), "a.b.c");
    }

    #[test]
    fn test_token_rejected_with_error() {
        let result = parse_token_response(&response(400, r#"{"error":"challenge expired"}"#));
        assert!(matches!(
            result,
            Err(WebAuthError::TokenSubmission { status: 400, ref message })
                if message == "challenge expired"
        ));
    }

    #[test]
    fn test_token_gateway_timeout() {
        let result = parse_token_response(&response(504, ""));
        assert!(matches!(result, Err(WebAuthError::Timeout { .. })));
    }

    #[test]
    fn test_token_unknown_responses() {
        for (status, body) in [(200, r#"{"status":"ok"}"#), (500, "<html>oops</html>"), (200, "")] {
            let result = parse_token_response(&response(status, body));
            assert!(matches!(result, Err(WebAuthError::UnknownResponse { .. })), "{status} {body}");
        }
    }

    #[test]
    fn test_token_with_error_on_success_is_unknown() {
        let result = parse_token_response(&response(200, r#"{"error":"odd"}"#));
        assert!(matches!(result, Err(WebAuthError::UnknownResponse { status: 200, .. })));
    }

    #[test]
    fn test_challenge_success() {
        let body = serde_json::json!({
            "transaction": "AAAA",
            "network_passphrase": TESTNET_PASSPHRASE,
        });
        let parsed =
            parse_challenge_response(&response(200, &body.to_string()), ChallengeKind::Transaction)
                .unwrap();
        assert_eq!(parsed.challenge, "AAAA");
        assert_eq!(parsed.network_passphrase.as_deref(), Some(TESTNET_PASSPHRASE));
    }

    #[test]
    fn test_challenge_wrong_field() {
        let body = response(200, r#"{"transaction":"AAAA"}"#);
        let result = parse_challenge_response(&body, ChallengeKind::AuthorizationEntries);
        assert!(matches!(result, Err(WebAuthError::ChallengeRequest { status: Some(200), .. })));
    }

    #[test]
    fn test_challenge_server_error() {
        let body = response(400, r#"{"error":"invalid account"}"#);
        let result = parse_challenge_response(&body, ChallengeKind::Transaction);
        assert!(matches!(
            result,
            Err(WebAuthError::ChallengeRequest { status: Some(400), ref message })
                if message == "invalid account"
        ));
    }

    #[test]
    fn test_challenge_gateway_timeout() {
        let result = parse_challenge_response(&response(504, ""), ChallengeKind::Transaction);
        assert!(matches!(result, Err(WebAuthError::Timeout { operation: "challenge request" })));
    }

    #[test]
    fn test_body_encoding_from_toml_value() {
        #[derive(Deserialize)]
        struct Wrapper {
            encoding: BodyEncoding,
        }
        let wrapper: Wrapper = toml::from_str("encoding = \"form\"").unwrap();
        assert_eq!(wrapper.encoding, BodyEncoding::Form);
        assert_eq!(BodyEncoding::default(), BodyEncoding::Json);
    }
}
