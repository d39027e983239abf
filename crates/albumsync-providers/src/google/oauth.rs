//! OAuth 2.0 authorization code flow with PKCE and a loopback redirect.
//!
//! 1. derive a code verifier and its S256 challenge
//! 2. bind `127.0.0.1:<port>` and open the consent page in a browser
//! 3. accept the redirect, check `state`, take `code`
//! 4. exchange `code` plus verifier for an access and refresh token

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Random bytes in the verifier before base64url encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_OK_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>albumsync is authorized</h1><p>You can close this window.</p></body></html>";
const CALLBACK_FAILED_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization failed</h1><p>Return to the terminal for details.</p></body></html>";

/// Result of a refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Present only when Google rotates the refresh token.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Talks to Google's token endpoint for the authorization-code and
/// refresh grants.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    token_url: String,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            http_client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Points the client at a different token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Runs the interactive flow and returns a fresh token set.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();
        let (listener, port) = bind_loopback(port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");
        let auth_url = pkce.auth_url(&self.credentials.client_id, &redirect_uri, scopes)?;

        info!(port, "waiting for Google authorization");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!(error = %e, "could not open a browser");
            eprintln!("\nOpen this URL in your browser to authorize albumsync:\n\n{auth_url}\n");
        }

        let callback = tokio::time::timeout(CALLBACK_TIMEOUT, accept_callback(&listener))
            .await
            .map_err(|_| ProviderError::auth_expired("timed out waiting for the OAuth redirect"))??;

        if callback.state != pkce.state {
            return Err(ProviderError::auth_expired(
                "OAuth state mismatch, authorization discarded",
            ));
        }

        info!("authorization code received, exchanging for tokens");
        self.exchange_code(&callback.code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Exchanges `refresh_token` for a new access token.
    ///
    /// A rejected refresh token surfaces as `AuthExpired`; the user must
    /// run the interactive flow again.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.post_token_form(&params, "refresh").await?;
        info!("refreshed Google access token");
        Ok(RefreshedToken {
            access_token: response.access_token,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<TokenInfo> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        let response = self.post_token_form(&params, "exchange").await?;
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        grant: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::unavailable(format!("token {grant} request failed: {e}"))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::unavailable(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            // Google answers 400 invalid_grant once a refresh token is revoked.
            return Err(ProviderError::auth_expired(format!(
                "token {grant} failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(format!("invalid token response: {e}")))
    }
}

async fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            debug!(port, "bound OAuth loopback listener");
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no free port in {}-{} for the OAuth redirect",
        port_range.0, port_range.1
    )))
}

#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
    state: String,
}

/// Accepts connections until one carries the OAuth redirect.
async fn accept_callback(listener: &TcpListener) -> ProviderResult<Callback> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| ProviderError::internal(format!("loopback accept failed: {e}")))?;
        debug!(%peer, "loopback connection");
        if let Some(result) = serve_callback(stream).await {
            return result;
        }
    }
}

/// `None` for unrelated requests such as `/favicon.ico`.
async fn serve_callback(stream: TcpStream) -> Option<ProviderResult<Callback>> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;

    let result = parse_callback_request(&request_line)?;
    let page = if result.is_ok() {
        CALLBACK_OK_PAGE
    } else {
        CALLBACK_FAILED_PAGE
    };
    let mut stream = reader.into_inner();
    let _ = stream.write_all(page.as_bytes()).await;
    let _ = stream.shutdown().await;
    Some(result)
}

/// Parses `GET /callback?code=..&state=.. HTTP/1.1`.
fn parse_callback_request(request_line: &str) -> Option<ProviderResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let url = Url::parse(&format!("http://127.0.0.1{}", parts.next()?)).ok()?;
    if url.path() != "/callback" {
        return None;
    }

    let mut code = None;
    let mut state = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = value.into_owned(),
            "error" => {
                return Some(Err(ProviderError::auth_expired(format!(
                    "authorization denied: {value}"
                ))));
            }
            _ => {}
        }
    }

    Some(
        code.map(|code| Callback { code, state })
            .ok_or_else(|| ProviderError::auth_expired("redirect carried no authorization code")),
    )
}

/// RFC 7636 verifier, challenge and CSRF state.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_urlsafe(CODE_VERIFIER_LENGTH);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_urlsafe(16),
        }
    }

    /// Consent URL asking for offline access, so Google hands out a
    /// refresh token.
    pub fn auth_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Url> {
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scopes.join(" ").as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::internal(format!("failed to build authorization URL: {e}")))
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;

    #[test]
    fn verifier_is_43_chars() {
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn challenge_matches_rfc_example() {
        // RFC 7636 appendix B.
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn flows_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_carries_pkce_and_scope() {
        let flow = PkceFlow::new();
        let url = flow
            .auth_url(
                "client.apps.googleusercontent.com",
                "http://127.0.0.1:8080/callback",
                &["https://www.googleapis.com/auth/photoslibrary.readonly".to_string()],
            )
            .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["code_challenge"], flow.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], flow.state);
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(
            pairs["scope"],
            "https://www.googleapis.com/auth/photoslibrary.readonly"
        );
        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));
    }

    #[test]
    fn callback_parsing() {
        let ok = parse_callback_request("GET /callback?code=4%2F0Ab&state=xyz HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            ok,
            Callback {
                code: "4/0Ab".into(),
                state: "xyz".into()
            }
        );

        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1\r\n").is_none());
        assert!(parse_callback_request("POST /callback HTTP/1.1\r\n").is_none());

        let denied = parse_callback_request("GET /callback?error=access_denied HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(denied.code(), ProviderErrorCode::AuthExpired);
        assert!(denied.message().contains("access_denied"));

        assert!(
            parse_callback_request("GET /callback?state=s HTTP/1.1")
                .unwrap()
                .is_err()
        );
    }

    #[tokio::test]
    async fn loopback_accepts_redirect() {
        let (listener, port) = bind_loopback((18180, 18199)).await.unwrap();
        let server = tokio::spawn(async move { accept_callback(&listener).await });

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(b"GET /callback?code=abc&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let callback = server.await.unwrap().unwrap();
        assert_eq!(callback.code, "abc");
        assert_eq!(callback.state, "s1");
    }
}
