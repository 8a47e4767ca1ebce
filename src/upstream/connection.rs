//! A single upstream matching server.
//!
//! # Responsibilities
//! - Hold the validated location and derived Authorization header
//! - Execute REST calls with transport retries
//! - Map non-success responses to `BridgeError::Upstream`
//! - Dial the persistent command socket, reconnecting until it succeeds

use std::io;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, http};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;
use crate::resilience::{reconnect_backoff, RetryError, RetryPolicy};
use crate::upstream::types::SOCKET_PATH;

/// Persistent socket to an upstream.
pub type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for a single socket dial (TCP, TLS and upgrade).
const SOCKET_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Credentials for one upstream server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    pub server_location: String,
    pub api_key_id: String,
    pub api_key: String,
    #[serde(default)]
    pub primary: bool,
}

/// `Basic <keyId>:<hex(sha512(key))>`
pub fn authorization_header(api_key_id: &str, api_key: &str) -> String {
    let hashed = Sha512::digest(api_key.as_bytes());
    format!("Basic {}:{}", api_key_id, hex::encode(hashed))
}

/// A configured upstream server.
#[derive(Debug, Clone)]
pub struct ServerConnection {
    /// Location without a trailing slash, e.g. "https://rtcv.example.com".
    base: String,
    location: Url,
    auth_header: String,
    client: Client,
    retry: RetryPolicy,
}

impl ServerConnection {
    /// Validate `credentials` and derive the Authorization header.
    pub fn from_credentials(
        credentials: &Credentials,
        client: Client,
        retry: RetryPolicy,
    ) -> BridgeResult<Self> {
        let raw = credentials.server_location.trim();
        if raw.is_empty() {
            return Err(BridgeError::Configuration(
                "server_location cannot be empty".into(),
            ));
        }
        if !raw.starts_with("http://") && !raw.starts_with("https://") {
            return Err(BridgeError::Configuration(format!(
                "server_location {raw} must start with a supported protocol like: http:// or https://"
            )));
        }
        let location = Url::parse(raw).map_err(|e| {
            BridgeError::Configuration(format!("server_location {raw} is not a valid url: {e}"))
        })?;
        if credentials.api_key_id.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "api_key_id for {raw} cannot be empty"
            )));
        }
        if credentials.api_key.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "api_key for {raw} cannot be empty"
            )));
        }

        let auth_header = authorization_header(&credentials.api_key_id, &credentials.api_key);
        HeaderValue::from_str(&auth_header).map_err(|_| {
            BridgeError::Configuration(format!(
                "api_key_id for {raw} contains characters not allowed in a header"
            ))
        })?;

        Ok(Self {
            base: raw.trim_end_matches('/').to_string(),
            location,
            auth_header,
            client,
            retry,
        })
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn auth_header(&self) -> &str {
        &self.auth_header
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// `ws(s)://<location>/api/v1/scraper/ws`
    pub fn socket_url(&self) -> String {
        let base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base.clone()
        };
        format!("{base}{SOCKET_PATH}")
    }

    /// GET `path` and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> BridgeResult<T> {
        let body = self.execute(Method::GET, path, None).await?;
        decode(path, &body)
    }

    /// GET `path` and ignore the response body.
    pub async fn check(&self, path: &str) -> BridgeResult<()> {
        self.execute(Method::GET, path, None).await.map(|_| ())
    }

    /// POST `body` as JSON to `path` and decode the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> BridgeResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| BridgeError::InvalidInput(format!("unable to encode request body: {e}")))?;
        self.post_encoded(path, encoded).await
    }

    /// POST an already encoded JSON body.
    pub async fn post_encoded<T: DeserializeOwned>(&self, path: &str, body: Vec<u8>) -> BridgeResult<T> {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        decode(path, &response)
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> BridgeResult<Vec<u8>> {
        let url = self.endpoint(path);
        let method_label = if method == Method::POST { "POST" } else { "GET" };

        let sent = self
            .retry
            .run(
                |e: &reqwest::Error| !e.is_builder(),
                || {
                    let mut request = self
                        .client
                        .request(method.clone(), &url)
                        .header(CONTENT_TYPE, "application/json")
                        .header(AUTHORIZATION, self.auth_header.as_str())
                        .timeout(self.retry.attempt_timeout);
                    if let Some(body) = &body {
                        request = request.body(body.clone());
                    }
                    request.send()
                },
            )
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(RetryError::Exhausted { source, retries }) => {
                metrics::record_upstream_request(method_label, "transport_error");
                tracing::error!(url = %url, retries, error = %source, "Upstream unreachable");
                return Err(BridgeError::Transport {
                    message: format!("{method} {url} failed: {source}"),
                    retries,
                });
            }
            Err(RetryError::NotRetryable(source)) => {
                metrics::record_upstream_request(method_label, "transport_error");
                return Err(BridgeError::Transport {
                    message: format!("{method} {url} failed: {source}"),
                    retries: 0,
                });
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| BridgeError::Transport {
            message: format!("reading response of {method} {url} failed: {e}"),
            retries: 0,
        })?;

        if status.is_client_error() || status.is_server_error() {
            metrics::record_upstream_request(method_label, "status_error");
            let err = BridgeError::from_upstream_body(status.as_u16(), &bytes);
            tracing::warn!(url = %url, status = status.as_u16(), error = %err, "Upstream rejected request");
            return Err(err);
        }

        metrics::record_upstream_request(method_label, "ok");
        Ok(bytes.to_vec())
    }

    /// Dial the command socket, retrying on the reconnect schedule until it succeeds.
    ///
    /// Never returns an error; drop the future to stop dialing.
    pub async fn open_socket(&self, connection: usize) -> SocketStream {
        let url = self.socket_url();
        let mut attempt = 0u32;
        loop {
            match self.connect_socket(&url).await {
                Ok(stream) => {
                    tracing::info!(connection, url = %url, attempts = attempt + 1, "Connected to upstream socket");
                    return stream;
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    let delay = reconnect_backoff(attempt);
                    metrics::record_socket_reconnect(connection);
                    tracing::warn!(connection, url = %url, error = %e, retry_in = ?delay, "Unable to connect to upstream socket");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect_socket(&self, url: &str) -> Result<SocketStream, tungstenite::Error> {
        let mut request = url.into_client_request()?;
        let auth = http::HeaderValue::from_str(&self.auth_header)
            .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
        request.headers_mut().insert(http::header::AUTHORIZATION, auth);

        match tokio::time::timeout(SOCKET_CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request)).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "socket handshake timed out",
            ))),
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> BridgeResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| BridgeError::Protocol(format!("unable to decode response of {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(location: &str) -> Credentials {
        Credentials {
            server_location: location.to_string(),
            api_key_id: "key-id".to_string(),
            api_key: "secret".to_string(),
            primary: true,
        }
    }

    fn connect(location: &str) -> BridgeResult<ServerConnection> {
        ServerConnection::from_credentials(&credentials(location), Client::new(), RetryPolicy::default())
    }

    #[test]
    fn test_authorization_header_is_hashed_key() {
        let header = authorization_header("key-id", "secret");
        let expected = hex::encode(Sha512::digest(b"secret"));
        assert_eq!(header, format!("Basic key-id:{expected}"));
        assert_eq!(expected.len(), 128);
        assert_eq!(expected, expected.to_lowercase());
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = connect("ftp://rtcv.example.com").unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_rejects_empty_fields() {
        assert!(connect("").is_err());

        let mut missing_key = credentials("http://localhost:4000");
        missing_key.api_key.clear();
        let err = ServerConnection::from_credentials(&missing_key, Client::new(), RetryPolicy::default())
            .unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_socket_url_follows_scheme() {
        let plain = connect("http://localhost:4000/").unwrap();
        assert_eq!(plain.socket_url(), "ws://localhost:4000/api/v1/scraper/ws");

        let tls = connect("https://rtcv.example.com").unwrap();
        assert_eq!(tls.socket_url(), "wss://rtcv.example.com/api/v1/scraper/ws");
    }

    #[test]
    fn test_endpoint_joins_path() {
        let conn = connect("http://localhost:4000/").unwrap();
        assert_eq!(conn.endpoint("/api/v1/health"), "http://localhost:4000/api/v1/health");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_server_reports_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let conn = connect(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = conn.check("/api/v1/health").await.unwrap_err();
        assert!(err.to_string().ends_with("retried 3 times"), "{err}");
        assert!(matches!(err, BridgeError::Transport { retries: 3, .. }));
    }

    #[tokio::test]
    async fn test_silent_server_times_out_and_retries() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let retry = RetryPolicy {
            max_retries: 1,
            step: Duration::ZERO,
            attempt_timeout: Duration::from_millis(200),
        };
        let conn = ServerConnection::from_credentials(
            &credentials(&format!("http://{address}")),
            Client::new(),
            retry,
        )
        .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), conn.check("/api/v1/health"))
            .await
            .expect("request never timed out")
            .unwrap_err();
        assert!(matches!(err, BridgeError::Transport { retries: 1, .. }), "{err}");

        holder.abort();
    }
}
