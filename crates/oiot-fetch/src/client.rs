//! HTTP connector for the OIOT device data endpoint.

use crate::url::{BASE_URL, redacted, site_url};
use crate::{MeterSource, ParsedPayload, parse_payload};
use async_trait::async_trait;
use bytes::Bytes;
use oiot_types::{ConnectorConfig, DeviceIdentity, MeasurementSet, OiotError, Result};
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Key whose presence marks an authenticated response.
const SUCCESS: &str = "success";

/// Configuration for the HTTP connector.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint the device data is requested from.
    pub base_url: String,
    /// Overall request timeout.
    pub timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("oiot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Connector for a single device.
///
/// Owns the device identity, builds the request URL once and performs one
/// GET per [`authenticate`](Self::authenticate) or [`fetch`](Self::fetch)
/// call. The device id and name are refined from every successful payload.
///
/// Requests share one pooled [`Client`], so keep-alive connections are
/// reused across calls instead of opening a fresh session for each one.
/// Per-call state is limited to the request itself.
pub struct Connector {
    client: Client,
    config: ClientConfig,
    url: Url,
    requested_device: Option<String>,
    identity: RwLock<DeviceIdentity>,
}

impl Connector {
    /// Creates a connector with the default client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OiotError::CannotConnect`] if the HTTP client cannot be created.
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        Self::with_client_config(config, ClientConfig::default())
    }

    /// Creates a connector with a custom client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OiotError::CannotConnect`] if the base URL is invalid or the
    /// HTTP client cannot be created.
    pub fn with_client_config(config: &ConnectorConfig, client_config: ClientConfig) -> Result<Self> {
        let identity = DeviceIdentity::from_config(config);
        let url = site_url(&client_config.base_url, &identity)?;
        let client = Client::builder()
            .timeout(client_config.timeout)
            .connect_timeout(client_config.connect_timeout)
            .user_agent(&client_config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| OiotError::CannotConnect(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: client_config,
            url,
            requested_device: config.device_id().map(str::to_string),
            identity: RwLock::new(identity),
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a copy of the current device identity.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the device id; the server's canonical id after a successful call.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .device_id()
            .map(str::to_string)
    }

    /// Returns the device name; empty until the first successful call.
    #[must_use]
    pub fn device_name(&self) -> String {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .device_name()
            .to_string()
    }

    /// Checks the credentials and refines the device id and name.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidAuth` if the service rejects the credentials,
    /// `CannotConnect` on transport failures and `ParseError` if the
    /// authenticated payload is unusable.
    pub async fn authenticate(&self) -> Result<bool> {
        self.request().await?;
        Ok(true)
    }

    /// Fetches the latest readings for the device.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidAuth`, `CannotConnect` or `ParseError`.
    pub async fn fetch(&self) -> Result<MeasurementSet> {
        Ok(self.request().await?.measurements)
    }

    async fn request(&self) -> Result<ParsedPayload> {
        let body = self.get().await?;
        let payload = classify_body(&body)?;
        let parsed = parse_payload(&payload)?;

        if let Some(requested) = self.requested_device.as_deref() {
            if requested != parsed.device_id {
                warn!(
                    requested,
                    returned = %parsed.device_id,
                    "service returned a different device than requested"
                );
            }
        }

        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .refine(parsed.device_id.clone(), parsed.device_name.clone());

        Ok(parsed)
    }

    async fn get(&self) -> Result<Bytes> {
        debug!(url = %redacted(&self.url), "requesting device data");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OiotError::CannotConnect(format!("server returned HTTP {status}")));
        }

        response.bytes().await.map_err(transport_error)
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("url", &redacted(&self.url))
            .field("config", &self.config)
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MeterSource for Connector {
    async fn authenticate(&self) -> Result<bool> {
        Self::authenticate(self).await
    }

    async fn fetch(&self) -> Result<MeasurementSet> {
        Self::fetch(self).await
    }

    fn device_id(&self) -> Option<String> {
        Self::device_id(self)
    }

    fn device_name(&self) -> String {
        Self::device_name(self)
    }
}

/// Classifies a response body that arrived with a success status.
///
/// A body that is not JSON is a transport failure (`CannotConnect`); a JSON
/// body without the `success` key is a rejection of the credentials
/// (`InvalidAuth`). Anything else is returned for parsing.
///
/// # Errors
///
/// Returns `CannotConnect` or `InvalidAuth` as described above.
pub fn classify_body(body: &[u8]) -> Result<Value> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| OiotError::CannotConnect(format!("malformed response body: {e}")))?;

    if payload.get(SUCCESS).is_none() {
        return Err(OiotError::InvalidAuth(
            "response has no success indicator".to_string(),
        ));
    }

    Ok(payload)
}

fn transport_error(error: reqwest::Error) -> OiotError {
    if error.is_timeout() {
        OiotError::CannotConnect("request timed out".to_string())
    } else {
        // The error text can embed the URL, which carries the token.
        OiotError::CannotConnect(error.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use oiot_types::{ErrorKind, Slot};
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const METER_BODY: &str = r#"{"success":1,"result":{"42":{"TITLE":"Meter","COUNTER_NAME_1":"Cold","MEASURE_1_NAME":"m3","COUNTER_NAME_2":"Hot","MEASURE_2_NAME":"m3","data":[{"counter_1":12.5,"counter_2":7.3}]}}}"#;

    struct TestServer {
        base_url: String,
        hits: Arc<AtomicUsize>,
        request_lines: Arc<Mutex<Vec<String>>>,
    }

    /// Serves a canned HTTP response to every connection.
    async fn serve(status: &'static str, body: &'static str, delay: Duration) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let request_lines = Arc::new(Mutex::new(Vec::new()));

        let (server_hits, server_lines) = (hits.clone(), request_lines.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let hits = server_hits.clone();
                let lines = server_lines.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0;
                    while read < buf.len() {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    hits.fetch_add(1, Ordering::SeqCst);
                    let head = String::from_utf8_lossy(&buf[..read]).into_owned();
                    lines
                        .lock()
                        .unwrap()
                        .push(head.lines().next().unwrap_or_default().to_string());

                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        TestServer {
            base_url: format!("http://{addr}/api/devices"),
            hits,
            request_lines,
        }
    }

    fn connector(server: &TestServer, device_id: Option<&str>) -> Connector {
        let config = ConnectorConfig::new("1001", "tok", device_id).unwrap();
        let client_config = ClientConfig {
            base_url: server.base_url.clone(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        Connector::with_client_config(&config, client_config).unwrap()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("oiot/"));
    }

    #[test]
    fn test_classify_malformed_body() {
        let err = classify_body(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotConnect);
    }

    #[test]
    fn test_classify_missing_success() {
        let err = classify_body(br#"{"result":{}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAuth);
    }

    #[test]
    fn test_classify_success() {
        let payload = classify_body(METER_BODY.as_bytes()).unwrap();
        assert!(payload.get("result").is_some());
    }

    #[tokio::test]
    async fn test_fetch_parses_and_refines_identity() {
        let server = serve("200 OK", METER_BODY, Duration::ZERO).await;
        let connector = connector(&server, None);
        assert_eq!(connector.device_id(), None);

        let set = connector.fetch().await.unwrap();
        assert_eq!(set[Slot::One].title(), "Cold");
        assert_relative_eq!(set[Slot::One].value(), 12.5);
        assert_eq!(set[Slot::Two].title(), "Hot");
        assert_relative_eq!(set[Slot::Two].value(), 7.3);

        assert_eq!(connector.device_id().as_deref(), Some("42"));
        assert_eq!(connector.device_name(), "Meter");
        assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_call_sends_its_own_request() {
        let server = serve("200 OK", METER_BODY, Duration::ZERO).await;
        let connector = connector(&server, Some("42"));

        assert!(connector.authenticate().await.unwrap());
        connector.fetch().await.unwrap();
        connector.fetch().await.unwrap();

        assert_eq!(server.hits.load(Ordering::SeqCst), 3);
        assert_eq!(server.request_lines.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_request_carries_query() {
        let server = serve("200 OK", METER_BODY, Duration::ZERO).await;
        let connector = connector(&server, Some("42"));
        connector.authenticate().await.unwrap();

        let lines = server.request_lines.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("GET /api/devices?id=1001&token=tok&keys%5B%5D=42 "));
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let server = serve("200 OK", r#"{"result":{}}"#, Duration::ZERO).await;
        let err = connector(&server, None).authenticate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAuth);
    }

    #[tokio::test]
    async fn test_server_error_is_cannot_connect() {
        let server = serve("503 Service Unavailable", "{}", Duration::ZERO).await;
        let err = connector(&server, None).fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotConnect);
    }

    #[tokio::test]
    async fn test_timeout_is_cannot_connect() {
        let server = serve("200 OK", METER_BODY, Duration::from_secs(3)).await;
        let err = connector(&server, None).fetch().await.unwrap_err();
        assert_eq!(err, OiotError::CannotConnect("request timed out".to_string()));
    }

    #[tokio::test]
    async fn test_successful_but_empty_is_parse_error() {
        let server = serve("200 OK", r#"{"success":1,"result":[]}"#, Duration::ZERO).await;
        let connector = connector(&server, None);
        let err = connector.fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        assert_eq!(connector.device_name(), "");
    }

    #[tokio::test]
    async fn test_connection_refused_is_cannot_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ConnectorConfig::new("1001", "tok", None::<String>).unwrap();
        let client_config = ClientConfig {
            base_url: format!("http://{addr}/api"),
            ..Default::default()
        };
        let connector = Connector::with_client_config(&config, client_config).unwrap();
        let err = connector.fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotConnect);
        assert!(!err.reason().contains("tok"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ConnectorConfig::new("1001", "topsecret", None::<String>).unwrap();
        let connector = Connector::new(&config).unwrap();
        assert!(!format!("{connector:?}").contains("topsecret"));
    }
}
