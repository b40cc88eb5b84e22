//! HTTP Client
//!
//! Uses hyper with tokio for async HTTP/1.1.
//! Features:
//! - Automatic HTTPS with rustls (memory-safe TLS)
//! - Cancellation through a [`CancellationToken`]
//! - Connect and overall request timeouts
//! - Response body size limit

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use http_body_util::{BodyExt, Empty, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HOST, HeaderMap, HeaderValue, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::{Host, Position, Url};

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("body read error: {0}")]
    Body(String),

    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall request timeout, connect included
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("wireguard-config-generator/{}", env!("CARGO_PKG_VERSION")),
            // Full NordVPN server lists run to a few tens of megabytes
            max_body_size: 64 * 1024 * 1024,
        }
    }
}

/// A GET request under construction
#[derive(Debug, Clone)]
pub struct GetRequest {
    url: Url,
    headers: HeaderMap,
}

impl GetRequest {
    /// Start a request for an absolute http(s) URL
    pub fn new(url: &str) -> Result<Self, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(HttpError::InvalidUrl(format!("unsupported scheme {other:?}"))),
        }
        if url.host().is_none() {
            return Err(HttpError::InvalidUrl("no host in URL".to_string()));
        }

        Ok(Self {
            url,
            headers: HeaderMap::new(),
        })
    }

    /// Append a URL-encoded query parameter, keeping any existing ones
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Ask for a JSON body
    pub fn json(mut self) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// HTTP basic authentication
    pub fn basic_auth(mut self, username: &str, password: &str) -> Result<Self, HttpError> {
        let credentials = BASE64.encode(format!("{username}:{password}"));
        let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| HttpError::InvalidHeader(format!("{AUTHORIZATION}: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// The final URL, query included
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Fully buffered response body
    pub body: Bytes,
    /// Total download time
    pub total_time: Duration,
}

/// HTTP client for one-shot GET requests
///
/// Every call opens a fresh connection; there is no pooling or retry.
pub struct HttpClient {
    config: HttpClientConfig,
    tls: TlsConnector,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        info!(
            "HTTP client initialized (timeout: {:?}, connect timeout: {:?})",
            config.timeout, config.connect_timeout
        );

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self {
            config,
            tls: TlsConnector::from(Arc::new(tls_config)),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    /// Perform a GET request
    ///
    /// Resolves with [`HttpError::Cancelled`] as soon as `cancel` fires; the
    /// in-flight connection is dropped with the future.
    pub async fn get(
        &self,
        request: GetRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, HttpError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("HTTP GET {} cancelled", request.url);
                Err(HttpError::Cancelled)
            }
            result = tokio::time::timeout(self.config.timeout, self.send(&request)) => {
                result.map_err(|_| HttpError::Timeout)?
            }
        }
    }

    async fn send(&self, request: &GetRequest) -> Result<Response, HttpError> {
        let start = Instant::now();
        let url = &request.url;

        // Unbracketed form, usable both for connect and as a TLS server name
        let connect_host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(HttpError::InvalidUrl("no host in URL".to_string())),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::InvalidUrl("no port for scheme".to_string()))?;
        let is_https = url.scheme() == "https";

        // Origin-form target plus an explicit Host header
        let target = &url[Position::BeforePath..Position::AfterQuery];
        let host_header = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(target)
            .header(HOST, host_header)
            .header(USER_AGENT, &self.config.user_agent);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers().clone());
        }
        let http_request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| HttpError::Http(e.to_string()))?;

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            tokio::net::TcpStream::connect((connect_host.as_str(), port)),
        )
        .await
        .map_err(|_| HttpError::ConnectionFailed(format!("connect to {connect_host}:{port} timed out")))?
        .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        let response = if is_https {
            let server_name = rustls::pki_types::ServerName::try_from(connect_host.clone())
                .map_err(|_| HttpError::Tls("invalid server name".to_string()))?;

            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::Tls(e.to_string()))?;

            exchange(tls_stream, http_request).await?
        } else {
            exchange(stream, http_request).await?
        };

        let status = response.status();

        let limit = self.config.max_body_size;
        let body = Limited::new(response.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                    HttpError::BodyTooLarge(limit)
                } else {
                    HttpError::Body(e.to_string())
                }
            })?
            .to_bytes();

        Ok(Response {
            status,
            body,
            total_time: start.elapsed(),
        })
    }
}

/// Run one HTTP/1.1 request over an established stream
async fn exchange<T>(
    io: T,
    request: Request<Empty<Bytes>>,
) -> Result<hyper::Response<Incoming>, HttpError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(io);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::Http(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::Http(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(5),
            ..HttpClientConfig::default()
        })
    }

    async fn server_replying(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_request_building() {
        let request = GetRequest::new("https://api.example.com/v1/servers?x=1")
            .unwrap()
            .query("filters[servers_technologies][identifier]", "wireguard_udp")
            .query("limit", "100000")
            .json();

        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/v1/servers?x=1&filters%5Bservers_technologies%5D%5Bidentifier%5D=wireguard_udp&limit=100000"
        );
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_basic_auth_header() {
        let request = GetRequest::new("http://localhost/")
            .unwrap()
            .basic_auth("token", "secret")
            .unwrap();

        // base64("token:secret")
        assert_eq!(request.headers()[AUTHORIZATION], "Basic dG9rZW46c2VjcmV0");
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_invalid_urls() {
        assert!(matches!(GetRequest::new("not a url"), Err(HttpError::InvalidUrl(_))));
        assert!(matches!(GetRequest::new("ftp://example.com/"), Err(HttpError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_get_plain_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .and(query_param("limit", "5"))
            .and(header("content-type", "application/json"))
            .and(basic_auth("token", "secret"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let request = GetRequest::new(&format!("{}/v1/ping", server.uri()))
            .unwrap()
            .query("limit", "5")
            .json()
            .basic_auth("token", "secret")
            .unwrap();

        let response = client().get(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned() {
        let server = server_replying(
            ResponseTemplate::new(401).set_body_string(r#"{"errors":{"message":"Unauthorized"}}"#),
        )
        .await;
        let request = GetRequest::new(&server.uri()).unwrap();

        let response = client().get(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_request() {
        let server = server_replying(ResponseTemplate::new(200).set_delay(Duration::from_secs(30))).await;
        let request = GetRequest::new(&server.uri()).unwrap();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = client().get(request, &cancel).await;

        assert!(matches!(result, Err(HttpError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client().get(GetRequest::new(&server.uri()).unwrap(), &cancel).await;
        assert!(matches!(result, Err(HttpError::Cancelled)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = server_replying(ResponseTemplate::new(200).set_delay(Duration::from_secs(5))).await;
        let client = HttpClient::new(HttpClientConfig {
            timeout: Duration::from_millis(100),
            ..HttpClientConfig::default()
        });

        let result = client
            .get(GetRequest::new(&server.uri()).unwrap(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(HttpError::Timeout)));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let server = server_replying(ResponseTemplate::new(200).set_body_string("x".repeat(2048))).await;
        let client = HttpClient::new(HttpClientConfig {
            max_body_size: 1024,
            ..HttpClientConfig::default()
        });

        let result = client
            .get(GetRequest::new(&server.uri()).unwrap(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(HttpError::BodyTooLarge(1024))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client()
            .get(
                GetRequest::new(&format!("http://{addr}/")).unwrap(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(HttpError::ConnectionFailed(_))));
    }
}
