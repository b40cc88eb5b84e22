//! NordVPN
//!
//! NordVPN hands out a per-account NordLynx (WireGuard) private key from its
//! credentials endpoint, and describes servers as a list of technologies, each
//! with free-form metadata. The WireGuard public key lives in the
//! `public_key` metadata entry of the `wireguard_udp` technology.

use crate::error::FetchError;
use crate::fetch::get_json;
use crate::server::Server;
use confgen_net::{CancellationToken, GetRequest, HttpClient};
use confgen_wireguard::{DEFAULT_PORT, Endpoint, KeyMaterial};
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Server recommendations endpoint
pub const DEFAULT_SERVER_LIST_URL: &str = "https://api.nordvpn.com/v1/servers/recommendations";

/// Service credentials endpoint (requires an access token)
pub const DEFAULT_CREDENTIALS_URL: &str = "https://api.nordvpn.com/v1/users/services/credentials";

/// Technology identifier for WireGuard over UDP
pub const WIREGUARD_UDP: &str = "wireguard_udp";

const PUBLIC_KEY_METADATA: &str = "public_key";
const TECHNOLOGY_FILTER: &str = "filters[servers_technologies][identifier]";
const RESULT_LIMIT: &str = "100000";

/// Basic-auth username NordVPN expects alongside the token
const TOKEN_USERNAME: &str = "token";

/// Fetches the account's NordLynx private key
pub struct PrivateKeyFetcher {
    client: Arc<HttpClient>,
    token: String,
    url: String,
}

#[derive(Deserialize)]
struct CredentialsResponse {
    nordlynx_private_key: Option<String>,
}

impl PrivateKeyFetcher {
    pub fn new(client: Arc<HttpClient>, token: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            url: url.into(),
        }
    }

    /// Fetch the private key
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<KeyMaterial, FetchError> {
        let request = GetRequest::new(&self.url)?
            .json()
            .basic_auth(TOKEN_USERNAME, &self.token)?;

        debug!("Fetching NordVPN private key from {}", request.url());

        let response: CredentialsResponse = get_json(&self.client, request, cancel).await?;

        let key = KeyMaterial::new(response.nordlynx_private_key.unwrap_or_default());
        if key.is_empty() {
            return Err(FetchError::Validation(
                "nordlynx_private_key is required".to_string(),
            ));
        }

        Ok(key)
    }
}

impl fmt::Debug for PrivateKeyFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyFetcher")
            .field("url", &self.url)
            .field("token", &"[redacted]")
            .finish()
    }
}

// Optional at the serde layer: absent and `null` fields are reported by
// `validate`, not by the decoder.

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTechnology {
    identifier: Option<String>,
    metadata: Option<Vec<RawMetadata>>,
}

impl RawTechnology {
    fn identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or_default()
    }

    fn metadata(&self) -> &[RawMetadata] {
        self.metadata.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct RawServer {
    station: Option<String>,
    technologies: Option<Vec<RawTechnology>>,
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl RawServer {
    fn station(&self) -> &str {
        self.station.as_deref().unwrap_or_default()
    }

    fn technologies(&self) -> &[RawTechnology] {
        self.technologies.as_deref().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), String> {
        let station = self.station();
        if station.is_empty() {
            return Err("station is required".to_string());
        }
        if station.parse::<IpAddr>().is_err() {
            return Err(format!("station {station:?} is not a valid IP address"));
        }
        if self.technologies().is_empty() {
            return Err(format!("station {station}: technologies is required"));
        }

        for (i, tech) in self.technologies().iter().enumerate() {
            if tech.identifier().is_empty() {
                return Err(format!("station {station}: technology {i} identifier is required"));
            }
            for (j, meta) in tech.metadata().iter().enumerate() {
                if !non_empty(&meta.name) || !non_empty(&meta.value) {
                    return Err(format!(
                        "station {station}: technology {} metadata {j} needs a name and a value",
                        tech.identifier()
                    ));
                }
            }
        }

        Ok(())
    }

    fn wireguard(&self) -> Option<&RawTechnology> {
        self.technologies()
            .iter()
            .find(|tech| tech.identifier() == WIREGUARD_UDP)
    }

    fn to_server(&self) -> Result<Server, FetchError> {
        let station = self.station();
        let tech = self.wireguard().ok_or_else(|| {
            FetchError::Decode(format!("station {station}: no {WIREGUARD_UDP} technology"))
        })?;

        let public_key = tech
            .metadata()
            .iter()
            .find(|meta| meta.name.as_deref() == Some(PUBLIC_KEY_METADATA))
            .and_then(|meta| meta.value.as_deref())
            .ok_or_else(|| {
                FetchError::Decode(format!(
                    "station {station}: {WIREGUARD_UDP} has no {PUBLIC_KEY_METADATA} metadata"
                ))
            })?;

        let addr: IpAddr = station.parse().map_err(|_| {
            FetchError::Decode(format!("station {station:?} is not a valid IP address"))
        })?;

        Ok(Server::new(
            KeyMaterial::new(public_key),
            Endpoint::new(addr, DEFAULT_PORT),
        ))
    }
}

/// Lists WireGuard-capable NordVPN servers
#[derive(Debug)]
pub struct ServerListFetcher {
    client: Arc<HttpClient>,
    url: String,
}

impl ServerListFetcher {
    pub fn new(client: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch, validate, filter and map the server list
    ///
    /// One invalid record fails the whole list.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Server>, FetchError> {
        let request = GetRequest::new(&self.url)?
            .query(TECHNOLOGY_FILTER, WIREGUARD_UDP)
            .query("limit", RESULT_LIMIT)
            .json();

        debug!("Fetching NordVPN server list from {}", request.url());

        let raw: Vec<RawServer> = get_json(&self.client, request, cancel).await?;

        for (i, server) in raw.iter().enumerate() {
            server
                .validate()
                .map_err(|reason| FetchError::Validation(format!("server {i}: {reason}")))?;
        }

        let servers = raw
            .iter()
            .filter(|server| server.wireguard().is_some())
            .map(RawServer::to_server)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "NordVPN returned {} servers, {} support {}",
            raw.len(),
            servers.len(),
            WIREGUARD_UDP
        );

        Ok(servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confgen_net::HttpClientConfig;
    use std::time::Duration;
    use wiremock::matchers::{basic_auth, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PUBLIC_KEY: &str = "qIhtTW9K4iXWFo5Q4dOPdXg8/xubXr9yEGoN55D8xnA=";

    fn client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(HttpClientConfig {
            timeout: Duration::from_secs(5),
            ..HttpClientConfig::default()
        }))
    }

    fn server_json(station: &str, identifier: &str) -> String {
        format!(
            r#"{{"id":1,"name":"Test #1","station":"{station}","technologies":[{{"identifier":"openvpn_udp","metadata":[]}},{{"identifier":"{identifier}","metadata":[{{"name":"public_key","value":"{PUBLIC_KEY}"}}]}}]}}"#
        )
    }

    async fn replying(status: u16, body: impl AsRef<str>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_raw(body.as_ref(), "application/json"))
            .mount(&server)
            .await;
        server
    }

    async fn list(body: impl AsRef<str>) -> Result<Vec<Server>, FetchError> {
        let server = replying(200, body).await;
        ServerListFetcher::new(client(), server.uri())
            .list(&CancellationToken::new())
            .await
    }

    async fn fetch_key(body: &str) -> Result<KeyMaterial, FetchError> {
        let server = replying(200, body).await;
        PrivateKeyFetcher::new(client(), "t", server.uri())
            .fetch(&CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_private_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users/services/credentials"))
            .and(basic_auth("token", "test_token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"nordlynx_private_key":"test_key","username":"x"}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/users/services/credentials", server.uri());
        let fetcher = PrivateKeyFetcher::new(client(), "test_token", url);

        let key = fetcher.fetch(&CancellationToken::new()).await.unwrap();
        assert_eq!(key.as_str(), "test_key");

        let requests = server.received_requests().await.unwrap();
        // base64("token:test_token")
        assert_eq!(
            requests[0].headers.get("authorization").unwrap(),
            "Basic dG9rZW46dGVzdF90b2tlbg=="
        );
    }

    #[tokio::test]
    async fn test_private_key_unauthorized() {
        let server = replying(401, r#"{"errors":{"message":"Unauthorized"}}"#).await;
        let fetcher = PrivateKeyFetcher::new(client(), "bad", server.uri());

        let err = fetcher.fetch(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedStatus { status: 401 }));
    }

    #[tokio::test]
    async fn test_private_key_bad_body() {
        for body in ["not json", r#"{"nordlynx_private_key":42}"#, "[]"] {
            let err = fetch_key(body).await.unwrap_err();
            assert!(matches!(err, FetchError::Decode(_)), "body {body:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_private_key_missing_or_empty() {
        for body in [
            r#"{"nordlynx_private_key":""}"#,
            r#"{"nordlynx_private_key":null}"#,
            r#"{"username":"x"}"#,
        ] {
            let err = fetch_key(body).await.unwrap_err();
            assert!(matches!(err, FetchError::Validation(_)), "body {body:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_private_key_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let fetcher = PrivateKeyFetcher::new(client(), "t", server.uri());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = fetcher.fetch(&cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[test]
    fn test_debug_hides_token() {
        let fetcher = PrivateKeyFetcher::new(client(), "super-secret", DEFAULT_CREDENTIALS_URL);
        assert!(!format!("{fetcher:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn test_list_servers() {
        let body = format!(
            "[{},{}]",
            server_json("62.3.36.228", WIREGUARD_UDP),
            server_json("2a00:1::1", WIREGUARD_UDP)
        );

        let servers = list(body).await.unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].public_key.as_str(), PUBLIC_KEY);
        assert_eq!(servers[0].endpoint.to_string(), "62.3.36.228:51820");
        assert_eq!(servers[1].endpoint.to_string(), "[2a00:1::1]:51820");
    }

    #[tokio::test]
    async fn test_list_sends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/servers/recommendations"))
            .and(query_param("filters[servers_technologies][identifier]", "wireguard_udp"))
            .and(query_param("limit", "100000"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/servers/recommendations", server.uri());
        let servers = ServerListFetcher::new(client(), url)
            .list(&CancellationToken::new())
            .await
            .unwrap();
        assert!(servers.is_empty());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some("filters%5Bservers_technologies%5D%5Bidentifier%5D=wireguard_udp&limit=100000")
        );
    }

    #[tokio::test]
    async fn test_list_filters_other_technologies() {
        let body = format!(
            "[{},{},{}]",
            server_json("10.0.0.1", "openvpn_tcp"),
            server_json("10.0.0.2", WIREGUARD_UDP),
            server_json("10.0.0.3", "wireguard_tcp")
        );

        let servers = list(body).await.unwrap();

        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].endpoint.to_string(), "10.0.0.2:51820");
    }

    #[tokio::test]
    async fn test_list_preserves_order() {
        let stations = ["10.0.0.9", "10.0.0.1", "10.0.0.5"];
        let body = format!(
            "[{}]",
            stations
                .iter()
                .map(|s| server_json(s, WIREGUARD_UDP))
                .collect::<Vec<_>>()
                .join(",")
        );

        let servers = list(body).await.unwrap();
        let got: Vec<String> = servers.iter().map(|s| s.endpoint.addr.to_string()).collect();
        assert_eq!(got, stations);
    }

    #[tokio::test]
    async fn test_one_invalid_record_fails_list() {
        let bad_station = server_json("not-an-ip", WIREGUARD_UDP);
        let no_techs = r#"{"station":"10.0.0.3","technologies":[]}"#.to_string();
        let empty_meta = r#"{"station":"10.0.0.4","technologies":[{"identifier":"wireguard_udp","metadata":[{"name":"public_key","value":""}]}]}"#.to_string();
        let no_identifier = r#"{"station":"10.0.0.5","technologies":[{"metadata":[]}]}"#.to_string();
        let no_station = r#"{"technologies":[{"identifier":"wireguard_udp"}]}"#.to_string();

        for bad in [bad_station, no_techs, empty_meta, no_identifier, no_station] {
            let body = format!("[{},{bad}]", server_json("10.0.0.1", WIREGUARD_UDP));
            let err = list(body).await.unwrap_err();
            assert!(matches!(err, FetchError::Validation(_)), "got {err:?}");
            assert!(err.to_string().contains("server 1"));
        }
    }

    #[tokio::test]
    async fn test_null_required_fields_fail_validation() {
        let null_station = r#"{"station":null,"technologies":[{"identifier":"wireguard_udp"}]}"#;
        let null_techs = r#"{"station":"10.0.0.3","technologies":null}"#;
        let null_identifier = r#"{"station":"10.0.0.4","technologies":[{"identifier":null}]}"#;
        let null_meta_value = r#"{"station":"10.0.0.5","technologies":[{"identifier":"wireguard_udp","metadata":[{"name":"public_key","value":null}]}]}"#;

        for bad in [null_station, null_techs, null_identifier, null_meta_value] {
            let body = format!("[{bad}]");
            let err = list(body).await.unwrap_err();
            assert!(matches!(err, FetchError::Validation(_)), "{bad} gave {err:?}");
            assert!(err.to_string().contains("server 0"));
        }
    }

    #[tokio::test]
    async fn test_null_metadata_is_no_metadata() {
        let body = r#"[{"station":"10.0.0.1","technologies":[{"identifier":"openvpn_udp","metadata":null}]}]"#;

        let servers = list(body).await.unwrap();
        assert!(servers.is_empty());

        let body = r#"[{"station":"10.0.0.1","technologies":[{"identifier":"wireguard_udp","metadata":null}]}]"#;
        let err = list(body).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_public_key_is_decode_error() {
        let body = r#"[{"station":"10.0.0.1","technologies":[{"identifier":"wireguard_udp","metadata":[{"name":"other","value":"x"}]}]}]"#;

        let err = list(body).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_list_unexpected_status() {
        let server = replying(503, "{}").await;
        let err = ServerListFetcher::new(client(), server.uri())
            .list(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedStatus { status: 503 }));
    }

    #[tokio::test]
    async fn test_list_not_an_array() {
        let err = list(r#"{"servers":[]}"#).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_list_invalid_url() {
        let err = ServerListFetcher::new(client(), "::not a url::")
            .list(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
