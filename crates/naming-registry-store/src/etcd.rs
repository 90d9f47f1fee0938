//! etcd v2 transport
//!
//! Speaks the etcd v2 keys API (`/v2/keys/<key>`) over HTTP:
//!
//! | primitive          | request                                                   |
//! |--------------------|-----------------------------------------------------------|
//! | create             | `PUT ?prevExist=false` with form `value=<v>`              |
//! | compare-and-set    | `PUT ?prevExist=true&prevValue=<old>` with form `value=<v>` |
//! | get                | `GET ?quorum=<bool>&recursive=<bool>`                     |
//! | delete             | `DELETE ?recursive=<bool>`                                |
//!
//! Endpoints are tried in order starting from the one that answered last.
//! Only refused or failed connections move on to the next endpoint; a timed out
//! request is reported as [`TransportError::Timeout`] straight away.

use async_trait::async_trait;
use naming_registry_core::{GetOptions, KvNode, KvTransport, TransportError, TransportResult};
use reqwest::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::wire::{KeysResponse, WireError};

/// Per-request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// KV transport backed by an etcd v2 cluster
#[derive(Debug)]
pub struct EtcdTransport {
    /// Shared connection pool
    http: reqwest::Client,
    /// Cluster member base URLs
    endpoints: Vec<Url>,
    /// Index of the endpoint that answered last
    pinned: AtomicUsize,
    /// Deadline applied to every request
    request_timeout: Duration,
}

impl EtcdTransport {
    /// Create a transport for the given cluster members.
    pub fn new<I, S>(endpoints: I, request_timeout: Duration) -> TransportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|endpoint| parse_endpoint(endpoint.as_ref()))
            .collect::<TransportResult<Vec<_>>>()?;
        if endpoints.is_empty() {
            return Err(TransportError::NoEndpoints);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        debug!(
            endpoints = endpoints.len(),
            timeout_ms = request_timeout.as_millis() as u64,
            "Created etcd transport"
        );

        Ok(Self {
            http,
            endpoints,
            pinned: AtomicUsize::new(0),
            request_timeout,
        })
    }

    /// Create a transport with [`DEFAULT_REQUEST_TIMEOUT`].
    pub fn with_default_timeout<I, S>(endpoints: I) -> TransportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(endpoints, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Build `<endpoint>/v2/keys/<key>` with each key segment escaped.
    fn keys_url(endpoint: &Url, key: &str) -> Url {
        let mut url = endpoint.clone();
        // parse_endpoint only accepts http(s) URLs, which always have a path
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v2", "keys"])
                .extend(key.split('/').filter(|segment| !segment.is_empty()));
        }
        url
    }

    fn map_request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else {
            TransportError::Connection(err.to_string())
        }
    }

    /// Send one keys request, failing over between endpoints on connection errors.
    async fn send(
        &self,
        method: Method,
        key: &str,
        query: &[(&str, String)],
        value: Option<&str>,
    ) -> TransportResult<KvNode> {
        let count = self.endpoints.len();
        let start = self.pinned.load(Ordering::Relaxed) % count;
        let mut last_error = None;

        for offset in 0..count {
            let index = (start + offset) % count;
            let endpoint = &self.endpoints[index];

            let mut request = self
                .http
                .request(method.clone(), Self::keys_url(endpoint, key))
                .query(query);
            if let Some(value) = value {
                request = request.form(&[("value", value)]);
            }

            match request.send().await {
                Ok(response) => {
                    if index != start {
                        self.pinned.store(index, Ordering::Relaxed);
                    }
                    return self.decode(response).await;
                }
                Err(err) if err.is_connect() => {
                    warn!(
                        endpoint = %endpoint,
                        error = %err,
                        "Store endpoint unreachable, trying next"
                    );
                    last_error = Some(TransportError::Connection(format!("{}: {}", endpoint, err)));
                }
                Err(err) => return Err(self.map_request_error(err)),
            }
        }

        Err(last_error.unwrap_or(TransportError::NoEndpoints))
    }

    async fn decode(&self, response: reqwest::Response) -> TransportResult<KvNode> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if status.is_success() {
            let parsed: KeysResponse =
                serde_json::from_slice(&body).map_err(|e| TransportError::InvalidResponse {
                    status: status.as_u16(),
                    message: e.to_string(),
                })?;
            return Ok(parsed.node.into());
        }

        match serde_json::from_slice::<WireError>(&body) {
            Ok(err) => Err(TransportError::Store(err.into())),
            Err(_) => Err(TransportError::InvalidResponse {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }
}

#[async_trait]
impl KvTransport for EtcdTransport {
    #[instrument(skip(self, value))]
    async fn create(&self, key: &str, value: &str) -> TransportResult<()> {
        self.send(
            Method::PUT,
            key,
            &[("prevExist", "false".to_string())],
            Some(value),
        )
        .await?;
        debug!(key = %key, "Created key");
        Ok(())
    }

    #[instrument(skip(self, value, prev_value))]
    async fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        prev_value: &str,
    ) -> TransportResult<()> {
        self.send(
            Method::PUT,
            key,
            &[
                ("prevExist", "true".to_string()),
                ("prevValue", prev_value.to_string()),
            ],
            Some(value),
        )
        .await?;
        debug!(key = %key, "Swapped key value");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str, options: GetOptions) -> TransportResult<KvNode> {
        self.send(
            Method::GET,
            key,
            &[
                ("quorum", options.quorum.to_string()),
                ("recursive", options.recursive.to_string()),
            ],
            None,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str, recursive: bool) -> TransportResult<()> {
        self.send(
            Method::DELETE,
            key,
            &[("recursive", recursive.to_string())],
            None,
        )
        .await?;
        debug!(key = %key, "Deleted key");
        Ok(())
    }
}

fn parse_endpoint(endpoint: &str) -> TransportResult<Url> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naming_registry_core::StoreErrorCode;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn leaf_body(action: &str, key: &str, value: &str) -> serde_json::Value {
        serde_json::json!({
            "action": action,
            "node": {"key": key, "value": value, "modifiedIndex": 3, "createdIndex": 3}
        })
    }

    #[test]
    fn test_rejects_empty_endpoint_list() {
        let result = EtcdTransport::new(Vec::<String>::new(), DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(TransportError::NoEndpoints)));
    }

    #[test]
    fn test_rejects_invalid_endpoints() {
        let result = EtcdTransport::with_default_timeout(["not a url"]);
        assert!(matches!(result, Err(TransportError::InvalidEndpoint { .. })));

        let result = EtcdTransport::with_default_timeout(["unix:///var/run/etcd.sock"]);
        assert!(matches!(result, Err(TransportError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_keys_url_escapes_segments() {
        let endpoint = Url::parse("http://127.0.0.1:2379/").unwrap();
        assert_eq!(
            EtcdTransport::keys_url(&endpoint, "foo/bar").as_str(),
            "http://127.0.0.1:2379/v2/keys/foo/bar"
        );
        assert_eq!(
            EtcdTransport::keys_url(&endpoint, "/a b//c").as_str(),
            "http://127.0.0.1:2379/v2/keys/a%20b/c"
        );
        assert_eq!(
            EtcdTransport::keys_url(&endpoint, "").as_str(),
            "http://127.0.0.1:2379/v2/keys"
        );
    }

    #[tokio::test]
    async fn test_create_sends_prev_exist_false() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/keys/foo"))
            .and(query_param("prevExist", "false"))
            .and(body_string("value=model"))
            .respond_with(ResponseTemplate::new(201).set_body_json(leaf_body("create", "/foo", "model")))
            .expect(1)
            .mount(&server)
            .await;

        let transport = EtcdTransport::with_default_timeout([server.uri()]).unwrap();
        transport.create("foo", "model").await.unwrap();
    }

    #[tokio::test]
    async fn test_compare_and_set_sends_prev_value() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/keys/foo"))
            .and(query_param("prevExist", "true"))
            .and(query_param("prevValue", "model"))
            .and(body_string("value=charm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leaf_body("compareAndSwap", "/foo", "charm")))
            .expect(1)
            .mount(&server)
            .await;

        let transport = EtcdTransport::with_default_timeout([server.uri()]).unwrap();
        transport.compare_and_set("foo", "charm", "model").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_decodes_leaf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/keys/foo"))
            .and(query_param("quorum", "true"))
            .and(query_param("recursive", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leaf_body("get", "/foo", "page")))
            .mount(&server)
            .await;

        let transport = EtcdTransport::with_default_timeout([server.uri()]).unwrap();
        let node = transport.get("foo", GetOptions::quorum()).await.unwrap();
        assert_eq!(node, KvNode::leaf("/foo", "page"));
    }

    #[tokio::test]
    async fn test_store_error_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/keys/foo"))
            .and(query_param("recursive", "true"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errorCode": 100,
                "message": "Key not found",
                "cause": "/foo",
                "index": 9
            })))
            .mount(&server)
            .await;

        let transport = EtcdTransport::with_default_timeout([server.uri()]).unwrap();
        let err = transport.delete("foo", true).await.unwrap_err();
        assert_eq!(err.store_code(), Some(StoreErrorCode::KeyNotFound));
    }

    #[tokio::test]
    async fn test_undecodable_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let transport = EtcdTransport::with_default_timeout([server.uri()]).unwrap();
        let err = transport.get("foo", GetOptions::default()).await.unwrap_err();
        match err {
            TransportError::InvalidResponse { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(leaf_body("get", "/foo", "model"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let timeout = Duration::from_millis(50);
        let transport = EtcdTransport::new([server.uri()], timeout).unwrap();
        let err = transport.get("foo", GetOptions::quorum()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(t) if t == timeout));
    }

    #[tokio::test]
    async fn test_fails_over_to_next_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/keys/foo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(leaf_body("get", "/foo", "model")))
            .expect(2)
            .mount(&server)
            .await;

        // Nothing listens on port 1
        let transport =
            EtcdTransport::with_default_timeout(["http://127.0.0.1:1", server.uri().as_str()])
                .unwrap();

        let node = transport.get("foo", GetOptions::quorum()).await.unwrap();
        assert_eq!(node.value(), Some("model"));
        assert_eq!(transport.pinned.load(Ordering::Relaxed), 1);

        // The answering endpoint stays pinned
        transport.get("foo", GetOptions::quorum()).await.unwrap();
    }

    #[tokio::test]
    async fn test_all_endpoints_unreachable() {
        let transport =
            EtcdTransport::with_default_timeout(["http://127.0.0.1:1", "http://127.0.0.1:2"])
                .unwrap();
        let err = transport.get("foo", GetOptions::quorum()).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
