//! HTTP transport for the SharePoint client.
//!
//! The client never talks to `reqwest` directly. It builds a URL, a body and
//! a [`RequestOptions`] value and hands them to a [`Transport`]. The
//! production implementation is [`HttpTransport`]; tests substitute their
//! own.
//!
//! Responses come back as decoded JSON: an empty body is `Value::Null` and a
//! body that is not JSON is returned as `Value::String`.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::config::Config;
use crate::error::SpError;

/// The OData verbose media type used for Accept and Content-Type.
pub const ODATA_VERBOSE: &str = "application/json;odata=verbose";

/// Header carrying the form digest on state-changing requests.
pub const REQUEST_DIGEST_HEADER: &str = "X-RequestDigest";

/// Header that tunnels MERGE/DELETE through POST.
pub const HTTP_METHOD_HEADER: &str = "X-HTTP-Method";

/// Maximum length for HTTP error response bodies kept in errors.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Per-request headers and credential policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers, sent in order.
    pub headers: Vec<(String, String)>,

    /// Whether the configured cookie and bearer token are attached.
    pub with_credentials: bool,
}

impl RequestOptions {
    /// Options for an anonymous request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a request that carries the configured credentials.
    pub fn credentialed() -> Self {
        Self {
            headers: Vec::new(),
            with_credentials: true,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds the verbose OData Accept and Content-Type headers.
    pub fn verbose(self) -> Self {
        self.header("Accept", ODATA_VERBOSE)
            .header("Content-Type", ODATA_VERBOSE)
    }

    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The HTTP collaborator the client depends on.
pub trait Transport: Send + Sync + 'static {
    /// Issues a GET and returns the decoded body.
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<Value, SpError>> + Send;

    /// Issues a POST with an optional JSON body and returns the decoded body.
    fn post(
        &self,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<Value, SpError>> + Send;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    /// The underlying HTTP client (cloning is cheap).
    http: Client,

    /// Raw `Cookie` header value.
    /// SECURITY: Never log this value!
    cookie: Option<String>,

    /// Bearer token.
    /// SECURITY: Never log this value!
    access_token: Option<String>,

    /// Secrets stripped from error bodies.
    secrets: Vec<String>,

    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SpError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, SpError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SpError::HttpClient)?;

        Ok(Self {
            http,
            cookie: config.cookie().map(str::to_string),
            access_token: config.access_token().map(str::to_string),
            secrets: config.secrets(),
            timeout: config.timeout,
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Value, SpError> {
        tracing::debug!(
            method = %method,
            url = %url,
            credentialed = options.with_credentials,
            "Making SharePoint request"
        );

        let mut req = self.http.request(method.clone(), url);
        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if options.with_credentials {
            if let Some(cookie) = &self.cookie {
                req = req.header(reqwest::header::COOKIE, cookie.as_str());
            }
            if let Some(token) = &self.access_token {
                req = req.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)?;
            if options.header_value("Content-Type").is_none() {
                req = req.header(reqwest::header::CONTENT_TYPE, "application/json");
            }
            req = req.body(bytes);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                return SpError::timeout(self.timeout, format!("{} {}", method, url));
            }
            SpError::Http(e)
        })?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.handle_http_error(status, url, response).await);
        }

        let text = response.text().await.map_err(SpError::Http)?;
        tracing::trace!(body = %text, "SharePoint response");

        Ok(decode_body(text))
    }

    /// Converts a non-success response into an `SpError`.
    async fn handle_http_error(
        &self,
        status: StatusCode,
        url: &str,
        response: reqwest::Response,
    ) -> SpError {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        let body = SpError::sanitize_message(&body, &self.secrets);
        let body = truncate_body(body);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SpError::Authentication,
            StatusCode::NOT_FOUND => SpError::not_found(url),
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Throttled by SharePoint");
                SpError::RateLimited { retry_after }
            }
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => {
                tracing::warn!(status = %status, "SharePoint temporarily unavailable");
                SpError::ServiceUnavailable { status }
            }
            _ => SpError::HttpStatus { status, body },
        }
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<Value, SpError> {
        self.send(Method::GET, url, None, options).await
    }

    async fn post(
        &self,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Value, SpError> {
        self.send(Method::POST, url, body, options).await
    }
}

/// Decodes a response body: empty → null, JSON → value, anything else → string.
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Cuts an error body to `MAX_ERROR_BODY_LEN` bytes on a char boundary.
fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body;
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        let config = Config::new(server.uri())
            .with_cookie("FedAuth=secret-cookie")
            .with_access_token("secret-token");
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_decode_body_shapes() {
        assert_eq!(decode_body(String::new()), Value::Null);
        assert_eq!(decode_body("  \n".to_string()), Value::Null);
        assert_eq!(decode_body(r#"{"a":1}"#.to_string()), json!({"a": 1}));
        assert_eq!(
            decode_body("<html>oops</html>".to_string()),
            Value::String("<html>oops</html>".to_string())
        );
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "é".repeat(400);
        let truncated = truncate_body(body);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() <= MAX_ERROR_BODY_LEN + "...[truncated]".len());
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::credentialed()
            .verbose()
            .header(HTTP_METHOD_HEADER, "MERGE");
        assert!(options.with_credentials);
        assert_eq!(options.header_value("accept"), Some(ODATA_VERBOSE));
        assert_eq!(options.header_value("x-http-method"), Some("MERGE"));
        assert_eq!(options.header_value("If-Match"), None);
    }

    #[tokio::test]
    async fn test_credentials_only_on_credentialed_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("cookie", "FedAuth=secret-cookie"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server);
        let url = format!("{}/secure", server.uri());
        let body = transport
            .get(&url, &RequestOptions::credentialed())
            .await
            .unwrap();
        assert_eq!(body, json!({"ok": true}));

        // Anonymous request does not match the credentialed mock.
        let result = transport.get(&url, &RequestOptions::new()).await;
        assert!(matches!(result, Err(SpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("x-http-method", "POST"))
            .and(header("content-type", ODATA_VERBOSE))
            .and(body_json(json!({"Title": "x"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"d": {"Id": 1}})))
            .mount(&server)
            .await;

        let options = RequestOptions::credentialed()
            .verbose()
            .header(HTTP_METHOD_HEADER, "POST");
        let body = transport(&server)
            .post(
                &format!("{}/items", server.uri()),
                Some(&json!({"Title": "x"})),
                &options,
            )
            .await
            .unwrap();
        assert_eq!(body, json!({"d": {"Id": 1}}));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let body = transport(&server)
            .post(&server.uri(), None, &RequestOptions::credentialed())
            .await
            .unwrap();
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_http_error_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("token secret-token is malformed"),
            )
            .mount(&server)
            .await;

        let transport = transport(&server);
        let options = RequestOptions::credentialed();
        let get = |p: &str| format!("{}{}", server.uri(), p);

        assert!(matches!(
            transport.get(&get("/forbidden"), &options).await,
            Err(SpError::Authentication)
        ));
        match transport.get(&get("/busy"), &options).await {
            Err(SpError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)))
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert!(matches!(
            transport.get(&get("/down"), &options).await,
            Err(SpError::ServiceUnavailable { .. })
        ));
        match transport.get(&get("/bad"), &options).await {
            Err(SpError::HttpStatus { status, body }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(!body.contains("secret-token"));
                assert!(body.contains("[REDACTED]"));
            }
            other => panic!("expected http status error, got {:?}", other),
        }
    }
}
