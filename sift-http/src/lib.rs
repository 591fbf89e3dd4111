//! JSON-over-HTTP client shared by every remote integration in Sift.
//!
//! - Per-request options: headers, [`Auth`], query params, timeout, retries
//! - Retries network failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support
//! - Never logs secret values; auth is reported by kind only
//! - Optional raw request/response logging (target `http.raw`) via
//!   `SIFT_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), sift_http::HttpError> {
//! let client = sift_http::HttpClient::new("https://api.example.com/")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", sift_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

const RAW_ENV: &str = "SIFT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const BACKOFF_BASE_MS: u64 = 200;
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_param(name: &str) -> bool {
    SECRET_PARAMS.contains(&name.to_ascii_lowercase().as_str())
}

fn is_secret_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "authorization" || lower.contains("api-key") || lower.contains("token")
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// Status code for API errors, `None` for transport problems.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the client.
///
/// ```
/// use sift_http::Auth;
/// use reqwest::header::{HeaderName, HeaderValue};
///
/// let exa = Auth::Header {
///     name: HeaderName::from_static("x-api-key"),
///     value: HeaderValue::from_static("demo"),
/// };
/// assert_eq!(exa.kind(), "header");
/// assert_eq!(Auth::Bearer("token").kind(), "bearer");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
    /// Custom header, e.g. Exa's `x-api-key`
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Credential passed as a query parameter
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
    None,
}

impl Auth<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs.
///
/// ```
/// use sift_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Some(Auth::Bearer("sk-demo")),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

// ==============================
// Client
// ==============================

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// Relative paths are joined onto the base, so a base with a path segment
    /// should end with `/` (`https://api.openai.com/v1/`).
    ///
    /// ```
    /// use sift_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1/")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 2);
    /// assert_eq!(client.base_url().as_str(), "https://api.example.com/v1/");
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(30),
            max_retries: 2,
        })
    }

    /// Override the default per-request timeout.
    ///
    /// ```
    /// use sift_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// POST JSON with optional Bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.execute(Method::POST, path, Some(body), opts).await
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.execute::<(), T>(Method::GET, path, None, opts).await
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body), opts).await
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    async fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let body_bytes = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("body serialization failed: {e}")))?;

        // Auth is resolved once so every retry sends identical credentials.
        let mut query: Vec<(&str, Cow<'_, str>)> = opts.query.clone().unwrap_or_default();
        let mut bearer: Option<String> = None;
        let mut auth_header: Option<(HeaderName, HeaderValue)> = None;
        match &opts.auth {
            Some(Auth::Bearer(token)) => bearer = Some(sanitize_api_key(token)?),
            Some(Auth::Header { name, value }) => auth_header = Some((name.clone(), value.clone())),
            Some(Auth::Query { name, value }) => query.push((*name, value.clone())),
            Some(Auth::None) | None => {}
        }
        let auth_kind = opts.auth.as_ref().map(Auth::kind).unwrap_or("none");

        let redacted_query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_param(k) {
                    "<redacted>".to_string()
                } else {
                    v.to_string()
                };
                ((*k).to_string(), shown)
            })
            .collect();

        let req_id = format!("r{}", Uuid::new_v4().simple());
        let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if !query.is_empty() {
                let pairs: Vec<(&str, &str)> =
                    query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(headers) = &opts.headers {
                rb = rb.headers(headers.clone());
            }
            if let Some(token) = &bearer {
                rb = rb.bearer_auth(token);
            }
            if let Some((name, value)) = &auth_header {
                rb = rb.header(name.clone(), value.clone());
            }
            if let Some(bytes) = &body_bytes {
                rb = rb.header(CONTENT_TYPE, "application/json").body(bytes.clone());
            }

            tracing::debug!(
                req_id = %req_id,
                attempt = attempt + 1,
                max_retries,
                method = %method,
                host_path = %host_path,
                query = ?redacted_query,
                timeout_ms = timeout.as_millis() as u64,
                auth_kind,
                has_body = body_bytes.is_some(),
                "http.request.start"
            );
            if raw_enabled() {
                let curl = make_curl(&method, &url, opts.headers.as_ref(), body_bytes.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let started = Instant::now();
            let exchange = async {
                let resp = rb.send().await.map_err(|e| e.to_string())?;
                let status = resp.status();
                let headers = resp.headers().clone();
                let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
                Ok::<_, String>((status, headers, bytes))
            }
            .await;

            let (status, headers, bytes) = match exchange {
                Ok(parts) => parts,
                Err(message) if attempt < max_retries => {
                    attempt += 1;
                    let delay = backoff(attempt);
                    tracing::warn!(
                        req_id = %req_id,
                        attempt,
                        max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        message = %message,
                        "http.retrying.network"
                    );
                    sleep(delay).await;
                    continue;
                }
                Err(message) => {
                    tracing::warn!(
                        req_id = %req_id,
                        attempt,
                        message = %message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network(message));
                }
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let upstream_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            tracing::debug!(
                req_id = %req_id,
                %status,
                duration_ms = elapsed_ms,
                body_len = bytes.len(),
                x_request_id = %upstream_id,
                "http.response"
            );
            if raw_enabled() {
                let shown = &bytes[..bytes.len().min(RAW_MAX_BODY)];
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    headers = ?redact_headers(&headers),
                    body = %String::from_utf8_lossy(shown),
                    truncated = bytes.len() > RAW_MAX_BODY,
                    "response"
                );
            }

            let snippet = snip_body(&bytes);
            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id = %req_id,
                        serde_err = %e,
                        body_snippet = %snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet.clone())
                });
            }

            let message = extract_error_message(&bytes);
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if is_429 => backoff(attempt).max(RATE_LIMIT_FLOOR),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id = %req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id = %req_id,
                %status,
                message = %message,
                x_request_id = %upstream_id,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: upstream_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << shift))
}

/// Best-effort curl rendering for repro, with credentials redacted.
fn make_curl(
    method: &Method,
    url: &Url,
    headers: Option<&HeaderMap>,
    body: Option<&[u8]>,
) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    if let Some(headers) = headers {
        for (name, value) in headers {
            let shown = if is_secret_header(name.as_str()) {
                "<redacted>".to_string()
            } else {
                value.to_str().unwrap_or("").to_string()
            };
            parts.push(format!("-H '{}: {}'", name.as_str(), shown.replace('\'', r"'\''")));
        }
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                let end = floor_char_boundary(text, RAW_MAX_BODY);
                parts.push(format!("-d '{}'", text[..end].replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    let mut shown_url = url.clone();
    let redacted: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret_param(&k) { "<redacted>".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if !redacted.is_empty() {
        shown_url.query_pairs_mut().clear().extend_pairs(redacted);
    }
    parts.push(format!("'{}'", shown_url.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

/// Pull a human-readable message out of the common JSON error envelopes.
fn extract_error_message(body: &[u8]) -> String {
    // {"error":{"message":"..."}} (OpenAI, xAI)
    #[derive(Deserialize)]
    struct Nested {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // {"message":"..."} | {"detail":"..."} | {"error":"..."}
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Nested>(body) {
        return env.error.message;
    }
    if let Ok(flat) = serde_json::from_slice::<Flat>(body) {
        for candidate in [flat.message, flat.detail, flat.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= SNIPPET_MAX {
        return text.into_owned();
    }
    let end = floor_char_boundary(&text, SNIPPET_MAX);
    format!("{}...", &text[..end])
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Strip quotes and whitespace that commonly sneak into keys pasted from env files.
fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut key = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    key.retain(|ch| !ch.is_ascii_whitespace());

    if key.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !key.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if key.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build("API key contains control characters".into()));
    }
    HeaderValue::from_str(&format!("Bearer {key}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_message_is_preferred() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "Incorrect API key provided");
    }

    #[test]
    fn flat_error_falls_through_fields() {
        assert_eq!(extract_error_message(br#"{"detail":"quota exceeded"}"#), "quota exceeded");
        assert_eq!(extract_error_message(br#"{"error":"bad request"}"#), "bad request");
    }

    #[test]
    fn non_json_body_is_snipped() {
        let body = "x".repeat(800);
        let msg = extract_error_message(body.as_bytes());
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), SNIPPET_MAX + 3);
    }

    #[test]
    fn api_key_is_cleaned() {
        assert_eq!(sanitize_api_key(" \"sk-abc\n\" ").unwrap(), "sk-abc");
        assert!(sanitize_api_key("   ").is_err());
        assert!(sanitize_api_key("sk-é").is_err());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn curl_redacts_secret_query_params() {
        let url = Url::parse("https://api.example.com/s?q=rust&api_key=sk-123").unwrap();
        let curl = make_curl(&Method::GET, &url, None, None);
        assert!(curl.contains("q=rust"));
        assert!(!curl.contains("sk-123"));
    }
}
