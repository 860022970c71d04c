//! Fetcher stage
//!
//! Obtains the raw value for one data item:
//! - static: the literal in the spec
//! - http: the response body, parsed as JSON when possible
//! - socket: the first data frame, parsed as JSON when possible
//! - script: the script's return value
//!
//! [`DataFetcher`] is the seam the executor depends on; [`SourceFetcher`] is
//! the production implementation.

use crate::error::FetchError;
use crate::expr::Scope;
use crate::script::{ExpressionEngine, ScriptEngine};
use async_trait::async_trait;
use dashflow_types::{FetchSpec, HttpMethod, HttpSpec, ScriptSpec, SocketSpec};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Obtains raw data for a fetch spec
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Fetch the raw value described by `spec`
    async fn fetch(&self, spec: &FetchSpec) -> Result<Value, FetchError>;
}

/// Transport settings for [`SourceFetcher`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Default HTTP timeout
    pub http_timeout_ms: u64,
    /// Default wait for the first socket frame
    pub socket_timeout_ms: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl FetcherConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With HTTP timeout
    #[inline]
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_ms = duration_ms(timeout);
        self
    }

    /// With socket timeout
    #[inline]
    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout_ms = duration_ms(timeout);
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: 10_000,
            socket_timeout_ms: 10_000,
            user_agent: format!("dashflow/{}", crate::VERSION),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Production fetcher over reqwest, tokio-tungstenite and a script engine
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    scripts: Arc<dyn ScriptEngine>,
}

impl SourceFetcher {
    /// Create fetcher
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            config,
            scripts: Arc::new(ExpressionEngine),
        })
    }

    /// Use a different script engine
    #[inline]
    #[must_use]
    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.scripts = engine;
        self
    }

    async fn fetch_http(&self, spec: &HttpSpec) -> Result<Value, FetchError> {
        let mut url =
            reqwest::Url::parse(&spec.url).map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", spec.url)))?;
        let method = http_method(spec.method);

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &spec.params {
                pairs.append_pair(key, &query_value(value));
            }
            if spec.method.uses_query() {
                if let Some(Value::Object(body)) = &spec.body {
                    for (key, value) in body {
                        pairs.append_pair(key, &query_value(value));
                    }
                }
            }
        }
        // An untouched query_pairs_mut still leaves a trailing '?'
        if url.query() == Some("") {
            url.set_query(None);
        }

        let timeout = Duration::from_millis(spec.timeout_ms.unwrap_or(self.config.http_timeout_ms));
        let mut request = self.client.request(method, url.clone()).timeout(timeout);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !spec.method.uses_query() {
            if let Some(body) = &spec.body {
                request = request.json(body);
            }
        }

        debug!(url = %url, method = ?spec.method, "http fetch");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = response.text().await?;
        Ok(decode_body(&text))
    }

    async fn fetch_socket(&self, spec: &SocketSpec) -> Result<Value, FetchError> {
        let mut request = spec.url.as_str().into_client_request()?;
        if !spec.protocols.is_empty() {
            let header = HeaderValue::from_str(&spec.protocols.join(", "))
                .map_err(|e| FetchError::InvalidHeader(e.to_string()))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", header);
        }

        let after_ms = spec.timeout_ms.unwrap_or(self.config.socket_timeout_ms);
        tokio::time::timeout(
            Duration::from_millis(after_ms),
            first_frame(request, spec.subscribe.as_ref()),
        )
        .await
        .map_err(|_| FetchError::Timeout { after_ms })?
    }

    fn run_script(&self, spec: &ScriptSpec) -> Result<Value, FetchError> {
        let mut scope = Scope::new();
        scope.extend_from_object(&spec.context);
        scope.set("context", spec.context.clone());
        Ok(self.scripts.run(&spec.source, &scope)?)
    }
}

fn http_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

async fn first_frame(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    subscribe: Option<&Value>,
) -> Result<Value, FetchError> {
    let (mut stream, _) = connect_async(request).await?;
    if let Some(subscribe) = subscribe {
        stream.send(Message::Text(subscribe.to_string().into())).await?;
    }

    let mut result = Err(FetchError::SocketClosed);
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                result = Ok(decode_body(text.as_str()));
                break;
            }
            Message::Binary(bytes) => {
                result = Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }));
                break;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    if let Err(e) = stream.close(None).await {
        debug!(error = %e, "socket close after first frame failed");
    }
    result
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a response body as JSON, falling back to the raw string
#[must_use]
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl DataFetcher for SourceFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<Value, FetchError> {
        let result = match spec {
            FetchSpec::Static { value } => Ok(value.clone()),
            FetchSpec::Http(http) => self.fetch_http(http).await,
            FetchSpec::Socket(socket) => self.fetch_socket(socket).await,
            FetchSpec::Script(script) => self.run_script(script),
        };
        if let Err(e) = &result {
            warn!(source_type = %spec.source_type(), error = %e, "fetch failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(FetcherConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn static_returns_literal() {
        let value = fetcher()
            .fetch(&FetchSpec::Static {
                value: json!({"temperature": 25.6}),
            })
            .await
            .unwrap();
        assert_eq!(value, json!({"temperature": 25.6}));
    }

    #[tokio::test]
    async fn script_sees_context() {
        let spec = FetchSpec::Script(ScriptSpec {
            source: "return base * factor + context.offset;".into(),
            context: json!({"base": 10, "factor": 2, "offset": 1}),
        });
        assert_eq!(fetcher().fetch(&spec).await.unwrap(), json!(21));
    }

    #[tokio::test]
    async fn script_failure_is_an_error() {
        let spec = FetchSpec::Script(ScriptSpec {
            source: "nope(".into(),
            context: Value::Null,
        });
        assert!(matches!(
            fetcher().fetch(&spec).await,
            Err(FetchError::Script(_))
        ));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let spec = FetchSpec::Http(HttpSpec::get("not a url"));
        assert!(matches!(
            fetcher().fetch(&spec).await,
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn body_decoding() {
        assert_eq!(decode_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(decode_body("plain"), json!("plain"));
        assert_eq!(decode_body("  "), Value::Null);
    }
}
