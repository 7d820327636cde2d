//! Workspace client: authenticated JSON requests against `{host}/api/2.0`.
//!
//! Every resource family (groups, SCIM, secrets, clusters, libraries,
//! workspace, permissions) lives in its own module as a capability trait
//! implementation on [`WorkspaceClient`].

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;
use warden_core::{CreateOutcome, Error, Result};

use crate::config::ClientConfig;

const JSON: &str = "application/json";
const SCIM_JSON: &str = "application/scim+json";

/// Authenticated client for one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    config: Arc<ClientConfig>,
    api_root: Url,
    http_client: reqwest::Client,
}

impl WorkspaceClient {
    /// Build a client for `config.host`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the host or token is empty or the host is
    /// not a URL, and `Transport` when the HTTP client cannot be built.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(Error::invalid_config("no access token configured"));
        }
        let api_root = api_root(&config.host)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::transport(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            api_root,
            http_client,
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Send a JSON request to `path` (relative to the API root).
    ///
    /// Returns the parsed JSON body, the raw text as a JSON string when the
    /// body is not JSON, or `Null` for an empty body.
    ///
    /// # Errors
    ///
    /// Returns `RemoteCall` for any status other than 200, 201 or 204, and
    /// `Transport` when no response arrives.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.send(method, path, &[], body, JSON).await
    }

    /// GET with query parameters.
    pub(crate) async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(Method::GET, path, query, None, JSON).await
    }

    pub(crate) async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, &[], Some(body), JSON).await
    }

    /// SCIM request: same transport, `application/scim+json` media type.
    pub(crate) async fn scim(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        self.send(method, path, query, body, SCIM_JSON).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        media_type: &str,
    ) -> Result<Value> {
        let mut url = self
            .api_root
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_config(format!("invalid API path '{path}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(&self.config.token)
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .header(reqwest::header::ACCEPT, media_type);
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("{method} {url}: {e}")))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("{method} {url}: failed to read body: {e}")))?;
        let payload = parse_body(text);

        debug!(
            %method,
            url = %url,
            status,
            duration_ms = start.elapsed().as_millis(),
            response = %payload,
            "API call"
        );

        if matches!(status, 200 | 201 | 204) {
            Ok(payload)
        } else {
            Err(Error::remote_call(method.as_str(), url.as_str(), status, payload))
        }
    }
}

fn api_root(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(Error::invalid_config("no workspace URL configured"));
    }
    Url::parse(&format!("{host}/api/2.0/"))
        .map_err(|e| Error::invalid_config(format!("invalid workspace URL '{host}': {e}")))
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Fold an "already exists" failure of a create call into its outcome.
pub(crate) fn create_outcome(result: Result<Value>) -> Result<CreateOutcome> {
    match result {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(e) if e.indicates_already_exists() => {
            debug!(error = %e, "create hit an existing object");
            Ok(CreateOutcome::AlreadyExists)
        }
        Err(e) => Err(e),
    }
}

/// Array stored under `key`, or empty when the key is absent. The platform
/// omits empty collections from list responses.
pub(crate) fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// String field of a response object.
pub(crate) fn text_field(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::unexpected_response(format!("missing string field '{key}'")))
}
