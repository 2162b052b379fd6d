//! Outbound HTTP: the authoring backend and platform private endpoints.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a JSON document. `Ok(None)` on 404.
    async fn get_json(&self, url: &str) -> Result<Option<Value>>;

    /// POST an urlencoded form and decode the JSON reply.
    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            bail!("GET {} returned {}", url, resp.status());
        }
        let body = resp
            .json::<Value>()
            .await
            .with_context(|| format!("GET {} returned malformed JSON", url))?;
        Ok(Some(body))
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value> {
        let mut request = self.client.post(url).form(form);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;
        if !resp.status().is_success() {
            bail!("POST {} returned {}", url, resp.status());
        }
        resp.json::<Value>()
            .await
            .with_context(|| format!("POST {} returned malformed JSON", url))
    }
}

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub form: Vec<(String, String)>,
}

/// Canned responses keyed by URL prefix; unmatched calls fail like a
/// network error. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<Vec<(String, Option<Value>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url_prefix: &str, body: Value) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push((url_prefix.to_string(), Some(body)));
        }
        self
    }

    /// Answer 404 for `url_prefix`.
    pub fn not_found(&self, url_prefix: &str) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push((url_prefix.to_string(), None));
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lookup(&self, method: &'static str, url: &str, form: &[(String, String)]) -> Result<Option<Value>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method,
                url: url.to_string(),
                form: form.to_vec(),
            });
        }
        let responses = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted transport poisoned"))?;
        match responses.iter().find(|(prefix, _)| url.starts_with(prefix.as_str())) {
            Some((_, body)) => Ok(body.clone()),
            None => bail!("connection refused: {}", url),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        self.lookup("GET", url, &[])
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        _headers: &[(String, String)],
    ) -> Result<Value> {
        match self.lookup("POST", url, form)? {
            Some(body) => Ok(body),
            None => bail!("POST {} returned 404 Not Found", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Article>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the authoring backend's article endpoints.
#[derive(Clone)]
pub struct ArticleBackend {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl ArticleBackend {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// `GET /api/articles/:id?format=raw`
    pub async fn fetch_raw(&self, article_id: &str) -> Result<Article> {
        let url = format!("{}/api/articles/{}?format=raw", self.base_url, article_id);
        debug!("[backend] GET {}", url);
        let body = self
            .transport
            .get_json(&url)
            .await?
            .with_context(|| format!("article {} not found", article_id))?;
        unwrap_envelope(body).with_context(|| format!("article {} unavailable", article_id))
    }

    /// Short-form content already rewritten for `platform`, if any.
    pub async fn fetch_prepared(&self, article_id: &str, platform: &str) -> Result<Option<Article>> {
        let url = format!(
            "{}/api/articles/{}/platform-content?platform={}",
            self.base_url, article_id, platform
        );
        debug!("[backend] GET {}", url);
        let Some(body) = self.transport.get_json(&url).await? else {
            return Ok(None);
        };
        match unwrap_envelope(body) {
            Ok(article) if !article.content.trim().is_empty() => Ok(Some(article)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("[backend] no prepared {} content for {}: {:#}", platform, article_id, e);
                Ok(None)
            }
        }
    }
}

fn unwrap_envelope(body: Value) -> Result<Article> {
    let envelope: Envelope = serde_json::from_value(body).context("unexpected backend response")?;
    if !envelope.success {
        bail!(
            "backend reported failure: {}",
            envelope.message.unwrap_or_else(|| "no message".to_string())
        );
    }
    envelope.data.context("backend response has no data")
}
