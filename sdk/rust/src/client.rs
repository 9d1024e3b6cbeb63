use std::collections::HashMap;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub prompt: String,
    pub backend_ids: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub secrets: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub model_overrides: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisSpec>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisSpec {
    pub backend_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResult {
    pub backend_id: String,
    pub provider: String,
    pub model: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub technical_detail: Option<String>,
    #[serde(default)]
    pub synthesis: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchResponse {
    pub results: Vec<BackendResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub id: String,
    pub display_name: String,
    pub requires_secret: bool,
    pub has_server_secret: bool,
    pub supports_model_listing: bool,
    pub default_model: String,
}

#[derive(Debug, Deserialize)]
struct CsrfTokenResponse {
    token: String,
}

/// Browser-equivalent client: holds the CSRF token (header + cookie) or a bearer token.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
    bearer: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: None,
            bearer: None,
        }
    }

    /// Authenticate with an issued token instead of CSRF.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Fetch a CSRF token and remember it for subsequent state-changing calls.
    pub async fn fetch_csrf_token(&mut self) -> Result<String, Error> {
        let resp = self
            .client
            .get(format!("{}/api/csrf-token", self.base_url))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let body: CsrfTokenResponse = resp.json().await?;
        self.csrf_token = Some(body.token.clone());
        Ok(body.token)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        } else if let Some(token) = &self.csrf_token {
            builder = builder
                .header("x-csrf-token", token)
                .header(reqwest::header::COOKIE, format!("csrf_token={}", token));
        }
        builder
    }

    /// Raw dispatch call; the caller inspects status and headers.
    pub async fn send_dispatch(&self, req: &DispatchRequest) -> Result<Response, reqwest::Error> {
        self.post("/api/dispatch").json(req).send().await
    }

    pub async fn dispatch(&self, req: &DispatchRequest) -> Result<DispatchResponse, Error> {
        let resp = ensure_success(self.send_dispatch(req).await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn backends(&self) -> Result<Vec<BackendInfo>, Error> {
        let mut builder = self.client.get(format!("{}/api/backends", self.base_url));
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        }
        let resp = ensure_success(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn list_models(&self, backend_id: &str, secret: Option<&str>) -> Result<Vec<String>, Error> {
        #[derive(Deserialize)]
        struct Models {
            models: Vec<String>,
        }

        let resp = self
            .post("/api/models")
            .json(&serde_json::json!({ "backendId": backend_id, "secret": secret }))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<Models>().await?.models)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(format!("gateway returned error status {}: {}", status, text).into())
}
