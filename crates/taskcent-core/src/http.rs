use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use taskcent_shared::{
    AuthResponse, Credentials, ErrorBody, RawTask, TaskDraft, TaskListResponse, TaskPatch,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::api::{AuthApi, TaskApi};
use crate::error::ApiError;
use crate::task::TaskId;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// REST client for the task API.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base: Url,
    base_url: String,
    token: Option<String>,
    http: HttpClient,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.url must not be empty");
        }
        let base =
            Url::parse(&base_url).with_context(|| format!("invalid api.url {base_url:?}"))?;
        if base.cannot_be_a_base() {
            bail!("api.url {base_url:?} cannot carry a path");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base,
            base_url,
            token: None,
            http,
        })
    }

    /// Requests made by the returned client carry a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends each segment to the base path, percent-encoded, so an id can
    /// never address another resource.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(ApiError::validation(format!("invalid path segment {bad:?}")));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::transport(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<(Uuid, RequestBuilder), ApiError> {
        let url = self.endpoint(segments)?;
        let request_id = Uuid::new_v4();
        let mut builder = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok((request_id, builder))
    }

    async fn send(&self, request_id: Uuid, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|err| connection_error(&self.base_url, &err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| connection_error(&self.base_url, &err))?;
        debug!(
            request_id = %request_id,
            status = status.as_u16(),
            bytes = body.len(),
            "response received"
        );

        if !status.is_success() {
            let err = error_from_response(status, &body);
            warn!(
                request_id = %request_id,
                status = status.as_u16(),
                kind = %err.kind(),
                "request rejected"
            );
            return Err(err);
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request_id: Uuid,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send(request_id, builder).await?;
        serde_json::from_str(&body)
            .map_err(|err| ApiError::invalid_payload(format!("undecodable response: {err}")))
    }
}

#[async_trait]
impl TaskApi for HttpApi {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RawTask>, ApiError> {
        let (request_id, builder) = self.request(Method::GET, &["tasks"])?;
        let listed: TaskListResponse = self.send_json(request_id, builder).await?;
        Ok(listed.into_tasks())
    }

    #[instrument(skip(self, draft))]
    async fn create(&self, draft: &TaskDraft) -> Result<RawTask, ApiError> {
        let (request_id, builder) = self.request(Method::POST, &["tasks"])?;
        self.send_json(request_id, builder.json(draft)).await
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<RawTask, ApiError> {
        let (request_id, builder) = self.request(Method::PUT, &["tasks", id.as_str()])?;
        self.send_json(request_id, builder.json(patch)).await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &TaskId) -> Result<(), ApiError> {
        let (request_id, builder) = self.request(Method::DELETE, &["tasks", id.as_str()])?;
        self.send(request_id, builder).await.map(|_| ())
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let (request_id, builder) = self.request(Method::POST, &["auth", "login"])?;
        self.send_json(request_id, builder.json(credentials)).await
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let (request_id, builder) = self.request(Method::POST, &["auth", "signup"])?;
        self.send_json(request_id, builder.json(credentials)).await
    }
}

fn connection_error(base_url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::transport(format!("request to {base_url} timed out"))
    } else if err.is_connect() {
        ApiError::transport(format!(
            "cannot reach {base_url} -- check api.url and that the server is running"
        ))
    } else {
        ApiError::transport(format!("request to {base_url} failed: {err}"))
    }
}

/// Maps an unsuccessful response onto the error taxonomy. The status picks
/// the kind; the body supplies the detail and the optional code.
pub fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed
        .text()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("server responded with {status}"));

    let err = match status.as_u16() {
        400 | 422 => ApiError::validation(detail),
        401 | 403 => ApiError::permission(detail),
        404 => ApiError::not_found(detail),
        409 => ApiError::conflict(detail),
        _ => ApiError::transport(detail),
    };

    match parsed.code {
        Some(code) if !code.trim().is_empty() => err.with_code(code),
        _ => err,
    }
}
