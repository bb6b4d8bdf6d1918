//! HTTP client for the `/pdf-annotations` endpoints.
//!
//! Every call attaches `Authorization: Bearer <token>` from the configured
//! [`TokenProvider`]. Calls are fire-once: there is no retry, and a non-2xx
//! answer becomes [`ClientError::Api`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use marginalia_core::annotation::{
    validate_body, validate_new_annotation, Annotation, AnnotationBody, AnnotationPatch,
    DocumentScope, NewAnnotation,
};
use marginalia_core::query::{AnnotationPage, AnnotationQuery, DEFAULT_PER_PAGE};
use marginalia_core::types::StoreId;

use crate::auth::{StaticToken, TokenProvider};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Resource path under the API base URL.
const RESOURCE: &str = "pdf-annotations";

/// Upper bound on pages fetched by [`AnnotationApi::list_all`], in case the
/// server never reports an end.
const MAX_PAGES: u32 = 1_000;

/// HTTP client for the annotation store.
pub struct AnnotationApi {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    per_page: u32,
}

/// Body of a list or bulk response: a bare array or a paged envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Annotation>),
    Paged(AnnotationPage),
}

/// Body of a single-record response, with or without a `data` wrapper.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordBody<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> RecordBody<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

impl AnnotationApi {
    /// Create a client for the API at `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, tokens)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Build a client from [`ClientConfig`], using its static token.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let tokens: Arc<dyn TokenProvider> = match &config.token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(StaticToken::none()),
        };
        Ok(Self::with_client(client, config.base_url.clone(), tokens).with_per_page(config.per_page))
    }

    /// Page size used by [`Self::list_all`].
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /pdf-annotations`
    pub async fn create(&self, new: &NewAnnotation) -> Result<Annotation, ClientError> {
        validate_new_annotation(new)?;
        let request = self.authorized(self.client.post(self.url("")))?.json(new);
        let created: RecordBody<Annotation> = Self::send_json(request).await?;
        let created = created.into_inner();

        tracing::debug!(
            annotation_id = %created.annotation_id,
            viewer_id = %created.viewer_id(),
            "Annotation created",
        );
        Ok(created)
    }

    /// `GET /pdf-annotations?...` for a single page.
    pub async fn list(&self, query: &AnnotationQuery) -> Result<AnnotationPage, ClientError> {
        query.validate()?;
        let query_string = query.to_query_string();
        let url = if query_string.is_empty() {
            self.url("")
        } else {
            format!("{}?{query_string}", self.url(""))
        };

        let request = self.authorized(self.client.get(url))?;
        let body: ListBody = Self::send_json(request).await?;

        Ok(match body {
            ListBody::Paged(page) => page,
            ListBody::Bare(data) => AnnotationPage {
                data,
                total: None,
                page: query.page,
                per_page: query.per_page,
            },
        })
    }

    /// Fetch every annotation owned by `scope`, walking pages until the
    /// store reports no more.
    ///
    /// Page boundaries follow what the server returns, so a server that
    /// clamps `per_page` below the requested size is still read to the end.
    pub async fn list_all(&self, scope: &DocumentScope) -> Result<Vec<Annotation>, ClientError> {
        let mut all = Vec::new();
        let mut exhausted = false;

        for page_number in 1..=MAX_PAGES {
            let query = AnnotationQuery::for_scope(scope)
                .page(page_number)
                .per_page(self.per_page);
            let page = self.list(&query).await?;
            let fetched = page.data.len();
            let more = page.has_more(all.len() + fetched, self.per_page);
            all.extend(page.data);

            if fetched == 0 || !more {
                exhausted = true;
                break;
            }
        }

        if !exhausted {
            tracing::warn!(
                scope = %scope,
                max_pages = MAX_PAGES,
                count = all.len(),
                "Stopped paging at the page limit, result may be incomplete",
            );
        }

        tracing::debug!(scope = %scope, count = all.len(), "Fetched document annotations");
        Ok(all)
    }

    /// `GET /pdf-annotations/{id}`
    pub async fn get(&self, annotation_id: &str) -> Result<Annotation, ClientError> {
        let request = self.authorized(self.client.get(self.url(&format!("/{annotation_id}"))))?;
        let record: RecordBody<Annotation> = Self::send_json(request).await?;
        Ok(record.into_inner())
    }

    /// `PUT /pdf-annotations/{id}`
    pub async fn update(
        &self,
        annotation_id: &str,
        body: &AnnotationBody,
    ) -> Result<Annotation, ClientError> {
        validate_body(body)?;
        let payload = serde_json::json!({ "annotation": body });
        let request = self
            .authorized(self.client.put(self.url(&format!("/{annotation_id}"))))?
            .json(&payload);
        let record: RecordBody<Annotation> = Self::send_json(request).await?;

        tracing::debug!(annotation_id, "Annotation updated");
        Ok(record.into_inner())
    }

    /// `DELETE /pdf-annotations/{id}`
    pub async fn delete(&self, annotation_id: &str) -> Result<(), ClientError> {
        let request =
            self.authorized(self.client.delete(self.url(&format!("/{annotation_id}"))))?;
        Self::send(request).await?;

        tracing::debug!(annotation_id, "Annotation deleted");
        Ok(())
    }

    /// `POST /pdf-annotations/bulk`. An empty batch sends nothing.
    pub async fn bulk_create(&self, batch: &[NewAnnotation]) -> Result<Vec<Annotation>, ClientError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        for new in batch {
            validate_new_annotation(new)?;
        }

        let payload = serde_json::json!({ "annotations": batch });
        let request = self
            .authorized(self.client.post(self.url("/bulk")))?
            .json(&payload);
        let body: ListBody = Self::send_json(request).await?;
        Ok(Self::list_data(body))
    }

    /// `PUT /pdf-annotations/bulk`. An empty batch sends nothing.
    pub async fn bulk_update(
        &self,
        patches: &[AnnotationPatch],
    ) -> Result<Vec<Annotation>, ClientError> {
        if patches.is_empty() {
            return Ok(Vec::new());
        }
        for patch in patches {
            validate_body(&patch.annotation)?;
        }

        let payload = serde_json::json!({ "annotations": patches });
        let request = self
            .authorized(self.client.put(self.url("/bulk")))?
            .json(&payload);
        let body: ListBody = Self::send_json(request).await?;
        Ok(Self::list_data(body))
    }

    /// `DELETE /pdf-annotations/bulk`. An empty id list sends nothing.
    pub async fn bulk_delete(&self, annotation_ids: &[StoreId]) -> Result<(), ClientError> {
        if annotation_ids.is_empty() {
            return Ok(());
        }

        let payload = serde_json::json!({ "annotation_ids": annotation_ids });
        let request = self
            .authorized(self.client.delete(self.url("/bulk")))?
            .json(&payload);
        Self::send(request).await?;

        tracing::info!(count = annotation_ids.len(), "Annotations bulk deleted");
        Ok(())
    }

    // ---- private helpers ----

    fn url(&self, suffix: &str) -> String {
        format!("{}/{RESOURCE}{suffix}", self.base_url)
    }

    /// Attach the bearer token, failing before anything is sent when there
    /// is none.
    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let token = self
            .tokens
            .bearer_token()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::MissingCredential)?;
        Ok(request.bearer_auth(token))
    }

    fn list_data(body: ListBody) -> Vec<Annotation> {
        match body {
            ListBody::Bare(data) => data,
            ListBody::Paged(page) => page.data,
        }
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await?;
        Self::ensure_success(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = Self::send(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Turn a non-2xx response into [`ClientError::Api`], preferring the
    /// server's own message over the status line.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = server_message(&body).unwrap_or_else(|| status.to_string());

        tracing::warn!(status = status.as_u16(), message = %message, "Annotation API request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extract `message`, `error`, or `detail` from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}
