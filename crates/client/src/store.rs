//! The store operations the viewer bridge relies on.
//!
//! Kept as a trait so the bridge can run against an in-memory store in
//! tests and against [`AnnotationApi`] in production.

use async_trait::async_trait;

use marginalia_core::annotation::{Annotation, AnnotationBody, DocumentScope, NewAnnotation};
use marginalia_core::types::StoreId;

use crate::api::AnnotationApi;
use crate::error::ClientError;

#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn create(&self, new: &NewAnnotation) -> Result<Annotation, ClientError>;

    /// Every annotation owned by `scope`, across all pages.
    async fn list_all(&self, scope: &DocumentScope) -> Result<Vec<Annotation>, ClientError>;

    async fn update(
        &self,
        annotation_id: &str,
        body: &AnnotationBody,
    ) -> Result<Annotation, ClientError>;

    async fn delete(&self, annotation_id: &str) -> Result<(), ClientError>;

    /// Remove several rows in one call. Must not contact the store for an
    /// empty list.
    async fn bulk_delete(&self, annotation_ids: &[StoreId]) -> Result<(), ClientError>;
}

#[async_trait]
impl AnnotationStore for AnnotationApi {
    async fn create(&self, new: &NewAnnotation) -> Result<Annotation, ClientError> {
        AnnotationApi::create(self, new).await
    }

    async fn list_all(&self, scope: &DocumentScope) -> Result<Vec<Annotation>, ClientError> {
        AnnotationApi::list_all(self, scope).await
    }

    async fn update(
        &self,
        annotation_id: &str,
        body: &AnnotationBody,
    ) -> Result<Annotation, ClientError> {
        AnnotationApi::update(self, annotation_id, body).await
    }

    async fn delete(&self, annotation_id: &str) -> Result<(), ClientError> {
        AnnotationApi::delete(self, annotation_id).await
    }

    async fn bulk_delete(&self, annotation_ids: &[StoreId]) -> Result<(), ClientError> {
        AnnotationApi::bulk_delete(self, annotation_ids).await
    }
}
