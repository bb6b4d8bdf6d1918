//! Capability interface over the embedded PDF viewer.
//!
//! Only the four annotation-manager calls the bridge uses are modelled.
//! The host application implements this against the real viewer SDK.

use async_trait::async_trait;

use marginalia_core::viewer::{ViewerAnnotation, ViewerFilter};

/// Errors reported by the viewer's annotation manager.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The viewer rejected a call (its promise was rejected).
    #[error("Viewer rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// An event payload could not be understood.
    #[error("Malformed viewer event: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ViewerHandle: Send + Sync {
    /// Insert annotations into the live viewer.
    async fn add_annotations(&self, annotations: Vec<ViewerAnnotation>) -> Result<(), ViewerError>;

    /// Annotations currently held by the viewer.
    async fn get_annotations(&self) -> Result<Vec<ViewerAnnotation>, ViewerError>;

    /// Remove annotations matching `filter`.
    async fn delete_annotations(&self, filter: ViewerFilter) -> Result<(), ViewerError>;

    /// Replace an annotation in place, matched by id.
    async fn update_annotation(&self, annotation: ViewerAnnotation) -> Result<(), ViewerError>;
}
