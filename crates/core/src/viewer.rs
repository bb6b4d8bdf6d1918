//! Viewer-side annotation shape.
//!
//! The embedded PDF viewer works with flat annotation objects and rejects
//! any whose `@context` is not an array. Values of [`ViewerAnnotation`] are
//! always produced through [`crate::adapter`], which enforces that.

use serde::{Deserialize, Serialize};

use crate::annotation::{Motivation, Target};
use crate::types::{Timestamp, ViewerId};

/// An annotation as held by the live viewer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerAnnotation {
    #[serde(rename = "@context", default)]
    pub context: Vec<String>,

    pub id: ViewerId,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<Motivation>,

    #[serde(rename = "bodyValue", default, skip_serializing_if = "Option::is_none")]
    pub body_value: Option<String>,

    #[serde(default)]
    pub target: Target,

    #[serde(rename = "pageNumber", default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<Timestamp>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Selects annotations for removal from the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerFilter {
    /// Annotations with these viewer ids.
    AnnotationIds(Vec<ViewerId>),
    /// Every annotation on pages `start..=end` (1-based).
    PageRange { start: u32, end: u32 },
    /// Everything loaded in the viewer.
    All,
}

impl ViewerFilter {
    /// Whether an annotation is selected by this filter.
    pub fn matches(&self, annotation: &ViewerAnnotation) -> bool {
        match self {
            Self::AnnotationIds(ids) => ids.iter().any(|id| *id == annotation.id),
            Self::PageRange { start, end } => annotation
                .page_number
                .is_some_and(|page| page >= *start && page <= *end),
            Self::All => true,
        }
    }
}
