//! Remote annotation model (store rows) and document scoping.
//!
//! The store wraps each viewer annotation in a row carrying the store id,
//! the owning course section or summary, and bookkeeping timestamps. The
//! inner [`AnnotationBody`] keeps the W3C-style shape the viewer emits,
//! including any fields this crate does not interpret.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{StoreId, Timestamp, ViewerId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Value of `type` on every annotation body.
pub const ANNOTATION_TYPE: &str = "Annotation";

/// Maximum length (in characters) of a free-text `bodyValue`.
pub const MAX_BODY_LENGTH: usize = 10_000;

// ---------------------------------------------------------------------------
// Motivation
// ---------------------------------------------------------------------------

/// Why an annotation exists. Replies point at their parent via
/// [`Target::source`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motivation {
    #[default]
    Commenting,
    Replying,
    Highlighting,
    Bookmarking,
    /// Any value the viewer emits that we do not model explicitly.
    #[serde(untagged)]
    Other(String),
}

impl Motivation {
    /// Wire name, as sent in the `motivation` field.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Commenting => "commenting",
            Self::Replying => "replying",
            Self::Highlighting => "highlighting",
            Self::Bookmarking => "bookmarking",
            Self::Other(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// What an annotation points at. For replies `source` is the parent id;
/// otherwise it identifies the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<serde_json::Value>,
}

/// The viewer-assigned part of a stored annotation.
///
/// `context` is kept as raw JSON because rows written by older clients
/// carry a bare string or nothing at all; the adapter normalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBody {
    #[serde(
        rename = "@context",
        default,
        skip_serializing_if = "serde_json::Value::is_null"
    )]
    pub context: serde_json::Value,

    pub id: ViewerId,

    #[serde(rename = "type", default = "default_type")]
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

    /// SDK fields we pass through untouched (stylesheet, bodyValue formats, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_type() -> String {
    ANNOTATION_TYPE.to_string()
}

impl AnnotationBody {
    /// Minimal body for a new annotation with the given viewer id.
    pub fn new(id: impl Into<ViewerId>) -> Self {
        Self {
            context: serde_json::Value::Null,
            id: id.into(),
            kind: default_type(),
            motivation: None,
            body_value: None,
            target: Target::default(),
            page_number: None,
            creator: None,
            created: None,
            modified: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Whether `motivation` is `replying`.
    pub fn is_reply(&self) -> bool {
        self.motivation == Some(Motivation::Replying)
    }
}

// ---------------------------------------------------------------------------
// Store rows
// ---------------------------------------------------------------------------

/// A row from the remote annotation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_id: StoreId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<String>,
    #[serde(default)]
    pub is_summary: bool,
    pub annotation: AnnotationBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Annotation {
    /// Viewer-assigned id (`annotation.id`), stable across sync.
    pub fn viewer_id(&self) -> &str {
        &self.annotation.id
    }

    /// Whether this row is a reply to another annotation.
    pub fn is_reply(&self) -> bool {
        self.annotation.is_reply()
    }

    /// Id of the annotation this one replies to, if it is a reply.
    pub fn reply_parent(&self) -> Option<&str> {
        self.is_reply().then_some(self.annotation.target.source.as_str())
    }
}

/// DTO for `POST /pdf-annotations` and each entry of a bulk create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_id: Option<String>,
    #[serde(default)]
    pub is_summary: bool,
    pub annotation: AnnotationBody,
}

impl NewAnnotation {
    /// Attach a body to the section or summary that owns it.
    pub fn for_scope(scope: &DocumentScope, annotation: AnnotationBody) -> Self {
        match scope {
            DocumentScope::Section(id) => Self {
                course_section_id: Some(id.clone()),
                summary_id: None,
                is_summary: false,
                annotation,
            },
            DocumentScope::Summary(id) => Self {
                course_section_id: None,
                summary_id: Some(id.clone()),
                is_summary: true,
                annotation,
            },
        }
    }
}

/// One entry of `PUT /pdf-annotations/bulk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    pub annotation_id: StoreId,
    pub annotation: AnnotationBody,
}

// ---------------------------------------------------------------------------
// Document scope
// ---------------------------------------------------------------------------

/// The document whose annotations are being viewed: a course section's PDF
/// or a generated summary. An annotation belongs to at most one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentScope {
    Section(String),
    Summary(String),
}

impl DocumentScope {
    pub fn id(&self) -> &str {
        match self {
            Self::Section(id) | Self::Summary(id) => id,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Self::Summary(_))
    }

    /// Whether a store row is owned by this document.
    pub fn owns(&self, annotation: &Annotation) -> bool {
        match self {
            Self::Section(id) => annotation.course_section_id.as_deref() == Some(id.as_str()),
            Self::Summary(id) => annotation.summary_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section(id) => write!(f, "section:{id}"),
            Self::Summary(id) => write!(f, "summary:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an annotation body before it is sent to the store.
pub fn validate_body(body: &AnnotationBody) -> Result<(), CoreError> {
    if body.id.trim().is_empty() {
        return Err(CoreError::Validation(
            "annotation id must not be empty".to_string(),
        ));
    }

    if body.page_number == Some(0) {
        return Err(CoreError::Validation(
            "pageNumber is 1-based and must be at least 1".to_string(),
        ));
    }

    if let Some(text) = &body.body_value {
        let len = text.chars().count();
        if len > MAX_BODY_LENGTH {
            return Err(CoreError::Validation(format!(
                "bodyValue has {len} characters, maximum is {MAX_BODY_LENGTH}"
            )));
        }
    }

    if body.is_reply() && body.target.source.is_empty() {
        return Err(CoreError::Validation(format!(
            "reply '{}' must reference its parent in target.source",
            body.id
        )));
    }

    Ok(())
}

/// Validate a create payload: ownership fields must be consistent and the
/// body must pass [`validate_body`].
pub fn validate_new_annotation(new: &NewAnnotation) -> Result<(), CoreError> {
    if new.course_section_id.is_some() && new.summary_id.is_some() {
        return Err(CoreError::Validation(
            "an annotation belongs to a course section or a summary, not both".to_string(),
        ));
    }

    if new.is_summary != new.summary_id.is_some() {
        return Err(CoreError::Validation(
            "is_summary must be set exactly when summary_id is present".to_string(),
        ));
    }

    validate_body(&new.annotation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
