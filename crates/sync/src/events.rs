//! Annotation lifecycle events emitted by the viewer.
//!
//! The host registers one SDK listener with [`LISTENED_EVENTS`] as its
//! allowlist and hands each callback to [`ViewerEvent::from_sdk`].

use async_trait::async_trait;
use serde_json::Value;

use marginalia_core::adapter::normalize_context;
use marginalia_core::types::{StoreId, ViewerId};
use marginalia_core::viewer::ViewerAnnotation;

use crate::session::SyncError;
use crate::viewer::ViewerError;

pub const ANNOTATION_ADDED: &str = "ANNOTATION_ADDED";
pub const ANNOTATION_UPDATED: &str = "ANNOTATION_UPDATED";
pub const ANNOTATION_DELETED: &str = "ANNOTATION_DELETED";
pub const ANNOTATION_SELECTED: &str = "ANNOTATION_SELECTED";
pub const ANNOTATION_UNSELECTED: &str = "ANNOTATION_UNSELECTED";

/// Event names to pass when registering the viewer's event listener.
pub const LISTENED_EVENTS: [&str; 5] = [
    ANNOTATION_ADDED,
    ANNOTATION_UPDATED,
    ANNOTATION_DELETED,
    ANNOTATION_SELECTED,
    ANNOTATION_UNSELECTED,
];

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Added(ViewerAnnotation),
    Updated(ViewerAnnotation),
    Deleted(ViewerAnnotation),
    Selected(ViewerAnnotation),
    Unselected(ViewerAnnotation),
}

impl ViewerEvent {
    /// Parse a raw SDK callback.
    ///
    /// Returns `Ok(None)` for event types outside [`LISTENED_EVENTS`].
    /// A payload whose `@context` is not an array of strings is repaired
    /// rather than rejected.
    pub fn from_sdk(event_type: &str, mut data: Value) -> Result<Option<Self>, ViewerError> {
        let make: fn(ViewerAnnotation) -> Self = match event_type {
            ANNOTATION_ADDED => Self::Added,
            ANNOTATION_UPDATED => Self::Updated,
            ANNOTATION_DELETED => Self::Deleted,
            ANNOTATION_SELECTED => Self::Selected,
            ANNOTATION_UNSELECTED => Self::Unselected,
            _ => return Ok(None),
        };

        let object = data.as_object_mut().ok_or_else(|| {
            ViewerError::Malformed(format!("{event_type} payload must be a JSON object"))
        })?;
        let context = normalize_context(object.get("@context").unwrap_or(&Value::Null));
        object.insert("@context".to_string(), Value::from(context));

        let annotation: ViewerAnnotation = serde_json::from_value(data)
            .map_err(|e| ViewerError::Malformed(format!("{event_type}: {e}")))?;

        Ok(Some(make(annotation)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Added(_) => ANNOTATION_ADDED,
            Self::Updated(_) => ANNOTATION_UPDATED,
            Self::Deleted(_) => ANNOTATION_DELETED,
            Self::Selected(_) => ANNOTATION_SELECTED,
            Self::Unselected(_) => ANNOTATION_UNSELECTED,
        }
    }

    pub fn annotation(&self) -> &ViewerAnnotation {
        match self {
            Self::Added(a)
            | Self::Updated(a)
            | Self::Deleted(a)
            | Self::Selected(a)
            | Self::Unselected(a) => a,
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Created(StoreId),
    Updated(StoreId),
    Deleted {
        annotation_id: StoreId,
        /// Replies removed because their parent went away.
        orphans: Vec<StoreId>,
    },
    SelectionChanged(Option<ViewerId>),
    /// The event needed no store mutation (e.g. a repeated add).
    Ignored,
}

/// Receiver of viewer annotation events.
#[async_trait]
pub trait AnnotationEvents: Send {
    async fn on_added(&mut self, annotation: ViewerAnnotation) -> Result<EventOutcome, SyncError>;
    async fn on_updated(&mut self, annotation: ViewerAnnotation)
        -> Result<EventOutcome, SyncError>;
    async fn on_deleted(&mut self, annotation: ViewerAnnotation)
        -> Result<EventOutcome, SyncError>;
    async fn on_selected(&mut self, annotation: ViewerAnnotation)
        -> Result<EventOutcome, SyncError>;
    async fn on_unselected(
        &mut self,
        annotation: ViewerAnnotation,
    ) -> Result<EventOutcome, SyncError>;
}

/// Route an event to the matching handler.
pub async fn dispatch<H>(handler: &mut H, event: ViewerEvent) -> Result<EventOutcome, SyncError>
where
    H: AnnotationEvents + ?Sized,
{
    match event {
        ViewerEvent::Added(a) => handler.on_added(a).await,
        ViewerEvent::Updated(a) => handler.on_updated(a).await,
        ViewerEvent::Deleted(a) => handler.on_deleted(a).await,
        ViewerEvent::Selected(a) => handler.on_selected(a).await,
        ViewerEvent::Unselected(a) => handler.on_unselected(a).await,
    }
}
