//! Conversion between store rows and viewer annotations.
//!
//! Both directions are pure. The only normalization is on `@context`
//! (always an array of URIs on the way out) and, towards the store, the
//! `motivation` / `type` defaults.

use crate::annotation::{
    Annotation, AnnotationBody, DocumentScope, Motivation, NewAnnotation, ANNOTATION_TYPE,
};
use crate::viewer::ViewerAnnotation;

/// `@context` used whenever a stored value is missing or malformed.
pub const DEFAULT_CONTEXT: [&str; 2] = [
    "https://www.w3.org/ns/anno.jsonld",
    "https://comments.acrobat.com/ns/anno.jsonld",
];

pub fn default_context() -> Vec<String> {
    DEFAULT_CONTEXT.iter().map(|s| s.to_string()).collect()
}

/// Normalize a stored `@context` into the array form the viewer requires.
///
/// A non-empty array of strings is kept as-is. Anything else (absent,
/// a bare string, an empty array, non-string elements) yields
/// [`DEFAULT_CONTEXT`].
pub fn normalize_context(raw: &serde_json::Value) -> Vec<String> {
    let Some(items) = raw.as_array() else {
        return default_context();
    };
    if items.is_empty() {
        return default_context();
    }

    let strings: Option<Vec<String>> = items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect();

    strings.unwrap_or_else(default_context)
}

/// Same rule as [`normalize_context`], for a context that is already typed.
fn normalize_context_list(context: &[String]) -> Vec<String> {
    if context.is_empty() {
        default_context()
    } else {
        context.to_vec()
    }
}

/// Store row -> viewer annotation.
pub fn to_viewer(row: &Annotation) -> ViewerAnnotation {
    let body = &row.annotation;
    ViewerAnnotation {
        context: normalize_context(&body.context),
        id: body.id.clone(),
        kind: body.kind.clone(),
        motivation: body.motivation.clone(),
        body_value: body.body_value.clone(),
        target: body.target.clone(),
        page_number: body.page_number,
        creator: body.creator.clone(),
        created: body.created,
        modified: body.modified,
        extra: body.extra.clone(),
    }
}

pub fn to_viewer_batch(rows: &[Annotation]) -> Vec<ViewerAnnotation> {
    rows.iter().map(to_viewer).collect()
}

/// Viewer annotation -> store body.
///
/// `motivation` defaults to `commenting` and `type` to `Annotation`.
pub fn to_remote_body(annotation: &ViewerAnnotation) -> AnnotationBody {
    let kind = if annotation.kind.is_empty() {
        ANNOTATION_TYPE.to_string()
    } else {
        annotation.kind.clone()
    };

    AnnotationBody {
        context: serde_json::Value::from(normalize_context_list(&annotation.context)),
        id: annotation.id.clone(),
        kind,
        motivation: Some(annotation.motivation.clone().unwrap_or(Motivation::Commenting)),
        body_value: annotation.body_value.clone(),
        target: annotation.target.clone(),
        page_number: annotation.page_number,
        creator: annotation.creator.clone(),
        created: annotation.created,
        modified: annotation.modified,
        extra: annotation.extra.clone(),
    }
}

/// Viewer annotation -> create payload owned by `scope`.
pub fn to_new_annotation(annotation: &ViewerAnnotation, scope: &DocumentScope) -> NewAnnotation {
    NewAnnotation::for_scope(scope, to_remote_body(annotation))
}
