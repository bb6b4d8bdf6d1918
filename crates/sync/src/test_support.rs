//! In-memory store and viewer doubles shared by the sync tests.

use std::sync::Mutex;

use async_trait::async_trait;

use marginalia_client::{AnnotationStore, ClientError};
use marginalia_core::annotation::{
    Annotation, AnnotationBody, DocumentScope, Motivation, NewAnnotation, Target,
};
use marginalia_core::types::StoreId;
use marginalia_core::viewer::{ViewerAnnotation, ViewerFilter};

use crate::viewer::{ViewerError, ViewerHandle};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<Annotation>>,
    calls: Mutex<Vec<String>>,
    next_id: Mutex<usize>,
    fail_list: Mutex<bool>,
    fail_bulk_delete: Mutex<bool>,
    fail_all: Mutex<bool>,
}

impl FakeStore {
    pub fn seed(&self, rows: Vec<Annotation>) {
        self.rows.lock().unwrap().extend(rows);
    }

    pub fn rows(&self) -> Vec<Annotation> {
        self.rows.lock().unwrap().clone()
    }

    pub fn remove_row(&self, annotation_id: &str) {
        self.rows
            .lock()
            .unwrap()
            .retain(|r| r.annotation_id != annotation_id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls whose text starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn fail_next_list(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    pub fn fail_bulk_delete(&self) {
        *self.fail_bulk_delete.lock().unwrap() = true;
    }

    /// Make every following mutation fail with a 500.
    pub fn fail_everything(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self) -> Result<(), ClientError> {
        if *self.fail_all.lock().unwrap() {
            return Err(server_error());
        }
        Ok(())
    }
}

fn server_error() -> ClientError {
    ClientError::Api {
        status: 500,
        message: "Internal server error".to_string(),
    }
}

fn not_found(annotation_id: &str) -> ClientError {
    ClientError::Api {
        status: 404,
        message: format!("Annotation with id {annotation_id} not found"),
    }
}

#[async_trait]
impl AnnotationStore for FakeStore {
    async fn create(&self, new: &NewAnnotation) -> Result<Annotation, ClientError> {
        self.record(format!("create:{}", new.annotation.id));
        self.check()?;

        let n = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let row = Annotation {
            annotation_id: format!("row-{n}"),
            course_section_id: new.course_section_id.clone(),
            summary_id: new.summary_id.clone(),
            is_summary: new.is_summary,
            annotation: new.annotation.clone(),
            created_at: None,
            updated_at: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_all(&self, scope: &DocumentScope) -> Result<Vec<Annotation>, ClientError> {
        self.record(format!("list_all:{scope}"));
        if std::mem::take(&mut *self.fail_list.lock().unwrap()) {
            return Err(server_error());
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| scope.owns(r))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        annotation_id: &str,
        annotation: &AnnotationBody,
    ) -> Result<Annotation, ClientError> {
        self.record(format!("update:{annotation_id}"));
        self.check()?;

        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.annotation_id == annotation_id)
            .ok_or_else(|| not_found(annotation_id))?;
        row.annotation = annotation.clone();
        Ok(row.clone())
    }

    async fn delete(&self, annotation_id: &str) -> Result<(), ClientError> {
        self.record(format!("delete:{annotation_id}"));
        self.check()?;

        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.annotation_id != annotation_id);
        if rows.len() == before {
            return Err(not_found(annotation_id));
        }
        Ok(())
    }

    async fn bulk_delete(&self, annotation_ids: &[StoreId]) -> Result<(), ClientError> {
        if annotation_ids.is_empty() {
            return Ok(());
        }
        self.record(format!("bulk_delete:{}", annotation_ids.join(",")));
        self.check()?;
        if *self.fail_bulk_delete.lock().unwrap() {
            return Err(server_error());
        }

        self.rows
            .lock()
            .unwrap()
            .retain(|r| !annotation_ids.contains(&r.annotation_id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeViewer {
    annotations: Mutex<Vec<ViewerAnnotation>>,
    calls: Mutex<Vec<String>>,
    reject_adds: Mutex<bool>,
}

impl FakeViewer {
    /// Put an annotation in the viewer as if the user drew it.
    pub fn insert(&self, annotation: ViewerAnnotation) {
        self.annotations.lock().unwrap().push(annotation);
    }

    /// Make every following `add_annotations` call fail.
    pub fn reject_adds(&self) {
        *self.reject_adds.lock().unwrap() = true;
    }

    pub fn ids(&self) -> Vec<String> {
        self.annotations
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ViewerHandle for FakeViewer {
    async fn add_annotations(&self, annotations: Vec<ViewerAnnotation>) -> Result<(), ViewerError> {
        let ids: Vec<&str> = annotations.iter().map(|a| a.id.as_str()).collect();
        self.record(format!("add:{}", ids.join(",")));

        if *self.reject_adds.lock().unwrap() {
            return Err(ViewerError::Rejected {
                operation: "addAnnotations",
                message: "viewer is not ready".to_string(),
            });
        }

        if let Some(bad) = annotations.iter().find(|a| a.context.is_empty()) {
            return Err(ViewerError::Rejected {
                operation: "addAnnotations",
                message: format!("{} has no @context", bad.id),
            });
        }
        self.annotations.lock().unwrap().extend(annotations);
        Ok(())
    }

    async fn get_annotations(&self) -> Result<Vec<ViewerAnnotation>, ViewerError> {
        self.record("get".to_string());
        Ok(self.annotations.lock().unwrap().clone())
    }

    async fn delete_annotations(&self, filter: ViewerFilter) -> Result<(), ViewerError> {
        self.record("delete".to_string());
        self.annotations
            .lock()
            .unwrap()
            .retain(|a| !filter.matches(a));
        Ok(())
    }

    async fn update_annotation(&self, annotation: ViewerAnnotation) -> Result<(), ViewerError> {
        self.record(format!("update:{}", annotation.id));
        let mut annotations = self.annotations.lock().unwrap();
        let existing = annotations
            .iter_mut()
            .find(|a| a.id == annotation.id)
            .ok_or_else(|| ViewerError::Rejected {
                operation: "updateAnnotation",
                message: format!("{} is not loaded", annotation.id),
            })?;
        *existing = annotation;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A top-level store row in `section` with viewer id `v-{id}`.
pub fn row(id: &str, section: &str) -> Annotation {
    let mut body = AnnotationBody::new(format!("v-{id}"));
    body.page_number = Some(1);
    body.body_value = Some(format!("comment {id}"));
    body.target.source = "document".to_string();
    Annotation {
        annotation_id: id.to_string(),
        course_section_id: Some(section.to_string()),
        summary_id: None,
        is_summary: false,
        annotation: body,
        created_at: None,
        updated_at: None,
    }
}

/// A reply row whose `target.source` is `parent`.
pub fn reply_row(id: &str, section: &str, parent: &str) -> Annotation {
    let mut row = row(id, section);
    row.annotation.motivation = Some(Motivation::Replying);
    row.annotation.target.source = parent.to_string();
    row
}

/// A viewer annotation as the SDK would report it.
pub fn viewer_annotation(id: &str) -> ViewerAnnotation {
    ViewerAnnotation {
        context: marginalia_core::adapter::default_context(),
        id: id.to_string(),
        kind: "Annotation".to_string(),
        motivation: Some(Motivation::Commenting),
        body_value: Some("drawn in viewer".to_string()),
        target: Target {
            source: "document".to_string(),
            selector: None,
        },
        page_number: Some(1),
        creator: None,
        created: None,
        modified: None,
        extra: serde_json::Map::new(),
    }
}
