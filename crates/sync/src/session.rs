//! Per-document annotation sync.
//!
//! [`AnnotationSession`] owns the state of the document open in the viewer:
//! the store rows fetched for it, the set of viewer ids already pushed into
//! the viewer, and the current selection. Opening another document replaces
//! that state wholesale.
//!
//! Viewer events arrive through [`AnnotationEvents`]; local UI actions call
//! [`AnnotationSession::edit_body`], [`AnnotationSession::reply_to`] and
//! [`AnnotationSession::remove`] directly.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use marginalia_client::{AnnotationStore, ClientError};
use marginalia_core::adapter::{
    default_context, to_new_annotation, to_remote_body, to_viewer, to_viewer_batch,
};
use marginalia_core::annotation::{Annotation, DocumentScope, Motivation, Target, ANNOTATION_TYPE};
use marginalia_core::error::CoreError;
use marginalia_core::loaded::LoadedAnnotations;
use marginalia_core::orphans::{find_orphans_transitive, partition_orphans};
use marginalia_core::types::{StoreId, ViewerId};
use marginalia_core::viewer::{ViewerAnnotation, ViewerFilter};

use crate::bus::{SyncBus, SyncEvent};
use crate::events::{AnnotationEvents, EventOutcome};
use crate::viewer::{ViewerError, ViewerHandle};

/// Errors from a single sync operation. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No document is open")]
    NoDocument,

    #[error(transparent)]
    Store(#[from] ClientError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

fn not_found(viewer_id: &str) -> SyncError {
    SyncError::Core(CoreError::NotFound {
        entity: "annotation",
        id: viewer_id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Document state
// ---------------------------------------------------------------------------

/// Everything known about the open document.
#[derive(Debug)]
pub struct DocumentState {
    scope: DocumentScope,
    records: Vec<Annotation>,
    loaded: LoadedAnnotations,
    selected: Option<ViewerId>,
}

impl DocumentState {
    fn new(scope: DocumentScope) -> Self {
        Self {
            loaded: LoadedAnnotations::new(scope.clone()),
            scope,
            records: Vec::new(),
            selected: None,
        }
    }

    pub fn scope(&self) -> &DocumentScope {
        &self.scope
    }

    /// Store rows for this document, in fetch/creation order.
    pub fn records(&self) -> &[Annotation] {
        &self.records
    }

    pub fn loaded(&self) -> &LoadedAnnotations {
        &self.loaded
    }

    /// Viewer id of the highlighted annotation.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Store row behind a viewer id.
    pub fn find(&self, viewer_id: &str) -> Option<&Annotation> {
        self.records.iter().find(|r| r.viewer_id() == viewer_id)
    }

    fn position(&self, viewer_id: &str) -> Result<usize, SyncError> {
        self.records
            .iter()
            .position(|r| r.viewer_id() == viewer_id)
            .ok_or_else(|| not_found(viewer_id))
    }
}

/// Result of [`AnnotationSession::open_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSummary {
    /// Rows returned by the store.
    pub fetched: usize,
    /// Annotations pushed into the viewer.
    pub loaded: usize,
    /// Orphaned replies removed from the store.
    pub orphans_removed: Vec<StoreId>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct AnnotationSession {
    store: Arc<dyn AnnotationStore>,
    viewer: Arc<dyn ViewerHandle>,
    bus: Arc<SyncBus>,
    document: Option<DocumentState>,
}

impl AnnotationSession {
    pub fn new(
        store: Arc<dyn AnnotationStore>,
        viewer: Arc<dyn ViewerHandle>,
        bus: Arc<SyncBus>,
    ) -> Self {
        Self {
            store,
            viewer,
            bus,
            document: None,
        }
    }

    /// State of the open document, if any.
    pub fn document(&self) -> Option<&DocumentState> {
        self.document.as_ref()
    }

    /// Bus the session publishes its outcomes on.
    pub fn bus(&self) -> &Arc<SyncBus> {
        &self.bus
    }

    /// Switch to `scope`: drop all state of the previous document, fetch
    /// every stored annotation, remove orphaned replies, and push the rest
    /// into the viewer.
    ///
    /// On failure the new document stays open with whatever was loaded.
    pub async fn open_document(&mut self, scope: DocumentScope) -> Result<OpenSummary, SyncError> {
        self.close_document();
        let mut state = DocumentState::new(scope.clone());

        let rows = match self.store.list_all(&scope).await {
            Ok(rows) => rows,
            Err(e) => {
                self.document = Some(state);
                return Err(e.into());
            }
        };
        let fetched = rows.len();
        let rows: Vec<Annotation> = rows.into_iter().filter(|r| scope.owns(r)).collect();

        let (kept, orphans) = partition_orphans(rows);
        let orphans_removed = remove_orphans(self.store.as_ref(), &self.bus, &scope, orphans).await;

        let fresh = state.loaded.retain_new(to_viewer_batch(&kept));
        let pushed = fresh.len();
        state.records = kept;

        if let Err(e) = push_to_viewer(self.viewer.as_ref(), &mut state.loaded, fresh).await {
            self.document = Some(state);
            return Err(e.into());
        }

        tracing::info!(
            scope = %scope,
            fetched,
            loaded = pushed,
            orphans = orphans_removed.len(),
            "Document opened",
        );
        self.bus.publish(SyncEvent::DocumentOpened {
            scope: scope.to_string(),
            loaded: pushed,
            orphans_removed: orphans_removed.len(),
        });
        self.document = Some(state);

        Ok(OpenSummary {
            fetched,
            loaded: pushed,
            orphans_removed,
        })
    }

    /// Re-fetch the open document and bring the viewer up to date.
    ///
    /// The loaded set is rebuilt from what the viewer reports holding.
    /// Annotations that were synced before but are gone from the store are
    /// removed from the viewer; new store rows are pushed. Returns the
    /// number pushed.
    pub async fn refresh(&mut self) -> Result<usize, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        let scope = state.scope.clone();

        let rows: Vec<Annotation> = self
            .store
            .list_all(&scope)
            .await?
            .into_iter()
            .filter(|r| scope.owns(r))
            .collect();
        let (kept, orphans) = partition_orphans(rows);
        remove_orphans(self.store.as_ref(), &self.bus, &scope, orphans).await;

        let present = self.viewer.get_annotations().await?;
        let kept_ids: HashSet<&str> = kept.iter().map(|r| r.viewer_id()).collect();
        let previously_synced: HashSet<&str> = state.records.iter().map(|r| r.viewer_id()).collect();

        state.loaded.reset(scope.clone());
        let mut stale = Vec::new();
        for annotation in &present {
            if kept_ids.contains(annotation.id.as_str()) {
                state.loaded.insert(annotation.id.clone());
            } else if previously_synced.contains(annotation.id.as_str()) {
                stale.push(annotation.id.clone());
            }
        }

        if !stale.is_empty() {
            tracing::info!(scope = %scope, count = stale.len(), "Removing annotations deleted remotely");
            self.viewer
                .delete_annotations(ViewerFilter::AnnotationIds(stale))
                .await?;
        }

        let fresh = state.loaded.retain_new(to_viewer_batch(&kept));
        let pushed = fresh.len();
        state.records = kept;
        push_to_viewer(self.viewer.as_ref(), &mut state.loaded, fresh).await?;

        tracing::debug!(scope = %scope, pushed, "Document refreshed");
        Ok(pushed)
    }

    /// Forget the open document, if any.
    pub fn close_document(&mut self) -> Option<DocumentState> {
        let state = self.document.take()?;
        tracing::info!(scope = %state.scope, "Document closed");
        self.bus.publish(SyncEvent::DocumentClosed {
            scope: state.scope.to_string(),
        });
        Some(state)
    }

    /// Replace the text of a synced annotation from the local UI.
    pub async fn edit_body(
        &mut self,
        viewer_id: &str,
        text: impl Into<String>,
    ) -> Result<Annotation, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        let index = state.position(viewer_id)?;
        let annotation_id = state.records[index].annotation_id.clone();

        // Round-trip through the viewer shape so legacy `@context` values
        // are normalized before they are written back.
        let mut body = to_remote_body(&to_viewer(&state.records[index]));
        body.body_value = Some(text.into());
        body.modified = Some(Utc::now());

        let updated = self.store.update(&annotation_id, &body).await?;
        state.records[index] = updated.clone();
        self.viewer.update_annotation(to_viewer(&updated)).await?;

        tracing::info!(annotation_id = %annotation_id, viewer_id, "Annotation text edited");
        self.bus.publish(SyncEvent::AnnotationUpdated {
            annotation_id,
            viewer_id: viewer_id.to_string(),
        });
        Ok(updated)
    }

    /// Post a reply to a synced annotation and show it in the viewer.
    pub async fn reply_to(
        &mut self,
        parent_viewer_id: &str,
        text: impl Into<String>,
        creator: Option<serde_json::Value>,
    ) -> Result<Annotation, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        let parent = state
            .find(parent_viewer_id)
            .ok_or_else(|| not_found(parent_viewer_id))?;

        let now = Utc::now();
        let reply = ViewerAnnotation {
            context: default_context(),
            id: uuid::Uuid::new_v4().to_string(),
            kind: ANNOTATION_TYPE.to_string(),
            motivation: Some(Motivation::Replying),
            body_value: Some(text.into()),
            target: Target {
                source: parent.viewer_id().to_string(),
                selector: None,
            },
            page_number: parent.annotation.page_number,
            creator,
            created: Some(now),
            modified: Some(now),
            extra: serde_json::Map::new(),
        };

        let created = self
            .store
            .create(&to_new_annotation(&reply, &state.scope))
            .await?;
        state.records.push(created.clone());
        push_to_viewer(self.viewer.as_ref(), &mut state.loaded, vec![to_viewer(&created)]).await?;

        tracing::info!(
            annotation_id = %created.annotation_id,
            parent = parent_viewer_id,
            "Reply created",
        );
        self.bus.publish(SyncEvent::AnnotationCreated {
            annotation_id: created.annotation_id.clone(),
            viewer_id: reply.id,
        });
        Ok(created)
    }

    /// Delete a synced annotation from the local UI, together with any
    /// replies left without a parent.
    pub async fn remove(&mut self, viewer_id: &str) -> Result<EventOutcome, SyncError> {
        self.delete_synced(viewer_id, true).await
    }

    /// Delete the store row behind `viewer_id`, then prune replies that
    /// lost their parent. `from_viewer` also removes the annotation itself
    /// from the viewer (not needed when the viewer reported the deletion).
    async fn delete_synced(
        &mut self,
        viewer_id: &str,
        from_viewer: bool,
    ) -> Result<EventOutcome, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        let index = state.position(viewer_id)?;
        let annotation_id = state.records[index].annotation_id.clone();

        self.store.delete(&annotation_id).await?;
        state.records.remove(index);
        state.loaded.remove(viewer_id);

        tracing::info!(annotation_id = %annotation_id, viewer_id, "Annotation deleted");
        self.bus.publish(SyncEvent::AnnotationDeleted {
            annotation_id: annotation_id.clone(),
            viewer_id: viewer_id.to_string(),
        });

        if state.selected.as_deref() == Some(viewer_id) {
            state.selected = None;
            self.bus.publish(SyncEvent::SelectionChanged { viewer_id: None });
        }

        let mut viewer_removals: Vec<ViewerId> = Vec::new();
        if from_viewer {
            viewer_removals.push(viewer_id.to_string());
        }

        let candidates = find_orphans_transitive(&state.records);
        let orphans = remove_orphans(self.store.as_ref(), &self.bus, &state.scope, candidates).await;
        if !orphans.is_empty() {
            let dropped: HashSet<&str> = orphans.iter().map(String::as_str).collect();
            let orphan_viewer_ids: Vec<ViewerId> = state
                .records
                .iter()
                .filter(|r| dropped.contains(r.annotation_id.as_str()))
                .map(|r| r.viewer_id().to_string())
                .collect();
            state
                .records
                .retain(|r| !dropped.contains(r.annotation_id.as_str()));
            for id in &orphan_viewer_ids {
                state.loaded.remove(id);
            }
            viewer_removals.extend(orphan_viewer_ids);
        }

        if !viewer_removals.is_empty() {
            self.viewer
                .delete_annotations(ViewerFilter::AnnotationIds(viewer_removals))
                .await?;
        }

        Ok(EventOutcome::Deleted {
            annotation_id,
            orphans,
        })
    }
}

#[async_trait]
impl AnnotationEvents for AnnotationSession {
    /// Persist an annotation drawn in the viewer. Repeated adds of the same
    /// viewer id (the viewer echoes annotations we pushed) are ignored.
    async fn on_added(&mut self, annotation: ViewerAnnotation) -> Result<EventOutcome, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;

        if state.find(&annotation.id).is_some() {
            tracing::debug!(viewer_id = %annotation.id, "Annotation already synced, skipping add");
            state.loaded.insert(annotation.id);
            return Ok(EventOutcome::Ignored);
        }

        let new = to_new_annotation(&annotation, &state.scope);
        let created = self.store.create(&new).await?;
        let annotation_id = created.annotation_id.clone();

        tracing::info!(
            annotation_id = %annotation_id,
            viewer_id = %annotation.id,
            scope = %state.scope,
            "Annotation created from viewer",
        );
        state.loaded.insert(annotation.id.clone());
        state.records.push(created);

        self.bus.publish(SyncEvent::AnnotationCreated {
            annotation_id: annotation_id.clone(),
            viewer_id: annotation.id,
        });
        Ok(EventOutcome::Created(annotation_id))
    }

    async fn on_updated(&mut self, annotation: ViewerAnnotation) -> Result<EventOutcome, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        let index = state.position(&annotation.id)?;
        let annotation_id = state.records[index].annotation_id.clone();

        let updated = self
            .store
            .update(&annotation_id, &to_remote_body(&annotation))
            .await?;
        state.records[index] = updated;

        tracing::info!(annotation_id = %annotation_id, viewer_id = %annotation.id, "Annotation updated from viewer");
        self.bus.publish(SyncEvent::AnnotationUpdated {
            annotation_id: annotation_id.clone(),
            viewer_id: annotation.id,
        });
        Ok(EventOutcome::Updated(annotation_id))
    }

    async fn on_deleted(&mut self, annotation: ViewerAnnotation) -> Result<EventOutcome, SyncError> {
        self.delete_synced(&annotation.id, false).await
    }

    async fn on_selected(&mut self, annotation: ViewerAnnotation) -> Result<EventOutcome, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        state.selected = Some(annotation.id.clone());
        self.bus.publish(SyncEvent::SelectionChanged {
            viewer_id: Some(annotation.id.clone()),
        });
        Ok(EventOutcome::SelectionChanged(Some(annotation.id)))
    }

    async fn on_unselected(
        &mut self,
        annotation: ViewerAnnotation,
    ) -> Result<EventOutcome, SyncError> {
        let state = self.document.as_mut().ok_or(SyncError::NoDocument)?;
        if state.selected.as_deref() != Some(annotation.id.as_str()) {
            return Ok(EventOutcome::Ignored);
        }
        state.selected = None;
        self.bus.publish(SyncEvent::SelectionChanged { viewer_id: None });
        Ok(EventOutcome::SelectionChanged(None))
    }
}

// ---- helpers ----

/// Bulk-delete orphaned replies. Returns the ids actually removed: empty
/// when there was nothing to do or the store refused.
async fn remove_orphans(
    store: &dyn AnnotationStore,
    bus: &SyncBus,
    scope: &DocumentScope,
    orphans: Vec<StoreId>,
) -> Vec<StoreId> {
    if orphans.is_empty() {
        return orphans;
    }

    match store.bulk_delete(&orphans).await {
        Ok(()) => {
            tracing::info!(scope = %scope, count = orphans.len(), "Removed orphaned replies");
            bus.publish(SyncEvent::OrphansRemoved {
                annotation_ids: orphans.clone(),
            });
            orphans
        }
        Err(e) => {
            tracing::warn!(scope = %scope, error = %e, "Failed to remove orphaned replies");
            bus.publish(SyncEvent::MutationFailed {
                action: "bulk_delete".to_string(),
                viewer_id: None,
                error: e.to_string(),
            });
            Vec::new()
        }
    }
}

/// Push a batch into the viewer and record it as loaded once accepted.
async fn push_to_viewer(
    viewer: &dyn ViewerHandle,
    loaded: &mut LoadedAnnotations,
    batch: Vec<ViewerAnnotation>,
) -> Result<(), ViewerError> {
    if batch.is_empty() {
        return Ok(());
    }
    let ids: Vec<ViewerId> = batch.iter().map(|a| a.id.clone()).collect();
    viewer.add_annotations(batch).await?;
    for id in ids {
        loaded.insert(id);
    }
    Ok(())
}
