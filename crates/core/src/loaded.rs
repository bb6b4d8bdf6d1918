//! Tracking of annotations already pushed into the live viewer.
//!
//! The set belongs to exactly one document. Switching documents is an
//! explicit [`LoadedAnnotations::reset`], never an incremental merge.

use std::collections::HashSet;

use crate::annotation::DocumentScope;
use crate::types::ViewerId;
use crate::viewer::ViewerAnnotation;

/// Viewer ids pushed into the viewer for one document.
#[derive(Debug, Clone)]
pub struct LoadedAnnotations {
    scope: DocumentScope,
    ids: HashSet<ViewerId>,
}

impl LoadedAnnotations {
    /// Empty set for `scope`.
    pub fn new(scope: DocumentScope) -> Self {
        Self {
            scope,
            ids: HashSet::new(),
        }
    }

    /// The document this set belongs to.
    pub fn scope(&self) -> &DocumentScope {
        &self.scope
    }

    /// Whether the viewer already holds `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id. Returns `false` if it was already loaded.
    pub fn insert(&mut self, id: impl Into<ViewerId>) -> bool {
        self.ids.insert(id.into())
    }

    /// Forget an id. Returns `false` if it was not loaded.
    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Number of loaded ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep only annotations not yet loaded, dropping duplicates within the
    /// batch itself. Does not record them; call [`Self::insert`] once the
    /// viewer accepted the batch.
    pub fn retain_new(&self, batch: Vec<ViewerAnnotation>) -> Vec<ViewerAnnotation> {
        let mut seen = HashSet::new();
        batch
            .into_iter()
            .filter(|a| !self.ids.contains(&a.id) && seen.insert(a.id.clone()))
            .collect()
    }

    /// Start over for another document.
    pub fn reset(&mut self, scope: DocumentScope) {
        self.scope = scope;
        self.ids.clear();
    }
}
