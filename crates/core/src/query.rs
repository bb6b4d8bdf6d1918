//! Filters for listing annotations (`GET /pdf-annotations`).

use serde::Deserialize;

use crate::annotation::{Annotation, DocumentScope};
use crate::error::CoreError;

/// Largest page size the store accepts.
pub const MAX_PER_PAGE: u32 = 100;

/// Page size used when walking every page of a document.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Query parameters for the list endpoint. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationQuery {
    pub course_section_id: Option<String>,
    pub summary_id: Option<String>,
    pub is_summary: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AnnotationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query selecting every annotation owned by `scope`.
    pub fn for_scope(scope: &DocumentScope) -> Self {
        match scope {
            DocumentScope::Section(id) => Self::new().course_section(id.clone()),
            DocumentScope::Summary(id) => Self::new().summary(id.clone()).is_summary(true),
        }
    }

    pub fn course_section(mut self, id: impl Into<String>) -> Self {
        self.course_section_id = Some(id.into());
        self
    }

    pub fn summary(mut self, id: impl Into<String>) -> Self {
        self.summary_id = Some(id.into());
        self
    }

    pub fn is_summary(mut self, flag: bool) -> Self {
        self.is_summary = Some(flag);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Reject page numbers and sizes the store would refuse.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.page == Some(0) {
            return Err(CoreError::Validation("page is 1-based".to_string()));
        }
        if let Some(per_page) = self.per_page {
            if per_page == 0 || per_page > MAX_PER_PAGE {
                return Err(CoreError::Validation(format!(
                    "per_page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
                )));
            }
        }
        Ok(())
    }

    /// Set parameters as `(name, value)` pairs, in wire order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.course_section_id {
            pairs.push(("course_section_id", id.clone()));
        }
        if let Some(id) = &self.summary_id {
            pairs.push(("summary_id", id.clone()));
        }
        if let Some(flag) = self.is_summary {
            pairs.push(("is_summary", flag.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        pairs
    }

    /// Form-urlencoded query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_pairs())
            .finish()
    }
}

/// One page of results as returned by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationPage {
    pub data: Vec<Annotation>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl AnnotationPage {
    /// Whether another page may follow, given how many rows have been
    /// collected so far (this page included) and the page size asked for.
    ///
    /// With a `total` the answer depends only on the running count, so a
    /// server that clamps the page size is still walked to the end. Without
    /// one, a full page means there may be more; the server's own
    /// `per_page` wins over the requested size.
    pub fn has_more(&self, fetched_so_far: usize, requested_per_page: u32) -> bool {
        match self.total {
            Some(total) => (fetched_so_far as u64) < total,
            None => {
                let page_size = self.per_page.unwrap_or(requested_per_page);
                page_size > 0 && self.data.len() >= page_size as usize
            }
        }
    }
}
