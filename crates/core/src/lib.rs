//! Domain model and pure transforms for PDF annotation sync.
//!
//! Nothing in this crate performs I/O. The store client and the viewer
//! bridge build on these types.

pub mod adapter;
pub mod annotation;
pub mod error;
pub mod loaded;
pub mod orphans;
pub mod query;
pub mod types;
pub mod viewer;
