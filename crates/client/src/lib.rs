//! REST client for the remote PDF annotation store.
//!
//! Provides bearer-authenticated CRUD and bulk operations over
//! `/pdf-annotations`, environment-driven configuration, and the
//! [`AnnotationStore`] trait the viewer bridge depends on.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use api::AnnotationApi;
pub use auth::{SharedToken, StaticToken, TokenProvider};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use store::AnnotationStore;
