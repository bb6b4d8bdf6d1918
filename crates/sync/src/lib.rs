//! Bridge between the embedded PDF viewer and the remote annotation store.
//!
//! - [`ViewerHandle`] -- the viewer operations the bridge needs.
//! - [`ViewerEvent`] -- annotation lifecycle events emitted by the viewer.
//! - [`AnnotationSession`] -- per-document state and the event handlers
//!   that turn viewer events into store mutations.
//! - [`SyncBus`] -- broadcast of sync outcomes for UI consumers.
//! - [`runner`] -- the sequential command loop driving a session.

pub mod bus;
pub mod events;
pub mod runner;
pub mod session;
pub mod viewer;

#[cfg(test)]
mod test_support;

pub use bus::{SyncBus, SyncEvent};
pub use events::{dispatch, AnnotationEvents, EventOutcome, ViewerEvent, LISTENED_EVENTS};
pub use runner::{run_session, spawn_session, HandleError, SessionCommand, SessionHandle};
pub use session::{AnnotationSession, OpenSummary, SyncError};
pub use viewer::{ViewerError, ViewerHandle};
