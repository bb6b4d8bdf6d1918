//! Sequential command loop driving an [`AnnotationSession`].
//!
//! Viewer callbacks and UI actions are queued on an mpsc channel and
//! applied one at a time, so an edit can never race the create or delete
//! of the same annotation. Failures are logged and published on the
//! [`SyncBus`](crate::bus::SyncBus) as `MutationFailed`; the loop keeps going.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use marginalia_core::annotation::DocumentScope;
use marginalia_core::types::ViewerId;

use crate::bus::SyncEvent;
use crate::events::{dispatch, ViewerEvent};
use crate::session::{AnnotationSession, SyncError};
use crate::viewer::ViewerError;

/// Queued commands before senders start waiting.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// One unit of work for the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    /// Switch to another document.
    Open(DocumentScope),
    /// Re-fetch the open document.
    Refresh,
    Close,
    /// A parsed viewer callback.
    Viewer(ViewerEvent),
    /// Replace the text of a synced annotation.
    EditBody { viewer_id: ViewerId, text: String },
    /// Post a reply to `parent`.
    Reply { parent: ViewerId, text: String },
    /// Delete a synced annotation and its orphaned replies.
    Remove(ViewerId),
}

impl SessionCommand {
    fn action(&self) -> &'static str {
        match self {
            Self::Open(_) => "open_document",
            Self::Refresh => "refresh",
            Self::Close => "close_document",
            Self::Viewer(event) => event.name(),
            Self::EditBody { .. } => "edit_body",
            Self::Reply { .. } => "reply",
            Self::Remove(_) => "remove",
        }
    }

    fn viewer_id(&self) -> Option<ViewerId> {
        match self {
            Self::Viewer(event) => Some(event.annotation().id.clone()),
            Self::EditBody { viewer_id, .. } => Some(viewer_id.clone()),
            Self::Reply { parent, .. } => Some(parent.clone()),
            Self::Remove(id) => Some(id.clone()),
            Self::Open(_) | Self::Refresh | Self::Close => None,
        }
    }
}

/// Errors returned to callers of [`SessionHandle`].
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Annotation session has stopped")]
    Stopped,

    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

/// Cloneable sender side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Queue a command. Fails once the loop has stopped.
    pub async fn send(&self, command: SessionCommand) -> Result<(), HandleError> {
        self.tx.send(command).await.map_err(|_| HandleError::Stopped)
    }

    /// Queue [`SessionCommand::Open`].
    pub async fn open(&self, scope: DocumentScope) -> Result<(), HandleError> {
        self.send(SessionCommand::Open(scope)).await
    }

    /// Queue [`SessionCommand::Refresh`].
    pub async fn refresh(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::Refresh).await
    }

    /// Queue [`SessionCommand::Close`].
    pub async fn close(&self) -> Result<(), HandleError> {
        self.send(SessionCommand::Close).await
    }

    /// Parse a raw viewer callback and queue it.
    ///
    /// Returns `Ok(false)` when the event type is not one the session
    /// listens to.
    pub async fn forward_sdk_event(&self, event_type: &str, data: Value) -> Result<bool, HandleError> {
        match ViewerEvent::from_sdk(event_type, data)? {
            Some(event) => {
                self.send(SessionCommand::Viewer(event)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Spawn the session loop on the current runtime.
///
/// The task ends when every handle is dropped or the token is cancelled,
/// and yields the session back.
pub fn spawn_session(
    session: AnnotationSession,
) -> (SessionHandle, JoinHandle<AnnotationSession>, CancellationToken) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_session(session, rx, cancel.clone()));
    (SessionHandle { tx }, task, cancel)
}

/// Apply commands until the channel closes or `cancel` fires.
pub async fn run_session(
    mut session: AnnotationSession,
    mut rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) -> AnnotationSession {
    tracing::info!("Annotation session started");

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Annotation session cancelled");
                break;
            }
            command = rx.recv() => match command {
                Some(command) => command,
                None => {
                    tracing::debug!("All session handles dropped");
                    break;
                }
            },
        };

        let action = command.action();
        let viewer_id = command.viewer_id();
        if let Err(e) = apply(&mut session, command).await {
            tracing::error!(action, viewer_id = ?viewer_id, error = %e, "Annotation sync failed");
            session.bus().publish(SyncEvent::MutationFailed {
                action: action.to_string(),
                viewer_id,
                error: e.to_string(),
            });
        }
    }

    session.close_document();
    session
}

async fn apply(session: &mut AnnotationSession, command: SessionCommand) -> Result<(), SyncError> {
    match command {
        SessionCommand::Open(scope) => {
            session.open_document(scope).await?;
        }
        SessionCommand::Refresh => {
            session.refresh().await?;
        }
        SessionCommand::Close => {
            session.close_document();
        }
        SessionCommand::Viewer(event) => {
            let outcome = dispatch(session, event).await?;
            tracing::debug!(?outcome, "Viewer event handled");
        }
        SessionCommand::EditBody { viewer_id, text } => {
            session.edit_body(&viewer_id, text).await?;
        }
        SessionCommand::Reply { parent, text } => {
            session.reply_to(&parent, text, None).await?;
        }
        SessionCommand::Remove(viewer_id) => {
            session.remove(&viewer_id).await?;
        }
    }
    Ok(())
}
