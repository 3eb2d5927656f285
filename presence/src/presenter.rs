//! Presenter facade: session management plus the rotating code display.

use crate::code::Code;
use crate::issuer::{CodeIssuer, SessionDirectory};
use crate::refresh::{RefreshLoop, RefreshPolicy, RefreshStatus};
use client::ClientError;
use client::models::{CreateSessionData, Session, UpdateSessionData};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// The code currently on screen and the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedCode {
    pub session_id: String,
    pub subject: String,
    pub code: Code,
}

pub struct Presenter {
    directory: Arc<dyn SessionDirectory>,
    issuer: Arc<dyn CodeIssuer>,
    refresh: RefreshLoop,
    sessions: Vec<Session>,
    display: Arc<watch::Sender<Option<DisplayedCode>>>,
}

impl Presenter {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        issuer: Arc<dyn CodeIssuer>,
        policy: RefreshPolicy,
    ) -> Self {
        let (display, _) = watch::channel(None);
        Self {
            directory,
            refresh: RefreshLoop::new(issuer.clone(), policy),
            issuer,
            sessions: Vec::new(),
            display: Arc::new(display),
        }
    }

    /// Replaces the cached session list with the issuer's.
    pub async fn reload(&mut self) -> Result<&[Session], ClientError> {
        self.sessions = self.directory.list().await?;
        Ok(&self.sessions)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Finds a cached session by its issuer id or its human-facing session id.
    pub fn find(&self, id: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.id == id || (!s.session_id.is_empty() && s.session_id == id))
    }

    pub async fn create_session(&mut self, data: &CreateSessionData) -> Result<Session, ClientError> {
        let session = self.directory.create(data).await?;
        info!(session = %session.id, subject = %session.subject, "session created");
        self.reload_quietly().await;
        Ok(session)
    }

    pub async fn update_session(
        &mut self,
        id: &str,
        data: &UpdateSessionData,
    ) -> Result<Session, ClientError> {
        let session = self.directory.update(id, data).await?;
        self.reload_quietly().await;
        Ok(session)
    }

    /// Deletes a session, then closes its display if it is open.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), ClientError> {
        self.directory.delete(id).await?;
        if self.refresh.session_id() == Some(id) {
            self.close_display();
        }
        info!(session = %id, "session deleted");
        self.reload_quietly().await;
        Ok(())
    }

    pub async fn toggle_session(&mut self, id: &str) -> Result<Session, ClientError> {
        let session = self.directory.toggle(id).await?;
        info!(session = %id, active = session.is_active, "session toggled");
        self.reload_quietly().await;
        Ok(session)
    }

    /// Shows `session`'s current code and starts rotating it.
    /// Replaces any display that was already open.
    pub fn open_display(&mut self, session: &Session) {
        self.display.send_replace(Some(DisplayedCode {
            session_id: session.id.clone(),
            subject: session.subject.clone(),
            code: Code::new(session.qr_code.clone()),
        }));

        let display = self.display.clone();
        self.refresh.start(session.id.clone(), move |rotated| {
            display.send_if_modified(|shown| match shown {
                Some(d) if d.session_id == rotated.session_id => {
                    d.code = rotated.code;
                    true
                }
                _ => false,
            });
        });
    }

    /// Opens the display for a cached session by id, showing the code the
    /// issuer holds right now rather than the one from the last list fetch.
    pub async fn open_display_by_id(&mut self, id: &str) -> Result<DisplayedCode, ClientError> {
        let mut session = self
            .find(id)
            .cloned()
            .ok_or_else(|| ClientError::Rejected(format!("unknown session {id}")))?;
        session.qr_code = self.issuer.current_code(&session.id).await?.into_inner();
        self.open_display(&session);
        self.displayed()
            .ok_or_else(|| ClientError::Rejected("display closed".into()))
    }

    /// Stops rotation and clears the display. Idempotent.
    pub fn close_display(&mut self) {
        self.refresh.stop();
        self.display.send_replace(None);
    }

    pub fn displayed(&self) -> Option<DisplayedCode> {
        self.display.borrow().clone()
    }

    pub fn watch_display(&self) -> watch::Receiver<Option<DisplayedCode>> {
        self.display.subscribe()
    }

    pub fn refresh_status(&self) -> watch::Receiver<RefreshStatus> {
        self.refresh.status()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_running()
    }

    async fn reload_quietly(&mut self) {
        if let Err(e) = self.reload().await {
            warn!(error = %e, "session list reload failed");
        }
    }
}
