//! Seams between the protocol loops and the issuer API.
//!
//! The loops only talk to these traits. [`client::ApiClient`] implements all
//! three; tests swap in scripted fakes.

use crate::code::Code;
use async_trait::async_trait;
use client::models::{CreateSessionData, Session, UpdateSessionData};
use client::{ApiClient, ClientError};

/// Source of session codes.
#[async_trait]
pub trait CodeIssuer: Send + Sync {
    /// The code the issuer currently holds for `session_id`, without rotating it.
    async fn current_code(&self, session_id: &str) -> Result<Code, ClientError>;

    /// Asks the issuer to rotate the code for `session_id` and returns the new one.
    async fn fresh_code(&self, session_id: &str) -> Result<Code, ClientError>;
}

/// Verifies decoded payloads and answers attendance queries.
#[async_trait]
pub trait AttendanceVerifier: Send + Sync {
    /// Submits a decoded payload verbatim. `Ok` carries the issuer's message.
    async fn mark(&self, payload: &str) -> Result<String, ClientError>;

    /// Whether the current user already counts as present in `session_id`.
    async fn check(&self, session_id: &str) -> Result<bool, ClientError>;
}

/// Session list and presenter-side session management.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Session>, ClientError>;
    async fn create(&self, data: &CreateSessionData) -> Result<Session, ClientError>;
    async fn update(&self, id: &str, data: &UpdateSessionData) -> Result<Session, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
    async fn toggle(&self, id: &str) -> Result<Session, ClientError>;
}

#[async_trait]
impl CodeIssuer for ApiClient {
    async fn current_code(&self, session_id: &str) -> Result<Code, ClientError> {
        let session = self.get_session(session_id).await?;
        Ok(Code::new(session.qr_code))
    }

    async fn fresh_code(&self, session_id: &str) -> Result<Code, ClientError> {
        self.generate_code(session_id).await.map(Code::new)
    }
}

#[async_trait]
impl AttendanceVerifier for ApiClient {
    async fn mark(&self, payload: &str) -> Result<String, ClientError> {
        let resp = self.mark_attendance(payload).await?;
        Ok(resp.message.unwrap_or_default())
    }

    async fn check(&self, session_id: &str) -> Result<bool, ClientError> {
        self.check_attendance(session_id).await
    }
}

#[async_trait]
impl SessionDirectory for ApiClient {
    async fn list(&self) -> Result<Vec<Session>, ClientError> {
        self.list_sessions().await
    }

    async fn create(&self, data: &CreateSessionData) -> Result<Session, ClientError> {
        self.create_session(data).await
    }

    async fn update(&self, id: &str, data: &UpdateSessionData) -> Result<Session, ClientError> {
        self.update_session(id, data).await
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.delete_session(id).await
    }

    async fn toggle(&self, id: &str) -> Result<Session, ClientError> {
        self.toggle_session(id).await
    }
}
