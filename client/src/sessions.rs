use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::{CreateSessionData, Session, UpdateSessionData};
use crate::response::{QrResponse, SessionResponse};
use reqwest::Method;

impl ApiClient {
    /// GET /sessions
    pub async fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        let resp: SessionResponse = self.get(&["sessions"]).await?;
        Ok(resp.sessions.unwrap_or_default())
    }

    /// GET /sessions/{id}
    pub async fn get_session(&self, id: &str) -> Result<Session, ClientError> {
        let resp: SessionResponse = self.get(&["sessions", id]).await?;
        expect_session(resp)
    }

    /// POST /sessions
    pub async fn create_session(&self, data: &CreateSessionData) -> Result<Session, ClientError> {
        let resp: SessionResponse = self.with_body(Method::POST, &["sessions"], data).await?;
        expect_session(resp)
    }

    /// PUT /sessions/{id}
    pub async fn update_session(
        &self,
        id: &str,
        data: &UpdateSessionData,
    ) -> Result<Session, ClientError> {
        let resp: SessionResponse = self.with_body(Method::PUT, &["sessions", id], data).await?;
        expect_session(resp)
    }

    /// DELETE /sessions/{id}
    pub async fn delete_session(&self, id: &str) -> Result<(), ClientError> {
        let _: SessionResponse = self.delete(&["sessions", id]).await?;
        Ok(())
    }

    /// PATCH /sessions/{id}/toggle
    pub async fn toggle_session(&self, id: &str) -> Result<Session, ClientError> {
        let resp: SessionResponse = self
            .with_body(Method::PATCH, &["sessions", id, "toggle"], &serde_json::json!({}))
            .await?;
        expect_session(resp)
    }

    /// GET /qr/generate/{sessionId}
    ///
    /// Asks the issuer to rotate the session's code and returns the new one.
    pub async fn generate_code(&self, session_id: &str) -> Result<String, ClientError> {
        let resp: QrResponse = self.get(&["qr", "generate", session_id]).await?;
        resp.qr_code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ClientError::Rejected("issuer returned no code".into()))
    }
}

fn expect_session(resp: SessionResponse) -> Result<Session, ClientError> {
    resp.session
        .ok_or_else(|| ClientError::Rejected("response carried no session".into()))
}
