use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::AttendanceRecord;
use crate::response::AttendanceResponse;
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkRequest<'a> {
    qr_data: &'a str,
}

impl ApiClient {
    /// POST /attendance/mark
    ///
    /// Forwards the decoded payload verbatim. The issuer decides whether it is
    /// current, belongs to an open session, and whether this user already counted.
    pub async fn mark_attendance(&self, qr_data: &str) -> Result<AttendanceResponse, ClientError> {
        self.with_body(Method::POST, &["attendance", "mark"], &MarkRequest { qr_data })
            .await
    }

    /// GET /attendance/check/{sessionId}
    pub async fn check_attendance(&self, session_id: &str) -> Result<bool, ClientError> {
        let resp: AttendanceResponse = self.get(&["attendance", "check", session_id]).await?;
        Ok(resp.attended.unwrap_or(false))
    }

    /// GET /attendance/my-attendance
    pub async fn my_attendance(&self) -> Result<Vec<AttendanceRecord>, ClientError> {
        let resp: AttendanceResponse = self.get(&["attendance", "my-attendance"]).await?;
        match resp.attendance {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// GET /attendance/session/{sessionId}
    ///
    /// Presenter view of who scanned; the shape is issuer-defined so it is
    /// returned as the raw envelope.
    pub async fn session_attendance(
        &self,
        session_id: &str,
    ) -> Result<AttendanceResponse, ClientError> {
        self.get(&["attendance", "session", session_id]).await
    }
}
