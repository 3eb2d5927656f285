//! JSON envelopes returned by the issuer.
//!
//! Every response carries a `success` boolean:
//! ```json
//! { "success": true, "message": "Attendance marked", ... }
//! ```
//! Anything other than `success: true` is a recoverable failure for the
//! caller, never a crash.

use crate::models::{Session, User};
use serde::Deserialize;
use serde_json::Value;

/// Common view over all envelopes so the client can check them generically.
pub trait Envelope {
    fn succeeded(&self) -> bool;
    fn message(&self) -> Option<&str>;
}

macro_rules! envelope {
    ($ty:ty) => {
        impl Envelope for $ty {
            fn succeeded(&self) -> bool {
                self.success
            }
            fn message(&self) -> Option<&str> {
                self.message.as_deref()
            }
        }
    };
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub sessions: Option<Vec<Session>>,
    #[serde(default)]
    pub count: Option<u64>,
}
envelope!(SessionResponse);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub attendance: Option<Value>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub attended: Option<bool>,
}
envelope!(AttendanceResponse);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
}
envelope!(QrResponse);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}
envelope!(AuthResponse);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}
envelope!(MeResponse);

/// Minimal shape used to pull a message out of an error body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
