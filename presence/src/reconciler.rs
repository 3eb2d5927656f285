//! # Attendance Reconciler
//!
//! Submits decoded payloads to the verifier and folds the answers into the
//! local [`PresenceRecord`]. The issuer is the authority: only a confirmed
//! mark sets a session to present, and nothing here ever clears it.

use crate::code::DecodedPayload;
use crate::issuer::AttendanceVerifier;
use crate::notice::{NoticeBoard, NoticeLevel};
use crate::record::PresenceRecord;
use client::ClientError;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MARKED_NOTICE: &str = "Attendance marked successfully!";
pub const ALREADY_MARKED_NOTICE: &str = "Attendance already recorded for this session.";

/// What the issuer said about one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Marked,
    /// This user was already counted. Not an error.
    AlreadyMarked,
    /// Rejected: expired code, closed session, unknown code and so on.
    Invalid(String),
    /// No answer from the issuer. The user can scan again.
    NetworkError(String),
}

impl SubmitOutcome {
    /// Whether the user ends up counted as present.
    pub fn is_present(&self) -> bool {
        matches!(self, SubmitOutcome::Marked | SubmitOutcome::AlreadyMarked)
    }
}

impl From<ClientError> for SubmitOutcome {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::Status { .. } | ClientError::Rejected(_) if !err.is_transport() => {
                let message = err.issuer_message().unwrap_or_default().to_owned();
                if is_already_marked(&message) {
                    SubmitOutcome::AlreadyMarked
                } else {
                    SubmitOutcome::Invalid(message)
                }
            }
            _ => SubmitOutcome::NetworkError(err.to_string()),
        }
    }
}

fn is_already_marked(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already") && (lower.contains("mark") || lower.contains("record"))
}

pub struct AttendanceReconciler {
    verifier: Arc<dyn AttendanceVerifier>,
    record: PresenceRecord,
    notices: NoticeBoard,
}

impl AttendanceReconciler {
    pub fn new(verifier: Arc<dyn AttendanceVerifier>, notices: NoticeBoard) -> Self {
        Self {
            verifier,
            record: PresenceRecord::new(),
            notices,
        }
    }

    pub fn record(&self) -> &PresenceRecord {
        &self.record
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Submits `payload` exactly once and posts a notice for the result.
    ///
    /// `session_id` is the session the user meant to scan for. When given, a
    /// confirmed mark flips that session in the record.
    pub async fn submit(&self, session_id: Option<&str>, payload: DecodedPayload) -> SubmitOutcome {
        let data = payload.into_inner();
        debug!(bytes = data.len(), session = ?session_id, "submitting decoded payload");

        let outcome = match self.verifier.mark(&data).await {
            Ok(_) => SubmitOutcome::Marked,
            Err(e) => SubmitOutcome::from(e),
        };

        match &outcome {
            SubmitOutcome::Marked => {
                if let Some(id) = session_id {
                    self.record.mark_present(id);
                }
                self.notices.post(NoticeLevel::Success, MARKED_NOTICE);
                info!(session = ?session_id, "attendance marked");
            }
            SubmitOutcome::AlreadyMarked => {
                self.notices.post(NoticeLevel::Info, ALREADY_MARKED_NOTICE);
                info!(session = ?session_id, "attendance was already marked");
            }
            SubmitOutcome::Invalid(message) => {
                self.notices.post(NoticeLevel::Error, message.as_str());
                warn!(session = ?session_id, %message, "payload rejected");
            }
            SubmitOutcome::NetworkError(message) => {
                self.notices
                    .post(NoticeLevel::Error, format!("Failed to mark attendance: {message}"));
                warn!(session = ?session_id, %message, "could not reach verifier");
            }
        }
        outcome
    }

    /// Asks the issuer about every listed session and merges the answers.
    ///
    /// Checks run concurrently. A failed check leaves that entry as it was.
    pub async fn seed<I, S>(&self, session_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = session_ids
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect();
        let checks = ids.iter().map(|id| self.verifier.check(id));
        let answers = join_all(checks).await;

        for (id, answer) in ids.iter().zip(answers) {
            match answer {
                Ok(attended) => self.record.merge(id, attended),
                Err(e) => warn!(session = %id, error = %e, "attendance check failed"),
            }
        }
    }
}
