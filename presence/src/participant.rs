//! Participant facade: session list, presence record and one scanner at a time.

use crate::capture::CaptureDeviceManager;
use crate::code::DecodedPayload;
use crate::decoder::CodeDecoder;
use crate::issuer::{AttendanceVerifier, SessionDirectory};
use crate::notice::NoticeBoard;
use crate::reconciler::{AttendanceReconciler, SubmitOutcome};
use crate::record::PresenceRecord;
use crate::scanner::{ScanConfig, ScanLoop, ScanState};
use client::ClientError;
use client::models::Session;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

pub struct Participant {
    directory: Arc<dyn SessionDirectory>,
    devices: CaptureDeviceManager,
    decoder: Arc<dyn CodeDecoder>,
    scan_config: ScanConfig,
    reconciler: AttendanceReconciler,
    sessions: Vec<Session>,
    scanner: Option<(String, ScanLoop)>,
}

impl Participant {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        verifier: Arc<dyn AttendanceVerifier>,
        devices: CaptureDeviceManager,
        decoder: Arc<dyn CodeDecoder>,
        scan_config: ScanConfig,
        notices: NoticeBoard,
    ) -> Self {
        Self {
            directory,
            devices,
            decoder,
            scan_config,
            reconciler: AttendanceReconciler::new(verifier, notices),
            sessions: Vec::new(),
            scanner: None,
        }
    }

    /// Replaces the cached session list and seeds the presence record for it.
    pub async fn reload(&mut self) -> Result<&[Session], ClientError> {
        self.sessions = self.directory.list().await?;
        self.reconciler
            .seed(self.sessions.iter().map(|s| s.id.as_str()))
            .await;
        Ok(&self.sessions)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn has_attended(&self, session_id: &str) -> bool {
        self.reconciler.record().has_attended(session_id)
    }

    pub fn record(&self) -> &PresenceRecord {
        self.reconciler.record()
    }

    pub fn notices(&self) -> &NoticeBoard {
        self.reconciler.notices()
    }

    /// Opens a scanner for `session_id`, closing any scanner already open.
    pub async fn open_scanner(&mut self, session_id: &str) -> watch::Receiver<ScanState> {
        self.close_scanner().await;
        let scanner = ScanLoop::open(
            self.devices.clone(),
            self.decoder.clone(),
            self.scan_config.clone(),
        );
        let state = scanner.subscribe();
        self.scanner = Some((session_id.to_owned(), scanner));
        state
    }

    pub fn scanner_state(&self) -> Option<ScanState> {
        self.scanner.as_ref().map(|(_, s)| s.state())
    }

    /// Asks a scanner parked in `Errored` to request the camera again, and
    /// returns once it has left that state (or failed again).
    pub async fn retry_scanner(&self) {
        let Some((_, scanner)) = &self.scanner else {
            return;
        };
        let mut state = scanner.subscribe();
        if !matches!(*state.borrow_and_update(), ScanState::Errored(_)) {
            return;
        }
        scanner.retry();
        let _ = state.changed().await;
    }

    /// Closes the open scanner, if any, and waits for the camera to be released.
    pub async fn close_scanner(&mut self) {
        if let Some((_, mut scanner)) = self.scanner.take() {
            scanner.close().await;
        }
    }

    /// Waits for the open scanner's detection and submits it.
    ///
    /// Returns `None` when no scanner is open, when it closed without
    /// detecting anything, or when it is parked in `Errored`; in the last case
    /// the scanner stays open so [`Participant::retry_scanner`] can revive it.
    /// The camera is released before the payload is verified. Dropping the
    /// returned future leaves the scanner running.
    pub async fn complete_scan(&mut self) -> Option<SubmitOutcome> {
        let (_, scanner) = self.scanner.as_mut()?;
        let mut state = scanner.subscribe();
        let payload = tokio::select! {
            payload = scanner.detection() => payload,
            _ = state.wait_for(|s| matches!(s, ScanState::Errored(_))) => return None,
        };

        let (session_id, mut scanner) = self.scanner.take()?;
        scanner.close().await;

        let outcome = self.reconciler.submit(Some(&session_id), payload?).await;
        if outcome == SubmitOutcome::Marked {
            if let Err(e) = self.reload().await {
                warn!(error = %e, "session list reload failed");
            }
        }
        Some(outcome)
    }

    /// Submits a payload obtained some other way (pasted, scanned elsewhere).
    pub async fn submit_payload(&self, session_id: Option<&str>, payload: String) -> SubmitOutcome {
        self.reconciler
            .submit(session_id, DecodedPayload::new(payload))
            .await
    }
}
