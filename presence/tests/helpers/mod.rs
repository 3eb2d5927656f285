#![allow(dead_code)]

use async_trait::async_trait;
use client::ClientError;
use client::models::{CreateSessionData, Session, UpdateSessionData};
use presence::capture::{
    CaptureBackend, CaptureConstraints, CaptureDeviceManager, CaptureError, Facing, Frame,
    VideoStream,
};
use presence::code::Code;
use presence::decoder::CodeDecoder;
use presence::issuer::{AttendanceVerifier, CodeIssuer, SessionDirectory};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CameraStats {
    pub opens: AtomicUsize,
    pub live: AtomicUsize,
    pub stops: AtomicUsize,
    pub draws: AtomicUsize,
    pub facings: Mutex<Vec<Facing>>,
}

/// Camera whose `open` results are scripted; once the script runs out every
/// open succeeds.
pub struct FakeCamera {
    pub stats: Arc<CameraStats>,
    script: Mutex<VecDeque<Result<(), CaptureError>>>,
    open_delay: Duration,
    warmup_frames: usize,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(CameraStats::default()),
            script: Mutex::new(VecDeque::new()),
            open_delay: Duration::ZERO,
            warmup_frames: 0,
        }
    }

    pub fn failing_with(self, errors: Vec<CaptureError>) -> Self {
        *self.script.lock().unwrap() = errors.into_iter().map(Err).collect();
        self
    }

    pub fn slow_to_open(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn warming_up_for(mut self, frames: usize) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn into_manager(self) -> (CaptureDeviceManager, Arc<CameraStats>) {
        let stats = self.stats.clone();
        let manager = CaptureDeviceManager::new(Arc::new(self), CaptureConstraints::default());
        (manager, stats)
    }
}

#[async_trait]
impl CaptureBackend for FakeCamera {
    async fn open(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureError> {
        self.stats.facings.lock().unwrap().push(constraints.facing);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            stats: self.stats.clone(),
            warmup: self.warmup_frames,
            width: constraints.width.min(64),
            height: constraints.height.min(36),
        }))
    }
}

struct FakeStream {
    stats: Arc<CameraStats>,
    warmup: usize,
    width: u32,
    height: u32,
}

impl VideoStream for FakeStream {
    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn draw_into(&mut self, surface: &mut Frame) -> bool {
        self.stats.draws.fetch_add(1, Ordering::SeqCst);
        if self.warmup > 0 {
            self.warmup -= 1;
            return false;
        }
        surface.resize(self.width, self.height);
        surface.pixels_mut().fill(0x80);
        true
    }

    fn stop(&mut self) {
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Returns scripted results in order, then `None` forever.
#[derive(Default)]
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Option<String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new<I, S>(script: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|r| r.map(Into::into)).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CodeDecoder for ScriptedDecoder {
    fn decode(&self, frame: &Frame) -> Option<String> {
        assert!(!frame.is_empty(), "decoder ran on an empty frame");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().flatten()
    }
}

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Rotates codes `"{session}-{n}"`, tracking concurrency like a busy server would.
pub struct FakeIssuer {
    latency: Duration,
    failing: Mutex<Box<dyn FnMut(usize) -> bool + Send>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeIssuer {
    pub fn new(latency: Duration) -> Arc<Self> {
        Self::failing_when(latency, |_| false)
    }

    /// `fail(n)` decides whether the n-th call (1-based) fails.
    pub fn failing_when(
        latency: Duration,
        fail: impl FnMut(usize) -> bool + Send + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            latency,
            failing: Mutex::new(Box::new(fail)),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeIssuer for FakeIssuer {
    async fn current_code(&self, session_id: &str) -> Result<Code, ClientError> {
        Ok(Code::new(format!("current-{session_id}")))
    }

    async fn fresh_code(&self, session_id: &str) -> Result<Code, ClientError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fail = {
            let mut failing = self.failing.lock().unwrap();
            (*failing)(n)
        };
        if fail {
            Err(ClientError::Status {
                status: 503,
                message: "Service Unavailable".into(),
            })
        } else {
            Ok(Code::new(format!("{session_id}-{n}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Answers by payload, like the mock HTTP issuer in the client tests:
/// `valid-*` marks, `dup` is already marked, `boom` is a server error,
/// anything else has expired.
pub struct FakeVerifier {
    latency: Duration,
    pub marked: Mutex<Vec<String>>,
    pub attended: Mutex<HashMap<String, bool>>,
    pub failing_checks: Mutex<Vec<String>>,
}

impl FakeVerifier {
    pub fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            marked: Mutex::new(Vec::new()),
            attended: Mutex::new(HashMap::new()),
            failing_checks: Mutex::new(Vec::new()),
        })
    }

    pub fn set_attended(&self, session_id: &str, attended: bool) {
        self.attended
            .lock()
            .unwrap()
            .insert(session_id.to_owned(), attended);
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttendanceVerifier for FakeVerifier {
    async fn mark(&self, payload: &str) -> Result<String, ClientError> {
        self.marked.lock().unwrap().push(payload.to_owned());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match payload {
            p if p.starts_with("valid") => Ok("Attendance marked successfully".into()),
            "dup" => Err(ClientError::Status {
                status: 400,
                message: "Attendance already marked for this session".into(),
            }),
            "boom" => Err(ClientError::Status {
                status: 500,
                message: "Internal Server Error".into(),
            }),
            _ => Err(ClientError::Status {
                status: 400,
                message: "QR code has expired".into(),
            }),
        }
    }

    async fn check(&self, session_id: &str) -> Result<bool, ClientError> {
        if self
            .failing_checks
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == session_id)
        {
            return Err(ClientError::Status {
                status: 502,
                message: "Bad Gateway".into(),
            });
        }
        Ok(self
            .attended
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Session directory
// ---------------------------------------------------------------------------

pub fn session(id: &str, subject: &str) -> Session {
    serde_json::from_value(json!({
        "id": id,
        "sessionId": format!("SES-{id}"),
        "subject": subject,
        "qrCode": format!("initial-{id}"),
        "isActive": true,
    }))
    .unwrap()
}

#[derive(Default)]
pub struct FakeDirectory {
    pub sessions: Mutex<Vec<Session>>,
    pub lists: AtomicUsize,
}

impl FakeDirectory {
    pub fn with(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions),
            lists: AtomicUsize::new(0),
        })
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

fn not_found() -> ClientError {
    ClientError::Status {
        status: 404,
        message: "Session not found".into(),
    }
}

#[async_trait]
impl SessionDirectory for FakeDirectory {
    async fn list(&self) -> Result<Vec<Session>, ClientError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn create(&self, data: &CreateSessionData) -> Result<Session, ClientError> {
        let mut sessions = self.sessions.lock().unwrap();
        let created = session(&format!("s{}", sessions.len() + 1), &data.subject);
        sessions.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, data: &UpdateSessionData) -> Result<Session, ClientError> {
        let mut sessions = self.sessions.lock().unwrap();
        let found = sessions.iter_mut().find(|s| s.id == id).ok_or_else(not_found)?;
        if let Some(subject) = &data.subject {
            found.subject = subject.clone();
        }
        Ok(found.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn toggle(&self, id: &str) -> Result<Session, ClientError> {
        let mut sessions = self.sessions.lock().unwrap();
        let found = sessions.iter_mut().find(|s| s.id == id).ok_or_else(not_found)?;
        found.is_active = !found.is_active;
        Ok(found.clone())
    }
}
