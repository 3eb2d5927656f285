//! # Scan Loop
//!
//! Drives one scanning attempt from camera request to detection:
//!
//! ```text
//! Idle -> Requesting -> Active -> Scanning -> Detected -> Closed
//!            |   ^
//!            v   | retry
//!          Errored
//! ```
//!
//! Any state moves to `Closed` on [`ScanLoop::close`]. A driver task owns the
//! [`CaptureSession`]; whichever way the task ends, the session is dropped and
//! the device released. The first decoded payload wins: the sampler is
//! stopped and the session claimed before the payload is handed off, and the
//! device is released right after, whatever verification later says.

use crate::capture::{CaptureDeviceManager, CaptureError, CaptureSession, Facing};
use crate::code::DecodedPayload;
use crate::decoder::CodeDecoder;
use crate::sampler::{FrameSampler, SamplerConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};
use util::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Requesting,
    Active,
    Scanning,
    Detected,
    Closed,
    Errored(CaptureError),
}

impl ScanState {
    /// Hint shown next to the viewfinder.
    pub fn instruction(&self) -> &str {
        match self {
            ScanState::Idle | ScanState::Requesting => "Starting camera...",
            ScanState::Active => "Waiting for the camera picture...",
            ScanState::Scanning => "Position the QR code within the frame",
            ScanState::Detected => "Code detected, verifying...",
            ScanState::Closed => "Scanner closed",
            ScanState::Errored(_) => "Camera unavailable. Retry when ready.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub facing: Facing,
    pub sampler: SamplerConfig,
    /// How often to check whether the stream has delivered its first frame.
    pub ready_poll: Duration,
    /// Wait before requesting the camera.
    pub start_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            sampler: SamplerConfig::default(),
            ready_poll: Duration::from_millis(50),
            start_delay: Duration::ZERO,
        }
    }
}

impl ScanConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sampler: SamplerConfig {
                period: config.scan_interval(),
                ..SamplerConfig::default()
            },
            start_delay: config.scanner_start_delay(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
enum Command {
    Retry,
    Close,
}

/// One scanning attempt. See the module docs for the state machine.
///
/// Dropping the loop cancels it and releases the camera.
pub struct ScanLoop {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ScanState>,
    payload: Option<oneshot::Receiver<DecodedPayload>>,
    task: Option<JoinHandle<()>>,
}

impl ScanLoop {
    /// Starts the loop. It begins in `Idle` and requests the camera after
    /// `config.start_delay`.
    pub fn open(
        devices: CaptureDeviceManager,
        decoder: Arc<dyn CodeDecoder>,
        config: ScanConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);
        let (payload_tx, payload_rx) = oneshot::channel();

        let driver = Driver {
            devices,
            decoder,
            config,
            state: state_tx,
            commands: commands_rx,
            payload: Some(payload_tx),
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            payload: Some(payload_rx),
            task: Some(task),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    /// Asks for the camera again after an error. Ignored in any other state.
    pub fn retry(&self) {
        let _ = self.commands.send(Command::Retry);
    }

    /// Moves to `Closed` from any state and waits until the camera is released.
    pub async fn close(&mut self) {
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "scan driver ended abnormally");
            }
        }
    }

    /// Resolves with the detected payload, or `None` if the loop closed
    /// without one. Yields the payload at most once. Cancel safe.
    pub async fn detection(&mut self) -> Option<DecodedPayload> {
        let payload = self.payload.as_mut()?;
        let received = payload.await.ok();
        self.payload = None;
        received
    }
}

impl Drop for ScanLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Driver {
    devices: CaptureDeviceManager,
    decoder: Arc<dyn CodeDecoder>,
    config: ScanConfig,
    state: watch::Sender<ScanState>,
    commands: mpsc::UnboundedReceiver<Command>,
    payload: Option<oneshot::Sender<DecodedPayload>>,
}

impl Driver {
    async fn run(mut self) {
        self.drive().await;
        self.set(ScanState::Closed);
    }

    fn set(&self, next: ScanState) {
        let prev = self.state.send_replace(next.clone());
        if prev != next {
            info!(from = ?prev, to = ?next, "scanner state");
        }
    }

    /// Returns once the loop is done. Any capture session acquired here has
    /// been dropped by then.
    async fn drive(&mut self) {
        if !self.config.start_delay.is_zero()
            && until_closed(&mut self.commands, time::sleep(self.config.start_delay))
                .await
                .is_none()
        {
            return;
        }

        let Some(mut session) = self.acquire().await else {
            return;
        };
        self.set(ScanState::Active);

        let ready = wait_until_ready(&session, self.config.ready_poll);
        if until_closed(&mut self.commands, ready).await.is_none() {
            return;
        }

        let (detections_tx, mut detections) = mpsc::unbounded_channel();
        let mut sampler = FrameSampler::start(
            session.frames(),
            self.decoder.clone(),
            self.config.sampler,
            detections_tx,
        );
        self.set(ScanState::Scanning);

        let first = until_closed(&mut self.commands, detections.recv()).await;
        sampler.stop();

        if let Some(Some(data)) = first {
            if session.claim() {
                self.set(ScanState::Detected);
                drop(detections);
                if let Some(payload) = self.payload.take() {
                    let _ = payload.send(DecodedPayload::new(data));
                }
                session.release();
            }
        }
    }

    /// Requests the camera until it is granted or the loop is closed.
    /// Failures park the loop in `Errored` until a retry.
    async fn acquire(&mut self) -> Option<CaptureSession> {
        loop {
            self.set(ScanState::Requesting);
            let attempt = self.devices.acquire(self.config.facing);
            match until_closed(&mut self.commands, attempt).await? {
                Ok(session) => return Some(session),
                Err(e) => {
                    warn!(error = %e, retryable = e.is_retryable(), "camera request failed");
                    self.set(ScanState::Errored(e));
                    loop {
                        match self.commands.recv().await {
                            Some(Command::Retry) => break,
                            Some(Command::Close) | None => return None,
                        }
                    }
                }
            }
        }
    }
}

/// Awaits `fut` unless a close command arrives first. Retries are ignored.
async fn until_closed<F: Future>(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    fut: F,
) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            cmd = commands.recv() => match cmd {
                Some(Command::Retry) => continue,
                Some(Command::Close) | None => return None,
            },
            out = &mut fut => return Some(out),
        }
    }
}

async fn wait_until_ready(session: &CaptureSession, poll: Duration) {
    let mut ticks = time::interval(poll);
    loop {
        ticks.tick().await;
        if session.dimensions().is_some() {
            return;
        }
    }
}
