//! # Refresh Loop
//!
//! While a presenter display is open, asks the issuer for a freshly rotated
//! code every period and hands each one to the display callback.
//!
//! - Requests never overlap: the next one is scheduled only after the
//!   previous one finished. Deadlines missed while waiting are skipped, not
//!   fired in a burst.
//! - A failed rotation keeps the last good code on screen. After
//!   `backoff_after` consecutive failures the delay doubles per failure up to
//!   `max_backoff`; the loop never gives up on its own.
//! - After [`RefreshLoop::stop`] returns the callback is never invoked again,
//!   even for a response that was already in flight.

use crate::code::RotatedCode;
use crate::issuer::CodeIssuer;
use crate::ticker::{Gate, MIN_PERIOD, Ticker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use util::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub period: Duration,
    /// Consecutive failures before the delay starts growing. `0` disables backoff.
    pub backoff_after: u32,
    pub max_backoff: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            backoff_after: 3,
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RefreshPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            period: config.qr_refresh_period(),
            backoff_after: config.refresh_backoff_after,
            max_backoff: config.refresh_max_backoff(),
        }
    }

    /// Delay before the next request given the current failure streak.
    /// Never shorter than one millisecond.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        let period = self.period.max(MIN_PERIOD);
        if self.backoff_after == 0 || consecutive_failures < self.backoff_after {
            return period;
        }
        let doublings = (consecutive_failures - self.backoff_after + 1).min(16);
        period
            .saturating_mul(1 << doublings)
            .min(self.max_backoff.max(period))
    }

    fn is_sustained(&self, consecutive_failures: u32) -> bool {
        self.backoff_after > 0 && consecutive_failures >= self.backoff_after
    }
}

/// Observable progress of the running loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub session_id: Option<String>,
    /// Codes delivered to the display since the loop started.
    pub rotations: u64,
    pub consecutive_failures: u32,
    pub in_flight: bool,
}

pub struct RefreshLoop {
    issuer: Arc<dyn CodeIssuer>,
    policy: RefreshPolicy,
    status: Arc<watch::Sender<RefreshStatus>>,
    running: Option<Running>,
}

struct Running {
    session_id: String,
    ticker: Ticker,
}

impl RefreshLoop {
    pub fn new(issuer: Arc<dyn CodeIssuer>, policy: RefreshPolicy) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        Self {
            issuer,
            policy,
            status: Arc::new(status),
            running: None,
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Starts rotating `session_id`, stopping any loop already running.
    /// The first request fires one period from now.
    ///
    /// `display` runs on the loop's task and must not stop this loop.
    pub fn start<F>(&mut self, session_id: impl Into<String>, display: F)
    where
        F: Fn(RotatedCode) + Send + Sync + 'static,
    {
        self.stop();
        let session_id = session_id.into();
        self.status.send_replace(RefreshStatus {
            session_id: Some(session_id.clone()),
            ..RefreshStatus::default()
        });

        let issuer = self.issuer.clone();
        let policy = self.policy.clone();
        let status = self.status.clone();
        let id = session_id.clone();
        let ticker = Ticker::spawn(move |gate| rotate(issuer, policy, id, display, status, gate));

        info!(session = %session_id, period_ms = self.policy.period.as_millis() as u64, "code refresh started");
        self.running = Some(Running { session_id, ticker });
    }

    /// Stops the loop. Idempotent; a no-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.ticker.stop();
            self.status.send_modify(|s| s.in_flight = false);
            info!(session = %running.session_id, "code refresh stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| r.ticker.is_running())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.session_id.as_str())
    }

    pub fn status(&self) -> watch::Receiver<RefreshStatus> {
        self.status.subscribe()
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn rotate<F>(
    issuer: Arc<dyn CodeIssuer>,
    policy: RefreshPolicy,
    session_id: String,
    display: F,
    status: Arc<watch::Sender<RefreshStatus>>,
    gate: Gate,
) where
    F: Fn(RotatedCode) + Send + Sync + 'static,
{
    let mut failures: u32 = 0;
    let mut deadline = Instant::now() + policy.delay_after(0);

    loop {
        time::sleep_until(deadline).await;

        if gate.with_open(|_| status.send_modify(|s| s.in_flight = true)).is_none() {
            return;
        }
        let result = issuer.fresh_code(&session_id).await;

        let delivered = gate.with_open(|_| {
            match result {
                Ok(code) => {
                    failures = 0;
                    display(RotatedCode {
                        session_id: session_id.clone(),
                        code,
                        received_at: Instant::now(),
                    });
                    status.send_modify(|s| {
                        s.rotations += 1;
                        s.consecutive_failures = 0;
                        s.in_flight = false;
                    });
                    debug!(session = %session_id, "code rotated");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    status.send_modify(|s| {
                        s.consecutive_failures = failures;
                        s.in_flight = false;
                    });
                    if policy.is_sustained(failures) {
                        error!(session = %session_id, failures, error = %e, "code refresh keeps failing, backing off");
                    } else {
                        warn!(session = %session_id, failures, error = %e, "code refresh failed, keeping previous code");
                    }
                }
            }
        });
        if delivered.is_none() {
            return;
        }

        let delay = policy.delay_after(failures);
        deadline += delay;
        let now = Instant::now();
        if deadline <= now {
            // Skip to the first deadline still ahead of us.
            let late = (now - deadline).as_nanos() % delay.as_nanos();
            deadline = now + (delay - Duration::from_nanos(late as u64));
        }
    }
}
