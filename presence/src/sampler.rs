//! Periodic frame sampling.
//!
//! Every `period` the sampler draws the current frame into a reused
//! [`Frame`] buffer and runs the decoder over it. Ticks where the stream has
//! no complete frame are skipped. Positive results are sent on the detection
//! channel in the order they were sampled.

use crate::capture::{Frame, FrameSource};
use crate::decoder::CodeDecoder;
use crate::ticker::{MIN_PERIOD, Ticker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub period: Duration,
    /// Stop after the first positive decode.
    pub one_shot: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(300),
            one_shot: true,
        }
    }
}

pub struct FrameSampler {
    ticker: Ticker,
}

impl FrameSampler {
    pub fn start(
        frames: FrameSource,
        decoder: Arc<dyn CodeDecoder>,
        config: SamplerConfig,
        detections: mpsc::UnboundedSender<String>,
    ) -> Self {
        let period = config.period.max(MIN_PERIOD);
        let ticker = Ticker::spawn(move |gate| async move {
            let mut surface = Frame::default();
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let sampled = gate.with_open(|open| {
                    if let Some(data) = sample_once(&frames, decoder.as_ref(), &mut surface) {
                        debug!(bytes = data.len(), "code detected in frame");
                        if detections.send(data).is_err() || config.one_shot {
                            *open = false;
                        }
                    }
                    *open
                });
                if sampled != Some(true) {
                    break;
                }
            }
        });
        Self { ticker }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Stops sampling. No decode runs once this returns.
    pub fn stop(&mut self) {
        self.ticker.stop();
    }
}

/// One tick: draw, then decode. `None` when the frame is not ready or holds no code.
pub(crate) fn sample_once(
    frames: &FrameSource,
    decoder: &dyn CodeDecoder,
    surface: &mut Frame,
) -> Option<String> {
    if !frames.draw_into(surface) {
        trace!("frame not ready, skipping tick");
        return None;
    }
    decoder.decode(surface).filter(|data| !data.is_empty())
}
