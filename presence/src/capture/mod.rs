//! # Capture Devices
//!
//! Platform camera access sits behind [`CaptureBackend`] and [`VideoStream`].
//! The rest of the crate only ever holds a stream through a
//! [`CaptureSession`], which [`CaptureDeviceManager`] hands out one at a time.

mod manager;

pub use manager::{CaptureDeviceManager, CaptureSession, FrameSource};

use async_trait::async_trait;
use thiserror::Error;
use util::config::AppConfig;

/// Which camera to ask the platform for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear-facing, preferred for pointing at a displayed code.
    Environment,
    User,
    /// Whatever device the platform has.
    Any,
}

/// Requested device and ideal resolution. Resolution is a hint; the backend
/// falls back to whatever the device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            width: 1280,
            height: 720,
        }
    }
}

impl CaptureConstraints {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            width: config.capture_width,
            height: config.capture_height,
            ..Self::default()
        }
    }

    pub fn with_facing(self, facing: Facing) -> Self {
        Self { facing, ..self }
    }
}

/// Why a capture device could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Camera access denied. Please allow camera access and try again.")]
    Denied,

    #[error("No camera found on this device.")]
    NotFound,

    #[error("Error accessing camera: {0}")]
    Unavailable(String),
}

impl CaptureError {
    /// Whether trying again on the same hardware can succeed.
    ///
    /// A denied permission can be granted and a busy camera can free up, but
    /// a missing camera stays missing.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CaptureError::NotFound)
    }
}

/// RGBA pixel buffer a frame is drawn into before decoding.
///
/// The sampler keeps one and redraws into it every tick; [`Frame::resize`]
/// only reallocates when the stream dimensions change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Matches the buffer to `width` x `height`, keeping its allocation when it can.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.resize(width as usize * height as usize * 4, 0);
    }
}

/// Platform entry point for opening camera streams.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Opens a stream for `constraints`. With [`Facing::Any`] any device must do.
    async fn open(&self, constraints: CaptureConstraints)
    -> Result<Box<dyn VideoStream>, CaptureError>;
}

/// A live camera stream.
pub trait VideoStream: Send {
    /// Stream dimensions, or `None` until the first metadata has arrived.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Copies the current frame into `surface`, resizing it to the stream.
    /// Returns `false` when no complete frame is available yet.
    fn draw_into(&mut self, surface: &mut Frame) -> bool;

    /// Stops every track. Called once, by the owning [`CaptureSession`].
    fn stop(&mut self);
}
