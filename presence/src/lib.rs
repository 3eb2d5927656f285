//! # Presence Protocol Core
//!
//! Client side of the rotating-code attendance exchange.
//!
//! ## Presenter side
//! - [`refresh::RefreshLoop`] keeps asking the issuer for a freshly rotated
//!   code while a display is open, one request at a time.
//! - [`presenter::Presenter`] owns the session list and the open display.
//!
//! ## Participant side
//! - [`capture::CaptureDeviceManager`] hands out at most one
//!   [`capture::CaptureSession`] at a time and releases it on drop.
//! - [`sampler::FrameSampler`] copies frames into a pixel buffer on a cadence
//!   and runs the [`decoder::CodeDecoder`].
//! - [`scanner::ScanLoop`] sequences acquisition, sampling, detection and
//!   shutdown; only the first decoded payload per capture session wins.
//! - [`reconciler::AttendanceReconciler`] submits that payload once and keeps
//!   the local [`record::PresenceRecord`].
//! - [`participant::Participant`] ties these together for one user.

pub mod capture;
pub mod code;
pub mod decoder;
pub mod issuer;
pub mod notice;
pub mod participant;
pub mod presenter;
pub mod reconciler;
pub mod record;
pub mod refresh;
pub mod sampler;
pub mod scanner;
mod ticker;

pub use code::{Code, DecodedPayload, RotatedCode};
pub use reconciler::SubmitOutcome;
pub use scanner::{ScanLoop, ScanState};
