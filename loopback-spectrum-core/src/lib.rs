//! # loopback-spectrum-core
//!
//! Platform-agnostic loopback capture and spectral analysis core.
//!
//! Polls the audio currently being rendered by the system, keeps the
//! largest packet of each tick in one reusable buffer, and turns it into a
//! fixed-length time-domain frame and its spectrum. Platform backends
//! (Windows WASAPI) implement the `LoopbackBackend` trait and plug into the
//! generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-spectrum-core (this crate)
//! ├── traits/       ← LoopbackBackend, PacketSource, NegotiatedFormat, FrameSource
//! ├── models/       ← CaptureError, CaptureState, StreamFormat, configuration, diagnostics
//! ├── processing/   ← gain conversion, channel downmix, SpectralFrame
//! └── session/      ← CaptureSession (handshake, drain, release)
//! ```
//!
//! Everything is driven from one thread, once per presentation tick:
//! ```ignore
//! let mut session = CaptureSession::new(backend);
//! session.start()?;
//! let mut spectrum = SpectralFrame::new();
//! loop {
//!     if spectrum.update(&mut session, gain_db) {
//!         draw(spectrum.get(), spectrum.magnitudes());
//!     }
//! }
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::config::{AnalysisConfiguration, CaptureConfiguration, GAIN_DB_MAX, GAIN_DB_MIN};
pub use models::diagnostics::CaptureDiagnostics;
pub use models::error::CaptureError;
pub use models::format::{SampleFormat, StreamFormat};
pub use models::state::CaptureState;
pub use processing::gain::gain_db_to_linear;
pub use processing::spectrum::SpectralFrame;
pub use session::loopback::CaptureSession;
pub use traits::frame_source::{CapturedFrame, FrameSource};
pub use traits::loopback_backend::{LoopbackBackend, NegotiatedFormat, Packet, PacketSource};
