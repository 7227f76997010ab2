//! # loopback-spectrum-windows
//!
//! Windows WASAPI backend for loopback-spectrum.
//!
//! Provides:
//! - `WasapiLoopback`: `LoopbackBackend` over the default render endpoint
//! - `WasapiCaptureSession`: `CaptureSession` bound to that backend
//!
//! ## Usage
//! ```ignore
//! use loopback_spectrum_core::SpectralFrame;
//! use loopback_spectrum_windows::WasapiLoopback;
//!
//! let mut session = WasapiLoopback::default_session();
//! let capture_ok = session.start().is_ok();
//! let mut spectrum = SpectralFrame::new();
//! // once per frame:
//! if capture_ok {
//!     spectrum.update(&mut session, gain_db);
//! }
//! ```

#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use wasapi_loopback::{WasapiCaptureSession, WasapiLoopback};
