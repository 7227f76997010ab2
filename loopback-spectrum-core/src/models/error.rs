use thiserror::Error;

/// Errors raised by the loopback capture session and its backends.
///
/// Handshake errors are fatal to a single `start()` call and leave the
/// session fully released. Packet errors are transient: the drain that hit
/// them skips the packet and keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("threading runtime initialization failed: {0}")]
    RuntimeInitFailed(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("client activation failed: {0}")]
    ActivationFailed(String),

    #[error("mix format unavailable: {0}")]
    FormatUnavailable(String),

    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("loopback initialization failed: {0}")]
    InitializeFailed(String),

    #[error("capture service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("stream start failed: {0}")]
    StreamStartFailed(String),

    #[error("packet read failed: {0}")]
    PacketReadFailed(String),

    #[error("packet release failed: {0}")]
    PacketReleaseFailed(String),

    #[error("frame buffer could not grow to {requested} bytes")]
    BufferGrowthFailed { requested: usize },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    /// Whether the error only affects a single packet within a drain cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PacketReadFailed(_) | Self::PacketReleaseFailed(_) | Self::BufferGrowthFailed { .. }
        )
    }
}
