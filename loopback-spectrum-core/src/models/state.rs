use super::error::CaptureError;

/// Capture session state.
///
/// State transitions:
/// ```text
/// idle ──start()──→ capturing ──stop()──→ idle
///   │                   │
///   └──start() fails──→ failed ──start()/stop()──→ capturing / idle
/// ```
///
/// A restart always passes through a full release first.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The error from the last failed start, if that is the current state.
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
