use serde::{Deserialize, Serialize};

/// Lower end of the gain slider in the reference control panel, in dB.
///
/// Hint only: the analysis path accepts any finite gain.
pub const GAIN_DB_MIN: f32 = -10.0;

/// Upper end of the gain slider in the reference control panel, in dB.
pub const GAIN_DB_MAX: f32 = 50.0;

/// Default forward transform length.
pub const DEFAULT_TRANSFORM_LENGTH: usize = 1024;

/// Configuration for a loopback capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Upper bound for the reusable frame buffer (default: 16 MiB).
    ///
    /// A packet that would need more is skipped as a growth failure.
    pub max_frame_buffer_bytes: usize,

    /// Back-to-back get-buffer failures tolerated in one drain (default: 3).
    pub max_consecutive_read_failures: u32,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_frame_buffer_bytes == 0 {
            return Err("frame buffer limit must be positive".into());
        }
        if self.max_consecutive_read_failures == 0 {
            return Err("read failure limit must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            max_frame_buffer_bytes: 16 * 1024 * 1024,
            max_consecutive_read_failures: 3,
        }
    }
}

/// Configuration for the spectral frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfiguration {
    /// Forward transform length in samples (default: 1024).
    pub transform_length: usize,
}

impl AnalysisConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.transform_length == 0 {
            return Err("transform length must be positive".into());
        }
        Ok(())
    }
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        Self {
            transform_length: DEFAULT_TRANSFORM_LENGTH,
        }
    }
}
