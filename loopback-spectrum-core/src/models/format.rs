use serde::{Deserialize, Serialize};

/// Sample representation of one channel sample inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Float32,
    Int16,
    Int24,
    Int32,
    Unsupported,
}

impl SampleFormat {
    /// Decode one little-endian sample container into a normalized float.
    ///
    /// `bytes` must be at least as long as the container for this format.
    /// Integer formats are scaled by `2^(bits - 1)`.
    #[inline]
    pub fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Self::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
            Self::Int24 => {
                // Sign-extend by placing the 3 bytes in the top of an i32.
                let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                value as f32 / 8_388_608.0
            }
            Self::Int32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2_147_483_648.0,
            Self::Unsupported => 0.0,
        }
    }

    /// Minimum container size in bytes needed by `decode`.
    pub fn container_bytes(self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Int24 => 3,
            Self::Int16 => 2,
            Self::Unsupported => 0,
        }
    }

    /// Classify an integer PCM format by its container bit depth.
    ///
    /// Narrower valid bits inside a wider container are left-justified, so
    /// they decode correctly as the container type.
    pub fn from_pcm_bits(bits: u16) -> Self {
        match bits {
            16 => Self::Int16,
            24 => Self::Int24,
            32 => Self::Int32,
            _ => Self::Unsupported,
        }
    }
}

/// Negotiated stream format of the loopback endpoint.
///
/// Taken verbatim from the endpoint's mix format; nothing is resampled or
/// reformatted on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes per interleaved frame (all channels).
    pub block_align: u16,
    pub sample_format: SampleFormat,
}

impl StreamFormat {
    /// Interleaved 32-bit float, the usual shared-mode mix format.
    pub fn float32(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample: 32,
            block_align: channels * 4,
            sample_format: SampleFormat::Float32,
        }
    }

    pub fn frame_stride(&self) -> usize {
        self.block_align as usize
    }

    /// Container size of one channel sample.
    pub fn bytes_per_sample(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.block_align as usize / self.channels as usize
    }

    /// Whether frames in this format can be walked at all.
    pub fn is_usable(&self) -> bool {
        self.channels > 0 && self.block_align > 0 && self.block_align % self.channels == 0
    }

    /// Whether `decode` produces meaningful samples for this format.
    pub fn is_decodable(&self) -> bool {
        self.is_usable()
            && self.sample_format != SampleFormat::Unsupported
            && self.bytes_per_sample() >= self.sample_format.container_bytes()
    }
}
