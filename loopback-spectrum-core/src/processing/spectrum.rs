use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::models::config::AnalysisConfiguration;
use crate::models::error::CaptureError;
use crate::processing::downmix::downmix_summed_into;
use crate::processing::gain::gain_db_to_linear;
use crate::traits::frame_source::{CapturedFrame, FrameSource};

/// Fixed-length time/frequency working set refreshed once per tick.
///
/// Both buffers and the FFT scratch space are allocated at construction and
/// reused in place; `update` does not allocate.
///
/// ```text
/// [FrameSource] → downmix (sum × gain) → time_domain ─FFT─→ frequency_domain
/// ```
pub struct SpectralFrame {
    fft: Arc<dyn Fft<f32>>,
    time_domain: Vec<f32>,
    frequency_domain: Vec<Complex32>,
    scratch: Vec<Complex32>,
    frame_count: usize,
    warned_undecodable: bool,
}

impl SpectralFrame {
    /// Spectral frame with the default 1024-sample transform.
    pub fn new() -> Self {
        Self::build(AnalysisConfiguration::default().transform_length)
    }

    pub fn with_config(config: &AnalysisConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self::build(config.transform_length))
    }

    fn build(transform_length: usize) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(transform_length);
        let scratch = vec![Complex32::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            time_domain: vec![0.0; transform_length],
            frequency_domain: vec![Complex32::default(); transform_length],
            scratch,
            frame_count: 0,
            warned_undecodable: false,
        }
    }

    /// Pull the newest frame from `source` and recompute both domains.
    ///
    /// Returns `false` when the source has nothing new; the previous
    /// buffers are then left exactly as they were.
    pub fn update<S: FrameSource + ?Sized>(&mut self, source: &mut S, gain_db: f32) -> bool {
        let Some(frame) = source.latest_frame() else {
            return false;
        };
        self.process(&frame, gain_db)
    }

    /// Downmix, gain-scale and transform one captured frame block.
    ///
    /// Frames beyond the transform length are ignored. When fewer frames
    /// arrive, the tail of the time domain is silence.
    pub fn process(&mut self, frame: &CapturedFrame<'_>, gain_db: f32) -> bool {
        if frame.frames == 0 {
            return false;
        }
        if !frame.format.is_decodable() {
            if !self.warned_undecodable {
                log::warn!("Cannot decode loopback format {:?}; spectrum disabled", frame.format);
                self.warned_undecodable = true;
            }
            return false;
        }

        let linear = gain_db_to_linear(gain_db);

        self.time_domain.fill(0.0);
        let written = downmix_summed_into(frame, linear, &mut self.time_domain);

        for (bin, &sample) in self.frequency_domain.iter_mut().zip(&self.time_domain) {
            *bin = Complex32::new(sample, 0.0);
        }
        self.fft.process_with_scratch(&mut self.frequency_domain, &mut self.scratch);

        self.frame_count = written;
        true
    }

    /// The time-domain buffer of the last successful update, or `None` if
    /// no update has succeeded yet.
    pub fn get(&self) -> Option<&[f32]> {
        if self.frame_count == 0 {
            return None;
        }
        Some(&self.time_domain)
    }

    /// Valid leading samples from the last successful update.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn transform_length(&self) -> usize {
        self.time_domain.len()
    }

    pub fn time_domain(&self) -> &[f32] {
        &self.time_domain
    }

    pub fn frequency_domain(&self) -> &[Complex32] {
        &self.frequency_domain
    }

    /// `sqrt(re² + im²)` of one bin; 0 for bins past the transform length.
    pub fn magnitude(&self, bin: usize) -> f32 {
        self.frequency_domain.get(bin).map_or(0.0, |c| magnitude(*c))
    }

    pub fn magnitudes(&self) -> impl Iterator<Item = f32> + '_ {
        self.frequency_domain.iter().map(|c| magnitude(*c))
    }

    /// Largest magnitude among the first `bins` bins.
    pub fn peak_magnitude(&self, bins: usize) -> f32 {
        self.magnitudes().take(bins).fold(0.0f32, f32::max)
    }
}

impl Default for SpectralFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn magnitude(c: Complex32) -> f32 {
    (c.re * c.re + c.im * c.im).sqrt()
}
