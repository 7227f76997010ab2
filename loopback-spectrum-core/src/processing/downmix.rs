use crate::traits::frame_source::CapturedFrame;

/// Downmix interleaved frames into `out` by summing channels per frame.
///
/// Each decoded channel sample is multiplied by `gain` as it is summed, so
/// a stereo frame `(a, b)` becomes `a * gain + b * gain`. Channels are summed,
/// not averaged. Writes at most `out.len()` samples and leaves the rest of
/// `out` untouched; returns the number written. Formats that cannot be
/// decoded write nothing.
pub fn downmix_summed_into(frame: &CapturedFrame<'_>, gain: f32, out: &mut [f32]) -> usize {
    let format = frame.format;
    if !format.is_decodable() {
        return 0;
    }

    let stride = format.frame_stride();
    let sample_bytes = format.bytes_per_sample();
    let sample_format = format.sample_format;
    let count = (frame.frames as usize).min(out.len()).min(frame.data.len() / stride);

    for (slot, bytes) in out.iter_mut().zip(frame.data.chunks_exact(stride)).take(count) {
        let mut sum = 0.0f32;
        for sample in bytes.chunks_exact(sample_bytes) {
            sum += sample_format.decode(sample) * gain;
        }
        *slot = sum;
    }
    count
}
