use crate::models::format::StreamFormat;

/// The newest captured frame block, borrowed from the capture session.
///
/// Valid only until the next call into the session, which may overwrite or
/// reallocate the underlying buffer.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    /// `frames * format.frame_stride()` bytes of interleaved samples.
    pub data: &'a [u8],
    pub frames: u32,
    pub format: StreamFormat,
}

impl CapturedFrame<'_> {
    pub fn channels(&self) -> u16 {
        self.format.channels
    }
}

/// Anything that can hand the analysis stage its latest frame block.
pub trait FrameSource {
    /// Drain pending audio and return the newest block, or `None` if
    /// nothing arrived since the last call.
    fn latest_frame(&mut self) -> Option<CapturedFrame<'_>>;

    /// Channel count of the active format, or 0 when nothing is active.
    fn channel_count(&self) -> u16;
}
