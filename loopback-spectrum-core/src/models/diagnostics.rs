/// Counters for debugging a capture session. Reset on every `start()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    /// Calls to `latest_frame` that found a started session.
    pub drain_cycles: u64,
    /// Packets successfully obtained from the device.
    pub packets_drained: u64,
    /// Release calls issued back to the device, successful or not.
    pub packets_released: u64,
    /// Packets copied into the frame buffer as the cycle's best so far.
    pub packets_copied: u64,
    /// Qualifying packets dropped because the buffer could not hold them.
    pub packets_skipped: u64,
    /// Frames in drained packets that did not end up as a cycle's result.
    pub frames_discarded: u64,
    pub read_failures: u64,
    pub release_failures: u64,
    /// Largest packet seen since start, in frames.
    pub peak_frames: u32,
}
