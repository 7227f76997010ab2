use crate::models::config::CaptureConfiguration;
use crate::models::diagnostics::CaptureDiagnostics;
use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::models::state::CaptureState;
use crate::traits::frame_source::{CapturedFrame, FrameSource};
use crate::traits::loopback_backend::{LoopbackBackend, NegotiatedFormat, Packet, PacketSource};

/// Device handles in acquisition order.
struct DeviceChain<B: LoopbackBackend> {
    format: Option<B::Format>,
    endpoint: Option<B::Endpoint>,
    client: Option<B::Client>,
    capture: Option<B::Capture>,
}

impl<B: LoopbackBackend> DeviceChain<B> {
    fn empty() -> Self {
        Self {
            format: None,
            endpoint: None,
            client: None,
            capture: None,
        }
    }
}

/// Loopback capture session over the default render endpoint.
///
/// Polled once per presentation tick from a single thread. Each poll drains
/// every pending packet from the device and keeps only the largest one:
/// ```text
/// [device ring] ─drain─→ largest packet ─copy─→ [frame buffer] ─borrow─→ caller
///        ↑                                                                   │
///        └─────────────── every packet released back ────────────────────────┘
/// ```
///
/// The frame buffer only grows within a session. It is freed by `stop()`.
pub struct CaptureSession<B: LoopbackBackend> {
    backend: B,
    config: CaptureConfiguration,
    chain: DeviceChain<B>,
    stream_format: Option<StreamFormat>,
    frame_buffer: Vec<u8>,
    owns_runtime: bool,
    state: CaptureState,
    diagnostics: CaptureDiagnostics,
}

impl<B: LoopbackBackend> CaptureSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: CaptureConfiguration::default(),
            chain: DeviceChain::empty(),
            stream_format: None,
            frame_buffer: Vec::new(),
            owns_runtime: false,
            state: CaptureState::Idle,
            diagnostics: CaptureDiagnostics::default(),
        }
    }

    pub fn with_config(backend: B, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        let mut session = Self::new(backend);
        session.config = config;
        Ok(session)
    }

    /// Acquire the loopback device and start the stream.
    ///
    /// Always releases everything first, so repeated starts never leak
    /// handles. On failure the session is left fully released and the
    /// state records the error.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.release();
        self.diagnostics = CaptureDiagnostics::default();

        match self.acquire() {
            Ok(format) => {
                log::debug!(
                    "Loopback capture started: {} channels, {} Hz, {} bits, {:?}",
                    format.channels,
                    format.sample_rate,
                    format.bits_per_sample,
                    format.sample_format
                );
                self.state = CaptureState::Capturing;
                Ok(())
            }
            Err(e) => {
                log::debug!("Loopback capture start failed: {}", e);
                self.release();
                self.state = CaptureState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Stop the stream and release every handle. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.release();
    }

    /// Release in fixed order: format, endpoint, client (stream stopped
    /// first), capture service, frame buffer, then the runtime if owned.
    pub fn release(&mut self) {
        self.stream_format = None;
        drop(self.chain.format.take());
        drop(self.chain.endpoint.take());
        if let Some(mut client) = self.chain.client.take() {
            self.backend.stop_stream(&mut client);
            drop(client);
        }
        drop(self.chain.capture.take());
        self.frame_buffer = Vec::new();
        if std::mem::take(&mut self.owns_runtime) {
            self.backend.release_runtime();
        }
        self.state = CaptureState::Idle;
    }

    fn acquire(&mut self) -> Result<StreamFormat, CaptureError> {
        self.owns_runtime = self.backend.initialize_runtime()?;

        let endpoint = self.chain.endpoint.insert(self.backend.default_render_endpoint()?);
        let client = self.chain.client.insert(self.backend.activate_client(endpoint)?);
        let format = self.chain.format.insert(self.backend.mix_format(client)?);

        let stream_format = format.describe();
        if !stream_format.is_usable() {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} channels with {}-byte frames",
                stream_format.channels, stream_format.block_align
            )));
        }

        self.backend.initialize_loopback(client, format)?;
        self.chain.capture = Some(self.backend.capture_service(client, format)?);
        self.backend.start_stream(client)?;

        self.stream_format = Some(stream_format);
        Ok(stream_format)
    }

    /// Drain the device and return the largest packet of this cycle.
    ///
    /// Every drained packet is released back to the device whether or not
    /// it was kept. Returns `None` when nothing qualified this cycle, never
    /// a previous cycle's data.
    pub fn latest_frame(&mut self) -> Option<CapturedFrame<'_>> {
        let format = self.stream_format?;
        let capture = self.chain.capture.as_mut()?;
        let buffer = &mut self.frame_buffer;
        let diagnostics = &mut self.diagnostics;
        let stride = format.frame_stride();
        let limit = self.config.max_frame_buffer_bytes;
        let max_failures = self.config.max_consecutive_read_failures;

        diagnostics.drain_cycles += 1;

        let mut best_frames = 0u32;
        let mut best_bytes = 0usize;
        let mut drained_frames = 0u64;
        let mut consecutive_failures = 0u32;

        let mut pending = pending_frames(capture, diagnostics);
        while pending > 0 {
            let frames = match capture.get_buffer() {
                Ok(packet) => {
                    consecutive_failures = 0;
                    diagnostics.packets_drained += 1;
                    diagnostics.peak_frames = diagnostics.peak_frames.max(packet.frames);
                    drained_frames += u64::from(packet.frames);

                    if packet.frames > best_frames {
                        match store_packet(buffer, &packet, stride, limit) {
                            Ok(bytes) => {
                                best_frames = packet.frames;
                                best_bytes = bytes;
                                diagnostics.packets_copied += 1;
                            }
                            Err(e) => {
                                diagnostics.packets_skipped += 1;
                                log::warn!("Skipping loopback packet of {} frames: {}", packet.frames, e);
                            }
                        }
                    }
                    packet.frames
                }
                Err(e) => {
                    diagnostics.read_failures += 1;
                    consecutive_failures += 1;
                    log::warn!("Loopback GetBuffer failed: {}", e);
                    if consecutive_failures >= max_failures {
                        break;
                    }
                    pending = pending_frames(capture, diagnostics);
                    continue;
                }
            };

            diagnostics.packets_released += 1;
            if let Err(e) = capture.release_buffer(frames) {
                diagnostics.release_failures += 1;
                log::warn!("Loopback ReleaseBuffer failed: {}", e);
            }

            pending = pending_frames(capture, diagnostics);
        }

        diagnostics.frames_discarded += drained_frames - u64::from(best_frames);

        if best_frames == 0 {
            return None;
        }

        Some(CapturedFrame {
            data: &buffer[..best_bytes],
            frames: best_frames,
            format,
        })
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_started(&self) -> bool {
        self.state.is_capturing()
    }

    /// The negotiated format, present only while started.
    pub fn format(&self) -> Option<StreamFormat> {
        self.stream_format
    }

    /// Channel count of the negotiated format, or 0 when not started.
    ///
    /// Zero means "no data", not mono.
    pub fn channel_count(&self) -> u16 {
        self.stream_format.map_or(0, |f| f.channels)
    }

    pub fn frame_buffer_capacity(&self) -> usize {
        self.frame_buffer.capacity()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }
}

impl<B: LoopbackBackend> FrameSource for CaptureSession<B> {
    fn latest_frame(&mut self) -> Option<CapturedFrame<'_>> {
        CaptureSession::latest_frame(self)
    }

    fn channel_count(&self) -> u16 {
        CaptureSession::channel_count(self)
    }
}

impl<B: LoopbackBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.release();
    }
}

fn pending_frames<C: PacketSource>(capture: &mut C, diagnostics: &mut CaptureDiagnostics) -> u32 {
    match capture.next_packet_size() {
        Ok(frames) => frames,
        Err(e) => {
            diagnostics.read_failures += 1;
            log::warn!("Loopback GetNextPacketSize failed: {}", e);
            0
        }
    }
}

/// Copy `packet` into `buffer`, growing it if needed. Returns the logical
/// length in bytes. On error `buffer` is left untouched.
fn store_packet(buffer: &mut Vec<u8>, packet: &Packet<'_>, stride: usize, limit: usize) -> Result<usize, CaptureError> {
    let requested = (packet.frames as usize).saturating_mul(stride);
    if requested > limit {
        return Err(CaptureError::BufferGrowthFailed { requested });
    }
    if !packet.silent && packet.data.len() < requested {
        return Err(CaptureError::PacketReadFailed(format!(
            "packet holds {} bytes, expected {}",
            packet.data.len(),
            requested
        )));
    }
    if requested > buffer.capacity() {
        buffer
            .try_reserve_exact(requested - buffer.len())
            .map_err(|_| CaptureError::BufferGrowthFailed { requested })?;
    }

    buffer.clear();
    if packet.silent {
        buffer.resize(requested, 0);
    } else {
        buffer.extend_from_slice(&packet.data[..requested]);
    }
    Ok(requested)
}
