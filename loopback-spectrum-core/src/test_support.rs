//! In-memory loopback backend that records acquisition and release order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;
use crate::traits::loopback_backend::{LoopbackBackend, NegotiatedFormat, Packet, PacketSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Runtime,
    Endpoint,
    Activate,
    MixFormat,
    Initialize,
    Service,
    Start,
}

#[derive(Debug, Default)]
pub struct Ledger {
    pub events: Vec<String>,
    pub live_handles: i32,
    pub runtime_depth: i32,
    /// Clients started and not yet stopped.
    pub running_streams: i32,
    pub released_frames: Vec<u32>,
    outstanding: Option<u32>,
    pub release_mismatch: bool,
}

impl Ledger {
    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

pub enum FakePacket {
    Data { frames: u32, bytes: Vec<u8> },
    Silent { frames: u32 },
    ReadError,
    /// Delivered normally, but handing it back fails.
    ReleaseError { frames: u32, bytes: Vec<u8> },
    /// The size query itself fails; consumed by that query.
    SizeError,
}

impl FakePacket {
    /// Interleaved f32 samples, `samples.len() / channels` frames.
    pub fn float(channels: usize, samples: &[f32]) -> Self {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::Data {
            frames: (samples.len() / channels) as u32,
            bytes,
        }
    }

    /// `frames` frames of `stride` bytes, every byte set to `fill`.
    pub fn filled(frames: u32, stride: usize, fill: u8) -> Self {
        Self::Data {
            frames,
            bytes: vec![fill; frames as usize * stride],
        }
    }
}

pub type SharedLedger = Rc<RefCell<Ledger>>;
pub type PacketQueue = Rc<RefCell<VecDeque<FakePacket>>>;

pub struct FakeBackend {
    pub ledger: SharedLedger,
    pub packets: PacketQueue,
    pub format: StreamFormat,
    pub fail_at: Option<Step>,
    pub owns_runtime: bool,
}

impl FakeBackend {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            ledger: SharedLedger::default(),
            packets: PacketQueue::default(),
            format,
            fail_at: None,
            owns_runtime: true,
        }
    }

    pub fn stereo() -> Self {
        Self::new(StreamFormat::float32(2, 48000))
    }

    pub fn failing_at(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    fn check(&self, step: Step) -> Result<(), CaptureError> {
        if self.fail_at != Some(step) {
            return Ok(());
        }
        let reason = "injected".to_string();
        Err(match step {
            Step::Runtime => CaptureError::RuntimeInitFailed(reason),
            Step::Endpoint => CaptureError::DeviceNotAvailable,
            Step::Activate => CaptureError::ActivationFailed(reason),
            Step::MixFormat => CaptureError::FormatUnavailable(reason),
            Step::Initialize => CaptureError::InitializeFailed(reason),
            Step::Service => CaptureError::ServiceUnavailable(reason),
            Step::Start => CaptureError::StreamStartFailed(reason),
        })
    }

    fn event(&self, event: &str) {
        self.ledger.borrow_mut().events.push(event.to_string());
    }
}

pub struct FakeHandle {
    name: &'static str,
    ledger: SharedLedger,
}

impl FakeHandle {
    fn acquire(name: &'static str, ledger: &SharedLedger) -> Self {
        let mut l = ledger.borrow_mut();
        l.live_handles += 1;
        l.events.push(format!("acquire {}", name));
        Self {
            name,
            ledger: Rc::clone(ledger),
        }
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        let mut l = self.ledger.borrow_mut();
        l.live_handles -= 1;
        l.events.push(format!("release {}", self.name));
    }
}

pub struct FakeClient {
    _handle: FakeHandle,
    pub running: bool,
}

pub struct FakeFormat {
    format: StreamFormat,
    _handle: FakeHandle,
}

impl NegotiatedFormat for FakeFormat {
    fn describe(&self) -> StreamFormat {
        self.format
    }
}

pub struct FakeCapture {
    _handle: FakeHandle,
    ledger: SharedLedger,
    packets: PacketQueue,
    current: Vec<u8>,
    fail_release: bool,
}

impl PacketSource for FakeCapture {
    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        let mut packets = self.packets.borrow_mut();
        if matches!(packets.front(), Some(FakePacket::SizeError)) {
            packets.pop_front();
            return Err(CaptureError::PacketReadFailed("injected".into()));
        }
        Ok(match packets.front() {
            Some(FakePacket::Data { frames, .. })
            | Some(FakePacket::Silent { frames })
            | Some(FakePacket::ReleaseError { frames, .. }) => *frames,
            Some(FakePacket::ReadError) => 1,
            Some(FakePacket::SizeError) | None => 0,
        })
    }

    fn get_buffer(&mut self) -> Result<Packet<'_>, CaptureError> {
        if self.ledger.borrow().outstanding.is_some() {
            self.ledger.borrow_mut().release_mismatch = true;
        }
        let next = self.packets.borrow_mut().pop_front();
        self.fail_release = matches!(next, Some(FakePacket::ReleaseError { .. }));
        match next {
            Some(FakePacket::Data { frames, bytes }) | Some(FakePacket::ReleaseError { frames, bytes }) => {
                self.ledger.borrow_mut().outstanding = Some(frames);
                self.current = bytes;
                Ok(Packet {
                    data: &self.current,
                    frames,
                    silent: false,
                })
            }
            Some(FakePacket::Silent { frames }) => {
                self.ledger.borrow_mut().outstanding = Some(frames);
                Ok(Packet {
                    data: &[],
                    frames,
                    silent: true,
                })
            }
            Some(FakePacket::ReadError) => Err(CaptureError::PacketReadFailed("injected".into())),
            Some(FakePacket::SizeError) | None => Err(CaptureError::PacketReadFailed("ring empty".into())),
        }
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        let mut l = self.ledger.borrow_mut();
        if l.outstanding.take() != Some(frames) {
            l.release_mismatch = true;
        }
        l.released_frames.push(frames);
        if std::mem::take(&mut self.fail_release) {
            return Err(CaptureError::PacketReleaseFailed("injected".into()));
        }
        Ok(())
    }
}

impl LoopbackBackend for FakeBackend {
    type Endpoint = FakeHandle;
    type Client = FakeClient;
    type Format = FakeFormat;
    type Capture = FakeCapture;

    fn initialize_runtime(&mut self) -> Result<bool, CaptureError> {
        self.check(Step::Runtime)?;
        if self.owns_runtime {
            self.ledger.borrow_mut().runtime_depth += 1;
        }
        self.event("init runtime");
        Ok(self.owns_runtime)
    }

    fn release_runtime(&mut self) {
        self.ledger.borrow_mut().runtime_depth -= 1;
        self.event("release runtime");
    }

    fn default_render_endpoint(&mut self) -> Result<FakeHandle, CaptureError> {
        self.check(Step::Endpoint)?;
        Ok(FakeHandle::acquire("endpoint", &self.ledger))
    }

    fn activate_client(&mut self, _endpoint: &FakeHandle) -> Result<FakeClient, CaptureError> {
        self.check(Step::Activate)?;
        Ok(FakeClient {
            _handle: FakeHandle::acquire("client", &self.ledger),
            running: false,
        })
    }

    fn mix_format(&mut self, _client: &FakeClient) -> Result<FakeFormat, CaptureError> {
        self.check(Step::MixFormat)?;
        Ok(FakeFormat {
            format: self.format,
            _handle: FakeHandle::acquire("format", &self.ledger),
        })
    }

    fn initialize_loopback(&mut self, _client: &mut FakeClient, _format: &FakeFormat) -> Result<(), CaptureError> {
        self.check(Step::Initialize)?;
        self.event("initialize loopback");
        Ok(())
    }

    fn capture_service(&mut self, _client: &FakeClient, _format: &FakeFormat) -> Result<FakeCapture, CaptureError> {
        self.check(Step::Service)?;
        Ok(FakeCapture {
            _handle: FakeHandle::acquire("capture", &self.ledger),
            ledger: Rc::clone(&self.ledger),
            packets: Rc::clone(&self.packets),
            current: Vec::new(),
            fail_release: false,
        })
    }

    fn start_stream(&mut self, client: &mut FakeClient) -> Result<(), CaptureError> {
        self.check(Step::Start)?;
        client.running = true;
        self.ledger.borrow_mut().running_streams += 1;
        self.event("start stream");
        Ok(())
    }

    fn stop_stream(&mut self, client: &mut FakeClient) {
        if std::mem::take(&mut client.running) {
            self.ledger.borrow_mut().running_streams -= 1;
        }
        self.event("stop stream");
    }
}
