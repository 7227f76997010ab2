use crate::models::error::CaptureError;
use crate::models::format::StreamFormat;

/// One packet handed out by the device's capture ring.
///
/// Borrows the backend's storage until the caller is done with it; the
/// caller must then hand the frame count back through
/// [`PacketSource::release_buffer`].
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Interleaved frame bytes. Empty when `silent` is set.
    pub data: &'a [u8],
    pub frames: u32,
    /// The device marked this packet as silence; `data` must not be read.
    pub silent: bool,
}

/// Backend-native mix format descriptor.
///
/// Dropping it releases whatever the backend allocated for it.
pub trait NegotiatedFormat {
    fn describe(&self) -> StreamFormat;
}

impl NegotiatedFormat for StreamFormat {
    fn describe(&self) -> StreamFormat {
        *self
    }
}

/// Capture service of an initialized loopback client.
pub trait PacketSource {
    /// Frames in the next pending packet, or 0 when the ring is empty.
    fn next_packet_size(&mut self) -> Result<u32, CaptureError>;

    /// Borrow the next pending packet.
    fn get_buffer(&mut self) -> Result<Packet<'_>, CaptureError>;

    /// Hand a packet obtained from `get_buffer` back to the device.
    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError>;
}

/// Platform binding for default-render-endpoint loopback capture.
///
/// Each method is one step of the acquisition handshake and is called by
/// `CaptureSession` in declaration order. Handles are released by dropping
/// them; the session controls the drop order.
pub trait LoopbackBackend {
    type Endpoint;
    type Client;
    type Format: NegotiatedFormat;
    type Capture: PacketSource;

    /// Initialize the platform threading runtime for the calling thread.
    ///
    /// Returns `true` if this call owns the initialization and
    /// `release_runtime` must undo it.
    fn initialize_runtime(&mut self) -> Result<bool, CaptureError>;

    /// Undo an owned `initialize_runtime`.
    fn release_runtime(&mut self);

    /// Resolve the endpoint the system is currently rendering to.
    fn default_render_endpoint(&mut self) -> Result<Self::Endpoint, CaptureError>;

    fn activate_client(&mut self, endpoint: &Self::Endpoint) -> Result<Self::Client, CaptureError>;

    /// Query the endpoint's current mix format.
    fn mix_format(&mut self, client: &Self::Client) -> Result<Self::Format, CaptureError>;

    /// Initialize the client for shared-mode loopback with `format` and the
    /// backend's default buffer duration.
    fn initialize_loopback(&mut self, client: &mut Self::Client, format: &Self::Format) -> Result<(), CaptureError>;

    fn capture_service(&mut self, client: &Self::Client, format: &Self::Format) -> Result<Self::Capture, CaptureError>;

    fn start_stream(&mut self, client: &mut Self::Client) -> Result<(), CaptureError>;

    /// Stop the stream. Failures are ignored; the client is released next.
    fn stop_stream(&mut self, client: &mut Self::Client);
}
