//! WASAPI loopback backend for the default render endpoint.
//!
//! Captures the mix going to whatever endpoint the system is currently
//! playing to, using `AUDCLNT_STREAMFLAGS_LOOPBACK` in shared mode. No
//! special permissions are needed on Windows.
//!
//! ## Notes
//! - The endpoint mix format is used verbatim; nothing is resampled
//! - DRM-protected audio is silenced in loopback
//! - All handles must stay on the thread that called `start()`

use std::ffi::c_void;

use windows::core::GUID;
use windows::Win32::Foundation::{RPC_E_CHANGED_MODE, S_OK};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_spectrum_core::models::error::CaptureError;
use loopback_spectrum_core::models::format::{SampleFormat, StreamFormat};
use loopback_spectrum_core::session::loopback::CaptureSession;
use loopback_spectrum_core::traits::loopback_backend::{LoopbackBackend, NegotiatedFormat, Packet, PacketSource};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the WAVEFORMATEXTENSIBLE tail after the WAVEFORMATEX header.
const EXTENSIBLE_EXTRA_BYTES: u16 = 22;

const KSDATAFORMAT_SUBTYPE_PCM: GUID = GUID::from_u128(0x00000001_0000_0010_8000_00aa00389b71);
const KSDATAFORMAT_SUBTYPE_IEEE_FLOAT: GUID = GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Capture session bound to the WASAPI loopback backend.
pub type WasapiCaptureSession = CaptureSession<WasapiLoopback>;

/// WASAPI binding of the loopback handshake.
///
/// Stateless apart from the COM apartment model it initializes the
/// calling thread with.
pub struct WasapiLoopback {
    apartment: COINIT,
}

impl WasapiLoopback {
    /// Single-threaded apartment, suitable for a UI thread.
    pub fn new() -> Self {
        Self {
            apartment: COINIT_APARTMENTTHREADED,
        }
    }

    /// Multithreaded apartment, for hosts that drive capture from a worker.
    pub fn multithreaded() -> Self {
        Self {
            apartment: COINIT_MULTITHREADED,
        }
    }

    /// Session over the default render endpoint. Call `start()` to acquire it.
    pub fn default_session() -> WasapiCaptureSession {
        CaptureSession::new(Self::new())
    }
}

impl Default for WasapiLoopback {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WasapiEndpoint {
    device: IMMDevice,
}

pub struct WasapiClient {
    client: IAudioClient,
}

/// Mix format returned by `IAudioClient::GetMixFormat`, freed on drop.
pub struct MixFormat {
    ptr: *mut WAVEFORMATEX,
}

impl MixFormat {
    /// `SubFormat` of the extensible tail, if cbSize says it is present.
    fn sub_format(&self, extra_bytes: u16) -> Option<GUID> {
        if extra_bytes < EXTENSIBLE_EXTRA_BYTES {
            return None;
        }
        // SAFETY: cbSize says the extensible tail is present.
        let extensible = unsafe { (self.ptr as *const WAVEFORMATEXTENSIBLE).read_unaligned() };
        Some(extensible.SubFormat)
    }
}

/// Map a mix format's tag, container bits and extensible `SubFormat` to the
/// sample representation the core can decode.
fn classify_sample_format(tag: u16, bits: u16, sub_format: Option<GUID>) -> SampleFormat {
    match (tag, sub_format) {
        (WAVE_FORMAT_IEEE_FLOAT, _) if bits == 32 => SampleFormat::Float32,
        (WAVE_FORMAT_PCM, _) => SampleFormat::from_pcm_bits(bits),
        (WAVE_FORMAT_EXTENSIBLE, Some(sub)) if sub == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT && bits == 32 => {
            SampleFormat::Float32
        }
        (WAVE_FORMAT_EXTENSIBLE, Some(sub)) if sub == KSDATAFORMAT_SUBTYPE_PCM => SampleFormat::from_pcm_bits(bits),
        _ => SampleFormat::Unsupported,
    }
}

impl NegotiatedFormat for MixFormat {
    fn describe(&self) -> StreamFormat {
        // SAFETY: ptr is non-null and owned by self until drop.
        let header = unsafe { self.ptr.read_unaligned() };
        let tag = header.wFormatTag;
        let bits = header.wBitsPerSample;
        let extra_bytes = header.cbSize;

        StreamFormat {
            channels: header.nChannels,
            sample_rate: header.nSamplesPerSec,
            bits_per_sample: bits,
            block_align: header.nBlockAlign,
            sample_format: classify_sample_format(tag, bits, self.sub_format(extra_bytes)),
        }
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.ptr as *const c_void));
        }
    }
}

pub struct WasapiCapture {
    capture: IAudioCaptureClient,
    block_align: usize,
}

impl PacketSource for WasapiCapture {
    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        unsafe { self.capture.GetNextPacketSize() }
            .map_err(|e| CaptureError::PacketReadFailed(format!("GetNextPacketSize failed: {}", e)))
    }

    fn get_buffer(&mut self) -> Result<Packet<'_>, CaptureError> {
        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
        let mut num_frames: u32 = 0;
        let mut flags: u32 = 0;

        unsafe {
            self.capture
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| CaptureError::PacketReadFailed(format!("GetBuffer failed: {}", e)))?;
        }

        let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
        let data: &[u8] = if silent || buffer_ptr.is_null() || num_frames == 0 {
            &[]
        } else {
            // SAFETY: WASAPI guarantees num_frames * nBlockAlign readable bytes
            // until ReleaseBuffer, which needs &mut self and so ends this borrow.
            unsafe { std::slice::from_raw_parts(buffer_ptr, num_frames as usize * self.block_align) }
        };

        Ok(Packet {
            data,
            frames: num_frames,
            silent,
        })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        unsafe { self.capture.ReleaseBuffer(frames) }
            .map_err(|e| CaptureError::PacketReleaseFailed(format!("ReleaseBuffer failed: {}", e)))
    }
}

impl LoopbackBackend for WasapiLoopback {
    type Endpoint = WasapiEndpoint;
    type Client = WasapiClient;
    type Format = MixFormat;
    type Capture = WasapiCapture;

    fn initialize_runtime(&mut self) -> Result<bool, CaptureError> {
        let hr = unsafe { CoInitializeEx(None, self.apartment) };
        if hr == S_OK {
            return Ok(true);
        }
        if hr.is_ok() {
            // S_FALSE: already initialized on this thread. Balance the extra
            // reference now; the outer owner keeps COM alive.
            unsafe { CoUninitialize() };
            return Ok(false);
        }
        if hr == RPC_E_CHANGED_MODE {
            // Initialized with the other apartment model; still usable.
            return Ok(false);
        }
        Err(CaptureError::RuntimeInitFailed(format!(
            "CoInitializeEx failed: HRESULT 0x{:08X}",
            hr.0 as u32
        )))
    }

    fn release_runtime(&mut self) {
        unsafe { CoUninitialize() };
    }

    fn default_render_endpoint(&mut self) -> Result<WasapiEndpoint, CaptureError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|_| CaptureError::DeviceNotAvailable)?;

            // Default RENDER endpoint: loopback reads what is being played.
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| CaptureError::DeviceNotAvailable)?;

            Ok(WasapiEndpoint { device })
        }
    }

    fn activate_client(&mut self, endpoint: &WasapiEndpoint) -> Result<WasapiClient, CaptureError> {
        let client: IAudioClient = unsafe { endpoint.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| CaptureError::ActivationFailed(format!("Activate failed: {}", e)))?;
        Ok(WasapiClient { client })
    }

    fn mix_format(&mut self, client: &WasapiClient) -> Result<MixFormat, CaptureError> {
        let ptr = unsafe { client.client.GetMixFormat() }
            .map_err(|e| CaptureError::FormatUnavailable(format!("GetMixFormat failed: {}", e)))?;
        if ptr.is_null() {
            return Err(CaptureError::FormatUnavailable("GetMixFormat returned null".into()));
        }
        Ok(MixFormat { ptr })
    }

    fn initialize_loopback(&mut self, client: &mut WasapiClient, format: &MixFormat) -> Result<(), CaptureError> {
        // Zero buffer duration and periodicity: let the engine pick its default.
        unsafe {
            client
                .client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, AUDCLNT_STREAMFLAGS_LOOPBACK, 0, 0, format.ptr, None)
        }
        .map_err(|e| CaptureError::InitializeFailed(format!("IAudioClient::Initialize (loopback) failed: {}", e)))
    }

    fn capture_service(&mut self, client: &WasapiClient, format: &MixFormat) -> Result<WasapiCapture, CaptureError> {
        let capture: IAudioCaptureClient = unsafe { client.client.GetService() }
            .map_err(|e| CaptureError::ServiceUnavailable(format!("GetService failed: {}", e)))?;
        Ok(WasapiCapture {
            capture,
            block_align: format.describe().frame_stride(),
        })
    }

    fn start_stream(&mut self, client: &mut WasapiClient) -> Result<(), CaptureError> {
        unsafe { client.client.Start() }
            .map_err(|e| CaptureError::StreamStartFailed(format!("IAudioClient::Start failed: {}", e)))
    }

    fn stop_stream(&mut self, client: &mut WasapiClient) {
        if let Err(e) = unsafe { client.client.Stop() } {
            log::debug!("IAudioClient::Stop failed: {}", e);
        }
    }
}
