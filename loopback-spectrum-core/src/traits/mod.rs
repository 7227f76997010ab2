pub mod frame_source;
pub mod loopback_backend;
