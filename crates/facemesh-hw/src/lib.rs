//! facemesh-hw — Webcam capture for the tracking loop.
//!
//! Provides V4L2-based camera access and conversion of captured buffers to
//! packed RGB frames.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
pub use source::FrameSource;
