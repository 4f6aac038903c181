mod operator;
mod webcam;

pub use operator::{OperatorInput, OperatorSignal, TerminalInput};
pub use webcam::{WebcamCapture, WebcamDevice};

use crate::error::Result;
use crate::features::Frame;

/// An open camera stream
pub trait CaptureSource {
    /// Block until the next frame is available
    fn capture_frame(&mut self) -> Result<Frame>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// A camera that can be opened for one capture session at a time
///
/// Dropping the returned stream releases the device, including on error paths.
pub trait CameraDevice {
    type Stream: CaptureSource;

    fn open(&mut self) -> Result<Self::Stream>;
}
