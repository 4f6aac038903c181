use super::{CameraDevice, CaptureSource};
use crate::config::CameraConfig;
use crate::error::{PipelineError, Result};
use crate::features::Frame;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Webcam identified by index; opened afresh for every capture session.
pub struct WebcamDevice {
    config: CameraConfig,
}

impl WebcamDevice {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl CameraDevice for WebcamDevice {
    type Stream = WebcamCapture;

    fn open(&mut self) -> Result<WebcamCapture> {
        WebcamCapture::new(&self.config)
    }
}

/// Mode asked of the driver: the configured size and rate, MJPEG encoded.
fn requested_camera_format(config: &CameraConfig) -> CameraFormat {
    CameraFormat::new_from(config.width, config.height, FrameFormat::MJPEG, config.fps)
}

/// Streaming webcam; the stream is stopped when this is dropped.
pub struct WebcamCapture {
    camera: Camera,
    device_index: u32,
}

impl WebcamCapture {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let device_index = config.index;
        tracing::info!(
            "Opening webcam {} at {}x{} @ {} fps",
            device_index,
            config.width,
            config.height,
            config.fps
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            requested_camera_format(config),
        ));

        let mut camera = Camera::new(index, requested).map_err(|e| {
            PipelineError::Device(format!("failed to open camera {device_index}: {e}"))
        })?;

        camera.open_stream().map_err(|e| {
            PipelineError::Device(format!("failed to start camera {device_index}: {e}"))
        })?;

        let actual = camera.resolution();
        if (actual.width(), actual.height()) != (config.width, config.height) {
            tracing::warn!(
                "Webcam {} negotiated {}x{} instead of {}x{}",
                device_index,
                actual.width(),
                actual.height(),
                config.width,
                config.height
            );
        }
        tracing::info!("Webcam {} streaming", device_index);

        Ok(Self {
            camera,
            device_index,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<Frame> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| PipelineError::Device(format!("failed to capture frame: {e}")))?;

        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| PipelineError::Device(format!("failed to decode frame: {e}")))
    }

    /// Resolution the driver actually negotiated.
    fn resolution(&self) -> (u32, u32) {
        let resolution = self.camera.resolution();
        (resolution.width(), resolution.height())
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        match self.camera.stop_stream() {
            Ok(()) => tracing::info!("Webcam {} released", self.device_index),
            Err(e) => tracing::warn!("Webcam {} release failed: {}", self.device_index, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_format_carries_configured_mode() {
        let config = CameraConfig {
            index: 2,
            width: 1280,
            height: 720,
            fps: 15,
        };
        let format = requested_camera_format(&config);
        assert_eq!(format.width(), 1280);
        assert_eq!(format.height(), 720);
        assert_eq!(format.frame_rate(), 15);
        assert_eq!(format.format(), FrameFormat::MJPEG);
    }

    #[test]
    fn default_config_requests_vga() {
        let format = requested_camera_format(&CameraConfig::default());
        assert_eq!((format.width(), format.height()), (640, 480));
        assert_eq!(format.frame_rate(), 30);
    }
}
