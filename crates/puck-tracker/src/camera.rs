use crate::config::CaptureMode;
use puck_detection::RgbImage;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("could not open camera: {0}")]
    Open(String),

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("camera is not open")]
    Closed,
}

/// A frame source the tracker loop owns.
///
/// `open` is called on every state entry that needs frames; the mode is not
/// renegotiated until the next entry.
pub trait CameraSource {
    fn open(&mut self, mode: &CaptureMode) -> Result<(), CameraError>;

    /// Blocks until the next frame is available.
    fn read(&mut self) -> Result<RgbImage, CameraError>;

    fn release(&mut self);
}

#[cfg(feature = "camera")]
pub use self::native::NokhwaCamera;

#[cfg(feature = "camera")]
mod native {
    use super::{CameraError, CameraSource};
    use crate::config::CaptureMode;
    use ndarray::Array2;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use nokhwa::Camera;
    use puck_detection::RgbImage;

    pub struct NokhwaCamera {
        device_id: u32,
        camera: Option<Camera>,
    }

    impl NokhwaCamera {
        pub fn new(device_id: u32) -> Self {
            Self {
                device_id,
                camera: None,
            }
        }
    }

    impl CameraSource for NokhwaCamera {
        fn open(&mut self, mode: &CaptureMode) -> Result<(), CameraError> {
            self.release();

            let index = CameraIndex::Index(self.device_id);
            let format = CameraFormat::new(
                Resolution::new(mode.width, mode.height),
                FrameFormat::MJPEG,
                mode.fps,
            );
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

            let mut camera =
                Camera::new(index, requested).map_err(|e| CameraError::Open(e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| CameraError::Open(e.to_string()))?;
            tracing::info!(
                device = self.device_id,
                format = ?camera.camera_format(),
                "camera opened"
            );
            self.camera = Some(camera);
            Ok(())
        }

        fn read(&mut self) -> Result<RgbImage, CameraError> {
            let camera = self.camera.as_mut().ok_or(CameraError::Closed)?;
            let frame = camera.frame().map_err(|e| CameraError::Read(e.to_string()))?;
            let decoded = frame
                .decode_image::<RgbFormat>()
                .map_err(|e| CameraError::Read(e.to_string()))?;

            let width = decoded.width() as usize;
            let height = decoded.height() as usize;
            let pixels = decoded
                .as_raw()
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect();
            Array2::from_shape_vec((height, width), pixels)
                .map_err(|e| CameraError::Read(e.to_string()))
        }

        fn release(&mut self) {
            if let Some(mut camera) = self.camera.take() {
                if let Err(e) = camera.stop_stream() {
                    tracing::warn!("stopping camera stream: {}", e);
                }
            }
        }
    }
}

/// Replays a scripted sequence of frames and failures.
///
/// Once the script runs out the last successful frame repeats.
#[derive(Debug, Default)]
pub struct MockCamera {
    script: VecDeque<Result<RgbImage, CameraError>>,
    last: Option<RgbImage>,
    open_failures: usize,
    opened: Vec<CaptureMode>,
    reads: usize,
    is_open: bool,
    released: bool,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera that always returns `frame`.
    pub fn repeating(frame: RgbImage) -> Self {
        let mut camera = Self::new();
        camera.last = Some(frame);
        camera
    }

    pub fn push_frame(&mut self, frame: RgbImage) -> &mut Self {
        self.script.push_back(Ok(frame));
        self
    }

    pub fn push_failure(&mut self) -> &mut Self {
        self.script
            .push_back(Err(CameraError::Read("scripted failure".into())));
        self
    }

    /// The next `count` calls to `open` fail.
    pub fn fail_opens(&mut self, count: usize) -> &mut Self {
        self.open_failures = count;
        self
    }

    /// Capture modes requested so far, in order.
    pub fn opened(&self) -> &[CaptureMode] {
        &self.opened
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn released(&self) -> bool {
        self.released
    }
}

impl CameraSource for MockCamera {
    fn open(&mut self, mode: &CaptureMode) -> Result<(), CameraError> {
        if self.open_failures > 0 {
            self.open_failures -= 1;
            return Err(CameraError::Open("scripted failure".into()));
        }
        self.opened.push(*mode);
        self.is_open = true;
        self.released = false;
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage, CameraError> {
        if !self.is_open {
            return Err(CameraError::Closed);
        }
        self.reads += 1;
        match self.script.pop_front() {
            Some(Ok(frame)) => {
                self.last = Some(frame.clone());
                Ok(frame)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .clone()
                .ok_or_else(|| CameraError::Read("no frames scripted".into())),
        }
    }

    fn release(&mut self) {
        self.is_open = false;
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn mock_replays_script_then_repeats() {
        let a = Array2::from_elem((2, 2), [1, 2, 3]);
        let b = Array2::from_elem((2, 2), [9, 9, 9]);
        let mut cam = MockCamera::new();
        cam.push_frame(a.clone()).push_failure().push_frame(b.clone());

        assert!(matches!(cam.read(), Err(CameraError::Closed)));
        cam.open(&CaptureMode::TRACKING).unwrap();
        assert_eq!(cam.read().unwrap(), a);
        assert!(matches!(cam.read(), Err(CameraError::Read(_))));
        assert_eq!(cam.read().unwrap(), b);
        assert_eq!(cam.read().unwrap(), b);
        assert_eq!(cam.opened(), &[CaptureMode::TRACKING]);
    }

    #[test]
    fn mock_open_failures_and_release() {
        let mut cam = MockCamera::repeating(Array2::from_elem((1, 1), [0, 0, 0]));
        cam.fail_opens(1);
        assert!(cam.open(&CaptureMode::CALIBRATION).is_err());
        cam.open(&CaptureMode::CALIBRATION).unwrap();
        assert!(cam.is_open());
        cam.release();
        assert!(cam.released());
        assert!(!cam.is_open());
    }
}
