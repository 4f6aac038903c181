use super::types::{Frame, Mask};
use crate::config::{Polarity, PreprocessConfig, ThresholdMode};
use crate::error::{PipelineError, Result};
use image::imageops;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

/// Turns a raw color frame into a binary finger-contact mask
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Preprocess a frame into a foreground mask
    ///
    /// Steps:
    /// 1. Convert to single-channel intensity
    /// 2. Gaussian blur with the configured kernel size
    /// 3. Binarize at the Otsu or fixed level
    pub fn preprocess(&self, frame: &Frame) -> Result<Mask> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "frame has zero dimension ({width}x{height})"
            )));
        }

        let gray = imageops::grayscale(frame);

        let smoothed = match self.config.blur_sigma() {
            Some(sigma) => imageproc::filter::gaussian_blur_f32(&gray, sigma),
            None => gray,
        };

        let level = match self.config.threshold {
            ThresholdMode::Otsu => otsu_level(&smoothed),
            ThresholdMode::Fixed(level) => level,
        };
        let kind = match self.config.foreground {
            Polarity::Bright => ThresholdType::Binary,
            Polarity::Dark => ThresholdType::BinaryInverted,
        };
        tracing::debug!("Binarizing {}x{} frame at level {}", width, height, level);

        Ok(Mask::from_gray(threshold(&smoothed, level, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn disc_frame(w: u32, h: u32, r: f32, fg: u8, bg: u8) -> Frame {
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        Frame::from_fn(w, h, |x, y| {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            let v = if d <= r { fg } else { bg };
            Rgb([v, v, v])
        })
    }

    #[test]
    fn empty_frame_is_invalid_input() {
        let pre = Preprocessor::new(PreprocessConfig::default());
        let err = pre.preprocess(&Frame::new(0, 10)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn bright_disc_becomes_foreground() {
        let pre = Preprocessor::new(PreprocessConfig::default());
        let mask = pre.preprocess(&disc_frame(80, 80, 20.0, 220, 30)).unwrap();

        assert!(mask.is_foreground(40, 40));
        assert!(!mask.is_foreground(2, 2));
        let expected = std::f64::consts::PI * 20.0 * 20.0;
        let count = mask.foreground_count() as f64;
        assert!((count - expected).abs() / expected < 0.1, "count {count}");
    }

    #[test]
    fn dark_polarity_selects_dark_region() {
        let pre = Preprocessor::new(PreprocessConfig {
            foreground: Polarity::Dark,
            ..PreprocessConfig::default()
        });
        let mask = pre.preprocess(&disc_frame(80, 80, 20.0, 20, 200)).unwrap();
        assert!(mask.is_foreground(40, 40));
        assert!(!mask.is_foreground(1, 78));
    }

    #[test]
    fn fixed_threshold_without_blur() {
        let pre = Preprocessor::new(PreprocessConfig {
            blur_kernel: 1,
            threshold: ThresholdMode::Fixed(100),
            foreground: Polarity::Bright,
        });
        let frame = Frame::from_fn(4, 1, |x, _| {
            let v = [50, 100, 101, 255][x as usize];
            Rgb([v, v, v])
        });
        let mask = pre.preprocess(&frame).unwrap();
        let fg: Vec<bool> = (0..4).map(|x| mask.is_foreground(x, 0)).collect();
        assert_eq!(fg, vec![false, false, true, true]);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let pre = Preprocessor::new(PreprocessConfig::default());
        let frame = disc_frame(64, 48, 15.0, 200, 40);
        assert_eq!(pre.preprocess(&frame).unwrap(), pre.preprocess(&frame).unwrap());
    }
}
