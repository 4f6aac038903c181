use super::types::{Contour, FeatureSet, Mask};
use crate::config::ExtractConfig;
use crate::error::{PipelineError, Result};
use imageproc::contours::{find_contours, BorderType};

/// Reduces the dominant foreground shape of a mask to geometric scalars.
pub struct FeatureExtractor {
    config: ExtractConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    /// Outer boundaries of all foreground regions, in raster order of their
    /// first pixel (top to bottom, left to right).
    pub fn contours(mask: &Mask) -> Vec<Contour> {
        find_contours::<i32>(mask.as_image())
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer))
            .map(|c| Contour::new(c.points))
            .collect()
    }

    /// The contour with the largest enclosed area above the noise floor.
    ///
    /// Ties keep the contour found first in raster order.
    pub fn largest_contour(&self, mask: &Mask) -> Result<Contour> {
        if mask.is_empty() {
            let (w, h) = mask.dimensions();
            return Err(PipelineError::InvalidInput(format!(
                "mask has zero dimension ({w}x{h})"
            )));
        }

        let contours = Self::contours(mask);
        tracing::debug!("Found {} outer contours", contours.len());

        let mut best: Option<(f64, Contour)> = None;
        for contour in contours {
            let area = contour.area();
            if area <= self.config.min_contour_area {
                continue;
            }
            if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
                best = Some((area, contour));
            }
        }

        best.map(|(_, contour)| contour).ok_or_else(|| {
            PipelineError::NoFeatureFound(format!(
                "no foreground region larger than {} px²",
                self.config.min_contour_area
            ))
        })
    }

    pub fn extract(&self, mask: &Mask) -> Result<FeatureSet> {
        let _span = tracing::debug_span!("extract").entered();

        let contour = self.largest_contour(mask)?;
        let features = FeatureSet::from_contour(&contour);
        tracing::debug!(
            "Dominant contour: {} points, area={:.1}, perimeter={:.1}, circularity={:.3}",
            contour.points.len(),
            features.area,
            features.perimeter,
            features.circularity
        );

        Ok(features)
    }
}
