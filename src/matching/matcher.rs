use crate::error::{PipelineError, Result};
use crate::features::FeatureSet;
use serde::{Deserialize, Serialize};

/// Relative importance of each feature dimension in the similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            area: 0.4,
            perimeter: 0.3,
            circularity: 0.3,
        }
    }
}

impl MatchWeights {
    fn total(&self) -> f64 {
        self.area + self.perimeter + self.circularity
    }

    pub fn validate(&self) -> Result<()> {
        let all = [self.area, self.perimeter, self.circularity];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::Config(format!(
                "match weights must be finite and non-negative, got {self:?}"
            )));
        }
        if self.total() <= 0.0 {
            return Err(PipelineError::Config(
                "at least one match weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of comparing the live sample against one stored template.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub student_id: String,
    /// Similarity in `[0, 1]`; 1.0 means identical features.
    pub score: f64,
    /// `score >= threshold`.
    pub accepted: bool,
}

/// Result of searching a catalog for the live sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Matched(MatchResult),
    /// Nothing reached the threshold. `best` is the highest-scoring rejected
    /// entry, absent when the catalog was empty.
    NotFound { best: Option<MatchResult> },
}

/// Scores feature sets by weighted per-dimension relative closeness.
///
/// For each dimension the closeness of `a` and `b` is
/// `1 - |a - b| / max(|a|, |b|)` (1.0 when both are zero), and the score is
/// the weight-normalised mean of the three closenesses. Identical inputs
/// score exactly 1.0.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    weights: MatchWeights,
}

impl Matcher {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    pub fn score(&self, candidate: &FeatureSet, stored: &FeatureSet) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted = w.area * closeness(candidate.area, stored.area)
            + w.perimeter * closeness(candidate.perimeter, stored.perimeter)
            + w.circularity * closeness(candidate.circularity, stored.circularity);
        (weighted / total).clamp(0.0, 1.0)
    }

    /// Compare the live sample with one stored feature set.
    pub fn compare(
        &self,
        student_id: &str,
        candidate: &FeatureSet,
        stored: &FeatureSet,
        threshold: f64,
    ) -> MatchResult {
        let score = self.score(candidate, stored);
        MatchResult {
            student_id: student_id.to_string(),
            score,
            accepted: score >= threshold,
        }
    }

    /// Score every catalog entry and accept the best one if it reaches the
    /// threshold.
    ///
    /// Ties at the maximum keep the entry seen first in catalog order.
    pub fn identify<I, S>(&self, candidate: &FeatureSet, catalog: I, threshold: f64) -> Identification
    where
        I: IntoIterator<Item = (S, FeatureSet)>,
        S: AsRef<str>,
    {
        let _span = tracing::debug_span!("identify").entered();

        let mut best: Option<(f64, S)> = None;
        for (student_id, stored) in catalog {
            let score = self.score(candidate, &stored);
            tracing::debug!("Candidate {} scored {:.4}", student_id.as_ref(), score);
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((score, student_id));
            }
        }

        let Some((score, student_id)) = best else {
            return Identification::NotFound { best: None };
        };
        let result = MatchResult {
            student_id: student_id.as_ref().to_string(),
            score,
            accepted: score >= threshold,
        };
        if result.accepted {
            Identification::Matched(result)
        } else {
            Identification::NotFound { best: Some(result) }
        }
    }
}

fn closeness(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return 0.0;
    }
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / scale).clamp(0.0, 1.0)
}
