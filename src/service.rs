use crate::capture::{CameraDevice, CaptureSource, OperatorInput, OperatorSignal};
use crate::config::ReaderConfig;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureExtractor, FeatureSet, Frame, Preprocessor};
use crate::matching::{Identification, MatchResult, Matcher};
use crate::store::{RecordStore, StudentProfile};
use crate::template::{Template, TemplateCodec};
use std::time::{Duration, Instant};

/// Where the service is within an identification or enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Capturing,
    Processing,
    Matched,
    NotFound,
    Enrolled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The operator sent a cancel signal.
    Operator,
    /// No operator signal arrived within the capture timeout.
    Timeout,
}

/// A stored template that could not be decoded and was left out of matching.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTemplate {
    pub student_id: String,
    pub reason: String,
}

/// Result of an attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Matched {
        result: MatchResult,
        profile: Option<StudentProfile>,
        skipped: Vec<SkippedTemplate>,
    },
    NotFound {
        best: Option<MatchResult>,
        skipped: Vec<SkippedTemplate>,
    },
    Enrolled {
        student_id: String,
    },
    Cancelled(CancelReason),
}

impl Outcome {
    /// Terminal state for this outcome; cancellation goes straight back to idle.
    pub fn terminal_state(&self) -> AttemptState {
        match self {
            Outcome::Matched { .. } => AttemptState::Matched,
            Outcome::NotFound { .. } => AttemptState::NotFound,
            Outcome::Enrolled { .. } => AttemptState::Enrolled,
            Outcome::Cancelled(_) => AttemptState::Idle,
        }
    }
}

enum Capture {
    Frame(Frame),
    Cancelled(CancelReason),
}

enum Sample {
    Live {
        features: FeatureSet,
        template: Template,
    },
    Cancelled(CancelReason),
}

/// Drives capture, feature extraction, matching and enrollment.
///
/// Attempt methods take `&mut self`, so a service (and the camera it owns)
/// serves one attempt at a time. Every attempt method returns with the
/// service back in [`AttemptState::Idle`].
pub struct IdentificationService<C, S> {
    config: ReaderConfig,
    camera: C,
    store: S,
    preprocessor: Preprocessor,
    extractor: FeatureExtractor,
    matcher: Matcher,
    state: AttemptState,
    last_terminal: Option<AttemptState>,
}

impl<C, S> IdentificationService<C, S>
where
    C: CameraDevice,
    S: RecordStore,
{
    pub fn new(config: ReaderConfig, camera: C, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            extractor: FeatureExtractor::new(config.extract.clone()),
            matcher: Matcher::new(config.matching.weights),
            config,
            camera,
            store,
            state: AttemptState::Idle,
            last_terminal: None,
        })
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Terminal state of the most recent attempt, if any attempt has run.
    pub fn last_terminal_state(&self) -> Option<AttemptState> {
        self.last_terminal
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn threshold(&self) -> f64 {
        self.config.matching.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Config(format!(
                "match threshold must lie in [0, 1], got {threshold}"
            )));
        }
        self.config.matching.threshold = threshold;
        Ok(())
    }

    /// Preprocess and extract one frame.
    pub fn process_frame(&self, frame: &Frame) -> Result<FeatureSet> {
        let mask = self.preprocessor.preprocess(frame)?;
        self.extractor.extract(&mask)
    }

    /// Capture a live sample and look it up among enrolled students.
    pub fn identify<I: OperatorInput>(&mut self, input: &mut I) -> Result<Outcome> {
        tracing::info!("Identification attempt started");
        let result = self.run_identify(input);
        self.finish(result)
    }

    /// Capture a live sample and store it as the student's template.
    pub fn enroll<I: OperatorInput>(&mut self, student_id: &str, input: &mut I) -> Result<Outcome> {
        tracing::info!("Enrollment attempt started for {}", student_id);
        let result = self.run_enroll(student_id, input);
        self.finish(result)
    }

    /// Identify an already-extracted sample.
    pub fn identify_features(&mut self, candidate: &FeatureSet) -> Result<Outcome> {
        self.transition(AttemptState::Processing);
        let result = self.match_candidate(candidate);
        self.finish(result)
    }

    /// Enroll an already-extracted sample.
    pub fn enroll_features(&mut self, student_id: &str, features: &FeatureSet) -> Result<Outcome> {
        let result = self.check_student(student_id).and_then(|_| {
            self.transition(AttemptState::Processing);
            if !features.is_valid() {
                return Err(PipelineError::InvalidInput(format!(
                    "refusing to enroll out-of-range features: {features:?}"
                )));
            }
            let template = TemplateCodec::encode(features)?;
            self.store_template(student_id, &template)
        });
        self.finish(result)
    }

    fn run_identify<I: OperatorInput>(&mut self, input: &mut I) -> Result<Outcome> {
        match self.acquire_sample(input)? {
            Sample::Live { features, .. } => self.match_candidate(&features),
            Sample::Cancelled(reason) => Ok(Outcome::Cancelled(reason)),
        }
    }

    fn run_enroll<I: OperatorInput>(&mut self, student_id: &str, input: &mut I) -> Result<Outcome> {
        self.check_student(student_id)?;
        match self.acquire_sample(input)? {
            Sample::Live { template, .. } => self.store_template(student_id, &template),
            Sample::Cancelled(reason) => Ok(Outcome::Cancelled(reason)),
        }
    }

    fn check_student(&self, student_id: &str) -> Result<StudentProfile> {
        if student_id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("empty student id".to_string()));
        }
        self.store
            .fetch_student_profile(student_id)?
            .ok_or_else(|| PipelineError::UnknownStudent(student_id.to_string()))
    }

    /// Capture, preprocess, extract and encode one live sample. The frame and
    /// mask are dropped as soon as the next stage has consumed them.
    fn acquire_sample<I: OperatorInput>(&mut self, input: &mut I) -> Result<Sample> {
        self.transition(AttemptState::Capturing);
        let frame = match self.capture(input)? {
            Capture::Frame(frame) => frame,
            Capture::Cancelled(reason) => return Ok(Sample::Cancelled(reason)),
        };

        self.transition(AttemptState::Processing);
        let mask = self.preprocessor.preprocess(&frame)?;
        drop(frame);
        if cancel_requested(input)? {
            return Ok(Sample::Cancelled(CancelReason::Operator));
        }

        let features = self.extractor.extract(&mask)?;
        drop(mask);
        if cancel_requested(input)? {
            return Ok(Sample::Cancelled(CancelReason::Operator));
        }

        let template = TemplateCodec::encode(&features)?;
        tracing::debug!("Live sample encoded ({} bytes)", template.as_str().len());
        Ok(Sample::Live { features, template })
    }

    /// Stream frames until the operator captures or cancels, or the session
    /// times out. The device is released when this returns.
    fn capture<I: OperatorInput>(&mut self, input: &mut I) -> Result<Capture> {
        let mut stream = self.camera.open()?;
        let (width, height) = stream.resolution();
        tracing::info!("Capture session open ({}x{}); waiting for operator", width, height);

        let poll_interval = self.config.session.poll_interval();
        let deadline = Instant::now() + self.config.session.capture_timeout();

        loop {
            let frame = stream.capture_frame()?;
            match input.poll(poll_interval)? {
                Some(OperatorSignal::CaptureNow) => {
                    tracing::info!("Frame captured");
                    return Ok(Capture::Frame(frame));
                }
                Some(OperatorSignal::Cancel) => {
                    return Ok(Capture::Cancelled(CancelReason::Operator));
                }
                None if Instant::now() >= deadline => {
                    tracing::warn!("No operator input within capture timeout");
                    return Ok(Capture::Cancelled(CancelReason::Timeout));
                }
                None => {}
            }
        }
    }

    fn match_candidate(&mut self, candidate: &FeatureSet) -> Result<Outcome> {
        let stored = self.store.fetch_active_templates()?;
        if stored.is_empty() {
            tracing::info!("No fingerprint templates enrolled");
        }

        let mut skipped = Vec::new();
        let mut catalog = Vec::with_capacity(stored.len());
        for (student_id, template) in stored {
            match TemplateCodec::decode(template.as_str()) {
                Ok(features) => catalog.push((student_id, features)),
                Err(e) => {
                    tracing::warn!("Skipping stored template for {}: {}", student_id, e);
                    skipped.push(SkippedTemplate {
                        student_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match self.matcher.identify(candidate, catalog, self.threshold()) {
            Identification::Matched(result) => {
                tracing::info!(
                    "Fingerprint matched {} (similarity {:.2})",
                    result.student_id,
                    result.score
                );
                let profile = self.store.fetch_student_profile(&result.student_id)?;
                Ok(Outcome::Matched {
                    result,
                    profile,
                    skipped,
                })
            }
            Identification::NotFound { best } => {
                let best_score = best.as_ref().map_or(0.0, |b| b.score);
                tracing::info!("No matching fingerprint (best similarity {:.2})", best_score);
                Ok(Outcome::NotFound { best, skipped })
            }
        }
    }

    fn store_template(&mut self, student_id: &str, template: &Template) -> Result<Outcome> {
        self.store.upsert_template(student_id, template)?;
        tracing::info!("Fingerprint enrolled for {}", student_id);
        Ok(Outcome::Enrolled {
            student_id: student_id.to_string(),
        })
    }

    fn finish(&mut self, result: Result<Outcome>) -> Result<Outcome> {
        let terminal = match &result {
            Ok(outcome) => outcome.terminal_state(),
            Err(_) => AttemptState::Failed,
        };
        match &result {
            Err(e) => tracing::error!("Attempt failed: {}", e),
            Ok(Outcome::Cancelled(reason)) => tracing::info!("Attempt cancelled ({:?})", reason),
            Ok(_) => {}
        }
        self.transition(terminal);
        self.last_terminal = Some(terminal);
        self.transition(AttemptState::Idle);
        result
    }

    fn transition(&mut self, next: AttemptState) {
        if self.state != next {
            tracing::debug!("State {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

fn cancel_requested<I: OperatorInput>(input: &mut I) -> Result<bool> {
    Ok(matches!(
        input.poll(Duration::ZERO)?,
        Some(OperatorSignal::Cancel)
    ))
}
