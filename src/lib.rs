//! Student identification from a finger presented to a camera.
//!
//! A captured frame is binarized, its dominant contact shape is reduced to
//! area, perimeter and circularity, and that descriptor is stored as a
//! base64 JSON template or matched against the enrolled templates.

pub mod capture;
pub mod config;
pub mod error;
pub mod features;
pub mod matching;
pub mod service;
pub mod store;
pub mod template;

pub use config::ReaderConfig;
pub use error::{PipelineError, Result};
pub use features::{FeatureSet, Frame, Mask};
pub use matching::{Identification, MatchResult, Matcher};
pub use service::{AttemptState, CancelReason, IdentificationService, Outcome};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StudentProfile};
pub use template::{Template, TemplateCodec};
