mod extract;
mod preprocess;
pub mod types;

pub use extract::FeatureExtractor;
pub use preprocess::Preprocessor;
pub use types::{Contour, FeatureSet, Frame, Mask};
