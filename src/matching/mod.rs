mod matcher;

pub use matcher::{Identification, MatchResult, MatchWeights, Matcher};
