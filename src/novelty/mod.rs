pub mod extractor;
pub mod scorer;

use std::collections::HashMap;

/// Sparse code-derived representation of a strategy, keyed by feature
/// identifiers such as `indicator:rsi` or `dataset:close`. Used only for
/// novelty comparison.
pub type FactorVector = HashMap<String, f64>;

pub use extractor::FeatureExtractor;
pub use scorer::{NearestMatch, NoveltyScorer, DEFAULT_DUPLICATE_THRESHOLD};
