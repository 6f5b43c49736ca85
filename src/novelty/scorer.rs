use super::{FactorVector, FeatureExtractor};

/// Novelty scores below this reject a candidate as a near-duplicate.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.1;

/// The most similar stored vector found during a novelty check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestMatch {
    pub index: usize,
    pub distance: f64,
}

/// Scores candidate strategies against the stored population.
///
/// Lower score = more similar to something already stored. Callers must not
/// assume anything beyond "smaller is more similar".
pub struct NoveltyScorer {
    extractor: FeatureExtractor,
    duplicate_threshold: f64,
}

impl NoveltyScorer {
    pub fn new(duplicate_threshold: f64) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            duplicate_threshold,
        }
    }

    pub fn extract_features(&self, code: &str) -> FactorVector {
        self.extractor.extract(code)
    }

    /// Cosine distance in `[0, 1]`: 0 = identical direction, 1 = unrelated.
    /// An empty vector has no direction and is treated as maximally distant.
    pub fn cosine_distance(a: &FactorVector, b: &FactorVector) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 1.0;
        }
        let dot: f64 = a
            .iter()
            .filter_map(|(key, va)| b.get(key).map(|vb| va * vb))
            .sum();
        let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
        let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }

    /// Minimum distance from `code` to any existing vector, 1.0 when none.
    pub fn novelty_score(
        &self,
        code: &str,
        existing: &[&FactorVector],
    ) -> (f64, Option<NearestMatch>) {
        let candidate = self.extract_features(code);
        self.novelty_from(&candidate, existing)
    }

    pub fn novelty_from(
        &self,
        candidate: &FactorVector,
        existing: &[&FactorVector],
    ) -> (f64, Option<NearestMatch>) {
        let mut nearest: Option<NearestMatch> = None;
        for (index, vector) in existing.iter().enumerate() {
            let distance = Self::cosine_distance(candidate, vector);
            if nearest.map_or(true, |n| distance < n.distance) {
                nearest = Some(NearestMatch { index, distance });
            }
        }
        (nearest.map_or(1.0, |n| n.distance), nearest)
    }

    pub fn is_duplicate(&self, score: f64) -> bool {
        score < self.duplicate_threshold
    }

    /// Feature keys present and non-zero in both vectors, sorted. Diagnostic
    /// only, for human-readable rejection messages.
    pub fn shared_features(a: &FactorVector, b: &FactorVector) -> Vec<String> {
        let mut shared: Vec<String> = a
            .iter()
            .filter(|(key, value)| {
                **value != 0.0 && b.get(*key).map_or(false, |other| *other != 0.0)
            })
            .map(|(key, _)| key.clone())
            .collect();
        shared.sort();
        shared
    }
}
