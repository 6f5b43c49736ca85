use crate::genome::Genome;
use crate::novelty::FactorVector;
use crate::types::Tier;
use serde_json::Value;
use std::sync::Arc;

/// Predicate over a single strategy parameter.
#[derive(Debug, Clone)]
pub enum ParamMatch {
    Exact(Value),
    /// Inclusive numeric range; non-numeric parameter values never match.
    Range { min: f64, max: f64 },
}

impl ParamMatch {
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match (self, actual) {
            (ParamMatch::Exact(expected), Some(value)) => expected == value,
            (ParamMatch::Range { min, max }, Some(value)) => value
                .as_f64()
                .map_or(false, |v| v >= *min && v <= *max),
            (_, None) => false,
        }
    }
}

/// Inclusive range over a named metric.
#[derive(Debug, Clone)]
pub struct MetricRange {
    pub metric: String,
    pub min: f64,
    pub max: f64,
}

/// AND-composed multi-criteria filter; empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct StrategyQuery {
    pub metric_ranges: Vec<MetricRange>,
    pub parameters: Vec<(String, ParamMatch)>,
    /// Feature keys that must all be present and non-zero in the genome's
    /// cached factor vector. Genomes without code never match.
    pub factor_pattern: Vec<String>,
    /// Substring the strategy code must contain.
    pub code_pattern: Option<String>,
    pub tiers: Option<Vec<Tier>>,
}

impl StrategyQuery {
    pub(crate) fn matches(
        &self,
        genome: &Genome,
        vector: Option<&FactorVector>,
        tier: Tier,
    ) -> bool {
        if let Some(tiers) = &self.tiers {
            if !tiers.contains(&tier) {
                return false;
            }
        }
        for range in &self.metric_ranges {
            match genome.metric(&range.metric) {
                Some(value) if value >= range.min && value <= range.max => {}
                _ => return false,
            }
        }
        for (name, predicate) in &self.parameters {
            if !predicate.matches(genome.parameters.get(name)) {
                return false;
            }
        }
        if !self.factor_pattern.is_empty() {
            let Some(vector) = vector else { return false };
            for key in &self.factor_pattern {
                if vector.get(key).map_or(true, |v| *v == 0.0) {
                    return false;
                }
            }
        }
        if let Some(pattern) = &self.code_pattern {
            match &genome.strategy_code {
                Some(code) if code.contains(pattern.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

/// One hit from `query_similar`, most-similar first.
#[derive(Debug, Clone)]
pub struct SimilarStrategy {
    pub genome: Arc<Genome>,
    pub distance: f64,
    pub similarity: f64,
    pub shared_features: Vec<String>,
    pub tier: Tier,
}
