use crate::error::{HallOfFameError, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One evaluated trading strategy and its backtest metrics.
///
/// Immutable once persisted: a genome is created at ingestion and destroyed
/// only by archive compression or manual deletion, never mutated in place.
/// `parameters` may carry caller-owned metadata keys prefixed `__`
/// (e.g. `__iteration_num__`); the repository treats those opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    #[serde(default)]
    pub genome_id: String,
    pub template_name: String,
    pub parameters: HashMap<String, Value>,
    pub metrics: HashMap<String, f64>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_patterns: Option<Vec<String>>,
}

impl Genome {
    /// Builds a genome with ingestion-time `created_at` and a derived id.
    pub fn new(
        template_name: &str,
        parameters: HashMap<String, Value>,
        metrics: HashMap<String, f64>,
        strategy_code: Option<String>,
        success_patterns: Option<Vec<String>>,
    ) -> Self {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let sharpe = metrics.get("sharpe_ratio").copied().unwrap_or(0.0);
        let genome_id = derive_genome_id(template_name, &created_at, sharpe);
        Self {
            genome_id,
            template_name: template_name.to_string(),
            parameters,
            metrics,
            created_at,
            strategy_code,
            success_patterns,
        }
    }

    pub fn sharpe_ratio(&self) -> Option<f64> {
        self.metrics.get("sharpe_ratio").copied()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// One-line description for log messages.
    pub fn summary(&self) -> String {
        match self.sharpe_ratio() {
            Some(sharpe) => format!(
                "{} ({}, sharpe {:.2})",
                self.genome_id, self.template_name, sharpe
            ),
            None => format!("{} ({})", self.genome_id, self.template_name),
        }
    }

    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a genome from its JSON form.
    ///
    /// Fails with `MalformedRecord` when `template_name`, `parameters`,
    /// `metrics` or `created_at` is missing, or when `parameters`/`metrics`
    /// are not objects. A missing `genome_id` is derived instead of rejected.
    /// Metric-presence rules (e.g. `sharpe_ratio`) are ingestion policy and
    /// checked by the repository, not here.
    pub fn deserialize(text: &str) -> Result<Genome> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| HallOfFameError::MalformedRecord(format!("invalid JSON: {}", e)))?;

        let object = value.as_object().ok_or_else(|| {
            HallOfFameError::MalformedRecord("genome record must be a JSON object".to_string())
        })?;

        for field in ["template_name", "parameters", "metrics", "created_at"] {
            if !object.contains_key(field) {
                return Err(HallOfFameError::MalformedRecord(format!(
                    "missing field `{}`",
                    field
                )));
            }
        }
        for field in ["parameters", "metrics"] {
            if !object[field].is_object() {
                return Err(HallOfFameError::MalformedRecord(format!(
                    "field `{}` must be an object",
                    field
                )));
            }
        }

        let mut genome: Genome = serde_json::from_value(value)
            .map_err(|e| HallOfFameError::MalformedRecord(e.to_string()))?;

        if genome.genome_id.is_empty() {
            genome.genome_id = derive_genome_id(
                &genome.template_name,
                &genome.created_at,
                genome.sharpe_ratio().unwrap_or(0.0),
            );
        }
        Ok(genome)
    }
}

/// `{template}_{normalized timestamp}_{sharpe:.2}`. Normalization keeps only
/// the alphanumeric characters of the timestamp. Near-simultaneous ingestions
/// of equal-sharpe strategies from the same template therefore collide; ids
/// are externally observable, so a disambiguating suffix is out of contract.
pub fn derive_genome_id(template_name: &str, created_at: &str, sharpe_ratio: f64) -> String {
    let timestamp: String = created_at
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!("{}_{}_{:.2}", template_name, timestamp, sharpe_ratio)
}
