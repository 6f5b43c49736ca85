use crate::error::{HallOfFameError, Result};
use crate::novelty::DEFAULT_DUPLICATE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable repository policy. Tier thresholds are deliberately not here;
/// they are fixed constants so that previously persisted genomes keep their
/// tier across deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Novelty scores below this reject ingestion as a duplicate.
    pub duplicate_threshold: f64,
    /// Default age cutoff for `cleanup_old_archive`, in days.
    pub cleanup_age_days: i64,
    /// Archive genomes in the top N by sharpe are never compressed.
    pub cleanup_keep_top_n: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            cleanup_age_days: 90,
            cleanup_keep_top_n: 10,
        }
    }
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.duplicate_threshold > 0.0 && self.duplicate_threshold <= 1.0) {
            return Err(HallOfFameError::Configuration(format!(
                "duplicate_threshold must be in (0, 1], got {}",
                self.duplicate_threshold
            )));
        }
        if self.cleanup_age_days < 0 {
            return Err(HallOfFameError::Configuration(format!(
                "cleanup_age_days must be non-negative, got {}",
                self.cleanup_age_days
            )));
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HallOfFameError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: RepositoryConfig = toml::from_str(&contents)
            .map_err(|e| HallOfFameError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| HallOfFameError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| HallOfFameError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
