pub mod indices;
pub mod query;

use crate::config::RepositoryConfig;
use crate::error::{HallOfFameError, Result};
use crate::genome::Genome;
use crate::novelty::{FactorVector, NoveltyScorer};
use crate::storage::PersistenceLayer;
use crate::types::{Tier, SHARPE_BUCKETS};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indices::IndexSet;
use query::{MetricRange, ParamMatch, SimilarStrategy, StrategyQuery};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct TierStatistics {
    pub count: usize,
    pub best_sharpe: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatistics {
    pub champions: TierStatistics,
    pub contenders: TierStatistics,
    pub archive: TierStatistics,
    pub total: usize,
    pub backup_count: usize,
    pub compressed_count: usize,
    pub per_template: HashMap<String, usize>,
}

/// Facade over the tiered strategy population.
///
/// Owns all mutable state (three tier caches, three indices, the factor
/// vector cache); instances pointed at different base directories are fully
/// independent. Single-writer: callers must not interleave maintenance with
/// in-flight ingestion from another thread.
///
/// Read paths never touch the disk after the startup load, except the cold
/// compressed-genome restore.
pub struct Repository {
    config: RepositoryConfig,
    persistence: PersistenceLayer,
    scorer: NoveltyScorer,
    caches: HashMap<Tier, Vec<Arc<Genome>>>,
    indices: IndexSet,
    vectors: HashMap<String, FactorVector>,
    tier_of: HashMap<String, Tier>,
    compressed_ids: HashSet<String>,
}

impl Repository {
    pub fn with_defaults<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        Self::open(base_dir, RepositoryConfig::default())
    }

    /// Creates the directory layout if needed and loads the full corpus:
    /// every tier is scanned, indices are rebuilt and factor vectors are
    /// extracted eagerly for every genome carrying code. This is the one
    /// operation whose cost is proportional to total corpus size.
    pub fn open<P: AsRef<Path>>(base_dir: P, config: RepositoryConfig) -> Result<Self> {
        config.validate()?;
        let persistence = PersistenceLayer::new(base_dir)?;
        let scorer = NoveltyScorer::new(config.duplicate_threshold);

        let mut repository = Self {
            config,
            persistence,
            scorer,
            caches: Tier::ALL.iter().map(|tier| (*tier, Vec::new())).collect(),
            indices: IndexSet::new(),
            vectors: HashMap::new(),
            tier_of: HashMap::new(),
            compressed_ids: HashSet::new(),
        };
        repository.load_tiers()?;
        Ok(repository)
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn load_tiers(&mut self) -> Result<()> {
        for tier in Tier::ALL {
            let mut loaded: Vec<Genome> = self.persistence.load_all(tier)?.collect();
            // Reproducible "insertion order" across restarts.
            loaded.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.genome_id.cmp(&b.genome_id))
            });
            for genome in loaded {
                self.attach(Arc::new(genome), tier);
            }
        }
        self.compressed_ids
            .extend(self.persistence.list_compressed_ids());
        log::info!(
            "Loaded {} genomes, {} compressed archive entries",
            self.indices.len(),
            self.compressed_ids.len()
        );
        Ok(())
    }

    /// Registers a genome in the tier cache, all indices and (when it has
    /// code) the vector cache.
    fn attach(&mut self, genome: Arc<Genome>, tier: Tier) {
        if let Some(code) = &genome.strategy_code {
            if !self.vectors.contains_key(&genome.genome_id) {
                self.vectors
                    .insert(genome.genome_id.clone(), self.scorer.extract_features(code));
            }
        }
        self.tier_of.insert(genome.genome_id.clone(), tier);
        if let Some(cache) = self.caches.get_mut(&tier) {
            cache.push(Arc::clone(&genome));
        }
        self.indices.insert(genome);
    }

    fn detach(&mut self, genome_id: &str) {
        if let Some(tier) = self.tier_of.remove(genome_id) {
            if let Some(cache) = self.caches.get_mut(&tier) {
                cache.retain(|g| g.genome_id != genome_id);
            }
        }
        self.indices.remove(genome_id);
        self.vectors.remove(genome_id);
    }

    /// Ingests one evaluated strategy.
    ///
    /// Order of checks is load-bearing: metric validation, then duplicate
    /// rejection (both before any I/O), then the tier write, and only after
    /// a successful write the index update. A genome is therefore either
    /// fully persisted-and-indexed or entirely absent; a failed write leaves
    /// a backup record and nothing in memory.
    pub fn add_strategy(
        &mut self,
        template_name: &str,
        parameters: HashMap<String, Value>,
        metrics: HashMap<String, f64>,
        strategy_code: Option<String>,
        success_patterns: Option<Vec<String>>,
    ) -> Result<String> {
        let sharpe = *metrics
            .get("sharpe_ratio")
            .ok_or_else(|| HallOfFameError::MissingMetric("sharpe_ratio".to_string()))?;

        let candidate_vector = strategy_code
            .as_deref()
            .map(|code| self.scorer.extract_features(code));
        if let Some(vector) = &candidate_vector {
            self.check_duplicate(vector)?;
        }

        let tier = Tier::classify(sharpe);
        let genome = Genome::new(
            template_name,
            parameters,
            metrics,
            strategy_code,
            success_patterns,
        );

        if let Err(error) = self.persistence.save(&genome, tier) {
            self.persistence.backup(&genome, tier, &error);
            return Err(error);
        }

        let genome = Arc::new(genome);
        let genome_id = genome.genome_id.clone();
        if let Some(vector) = candidate_vector {
            self.vectors.insert(genome_id.clone(), vector);
        }
        log::debug!("Added {} to {} tier", genome.summary(), tier);
        self.attach(genome, tier);
        Ok(genome_id)
    }

    /// Duplicate check runs against the union of cached vectors from all
    /// three tiers; a champion can be judged a duplicate of an archived
    /// entry.
    fn check_duplicate(&self, candidate: &FactorVector) -> Result<()> {
        let mut entries: Vec<(&String, &FactorVector)> = self.vectors.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let vectors: Vec<&FactorVector> = entries.iter().map(|(_, vector)| *vector).collect();

        let (score, nearest) = self.scorer.novelty_from(candidate, &vectors);
        if self.scorer.is_duplicate(score) {
            if let Some(nearest) = nearest {
                return Err(HallOfFameError::Duplicate {
                    nearest_id: entries[nearest.index].0.clone(),
                    similarity: 1.0 - nearest.distance,
                    shared_features: NoveltyScorer::shared_features(
                        candidate,
                        vectors[nearest.index],
                    ),
                });
            }
        }
        Ok(())
    }

    /// Highest-sharpe genome of the Champions tier only. Contenders and
    /// Archive are never substituted, even when Champions is empty.
    pub fn get_current_champion(&self) -> Option<Arc<Genome>> {
        self.caches
            .get(&Tier::Champions)?
            .iter()
            .max_by(|a, b| {
                sort_key(a, "sharpe_ratio")
                    .partial_cmp(&sort_key(b, "sharpe_ratio"))
                    .unwrap_or(Ordering::Equal)
            })
            .cloned()
    }

    pub fn get_champions(
        &self,
        limit: Option<usize>,
        sort_by: Option<&str>,
    ) -> Vec<Arc<Genome>> {
        self.get_tier(Tier::Champions, limit, sort_by)
    }

    pub fn get_contenders(
        &self,
        limit: Option<usize>,
        sort_by: Option<&str>,
    ) -> Vec<Arc<Genome>> {
        self.get_tier(Tier::Contenders, limit, sort_by)
    }

    pub fn get_archive(&self, limit: Option<usize>, sort_by: Option<&str>) -> Vec<Arc<Genome>> {
        self.get_tier(Tier::Archive, limit, sort_by)
    }

    pub fn get_tier(
        &self,
        tier: Tier,
        limit: Option<usize>,
        sort_by: Option<&str>,
    ) -> Vec<Arc<Genome>> {
        let mut genomes = self
            .caches
            .get(&tier)
            .map(|cache| cache.to_vec())
            .unwrap_or_default();
        sort_descending(&mut genomes, sort_by.unwrap_or("sharpe_ratio"));
        if let Some(limit) = limit {
            genomes.truncate(limit);
        }
        genomes
    }

    pub fn get_by_id(&self, genome_id: &str) -> Option<Arc<Genome>> {
        self.indices.get(genome_id)
    }

    pub fn get_by_template(
        &self,
        template_name: &str,
        limit: Option<usize>,
        sort_by: Option<&str>,
    ) -> Vec<Arc<Genome>> {
        let mut genomes = self.indices.by_template(template_name).to_vec();
        sort_descending(&mut genomes, sort_by.unwrap_or("sharpe_ratio"));
        if let Some(limit) = limit {
            genomes.truncate(limit);
        }
        genomes
    }

    /// Fails loudly on an unknown bucket label; that is a caller bug, not a
    /// runtime condition.
    pub fn get_by_sharpe_bucket(
        &self,
        bucket: &str,
        limit: Option<usize>,
        sort_by: Option<&str>,
    ) -> Result<Vec<Arc<Genome>>> {
        if !SHARPE_BUCKETS.contains(&bucket) {
            return Err(HallOfFameError::InvalidQueryArgument(format!(
                "unknown sharpe bucket `{}`, expected one of {:?}",
                bucket, SHARPE_BUCKETS
            )));
        }
        let mut genomes = self.indices.by_bucket(bucket).to_vec();
        sort_descending(&mut genomes, sort_by.unwrap_or("sharpe_ratio"));
        if let Some(limit) = limit {
            genomes.truncate(limit);
        }
        Ok(genomes)
    }

    /// All stored genomes (with cached vectors) within `max_distance` of the
    /// given code, most-similar first.
    pub fn query_similar(
        &self,
        code: &str,
        max_distance: f64,
        tiers: Option<&[Tier]>,
    ) -> Vec<SimilarStrategy> {
        let candidate = self.scorer.extract_features(code);
        let mut hits = Vec::new();
        for (genome_id, vector) in &self.vectors {
            let Some(tier) = self.tier_of.get(genome_id).copied() else {
                continue;
            };
            if let Some(allowed) = tiers {
                if !allowed.contains(&tier) {
                    continue;
                }
            }
            let distance = NoveltyScorer::cosine_distance(&candidate, vector);
            if distance <= max_distance {
                if let Some(genome) = self.indices.get(genome_id) {
                    hits.push(SimilarStrategy {
                        genome,
                        distance,
                        similarity: 1.0 - distance,
                        shared_features: NoveltyScorer::shared_features(&candidate, vector),
                        tier,
                    });
                }
            }
        }
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.genome.genome_id.cmp(&b.genome.genome_id))
        });
        hits
    }

    pub fn query_by_metric_range(&self, metric: &str, min: f64, max: f64) -> Vec<Arc<Genome>> {
        self.query_advanced(&StrategyQuery {
            metric_ranges: vec![MetricRange {
                metric: metric.to_string(),
                min,
                max,
            }],
            ..Default::default()
        })
    }

    pub fn query_by_parameters(&self, parameters: &[(String, ParamMatch)]) -> Vec<Arc<Genome>> {
        self.query_advanced(&StrategyQuery {
            parameters: parameters.to_vec(),
            ..Default::default()
        })
    }

    pub fn query_by_factor_pattern(&self, features: &[String]) -> Vec<Arc<Genome>> {
        self.query_advanced(&StrategyQuery {
            factor_pattern: features.to_vec(),
            ..Default::default()
        })
    }

    pub fn query_by_code_pattern(&self, pattern: &str) -> Vec<Arc<Genome>> {
        self.query_advanced(&StrategyQuery {
            code_pattern: Some(pattern.to_string()),
            ..Default::default()
        })
    }

    /// AND-composition of all filter kinds; a pure scan over the in-memory
    /// caches with no persistence side effects.
    pub fn query_advanced(&self, query: &StrategyQuery) -> Vec<Arc<Genome>> {
        let mut matches = Vec::new();
        for tier in Tier::ALL {
            let Some(cache) = self.caches.get(&tier) else {
                continue;
            };
            for genome in cache {
                let vector = self.vectors.get(&genome.genome_id);
                if query.matches(genome, vector, tier) {
                    matches.push(Arc::clone(genome));
                }
            }
        }
        matches
    }

    /// Compresses Archive-tier genomes older than `max_age_days`, except the
    /// top `keep_top_n` by sharpe which are never compressed regardless of
    /// age. Returns `(compressed, deleted)` counts, where deleted counts the
    /// original files removed after verified compression.
    pub fn cleanup_old_archive(
        &mut self,
        max_age_days: i64,
        keep_top_n: usize,
    ) -> Result<(usize, usize)> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let protected: HashSet<String> = self
            .get_archive(Some(keep_top_n), None)
            .iter()
            .map(|genome| genome.genome_id.clone())
            .collect();

        let mut to_compress = Vec::new();
        if let Some(cache) = self.caches.get(&Tier::Archive) {
            for genome in cache {
                if protected.contains(&genome.genome_id) {
                    continue;
                }
                match parse_timestamp(&genome.created_at) {
                    Some(created) if created < cutoff => {
                        to_compress.push(genome.genome_id.clone())
                    }
                    Some(_) => {}
                    None => log::warn!(
                        "Skipping archive genome {} with unparseable created_at `{}`",
                        genome.genome_id,
                        genome.created_at
                    ),
                }
            }
        }

        let mut compressed = 0;
        let mut deleted = 0;
        for genome_id in to_compress {
            match self.persistence.compress(Tier::Archive, &genome_id) {
                Ok(_) => {
                    compressed += 1;
                    deleted += 1;
                    self.detach(&genome_id);
                    self.compressed_ids.insert(genome_id);
                }
                Err(e) => log::warn!("Could not compress archive genome {}: {}", genome_id, e),
            }
        }
        if compressed > 0 {
            log::info!(
                "Archive cleanup compressed {} genomes ({} originals removed)",
                compressed,
                deleted
            );
        }
        Ok((compressed, deleted))
    }

    /// Runs archive cleanup with the configured age and keep-top-N policy.
    pub fn run_default_cleanup(&mut self) -> Result<(usize, usize)> {
        self.cleanup_old_archive(self.config.cleanup_age_days, self.config.cleanup_keep_top_n)
    }

    /// Cold path: reads a compressed archive entry straight from disk,
    /// bypassing the indices. The result is not re-attached to memory.
    pub fn restore_compressed_genome(&self, genome_id: &str) -> Result<Genome> {
        self.persistence.load_compressed(genome_id)
    }

    /// Loads a backup record and, when `retry_save` is set, retries the
    /// original tier write. On a successful retry the backup file is deleted
    /// and the genome re-enters the normal caches and indices.
    pub fn recover_from_backup(&mut self, genome_id: &str, retry_save: bool) -> Result<Genome> {
        let record = self.persistence.load_backup(genome_id)?;
        let genome = record.genome;
        let tier = record.metadata.intended_tier;

        if retry_save {
            self.persistence.save(&genome, tier)?;
            self.persistence.delete_backup(genome_id)?;
            self.attach(Arc::new(genome.clone()), tier);
            log::info!("Recovered {} into {} tier", genome.summary(), tier);
        }
        Ok(genome)
    }

    pub fn get_statistics(&self) -> RepositoryStatistics {
        RepositoryStatistics {
            champions: self.tier_statistics(Tier::Champions),
            contenders: self.tier_statistics(Tier::Contenders),
            archive: self.tier_statistics(Tier::Archive),
            total: self.indices.len(),
            backup_count: self.persistence.count_backups(),
            compressed_count: self.compressed_ids.len(),
            per_template: self.indices.template_counts(),
        }
    }

    fn tier_statistics(&self, tier: Tier) -> TierStatistics {
        let cache = self.caches.get(&tier);
        TierStatistics {
            count: cache.map_or(0, |c| c.len()),
            best_sharpe: cache.and_then(|c| {
                c.iter()
                    .filter_map(|genome| genome.sharpe_ratio())
                    .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            }),
        }
    }
}

fn sort_key(genome: &Genome, metric: &str) -> f64 {
    genome.metric(metric).unwrap_or(f64::NEG_INFINITY)
}

/// Stable descending sort; missing metrics sort last, ties keep original
/// insertion order.
fn sort_descending(genomes: &mut [Arc<Genome>], metric: &str) {
    genomes.sort_by(|a, b| {
        sort_key(b, metric)
            .partial_cmp(&sort_key(a, metric))
            .unwrap_or(Ordering::Equal)
    });
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
