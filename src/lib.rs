//! Tiered, content-deduplicated repository for evolved trading strategies.
//!
//! An external search loop (generator + backtester) produces candidate
//! strategies; this crate classifies each result into a performance tier
//! (champions / contenders / archive), rejects near-duplicates via a cosine
//! distance over code-derived factor vectors, persists one JSON file per
//! genome with backup-on-failure, and serves multi-criteria queries from
//! in-memory indices. Low-value archive entries age out through verified
//! gzip compression.
//!
//! Entry point is [`Repository`]; everything else is reachable through it.

pub mod config;
pub mod error;
pub mod genome;
pub mod novelty;
pub mod repository;
pub mod storage;
pub mod types;

pub use config::RepositoryConfig;
pub use error::{HallOfFameError, Result};
pub use genome::Genome;
pub use novelty::{FactorVector, FeatureExtractor, NearestMatch, NoveltyScorer};
pub use repository::query::{MetricRange, ParamMatch, SimilarStrategy, StrategyQuery};
pub use repository::{Repository, RepositoryStatistics, TierStatistics};
pub use storage::{BackupMetadata, BackupRecord, PersistenceLayer};
pub use types::{bucket_label, Tier, SHARPE_BUCKETS};
