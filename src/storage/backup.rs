use crate::genome::Genome;
use crate::types::Tier;
use serde::{Deserialize, Serialize};

/// Why and when a genome landed in the backup directory instead of its tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub intended_tier: Tier,
    pub error_message: String,
    pub backup_timestamp: String,
    /// Structured cause chain of the failed write, outermost first.
    pub error_chain: Vec<String>,
}

/// On-disk backup schema: the genome's own fields at the top level plus a
/// `_backup_metadata` object. Never reprocessed automatically; recovery is an
/// explicit repository call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(flatten)]
    pub genome: Genome,
    #[serde(rename = "_backup_metadata")]
    pub metadata: BackupMetadata,
}
