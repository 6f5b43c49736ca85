use serde::{Deserialize, Serialize};

/// Minimum sharpe ratio for the Champions tier.
pub const CHAMPION_SHARPE: f64 = 2.0;
/// Minimum sharpe ratio for the Contenders tier.
pub const CONTENDER_SHARPE: f64 = 1.5;

/// Performance tier determining where a genome is stored on disk.
///
/// Assigned exactly once, at ingestion. Later threshold changes never move
/// existing genomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Champions,
    Contenders,
    Archive,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Champions, Tier::Contenders, Tier::Archive];

    /// Pure mapping from sharpe ratio to storage tier.
    pub fn classify(sharpe_ratio: f64) -> Tier {
        if sharpe_ratio >= CHAMPION_SHARPE {
            Tier::Champions
        } else if sharpe_ratio >= CONTENDER_SHARPE {
            Tier::Contenders
        } else {
            Tier::Archive
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Tier::Champions => "champions",
            Tier::Contenders => "contenders",
            Tier::Archive => "archive",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Champions => write!(f, "Champions"),
            Tier::Contenders => write!(f, "Contenders"),
            Tier::Archive => write!(f, "Archive"),
        }
    }
}

/// Analytics buckets for the sharpe index. Finer-grained than tiers and
/// independent of storage location.
pub const SHARPE_BUCKETS: [&str; 5] = ["2.5+", "2.0-2.5", "1.5-2.0", "1.0-1.5", "<1.0"];

pub fn bucket_label(sharpe_ratio: f64) -> &'static str {
    if sharpe_ratio >= 2.5 {
        "2.5+"
    } else if sharpe_ratio >= 2.0 {
        "2.0-2.5"
    } else if sharpe_ratio >= 1.5 {
        "1.5-2.0"
    } else if sharpe_ratio >= 1.0 {
        "1.0-1.5"
    } else {
        "<1.0"
    }
}
