use crate::error::{HallOfFameError, Result};
use crate::genome::Genome;
use crate::storage::backup::{BackupMetadata, BackupRecord};
use crate::types::Tier;
use chrono::{SecondsFormat, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Maps `(Tier, genome_id)` to files under a repository root and performs all
/// disk I/O: genome writes, backup-on-failure, gzip archival.
///
/// Layout: `champions/`, `contenders/`, `archive/` (plus `.json.gz` artifacts)
/// and `backup/` with `{genome_id}_failed.json` records.
pub struct PersistenceLayer {
    base_dir: PathBuf,
}

impl PersistenceLayer {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let layer = Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        };
        for tier in Tier::ALL {
            fs::create_dir_all(layer.tier_dir(tier))?;
        }
        fs::create_dir_all(layer.backup_dir())?;
        Ok(layer)
    }

    pub fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.base_dir.join(tier.dir_name())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backup")
    }

    pub fn genome_path(&self, tier: Tier, genome_id: &str) -> PathBuf {
        self.tier_dir(tier).join(format!("{}.json", genome_id))
    }

    pub fn compressed_path(&self, genome_id: &str) -> PathBuf {
        self.tier_dir(Tier::Archive)
            .join(format!("{}.json.gz", genome_id))
    }

    pub fn backup_path(&self, genome_id: &str) -> PathBuf {
        self.backup_dir().join(format!("{}_failed.json", genome_id))
    }

    pub fn save(&self, genome: &Genome, tier: Tier) -> Result<PathBuf> {
        let path = self.genome_path(tier, &genome.genome_id);
        fs::write(&path, genome.serialize()?)?;
        Ok(path)
    }

    pub fn remove(&self, tier: Tier, genome_id: &str) -> Result<()> {
        fs::remove_file(self.genome_path(tier, genome_id))?;
        Ok(())
    }

    /// Lazily scans a tier directory in deterministic (path) order. Files
    /// that fail to read or deserialize are logged and skipped; corruption
    /// must never abort startup.
    pub fn load_all(&self, tier: Tier) -> Result<impl Iterator<Item = Genome>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(self.tier_dir(tier))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        Ok(paths.into_iter().filter_map(|path| {
            let loaded = fs::read_to_string(&path)
                .map_err(HallOfFameError::from)
                .and_then(|text| Genome::deserialize(&text));
            match loaded {
                Ok(genome) => Some(genome),
                Err(e) => {
                    log::warn!("Skipping unreadable genome file {}: {}", path.display(), e);
                    None
                }
            }
        }))
    }

    /// Last line of defense against data loss: always attempted after a
    /// failed tier write. A failure here is the only condition logged at
    /// `error`, since it means the genome is genuinely gone.
    pub fn backup(&self, genome: &Genome, intended_tier: Tier, error: &HallOfFameError) {
        let record = BackupRecord {
            genome: genome.clone(),
            metadata: BackupMetadata {
                intended_tier,
                error_message: error.to_string(),
                backup_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                error_chain: error_chain(error),
            },
        };

        let path = self.backup_path(&genome.genome_id);
        let written = serde_json::to_string_pretty(&record)
            .map_err(HallOfFameError::from)
            .and_then(|text| fs::write(&path, text).map_err(HallOfFameError::from));
        match written {
            Ok(()) => log::warn!(
                "Backed up genome {} after failed {} write: {}",
                genome.genome_id,
                intended_tier,
                error
            ),
            Err(backup_error) => log::error!(
                "Backup of genome {} failed after failed {} write; record is lost: {}",
                genome.genome_id,
                intended_tier,
                backup_error
            ),
        }
    }

    pub fn load_backup(&self, genome_id: &str) -> Result<BackupRecord> {
        let path = self.backup_path(genome_id);
        if !path.exists() {
            return Err(HallOfFameError::NotFound(format!(
                "no backup record for genome {}",
                genome_id
            )));
        }
        let text = fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|e| {
            HallOfFameError::MalformedRecord(format!("backup record {}: {}", path.display(), e))
        })
    }

    pub fn delete_backup(&self, genome_id: &str) -> Result<()> {
        fs::remove_file(self.backup_path(genome_id))?;
        Ok(())
    }

    pub fn count_backups(&self) -> usize {
        count_files_with_suffix(&self.backup_dir(), "_failed.json")
    }

    pub fn count_compressed(&self) -> usize {
        count_files_with_suffix(&self.tier_dir(Tier::Archive), ".json.gz")
    }

    pub fn list_compressed_ids(&self) -> Vec<String> {
        list_files_with_suffix(&self.tier_dir(Tier::Archive), ".json.gz")
    }

    pub fn list_backup_ids(&self) -> Vec<String> {
        list_files_with_suffix(&self.backup_dir(), "_failed.json")
    }

    /// Gzips an archived genome file. The original is removed only after the
    /// compressed copy has been decompressed and parsed back successfully.
    pub fn compress(&self, tier: Tier, genome_id: &str) -> Result<PathBuf> {
        let source = self.genome_path(tier, genome_id);
        let target = self.compressed_path(genome_id);

        let bytes = fs::read(&source)?;
        let file = File::create(&target)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;

        match self
            .decompress(&target)
            .and_then(|text| Genome::deserialize(&text))
        {
            Ok(_) => {
                fs::remove_file(&source)?;
                Ok(target)
            }
            Err(e) => {
                // Keep the original; a bad artifact is worthless.
                let _ = fs::remove_file(&target);
                Err(e)
            }
        }
    }

    pub fn decompress(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(file);
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        Ok(text)
    }

    pub fn load_compressed(&self, genome_id: &str) -> Result<Genome> {
        let path = self.compressed_path(genome_id);
        if !path.exists() {
            return Err(HallOfFameError::NotFound(format!(
                "no compressed genome {}",
                genome_id
            )));
        }
        Genome::deserialize(&self.decompress(&path)?)
    }
}

fn error_chain(error: &HallOfFameError) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

fn count_files_with_suffix(dir: &Path, suffix: &str) -> usize {
    list_files_with_suffix(dir, suffix).len()
}

fn list_files_with_suffix(dir: &Path, suffix: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(suffix).map(str::to_string))
        })
        .collect();
    ids.sort();
    ids
}
