use crate::genome::Genome;
use crate::types::bucket_label;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory secondary indices over the active population.
///
/// Maintained incrementally as genomes are ingested; rebuilt only at startup
/// load. Invariant: after a successful ingest the genome appears exactly once
/// in all three maps, and removal (archive compression) takes it out of all
/// three.
#[derive(Default)]
pub struct IndexSet {
    by_id: HashMap<String, Arc<Genome>>,
    by_template: HashMap<String, Vec<Arc<Genome>>>,
    by_bucket: HashMap<&'static str, Vec<Arc<Genome>>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, genome: Arc<Genome>) {
        let bucket = bucket_label(genome.sharpe_ratio().unwrap_or(0.0));
        self.by_id
            .insert(genome.genome_id.clone(), Arc::clone(&genome));
        self.by_template
            .entry(genome.template_name.clone())
            .or_default()
            .push(Arc::clone(&genome));
        self.by_bucket.entry(bucket).or_default().push(genome);
    }

    pub fn remove(&mut self, genome_id: &str) -> Option<Arc<Genome>> {
        let genome = self.by_id.remove(genome_id)?;

        if let Some(list) = self.by_template.get_mut(&genome.template_name) {
            list.retain(|g| g.genome_id != genome_id);
            if list.is_empty() {
                self.by_template.remove(&genome.template_name);
            }
        }
        let bucket = bucket_label(genome.sharpe_ratio().unwrap_or(0.0));
        if let Some(list) = self.by_bucket.get_mut(bucket) {
            list.retain(|g| g.genome_id != genome_id);
            if list.is_empty() {
                self.by_bucket.remove(bucket);
            }
        }
        Some(genome)
    }

    pub fn get(&self, genome_id: &str) -> Option<Arc<Genome>> {
        self.by_id.get(genome_id).cloned()
    }

    pub fn by_template(&self, template_name: &str) -> &[Arc<Genome>] {
        self.by_template
            .get(template_name)
            .map_or(&[], |list| list.as_slice())
    }

    pub fn by_bucket(&self, bucket: &str) -> &[Arc<Genome>] {
        self.by_bucket
            .get(bucket)
            .map_or(&[], |list| list.as_slice())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn template_counts(&self) -> HashMap<String, usize> {
        self.by_template
            .iter()
            .map(|(name, list)| (name.clone(), list.len()))
            .collect()
    }
}
