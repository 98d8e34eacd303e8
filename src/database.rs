//! In-memory database state.
//!
//! A [`Database`] holds the sorted initial k-mer set, one optional
//! [`CountMap`] per k-mer slot and the [`ExperimentRegistry`]. Count maps are
//! created on the first non-zero count for a slot and dropped again when their
//! last experiment is deleted.

use std::collections::{BTreeMap, HashMap};

use crate::error::KiqError;
use crate::indexer::KmerIndexer;
use crate::kmer::{Kmer, KmerIndex};
use crate::pool::ScratchCounts;

pub type ExperimentId = u32;
pub type KmerCount = u32;
pub type ReadCount = u64;

/// Per-experiment counts of one k-mer, ordered by experiment id.
pub type CountMap = BTreeMap<ExperimentId, KmerCount>;

/// One ingested experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub description: String,
    pub read_count: ReadCount,
}

/// Experiments by id, with a name index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentRegistry {
    by_id: BTreeMap<ExperimentId, Experiment>,
    by_name: HashMap<String, ExperimentId>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully specified experiment, as read back from a database file.
    ///
    /// Returns `false` (and changes nothing) if the id or the name is taken.
    pub fn insert(&mut self, experiment: Experiment) -> bool {
        if self.by_id.contains_key(&experiment.id) || self.by_name.contains_key(&experiment.name)
        {
            return false;
        }
        self.by_name.insert(experiment.name.clone(), experiment.id);
        self.by_id.insert(experiment.id, experiment);
        true
    }

    /// Returns the id of `name`, registering a new experiment if needed.
    ///
    /// New experiments get the next id after the largest one in use.
    pub fn get_or_register(&mut self, name: &str, description: &str) -> ExperimentId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.next_id();
        self.insert(Experiment {
            id,
            name: name.to_owned(),
            description: description.to_owned(),
            read_count: 0,
        });
        id
    }

    fn next_id(&self) -> ExperimentId {
        self.by_id.keys().next_back().map_or(1, |&id| id + 1)
    }

    pub fn get(&self, id: ExperimentId) -> Option<&Experiment> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Experiment> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn contains_id(&self, id: ExperimentId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Experiments in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn add_reads(&mut self, id: ExperimentId, reads: ReadCount) {
        if let Some(experiment) = self.by_id.get_mut(&id) {
            experiment.read_count += reads;
        }
    }

    fn remove(&mut self, name: &str) -> Option<Experiment> {
        let id = self.by_name.remove(name)?;
        self.by_id.remove(&id)
    }

    fn set_description(&mut self, name: &str, description: &str) -> bool {
        let Some(id) = self.by_name.get(name) else {
            return false;
        };
        self.by_id
            .get_mut(id)
            .map(|experiment| experiment.description = description.to_owned())
            .is_some()
    }
}

/// The complete persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    initial_kmers: Vec<Kmer>,
    counts: Vec<Option<CountMap>>,
    experiments: ExperimentRegistry,
}

impl Database {
    /// Creates an empty database over `initial_kmers`, which must be sorted and
    /// contain exactly the k-mers the indexer was built from.
    ///
    /// # Errors
    ///
    /// Returns [`KiqError::InvalidArgument`] if the k-mers are not strictly
    /// ascending or their number differs from the indexer size.
    pub fn new<I: KmerIndexer + ?Sized>(
        initial_kmers: Vec<Kmer>,
        indexer: &I,
    ) -> Result<Self, KiqError> {
        if !initial_kmers.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(KiqError::InvalidArgument {
                details: "initial k-mers must be sorted and unique".into(),
            });
        }
        if initial_kmers.len() != indexer.size() {
            return Err(KiqError::InvalidArgument {
                details: format!(
                    "{} initial k-mers for an index of {}",
                    initial_kmers.len(),
                    indexer.size()
                ),
            });
        }
        Ok(Self::from_parts(
            initial_kmers,
            vec![None; indexer.size()],
            ExperimentRegistry::new(),
        ))
    }

    pub(crate) const fn from_parts(
        initial_kmers: Vec<Kmer>,
        counts: Vec<Option<CountMap>>,
        experiments: ExperimentRegistry,
    ) -> Self {
        Self {
            initial_kmers,
            counts,
            experiments,
        }
    }

    /// The sorted initial k-mer set.
    pub fn initial_kmers(&self) -> &[Kmer] {
        &self.initial_kmers
    }

    /// Number of k-mer slots `N`.
    pub fn num_kmers(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if `kmer` is in the initial set.
    pub fn contains(&self, kmer: Kmer) -> bool {
        self.initial_kmers.binary_search(&kmer).is_ok()
    }

    /// The count map of a slot, if any experiment has counts there.
    pub fn counts_at(&self, index: KmerIndex) -> Option<&CountMap> {
        self.counts.get(index).and_then(Option::as_ref)
    }

    pub fn experiments(&self) -> &ExperimentRegistry {
        &self.experiments
    }

    /// Adds `count` occurrences of slot `index` to experiment `id`.
    pub fn add_count(&mut self, index: KmerIndex, id: ExperimentId, count: KmerCount) {
        if count == 0 {
            return;
        }
        let map = self.counts[index].get_or_insert_with(CountMap::new);
        let entry = map.entry(id).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Folds one run's scratch counters into the count maps of experiment
    /// `name` and adds `reads` to its read count. Returns the experiment id.
    pub fn merge_run(
        &mut self,
        name: &str,
        description: &str,
        scratch: &ScratchCounts,
        reads: ReadCount,
    ) -> ExperimentId {
        let id = self.experiments.get_or_register(name, description);
        for (index, count) in scratch.nonzero() {
            self.add_count(index, id, count);
        }
        self.experiments.add_reads(id, reads);
        id
    }

    /// Removes experiment `name` from every count map and the registry.
    ///
    /// Returns `false` if no such experiment exists.
    pub fn delete_experiment(&mut self, name: &str) -> bool {
        let Some(experiment) = self.experiments.remove(name) else {
            return false;
        };
        for slot in &mut self.counts {
            if let Some(map) = slot {
                map.remove(&experiment.id);
                if map.is_empty() {
                    *slot = None;
                }
            }
        }
        true
    }

    /// Replaces the description of experiment `name`.
    ///
    /// Returns `false` if no such experiment exists.
    pub fn update_description(&mut self, name: &str, description: &str) -> bool {
        self.experiments.set_description(name, description)
    }

    /// Number of k-mers recorded in at least one experiment.
    pub fn recorded_kmers(&self) -> usize {
        self.counts.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn experiments_mut(&mut self) -> &mut ExperimentRegistry {
        &mut self.experiments
    }
}
