//! Restore seed order and drop duplicate records.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{IdentityKey, OutputRecord, WorkItem};

/// For each seed item in order, emit the first result sharing its
/// identity tuple. Seed items without a result yet are omitted.
pub fn reorder(seed: &[WorkItem], results: &[OutputRecord]) -> Vec<OutputRecord> {
    let mut index: HashMap<IdentityKey, &OutputRecord> = HashMap::with_capacity(results.len());
    for record in results {
        index.entry(record.identity()).or_insert(record);
    }

    seed.iter()
        .filter_map(|item| index.get(&item.identity()).map(|r| (*r).clone()))
        .collect()
}

/// Drop records equal to an earlier one, keeping first occurrences.
pub fn dedup(records: Vec<OutputRecord>) -> Vec<OutputRecord> {
    let mut seen: HashSet<BTreeMap<String, String>> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.fields().clone()))
        .collect()
}

/// [`reorder`] then [`dedup`].
pub fn reconcile(seed: &[WorkItem], results: &[OutputRecord]) -> Vec<OutputRecord> {
    dedup(reorder(seed, results))
}
