use crate::storage::{self, KeyValueStore, MISTAKES_KEY};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Per-character mistake tally, keyed by the target character that was missed
pub type MistakeMap = BTreeMap<char, u32>;

/// Tally mistakes between the typed prefix and the target, position by position
pub fn diff_mistakes(target: &[char], typed: &[char]) -> MistakeMap {
    typed
        .iter()
        .zip(target.iter())
        .filter(|(typed, expected)| typed != expected)
        .fold(MistakeMap::new(), |mut map, (_, &expected)| {
            *map.entry(expected).or_insert(0) += 1;
            map
        })
}

/// Cumulative cross-session mistake counts
#[derive(Default)]
pub struct MistakeLedger {
    counts: MistakeMap,
    store: Option<Rc<dyn KeyValueStore>>,
}

impl MistakeLedger {
    /// Load the ledger from `store`; subsequent records are written back to it
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let counts: MistakeMap = storage::load_or_default(store.as_ref(), MISTAKES_KEY);
        debug!(chars = counts.len(), "loaded mistake ledger");
        Self {
            counts,
            store: Some(store),
        }
    }

    /// Merge one session's mistakes into the ledger
    pub fn record(&mut self, mistakes: &MistakeMap) {
        if mistakes.is_empty() {
            return;
        }

        for (&c, &count) in mistakes {
            *self.counts.entry(c).or_insert(0) += count;
        }
        self.persist();
    }

    /// Up to `n` characters by descending cumulative count; equal counts keep
    /// character order
    pub fn top_difficult(&self, n: usize) -> Vec<char> {
        self.counts
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1))
            .take(n)
            .map(|(&c, _)| c)
            .collect()
    }

    pub fn count(&self, c: char) -> u32 {
        self.counts.get(&c).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &MistakeMap {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Forget every recorded mistake
    pub fn reset(&mut self) {
        self.counts.clear();
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            storage::save(store.as_ref(), MISTAKES_KEY, &self.counts);
        }
    }
}

impl fmt::Debug for MistakeLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistakeLedger")
            .field("counts", &self.counts)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
