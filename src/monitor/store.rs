//! In-memory mirror of the monitored pods.
//!
//! The map is never mutated in place. Each poll cycle builds a fresh
//! [`PodMap`] and publishes it with [`StateStore::replace`], which swaps the
//! shared pointer in one step. Readers clone the current `Arc` and work on a
//! consistent cycle for as long as they hold it.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::model::{PodPhase, PodRecord};

/// Pods keyed by `namespace/name`
pub type PodMap = BTreeMap<String, PodRecord>;

struct Published {
    pods: Arc<PodMap>,
    at: DateTime<Utc>,
}

pub struct StateStore {
    current: RwLock<Published>,
}

/// Per-phase counts over one published map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    pub total: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Published {
                pods: Arc::new(PodMap::new()),
                at: Utc::now(),
            }),
        }
    }

    /// Publish a complete new cycle. Returns the previous pod count.
    pub fn replace(&self, pods: PodMap) -> usize {
        let next = Published {
            pods: Arc::new(pods),
            at: Utc::now(),
        };
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *current, next);
        previous.pods.len()
    }

    /// The currently published map
    pub fn snapshot(&self) -> Arc<PodMap> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pods
            .clone()
    }

    /// When the current map was published
    pub fn last_update(&self) -> DateTime<Utc> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).at
    }

    pub fn all_pods(&self) -> Vec<PodRecord> {
        self.snapshot().values().cloned().collect()
    }

    pub fn pods_in_namespace(&self, namespace: &str) -> Vec<PodRecord> {
        self.snapshot()
            .values()
            .filter(|pod| pod.namespace == namespace)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear scan over the current map, nothing cached
    pub fn phase_counts(&self) -> PhaseCounts {
        let pods = self.snapshot();
        pods.values().fold(
            PhaseCounts {
                total: pods.len(),
                ..Default::default()
            },
            |mut counts, pod| {
                match pod.phase {
                    PodPhase::Running => counts.running += 1,
                    PodPhase::Pending => counts.pending += 1,
                    PodPhase::Failed => counts.failed += 1,
                    PodPhase::Succeeded | PodPhase::Unknown => {}
                }
                counts
            },
        )
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
