//! # AgentStore - The Canonical Population
//!
//! Owns the host-side agent array. Every population change goes through
//! [`AgentStore::resize`], which returns the index diff the external
//! entity-lifecycle collaborator needs; the store itself never creates or
//! destroys render objects.
//!
//! The device mirror of this array lives behind the
//! [`FlockBackend`](flock_core::FlockBackend) seam — the store is pure host
//! state, which keeps resizing testable without a device.

use flock_core::params::COUNT_RANGE;
use flock_core::{Agent, PopulationDelta};

/// Host-side agent array with clamped, diff-reporting resize.
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    /// Create a store with `count` randomly spawned agents.
    /// The count is clamped to the supported population range.
    pub fn new(count: u32) -> Self {
        let mut store = Self { agents: Vec::new() };
        store.resize(count);
        store
    }

    /// Create a store from an explicit population, clamping its length into
    /// the supported range. Useful for tests and for restoring a formation.
    pub fn from_agents(mut agents: Vec<Agent>) -> Self {
        let max = *COUNT_RANGE.end() as usize;
        agents.truncate(max);
        if agents.is_empty() {
            let mut rng = rand::thread_rng();
            agents.push(Agent::random(&mut rng));
        }
        Self { agents }
    }

    /// Resize the population to `new_count` (clamped).
    ///
    /// Shrinking truncates — surviving indices keep their agents unchanged.
    /// Growing appends freshly randomized agents. Either way the returned
    /// [`PopulationDelta`] tells the collaborator which entity indices to
    /// destroy or create.
    pub fn resize(&mut self, new_count: u32) -> PopulationDelta {
        let new_count = new_count.clamp(*COUNT_RANGE.start(), *COUNT_RANGE.end()) as usize;
        let old_count = self.agents.len();

        if new_count == old_count {
            return PopulationDelta::unchanged(old_count);
        }

        if new_count < old_count {
            self.agents.truncate(new_count);
            return PopulationDelta {
                retained: new_count,
                removed: new_count..old_count,
                added: 0..0,
            };
        }

        let mut rng = rand::thread_rng();
        self.agents
            .extend((old_count..new_count).map(|_| Agent::random(&mut rng)));
        PopulationDelta {
            retained: old_count,
            removed: 0..0,
            added: old_count..new_count,
        }
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// The store is never empty — the minimum population is 1.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Read-only view of the population, safe to hand to the render-sync
    /// collaborator between steps.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Mutable view for the per-frame readback.
    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_tracks_requested_count() {
        let mut store = AgentStore::new(25);
        for n in [1u32, 2, 64, 65, 100, 1500, 3000] {
            store.resize(n);
            assert_eq!(store.len(), n as usize);
        }
    }

    #[test]
    fn resize_clamps_to_supported_range() {
        let mut store = AgentStore::new(10);
        store.resize(0);
        assert_eq!(store.len(), 1);
        store.resize(5000);
        assert_eq!(store.len(), 3000);
    }

    #[test]
    fn shrink_retains_leading_agents_and_reports_removals() {
        let mut store = AgentStore::new(10);
        let before: Vec<Agent> = store.agents().to_vec();

        let delta = store.resize(4);

        assert_eq!(store.len(), 4);
        assert_eq!(delta.retained, 4);
        assert_eq!(delta.removed, 4..10);
        assert!(delta.added.is_empty());
        for i in 0..4 {
            assert_eq!(store.agents()[i], before[i]);
        }
    }

    #[test]
    fn grow_keeps_existing_agents_and_reports_additions() {
        let mut store = AgentStore::new(4);
        let before: Vec<Agent> = store.agents().to_vec();

        let delta = store.resize(10);

        assert_eq!(store.len(), 10);
        assert_eq!(delta.retained, 4);
        assert!(delta.removed.is_empty());
        assert_eq!(delta.added, 4..10);
        for i in 0..4 {
            assert_eq!(store.agents()[i], before[i]);
        }
    }

    #[test]
    fn resize_to_same_count_is_a_no_op() {
        let mut store = AgentStore::new(8);
        let before: Vec<Agent> = store.agents().to_vec();
        let delta = store.resize(8);
        assert!(delta.is_empty());
        assert_eq!(store.agents(), &before[..]);
    }

    #[test]
    fn from_agents_clamps_length() {
        let agent = Agent::new([0.0; 3], [0.0, 0.0, 0.0, 1.0]);
        let store = AgentStore::from_agents(vec![agent; 4000]);
        assert_eq!(store.len(), 3000);

        let store = AgentStore::from_agents(Vec::new());
        assert_eq!(store.len(), 1);
    }
}
