//! # FlockSimulator - Per-Frame Orchestration
//!
//! Drives the kernel dispatch and owns the reconfiguration state machine.
//!
//! Reconfiguration is a single inspectable transition between two states:
//!
//! - **Stale**: something other than `delta_time` changed since the last
//!   dispatch, or no device buffer exists yet. Entered on construction, on
//!   resize, and on every tunable setter.
//! - **Configured**: the buffer exists and all non-time parameters are
//!   current on the device.
//!
//! The Stale → Configured transition happens at the start of the next
//! [`step`](FlockSimulator::step): full upload, parameter push, work-group
//! partition. It runs exactly once per stale period, never per frame.

use flock_core::params::{clamp_weight, VIEW_DISTANCE_RANGE};
use flock_core::{
    Agent, FlockBackend, FlockError, FlockResult, PopulationDelta, RenderSync, SimulationParams,
};

use crate::store::AgentStore;

/// Reconfiguration states of the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    /// Device must be fully reconfigured before the next dispatch
    Stale,
    /// Buffer exists and non-time parameters are current
    Configured,
}

/// The simulation engine: canonical population, active backend, tunables.
pub struct FlockSimulator {
    store: AgentStore,
    params: SimulationParams,
    backend: Box<dyn FlockBackend>,
    state: SimState,

    /// Completed Stale → Configured transitions. Observable so tests can
    /// pin down that reconfiguration happens once per stale period.
    reconfigures: u64,
}

impl FlockSimulator {
    /// Create a simulator with a randomly spawned population of
    /// `params.count` agents.
    pub fn new(mut params: SimulationParams, backend: Box<dyn FlockBackend>) -> Self {
        params.sanitize();
        let store = AgentStore::new(params.count);
        tracing::info!(
            agents = store.len(),
            backend = backend.name(),
            "flock simulator created"
        );
        Self {
            store,
            params,
            backend,
            state: SimState::Stale,
            reconfigures: 0,
        }
    }

    /// Create a simulator from an explicit population (tests, restores).
    /// `params.count` is overwritten by the actual population size.
    pub fn with_agents(
        mut params: SimulationParams,
        backend: Box<dyn FlockBackend>,
        agents: Vec<Agent>,
    ) -> Self {
        params.sanitize();
        let store = AgentStore::from_agents(agents);
        params.count = store.len() as u32;
        Self {
            store,
            params,
            backend,
            state: SimState::Stale,
            reconfigures: 0,
        }
    }

    /// Advance the simulation by `delta_time` seconds.
    ///
    /// Always callable, regardless of state. When stale, the device is
    /// reconfigured first; a transient allocation failure skips this frame
    /// and will be retried on the next call instead of crashing the loop.
    /// After a successful step the host array is current and exposed via
    /// [`agents`](Self::agents) / [`sync_transforms`](Self::sync_transforms).
    pub fn step(&mut self, delta_time: f32) -> FlockResult<()> {
        if self.state == SimState::Stale {
            match self
                .backend
                .configure(self.store.agents(), &self.params)
            {
                Ok(()) => {
                    self.state = SimState::Configured;
                    self.reconfigures += 1;
                }
                Err(FlockError::Allocation(msg)) => {
                    tracing::warn!("device allocation failed, retrying next frame: {msg}");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        self.backend.advance(delta_time)?;
        self.backend.readback(self.store.agents_mut())?;
        Ok(())
    }

    /// Feed every agent's transform to the render-sync collaborator.
    pub fn sync_transforms(&self, sink: &mut dyn RenderSync) {
        for (index, agent) in self.store.agents().iter().enumerate() {
            sink.apply_transform(index, agent.position, agent.rotation);
        }
    }

    /// Read-only view of the population. Must not be mutated externally
    /// between steps; the backend owns the authoritative copy in between.
    pub fn agents(&self) -> &[Agent] {
        self.store.agents()
    }

    /// Current parameter set.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Current reconfiguration state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Number of completed device reconfigurations.
    pub fn reconfigure_count(&self) -> u64 {
        self.reconfigures
    }

    /// Drop device resources. The next step reconfigures from scratch.
    pub fn release(&mut self) {
        self.backend.release();
        self.state = SimState::Stale;
    }

    // --- configuration surface -------------------------------------------
    //
    // Every setter clamps to its documented range, stores, and marks the
    // simulator stale. None of them dispatches.

    pub fn count(&self) -> u32 {
        self.params.count
    }

    /// Resize the population, clamped to [1, 3000]. Returns the index diff
    /// for the entity-lifecycle collaborator.
    pub fn set_count(&mut self, count: u32) -> PopulationDelta {
        let delta = self.store.resize(count);
        self.params.count = self.store.len() as u32;
        self.state = SimState::Stale;
        delta
    }

    pub fn view_distance(&self) -> f32 {
        self.params.view_distance
    }

    /// Set the perception radius, clamped to [5, 20].
    pub fn set_view_distance(&mut self, view_distance: f32) {
        self.params.view_distance =
            view_distance.clamp(*VIEW_DISTANCE_RANGE.start(), *VIEW_DISTANCE_RANGE.end());
        self.state = SimState::Stale;
    }

    pub fn avoid_fraction(&self) -> f32 {
        self.params.avoid_fraction
    }

    /// Set the separation fraction of the view distance, clamped to [0, 1].
    pub fn set_avoid_fraction(&mut self, fraction: f32) {
        self.params.avoid_fraction = clamp_weight(fraction);
        self.state = SimState::Stale;
    }

    pub fn avoidance_weight(&self) -> f32 {
        self.params.avoidance_weight
    }

    /// Set the separation weight, clamped to [0, 1].
    pub fn set_avoidance_weight(&mut self, weight: f32) {
        self.params.avoidance_weight = clamp_weight(weight);
        self.state = SimState::Stale;
    }

    pub fn alignment_weight(&self) -> f32 {
        self.params.alignment_weight
    }

    /// Set the alignment weight, clamped to [0, 1].
    pub fn set_alignment_weight(&mut self, weight: f32) {
        self.params.alignment_weight = clamp_weight(weight);
        self.state = SimState::Stale;
    }

    pub fn cohesion_weight(&self) -> f32 {
        self.params.cohesion_weight
    }

    /// Set the cohesion weight, clamped to [0, 1].
    pub fn set_cohesion_weight(&mut self, weight: f32) {
        self.params.cohesion_weight = clamp_weight(weight);
        self.state = SimState::Stale;
    }
}

impl Drop for FlockSimulator {
    fn drop(&mut self) {
        self.backend.release();
    }
}
