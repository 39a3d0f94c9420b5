//! # Traits - Boundary Contracts of the Simulation Core
//!
//! Two seams separate the core from the world around it:
//!
//! - [`FlockBackend`]: where the steering kernel runs. The GPU backend is
//!   the reference device; the CPU backend implements identical semantics
//!   for fallback and deterministic testing.
//! - [`RenderSync`]: how updated transforms leave the core. The core never
//!   touches a renderable entity itself — it hands `(index, position,
//!   rotation)` across this trait and lets the collaborator apply it.
//!
//! Population changes are communicated as an explicit diff
//! ([`PopulationDelta`]) rather than by the core creating or destroying
//! entities in lockstep with its own array.

use std::ops::Range;

use crate::agent::Agent;
use crate::error::FlockResult;
use crate::params::SimulationParams;

/// Compute backend trait - abstraction over where the kernel executes.
///
/// The three operations mirror the per-frame protocol: a full
/// reconfiguration when parameters or population changed, a cheap per-frame
/// advance, and a blocking readback that is the single synchronization
/// point of the frame.
pub trait FlockBackend: Send {
    /// (Re)allocate the device mirror for `agents`, upload the full array,
    /// and push every non-time parameter.
    ///
    /// Called once per stale period, not every frame — this is the
    /// expensive path. A failed allocation returns
    /// [`FlockError::Allocation`](crate::FlockError::Allocation) and leaves
    /// no partial buffer bound.
    fn configure(&mut self, agents: &[Agent], params: &SimulationParams) -> FlockResult<()>;

    /// Push `delta_time` and run the steering kernel over the whole
    /// population once.
    fn advance(&mut self, delta_time: f32) -> FlockResult<()>;

    /// Copy the device mirror back into `agents`, index for index.
    /// Blocks until the dispatch has finished; the host array is not
    /// current until this returns.
    fn readback(&mut self, agents: &mut [Agent]) -> FlockResult<()>;

    /// Drop all device resources. Safe to call more than once; also invoked
    /// implicitly when the backend is dropped.
    fn release(&mut self);

    /// Name of this backend (for logging)
    fn name(&self) -> &'static str;
}

/// Render-sync collaborator: receives one transform per agent after each
/// simulation step.
pub trait RenderSync {
    /// Apply the transform of the agent at `index`.
    fn apply_transform(&mut self, index: usize, position: [f32; 3], rotation: [f32; 4]);
}

/// Index diff produced by a population resize.
///
/// Agent indices are stable only between resizes; the collaborator keyed by
/// index must destroy entities for `removed` and create them for `added`
/// before the next frame's transforms arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopulationDelta {
    /// Number of leading indices that kept their agent unchanged
    pub retained: usize,

    /// Indices whose agents were dropped (empty when growing)
    pub removed: Range<usize>,

    /// Indices whose agents are newly spawned (empty when shrinking)
    pub added: Range<usize>,
}

impl PopulationDelta {
    /// A resize that changed nothing.
    pub fn unchanged(count: usize) -> Self {
        Self {
            retained: count,
            removed: 0..0,
            added: 0..0,
        }
    }

    /// True when the resize neither added nor removed agents.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}
