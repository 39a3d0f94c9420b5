//! # CPU Backend
//!
//! Parallel steering evaluation using Rayon.
//!
//! This backend is the reference semantics of the kernel: the WGSL compute
//! shader in the GPU backend is a transliteration of [`steer`]. It is used
//! when no adapter is available and by the deterministic tests.
//!
//! Each worker reads a snapshot of the previous tick and writes only its own
//! agent's slot — the same no-race discipline as the device kernel, and
//! bitwise-reproducible for fixed inputs.

use glam::{Quat, Vec3};
use rayon::prelude::*;

use flock_core::{Agent, FlockBackend, FlockError, FlockResult, SimulationParams};

/// Below this squared length a steering vector is treated as zero.
const STEER_EPSILON: f32 = 1e-12;

/// Below this angle (radians) no rotation is applied.
const ANGLE_EPSILON: f32 = 1e-4;

/// CPU compute backend using Rayon
pub struct CpuBackend {
    /// Mirror of the host array, playing the role of the device buffer
    agents: Vec<Agent>,

    /// Parameters pushed at the last configure
    params: SimulationParams,

    configured: bool,
}

impl CpuBackend {
    /// Create a new CPU backend
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            params: SimulationParams::default(),
            configured: false,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FlockBackend for CpuBackend {
    fn configure(&mut self, agents: &[Agent], params: &SimulationParams) -> FlockResult<()> {
        self.agents.clear();
        self.agents.extend_from_slice(agents);
        self.params = params.clone();
        self.configured = true;
        tracing::debug!(agents = agents.len(), "cpu backend configured");
        Ok(())
    }

    fn advance(&mut self, delta_time: f32) -> FlockResult<()> {
        if !self.configured {
            return Err(FlockError::device("advance before configure"));
        }

        let snapshot = self.agents.clone();
        let params = &self.params;
        self.agents
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, agent)| {
                *agent = steer(index, &snapshot, params, delta_time);
            });
        Ok(())
    }

    fn readback(&mut self, agents: &mut [Agent]) -> FlockResult<()> {
        if agents.len() != self.agents.len() {
            return Err(FlockError::device(format!(
                "readback size mismatch: host {} vs mirror {}",
                agents.len(),
                self.agents.len()
            )));
        }
        agents.copy_from_slice(&self.agents);
        Ok(())
    }

    fn release(&mut self) {
        self.agents.clear();
        self.configured = false;
    }

    fn name(&self) -> &'static str {
        "CPU (rayon)"
    }
}

/// One tick of the steering rules for the agent at `index`.
///
/// Mirrors the device kernel exactly: brute-force scan of all other agents,
/// simple unweighted per-rule averages, bounded rotation toward the combined
/// heading, then integration along the new forward vector. An agent with no
/// neighbor in view applies no steering and flies straight.
pub(crate) fn steer(
    index: usize,
    agents: &[Agent],
    params: &SimulationParams,
    delta_time: f32,
) -> Agent {
    let agent = agents[index];
    let pos = agent.position_vec();
    let mut rot = agent.rotation_quat();
    let fwd = rot * Vec3::Z;

    let avoid_dist = params.avoid_distance();
    let mut separation = Vec3::ZERO;
    let mut heading = Vec3::ZERO;
    let mut center = Vec3::ZERO;
    let mut neighbors = 0u32;

    for (j, other) in agents.iter().enumerate() {
        if j == index {
            continue;
        }
        let other_pos = other.position_vec();
        let offset = other_pos - pos;
        let dist = offset.length();
        if dist < params.view_distance {
            neighbors += 1;
            heading += other.rotation_quat() * Vec3::Z;
            center += other_pos;
            if dist < avoid_dist {
                separation -= offset;
            }
        }
    }

    if neighbors > 0 {
        let inv = 1.0 / neighbors as f32;
        let desired = separation * inv * params.avoidance_weight
            + heading * inv * params.alignment_weight
            + (center * inv - pos) * params.cohesion_weight;

        if desired.length_squared() > STEER_EPSILON {
            let goal = desired.normalize();
            let angle = fwd.dot(goal).clamp(-1.0, 1.0).acos();
            if angle > ANGLE_EPSILON {
                let turn = angle.min(params.rotation_speed * delta_time);
                let mut axis = fwd.cross(goal);
                if axis.length_squared() < STEER_EPSILON {
                    // goal is opposite the current heading; any orthogonal
                    // axis serves
                    axis = fwd.cross(Vec3::Y);
                    if axis.length_squared() < 1e-6 {
                        axis = fwd.cross(Vec3::X);
                    }
                }
                rot = (Quat::from_axis_angle(axis.normalize(), turn) * rot).normalize();
            }
        }
    }

    let new_fwd = rot * Vec3::Z;
    Agent {
        position: (pos + new_fwd * params.speed * delta_time).to_array(),
        rotation: rot.to_array(),
    }
}
