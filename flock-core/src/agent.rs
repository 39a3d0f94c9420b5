//! # Agent - One Boid of the Flock
//!
//! An agent is a position plus an orientation, nothing more. All steering
//! state is recomputed from scratch every tick by the kernel, so the record
//! stays small enough to round-trip through the device buffer each frame.
//!
//! ## Memory Layout (device-shared)
//!
//! `#[repr(C)]` with exactly seven packed `f32`s — a 28-byte stride with no
//! padding. The compute kernel declares the same record as seven scalar
//! members; declaring `vec3`/`vec4` there would introduce 16-byte alignment
//! and silently break the stride contract.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SPAWN_EXTENT;

/// One simulated boid (device-transferable, 28 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Agent {
    /// World-space position
    pub position: [f32; 3],

    /// Orientation quaternion, stored as raw (x, y, z, w) components.
    /// The host never normalizes; the kernel renormalizes after integration.
    pub rotation: [f32; 4],
}

impl Agent {
    /// Create an agent from explicit components.
    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Spawn an agent with a uniform random position inside the
    /// ±[`SPAWN_EXTENT`] cube and a uniform random orientation.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            position: [
                rng.gen_range(-SPAWN_EXTENT..SPAWN_EXTENT),
                rng.gen_range(-SPAWN_EXTENT..SPAWN_EXTENT),
                rng.gen_range(-SPAWN_EXTENT..SPAWN_EXTENT),
            ],
            rotation: random_unit_quaternion(rng),
        }
    }

    /// Position as a vector.
    pub fn position_vec(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Orientation as a quaternion.
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_array(self.rotation)
    }

    /// The direction this agent flies in: local +Z rotated into world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Z
    }
}

/// Uniform random unit quaternion (Shoemake's subgroup algorithm).
fn random_unit_quaternion(rng: &mut impl Rng) -> [f32; 4] {
    use std::f32::consts::TAU;

    let u1: f32 = rng.gen();
    let u2: f32 = rng.gen::<f32>() * TAU;
    let u3: f32 = rng.gen::<f32>() * TAU;

    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    [a * u2.sin(), a * u2.cos(), b * u3.sin(), b * u3.cos()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AGENT_STRIDE;

    #[test]
    fn agent_matches_device_stride() {
        assert_eq!(std::mem::size_of::<Agent>(), AGENT_STRIDE);
        // Pod guarantees no uninit padding, but the stride check above is the
        // contract the kernel relies on.
        assert_eq!(std::mem::align_of::<Agent>(), 4);
    }

    #[test]
    fn random_agents_spawn_inside_cube_with_unit_rotation() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let agent = Agent::random(&mut rng);
            for c in agent.position {
                assert!(c.abs() <= SPAWN_EXTENT);
            }
            let norm = agent.rotation_quat().length();
            assert!((norm - 1.0).abs() < 1e-5, "quaternion norm {norm}");
        }
    }

    #[test]
    fn identity_rotation_flies_along_z() {
        let agent = Agent::new([0.0; 3], [0.0, 0.0, 0.0, 1.0]);
        assert!((agent.forward() - Vec3::Z).length() < 1e-6);
    }
}
