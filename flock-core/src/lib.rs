//! # Flock Core
//!
//! Core types and traits for the flock simulation engine.
//!
//! This crate provides the fundamental building blocks:
//! - **Agent**: One flocking boid — a position and an orientation
//! - **SimulationParams**: The tunable parameter set marshaled to the device
//! - **FlockBackend**: Abstraction over where the steering kernel runs
//! - **RenderSync**: The seam through which updated transforms leave the core
//!
//! ## Memory Layout
//!
//! [`Agent`] uses `#[repr(C)]` for a predictable memory layout, enabling
//! direct device buffer mapping via `bytemuck`. Its 28-byte stride is a wire
//! contract shared with the compute kernel and must match on both sides.

pub mod agent;
pub mod error;
pub mod params;
pub mod traits;

// Re-export main types at crate root
pub use agent::Agent;
pub use error::{FlockError, FlockResult};
pub use params::{BackendKind, SimulationParams};
pub use traits::{FlockBackend, PopulationDelta, RenderSync};

/// Byte stride of one [`Agent`] record in the shared device buffer:
/// 7 packed 32-bit floats (3 position + 4 quaternion), no padding.
pub const AGENT_STRIDE: usize = 28;

/// Half-extent of the cube newly spawned agents are scattered in,
/// per axis, centered on the origin.
pub const SPAWN_EXTENT: f32 = 45.0;
