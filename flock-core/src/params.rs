//! # Simulation Parameters
//!
//! The tunable scalar set pushed to the device on every reconfiguration.
//! Every parameter has a documented range; out-of-range input is clamped,
//! never rejected — callers observe the clamped effect, not an error.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Supported population range. The upper bound keeps device memory and
/// kernel occupancy bounded for the all-pairs scan.
pub const COUNT_RANGE: RangeInclusive<u32> = 1..=3000;

/// Supported view distance range, world units.
pub const VIEW_DISTANCE_RANGE: RangeInclusive<f32> = 5.0..=20.0;

/// Range shared by the avoid fraction and the three rule weights.
pub const WEIGHT_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Per-configuration parameter set for the flock simulation.
///
/// `delta_time` is deliberately absent: it changes every frame and is pushed
/// separately by the simulator, while everything here is only re-pushed when
/// the configuration actually changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Number of agents, clamped to [`COUNT_RANGE`]
    pub count: u32,

    /// Flight speed, world units per second
    pub speed: f32,

    /// Maximum turn rate, radians per second
    pub rotation_speed: f32,

    /// Neighbor perception radius, clamped to [`VIEW_DISTANCE_RANGE`]
    pub view_distance: f32,

    /// Fraction of the view distance inside which separation kicks in,
    /// clamped to [`WEIGHT_RANGE`]. The effective avoid distance is derived,
    /// never set directly, so it can never exceed the view distance.
    pub avoid_fraction: f32,

    /// Separation rule weight, clamped to [`WEIGHT_RANGE`]
    pub avoidance_weight: f32,

    /// Alignment rule weight, clamped to [`WEIGHT_RANGE`]
    pub alignment_weight: f32,

    /// Cohesion rule weight, clamped to [`WEIGHT_RANGE`]
    pub cohesion_weight: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            count: 25,
            speed: 10.0,
            rotation_speed: std::f32::consts::PI, // 180 deg/s
            view_distance: 10.0,
            avoid_fraction: 0.33,
            avoidance_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
        }
    }
}

impl SimulationParams {
    /// Radius inside which neighbors repel, derived from the view distance.
    pub fn avoid_distance(&self) -> f32 {
        self.view_distance * self.avoid_fraction
    }

    /// Set the turn rate from a degrees-per-second value.
    pub fn set_rotation_speed_degrees(&mut self, degrees: f32) {
        self.rotation_speed = degrees.to_radians();
    }

    /// Clamp every field into its documented range.
    pub fn sanitize(&mut self) {
        self.count = self.count.clamp(*COUNT_RANGE.start(), *COUNT_RANGE.end());
        self.view_distance = self
            .view_distance
            .clamp(*VIEW_DISTANCE_RANGE.start(), *VIEW_DISTANCE_RANGE.end());
        self.avoid_fraction = clamp_weight(self.avoid_fraction);
        self.avoidance_weight = clamp_weight(self.avoidance_weight);
        self.alignment_weight = clamp_weight(self.alignment_weight);
        self.cohesion_weight = clamp_weight(self.cohesion_weight);
        self.speed = self.speed.max(0.0);
        self.rotation_speed = self.rotation_speed.max(0.0);
    }

    /// Load parameters from a JSON file.
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut params: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        params.sanitize();
        Ok(params)
    }

    /// Save parameters to a JSON file.
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Create parameters from environment variables.
    ///
    /// Reads:
    /// - FLOCK_COUNT: population size (default: 25)
    /// - FLOCK_SPEED: flight speed (default: 10.0)
    /// - FLOCK_VIEW_DIST: perception radius (default: 10.0)
    pub fn from_env() -> Self {
        let mut params = Self::default();

        if let Some(v) = env_parse("FLOCK_COUNT") {
            params.count = v;
        }
        if let Some(v) = env_parse("FLOCK_SPEED") {
            params.speed = v;
        }
        if let Some(v) = env_parse("FLOCK_VIEW_DIST") {
            params.view_distance = v;
        }

        params.sanitize();
        params
    }
}

/// Clamp a normalized weight into [0, 1].
pub fn clamp_weight(value: f32) -> f32 {
    value.clamp(*WEIGHT_RANGE.start(), *WEIGHT_RANGE.end())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Where the steering kernel runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Try the GPU, fall back to the CPU
    Auto,
    /// CPU with Rayon parallelism
    Cpu,
    /// GPU with wgpu
    Gpu,
}

impl BackendKind {
    /// Read the preferred backend from FLOCK_BACKEND ("cpu", "gpu", "auto").
    pub fn from_env() -> Self {
        match std::env::var("FLOCK_BACKEND")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Ok("cpu") => Self::Cpu,
            Ok("gpu") => Self::Gpu,
            _ => Self::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let params = SimulationParams::default();
        assert_eq!(params.count, 25);
        assert_eq!(params.speed, 10.0);
        assert!((params.rotation_speed - std::f32::consts::PI).abs() < 1e-6);
        assert!((params.avoid_distance() - 3.3).abs() < 1e-5);
    }

    #[test]
    fn sanitize_clamps_every_field() {
        let mut params = SimulationParams {
            count: 5000,
            speed: -1.0,
            rotation_speed: -0.5,
            view_distance: 100.0,
            avoid_fraction: 1.5,
            avoidance_weight: 2.0,
            alignment_weight: -0.25,
            cohesion_weight: 0.5,
        };
        params.sanitize();
        assert_eq!(params.count, 3000);
        assert_eq!(params.speed, 0.0);
        assert_eq!(params.rotation_speed, 0.0);
        assert_eq!(params.view_distance, 20.0);
        assert_eq!(params.avoid_fraction, 1.0);
        assert_eq!(params.avoidance_weight, 1.0);
        assert_eq!(params.alignment_weight, 0.0);
        assert_eq!(params.cohesion_weight, 0.5);
    }

    #[test]
    fn avoid_distance_never_exceeds_view_distance() {
        let mut params = SimulationParams::default();
        params.avoid_fraction = 1.0;
        params.view_distance = 20.0;
        assert!(params.avoid_distance() <= params.view_distance);
    }

    #[test]
    fn degrees_setter_converts_to_radians() {
        let mut params = SimulationParams::default();
        params.set_rotation_speed_degrees(90.0);
        assert!((params.rotation_speed - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let params = SimulationParams {
            count: 100,
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let restored: SimulationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, restored);
    }
}
