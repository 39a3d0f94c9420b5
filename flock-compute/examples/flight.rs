//! Headless flight demo.
//!
//! Steps the flock at a fixed 60 Hz tick and logs a population summary once
//! a second, standing in for the render loop of a real host application.
//!
//! Configure via environment: FLOCK_BACKEND=cpu|gpu|auto, FLOCK_COUNT=...

use flock_core::{BackendKind, RenderSync, SimulationParams};
use flock_compute::{create_backend, FlockSimulator};

/// Stand-in for the engine-side entity pool: tracks transforms by index.
struct TransformPool {
    transforms: Vec<([f32; 3], [f32; 4])>,
}

impl RenderSync for TransformPool {
    fn apply_transform(&mut self, index: usize, position: [f32; 3], rotation: [f32; 4]) {
        self.transforms[index] = (position, rotation);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let params = SimulationParams::from_env();
    let backend = create_backend(BackendKind::from_env())?;
    let mut sim = FlockSimulator::new(params, backend);

    let mut pool = TransformPool {
        transforms: vec![([0.0; 3], [0.0, 0.0, 0.0, 1.0]); sim.agents().len()],
    };

    let dt = 1.0 / 60.0;
    for frame in 0..600u32 {
        sim.step(dt)?;
        sim.sync_transforms(&mut pool);

        if frame % 60 == 0 {
            let agents = sim.agents();
            let center = agents.iter().fold([0.0f32; 3], |mut acc, a| {
                acc[0] += a.position[0];
                acc[1] += a.position[1];
                acc[2] += a.position[2];
                acc
            });
            let n = agents.len() as f32;
            tracing::info!(
                frame,
                agents = agents.len(),
                center = %format!("({:.1}, {:.1}, {:.1})", center[0] / n, center[1] / n, center[2] / n),
                "flock update"
            );
        }
    }

    tracing::info!(reconfigures = sim.reconfigure_count(), "flight complete");
    Ok(())
}
