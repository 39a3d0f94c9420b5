//! # Flock Compute
//!
//! The flock simulation engine: canonical agent storage, per-frame
//! orchestration, and the compute backends that evaluate the three steering
//! rules — separation, alignment, cohesion — over the whole population each
//! tick.
//!
//! Two backends share identical update semantics:
//! - **GPU**: wgpu compute shader, one work-item per agent (the reference
//!   device)
//! - **CPU**: Rayon, used as fallback and for deterministic tests
//!
//! ## Backend Selection
//!
//! Set the `FLOCK_BACKEND` environment variable:
//! - `cpu` - Force the CPU backend
//! - `gpu` - Force the GPU backend (fails hard without an adapter)
//! - `auto` (default) - Try the GPU, fall back to the CPU

pub mod backend;
pub mod simulator;
pub mod store;

pub use backend::{CpuBackend, GpuBackend};
pub use simulator::{FlockSimulator, SimState};
pub use store::AgentStore;

use flock_core::{BackendKind, FlockBackend, FlockResult};

/// Work-items per work-group on the dispatch axis. Must match the
/// `@workgroup_size` attribute in the steering shader.
pub const WORKGROUP_SIZE: u32 = 64;

/// Create the appropriate compute backend for `kind`.
pub fn create_backend(kind: BackendKind) -> FlockResult<Box<dyn FlockBackend>> {
    match kind {
        BackendKind::Auto => match GpuBackend::new() {
            Ok(gpu) => {
                tracing::info!("Using GPU backend (wgpu)");
                Ok(Box::new(gpu))
            }
            Err(e) => {
                tracing::warn!("GPU not available ({}), falling back to CPU", e);
                Ok(Box::new(CpuBackend::new()))
            }
        },
        BackendKind::Cpu => {
            tracing::info!("Using CPU backend (rayon)");
            Ok(Box::new(CpuBackend::new()))
        }
        BackendKind::Gpu => {
            tracing::info!("Using GPU backend (wgpu)");
            Ok(Box::new(GpuBackend::new()?))
        }
    }
}

/// Check if a GPU is available on this system.
pub fn gpu_available() -> bool {
    if std::env::var("FLOCK_FORCE_CPU").is_ok() {
        return false;
    }

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapters = pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));
    !adapters.is_empty()
}

/// Get information about available compute devices.
pub fn device_info() -> Vec<DeviceInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapters = pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));

    adapters
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            DeviceInfo {
                name: info.name,
                vendor: info.vendor.to_string(),
                device_type: format!("{:?}", info.device_type),
                backend: format!("{:?}", info.backend),
            }
        })
        .collect()
}

/// Information about a compute device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub device_type: String,
    pub backend: String,
}
