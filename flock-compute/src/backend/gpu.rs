//! # GPU Backend
//!
//! Steering evaluation on the GPU using wgpu 28.
//!
//! The agent array lives in a single storage buffer of packed 28-byte
//! records — the same bytes as the host `Agent` struct. Static parameters go
//! in one uniform buffer written at configure time; `delta_time` has its own
//! tiny uniform written every frame, so the per-frame cost is one 4-byte
//! write, one dispatch and one readback.
//!
//! Allocation failures are caught with an `OutOfMemory` error scope and
//! surfaced as recoverable [`FlockError::Allocation`]; pipeline and entry
//! point problems are caught with a `Validation` scope at construction and
//! are fatal.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use flock_core::{Agent, FlockBackend, FlockError, FlockResult, SimulationParams, AGENT_STRIDE};

use crate::WORKGROUP_SIZE;

/// Name of the kernel entry point, shared with the WGSL source below.
const KERNEL_ENTRY_POINT: &str = "main";

/// Static parameter block (matches the shader struct)
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct KernelParams {
    boid_count: u32,
    boid_speed: f32,
    boid_rot_speed: f32,
    viewing_dist: f32,
    avoid_dist: f32,
    avoidance_factor: f32,
    alignment_factor: f32,
    cohesion_factor: f32,
}

impl KernelParams {
    fn new(params: &SimulationParams, count: usize) -> Self {
        Self {
            boid_count: count as u32,
            boid_speed: params.speed,
            boid_rot_speed: params.rotation_speed,
            viewing_dist: params.view_distance,
            avoid_dist: params.avoid_distance(),
            avoidance_factor: params.avoidance_weight,
            alignment_factor: params.alignment_weight,
            cohesion_factor: params.cohesion_weight,
        }
    }
}

/// Per-frame block, rewritten before every dispatch
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct FrameParams {
    delta_time: f32,
}

/// GPU compute backend using wgpu
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,

    /// Uniform for the static parameter block
    params_buffer: wgpu::Buffer,
    /// Uniform for `delta_time`
    frame_buffer: wgpu::Buffer,

    /// Device mirror of the agent array; recreated whenever capacity changes
    agents_buffer: Option<wgpu::Buffer>,
    /// Staging twin for readback
    staging_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,

    /// Agents the current buffers were allocated for
    capacity: usize,
    /// Work groups per dispatch: ceil(capacity / WORKGROUP_SIZE)
    group_count: u32,
}

impl GpuBackend {
    /// Create a new GPU backend.
    ///
    /// Fails with [`FlockError::Device`] when no adapter is available and
    /// with [`FlockError::Configuration`] when the kernel does not validate
    /// — the latter is a deployment error and should abort startup.
    pub fn new() -> FlockResult<Self> {
        // The stride is a wire contract; refuse to start if the host record
        // ever stops matching it.
        if std::mem::size_of::<Agent>() != AGENT_STRIDE {
            return Err(FlockError::configuration(format!(
                "Agent stride {} does not match device layout {}",
                std::mem::size_of::<Agent>(),
                AGENT_STRIDE
            )));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| FlockError::device(format!("No suitable GPU adapter found: {}", e)))?;

        let info = adapter.get_info();
        tracing::info!(
            "🎮 GPU: {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Flock GPU"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .map_err(|e| FlockError::device(format!("Failed to create device: {}", e)))?;

        // Shader and pipeline under a validation scope: a missing or
        // incompatible entry point must abort startup, not surface later.
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Boid Steering Shader"),
            source: wgpu::ShaderSource::Wgsl(BOID_STEERING_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flock Bind Group Layout"),
            entries: &[
                // Agent records (read-write storage)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(AGENT_STRIDE as u64),
                    },
                    count: None,
                },
                // Static parameters (uniform)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<KernelParams>() as u64,
                        ),
                    },
                    count: None,
                },
                // Per-frame delta time (uniform)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<FrameParams>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flock Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Boid Steering Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(KERNEL_ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(e) = pollster::block_on(error_scope.pop()) {
            return Err(FlockError::configuration(format!(
                "Kernel entry point '{}' failed to resolve: {}",
                KERNEL_ENTRY_POINT, e
            )));
        }

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Params"),
            size: std::mem::size_of::<KernelParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Params"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pipeline,
            bind_group_layout,
            params_buffer,
            frame_buffer,
            agents_buffer: None,
            staging_buffer: None,
            bind_group: None,
            capacity: 0,
            group_count: 0,
        })
    }

    /// (Re)create the agent storage buffer and its staging twin for
    /// `count` agents. No partial state survives a failed allocation.
    fn realloc_buffers(&mut self, count: usize) -> FlockResult<()> {
        // Any previous allocation is released before the new one is made.
        self.bind_group = None;
        self.agents_buffer = None;
        self.staging_buffer = None;

        let size = (count * AGENT_STRIDE) as u64;
        tracing::debug!(agents = count, bytes = size, "🎮 allocating agent buffers");

        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let agents_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Records"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(e) = pollster::block_on(error_scope.pop()) {
            self.capacity = 0;
            self.group_count = 0;
            return Err(FlockError::allocation(format!(
                "Could not reserve {} bytes of device memory: {}",
                size * 2,
                e
            )));
        }

        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flock Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: agents_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.frame_buffer.as_entire_binding(),
                },
            ],
        }));

        self.agents_buffer = Some(agents_buffer);
        self.staging_buffer = Some(staging_buffer);
        self.capacity = count;
        self.group_count = (count as u32 + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        Ok(())
    }
}

impl FlockBackend for GpuBackend {
    fn configure(&mut self, agents: &[Agent], params: &SimulationParams) -> FlockResult<()> {
        // A capacity change invalidates the whole allocation; there is no
        // partial resize.
        if self.capacity != agents.len() || self.agents_buffer.is_none() {
            self.realloc_buffers(agents.len())?;
        }

        let buffer = self
            .agents_buffer
            .as_ref()
            .ok_or_else(|| FlockError::device("Agent buffer not initialized"))?;
        self.queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(agents));

        let kernel_params = KernelParams::new(params, agents.len());
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&kernel_params));

        tracing::debug!(
            agents = agents.len(),
            groups = self.group_count,
            "🎮 device reconfigured"
        );
        Ok(())
    }

    fn advance(&mut self, delta_time: f32) -> FlockResult<()> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| FlockError::device("advance before configure"))?;

        let frame = FrameParams { delta_time };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Steering Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Steering Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(self.group_count, 1, 1);
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn readback(&mut self, agents: &mut [Agent]) -> FlockResult<()> {
        let agents_buffer = self
            .agents_buffer
            .as_ref()
            .ok_or_else(|| FlockError::device("Agent buffer not initialized"))?;
        let staging_buffer = self
            .staging_buffer
            .as_ref()
            .ok_or_else(|| FlockError::device("Staging buffer not initialized"))?;
        if agents.len() != self.capacity {
            return Err(FlockError::device(format!(
                "readback size mismatch: host {} vs device {}",
                agents.len(),
                self.capacity
            )));
        }

        let size = (agents.len() * AGENT_STRIDE) as u64;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(agents_buffer, 0, staging_buffer, 0, size);
        self.queue.submit(Some(encoder.finish()));

        // The single synchronization point of the frame: block until the
        // dispatch has finished and the copy is mappable.
        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });

        rx.recv()
            .map_err(|e| FlockError::device(format!("Failed to receive map result: {}", e)))?
            .map_err(|e| FlockError::device(format!("Failed to map staging buffer: {:?}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            let device_agents: &[Agent] = bytemuck::cast_slice(&data);
            agents.copy_from_slice(&device_agents[..agents.len()]);
        }

        staging_buffer.unmap();
        Ok(())
    }

    fn release(&mut self) {
        self.bind_group = None;
        self.agents_buffer = None;
        self.staging_buffer = None;
        self.capacity = 0;
        self.group_count = 0;
    }

    fn name(&self) -> &'static str {
        "GPU (wgpu)"
    }
}

// ============================================================================
// WGSL Shader
// ============================================================================

/// Boid steering compute shader.
///
/// The Boid record is seven scalar f32 members on purpose: vec3/vec4 members
/// would be 16-byte aligned and break the packed 28-byte stride shared with
/// the host. Semantics mirror `backend::cpu::steer` one for one.
pub const BOID_STEERING_SHADER: &str = r#"
// Boid steering: separation, alignment, cohesion over an all-pairs scan.
// Each invocation owns one agent: it reads the whole previous-tick array
// and writes only its own slot.

struct Boid {
    px: f32, py: f32, pz: f32,
    qx: f32, qy: f32, qz: f32, qw: f32,
}

struct Params {
    boid_count: u32,
    boid_speed: f32,
    boid_rot_speed: f32,
    viewing_dist: f32,
    avoid_dist: f32,
    avoidance_factor: f32,
    alignment_factor: f32,
    cohesion_factor: f32,
}

struct Frame {
    delta_time: f32,
}

@group(0) @binding(0) var<storage, read_write> boids: array<Boid>;
@group(0) @binding(1) var<uniform> params: Params;
@group(0) @binding(2) var<uniform> frame: Frame;

fn boid_position(b: Boid) -> vec3<f32> {
    return vec3<f32>(b.px, b.py, b.pz);
}

fn boid_rotation(b: Boid) -> vec4<f32> {
    return vec4<f32>(b.qx, b.qy, b.qz, b.qw);
}

fn quat_rotate(q: vec4<f32>, v: vec3<f32>) -> vec3<f32> {
    let t = 2.0 * cross(q.xyz, v);
    return v + q.w * t + cross(q.xyz, t);
}

fn quat_mul(a: vec4<f32>, b: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(
        a.w * b.xyz + b.w * a.xyz + cross(a.xyz, b.xyz),
        a.w * b.w - dot(a.xyz, b.xyz),
    );
}

fn quat_axis_angle(axis: vec3<f32>, angle: f32) -> vec4<f32> {
    let h = 0.5 * angle;
    return vec4<f32>(axis * sin(h), cos(h));
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let index = id.x;
    if index >= params.boid_count {
        return;
    }

    var boid = boids[index];
    let pos = boid_position(boid);
    var rot = boid_rotation(boid);
    let fwd = quat_rotate(rot, vec3<f32>(0.0, 0.0, 1.0));

    var separation = vec3<f32>(0.0);
    var heading = vec3<f32>(0.0);
    var center = vec3<f32>(0.0);
    var neighbors = 0u;

    for (var j = 0u; j < params.boid_count; j++) {
        if j == index {
            continue;
        }
        let other = boids[j];
        let other_pos = boid_position(other);
        let offset = other_pos - pos;
        let dist = length(offset);
        if dist < params.viewing_dist {
            neighbors += 1u;
            heading += quat_rotate(boid_rotation(other), vec3<f32>(0.0, 0.0, 1.0));
            center += other_pos;
            if dist < params.avoid_dist {
                separation -= offset;
            }
        }
    }

    if neighbors > 0u {
        let inv = 1.0 / f32(neighbors);
        let desired = separation * inv * params.avoidance_factor
            + heading * inv * params.alignment_factor
            + (center * inv - pos) * params.cohesion_factor;

        if dot(desired, desired) > 1e-12 {
            let goal = normalize(desired);
            let angle = acos(clamp(dot(fwd, goal), -1.0, 1.0));
            if angle > 1e-4 {
                let turn = min(angle, params.boid_rot_speed * frame.delta_time);
                var axis = cross(fwd, goal);
                if dot(axis, axis) < 1e-12 {
                    // goal opposite the heading: any orthogonal axis serves
                    axis = cross(fwd, vec3<f32>(0.0, 1.0, 0.0));
                    if dot(axis, axis) < 1e-6 {
                        axis = cross(fwd, vec3<f32>(1.0, 0.0, 0.0));
                    }
                }
                rot = normalize(quat_mul(quat_axis_angle(normalize(axis), turn), rot));
            }
        }
    }

    let new_fwd = quat_rotate(rot, vec3<f32>(0.0, 0.0, 1.0));
    let new_pos = pos + new_fwd * params.boid_speed * frame.delta_time;

    boid.px = new_pos.x;
    boid.py = new_pos.y;
    boid.pz = new_pos.z;
    boid.qx = rot.x;
    boid.qy = rot.y;
    boid.qz = rot.z;
    boid.qw = rot.w;
    boids[index] = boid;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_params_size_matches_uniform_block() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 32);
        assert_eq!(std::mem::size_of::<FrameParams>(), 4);
    }

    #[test]
    fn gpu_backend_creation() {
        let result = GpuBackend::new();
        if result.is_err() {
            println!("GPU not available: {:?}", result.err());
        }
    }
}
