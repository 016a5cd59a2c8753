//! wgpu implementation of [`ComputeDevice`].
//!
//! One `wgpu::Device` serves both the compute kernel and the display, which
//! is what makes the shared image possible without copies. The device and
//! queue are handed out as `Arc`s so the display can build its own
//! pipelines on them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wgpu::util::DeviceExt;
use wgpu::{Adapter, Device, Instance, Queue, Surface};

use crate::adapter::{select_adapter, AdapterCandidate};
use crate::device::{BufferKind, ComputeDevice, FrameParams, KernelArgs};
use crate::error::{DeviceError, InitError};
use crate::settings::KERNEL_WORKGROUP_SIZE;
use crate::work_size::WorkSize;

/// Entry point of the render kernel.
pub const RENDER_ENTRY_POINT: &str = "render";

/// The WGSL path tracer shipped with the crate.
pub const PATH_TRACER_WGSL: &str = include_str!("shaders/pathtracer.wgsl");

pub struct ComputeContext {
    adapter: Adapter,
    device: Arc<Device>,
    queue: Arc<Queue>,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: Option<wgpu::ComputePipeline>,
    /// Binding 7; rewritten before every dispatch
    params_buffer: wgpu::Buffer,

    device_lost: Arc<AtomicBool>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn buffer_usage(kind: BufferKind) -> wgpu::BufferUsages {
    match kind {
        BufferKind::Storage | BufferKind::Image => {
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC
        }
        BufferKind::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    }
}

impl ComputeContext {
    /// Pick an adapter that can present to `surface` and open a device on it.
    pub fn new(instance: &Instance, surface: Option<&Surface<'_>>) -> Result<Self, InitError> {
        let adapters: Vec<Adapter> = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .filter(|adapter| surface.map_or(true, |surface| adapter.is_surface_supported(surface)))
            .collect();

        for adapter in &adapters {
            let info = adapter.get_info();
            log::debug!("Found adapter {} ({:?}, {:?})", info.name, info.device_type, info.backend);
        }

        let candidates: Vec<AdapterCandidate> = adapters.iter().map(AdapterCandidate::from_adapter).collect();
        let adapter = select_adapter(&candidates)
            .and_then(|index| adapters.into_iter().nth(index))
            .ok_or(InitError::NoCompatibleDevice)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?}, {:?})", info.name, info.device_type, info.backend);

        let adapter_limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Lux Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_buffer_size: adapter_limits.max_buffer_size,
                    max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                    ..wgpu::Limits::default()
                },
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost_flag = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({:?}): {}", reason, message);
            lost_flag.store(true, Ordering::SeqCst);
        });
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("Uncaptured GPU error: {}", err);
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Kernel Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                uniform_entry(5),
                uniform_entry(6),
                uniform_entry(7),
            ],
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Params Buffer"),
            size: std::mem::size_of::<FrameParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            bind_group_layout,
            pipeline: None,
            params_buffer,
            device_lost,
        })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn is_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }

    fn check_lost(&self) -> Result<(), DeviceError> {
        if self.is_lost() {
            Err(DeviceError::Lost)
        } else {
            Ok(())
        }
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, f: impl FnOnce(&Device, &Queue) -> T) -> Result<T, DeviceError> {
        self.check_lost()?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device, &self.queue);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(err) => Err(err.into()),
            None => Ok(value),
        }
    }
}

impl ComputeDevice for ComputeContext {
    type Buffer = wgpu::Buffer;

    fn load_program(&mut self, source: &str) -> Result<(), InitError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Path Tracer Kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            let diagnostics = err.to_string();
            log::error!("Kernel compilation failed:\n{}", diagnostics);
            return Err(InitError::KernelCompile { diagnostics });
        }

        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Kernel Pipeline Layout"),
            bind_group_layouts: &[&self.bind_group_layout],
            push_constant_ranges: &[],
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Render Kernel"),
            layout: Some(&layout),
            module: &module,
            entry_point: RENDER_ENTRY_POINT,
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            let diagnostics = err.to_string();
            log::error!("Kernel '{}' creation failed:\n{}", RENDER_ENTRY_POINT, diagnostics);
            return Err(InitError::KernelCreation {
                entry_point: RENDER_ENTRY_POINT.to_string(),
                diagnostics,
            });
        }

        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn create_buffer(&self, label: &str, kind: BufferKind, contents: &[u8]) -> Result<wgpu::Buffer, DeviceError> {
        self.scoped(|device, _| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: buffer_usage(kind),
            })
        })
    }

    fn create_zeroed(&self, label: &str, kind: BufferKind, size: u64) -> Result<wgpu::Buffer, DeviceError> {
        // Fresh wgpu buffers are zero-initialized
        self.scoped(|device, _| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: buffer_usage(kind),
                mapped_at_creation: false,
            })
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, data: &[u8]) -> Result<(), DeviceError> {
        self.scoped(|_, queue| queue.write_buffer(buffer, 0, data))
    }

    fn release_buffer(&self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn buffer_size(&self, buffer: &wgpu::Buffer) -> u64 {
        buffer.size()
    }

    fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, DeviceError> {
        let staging = self.scoped(|device, queue| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Buffer"),
                size: buffer.size(),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
            encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
            queue.submit(std::iter::once(encoder.finish()));
            staging
        })?;

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|err| DeviceError::Readback(err.to_string()))?
            .map_err(|err| DeviceError::Readback(err.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn acquire_image(&self, _image: &wgpu::Buffer) -> Result<(), DeviceError> {
        // Same device on both sides: wgpu orders the compute pass and the
        // display pass, so only loss needs checking
        self.check_lost()
    }

    fn dispatch(&self, args: &KernelArgs<'_, wgpu::Buffer>, work: WorkSize) -> Result<(), DeviceError> {
        let pipeline = self.pipeline.as_ref().ok_or(DeviceError::KernelMissing)?;
        if work.local != KERNEL_WORKGROUP_SIZE {
            return Err(DeviceError::WorkGroupMismatch {
                expected: KERNEL_WORKGROUP_SIZE,
                actual: work.local,
            });
        }

        self.scoped(|device, queue| {
            queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&args.params));

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Kernel Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: args.image.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: args.spheres.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: args.light_spheres.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: args.triangles.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: args.light_triangles.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: args.scene_info.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: args.camera.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kernel Encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Render Kernel Pass"),
                    timestamp_writes: None,
                });
                let [groups_x, groups_y] = work.groups();
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            queue.submit(std::iter::once(encoder.finish()));
        })
    }

    fn wait_idle(&self) -> Result<(), DeviceError> {
        self.check_lost()?;
        self.device.poll(wgpu::Maintain::Wait);
        self.check_lost()
    }
}
