//! Window display for the path tracer.
//!
//! [`ViewportDisplay`] is the display side of the shared image: it owns the
//! window surface, blits the accumulated image with a full-screen pass and
//! draws an egui stats panel on top.

use std::sync::Arc;

use anyhow::Result;
use lux_math::Vec3;
use lux_render::{ComputeContext, DisplaySurface, RenderOption};
use wgpu::{util::DeviceExt, Device, Queue, Surface, SurfaceConfiguration};
use winit::window::Window;

/// Uniform read by the blit shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitUniform {
    image_size: [u32; 2],
    surface_size: [f32; 2],
}

/// Everything the overlay shows about the renderer.
#[derive(Debug, Clone, Default)]
pub struct OverlayStats {
    pub scene_name: String,
    pub adapter_name: String,
    pub iteration: u32,
    pub max_samples: u32,
    pub render_option: RenderOption,
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub image_size: (u32, u32),
}

/// Fraction of the sample budget used so far, in `[0, 1]`.
pub fn sample_progress(iteration: u32, max_samples: u32) -> f32 {
    if max_samples == 0 {
        return 1.0;
    }
    (iteration as f32 / max_samples as f32).min(1.0)
}

pub struct ViewportDisplay {
    window: Arc<Window>,
    device: Arc<Device>,
    queue: Arc<Queue>,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    pub size: (u32, u32),

    blit_layout: wgpu::BindGroupLayout,
    blit_pipeline: wgpu::RenderPipeline,
    blit_buffer: wgpu::Buffer,
    blit_uniform: BlitUniform,
    /// Created when an image is bound
    blit_bind_group: Option<wgpu::BindGroup>,

    // egui state
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    pub show_ui: bool,
    stats: OverlayStats,

    // FPS tracking
    frame_count: u32,
    fps_update_timer: f32,
    fps: f32,
}

impl ViewportDisplay {
    /// Configure `surface` on the compute context's device.
    pub fn new(window: Arc<Window>, surface: Surface<'static>, context: &ComputeContext) -> Result<Self> {
        let size = window.inner_size();
        let device = context.device().clone();
        let queue = context.queue().clone();

        // Configure surface
        let surface_caps = surface.get_capabilities(context.adapter());
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface is not supported by the selected adapter"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let blit_uniform = BlitUniform {
            image_size: [0, 0],
            surface_size: [config.width as f32, config.height as f32],
        };
        let blit_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Blit Uniform Buffer"),
            contents: bytemuck::bytes_of(&blit_uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/display.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
            None, // max_texture_side (use default)
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            &device,
            config.format,
            None, // No depth testing for egui
            1,
            false, // allow_srgb_render_target
        );

        log::info!("Display configured: {}x{} {:?}", config.width, config.height, config.format);

        Ok(Self {
            window,
            device,
            queue,
            surface,
            size: (config.width, config.height),
            config,
            blit_layout,
            blit_pipeline,
            blit_buffer,
            blit_uniform,
            blit_bind_group: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            show_ui: true,
            stats: OverlayStats::default(),
            frame_count: 0,
            fps_update_timer: 0.0,
            fps: 0.0,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Reconfigure the surface. Zero-sized (minimized) windows are ignored.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 {
            self.size = new_size;
            self.config.width = new_size.0;
            self.config.height = new_size.1;
            self.surface.configure(&self.device, &self.config);

            self.blit_uniform.surface_size = [new_size.0 as f32, new_size.1 as f32];
            self.write_blit_uniform();
        }
    }

    /// Reconfigure at the current size after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Handle egui window event - returns true if event was consumed by egui
    pub fn handle_egui_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Update FPS counter (call each frame with delta_time)
    pub fn update_fps(&mut self, delta_time: f32) {
        self.frame_count += 1;
        self.fps_update_timer += delta_time;

        // Update FPS every 0.5 seconds
        if self.fps_update_timer >= 0.5 {
            self.fps = self.frame_count as f32 / self.fps_update_timer;
            self.frame_count = 0;
            self.fps_update_timer = 0.0;
        }
    }

    pub fn set_stats(&mut self, stats: OverlayStats) {
        self.stats = stats;
    }

    fn write_blit_uniform(&self) {
        self.queue
            .write_buffer(&self.blit_buffer, 0, bytemuck::bytes_of(&self.blit_uniform));
    }

    fn build_ui(ctx: &egui::Context, stats: &OverlayStats, fps: f32) {
        egui::SidePanel::left("stats_panel")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Lux");
                ui.separator();

                ui.label(format!("FPS: {:.1}", fps));
                ui.label(format!("Scene: {}", stats.scene_name));
                ui.label(format!("Adapter: {}", stats.adapter_name));
                ui.separator();

                ui.label(format!("Samples: {} / {}", stats.iteration, stats.max_samples));
                ui.add(egui::ProgressBar::new(sample_progress(stats.iteration, stats.max_samples)));
                ui.label(format!("Output: {}", stats.render_option.label()));
                ui.label(format!("Image: {}x{}", stats.image_size.0, stats.image_size.1));
                ui.separator();

                ui.collapsing("Camera", |ui| {
                    ui.label(format!(
                        "Eye: ({:.2}, {:.2}, {:.2})",
                        stats.eye.x, stats.eye.y, stats.eye.z
                    ));
                    ui.label(format!("Yaw: {:.1}°", stats.yaw.to_degrees()));
                    ui.label(format!("Pitch: {:.1}°", stats.pitch.to_degrees()));
                });

                ui.collapsing("Controls", |ui| {
                    ui.label("Left Mouse: Look around");
                    ui.label("W/S: Forward/back");
                    ui.label("A/D: Strafe left/right");
                    ui.label("R/F: Up/down");
                    ui.label("Arrows: Yaw/pitch");
                    ui.label("1-8: Output channel");
                    ui.label("Tab: Next demo scene");
                    ui.label("P: Save snapshot");
                    ui.label("T: Toggle this panel");
                });
            });
    }
}

impl DisplaySurface<wgpu::Buffer> for ViewportDisplay {
    type Error = wgpu::SurfaceError;

    fn bind_image(&mut self, image: &wgpu::Buffer, width: u32, height: u32) {
        self.blit_uniform.image_size = [width, height];
        self.write_blit_uniform();

        self.blit_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: image.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.blit_buffer.as_entire_binding(),
                },
            ],
        }));
        log::debug!("Display bound to {}x{} image", width, height);
    }

    fn draw(&mut self, _image: &wgpu::Buffer) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Prepare egui UI
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let show_ui = self.show_ui;
        let stats = &self.stats;
        let fps = self.fps;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if show_ui {
                Self::build_ui(ctx, stats, fps);
            }
        });

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.size.0, self.size.1],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Display Encoder"),
            });

        // Upload egui textures
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        // Blit pass
        {
            let mut blit_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(bind_group) = &self.blit_bind_group {
                blit_pass.set_pipeline(&self.blit_pipeline);
                blit_pass.set_bind_group(0, bind_group, &[]);
                blit_pass.draw(0..3, 0..1);
            }
        }

        // Render egui on top
        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime(); // Need 'static lifetime for egui renderer

            self.egui_renderer
                .render(&mut egui_pass, &paint_jobs, &screen_descriptor);
        }

        // Free egui textures
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
