use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use lux_core::{demo, load_scene, MoveDirection, Scene};
use lux_render::{
    ComputeContext, FrameStatus, PresentError, RenderOption, RenderOrchestrator, RenderSettings,
    PATH_TRACER_WGSL,
};
use lux_viewport::{OverlayStats, ViewportDisplay};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const INITIAL_SIZE: (u32, u32) = (1280, 720);

/// Held keys that move the camera every frame.
const MOVE_KEYS: [(KeyCode, MoveDirection); 10] = [
    (KeyCode::KeyW, MoveDirection::Forward),
    (KeyCode::KeyS, MoveDirection::Backward),
    (KeyCode::KeyA, MoveDirection::Left),
    (KeyCode::KeyD, MoveDirection::Right),
    (KeyCode::KeyR, MoveDirection::Up),
    (KeyCode::KeyF, MoveDirection::Down),
    (KeyCode::ArrowLeft, MoveDirection::YawLeft),
    (KeyCode::ArrowRight, MoveDirection::YawRight),
    (KeyCode::ArrowUp, MoveDirection::PitchUp),
    (KeyCode::ArrowDown, MoveDirection::PitchDown),
];

const OPTION_KEYS: [KeyCode; 8] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
];

/// Build the scene named on the command line: a JSON file or a demo name.
fn startup_scene(arg: Option<&str>, width: i32, height: i32) -> Result<(Scene, Option<usize>)> {
    let name = arg.unwrap_or(demo::DEMO_SCENES[0]);

    if let Some(index) = demo::DEMO_SCENES.iter().position(|demo| *demo == name) {
        if let Some(scene) = demo::by_name(name, width, height) {
            return Ok((scene, Some(index)));
        }
    }

    let scene = load_scene(name, width, height).with_context(|| format!("Failed to load scene '{}'", name))?;
    Ok((scene, None))
}

/// Settings with `LUX_MAX_SAMPLES` / `LUX_SEED` applied.
fn settings_from_env() -> RenderSettings {
    let mut settings = RenderSettings::default();

    if let Ok(value) = std::env::var("LUX_MAX_SAMPLES") {
        match value.parse() {
            Ok(max_samples) => settings = settings.with_max_samples(max_samples),
            Err(_) => log::warn!("Ignoring LUX_MAX_SAMPLES={}: not a sample count", value),
        }
    }
    if let Ok(value) = std::env::var("LUX_SEED") {
        match value.parse() {
            Ok(seed) => settings = settings.with_seed(seed),
            Err(_) => log::warn!("Ignoring LUX_SEED={}: not an integer", value),
        }
    }
    settings
}

/// Everything that exists once the window is up.
struct Viewer {
    display: ViewportDisplay,
    orchestrator: RenderOrchestrator<ComputeContext>,
    scene: Scene,
    /// Position in `DEMO_SCENES`; `None` for a scene loaded from disk
    demo_index: Option<usize>,
    adapter_name: String,
    last_status: Option<FrameStatus>,
}

impl Viewer {
    fn new(window: Arc<Window>, scene_arg: Option<&str>) -> Result<Self> {
        let size = window.inner_size();
        let (mut scene, demo_index) =
            startup_scene(scene_arg, size.width.max(1) as i32, size.height.max(1) as i32)?;

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;
        let context = ComputeContext::new(&instance, Some(&surface))?;
        let adapter_name = context.adapter().get_info().name;

        let mut display = ViewportDisplay::new(window, surface, &context)?;
        let mut orchestrator = RenderOrchestrator::new(context, settings_from_env());
        orchestrator.initialize(&mut scene, PATH_TRACER_WGSL, &mut display)?;

        Ok(Self {
            display,
            orchestrator,
            scene,
            demo_index,
            adapter_name,
            last_status: None,
        })
    }

    fn next_demo_scene(&mut self) {
        let index = self.demo_index.map_or(0, |index| (index + 1) % demo::DEMO_SCENES.len());
        let resolution = self.scene.resolution();
        let Some(mut scene) = demo::by_name(demo::DEMO_SCENES[index], resolution.x, resolution.y) else {
            return;
        };

        match self.orchestrator.change_scene(&mut scene) {
            Ok(()) => {
                self.scene = scene;
                self.demo_index = Some(index);
            }
            Err(e) => log::error!("Failed to switch scene: {}", e),
        }
    }

    fn save_snapshot(&self) {
        let path = format!("lux_{}_{}.png", self.scene.name, self.orchestrator.iteration());
        match self.orchestrator.snapshot().and_then(|snapshot| snapshot.save_png(&path)) {
            Ok(()) => log::info!("Saved snapshot to {}", path),
            Err(e) => log::error!("Snapshot failed: {}", e),
        }
    }

    fn overlay_stats(&self) -> OverlayStats {
        let camera = self.scene.camera();
        OverlayStats {
            scene_name: self.scene.name.clone(),
            adapter_name: self.adapter_name.clone(),
            iteration: self.orchestrator.iteration(),
            max_samples: self.orchestrator.settings().max_samples,
            render_option: self.orchestrator.render_option(),
            eye: camera.eye_position(),
            yaw: camera.yaw(),
            pitch: camera.pitch(),
            image_size: self.orchestrator.bridge().extent(),
        }
    }

    /// Apply pending scene changes, accumulate one sample and show it.
    /// Returns false when the viewer cannot continue.
    fn frame(&mut self) -> bool {
        if self.orchestrator.device().is_lost() {
            log::error!("GPU device lost, exiting");
            return false;
        }

        if let Err(e) = self.orchestrator.process_scene_events(&self.scene) {
            log::error!("Failed to apply scene changes: {}", e);
        }

        let status = self.orchestrator.dispatch_frame();
        if status == FrameStatus::SampleCapReached && self.last_status != Some(FrameStatus::SampleCapReached) {
            log::info!("Reached {} samples", self.orchestrator.iteration());
        }
        self.last_status = Some(status);

        self.display.set_stats(self.overlay_stats());

        match self.orchestrator.present(&mut self.display) {
            Ok(()) => true,
            Err(PresentError::Display(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.display.reconfigure();
                true
            }
            Err(PresentError::Display(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("Out of memory!");
                false
            }
            Err(e) => {
                log::error!("Present error: {}", e);
                true
            }
        }
    }
}

/// Application state
struct App {
    scene_arg: Option<String>,
    viewer: Option<Viewer>,

    // Input state
    left_mouse_pressed: bool,
    cursor_pos: Option<(f64, f64)>,
    keys_pressed: HashSet<KeyCode>,
    last_frame_time: Instant,
}

impl App {
    fn new(scene_arg: Option<String>) -> Self {
        Self {
            scene_arg,
            viewer: None,
            left_mouse_pressed: false,
            cursor_pos: None,
            keys_pressed: HashSet::new(),
            last_frame_time: Instant::now(),
        }
    }

    fn handle_key_press(&mut self, keycode: KeyCode) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        if let Some(index) = OPTION_KEYS.iter().position(|key| *key == keycode) {
            viewer.orchestrator.set_render_option(RenderOption::ALL[index]);
            return;
        }

        match keycode {
            KeyCode::Tab => viewer.next_demo_scene(),
            KeyCode::KeyP => viewer.save_snapshot(),
            KeyCode::KeyT => viewer.display.show_ui = !viewer.display.show_ui,
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Lux")
            .with_inner_size(winit::dpi::PhysicalSize::new(INITIAL_SIZE.0, INITIAL_SIZE.1));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Viewer::new(window, self.scene_arg.as_deref()) {
            Ok(viewer) => {
                log::info!("Window and renderer initialized");
                viewer.display.window().request_redraw();
                self.viewer = Some(viewer);
            }
            Err(e) => {
                log::error!("Failed to initialize renderer: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        // Let egui handle the event first
        if let Some(viewer) = &mut self.viewer {
            if viewer.display.handle_egui_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                if let Some(viewer) = &mut self.viewer {
                    viewer.orchestrator.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.display.resize((physical_size.width, physical_size.height));
                    // Minimized windows keep the last image
                    if physical_size.width > 0 && physical_size.height > 0 {
                        viewer
                            .scene
                            .change_resolution(physical_size.width as i32, physical_size.height as i32);
                        log::info!("Resized to {}x{}", physical_size.width, physical_size.height);
                    }
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.left_mouse_pressed = state == ElementState::Pressed;
                if let (true, Some((x, y)), Some(viewer)) =
                    (self.left_mouse_pressed, self.cursor_pos, &mut self.viewer)
                {
                    viewer.scene.initial_mouse_position(x as f32, y as f32);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_pos = Some((position.x, position.y));
                if self.left_mouse_pressed {
                    if let Some(viewer) = &mut self.viewer {
                        viewer
                            .scene
                            .update_mouse_position(position.x as f32, position.y as f32);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(keycode),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.keys_pressed.insert(keycode);
                    if !repeat {
                        self.handle_key_press(keycode);
                    }
                }
                ElementState::Released => {
                    self.keys_pressed.remove(&keycode);
                }
            },
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let delta_time = (now - self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                let Some(viewer) = &mut self.viewer else {
                    return;
                };
                viewer.display.update_fps(delta_time);

                for (key, direction) in MOVE_KEYS {
                    if self.keys_pressed.contains(&key) {
                        viewer.scene.move_camera(direction);
                    }
                }

                if !viewer.frame() {
                    viewer.orchestrator.shutdown();
                    event_loop.exit();
                    return;
                }

                viewer.display.window().request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Lux");

    let scene_arg = std::env::args().nth(1);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(scene_arg);

    log::info!("Running event loop");
    event_loop.run_app(&mut app)?;

    Ok(())
}
