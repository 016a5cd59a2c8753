//! Progressive rendering state machine.
//!
//! The orchestrator keeps GPU copies of a [`Scene`], binds them to the
//! render kernel and counts accumulated samples. Anything that invalidates
//! the accumulated image (scene edits, camera moves, resizes, option
//! changes) resets the iteration counter to 0; the kernel overwrites
//! instead of blending on iteration 0.

use std::cell::Cell;
use std::rc::Rc;

use lux_core::{GpuSphere, GpuTriangle, LightSphere, LightTriangle, Scene, SceneInfo, SceneListener};
use lux_math::CameraRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bridge::{DisplaySurface, FrameBufferBridge};
use crate::device::{BufferKind, ComputeDevice, FrameParams, KernelArgs};
use crate::error::{BridgeError, DeviceError, FrameError, InitError, PresentError};
use crate::option::RenderOption;
use crate::settings::RenderSettings;
use crate::snapshot::{ImageSnapshot, SnapshotError};
use crate::work_size::WorkSize;

/// Observable lifecycle of a [`RenderOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Uninitialized,
    /// Initialized, nothing accumulated since the last invalidation
    Ready,
    Rendering { iteration: u32 },
    ShuttingDown,
}

/// Outcome of [`RenderOrchestrator::dispatch_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// A kernel run finished; `iteration` samples are now accumulated.
    Dispatched { iteration: u32 },
    /// Nothing to do until something invalidates the image.
    SampleCapReached,
    /// The frame was dropped; the previous image stays on screen.
    Skipped(FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    ShutDown,
}

/// Scene notifications collected between frames.
///
/// Linked to the scene as its [`SceneListener`]; drained by
/// [`RenderOrchestrator::process_scene_events`].
#[derive(Debug, Default)]
pub struct SceneEvents {
    content: Cell<bool>,
    resolution: Cell<Option<(u32, u32)>>,
}

impl SceneEvents {
    pub fn is_pending(&self) -> bool {
        self.content.get() || self.resolution.get().is_some()
    }

    fn clear(&self) {
        self.content.set(false);
        self.resolution.set(None);
    }
}

impl SceneListener for SceneEvents {
    fn on_content_changed(&self) {
        self.content.set(true);
    }

    fn on_resolution_changed(&self, width: u32, height: u32) {
        // Only the latest size matters
        self.resolution.set(Some((width, height)));
    }
}

/// Buffers rewritten in place: allocated once at initialization.
struct FixedBuffers<B> {
    scene_info: B,
    camera: B,
}

/// Buffers reallocated on every scene sync.
struct SceneBuffers<B> {
    spheres: B,
    light_spheres: B,
    triangles: B,
    light_triangles: B,
}

impl<B> SceneBuffers<B> {
    /// Newest first, like every other release.
    fn release<D: ComputeDevice<Buffer = B>>(self, device: &D) {
        device.release_buffer(self.light_triangles);
        device.release_buffer(self.triangles);
        device.release_buffer(self.light_spheres);
        device.release_buffer(self.spheres);
    }
}

fn release_all<D: ComputeDevice>(device: &D, buffers: impl IntoIterator<Item = D::Buffer>) {
    for buffer in buffers {
        device.release_buffer(buffer);
    }
}

/// Upload a record array, substituting one zeroed record for an empty one.
fn upload_records<D, T>(device: &D, label: &str, records: &[T]) -> Result<D::Buffer, DeviceError>
where
    D: ComputeDevice,
    T: bytemuck::Pod,
{
    if records.is_empty() {
        device.create_zeroed(label, BufferKind::Storage, std::mem::size_of::<T>() as u64)
    } else {
        device.create_buffer(label, BufferKind::Storage, bytemuck::cast_slice(records))
    }
}

/// Create a full set of scene buffers, or none at all.
fn upload_scene<D: ComputeDevice>(device: &D, scene: &Scene) -> Result<SceneBuffers<D::Buffer>, DeviceError> {
    let spheres = upload_records::<D, GpuSphere>(device, "Sphere Buffer", scene.spheres())?;

    let light_spheres = match upload_records::<D, LightSphere>(device, "Light Sphere Buffer", scene.light_spheres()) {
        Ok(buffer) => buffer,
        Err(err) => {
            release_all(device, [spheres]);
            return Err(err);
        }
    };

    let triangles = match upload_records::<D, GpuTriangle>(device, "Triangle Buffer", scene.triangles()) {
        Ok(buffer) => buffer,
        Err(err) => {
            release_all(device, [light_spheres, spheres]);
            return Err(err);
        }
    };

    let light_triangles =
        match upload_records::<D, LightTriangle>(device, "Light Triangle Buffer", scene.light_triangles()) {
            Ok(buffer) => buffer,
            Err(err) => {
                release_all(device, [triangles, light_spheres, spheres]);
                return Err(err);
            }
        };

    Ok(SceneBuffers {
        spheres,
        light_spheres,
        triangles,
        light_triangles,
    })
}

/// Drives progressive rendering of one scene on one compute device.
pub struct RenderOrchestrator<D: ComputeDevice> {
    device: D,
    settings: RenderSettings,
    lifecycle: Lifecycle,

    bridge: FrameBufferBridge<D::Buffer>,
    fixed: Option<FixedBuffers<D::Buffer>>,
    scene_buffers: Option<SceneBuffers<D::Buffer>>,
    /// Scene revision the scene buffers were built from
    scene_revision: Option<u64>,

    work_size: WorkSize,
    iteration: u32,
    render_option: RenderOption,
    rng: StdRng,
    events: Rc<SceneEvents>,
}

impl<D: ComputeDevice> RenderOrchestrator<D> {
    pub fn new(device: D, settings: RenderSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let work_size = WorkSize::for_image(0, 0, settings.local_work_size);

        Self {
            device,
            settings,
            lifecycle: Lifecycle::Uninitialized,
            bridge: FrameBufferBridge::new(),
            fixed: None,
            scene_buffers: None,
            scene_revision: None,
            work_size,
            iteration: 0,
            render_option: RenderOption::default(),
            rng,
            events: Rc::new(SceneEvents::default()),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn bridge(&self) -> &FrameBufferBridge<D::Buffer> {
        &self.bridge
    }

    /// Accumulated samples since the last invalidation.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn render_option(&self) -> RenderOption {
        self.render_option
    }

    pub fn work_size(&self) -> WorkSize {
        self.work_size
    }

    pub fn phase(&self) -> RenderPhase {
        match self.lifecycle {
            Lifecycle::Uninitialized => RenderPhase::Uninitialized,
            Lifecycle::ShutDown => RenderPhase::ShuttingDown,
            Lifecycle::Running if self.iteration == 0 => RenderPhase::Ready,
            Lifecycle::Running => RenderPhase::Rendering {
                iteration: self.iteration,
            },
        }
    }

    /// The listener to link to a scene rendered by this orchestrator.
    pub fn listener(&self) -> Rc<SceneEvents> {
        self.events.clone()
    }

    /// Load the kernel, upload `scene` and bind the image to `display`.
    ///
    /// Links the orchestrator's listener to `scene`. Any failure here is
    /// fatal: the resources acquired so far are released and the
    /// orchestrator stays uninitialized.
    pub fn initialize<S>(&mut self, scene: &mut Scene, program_source: &str, display: &mut S) -> Result<(), InitError>
    where
        S: DisplaySurface<D::Buffer> + ?Sized,
    {
        if self.lifecycle != Lifecycle::Uninitialized {
            return Err(InitError::AlreadyInitialized);
        }

        if let Err(err) = self.bring_up(scene, program_source, display) {
            log::error!("Renderer initialization failed: {}", err);
            self.release_resources();
            self.lifecycle = Lifecycle::Uninitialized;
            return Err(err);
        }

        let (width, height) = self.bridge.extent();
        log::info!(
            "Renderer ready: {}x{} image, {:?} work-groups, sample cap {}",
            width,
            height,
            self.work_size.groups(),
            self.settings.max_samples
        );
        Ok(())
    }

    fn bring_up<S>(&mut self, scene: &mut Scene, program_source: &str, display: &mut S) -> Result<(), InitError>
    where
        S: DisplaySurface<D::Buffer> + ?Sized,
    {
        log::info!("Compiling render kernel");
        self.device.load_program(program_source)?;

        let scene_info = self.device.create_zeroed(
            "Scene Info Buffer",
            BufferKind::Uniform,
            std::mem::size_of::<SceneInfo>() as u64,
        )?;
        let camera = self.device.create_zeroed(
            "Camera Buffer",
            BufferKind::Uniform,
            std::mem::size_of::<CameraRecord>() as u64,
        )?;
        self.fixed = Some(FixedBuffers { scene_info, camera });
        self.lifecycle = Lifecycle::Running;

        self.events.clear();
        scene.link_update_listener(self.events.clone());

        self.sync_scene(scene)?;
        self.sync_camera(scene)?;
        self.bridge.bind_to_display_target(display)?;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), FrameError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => Err(FrameError::NotInitialized),
            Lifecycle::ShutDown => Err(FrameError::ShutDown),
            Lifecycle::Running => Ok(()),
        }
    }

    fn reset_accumulation(&mut self) {
        self.iteration = 0;
    }

    /// Re-upload all primitive and light buffers from `scene`.
    ///
    /// Also recreates the image at the scene's resolution. On failure the
    /// previous buffers stay bound and the scene counts as not synced.
    pub fn sync_scene(&mut self, scene: &Scene) -> Result<(), FrameError> {
        self.ensure_running()?;
        let fixed = self.fixed.as_ref().ok_or(FrameError::NotInitialized)?;

        let uploaded = upload_scene(&self.device, scene)?;
        let info = scene.scene_info();
        if let Err(err) = self.device.write_buffer(&fixed.scene_info, bytemuck::bytes_of(&info)) {
            uploaded.release(&self.device);
            return Err(err.into());
        }
        if let Some(old) = self.scene_buffers.replace(uploaded) {
            old.release(&self.device);
        }

        log::debug!(
            "Uploaded scene '{}': {} spheres ({} lights), {} triangles ({} lights)",
            scene.name,
            info.sphere_count,
            info.light_sphere_count,
            info.triangle_count,
            info.light_triangle_count
        );

        let resolution = scene.resolution();
        self.on_resolution_changed(resolution.x.max(0) as u32, resolution.y.max(0) as u32)?;
        self.scene_revision = Some(scene.revision());
        self.reset_accumulation();
        Ok(())
    }

    /// Recreate the image and dispatch grid for a new output size.
    pub fn on_resolution_changed(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
        self.ensure_running()?;

        self.bridge.resize(&self.device, width, height)?;
        self.work_size = WorkSize::for_image(width, height, self.settings.local_work_size);
        self.reset_accumulation();
        Ok(())
    }

    /// Upload the scene's current camera pose.
    pub fn sync_camera(&mut self, scene: &Scene) -> Result<(), FrameError> {
        self.ensure_running()?;
        let fixed = self.fixed.as_ref().ok_or(FrameError::NotInitialized)?;

        let camera = scene.render_camera();
        self.device.write_buffer(&fixed.camera, bytemuck::bytes_of(&camera))?;
        self.reset_accumulation();
        Ok(())
    }

    pub fn set_render_option(&mut self, option: RenderOption) {
        if option != self.render_option {
            log::info!("Render option: {}", option.label());
        }
        self.render_option = option;
        self.reset_accumulation();
    }

    /// Switch to a different scene.
    pub fn change_scene(&mut self, scene: &mut Scene) -> Result<(), FrameError> {
        self.ensure_running()?;

        self.events.clear();
        scene.link_update_listener(self.events.clone());
        self.sync_scene(scene)?;
        self.sync_camera(scene)?;

        log::info!("Switched to scene '{}'", scene.name);
        Ok(())
    }

    /// Apply the scene changes reported since the last call.
    ///
    /// A resize recreates the image; a content change re-uploads the scene
    /// buffers only if the geometry changed, and the camera either way.
    /// Events that could not be applied stay pending for the next call.
    pub fn process_scene_events(&mut self, scene: &Scene) -> Result<(), FrameError> {
        let resized = self.events.resolution.take();
        let content = self.events.content.take();
        if !content && resized.is_none() {
            return Ok(());
        }

        let applied = self.apply_scene_events(scene, resized);
        if applied.is_err() {
            if content {
                self.events.content.set(true);
            }
            if resized.is_some() && self.events.resolution.get().is_none() {
                self.events.resolution.set(resized);
            }
        }
        applied
    }

    fn apply_scene_events(&mut self, scene: &Scene, resized: Option<(u32, u32)>) -> Result<(), FrameError> {
        if self.scene_revision != Some(scene.revision()) {
            // Recreates the image at the scene's resolution as well
            self.sync_scene(scene)?;
        } else if let Some((width, height)) = resized {
            self.on_resolution_changed(width, height)?;
        }
        self.sync_camera(scene)
    }

    /// Run the kernel once and accumulate one more sample.
    pub fn dispatch_frame(&mut self) -> FrameStatus {
        if let Err(err) = self.ensure_running() {
            return FrameStatus::Skipped(err);
        }

        if self.render_option.is_diagnostic_noise() {
            self.iteration = 0;
        }

        if self.iteration >= self.settings.max_samples {
            return FrameStatus::SampleCapReached;
        }

        match self.run_kernel() {
            Ok(()) => {
                self.iteration += 1;
                FrameStatus::Dispatched {
                    iteration: self.iteration,
                }
            }
            Err(err) => {
                log::warn!("Skipping frame at iteration {}: {}", self.iteration, err);
                FrameStatus::Skipped(err)
            }
        }
    }

    fn run_kernel(&mut self) -> Result<(), FrameError> {
        let random_seed: f32 = self.rng.gen_range(0.0..1.0);
        let params = FrameParams::new(self.iteration, random_seed, self.render_option.as_i32());

        self.bridge.acquire(&self.device)?;
        let dispatched = self.dispatch_kernel(params);
        // Released even when the dispatch failed
        let released = self.bridge.release(&self.device);

        dispatched?;
        released?;
        self.device.wait_idle()?;
        Ok(())
    }

    fn dispatch_kernel(&self, params: FrameParams) -> Result<(), FrameError> {
        let fixed = self.fixed.as_ref().ok_or(FrameError::NotInitialized)?;
        let scene = self.scene_buffers.as_ref().ok_or(FrameError::NotInitialized)?;
        let image = self.bridge.image().ok_or(BridgeError::Unbound)?;

        let args = KernelArgs {
            image,
            spheres: &scene.spheres,
            light_spheres: &scene.light_spheres,
            triangles: &scene.triangles,
            light_triangles: &scene.light_triangles,
            scene_info: &fixed.scene_info,
            camera: &fixed.camera,
            params,
        };
        self.device.dispatch(&args, self.work_size)?;
        Ok(())
    }

    /// Show the current image on `display`, rebinding it first if the image
    /// was recreated since the last bind.
    pub fn present<S>(&mut self, display: &mut S) -> Result<(), PresentError<S::Error>>
    where
        S: DisplaySurface<D::Buffer> + ?Sized,
    {
        self.ensure_running()?;

        if self.bridge.needs_rebind() {
            self.bridge.bind_to_display_target(display).map_err(FrameError::from)?;
        }
        let image = self.bridge.display_image().map_err(FrameError::from)?;
        display.draw(image).map_err(PresentError::Display)
    }

    /// Copy the accumulated image back to the CPU.
    pub fn snapshot(&self) -> Result<ImageSnapshot, SnapshotError> {
        self.ensure_running()?;

        let image = self.bridge.display_image().map_err(FrameError::from)?;
        let bytes = self.device.read_buffer(image)?;
        let (width, height) = self.bridge.extent();
        ImageSnapshot::from_bytes(width, height, &bytes)
    }

    /// Release every device resource. The orchestrator is unusable afterwards.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::ShutDown {
            return;
        }
        self.release_resources();
        self.lifecycle = Lifecycle::ShutDown;
        log::info!("Renderer shut down after {} samples", self.iteration);
    }

    /// Reverse acquisition order: scene buffers, image, fixed buffers.
    fn release_resources(&mut self) {
        if let Some(scene) = self.scene_buffers.take() {
            scene.release(&self.device);
        }

        self.bridge.release_image(&self.device);

        if let Some(fixed) = self.fixed.take() {
            self.device.release_buffer(fixed.camera);
            self.device.release_buffer(fixed.scene_info);
        }
        self.scene_revision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_device::{DeviceEvent, FakeDisplay, RecordingDevice};
    use lux_core::{Material, MoveDirection};
    use lux_math::Vec3;

    const KERNEL: &str = "// kernel";

    fn floor_and_light() -> Scene {
        let mut scene = Scene::new(64, 48);
        scene.add_sphere(Vec3::new(0.0, -201.0, 0.0), 200.0, &Material::new(Vec3::splat(0.8)));
        scene.add_sphere(Vec3::new(0.0, 1.8, 0.0), 1.0, &Material::light(Vec3::splat(10.0)));
        scene
    }

    fn ready(settings: RenderSettings) -> (RenderOrchestrator<RecordingDevice>, Scene, FakeDisplay) {
        let mut orchestrator = RenderOrchestrator::new(RecordingDevice::new(), settings.with_seed(7));
        let mut scene = floor_and_light();
        let mut display = FakeDisplay::default();
        orchestrator.initialize(&mut scene, KERNEL, &mut display).unwrap();
        (orchestrator, scene, display)
    }

    #[test]
    fn test_initialize_order() {
        let (orchestrator, _scene, display) = ready(RenderSettings::default());
        let events = orchestrator.device().events();

        assert_eq!(events[0], DeviceEvent::LoadProgram);
        assert_eq!(events[1], DeviceEvent::Create("Scene Info Buffer".to_string()));
        assert_eq!(events[2], DeviceEvent::Create("Camera Buffer".to_string()));
        assert_eq!(events.last(), Some(&DeviceEvent::Write("Camera Buffer".to_string())));

        assert_eq!(orchestrator.phase(), RenderPhase::Ready);
        assert_eq!(orchestrator.bridge().extent(), (64, 48));
        assert_eq!(orchestrator.work_size().global, [64, 48]);
        assert_eq!(display.bound, vec![(64, 48)]);
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let (mut orchestrator, mut scene, mut display) = ready(RenderSettings::default());
        assert!(matches!(
            orchestrator.initialize(&mut scene, KERNEL, &mut display),
            Err(InitError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_kernel_failure_is_fatal() {
        let mut orchestrator = RenderOrchestrator::new(RecordingDevice::with_broken_program(), RenderSettings::default());
        let mut scene = floor_and_light();
        let mut display = FakeDisplay::default();

        let err = orchestrator.initialize(&mut scene, KERNEL, &mut display).unwrap_err();
        assert!(matches!(err, InitError::KernelCompile { .. }));
        assert_eq!(orchestrator.phase(), RenderPhase::Uninitialized);
        assert_eq!(orchestrator.device().live_buffers(), 0);
        assert!(matches!(
            orchestrator.dispatch_frame(),
            FrameStatus::Skipped(FrameError::NotInitialized)
        ));
    }

    #[test]
    fn test_zero_resolution_fails_initialization() {
        let mut orchestrator = RenderOrchestrator::new(RecordingDevice::new(), RenderSettings::default());
        let mut scene = Scene::new(0, 10);
        scene.add_sphere(Vec3::ZERO, 1.0, &Material::default());
        let mut display = FakeDisplay::default();

        let err = orchestrator.initialize(&mut scene, KERNEL, &mut display).unwrap_err();
        assert!(matches!(
            err,
            InitError::Frame(FrameError::Bridge(BridgeError::EmptyExtent { width: 0, height: 10 }))
        ));
        assert_eq!(orchestrator.device().live_buffers(), 0);
    }

    #[test]
    fn test_scene_buffers_sized_exactly() {
        let (orchestrator, scene, _display) = ready(RenderSettings::default());
        let uploads = orchestrator.device().uploads();
        let size_of = |label: &str| {
            uploads
                .iter()
                .find(|(name, _)| name == label)
                .map(|(_, bytes)| bytes.len())
        };

        assert_eq!(size_of("Sphere Buffer"), Some(2 * std::mem::size_of::<GpuSphere>()));
        assert_eq!(size_of("Light Sphere Buffer"), Some(std::mem::size_of::<LightSphere>()));
        // Empty containers get a single placeholder record
        assert_eq!(size_of("Triangle Buffer"), Some(std::mem::size_of::<GpuTriangle>()));
        assert_eq!(size_of("Light Triangle Buffer"), Some(std::mem::size_of::<LightTriangle>()));

        let info_bytes = uploads
            .iter()
            .rev()
            .find(|(name, _)| name == "Scene Info Buffer")
            .map(|(_, bytes)| bytes.clone())
            .unwrap();
        assert_eq!(info_bytes, bytemuck::bytes_of(&scene.scene_info()).to_vec());
    }

    #[test]
    fn test_sync_scene_idempotent() {
        let (mut orchestrator, scene, _display) = ready(RenderSettings::default());

        orchestrator.device().clear_events();
        orchestrator.sync_scene(&scene).unwrap();
        let first = orchestrator.device().uploads();

        orchestrator.device().clear_events();
        orchestrator.sync_scene(&scene).unwrap();
        let second = orchestrator.device().uploads();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_sync_scene_releases_previous_buffers() {
        let (mut orchestrator, scene, _display) = ready(RenderSettings::default());
        let live = orchestrator.device().live_buffers();

        orchestrator.sync_scene(&scene).unwrap();
        orchestrator.sync_scene(&scene).unwrap();

        // 4 scene buffers + 2 fixed + image
        assert_eq!(live, 7);
        assert_eq!(orchestrator.device().live_buffers(), 7);
    }

    fn check_invalidation(
        orchestrator: &mut RenderOrchestrator<RecordingDevice>,
        invalidate: impl FnOnce(&mut RenderOrchestrator<RecordingDevice>),
    ) {
        for _ in 0..3 {
            orchestrator.dispatch_frame();
        }
        assert_eq!(orchestrator.iteration(), 3);

        invalidate(orchestrator);
        assert_eq!(orchestrator.iteration(), 0);
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 1 });
    }

    #[test]
    fn test_invalidation_resets_iteration() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());

        check_invalidation(&mut orchestrator, |o| o.sync_camera(&scene).unwrap());
        check_invalidation(&mut orchestrator, |o| o.on_resolution_changed(32, 32).unwrap());
        check_invalidation(&mut orchestrator, |o| o.set_render_option(RenderOption::Normal));
        check_invalidation(&mut orchestrator, |o| o.sync_scene(&scene).unwrap());
        check_invalidation(&mut orchestrator, |o| o.change_scene(&mut scene).unwrap());
    }

    #[test]
    fn test_sample_cap_cutoff() {
        let (mut orchestrator, _scene, _display) = ready(RenderSettings::default().with_max_samples(4));

        for _ in 0..4 {
            assert!(matches!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { .. }));
        }
        orchestrator.device().clear_events();

        for _ in 0..10 {
            assert_eq!(orchestrator.dispatch_frame(), FrameStatus::SampleCapReached);
        }
        assert_eq!(orchestrator.iteration(), 4);
        assert!(orchestrator.device().events().is_empty());
    }

    #[test]
    fn test_zero_cap_never_dispatches() {
        let (mut orchestrator, _scene, _display) = ready(RenderSettings::default().with_max_samples(0));
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::SampleCapReached);
        assert!(orchestrator.device().dispatches().is_empty());
    }

    #[test]
    fn test_dispatch_bracketing_and_arguments() {
        let (mut orchestrator, _scene, _display) = ready(RenderSettings::default());
        orchestrator.set_render_option(RenderOption::Depth);
        orchestrator.device().clear_events();

        orchestrator.dispatch_frame();
        orchestrator.dispatch_frame();

        let events = orchestrator.device().events();
        let kinds: Vec<_> = events
            .iter()
            .map(|event| match event {
                DeviceEvent::AcquireImage => "acquire",
                DeviceEvent::Dispatch { .. } => "dispatch",
                DeviceEvent::ReleaseImage => "release",
                DeviceEvent::Wait => "wait",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["acquire", "dispatch", "release", "wait", "acquire", "dispatch", "release", "wait"]
        );

        let params = orchestrator.device().dispatches();
        assert_eq!(params[0].iteration, 0);
        assert_eq!(params[1].iteration, 1);
        for p in &params {
            assert_eq!(p.render_option, RenderOption::Depth.as_i32());
            assert!((0.0..1.0).contains(&p.random_seed));
        }

        let groups = events.iter().find_map(|event| match event {
            DeviceEvent::Dispatch { groups, .. } => Some(*groups),
            _ => None,
        });
        assert_eq!(groups, Some([4, 3]));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let (mut a, _, _) = ready(RenderSettings::default());
        let (mut b, _, _) = ready(RenderSettings::default());
        for _ in 0..5 {
            a.dispatch_frame();
            b.dispatch_frame();
        }
        assert_eq!(a.device().dispatches(), b.device().dispatches());
    }

    #[test]
    fn test_random_seed_mode_never_accumulates() {
        let (mut orchestrator, _scene, _display) = ready(RenderSettings::default().with_max_samples(2));
        orchestrator.set_render_option(RenderOption::RandomSeed);

        for _ in 0..5 {
            assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 1 });
        }
        assert!(orchestrator.device().dispatches().iter().all(|p| p.iteration == 0));
    }

    #[test]
    fn test_failed_dispatch_skips_frame() {
        let (mut orchestrator, _scene, mut display) = ready(RenderSettings::default());
        orchestrator.dispatch_frame();

        orchestrator.device().fail_dispatches(1);
        let status = orchestrator.dispatch_frame();
        assert!(matches!(status, FrameStatus::Skipped(FrameError::Device(DeviceError::OutOfMemory(_)))));
        assert_eq!(orchestrator.iteration(), 1);

        // The image went back to the display despite the failure
        assert!(orchestrator.bridge().display_image().is_ok());
        orchestrator.present(&mut display).unwrap();

        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 2 });
    }

    #[test]
    fn test_failed_acquire_skips_frame() {
        let (mut orchestrator, _scene, _display) = ready(RenderSettings::default());
        orchestrator.device().fail_acquires(1);

        assert!(matches!(orchestrator.dispatch_frame(), FrameStatus::Skipped(_)));
        assert_eq!(orchestrator.iteration(), 0);
        assert!(orchestrator.device().dispatches().is_empty());

        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 1 });
    }

    #[test]
    fn test_camera_move_syncs_camera_only() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        orchestrator.dispatch_frame();
        orchestrator.device().clear_events();

        scene.move_camera(MoveDirection::Forward);
        assert!(orchestrator.listener().is_pending());
        orchestrator.process_scene_events(&scene).unwrap();

        assert!(!orchestrator.listener().is_pending());
        assert_eq!(
            orchestrator.device().events(),
            vec![DeviceEvent::Write("Camera Buffer".to_string())]
        );
        assert_eq!(orchestrator.iteration(), 0);
    }

    #[test]
    fn test_geometry_edit_resyncs_scene() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        orchestrator.device().clear_events();

        scene.add_triangle(Vec3::ZERO, Vec3::X, Vec3::Y, &Material::light(Vec3::ONE));
        orchestrator.process_scene_events(&scene).unwrap();

        let uploads = orchestrator.device().uploads();
        let triangles = uploads.iter().find(|(name, _)| name == "Triangle Buffer").unwrap();
        assert_eq!(triangles.1, bytemuck::cast_slice::<GpuTriangle, u8>(scene.triangles()).to_vec());
        assert!(orchestrator.device().releases().contains(&"Sphere Buffer".to_string()));
    }

    #[test]
    fn test_resize_event_rebinds_display() {
        let (mut orchestrator, mut scene, mut display) = ready(RenderSettings::default());

        scene.change_resolution(100, 20);
        orchestrator.process_scene_events(&scene).unwrap();
        assert_eq!(orchestrator.bridge().extent(), (100, 20));
        assert_eq!(orchestrator.work_size().global, [112, 32]);

        orchestrator.present(&mut display).unwrap();
        orchestrator.present(&mut display).unwrap();
        assert_eq!(display.bound, vec![(64, 48), (100, 20)]);
        assert_eq!(display.draws, 2);
    }

    #[test]
    fn test_change_scene_moves_listener() {
        let (mut orchestrator, _old_scene, _display) = ready(RenderSettings::default());
        let mut new_scene = Scene::new(32, 32);
        new_scene.add_sphere(Vec3::ZERO, 1.0, &Material::default());

        orchestrator.change_scene(&mut new_scene).unwrap();
        assert_eq!(orchestrator.bridge().extent(), (32, 32));

        new_scene.move_camera(MoveDirection::Up);
        assert!(orchestrator.listener().is_pending());
        orchestrator.process_scene_events(&new_scene).unwrap();
        assert!(!orchestrator.listener().is_pending());
    }

    #[test]
    fn test_present_display_error() {
        let (mut orchestrator, _scene, mut display) = ready(RenderSettings::default());
        display.fail_draws = true;

        assert!(matches!(orchestrator.present(&mut display), Err(PresentError::Display(_))));
    }

    #[test]
    fn test_snapshot_reads_image() {
        let (orchestrator, _scene, _display) = ready(RenderSettings::default());
        let snapshot = orchestrator.snapshot().unwrap();

        assert_eq!((snapshot.width(), snapshot.height()), (64, 48));
        assert_eq!(snapshot.pixel(0, 0), Some([0.0; 4]));
    }

    #[test]
    fn test_shutdown_releases_in_reverse_order() {
        let (mut orchestrator, _scene, mut display) = ready(RenderSettings::default());
        orchestrator.device().clear_events();

        orchestrator.shutdown();
        assert_eq!(
            orchestrator.device().releases(),
            vec![
                "Light Triangle Buffer",
                "Triangle Buffer",
                "Light Sphere Buffer",
                "Sphere Buffer",
                "Shared Image",
                "Camera Buffer",
                "Scene Info Buffer",
            ]
        );
        assert_eq!(orchestrator.device().live_buffers(), 0);
        assert_eq!(orchestrator.phase(), RenderPhase::ShuttingDown);

        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Skipped(FrameError::ShutDown));
        assert!(orchestrator.present(&mut display).is_err());

        orchestrator.shutdown();
        assert_eq!(orchestrator.device().releases().len(), 7);
    }

    #[test]
    fn test_failed_scene_upload_keeps_previous_buffers() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        orchestrator.dispatch_frame();
        let live = orchestrator.device().live_buffers();
        orchestrator.device().clear_events();

        // The light sphere buffer fails after the sphere buffer was created
        orchestrator.device().fail_create_after(1);
        scene.add_sphere(Vec3::new(1.0, 1.0, 0.0), 0.5, &Material::light(Vec3::ONE));
        assert!(matches!(
            orchestrator.process_scene_events(&scene),
            Err(FrameError::Device(DeviceError::OutOfMemory(_)))
        ));

        assert!(orchestrator.listener().is_pending());
        assert_eq!(orchestrator.device().live_buffers(), live);
        assert_eq!(orchestrator.device().releases(), vec!["Sphere Buffer".to_string()]);

        // Still renders the previous scene meanwhile
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 2 });

        orchestrator.device().clear_events();
        orchestrator.process_scene_events(&scene).unwrap();
        assert!(!orchestrator.listener().is_pending());
        assert_eq!(orchestrator.device().live_buffers(), live);

        let uploads = orchestrator.device().uploads();
        let spheres = uploads.iter().find(|(name, _)| name == "Sphere Buffer").unwrap();
        assert_eq!(spheres.1.len(), 3 * std::mem::size_of::<GpuSphere>());
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 1 });
    }

    #[test]
    fn test_failed_scene_info_write_releases_new_buffers() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        let live = orchestrator.device().live_buffers();
        orchestrator.device().clear_events();

        orchestrator.device().fail_writes(1);
        scene.add_triangle(Vec3::ZERO, Vec3::X, Vec3::Y, &Material::default());
        assert!(orchestrator.process_scene_events(&scene).is_err());

        assert_eq!(orchestrator.device().live_buffers(), live);
        assert_eq!(
            orchestrator.device().releases(),
            vec!["Light Triangle Buffer", "Triangle Buffer", "Light Sphere Buffer", "Sphere Buffer"]
        );
        assert!(orchestrator.listener().is_pending());

        orchestrator.process_scene_events(&scene).unwrap();
        assert_eq!(orchestrator.device().live_buffers(), live);
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 1 });
    }

    #[test]
    fn test_failed_resize_is_retried() {
        let (mut orchestrator, mut scene, mut display) = ready(RenderSettings::default());
        orchestrator.dispatch_frame();

        orchestrator.device().fail_create_after(0);
        scene.change_resolution(100, 20);
        assert!(orchestrator.process_scene_events(&scene).is_err());

        assert_eq!(orchestrator.bridge().extent(), (64, 48));
        assert_eq!(orchestrator.work_size().global, [64, 48]);
        assert!(orchestrator.listener().is_pending());
        assert_eq!(orchestrator.device().live_buffers(), 7);
        assert_eq!(orchestrator.dispatch_frame(), FrameStatus::Dispatched { iteration: 2 });
        orchestrator.present(&mut display).unwrap();

        orchestrator.process_scene_events(&scene).unwrap();
        assert_eq!(orchestrator.bridge().extent(), (100, 20));
        assert!(!orchestrator.listener().is_pending());
        assert_eq!(orchestrator.device().live_buffers(), 7);
        assert_eq!(orchestrator.iteration(), 0);
    }

    #[test]
    fn test_failed_camera_write_is_retried() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        orchestrator.device().clear_events();

        orchestrator.device().fail_writes(1);
        scene.move_camera(MoveDirection::Left);
        assert!(orchestrator.process_scene_events(&scene).is_err());
        assert!(orchestrator.listener().is_pending());

        orchestrator.process_scene_events(&scene).unwrap();
        assert_eq!(
            orchestrator.device().events(),
            vec![DeviceEvent::Write("Camera Buffer".to_string())]
        );
        assert!(!orchestrator.listener().is_pending());
    }

    #[test]
    fn test_resize_with_geometry_edit_recreates_image_once() {
        let (mut orchestrator, mut scene, _display) = ready(RenderSettings::default());
        orchestrator.device().clear_events();

        scene.change_resolution(32, 32);
        scene.add_sphere(Vec3::ZERO, 0.5, &Material::default());
        orchestrator.process_scene_events(&scene).unwrap();

        let images = orchestrator
            .device()
            .events()
            .iter()
            .filter(|event| **event == DeviceEvent::Create("Shared Image".to_string()))
            .count();
        assert_eq!(images, 1);
        assert_eq!(orchestrator.bridge().extent(), (32, 32));
    }

    #[test]
    fn test_floor_and_light_end_to_end() {
        let _ = env_logger::builder().is_test(true).try_init();
        let cap = 25;
        let (mut orchestrator, scene, _display) = ready(RenderSettings::default().with_max_samples(cap));

        let info = scene.scene_info();
        assert_eq!(info.light_sphere_count, 1);
        assert!((info.total_radiance - 17.32).abs() < 0.01);

        let mut frames = 0;
        while orchestrator.dispatch_frame() != FrameStatus::SampleCapReached {
            frames += 1;
            assert!(frames <= cap);
        }

        assert_eq!(orchestrator.iteration(), cap);
        assert_eq!(orchestrator.phase(), RenderPhase::Rendering { iteration: cap });
        assert_eq!(orchestrator.device().dispatches().len(), cap as usize);
    }
}
