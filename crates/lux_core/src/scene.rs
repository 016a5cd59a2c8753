//! The scene store.
//!
//! A `Scene` owns the primitive containers, the derived light lists and the
//! interactive camera. Whoever keeps GPU copies of this data subscribes as a
//! [`SceneListener`] and is told when it has gone stale.

use std::rc::Rc;

use lux_math::{CameraRecord, IVec2, InteractiveCamera, Vec3};

use crate::primitives::{GpuSphere, GpuTriangle, LightSphere, LightTriangle, Material, SceneInfo};

/// Distance covered by one keyboard movement step.
const MOVE_STEP: f32 = 0.1;

/// Receives change notifications from a [`Scene`].
pub trait SceneListener {
    /// Primitives, background or camera pose changed.
    fn on_content_changed(&self);

    /// The output resolution changed.
    fn on_resolution_changed(&self, width: u32, height: u32);
}

/// Keyboard-driven camera movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Backward,
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
}

/// Primitives, lights and camera for one renderable scene.
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,

    spheres: Vec<GpuSphere>,
    light_spheres: Vec<LightSphere>,
    triangles: Vec<GpuTriangle>,
    light_triangles: Vec<LightTriangle>,
    total_radiance: f32,
    background_color: Vec3,

    camera: InteractiveCamera,
    listener: Option<Rc<dyn SceneListener>>,

    /// Bumped whenever data that lives in the scene buffers changes
    revision: u64,
}

/// A copy starts unlinked; edits to it notify nobody.
impl Clone for Scene {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            spheres: self.spheres.clone(),
            light_spheres: self.light_spheres.clone(),
            triangles: self.triangles.clone(),
            light_triangles: self.light_triangles.clone(),
            total_radiance: self.total_radiance,
            background_color: self.background_color,
            camera: self.camera.clone(),
            listener: None,
            revision: self.revision,
        }
    }
}

impl Scene {
    /// Create an empty scene rendered at the given resolution.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            name: String::new(),
            spheres: Vec::new(),
            light_spheres: Vec::new(),
            triangles: Vec::new(),
            light_triangles: Vec::new(),
            total_radiance: 0.0,
            background_color: Vec3::splat(0.7),
            camera: InteractiveCamera::new(width, height),
            listener: None,
            revision: 0,
        }
    }

    /// Set the scene name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a sphere and return its index.
    pub fn add_sphere(&mut self, position: Vec3, radius: f32, material: &Material) -> usize {
        let id = self.spheres.len();
        self.spheres.push(GpuSphere::new(position, radius, material));

        if let Some(radiance) = material.radiance() {
            self.light_spheres.push(LightSphere {
                sphere_id: id as i32,
                radiance,
            });
            self.total_radiance += radiance;
        }

        self.mark_modified();
        id
    }

    /// Add a triangle and return its index.
    pub fn add_triangle(&mut self, p1: Vec3, p2: Vec3, p3: Vec3, material: &Material) -> usize {
        let id = self.triangles.len();
        self.triangles.push(GpuTriangle::new(p1, p2, p3, material));

        if let Some(radiance) = material.radiance() {
            self.light_triangles.push(LightTriangle {
                triangle_id: id as i32,
                radiance,
            });
            self.total_radiance += radiance;
        }

        self.mark_modified();
        id
    }

    /// Add a quad as the triangles (p1, p2, p3) and (p2, p3, p4).
    pub fn add_plane(&mut self, p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3, material: &Material) {
        self.add_triangle(p1, p2, p3, material);
        self.add_triangle(p2, p3, p4, material);
    }

    pub fn set_background_color(&mut self, color: Vec3) {
        self.background_color = color;
        self.mark_modified();
    }

    pub fn background_color(&self) -> Vec3 {
        self.background_color
    }

    /// Replace the camera. Its resolution becomes the scene resolution.
    pub fn set_camera(&mut self, camera: InteractiveCamera) {
        let resolution = camera.resolution();
        let resized = resolution != self.camera.resolution();
        self.camera = camera;

        if resized {
            self.notify_resolution_changed(resolution);
        }
        self.notify_content_changed();
    }

    pub fn camera(&self) -> &InteractiveCamera {
        &self.camera
    }

    /// Subscribe a listener, replacing any previous one.
    pub fn link_update_listener(&mut self, listener: Rc<dyn SceneListener>) {
        self.listener = Some(listener);
    }

    pub fn spheres(&self) -> &[GpuSphere] {
        &self.spheres
    }

    pub fn light_spheres(&self) -> &[LightSphere] {
        &self.light_spheres
    }

    pub fn triangles(&self) -> &[GpuTriangle] {
        &self.triangles
    }

    pub fn light_triangles(&self) -> &[LightTriangle] {
        &self.light_triangles
    }

    /// Aggregate counts, derived from the containers on every call.
    pub fn scene_info(&self) -> SceneInfo {
        SceneInfo::new(
            self.spheres.len(),
            self.light_spheres.len(),
            self.triangles.len(),
            self.light_triangles.len(),
            self.total_radiance,
            self.background_color,
        )
    }

    /// Counter that changes whenever the scene buffers need re-uploading.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn render_camera(&self) -> CameraRecord {
        self.camera.create_render_camera()
    }

    pub fn resolution(&self) -> IVec2 {
        self.camera.resolution()
    }

    /// Change the output size and tell the listener.
    pub fn change_resolution(&mut self, width: i32, height: i32) {
        self.camera.set_resolution(width, height);
        self.notify_resolution_changed(IVec2::new(width, height));
    }

    pub fn initial_mouse_position(&mut self, x: f32, y: f32) {
        self.camera.set_initial_mouse_position(x, y);
    }

    pub fn update_mouse_position(&mut self, x: f32, y: f32) {
        self.camera.handle_mouse_movement(x, y);
        self.notify_content_changed();
    }

    /// Move the camera one step.
    pub fn move_camera(&mut self, direction: MoveDirection) {
        let camera = &mut self.camera;
        match direction {
            MoveDirection::Forward => camera.go_forward(MOVE_STEP),
            MoveDirection::Backward => camera.go_forward(-MOVE_STEP),
            MoveDirection::Up => camera.change_altitude(MOVE_STEP),
            MoveDirection::Down => camera.change_altitude(-MOVE_STEP),
            MoveDirection::Right => camera.strafe(MOVE_STEP),
            MoveDirection::Left => camera.strafe(-MOVE_STEP),
            MoveDirection::YawRight => camera.change_yaw(MOVE_STEP),
            MoveDirection::YawLeft => camera.change_yaw(-MOVE_STEP),
            MoveDirection::PitchUp => camera.change_pitch(MOVE_STEP),
            MoveDirection::PitchDown => camera.change_pitch(-MOVE_STEP),
        }

        self.notify_content_changed();
    }

    fn mark_modified(&mut self) {
        self.revision += 1;
        self.notify_content_changed();
    }

    fn notify_content_changed(&self) {
        if let Some(listener) = &self.listener {
            listener.on_content_changed();
        }
    }

    fn notify_resolution_changed(&self, resolution: IVec2) {
        if let Some(listener) = &self.listener {
            listener.on_resolution_changed(resolution.x.max(0) as u32, resolution.y.max(0) as u32);
        }
    }
}
