use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{IVec2, Vec2, Vec3};

/// Keeps pitch away from the poles where the view and up axes become parallel.
const PITCH_PADDING: f32 = 0.01;

/// Radians of rotation per pixel of mouse movement.
const MOUSE_SENSITIVITY: f32 = 0.01;

/// Camera record as the compute kernel reads it.
///
/// Matches the WGSL uniform layout: every `vec3<f32>` occupies 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraRecord {
    pub position: [f32; 3],
    _pad0: f32,
    pub view: [f32; 3],
    _pad1: f32,
    pub up: [f32; 3],
    _pad2: f32,
    /// Field of view in degrees (horizontal, vertical)
    pub fov: [f32; 2],
    /// Image size in pixels (width, height)
    pub resolution: [i32; 2],
}

impl CameraRecord {
    pub fn new(position: Vec3, view: Vec3, up: Vec3, fov: Vec2, resolution: IVec2) -> Self {
        Self {
            position: position.to_array(),
            view: view.to_array(),
            up: up.to_array(),
            fov: fov.to_array(),
            resolution: resolution.to_array(),
            ..Default::default()
        }
    }
}

/// Orbit camera driven by keyboard and mouse input.
///
/// The eye sits on a sphere of `radius` around `center`, placed by yaw and
/// pitch. Nothing derived from the angles is cached; view and strafe axes
/// are recomputed whenever they are needed.
#[derive(Debug, Clone)]
pub struct InteractiveCamera {
    pub center: Vec3,
    yaw: f32,
    pitch: f32,
    pub radius: f32,
    resolution: IVec2,
    /// Field of view in degrees
    pub fov: Vec2,

    last_mouse: Vec2,
}

impl InteractiveCamera {
    /// Create a camera at the origin looking down -Z.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            center: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            radius: 1.0,
            resolution: IVec2::new(width, height),
            fov: Vec2::new(40.0, 40.0),
            last_mouse: Vec2::ZERO,
        }
    }

    /// Set orbit parameters in one go.
    pub fn with_orbit(mut self, center: Vec3, yaw: f32, pitch: f32, radius: f32) -> Self {
        self.center = center;
        self.radius = radius;
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.change_yaw(yaw);
        self.change_pitch(pitch);
        self
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn resolution(&self) -> IVec2 {
        self.resolution
    }

    pub fn set_resolution(&mut self, width: i32, height: i32) {
        self.resolution = IVec2::new(width, height);
    }

    /// Unit vector from the orbit center towards the eye.
    fn direction_to_camera(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
    }

    /// Direction the camera looks in.
    pub fn view_direction(&self) -> Vec3 {
        -self.direction_to_camera()
    }

    /// Axis pointing to the right of the view, parallel to the ground.
    pub fn strafe_axis(&self) -> Vec3 {
        self.view_direction().cross(Vec3::Y).normalize()
    }

    /// World-space eye position.
    pub fn eye_position(&self) -> Vec3 {
        self.center + self.direction_to_camera() * self.radius
    }

    /// Build the record the kernel consumes.
    pub fn create_render_camera(&self) -> CameraRecord {
        CameraRecord::new(
            self.eye_position(),
            self.view_direction().normalize(),
            Vec3::Y,
            self.fov,
            self.resolution,
        )
    }

    /// Remember where a drag started.
    pub fn set_initial_mouse_position(&mut self, x: f32, y: f32) {
        self.last_mouse = Vec2::new(x, y);
    }

    /// Turn a cursor move into yaw/pitch changes relative to the last position.
    pub fn handle_mouse_movement(&mut self, x: f32, y: f32) {
        let current = Vec2::new(x, y);
        let delta = current - self.last_mouse;
        self.last_mouse = current;

        self.change_yaw(delta.x * MOUSE_SENSITIVITY);
        self.change_pitch(delta.y * MOUSE_SENSITIVITY);
    }

    pub fn go_forward(&mut self, delta: f32) {
        self.center += self.view_direction() * delta;
    }

    pub fn strafe(&mut self, delta: f32) {
        self.center += self.strafe_axis() * delta;
    }

    pub fn change_altitude(&mut self, delta: f32) {
        self.center.y += delta;
    }

    /// Rotate around the vertical axis. Yaw stays within [0, 2π).
    pub fn change_yaw(&mut self, delta: f32) {
        self.yaw = (self.yaw + delta).rem_euclid(TAU);
    }

    /// Tilt up or down, clamped short of straight up/down.
    pub fn change_pitch(&mut self, delta: f32) {
        self.pitch = (self.pitch + delta).clamp(-FRAC_PI_2 + PITCH_PADDING, FRAC_PI_2 - PITCH_PADDING);
    }
}
