//! JSON scene descriptions.
//!
//! A small, flat format for scenes that do not warrant code:
//!
//! ```json
//! {
//!   "name": "two balls",
//!   "background": [0.1, 0.1, 0.1],
//!   "camera": { "center": [0, 0, 0], "yaw": 0.0, "pitch": 0.2, "radius": 4.0 },
//!   "spheres": [
//!     { "position": [0, -201, 0], "radius": 200, "color": [0.8, 0.8, 0.8] },
//!     { "position": [0, 1.8, 0], "radius": 1, "emittance": [10, 10, 10] }
//!   ]
//! }
//! ```

use std::path::Path;

use lux_math::{InteractiveCamera, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::primitives::Material;
use crate::scene::Scene;

/// Errors that can occur while loading a scene description.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Scene has no primitives")]
    Empty,
}

/// Result type for scene loading.
pub type SceneResult<T> = Result<T, SceneError>;

fn default_color() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_background() -> [f32; 3] {
    [0.7, 0.7, 0.7]
}

fn default_diffuse() -> f32 {
    1.0
}

fn default_radius() -> f32 {
    1.0
}

fn default_fov() -> [f32; 2] {
    [40.0, 40.0]
}

/// Surface attributes shared by every primitive entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDescription {
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default)]
    pub emittance: [f32; 3],
    #[serde(default = "default_diffuse")]
    pub diffuse: f32,
    #[serde(default)]
    pub specular: f32,
    #[serde(default)]
    pub transmissive: f32,
}

impl MaterialDescription {
    fn to_material(&self) -> Material {
        Material::new(Vec3::from_array(self.color))
            .with_emittance(Vec3::from_array(self.emittance))
            .with_surface(self.diffuse, self.specular, self.transmissive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SphereDescription {
    pub position: [f32; 3],
    pub radius: f32,
    #[serde(flatten)]
    pub material: MaterialDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleDescription {
    pub vertices: [[f32; 3]; 3],
    #[serde(flatten)]
    pub material: MaterialDescription,
}

/// Quad given by four corners; split like [`Scene::add_plane`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneDescription {
    pub corners: [[f32; 3]; 4],
    #[serde(flatten)]
    pub material: MaterialDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDescription {
    #[serde(default)]
    pub center: [f32; 3],
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_fov")]
    pub fov: [f32; 2],
}

impl Default for CameraDescription {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            yaw: 0.0,
            pitch: 0.0,
            radius: default_radius(),
            fov: default_fov(),
        }
    }
}

/// Top-level scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_background")]
    pub background: [f32; 3],
    #[serde(default)]
    pub camera: CameraDescription,
    #[serde(default)]
    pub spheres: Vec<SphereDescription>,
    #[serde(default)]
    pub triangles: Vec<TriangleDescription>,
    #[serde(default)]
    pub planes: Vec<PlaneDescription>,
}

impl SceneDescription {
    /// Parse a description from JSON text.
    pub fn from_json(text: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build a scene at the given output resolution.
    pub fn build(&self, width: i32, height: i32) -> SceneResult<Scene> {
        if self.spheres.is_empty() && self.triangles.is_empty() && self.planes.is_empty() {
            return Err(SceneError::Empty);
        }

        let mut scene = Scene::new(width, height).with_name(self.name.clone());
        scene.set_background_color(Vec3::from_array(self.background));

        let mut camera = InteractiveCamera::new(width, height).with_orbit(
            Vec3::from_array(self.camera.center),
            self.camera.yaw,
            self.camera.pitch,
            self.camera.radius,
        );
        camera.fov = Vec2::from_array(self.camera.fov);
        scene.set_camera(camera);

        for sphere in &self.spheres {
            scene.add_sphere(
                Vec3::from_array(sphere.position),
                sphere.radius,
                &sphere.material.to_material(),
            );
        }

        for triangle in &self.triangles {
            let [p1, p2, p3] = triangle.vertices.map(Vec3::from_array);
            scene.add_triangle(p1, p2, p3, &triangle.material.to_material());
        }

        for plane in &self.planes {
            let [p1, p2, p3, p4] = plane.corners.map(Vec3::from_array);
            scene.add_plane(p1, p2, p3, p4, &plane.material.to_material());
        }

        Ok(scene)
    }
}

/// Load a JSON scene description and build it at the given resolution.
pub fn load_scene<P: AsRef<Path>>(path: P, width: i32, height: i32) -> SceneResult<Scene> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut description = SceneDescription::from_json(&text)?;

    if description.name.is_empty() {
        description.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
    }

    let scene = description.build(width, height)?;
    log::info!(
        "Loaded scene '{}' from {:?}: {} spheres, {} triangles",
        scene.name,
        path,
        scene.spheres().len(),
        scene.triangles().len()
    );
    Ok(scene)
}
