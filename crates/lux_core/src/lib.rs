//! Lux Core - Scene storage for the progressive path tracer.
//!
//! This crate provides:
//!
//! - **Primitive records**: `GpuSphere`, `GpuTriangle`, light lists and
//!   `SceneInfo`, laid out exactly as the compute kernel reads them
//! - **Scene store**: `Scene`, which owns the primitives and the
//!   interactive camera and notifies a `SceneListener` about changes
//! - **Scene descriptions**: JSON files and built-in demo scenes
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{Material, Scene};
//! use lux_math::Vec3;
//!
//! let mut scene = Scene::new(1280, 720);
//! scene.add_sphere(Vec3::new(0.0, -201.0, 0.0), 200.0, &Material::new(Vec3::splat(0.8)));
//! println!("{} spheres, {} lights",
//!     scene.scene_info().sphere_count,
//!     scene.scene_info().light_sphere_count);
//! ```

pub mod demo;
pub mod description;
pub mod primitives;
pub mod scene;

// Re-export commonly used types
pub use description::{load_scene, SceneDescription, SceneError};
pub use primitives::{GpuSphere, GpuTriangle, LightSphere, LightTriangle, Material, SceneInfo};
pub use scene::{MoveDirection, Scene, SceneListener};
