//! Primitive records shared between the scene store and the compute kernel.
//!
//! Every struct here is `#[repr(C)]` and `Pod` so scene containers can be
//! uploaded with `bytemuck::cast_slice`. `vec3<f32>` fields in WGSL storage
//! and uniform buffers are 16-byte aligned, hence the explicit padding.

use lux_math::Vec3;

/// Emittance magnitudes at or below this are not treated as lights.
pub const LIGHT_EPSILON: f32 = f32::EPSILON;

/// Surface description used when adding primitives.
///
/// Replaces per-call default arguments: start from [`Material::new`] and
/// override what differs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Albedo (RGB, 0-1)
    pub color: Vec3,

    /// Emitted radiance (RGB, unbounded)
    pub emittance: Vec3,

    /// Weight of diffuse reflection
    pub diffuse: f32,

    /// Weight of mirror reflection
    pub specular: f32,

    /// Weight of refraction
    pub transmissive: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.5),
            emittance: Vec3::ZERO,
            diffuse: 1.0,
            specular: 0.0,
            transmissive: 0.0,
        }
    }
}

impl Material {
    /// A purely diffuse, non-emissive material.
    pub fn new(color: Vec3) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// A light source. Color is irrelevant for emitters and left black.
    pub fn light(emittance: Vec3) -> Self {
        Self {
            color: Vec3::ZERO,
            emittance,
            ..Default::default()
        }
    }

    pub fn with_emittance(mut self, emittance: Vec3) -> Self {
        self.emittance = emittance;
        self
    }

    pub fn with_surface(mut self, diffuse: f32, specular: f32, transmissive: f32) -> Self {
        self.diffuse = diffuse;
        self.specular = specular;
        self.transmissive = transmissive;
        self
    }

    /// Radiance if this material should be registered as a light.
    pub fn radiance(&self) -> Option<f32> {
        let radiance = self.emittance.length();
        (radiance > LIGHT_EPSILON).then_some(radiance)
    }

    /// Diffuse/specular/transmissive weights normalized to unit length.
    ///
    /// All-zero weights have no direction; they fall back to pure diffuse.
    pub fn surface_characteristic(&self) -> Vec3 {
        let weights = Vec3::new(self.diffuse, self.specular, self.transmissive);
        match weights.try_normalize() {
            Some(normalized) => normalized,
            None => {
                log::warn!("Surface weights {:?} cannot be normalized, using diffuse", weights);
                Vec3::X
            }
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuSphere {
    pub radius: f32,
    _pad0: [f32; 3],
    pub position: [f32; 3],
    _pad1: f32,
    pub color: [f32; 3],
    _pad2: f32,
    pub emittance: [f32; 3],
    _pad3: f32,
    pub surface: [f32; 3],
    _pad4: f32,
}

impl GpuSphere {
    pub fn new(position: Vec3, radius: f32, material: &Material) -> Self {
        Self {
            radius,
            position: position.to_array(),
            color: material.color.to_array(),
            emittance: material.emittance.to_array(),
            surface: material.surface_characteristic().to_array(),
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuTriangle {
    pub p1: [f32; 3],
    _pad0: f32,
    pub p2: [f32; 3],
    _pad1: f32,
    pub p3: [f32; 3],
    _pad2: f32,
    pub color: [f32; 3],
    _pad3: f32,
    pub emittance: [f32; 3],
    _pad4: f32,
    pub surface: [f32; 3],
    _pad5: f32,
}

impl GpuTriangle {
    pub fn new(p1: Vec3, p2: Vec3, p3: Vec3, material: &Material) -> Self {
        Self {
            p1: p1.to_array(),
            p2: p2.to_array(),
            p3: p3.to_array(),
            color: material.color.to_array(),
            emittance: material.emittance.to_array(),
            surface: material.surface_characteristic().to_array(),
            ..Default::default()
        }
    }
}

/// Entry in the emitter list: which sphere, and how bright.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightSphere {
    pub sphere_id: i32,
    pub radiance: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightTriangle {
    pub triangle_id: i32,
    pub radiance: f32,
}

/// Aggregate scene counts read by the kernel before touching the arrays.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneInfo {
    pub sphere_count: i32,
    pub light_sphere_count: i32,
    pub triangle_count: i32,
    pub light_triangle_count: i32,
    pub total_radiance: f32,
    _pad0: [f32; 3],
    pub background_color: [f32; 3],
    _pad1: f32,
}

impl SceneInfo {
    pub fn new(
        sphere_count: usize,
        light_sphere_count: usize,
        triangle_count: usize,
        light_triangle_count: usize,
        total_radiance: f32,
        background_color: Vec3,
    ) -> Self {
        Self {
            sphere_count: sphere_count as i32,
            light_sphere_count: light_sphere_count as i32,
            triangle_count: triangle_count as i32,
            light_triangle_count: light_triangle_count as i32,
            total_radiance,
            background_color: background_color.to_array(),
            ..Default::default()
        }
    }
}
