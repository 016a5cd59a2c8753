//! The compute device seam.
//!
//! [`RenderOrchestrator`](crate::RenderOrchestrator) talks to the GPU only
//! through [`ComputeDevice`]. [`ComputeContext`](crate::ComputeContext) is
//! the wgpu implementation; tests substitute a recording device.

use crate::error::{DeviceError, InitError};
use crate::work_size::WorkSize;

/// How a buffer is bound to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Read-only array of records
    Storage,
    /// Small fixed-size record, rewritten in place
    Uniform,
    /// The shared image, written by compute and read by the display
    Image,
}

/// Per-dispatch scalars, laid out as the kernel's `FrameParams` uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParams {
    pub iteration: i32,
    pub random_seed: f32,
    pub render_option: i32,
    _pad: i32,
}

impl FrameParams {
    pub fn new(iteration: u32, random_seed: f32, render_option: i32) -> Self {
        Self {
            iteration: iteration as i32,
            random_seed,
            render_option,
            _pad: 0,
        }
    }
}

/// Kernel arguments in binding order.
///
/// The kernel declares them as `@group(0) @binding(0..=7)` in exactly this
/// sequence; `params` is the last binding.
pub struct KernelArgs<'a, B> {
    pub image: &'a B,
    pub spheres: &'a B,
    pub light_spheres: &'a B,
    pub triangles: &'a B,
    pub light_triangles: &'a B,
    pub scene_info: &'a B,
    pub camera: &'a B,
    pub params: FrameParams,
}

/// Operations the orchestrator needs from a compute device.
pub trait ComputeDevice {
    type Buffer;

    /// Compile the kernel program and create its entry points.
    fn load_program(&mut self, source: &str) -> Result<(), InitError>;

    /// Allocate a buffer holding exactly `contents`.
    fn create_buffer(
        &self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<Self::Buffer, DeviceError>;

    /// Allocate a zero-filled buffer of `size` bytes.
    fn create_zeroed(&self, label: &str, kind: BufferKind, size: u64) -> Result<Self::Buffer, DeviceError>;

    /// Overwrite a buffer from offset 0.
    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> Result<(), DeviceError>;

    /// Free a buffer's device memory.
    fn release_buffer(&self, buffer: Self::Buffer);

    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;

    /// Copy a buffer back to host memory. Blocks until the copy is done.
    fn read_buffer(&self, buffer: &Self::Buffer) -> Result<Vec<u8>, DeviceError>;

    /// Take the shared image away from the display before a dispatch.
    fn acquire_image(&self, _image: &Self::Buffer) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Hand the shared image back to the display after a dispatch.
    fn release_image(&self, _image: &Self::Buffer) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Enqueue one run of the render kernel.
    fn dispatch(&self, args: &KernelArgs<'_, Self::Buffer>, work: WorkSize) -> Result<(), DeviceError>;

    /// Block until all submitted work has finished.
    fn wait_idle(&self) -> Result<(), DeviceError>;
}
