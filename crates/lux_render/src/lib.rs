//! Progressive GPU path tracing for Lux.
//!
//! [`RenderOrchestrator`] owns the GPU copies of a scene and accumulates one
//! sample per pixel per [`dispatch_frame`](RenderOrchestrator::dispatch_frame)
//! into an image shared with the display through a [`FrameBufferBridge`].
//! The GPU is reached through the [`ComputeDevice`] trait, implemented for
//! wgpu by [`ComputeContext`].

pub mod adapter;
pub mod bridge;
pub mod context;
pub mod device;
pub mod error;
pub mod option;
pub mod orchestrator;
pub mod settings;
pub mod snapshot;
pub mod work_size;

#[cfg(test)]
mod test_device;

pub use adapter::{select_adapter, AdapterCandidate};
pub use bridge::{DisplaySurface, FrameBufferBridge, ImageOwner, IMAGE_PIXEL_BYTES};
pub use context::{ComputeContext, PATH_TRACER_WGSL, RENDER_ENTRY_POINT};
pub use device::{BufferKind, ComputeDevice, FrameParams, KernelArgs};
pub use error::{BridgeError, DeviceError, FrameError, InitError, PresentError};
pub use option::RenderOption;
pub use orchestrator::{FrameStatus, RenderOrchestrator, RenderPhase, SceneEvents};
pub use settings::{RenderSettings, KERNEL_WORKGROUP_SIZE};
pub use snapshot::{ImageSnapshot, SnapshotError};
pub use work_size::{global_work_size, WorkSize};
