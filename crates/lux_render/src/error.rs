//! Error types for the render core.
//!
//! Initialization errors are fatal; everything else is reported per frame
//! and the next frame tries again.

use thiserror::Error;

/// Failures while bringing up the device, kernel or initial buffers.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("No compatible GPU adapter found")]
    NoCompatibleDevice,

    #[error("Failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Kernel failed to compile:\n{diagnostics}")]
    KernelCompile { diagnostics: String },

    #[error("Failed to create kernel '{entry_point}':\n{diagnostics}")]
    KernelCreation {
        entry_point: String,
        diagnostics: String,
    },

    #[error("Renderer is already initialized")]
    AlreadyInitialized,

    #[error("Device error during initialization: {0}")]
    Device(#[from] DeviceError),

    #[error("Frame setup failed during initialization: {0}")]
    Frame(#[from] FrameError),
}

/// Failures reported by a single device call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Device out of memory: {0}")]
    OutOfMemory(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Device lost")]
    Lost,

    #[error("Buffer readback failed: {0}")]
    Readback(String),

    #[error("Kernel was built for {expected:?} work-groups, dispatch asked for {actual:?}")]
    WorkGroupMismatch { expected: [u32; 2], actual: [u32; 2] },

    #[error("Kernel is not loaded")]
    KernelMissing,
}

/// Misuse of the shared image hand-off.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Image is already held by the compute device")]
    Busy,

    #[error("Image is not held by the compute device")]
    NotAcquired,

    #[error("No image has been created yet")]
    Unbound,

    #[error("Image extent {width}x{height} is empty")]
    EmptyExtent { width: u32, height: u32 },
}

/// Failures of steady-state operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Renderer is not initialized")]
    NotInitialized,

    #[error("Renderer has been shut down")]
    ShutDown,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Presentation failures: either the hand-off or the display surface itself.
#[derive(Error, Debug)]
pub enum PresentError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Display surface error: {0}")]
    Display(#[source] E),
}

impl From<BridgeError> for InitError {
    fn from(err: BridgeError) -> Self {
        InitError::Frame(FrameError::Bridge(err))
    }
}

impl From<wgpu::Error> for DeviceError {
    fn from(err: wgpu::Error) -> Self {
        let message = err.to_string();
        match err {
            wgpu::Error::OutOfMemory { .. } => DeviceError::OutOfMemory(message),
            _ => DeviceError::Validation(message),
        }
    }
}
