// Re-export glam for convenience
pub use glam::*;

// Lux math types
mod camera;
pub use camera::{CameraRecord, InteractiveCamera};
