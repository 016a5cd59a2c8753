//! Renderer configuration.

/// Work-group size compiled into the kernel (`@workgroup_size(16, 16)`).
pub const KERNEL_WORKGROUP_SIZE: [u32; 2] = [16, 16];

/// Construction-time settings for a [`RenderOrchestrator`](crate::RenderOrchestrator).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Accumulated samples after which dispatching stops
    pub max_samples: u32,

    /// Local work-group size; must match the kernel
    pub local_work_size: [u32; 2],

    /// Seed for the per-frame random numbers; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            local_work_size: KERNEL_WORKGROUP_SIZE,
            seed: None,
        }
    }
}

impl RenderSettings {
    pub fn with_max_samples(mut self, max_samples: u32) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
