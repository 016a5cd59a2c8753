//! Dispatch grid sizing.

/// Round `dim` up to the next multiple of `local`.
///
/// Returns `dim` unchanged when it already divides evenly.
pub fn global_work_size(dim: u32, local: u32) -> u32 {
    let remainder = dim % local;
    if remainder == 0 {
        dim
    } else {
        dim + local - remainder
    }
}

/// Two-dimensional dispatch extent in work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub global: [u32; 2],
    pub local: [u32; 2],
}

impl WorkSize {
    /// Grid covering a `width` x `height` image with `local`-sized tiles.
    pub fn for_image(width: u32, height: u32, local: [u32; 2]) -> Self {
        Self {
            global: [
                global_work_size(width, local[0]),
                global_work_size(height, local[1]),
            ],
            local,
        }
    }

    /// Number of work-groups along each axis.
    pub fn groups(&self) -> [u32; 2] {
        [self.global[0] / self.local[0], self.global[1] / self.local[1]]
    }
}
