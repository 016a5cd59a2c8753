//! Adapter selection policy.

use wgpu::DeviceType;

/// What the selection policy looks at for each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCandidate {
    pub device_type: DeviceType,
    /// Largest buffer the adapter allows; stands in for device memory size
    pub max_buffer_size: u64,
}

impl AdapterCandidate {
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        Self {
            device_type: adapter.get_info().device_type,
            max_buffer_size: adapter.limits().max_buffer_size,
        }
    }
}

fn type_rank(device_type: DeviceType) -> u8 {
    match device_type {
        DeviceType::DiscreteGpu => 4,
        DeviceType::IntegratedGpu => 3,
        DeviceType::VirtualGpu => 2,
        DeviceType::Cpu => 1,
        DeviceType::Other => 0,
    }
}

/// Index of the preferred adapter.
///
/// Discrete GPUs win, then integrated, virtual and software adapters; within
/// a class the one with the most memory wins. Ties keep the earlier
/// candidate. Returns `None` only for an empty list.
pub fn select_adapter(candidates: &[AdapterCandidate]) -> Option<usize> {
    let mut best: Option<(usize, &AdapterCandidate)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, current)) => {
                (type_rank(candidate.device_type), candidate.max_buffer_size)
                    > (type_rank(current.device_type), current.max_buffer_size)
            }
        };
        if better {
            best = Some((index, candidate));
        }
    }

    best.map(|(index, _)| index)
}
