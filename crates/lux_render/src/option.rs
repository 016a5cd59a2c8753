//! Kernel output channels.

/// Which buffer the kernel writes into the image.
///
/// Discriminants are sent to the kernel as `render_option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum RenderOption {
    /// Path-traced, accumulated color
    #[default]
    Color = 0,
    Normal = 1,
    Depth = 2,
    /// Albedo of the first hit, unlit
    RawColor = 3,
    Emittance = 4,
    ObjectId = 5,
    SurfaceCharacteristic = 6,
    /// Per-pixel random numbers; never converges
    RandomSeed = 7,
}

impl RenderOption {
    pub const ALL: [RenderOption; 8] = [
        RenderOption::Color,
        RenderOption::Normal,
        RenderOption::Depth,
        RenderOption::RawColor,
        RenderOption::Emittance,
        RenderOption::ObjectId,
        RenderOption::SurfaceCharacteristic,
        RenderOption::RandomSeed,
    ];

    /// Value passed to the kernel.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether accumulation restarts every frame in this mode.
    pub fn is_diagnostic_noise(self) -> bool {
        self == RenderOption::RandomSeed
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderOption::Color => "Color",
            RenderOption::Normal => "Normal",
            RenderOption::Depth => "Depth",
            RenderOption::RawColor => "Raw color",
            RenderOption::Emittance => "Emittance",
            RenderOption::ObjectId => "Object id",
            RenderOption::SurfaceCharacteristic => "Surface characteristic",
            RenderOption::RandomSeed => "Random seed",
        }
    }
}
