/// Image formats, sample counts and 2D extents shared by every GPU resource

/// Image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    // Color formats
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,

    // Depth / depth-stencil formats
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,

    // Block-compressed formats (pre-mipmapped assets)
    BC1_RGBA_SRGB,
    BC3_SRGB,
    BC7_SRGB,
}

/// Depth formats carrying a stencil channel.
///
/// Aspect masks and attachment stencil ops are derived from this list only.
pub const STENCIL_FORMATS: [TextureFormat; 2] = [
    TextureFormat::D24_UNORM_S8_UINT,
    TextureFormat::D32_SFLOAT_S8_UINT,
];

impl TextureFormat {
    /// Whether the format has a depth channel
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM
                | TextureFormat::D32_SFLOAT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Whether the format has a stencil channel
    pub fn has_stencil(&self) -> bool {
        STENCIL_FORMATS.contains(self)
    }

    pub fn is_block_compressed(&self) -> bool {
        matches!(
            self,
            TextureFormat::BC1_RGBA_SRGB | TextureFormat::BC3_SRGB | TextureFormat::BC7_SRGB
        )
    }

    /// Bytes per pixel for uncompressed formats, bytes per 4x4 block otherwise
    pub fn block_size(&self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::D16_UNORM => 2,
            TextureFormat::D32_SFLOAT | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::D32_SFLOAT_S8_UINT => 8,
            TextureFormat::BC1_RGBA_SRGB => 8,
            TextureFormat::BC3_SRGB | TextureFormat::BC7_SRGB => 16,
        }
    }

    /// Byte size of one `width` x `height` image in this format
    pub fn image_size(&self, width: u32, height: u32) -> u64 {
        if self.is_block_compressed() {
            let blocks_x = width.div_ceil(4).max(1) as u64;
            let blocks_y = height.div_ceil(4).max(1) as u64;
            blocks_x * blocks_y * self.block_size() as u64
        } else {
            width as u64 * height as u64 * self.block_size() as u64
        }
    }
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleCount {
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
            SampleCount::X32 => 32,
            SampleCount::X64 => 64,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(SampleCount::X1),
            2 => Some(SampleCount::X2),
            4 => Some(SampleCount::X4),
            8 => Some(SampleCount::X8),
            16 => Some(SampleCount::X16),
            32 => Some(SampleCount::X32),
            64 => Some(SampleCount::X64),
            _ => None,
        }
    }

    pub fn is_multisampled(&self) -> bool {
        *self != SampleCount::X1
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized framebuffer
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Integer downscale, never below 1x1
    pub fn scaled_down(&self, divisor: u32) -> Self {
        let divisor = divisor.max(1);
        Self {
            width: (self.width / divisor).max(1),
            height: (self.height / divisor).max(1),
        }
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
