/// Renderer configuration and device limits

use crate::error::Result;
use crate::graphics_device::SampleCount;
use crate::engine_bail;

/// Frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Preferred presentation mode
///
/// The backend falls back to `Fifo` (always supported) when the preferred
/// mode is not offered by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// V-synced queue
    Fifo,
    /// V-synced, newest image replaces queued one
    Mailbox,
    /// No v-sync, may tear
    Immediate,
}

/// Limits reported by the graphics device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    /// Maximum byte size of all push constant ranges
    pub max_push_constants_size: u32,
    /// Maximum anisotropy a sampler may request
    pub max_sampler_anisotropy: f32,
    /// Alignment of dynamic uniform buffer offsets
    pub min_uniform_buffer_offset_alignment: u64,
    /// Highest sample count supported for both color and depth attachments
    pub max_msaa_samples: SampleCount,
}

impl Default for DeviceLimits {
    /// Minimum guarantees of a conformant Vulkan 1.0 implementation
    fn default() -> Self {
        Self {
            max_push_constants_size: 128,
            max_sampler_anisotropy: 1.0,
            min_uniform_buffer_offset_alignment: 256,
            max_msaa_samples: SampleCount::X4,
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable API validation layers
    pub enable_validation: bool,
    /// Number of frame-in-flight slots
    pub max_frames_in_flight: usize,
    /// Requested MSAA sample count (clamped to the device limit)
    pub msaa_samples: SampleCount,
    /// Width and height of the square shadow map
    pub shadow_map_size: u32,
    /// Offscreen pass renders at `extent / offscreen_divisor`
    pub offscreen_divisor: u32,
    /// In-flight fence wait timeout; `u64::MAX` waits forever
    pub fence_timeout_ns: u64,
    /// Preferred presentation mode
    pub present_mode: PresentMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Lumen3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            max_frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            msaa_samples: SampleCount::X4,
            shadow_map_size: 2048,
            offscreen_divisor: 2,
            fence_timeout_ns: u64::MAX,
            present_mode: PresentMode::Fifo,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_frames_in_flight == 0 {
            engine_bail!("lumen3d::config", "max_frames_in_flight must be at least 1");
        }
        if self.shadow_map_size == 0 {
            engine_bail!("lumen3d::config", "shadow_map_size must be non-zero");
        }
        if self.offscreen_divisor == 0 {
            engine_bail!("lumen3d::config", "offscreen_divisor must be non-zero");
        }
        Ok(())
    }

    /// Requested MSAA count clamped to what the device supports
    pub fn effective_samples(&self, limits: &DeviceLimits) -> SampleCount {
        if self.msaa_samples.count() > limits.max_msaa_samples.count() {
            limits.max_msaa_samples
        } else {
            self.msaa_samples
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
