/// Swapchain trait - for window presentation

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{Extent2D, FrameSync, TextureFormat};

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; the slot's "image available" semaphore will signal.
    /// `suboptimal` asks for recreation after this frame is presented.
    Acquired { image_index: u32, suboptimal: bool },
    /// Surface changed; nothing was acquired and nothing will signal
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Swapchain for presenting rendered images to a window
///
/// Out-of-date and suboptimal results are reported as outcomes, not errors;
/// every other failure is fatal.
pub trait Swapchain: Send + Sync {
    /// Acquire the next image, signaling the slot's "image available" semaphore
    fn acquire_next_image(&mut self, sync: &dyn FrameSync) -> Result<AcquireOutcome>;

    /// Present `image_index` after the slot's "render finished" semaphore
    fn present(&mut self, image_index: u32, sync: &dyn FrameSync) -> Result<PresentOutcome>;

    /// Rebuild the swapchain images for a new extent
    fn recreate(&mut self, extent: Extent2D) -> Result<()>;

    /// Number of swapchain images
    fn image_count(&self) -> usize;

    fn extent(&self) -> Extent2D;

    /// Pixel format of the swapchain images
    fn format(&self) -> TextureFormat;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
