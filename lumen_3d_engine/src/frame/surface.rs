/// Presentation host seen by the frame loop

use crate::graphics_device::Extent2D;

/// Window (or any other surface owner) the swapchain presents to
///
/// The frame loop only needs the current drawable size: a zero extent means
/// the window is minimised and rendering must pause.
pub trait SurfaceHost {
    /// Current framebuffer size in pixels
    fn framebuffer_extent(&self) -> Extent2D;
}

impl SurfaceHost for winit::window::Window {
    fn framebuffer_extent(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }
}

/// Fixed-size host, for headless use and tests
impl SurfaceHost for Extent2D {
    fn framebuffer_extent(&self) -> Extent2D {
        *self
    }
}
