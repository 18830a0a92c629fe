/// VulkanSwapchain - presentation to the device's window surface
///
/// Out-of-date and suboptimal results are returned as outcomes; the frame
/// orchestrator decides when to recreate. Views are owned here and handed
/// to framebuffers by image index.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::{Error, PresentMode, Result};
use lumen_3d_engine::lumen3d::render::{
    AcquireOutcome, Extent2D, FrameSync, PresentOutcome, Swapchain, TextureFormat,
};
use lumen_3d_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_from_vk, present_mode_to_vk};
use crate::vulkan_sync::VulkanFrameSync;

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    format: TextureFormat,
    surface_format: vk::SurfaceFormatKHR,
    extent: Extent2D,
    present_mode: vk::PresentModeKHR,
}

/// Prefer an sRGB 8-bit format, else the first one the engine can name
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, TextureFormat)> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB
    });
    preferred
        .into_iter()
        .chain(formats.iter())
        .find_map(|f| format_from_vk(f.format).map(|format| (*f, format)))
}

/// FIFO is always available
fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: PresentMode) -> vk::PresentModeKHR {
    let wanted = present_mode_to_vk(preferred);
    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, within the surface maximum (0 = unbounded)
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

fn surface_error(what: &str, e: vk::Result) -> Error {
    engine_error!("lumen3d::vulkan", "Failed to {}: {:?}", what, e);
    Error::InitializationFailed(format!("Failed to {}: {:?}", what, e))
}

fn create_views(device: &ash::Device, images: &[vk::Image], format: vk::Format) -> Result<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        match unsafe { device.create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views {
                    unsafe { device.destroy_image_view(view, None); }
                }
                return Err(surface_error("create swapchain image view", e));
            }
        }
    }
    Ok(views)
}

impl VulkanSwapchain {
    pub(crate) fn new(ctx: Arc<GpuContext>, extent: Extent2D, present_mode: PresentMode) -> Result<Self> {
        let (formats, modes) = unsafe {
            let formats = ctx.surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| surface_error("query surface formats", e))?;
            let modes = ctx.surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| surface_error("query present modes", e))?;
            (formats, modes)
        };

        let Some((surface_format, format)) = choose_surface_format(&formats) else {
            engine_bail!("lumen3d::vulkan", "No supported surface format among {:?}",
                formats.iter().map(|f| f.format).collect::<Vec<_>>());
        };
        let vk_present_mode = choose_present_mode(&modes, present_mode);
        if vk_present_mode != present_mode_to_vk(present_mode) {
            engine_info!("lumen3d::vulkan", "{:?} present mode unsupported, using FIFO", present_mode);
        }

        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let mut swapchain = Self {
            ctx,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            format,
            surface_format,
            extent,
            present_mode: vk_present_mode,
        };
        swapchain.build(extent)?;
        Ok(swapchain)
    }

    /// (Re)create the swapchain, its images and views; retires the previous one
    fn build(&mut self, requested: Extent2D) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let capabilities = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| surface_error("get surface capabilities", e))?
        };
        let extent = choose_extent(&capabilities, requested);
        if extent.width == 0 || extent.height == 0 {
            engine_bail!("lumen3d::vulkan", "Cannot create a {}x{} swapchain", extent.width, extent.height);
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            self.loader.create_swapchain(&create_info, None)
                .map_err(|e| surface_error("create swapchain", e))?
        };

        // the retired swapchain goes whether or not the rest succeeds
        unsafe {
            for view in self.views.drain(..) {
                ctx.device.destroy_image_view(view, None);
            }
            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
        }
        self.swapchain = swapchain;
        self.images.clear();

        let images = unsafe {
            self.loader.get_swapchain_images(swapchain)
                .map_err(|e| surface_error("get swapchain images", e))?
        };
        self.views = create_views(&ctx.device, &images, self.surface_format.format)?;
        self.images = images;
        self.extent = Extent2D { width: extent.width, height: extent.height };

        engine_debug!("lumen3d::vulkan", "Swapchain {}x{}, {} images, {:?}, {:?}",
            extent.width, extent.height, self.images.len(), self.format, self.present_mode);
        Ok(())
    }
}

fn downcast_sync(sync: &dyn FrameSync) -> Result<&VulkanFrameSync> {
    match sync.as_any().downcast_ref::<VulkanFrameSync>() {
        Some(sync) => Ok(sync),
        None => {
            engine_bail!("lumen3d::vulkan", "Frame sync is not a Vulkan frame sync");
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, sync: &dyn FrameSync) -> Result<AcquireOutcome> {
        let sync = downcast_sync(sync)?;
        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(engine_err!("lumen3d::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, sync: &dyn FrameSync) -> Result<PresentOutcome> {
        if image_index as usize >= self.images.len() {
            engine_bail!("lumen3d::vulkan", "present: image index {} out of range (count: {})",
                image_index, self.images.len());
        }
        let sync = downcast_sync(sync)?;

        let wait_semaphores = [sync.render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(self.ctx.present_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!("lumen3d::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        }
        self.build(extent)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            for &view in &self.views {
                self.ctx.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}
