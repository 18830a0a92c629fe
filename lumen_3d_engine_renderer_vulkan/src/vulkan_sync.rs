/// VulkanFrameSync - semaphores and fence of one frame-in-flight slot

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{FenceStatus, FrameSync};
use lumen_3d_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub struct VulkanFrameSync {
    ctx: Arc<GpuContext>,
    /// Signaled by acquire, waited on by the frame submission
    pub(crate) image_available: vk::Semaphore,
    /// Signaled by the frame submission, waited on by present
    pub(crate) render_finished: vk::Semaphore,
    pub(crate) in_flight: vk::Fence,
}

impl VulkanFrameSync {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let semaphore_info = vk::SemaphoreCreateInfo::default();
            let image_available = ctx.device.create_semaphore(&semaphore_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create semaphore: {:?}", e))?;
            let render_finished = match ctx.device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    ctx.device.destroy_semaphore(image_available, None);
                    return Err(engine_err!("lumen3d::vulkan", "Failed to create semaphore: {:?}", e));
                }
            };

            // signaled so the first wait on a fresh slot returns at once
            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let in_flight = match ctx.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    ctx.device.destroy_semaphore(image_available, None);
                    ctx.device.destroy_semaphore(render_finished, None);
                    return Err(engine_err!("lumen3d::vulkan", "Failed to create fence: {:?}", e));
                }
            };

            Ok(Self { ctx, image_available, render_finished, in_flight })
        }
    }
}

impl FrameSync for VulkanFrameSync {
    fn wait(&self, timeout_ns: u64) -> Result<FenceStatus> {
        match unsafe { self.ctx.device.wait_for_fences(&[self.in_flight], true, timeout_ns) } {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::TimedOut),
            Err(e) => Err(engine_err!("lumen3d::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset(&self) -> Result<()> {
        unsafe {
            self.ctx.device.reset_fences(&[self.in_flight])
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to reset fence: {:?}", e))
        }
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe {
            self.ctx.device.get_fence_status(self.in_flight)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to query fence: {:?}", e))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFrameSync {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.in_flight, None);
            self.ctx.device.destroy_semaphore(self.render_finished, None);
            self.ctx.device.destroy_semaphore(self.image_available, None);
        }
    }
}
