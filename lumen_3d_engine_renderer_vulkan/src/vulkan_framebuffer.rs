/// VulkanFramebuffer - VkFramebuffer over textures and/or swapchain views
///
/// Keeps its texture attachments alive; swapchain views stay owned by the
/// swapchain, which outlives the framebuffers built on it until recreation.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{
    Extent2D, Framebuffer, FramebufferAttachment, FramebufferDesc, Swapchain,
};
use lumen_3d_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    extent: Extent2D,
    attachments: Vec<FramebufferAttachment>,
}

impl VulkanFramebuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        desc: &FramebufferDesc,
        swapchain: Option<&dyn Swapchain>,
    ) -> Result<Self> {
        desc.validate(swapchain)?;

        let Some(render_pass) = desc.render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("lumen3d::vulkan", "Framebuffer render pass is not a Vulkan render pass");
        };
        let vk_swapchain = swapchain.and_then(|s| s.as_any().downcast_ref::<VulkanSwapchain>());

        let mut views = Vec::with_capacity(desc.attachments.len());
        for (i, attachment) in desc.attachments.iter().enumerate() {
            let view = match attachment {
                FramebufferAttachment::Texture(texture) => {
                    let Some(texture) = texture.as_any().downcast_ref::<VulkanTexture>() else {
                        engine_bail!("lumen3d::vulkan", "Attachment {} is not a Vulkan texture", i);
                    };
                    texture.view
                }
                FramebufferAttachment::SwapchainImage { image_index } => {
                    let Some(view) = vk_swapchain.and_then(|s| s.views.get(*image_index as usize)) else {
                        engine_bail!("lumen3d::vulkan",
                            "Attachment {} needs swapchain image {} of a Vulkan swapchain", i, image_index);
                    };
                    *view
                }
            };
            views.push(view);
        }

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.render_pass)
            .attachments(&views)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device.create_framebuffer(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create framebuffer: {:?}", e))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            extent: desc.extent,
            attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn attachments(&self) -> &[FramebufferAttachment] {
        &self.attachments
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_framebuffer(self.framebuffer, None); }
    }
}
