/*!
# Lumen 3D Engine - Vulkan Backend

Vulkan implementation of the lumen_3d_engine `GraphicsDevice` trait family,
built on ash for the bindings, gpu-allocator for memory and spirq for
shader reflection.

```no_run
use lumen_3d_engine::lumen3d::RendererConfig;
use lumen_3d_engine_renderer_vulkan::lumen3d::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> lumen_3d_engine::lumen3d::Result<()> {
let device = VulkanGraphicsDevice::new(window, &RendererConfig::default())?;
# Ok(())
# }
```

Validation layer support (debug messenger routed into the engine logger)
is compiled in only with the `vulkan-validation` feature.
*/

#[cfg(feature = "vulkan-validation")]
mod debug;

mod vulkan_context;
mod vulkan_format;
mod vulkan_sampler;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_render_pass;
mod vulkan_framebuffer;
mod vulkan_shader;
mod vulkan_descriptor;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_sync;
mod vulkan_swapchain;
mod vulkan;

pub mod lumen3d {
    pub use crate::vulkan::VulkanGraphicsDevice;
    pub use crate::vulkan_buffer::VulkanBuffer;
    pub use crate::vulkan_command_list::VulkanCommandList;
    pub use crate::vulkan_context::GpuContext;
    pub use crate::vulkan_descriptor::{VulkanDescriptorPool, VulkanDescriptorSet, VulkanDescriptorSetLayout};
    pub use crate::vulkan_framebuffer::VulkanFramebuffer;
    pub use crate::vulkan_pipeline::VulkanPipeline;
    pub use crate::vulkan_render_pass::VulkanRenderPass;
    pub use crate::vulkan_shader::VulkanShader;
    pub use crate::vulkan_swapchain::VulkanSwapchain;
    pub use crate::vulkan_sync::VulkanFrameSync;
    pub use crate::vulkan_texture::VulkanTexture;

    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{print_validation_stats_report, validation_stats, ValidationStats};
}
