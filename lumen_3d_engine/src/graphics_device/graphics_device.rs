/// GraphicsDevice trait - the factory every GPU resource comes from

use std::sync::Arc;
use crate::config::{DeviceLimits, PresentMode};
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, Extent2D, FrameSync, Framebuffer, FramebufferDesc, Pipeline,
    PipelineDesc, RenderPass, RenderPassDesc, Shader, ShaderDesc, Swapchain, Texture,
    TextureDesc,
};

/// Graphics device trait
///
/// Implemented by backend-specific devices (e.g., VulkanGraphicsDevice).
/// Every `create_*` call validates its description first; contract
/// violations and GPU creation failures are returned as errors and are
/// never retried.
pub trait GraphicsDevice: Send + Sync {
    /// Limits of the selected physical device
    fn limits(&self) -> DeviceLimits;

    /// Compile `desc` and create the GPU render pass
    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a texture; sampled kinds upload their source data and get a sampler
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a framebuffer; `swapchain` provides the views of swapchain attachments
    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
        swapchain: Option<&dyn Swapchain>,
    ) -> Result<Arc<dyn Framebuffer>>;

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    fn create_descriptor_set_layout(
        &mut self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<Arc<dyn DescriptorSetLayout>>;

    fn create_descriptor_pool(&mut self, desc: DescriptorPoolDesc) -> Result<Box<dyn DescriptorPool>>;

    /// Create a host-visible, persistently mapped buffer
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a primary command list
    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>>;

    /// Create the semaphores and the (signaled) fence of one frame slot
    fn create_frame_sync(&mut self) -> Result<Box<dyn FrameSync>>;

    /// Create the swapchain for the device's surface
    fn create_swapchain(&mut self, extent: Extent2D, present_mode: PresentMode) -> Result<Box<dyn Swapchain>>;

    /// One queue submission for a frame
    ///
    /// Waits on the slot's "image available" semaphore at the color
    /// attachment output stage, executes `command_lists` in order, then
    /// signals "render finished" and the slot's fence.
    fn submit_frame(&mut self, command_lists: &[&dyn CommandList], sync: &dyn FrameSync) -> Result<()>;

    /// Wait until the GPU is idle (shutdown and swapchain recreation only)
    fn wait_idle(&self) -> Result<()>;
}
