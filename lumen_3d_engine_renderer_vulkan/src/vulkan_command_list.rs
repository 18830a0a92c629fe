/// VulkanCommandList - one command pool + primary command buffer
///
/// Every resource bound while recording is retained until the next
/// `begin()`, which the frame orchestrator only calls after waiting on the
/// slot's fence, so nothing the GPU still reads can be dropped.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{
    commit_final_layouts, Buffer, CommandList, DescriptorSet, Framebuffer, IndexType,
    LayoutTransition, Pipeline, Rect2D, RenderPass, ShaderStages, Texture, Viewport,
};
use lumen_3d_engine::{engine_bail, engine_err};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::VulkanDescriptorSet;
use crate::vulkan_format::{index_type_to_vk, shader_stages_to_vk};
use crate::vulkan_framebuffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_texture::{record_layout_transition, VulkanTexture};

/// Strong references held for the lifetime of one recording
#[derive(Default)]
struct Retained {
    passes: Vec<(Arc<dyn RenderPass>, Arc<dyn Framebuffer>)>,
    pipelines: Vec<Arc<dyn Pipeline>>,
    descriptor_sets: Vec<Arc<dyn DescriptorSet>>,
    buffers: Vec<Arc<dyn Buffer>>,
}

impl Retained {
    fn clear(&mut self) {
        self.passes.clear();
        self.pipelines.clear();
        self.descriptor_sets.clear();
        self.buffers.clear();
    }
}

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    is_recording: bool,
    /// Pass being recorded, committed to the framebuffer at `end_render_pass`
    current_pass: Option<(Arc<dyn RenderPass>, Arc<dyn Framebuffer>)>,
    subpass: u32,
    bound_layout: Option<vk::PipelineLayout>,
    retained: Retained,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx.device.create_command_pool(&pool_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) if !buffers.is_empty() => buffers[0],
                result => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("lumen3d::vulkan",
                        "Failed to allocate command buffer: {:?}", result.err()));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                current_pass: None,
                subpass: 0,
                bound_layout: None,
                retained: Retained::default(),
            })
        }
    }

    fn require_recording(&self, command: &str) -> Result<()> {
        if !self.is_recording {
            engine_bail!("lumen3d::vulkan", "{}: command list is not recording", command);
        }
        Ok(())
    }

    fn require_pass(&self, command: &str) -> Result<()> {
        self.require_recording(command)?;
        if self.current_pass.is_none() {
            engine_bail!("lumen3d::vulkan", "{}: no render pass in progress", command);
        }
        Ok(())
    }
}

fn downcast_pipeline(pipeline: &Arc<dyn Pipeline>) -> Result<&VulkanPipeline> {
    match pipeline.as_any().downcast_ref::<VulkanPipeline>() {
        Some(pipeline) => Ok(pipeline),
        None => {
            engine_bail!("lumen3d::vulkan", "Pipeline is not a Vulkan pipeline");
        }
    }
}

fn downcast_buffer(buffer: &Arc<dyn Buffer>) -> Result<&VulkanBuffer> {
    match buffer.as_any().downcast_ref::<VulkanBuffer>() {
        Some(buffer) => Ok(buffer),
        None => {
            engine_bail!("lumen3d::vulkan", "Buffer is not a Vulkan buffer");
        }
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!("lumen3d::vulkan", "Command list already recording");
        }
        self.retained.clear();
        self.bound_layout = None;

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;
        if self.current_pass.is_some() {
            engine_bail!("lumen3d::vulkan", "end() called inside a render pass");
        }
        unsafe {
            self.ctx.device.end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
    ) -> Result<()> {
        self.require_recording("begin_render_pass")?;
        if self.current_pass.is_some() {
            engine_bail!("lumen3d::vulkan", "begin_render_pass: a render pass is already in progress");
        }
        let Some(vk_pass) = render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("lumen3d::vulkan", "Render pass is not a Vulkan render pass");
        };
        let Some(vk_framebuffer) = framebuffer.as_any().downcast_ref::<VulkanFramebuffer>() else {
            engine_bail!("lumen3d::vulkan", "Framebuffer is not a Vulkan framebuffer");
        };

        let extent = framebuffer.extent();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: extent.width, height: extent.height },
            })
            .clear_values(&vk_pass.clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }

        self.retained.passes.push((Arc::clone(render_pass), Arc::clone(framebuffer)));
        self.current_pass = Some((Arc::clone(render_pass), Arc::clone(framebuffer)));
        self.subpass = 0;
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.require_pass("next_subpass")?;
        let subpass_count = self.current_pass.as_ref().map(|(pass, _)| pass.subpass_count()).unwrap_or(0);
        if self.subpass + 1 >= subpass_count {
            engine_bail!("lumen3d::vulkan",
                "next_subpass: already in the last subpass ({} of {})", self.subpass + 1, subpass_count);
        }
        unsafe {
            self.ctx.device.cmd_next_subpass(self.command_buffer, vk::SubpassContents::INLINE);
        }
        self.subpass += 1;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_pass("end_render_pass")?;
        unsafe { self.ctx.device.cmd_end_render_pass(self.command_buffer); }
        if let Some((render_pass, framebuffer)) = self.current_pass.take() {
            commit_final_layouts(render_pass.as_ref(), framebuffer.as_ref());
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport")?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]); }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor")?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe { self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]); }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.require_pass("bind_pipeline")?;
        if pipeline.subpass() != self.subpass {
            engine_bail!("lumen3d::vulkan",
                "Pipeline built for subpass {} bound in subpass {}", pipeline.subpass(), self.subpass);
        }
        let vk_pipeline = downcast_pipeline(pipeline)?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        self.bound_layout = Some(vk_pipeline.layout);
        self.retained.pipelines.push(Arc::clone(pipeline));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn DescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.require_recording("bind_descriptor_set")?;
        if set_index >= pipeline.descriptor_set_layout_count() {
            engine_bail!("lumen3d::vulkan",
                "Set index {} out of range (pipeline has {} set layouts)",
                set_index, pipeline.descriptor_set_layout_count());
        }
        let expected_offsets = set.layout().desc().dynamic_binding_count() as usize;
        if dynamic_offsets.len() != expected_offsets {
            engine_bail!("lumen3d::vulkan",
                "Set {} needs {} dynamic offsets, got {}", set_index, expected_offsets, dynamic_offsets.len());
        }
        let vk_pipeline = downcast_pipeline(pipeline)?;
        let Some(vk_set) = set.as_any().downcast_ref::<VulkanDescriptorSet>() else {
            engine_bail!("lumen3d::vulkan", "Descriptor set is not a Vulkan descriptor set");
        };

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.layout,
                set_index,
                &[vk_set.set],
                dynamic_offsets,
            );
        }
        self.retained.descriptor_sets.push(Arc::clone(set));
        Ok(())
    }

    fn push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) -> Result<()> {
        self.require_recording("push_constants")?;
        let Some(layout) = self.bound_layout else {
            engine_bail!("lumen3d::vulkan", "push_constants: no pipeline bound");
        };
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                layout,
                shader_stages_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;
        let vk_buffer = downcast_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer")?;
        let vk_buffer = downcast_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_pass("draw")?;
        unsafe { self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0); }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_pass("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }

    fn texture_barrier(&mut self, texture: &dyn Texture, transition: &LayoutTransition) -> Result<()> {
        self.require_recording("texture_barrier")?;
        if self.current_pass.is_some() {
            engine_bail!("lumen3d::vulkan", "texture_barrier: not allowed inside a render pass");
        }
        let Some(vk_texture) = texture.as_any().downcast_ref::<VulkanTexture>() else {
            engine_bail!("lumen3d::vulkan", "Texture is not a Vulkan texture");
        };
        record_layout_transition(
            &self.ctx.device,
            self.command_buffer,
            vk_texture.image,
            vk_texture.full_range(),
            transition,
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // frees the command buffer too
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
