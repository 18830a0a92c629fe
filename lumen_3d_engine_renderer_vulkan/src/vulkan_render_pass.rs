/// VulkanRenderPass - VkRenderPass built from a compiled render pass
///
/// Attachments, subpass references and dependencies (the implicit
/// EXTERNAL -> 0 one first) are translated one to one.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{AttachmentRef, CompiledRenderPass, RenderPass};
use lumen_3d_engine::{engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, clear_value_to_vk, format_to_vk, image_layout_to_vk, load_op_to_vk,
    pipeline_stages_to_vk, sample_count_to_vk, store_op_to_vk, subpass_index_to_vk,
};

pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) clear_values: Vec<vk::ClearValue>,
    compiled: CompiledRenderPass,
}

fn refs_to_vk(refs: &[AttachmentRef]) -> Vec<vk::AttachmentReference> {
    refs.iter()
        .map(|r| vk::AttachmentReference {
            attachment: r.attachment,
            layout: image_layout_to_vk(r.layout),
        })
        .collect()
}

/// Attachment refs of one subpass, kept alive while the create info borrows them
struct SubpassRefs {
    color: Vec<vk::AttachmentReference>,
    resolve: Vec<vk::AttachmentReference>,
    depth: Option<vk::AttachmentReference>,
    input: Vec<vk::AttachmentReference>,
}

impl VulkanRenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, compiled: CompiledRenderPass) -> Result<Self> {
        let attachments: Vec<vk::AttachmentDescription> = compiled.attachments.iter()
            .map(|a| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(a.format))
                    .samples(sample_count_to_vk(a.samples))
                    .load_op(load_op_to_vk(a.load_op))
                    .store_op(store_op_to_vk(a.store_op))
                    .stencil_load_op(load_op_to_vk(a.stencil_load_op))
                    .stencil_store_op(store_op_to_vk(a.stencil_store_op))
                    .initial_layout(image_layout_to_vk(a.initial_layout))
                    .final_layout(image_layout_to_vk(a.final_layout))
            })
            .collect();

        let refs: Vec<SubpassRefs> = compiled.subpasses.iter()
            .map(|s| SubpassRefs {
                color: refs_to_vk(&s.color),
                resolve: refs_to_vk(&s.resolve),
                depth: s.depth.map(|d| vk::AttachmentReference {
                    attachment: d.attachment,
                    layout: image_layout_to_vk(d.layout),
                }),
                input: refs_to_vk(&s.input),
            })
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = refs.iter()
            .map(|r| {
                let mut subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(&r.color)
                    .input_attachments(&r.input);
                if !r.resolve.is_empty() {
                    subpass = subpass.resolve_attachments(&r.resolve);
                }
                if let Some(depth) = &r.depth {
                    subpass = subpass.depth_stencil_attachment(depth);
                }
                subpass
            })
            .collect();

        let dependencies: Vec<vk::SubpassDependency> = compiled.dependencies.iter()
            .map(|d| {
                vk::SubpassDependency::default()
                    .src_subpass(subpass_index_to_vk(d.src_subpass))
                    .dst_subpass(subpass_index_to_vk(d.dst_subpass))
                    .src_stage_mask(pipeline_stages_to_vk(d.src_stages))
                    .dst_stage_mask(pipeline_stages_to_vk(d.dst_stages))
                    .src_access_mask(access_flags_to_vk(d.src_access))
                    .dst_access_mask(access_flags_to_vk(d.dst_access))
                    .dependency_flags(if d.by_region {
                        vk::DependencyFlags::BY_REGION
                    } else {
                        vk::DependencyFlags::empty()
                    })
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device.create_render_pass(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create render pass: {:?}", e))?
        };

        engine_debug!("lumen3d::vulkan", "Created render pass: {} attachments, {} subpasses, {} dependencies, {} samples",
            attachments.len(), subpasses.len(), dependencies.len(), compiled.samples.count());

        let clear_values = compiled.clear_values.iter().map(clear_value_to_vk).collect();
        Ok(Self { ctx, render_pass, clear_values, compiled })
    }
}

impl RenderPass for VulkanRenderPass {
    fn compiled(&self) -> &CompiledRenderPass {
        &self.compiled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_render_pass(self.render_pass, None); }
    }
}
