/// VulkanPipeline - graphics pipeline and its layout
///
/// Built against the real render pass and subpass it will be used in.
/// Viewport and scissor are dynamic, so a pipeline survives swapchain
/// recreation untouched.

use ash::vk;
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::{DeviceLimits, Result};
use lumen_3d_engine::lumen3d::render::{Pipeline, PipelineDesc, PushConstantRange, RenderPass, Shader};
use lumen_3d_engine::{engine_bail, engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::VulkanDescriptorSetLayout;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, buffer_format_to_vk, compare_op_to_vk, cull_mode_to_vk,
    front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk, sample_count_to_vk,
    shader_stages_to_vk, topology_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShader;

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    subpass: u32,
    push_constant_ranges: Vec<PushConstantRange>,
    set_layout_count: u32,
}

fn downcast_shader<'a>(desc: &'a PipelineDesc, vertex: bool) -> Result<&'a VulkanShader> {
    let shader = if vertex { &desc.vertex_shader } else { &desc.fragment_shader };
    match shader.as_any().downcast_ref::<VulkanShader>() {
        Some(shader) => Ok(shader),
        None => {
            engine_bail!("lumen3d::vulkan", "Pipeline shader is not a Vulkan shader");
        }
    }
}

/// Every descriptor the shaders use must be declared by the set layouts,
/// and push constant blocks must fit the declared ranges
fn check_reflection(desc: &PipelineDesc, shaders: [&VulkanShader; 2]) -> Result<()> {
    let push_end = desc.push_constant_ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0);

    for shader in shaders {
        for reflected in &shader.bindings {
            let declared = desc.descriptor_set_layouts
                .get(reflected.set as usize)
                .and_then(|layout| layout.desc().binding(reflected.binding));
            if declared.is_none() {
                engine_bail!("lumen3d::vulkan",
                    "{:?} shader uses set {} binding {} which no set layout declares",
                    shader.stage, reflected.set, reflected.binding);
            }
        }
        if let Some(size) = shader.push_constant_size {
            if size > push_end {
                engine_bail!("lumen3d::vulkan",
                    "{:?} shader push constants are {} bytes but ranges cover {}",
                    shader.stage, size, push_end);
            }
        }
    }
    Ok(())
}

impl VulkanPipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: PipelineDesc, limits: &DeviceLimits) -> Result<Self> {
        desc.validate(limits)?;

        let Some(render_pass) = desc.render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("lumen3d::vulkan", "Pipeline render pass is not a Vulkan render pass");
        };
        let vertex_shader = downcast_shader(&desc, true)?;
        let fragment_shader = downcast_shader(&desc, false)?;
        check_reflection(&desc, [vertex_shader, fragment_shader])?;

        let mut set_layouts = Vec::with_capacity(desc.descriptor_set_layouts.len());
        for layout in &desc.descriptor_set_layouts {
            let Some(layout) = layout.as_any().downcast_ref::<VulkanDescriptorSetLayout>() else {
                engine_bail!("lumen3d::vulkan", "Descriptor set layout is not a Vulkan layout");
            };
            set_layouts.push(layout.layout);
        }

        let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges.iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe {
            ctx.device.create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create pipeline layout: {:?}", e))?
        };

        match Self::create_pipeline(&ctx, &desc, render_pass, layout, [vertex_shader, fragment_shader]) {
            Ok(pipeline) => {
                engine_debug!("lumen3d::vulkan", "Created pipeline for subpass {} ({} samples, {} set layouts)",
                    desc.subpass, desc.multisample.samples.count(), set_layouts.len());
                Ok(Self {
                    ctx,
                    pipeline,
                    layout,
                    subpass: desc.subpass,
                    push_constant_ranges: desc.push_constant_ranges.clone(),
                    set_layout_count: set_layouts.len() as u32,
                })
            }
            Err(e) => {
                unsafe { ctx.device.destroy_pipeline_layout(layout, None); }
                Err(e)
            }
        }
    }

    fn create_pipeline(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        render_pass: &VulkanRenderPass,
        layout: vk::PipelineLayout,
        shaders: [&VulkanShader; 2],
    ) -> Result<vk::Pipeline> {
        let entry_points = shaders.iter()
            .map(|s| CString::new(s.entry_point())
                .map_err(|e| engine_err!("lumen3d::vulkan", "Invalid shader entry point name: {}", e)))
            .collect::<Result<Vec<CString>>>()?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = shaders.iter().zip(&entry_points)
            .map(|(shader, name)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader.stage_flags())
                    .module(shader.module)
                    .name(name)
            })
            .collect();

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings.iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: input_rate_to_vk(b.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes.iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: buffer_format_to_vk(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // counts only, both are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let mut rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face));
        rasterization_state = match desc.rasterization.depth_bias {
            Some(bias) => rasterization_state
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant_factor)
                .depth_bias_slope_factor(bias.slope_factor)
                .depth_bias_clamp(bias.clamp),
            None => rasterization_state.depth_bias_enable(false),
        };

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let mut multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(desc.multisample.samples))
            .alpha_to_coverage_enable(desc.multisample.alpha_to_coverage);
        multisample_state = match desc.multisample.sample_shading {
            Some(min) => multisample_state.sample_shading_enable(true).min_sample_shading(min),
            None => multisample_state.sample_shading_enable(false),
        };

        // one blend state per color attachment of the subpass
        let color_count = render_pass.compiled().subpasses
            .get(desc.subpass as usize)
            .map(|s| s.color.len())
            .unwrap_or(0);
        let blend = &desc.color_blend;
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(blend.blend_enable)
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));
        let blend_attachments = vec![blend_attachment; color_count];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| engine_err!("lumen3d::vulkan", "Failed to create graphics pipeline: {:?}", e))?
        };
        match pipelines.first() {
            Some(&pipeline) => Ok(pipeline),
            None => Err(engine_err!("lumen3d::vulkan", "Pipeline creation returned no pipeline")),
        }
    }
}

impl Pipeline for VulkanPipeline {
    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    fn descriptor_set_layout_count(&self) -> u32 {
        self.set_layout_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
