/// Pipeline trait and pipeline descriptor
///
/// Pipelines are immutable. Viewport and scissor are dynamic state, so a
/// pipeline survives swapchain resizes; only a change of render pass or
/// sample count requires a new one.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use crate::config::DeviceLimits;
use crate::error::Result;
use crate::graphics_device::{
    BufferFormat, CompareOp, DescriptorSetLayout, RenderPass, SampleCount, Shader, ShaderStage,
    ShaderStages,
};
use crate::engine_bail;

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

/// Push constant range descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Shader stages that can access these push constants
    pub stages: ShaderStages,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

// ===== RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Depth bias parameters (shadow acne)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub slope_factor: f32,
    pub clamp: f32,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    /// Depth bias (None = disabled)
    pub depth_bias: Option<DepthBias>,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_bias: None,
        }
    }
}

// ===== DEPTH / BLEND / MULTISAMPLE =====

/// Depth testing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
        }
    }
}

impl DepthStencilState {
    pub fn disabled() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: CompareOp::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
}

/// Color blending state, applied to every color attachment of the subpass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

impl ColorBlendState {
    /// Standard "over" alpha blending
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}

/// Multisampling state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultisampleState {
    /// Must equal the render pass sample count
    pub samples: SampleCount,
    pub sample_shading: Option<f32>,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: SampleCount::X1,
            sample_shading: None,
            alpha_to_coverage: false,
        }
    }
}

// ===== PIPELINE DESCRIPTOR =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    /// Render pass the pipeline is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// Subpass index inside `render_pass`
    pub subpass: u32,
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    /// Set layouts in set-index order
    pub descriptor_set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
    pub multisample: MultisampleState,
}

impl PipelineDesc {
    /// Pipeline for `subpass` of `render_pass` with default fixed-function
    /// state and the render pass's sample count
    pub fn new(
        render_pass: Arc<dyn RenderPass>,
        subpass: u32,
        vertex_shader: Arc<dyn Shader>,
        fragment_shader: Arc<dyn Shader>,
    ) -> Self {
        let samples = render_pass.samples();
        Self {
            render_pass,
            subpass,
            vertex_shader,
            fragment_shader,
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            descriptor_set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
            rasterization: RasterizationState::default(),
            depth_stencil: DepthStencilState::default(),
            color_blend: ColorBlendState::default(),
            multisample: MultisampleState { samples, ..MultisampleState::default() },
        }
    }

    /// Contract checks performed before any GPU object is created
    pub fn validate(&self, limits: &DeviceLimits) -> Result<()> {
        let subpass_count = self.render_pass.subpass_count();
        if self.subpass >= subpass_count {
            engine_bail!("lumen3d::pipeline",
                "Subpass {} out of range (render pass has {})", self.subpass, subpass_count);
        }

        let pass_samples = self.render_pass.samples();
        if self.multisample.samples != pass_samples {
            engine_bail!("lumen3d::pipeline",
                "Pipeline uses {} samples but the render pass uses {}",
                self.multisample.samples.count(), pass_samples.count());
        }

        if self.vertex_shader.stage() != ShaderStage::Vertex {
            engine_bail!("lumen3d::pipeline", "vertex_shader is a {:?} shader",
                self.vertex_shader.stage());
        }
        if self.fragment_shader.stage() != ShaderStage::Fragment {
            engine_bail!("lumen3d::pipeline", "fragment_shader is a {:?} shader",
                self.fragment_shader.stage());
        }

        for range in &self.push_constant_ranges {
            if range.size == 0 || range.offset % 4 != 0 || range.size % 4 != 0 {
                engine_bail!("lumen3d::pipeline",
                    "Push constant range {}+{} must be non-empty and 4-byte aligned",
                    range.offset, range.size);
            }
            let end = range.offset.checked_add(range.size);
            if end.map_or(true, |end| end > limits.max_push_constants_size) {
                engine_bail!("lumen3d::pipeline",
                    "Push constant range {}+{} exceeds device limit of {} bytes",
                    range.offset, range.size, limits.max_push_constants_size);
            }
        }

        let mut bindings = HashSet::new();
        for binding in &self.vertex_layout.bindings {
            if !bindings.insert(binding.binding) {
                engine_bail!("lumen3d::pipeline", "Vertex binding {} declared twice", binding.binding);
            }
        }
        let mut locations = HashSet::new();
        for attribute in &self.vertex_layout.attributes {
            if !bindings.contains(&attribute.binding) {
                engine_bail!("lumen3d::pipeline",
                    "Vertex attribute at location {} uses undeclared binding {}",
                    attribute.location, attribute.binding);
            }
            if !locations.insert(attribute.location) {
                engine_bail!("lumen3d::pipeline",
                    "Vertex location {} declared twice", attribute.location);
            }
        }

        let has_depth = self.render_pass.compiled().subpasses[self.subpass as usize]
            .depth
            .is_some();
        if self.depth_stencil.depth_test_enable && !has_depth {
            engine_bail!("lumen3d::pipeline",
                "Depth test enabled but subpass {} has no depth attachment", self.subpass);
        }

        Ok(())
    }
}

/// Pipeline resource trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
/// The pipeline and its layout are destroyed when dropped.
pub trait Pipeline: Send + Sync {
    /// Subpass the pipeline was built for
    fn subpass(&self) -> u32;

    fn push_constant_ranges(&self) -> &[PushConstantRange];

    /// Number of descriptor set layouts in the pipeline layout
    fn descriptor_set_layout_count(&self) -> u32;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
