/// Render pass description and compilation
///
/// `RenderPassDesc::compile()` turns an attachment layout plus subpasses into
/// a fully resolved `CompiledRenderPass`: attachment references carry their
/// in-subpass layout and the dependency list always starts with the implicit
/// EXTERNAL -> 0 dependency. Backends create their GPU object from the
/// compiled form only.

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, AttachmentLayout, AttachmentType, ClearValue, ImageLayout, PassTarget,
    SampleCount, SubpassDependency, SUBPASS_EXTERNAL,
};
use crate::engine_bail;

/// Attachment references of one subpass, by binding index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassDesc {
    /// Color outputs (Color entries)
    pub color: Vec<u32>,
    /// Resolve targets, empty or one per color output (ColorResolve entries)
    pub resolve: Vec<u32>,
    /// Depth/stencil target (Depth or Shadow entry)
    pub depth: Option<u32>,
    /// Input attachments read by the fragment shader
    pub input: Vec<u32>,
}

impl SubpassDesc {
    /// Subpass writing every Color entry, resolving into every ColorResolve
    /// entry and testing against the first depth entry
    pub fn all_of(layout: &AttachmentLayout) -> Self {
        Self {
            color: layout.color_indices(),
            resolve: layout.resolve_indices(),
            depth: layout.depth_attachment_index(),
            input: Vec::new(),
        }
    }
}

/// Resolved attachment reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment: u32,
    pub layout: ImageLayout,
}

/// Subpass with references resolved to layouts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSubpass {
    pub color: Vec<AttachmentRef>,
    pub resolve: Vec<AttachmentRef>,
    pub depth: Option<AttachmentRef>,
    pub input: Vec<AttachmentRef>,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    pub layout: AttachmentLayout,
    pub target: PassTarget,
    /// Explicit subpasses; one covering the whole layout when empty
    pub subpasses: Vec<SubpassDesc>,
    /// Explicit dependencies, appended after the implicit one
    pub dependencies: Vec<SubpassDependency>,
}

impl RenderPassDesc {
    pub fn new(layout: AttachmentLayout, target: PassTarget) -> Self {
        Self {
            layout,
            target,
            subpasses: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_subpass(mut self, subpass: SubpassDesc) -> Self {
        self.subpasses.push(subpass);
        self
    }

    pub fn with_dependency(mut self, dependency: SubpassDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Append the `i -> i+1` dependency for every consecutive subpass pair
    pub fn chain_subpasses(mut self) -> Self {
        for i in 1..self.subpasses.len() {
            self.dependencies.push(SubpassDependency::chained(i as u32 - 1));
        }
        self
    }

    /// Make the last subpass's writes visible to fragment shaders of a
    /// later pass sampling this pass's output (shadow maps, resolves)
    pub fn with_sampled_output(mut self) -> Self {
        let last = self.subpasses.len().max(1) as u32 - 1;
        self.dependencies.push(SubpassDependency::to_sampling_pass(last));
        self
    }

    /// Validate and resolve the description
    pub fn compile(&self) -> Result<CompiledRenderPass> {
        self.layout.validate(self.target)?;

        let descs: Vec<SubpassDesc> = if self.subpasses.is_empty() {
            vec![SubpassDesc::all_of(&self.layout)]
        } else {
            self.subpasses.clone()
        };

        let mut subpasses = Vec::with_capacity(descs.len());
        for (s, desc) in descs.iter().enumerate() {
            subpasses.push(self.compile_subpass(s, desc)?);
        }

        let subpass_count = subpasses.len() as u32;
        let mut dependencies = Vec::with_capacity(self.dependencies.len() + 1);
        dependencies.push(SubpassDependency::external_to_first());
        for dep in &self.dependencies {
            let in_range = |i: u32| i == SUBPASS_EXTERNAL || i < subpass_count;
            if !in_range(dep.src_subpass) || !in_range(dep.dst_subpass) {
                engine_bail!("lumen3d::render_pass",
                    "Dependency {} -> {} references a subpass outside 0..{}",
                    dep.src_subpass, dep.dst_subpass, subpass_count);
            }
            if dep.src_subpass == SUBPASS_EXTERNAL && dep.dst_subpass == SUBPASS_EXTERNAL {
                engine_bail!("lumen3d::render_pass", "Dependency EXTERNAL -> EXTERNAL");
            }
            dependencies.push(*dep);
        }

        Ok(CompiledRenderPass {
            attachments: self.layout.attachments().to_vec(),
            subpasses,
            dependencies,
            clear_values: self.layout.clear_values(),
            color_attachments_count: self.layout.color_attachments_count(),
            samples: self.layout.samples(),
            target: self.target,
        })
    }

    fn attachment_ref(
        &self,
        subpass: usize,
        index: u32,
        accepted: &[AttachmentType],
        layout: ImageLayout,
    ) -> Result<AttachmentRef> {
        let Some(desc) = self.layout.get(index) else {
            engine_bail!("lumen3d::render_pass",
                "Subpass {} references attachment {} but the layout has {}",
                subpass, index, self.layout.len());
        };
        if !accepted.is_empty() && !accepted.contains(&desc.attachment_type) {
            engine_bail!("lumen3d::render_pass",
                "Subpass {} uses attachment {} ({:?}) where {:?} is expected",
                subpass, index, desc.attachment_type, accepted);
        }
        Ok(AttachmentRef { attachment: index, layout })
    }

    fn compile_subpass(&self, s: usize, desc: &SubpassDesc) -> Result<CompiledSubpass> {
        if !desc.resolve.is_empty() && desc.resolve.len() != desc.color.len() {
            engine_bail!("lumen3d::render_pass",
                "Subpass {} has {} color outputs but {} resolve targets",
                s, desc.color.len(), desc.resolve.len());
        }

        let color = desc.color.iter()
            .map(|&i| self.attachment_ref(s, i, &[AttachmentType::Color], ImageLayout::ColorAttachment))
            .collect::<Result<Vec<_>>>()?;
        let resolve = desc.resolve.iter()
            .map(|&i| self.attachment_ref(s, i, &[AttachmentType::ColorResolve], ImageLayout::ColorAttachment))
            .collect::<Result<Vec<_>>>()?;
        let depth = desc.depth
            .map(|i| self.attachment_ref(
                s,
                i,
                &[AttachmentType::Depth, AttachmentType::Shadow],
                ImageLayout::DepthStencilAttachment,
            ))
            .transpose()?;
        // input attachments may alias any earlier output
        let input = desc.input.iter()
            .map(|&i| self.attachment_ref(s, i, &[], ImageLayout::ShaderReadOnly))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledSubpass { color, resolve, depth, input })
    }
}

/// Fully resolved render pass, ready for GPU object creation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRenderPass {
    pub attachments: Vec<AttachmentDesc>,
    pub subpasses: Vec<CompiledSubpass>,
    /// Implicit EXTERNAL -> 0 first, explicit dependencies after
    pub dependencies: Vec<SubpassDependency>,
    pub clear_values: Vec<ClearValue>,
    pub color_attachments_count: u32,
    pub samples: SampleCount,
    pub target: PassTarget,
}

/// Render pass resource trait
///
/// Implemented by backend-specific render pass types. Extent-independent:
/// survives swapchain recreation.
pub trait RenderPass: Send + Sync {
    /// The compiled description this pass was created from
    fn compiled(&self) -> &CompiledRenderPass;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;

    /// Number of Color attachments (resolve targets not counted)
    fn color_attachments_count(&self) -> u32 {
        self.compiled().color_attachments_count
    }

    fn attachment_count(&self) -> u32 {
        self.compiled().attachments.len() as u32
    }

    fn subpass_count(&self) -> u32 {
        self.compiled().subpasses.len() as u32
    }

    fn samples(&self) -> SampleCount {
        self.compiled().samples
    }

    fn clear_values(&self) -> &[ClearValue] {
        &self.compiled().clear_values
    }

    fn attachments(&self) -> &[AttachmentDesc] {
        &self.compiled().attachments
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
