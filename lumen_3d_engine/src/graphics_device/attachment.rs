/// Attachment descriptors and attachment layouts
///
/// An `AttachmentLayout` is the ordered contract a render pass is compiled
/// from: the position of each descriptor is the binding index subpasses and
/// framebuffers refer to.

use crate::error::Result;
use crate::graphics_device::{Extent2D, SampleCount, TextureFormat};
use crate::engine_bail;

/// Attachment load operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Load existing contents
    Load,
    /// Clear to the attachment's clear value
    Clear,
    /// Contents are undefined
    DontCare,
}

/// Attachment store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Keep the rendered contents
    Store,
    /// Contents may be discarded
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Logical role of an attachment inside a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    /// Rendered color target (multisampled when MSAA is on)
    Color,
    /// Single-sampled target receiving the resolve of a Color attachment
    ColorResolve,
    /// Depth (and optionally stencil) target
    Depth,
    /// Depth-only target sampled by a later pass
    Shadow,
}

/// One render-target slot of a render pass
///
/// Plain value; copied into the owning `AttachmentLayout`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
    pub clear_value: ClearValue,
    pub attachment_type: AttachmentType,
}

const CLEAR_BLACK: ClearValue = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);
const CLEAR_DEPTH: ClearValue = ClearValue::DepthStencil { depth: 1.0, stencil: 0 };

impl AttachmentDesc {
    /// Color target. Multisampled color is only an intermediate for its
    /// resolve, so it is not stored.
    pub fn color(format: TextureFormat, samples: SampleCount) -> Self {
        Self {
            format,
            samples,
            load_op: LoadOp::Clear,
            store_op: if samples.is_multisampled() { StoreOp::DontCare } else { StoreOp::Store },
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::ColorAttachment,
            clear_value: CLEAR_BLACK,
            attachment_type: AttachmentType::Color,
        }
    }

    /// Resolve target sampled by a later pass
    pub fn color_resolve(format: TextureFormat) -> Self {
        Self {
            format,
            samples: SampleCount::X1,
            load_op: LoadOp::DontCare,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::ShaderReadOnly,
            clear_value: CLEAR_BLACK,
            attachment_type: AttachmentType::ColorResolve,
        }
    }

    /// Resolve target that is the swapchain image
    pub fn color_resolve_present(format: TextureFormat) -> Self {
        Self {
            final_layout: ImageLayout::PresentSrc,
            ..Self::color_resolve(format)
        }
    }

    /// Depth target; stencil ops follow the format's stencil channel
    pub fn depth(format: TextureFormat, samples: SampleCount) -> Self {
        let stencil_load_op = if format.has_stencil() { LoadOp::Clear } else { LoadOp::DontCare };
        Self {
            format,
            samples,
            load_op: LoadOp::Clear,
            store_op: StoreOp::DontCare,
            stencil_load_op,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilAttachment,
            clear_value: CLEAR_DEPTH,
            attachment_type: AttachmentType::Depth,
        }
    }

    /// Shadow map depth target: stored and left readable for the lit pass
    pub fn shadow(format: TextureFormat) -> Self {
        Self {
            format,
            samples: SampleCount::X1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilReadOnly,
            clear_value: CLEAR_DEPTH,
            attachment_type: AttachmentType::Shadow,
        }
    }

    pub fn with_clear_value(mut self, clear_value: ClearValue) -> Self {
        self.clear_value = clear_value;
        self
    }

    pub fn with_final_layout(mut self, layout: ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }

    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    pub fn is_depth_like(&self) -> bool {
        matches!(self.attachment_type, AttachmentType::Depth | AttachmentType::Shadow)
    }

    pub fn presents(&self) -> bool {
        self.final_layout == ImageLayout::PresentSrc
    }
}

/// What consumes the output of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// Renders into the swapchain image
    Present,
    /// Renders into owned textures sampled later (offscreen, shadow)
    Offscreen,
}

/// Ordered attachment list; position == binding index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentLayout {
    attachments: Vec<AttachmentDesc>,
}

impl AttachmentLayout {
    pub fn new() -> Self {
        Self { attachments: Vec::new() }
    }

    /// Append a descriptor and return its binding index
    pub fn add_attachment(&mut self, desc: AttachmentDesc) -> u32 {
        self.attachments.push(desc);
        (self.attachments.len() - 1) as u32
    }

    pub fn attachments(&self) -> &[AttachmentDesc] {
        &self.attachments
    }

    pub fn get(&self, index: u32) -> Option<&AttachmentDesc> {
        self.attachments.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    fn indices_of(&self, ty: AttachmentType) -> impl Iterator<Item = u32> + '_ {
        self.attachments
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.attachment_type == ty)
            .map(|(i, _)| i as u32)
    }

    /// Binding indices of every Color entry, in order
    pub fn color_indices(&self) -> Vec<u32> {
        self.indices_of(AttachmentType::Color).collect()
    }

    /// Binding indices of every ColorResolve entry, in order
    pub fn resolve_indices(&self) -> Vec<u32> {
        self.indices_of(AttachmentType::ColorResolve).collect()
    }

    /// Number of Color entries (resolve targets are not counted)
    pub fn color_attachments_count(&self) -> u32 {
        self.indices_of(AttachmentType::Color).count() as u32
    }

    pub fn resolve_attachments_count(&self) -> u32 {
        self.indices_of(AttachmentType::ColorResolve).count() as u32
    }

    /// Index of the first Depth or Shadow entry
    pub fn depth_attachment_index(&self) -> Option<u32> {
        self.attachments
            .iter()
            .position(|a| a.is_depth_like())
            .map(|i| i as u32)
    }

    /// Index of the entry handed to the presentation engine
    pub fn present_attachment_index(&self) -> Option<u32> {
        self.attachments.iter().position(|a| a.presents()).map(|i| i as u32)
    }

    pub fn presents(&self) -> bool {
        self.present_attachment_index().is_some()
    }

    /// Rasterization sample count of the pass (shared by Color and Depth entries)
    pub fn samples(&self) -> SampleCount {
        self.attachments
            .iter()
            .find(|a| matches!(a.attachment_type, AttachmentType::Color | AttachmentType::Depth))
            .map(|a| a.samples)
            .unwrap_or(SampleCount::X1)
    }

    /// Clear values in binding order
    pub fn clear_values(&self) -> Vec<ClearValue> {
        self.attachments.iter().map(|a| a.clear_value).collect()
    }

    /// Check the layout against the engine's attachment rules
    ///
    /// - at least one attachment
    /// - every Color and Depth entry uses the same sample count
    /// - resolve targets are single-sampled and resolve multisampled colors
    /// - when resolving, #Color == #ColorResolve
    /// - at most one Depth/Shadow entry
    /// - a `Present` layout hands exactly one entry to the swapchain
    pub fn validate(&self, target: PassTarget) -> Result<()> {
        if self.attachments.is_empty() {
            engine_bail!("lumen3d::attachment", "Attachment layout is empty");
        }

        let samples = self.samples();
        for (i, a) in self.attachments.iter().enumerate() {
            match a.attachment_type {
                AttachmentType::Color | AttachmentType::Depth => {
                    if a.samples != samples {
                        engine_bail!("lumen3d::attachment",
                            "Attachment {} uses {} samples but the pass uses {}",
                            i, a.samples.count(), samples.count());
                    }
                }
                AttachmentType::ColorResolve => {
                    if a.samples != SampleCount::X1 {
                        engine_bail!("lumen3d::attachment",
                            "Resolve attachment {} must be single-sampled", i);
                    }
                }
                AttachmentType::Shadow => {
                    if !a.format.is_depth() {
                        engine_bail!("lumen3d::attachment",
                            "Shadow attachment {} has non-depth format {:?}", i, a.format);
                    }
                }
            }
            if a.attachment_type == AttachmentType::Depth && !a.format.is_depth() {
                engine_bail!("lumen3d::attachment",
                    "Depth attachment {} has non-depth format {:?}", i, a.format);
            }
        }

        let colors = self.color_attachments_count();
        let resolves = self.resolve_attachments_count();
        if resolves > 0 {
            if colors != resolves {
                engine_bail!("lumen3d::attachment",
                    "{} color attachments but {} resolve attachments", colors, resolves);
            }
            if !samples.is_multisampled() {
                engine_bail!("lumen3d::attachment",
                    "Resolve attachments require multisampled color attachments");
            }
        }

        let depth_count = self.attachments.iter().filter(|a| a.is_depth_like()).count();
        if depth_count > 1 {
            engine_bail!("lumen3d::attachment",
                "Layout declares {} depth attachments (max 1)", depth_count);
        }

        let present_count = self.attachments.iter().filter(|a| a.presents()).count();
        match target {
            PassTarget::Present if present_count != 1 => {
                engine_bail!("lumen3d::attachment",
                    "Present layout needs exactly one PresentSrc attachment, found {}",
                    present_count);
            }
            _ => {}
        }

        Ok(())
    }
}

/// Extent every attachment of one framebuffer must share
pub fn common_extent(extents: &[Extent2D]) -> Option<Extent2D> {
    let first = *extents.first()?;
    extents.iter().all(|e| *e == first).then_some(first)
}

#[cfg(test)]
#[path = "attachment_tests.rs"]
mod tests;
