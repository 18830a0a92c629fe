/// Framebuffers - concrete images bound to a render pass's attachment layout
///
/// Two flavours:
/// - a fixed target (`FramebufferDesc` of owned textures, offscreen/shadow),
/// - `SwapchainFramebuffers`: one framebuffer per swapchain image, with the
///   non-presented attachments auto-created per image slot.
///
/// Only framebuffers and the textures they own are rebuilt on resize; the
/// render pass is extent-independent.

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, AttachmentType, Extent2D, GraphicsDevice, RenderPass, Swapchain, Texture,
    TextureDesc, TextureKind,
};
use crate::{engine_bail, engine_debug};

/// Image bound at one attachment position
#[derive(Clone)]
pub enum FramebufferAttachment {
    /// Texture owned by the framebuffer's creator
    Texture(Arc<dyn Texture>),
    /// View of a swapchain image, owned by the swapchain
    SwapchainImage { image_index: u32 },
}

impl FramebufferAttachment {
    pub fn texture(&self) -> Option<&Arc<dyn Texture>> {
        match self {
            FramebufferAttachment::Texture(texture) => Some(texture),
            FramebufferAttachment::SwapchainImage { .. } => None,
        }
    }
}

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    /// The render pass this framebuffer is compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// One entry per layout position
    pub attachments: Vec<FramebufferAttachment>,
    /// Declared extent; every bound image must match it
    pub extent: Extent2D,
}

impl FramebufferDesc {
    /// Check positional agreement with the layout and the extent invariant
    pub fn validate(&self, swapchain: Option<&dyn Swapchain>) -> Result<()> {
        let expected = self.render_pass.attachments();
        if self.attachments.len() != expected.len() {
            engine_bail!("lumen3d::framebuffer",
                "Framebuffer binds {} images but the render pass declares {} attachments",
                self.attachments.len(), expected.len());
        }
        if self.extent.is_zero() {
            engine_bail!("lumen3d::framebuffer", "Framebuffer extent is zero");
        }

        for (i, (bound, desc)) in self.attachments.iter().zip(expected).enumerate() {
            let (extent, format, samples) = match bound {
                FramebufferAttachment::Texture(texture) => {
                    let info = texture.info();
                    (info.extent, info.format, info.samples)
                }
                FramebufferAttachment::SwapchainImage { image_index } => {
                    let Some(swapchain) = swapchain else {
                        engine_bail!("lumen3d::framebuffer",
                            "Attachment {} is a swapchain image but no swapchain was given", i);
                    };
                    if !desc.presents() {
                        engine_bail!("lumen3d::framebuffer",
                            "Swapchain image bound at attachment {} which does not present", i);
                    }
                    if *image_index as usize >= swapchain.image_count() {
                        engine_bail!("lumen3d::framebuffer",
                            "Swapchain image {} out of range ({} images)",
                            image_index, swapchain.image_count());
                    }
                    (swapchain.extent(), swapchain.format(), desc.samples)
                }
            };

            if extent != self.extent {
                engine_bail!("lumen3d::framebuffer",
                    "Attachment {} is {}x{} but the framebuffer is {}x{}",
                    i, extent.width, extent.height, self.extent.width, self.extent.height);
            }
            if format != desc.format {
                engine_bail!("lumen3d::framebuffer",
                    "Attachment {} has format {:?}, layout expects {:?}", i, format, desc.format);
            }
            if samples != desc.samples {
                engine_bail!("lumen3d::framebuffer",
                    "Attachment {} has {} samples, layout expects {}",
                    i, samples.count(), desc.samples.count());
            }
        }
        Ok(())
    }
}

/// Framebuffer resource trait
///
/// Created via `GraphicsDevice::create_framebuffer()`. Keeps its texture
/// attachments alive.
pub trait Framebuffer: Send + Sync {
    fn extent(&self) -> Extent2D;

    /// Bound images in layout order
    fn attachments(&self) -> &[FramebufferAttachment];

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;

    fn attachment_count(&self) -> u32 {
        self.attachments().len() as u32
    }
}

/// Align tracked texture layouts with the render pass's final layouts
///
/// Called when a render pass instance ends: the GPU transitioned every
/// attachment implicitly.
pub fn commit_final_layouts(render_pass: &dyn RenderPass, framebuffer: &dyn Framebuffer) {
    for (bound, desc) in framebuffer.attachments().iter().zip(render_pass.attachments()) {
        if let Some(texture) = bound.texture() {
            texture.layout_tracker().assume(desc.final_layout);
        }
    }
}

/// Texture description backing an attachment at `extent`
pub fn attachment_texture_desc(attachment: &AttachmentDesc, extent: Extent2D) -> TextureDesc {
    let kind = match attachment.attachment_type {
        AttachmentType::Color => TextureKind::ColorAttachment,
        AttachmentType::ColorResolve => TextureKind::ResolveTarget,
        AttachmentType::Depth => TextureKind::DepthAttachment,
        AttachmentType::Shadow => TextureKind::ShadowMap,
    };
    TextureDesc {
        kind,
        extent,
        format: attachment.format,
        samples: attachment.samples,
        data: None,
    }
}

/// Create one texture per layout position, except the presented one
pub fn create_attachment_textures(
    device: &mut dyn GraphicsDevice,
    render_pass: &dyn RenderPass,
    extent: Extent2D,
) -> Result<Vec<Option<Arc<dyn Texture>>>> {
    render_pass
        .attachments()
        .iter()
        .map(|attachment| {
            if attachment.presents() {
                Ok(None)
            } else {
                device
                    .create_texture(attachment_texture_desc(attachment, extent))
                    .map(Some)
            }
        })
        .collect()
}

/// Framebuffer over owned textures for a fixed target
pub fn create_texture_framebuffer(
    device: &mut dyn GraphicsDevice,
    render_pass: &Arc<dyn RenderPass>,
    textures: &[Arc<dyn Texture>],
    extent: Extent2D,
) -> Result<Arc<dyn Framebuffer>> {
    let desc = FramebufferDesc {
        render_pass: Arc::clone(render_pass),
        attachments: textures
            .iter()
            .map(|t| FramebufferAttachment::Texture(Arc::clone(t)))
            .collect(),
        extent,
    };
    device.create_framebuffer(&desc, None)
}

/// One framebuffer per swapchain image
pub struct SwapchainFramebuffers {
    render_pass: Arc<dyn RenderPass>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
    extent: Extent2D,
}

impl SwapchainFramebuffers {
    /// Build framebuffers for every image of `swapchain`
    ///
    /// The render pass layout must present exactly one attachment.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        render_pass: Arc<dyn RenderPass>,
        swapchain: &dyn Swapchain,
    ) -> Result<Self> {
        let mut this = Self {
            render_pass,
            framebuffers: Vec::new(),
            extent: swapchain.extent(),
        };
        this.build(device, swapchain)?;
        Ok(this)
    }

    /// Drop every framebuffer and owned texture and rebuild them at the
    /// swapchain's current extent; the render pass is reused
    pub fn recreate(&mut self, device: &mut dyn GraphicsDevice, swapchain: &dyn Swapchain) -> Result<()> {
        self.framebuffers.clear();
        self.extent = swapchain.extent();
        self.build(device, swapchain)
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, swapchain: &dyn Swapchain) -> Result<()> {
        let Some(present_index) = self
            .render_pass
            .attachments()
            .iter()
            .position(|a| a.presents())
        else {
            engine_bail!("lumen3d::framebuffer",
                "Swapchain framebuffers need a render pass with a PresentSrc attachment");
        };

        let mut framebuffers = Vec::with_capacity(swapchain.image_count());
        for image_index in 0..swapchain.image_count() as u32 {
            let textures = create_attachment_textures(device, self.render_pass.as_ref(), self.extent)?;
            let attachments = textures
                .into_iter()
                .enumerate()
                .map(|(i, texture)| match texture {
                    Some(texture) => FramebufferAttachment::Texture(texture),
                    None => {
                        debug_assert_eq!(i, present_index);
                        FramebufferAttachment::SwapchainImage { image_index }
                    }
                })
                .collect();

            let desc = FramebufferDesc {
                render_pass: Arc::clone(&self.render_pass),
                attachments,
                extent: self.extent,
            };
            framebuffers.push(device.create_framebuffer(&desc, Some(swapchain))?);
        }

        engine_debug!("lumen3d::framebuffer",
            "Built {} swapchain framebuffers at {}x{}",
            framebuffers.len(), self.extent.width, self.extent.height);
        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Framebuffer wrapping swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Result<&Arc<dyn Framebuffer>> {
        match self.framebuffers.get(image_index as usize) {
            Some(framebuffer) => Ok(framebuffer),
            None => {
                engine_bail!("lumen3d::framebuffer",
                    "No framebuffer for swapchain image {} ({} built)",
                    image_index, self.framebuffers.len());
            }
        }
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
