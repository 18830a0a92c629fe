/// Texture roles, descriptors, layout tracking and source pixel data
///
/// Every texture is one `TextureKind`; the free functions below derive the
/// GPU parameters (usage, aspect, mip count, working layout) from the kind,
/// so backends never branch on anything else.

use std::any::Any;
use std::path::Path;
use std::sync::Mutex;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::{
    layout_usage, AccessFlags, CommandList, Extent2D, ImageLayout, PipelineStages, SampleCount,
    SamplerDesc, TextureFormat,
};
use crate::{engine_bail, engine_error};

/// Role of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Transient color render target (multisampled intermediate)
    ColorAttachment,
    /// Single-sampled resolve target sampled by a later pass
    ResolveTarget,
    /// Transient depth render target
    DepthAttachment,
    /// File-backed sampled 2D image with a full mip chain
    Sampler2D,
    /// Six-face pre-mipmapped sampled image
    Cubemap,
    /// Depth target sampled with hardware comparison
    ShadowMap,
}

impl TextureKind {
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            TextureKind::ColorAttachment
                | TextureKind::ResolveTarget
                | TextureKind::DepthAttachment
                | TextureKind::ShadowMap
        )
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, TextureKind::DepthAttachment | TextureKind::ShadowMap)
    }

    pub fn is_sampled(&self) -> bool {
        matches!(
            self,
            TextureKind::ResolveTarget
                | TextureKind::Sampler2D
                | TextureKind::Cubemap
                | TextureKind::ShadowMap
        )
    }
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC             = 1 << 0;
        const TRANSFER_DST             = 1 << 1;
        const SAMPLED                  = 1 << 2;
        const COLOR_ATTACHMENT         = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 4;
        const TRANSIENT_ATTACHMENT     = 1 << 5;
    }
}

bitflags! {
    /// Image aspect mask used by views and barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// `floor(log2(max(width, height))) + 1`
pub fn full_mip_chain_len(width: u32, height: u32) -> u32 {
    let largest = width.max(height);
    if largest == 0 { 1 } else { u32::BITS - largest.leading_zeros() }
}

/// Mip levels allocated for a texture of this kind
///
/// Attachments and shadow maps are single-level; cubemaps keep the level
/// count of their pre-mipmapped source.
pub fn mip_level_count(kind: TextureKind, width: u32, height: u32) -> u32 {
    match kind {
        TextureKind::Sampler2D => full_mip_chain_len(width, height),
        _ => 1,
    }
}

/// Usage flags for a texture of this kind
pub fn usage_for(kind: TextureKind, mip_levels: u32) -> TextureUsage {
    match kind {
        TextureKind::ColorAttachment => {
            TextureUsage::TRANSIENT_ATTACHMENT | TextureUsage::COLOR_ATTACHMENT
        }
        TextureKind::ResolveTarget => TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
        TextureKind::DepthAttachment => {
            TextureUsage::TRANSIENT_ATTACHMENT | TextureUsage::DEPTH_STENCIL_ATTACHMENT
        }
        // sampled after the shadow pass, so never transient
        TextureKind::ShadowMap => TextureUsage::SAMPLED | TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        TextureKind::Sampler2D => {
            let usage = TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST;
            if mip_levels > 1 { usage | TextureUsage::TRANSFER_SRC } else { usage }
        }
        TextureKind::Cubemap => TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
    }
}

/// Aspect mask of a format; stencil only for the stencil allow-list
pub fn aspect_for(format: TextureFormat) -> ImageAspect {
    if !format.is_depth() {
        ImageAspect::COLOR
    } else if format.has_stencil() {
        ImageAspect::DEPTH | ImageAspect::STENCIL
    } else {
        ImageAspect::DEPTH
    }
}

/// Layout a texture is transitioned to right after creation
pub fn working_layout(kind: TextureKind) -> ImageLayout {
    match kind {
        TextureKind::ColorAttachment => ImageLayout::ColorAttachment,
        TextureKind::DepthAttachment => ImageLayout::DepthStencilAttachment,
        TextureKind::ShadowMap => ImageLayout::DepthStencilReadOnly,
        TextureKind::ResolveTarget | TextureKind::Sampler2D | TextureKind::Cubemap => {
            ImageLayout::ShaderReadOnly
        }
    }
}

// ===== LAYOUT TRACKING =====

/// One image layout transition and the barrier masks recorded for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

impl LayoutTransition {
    pub fn new(old_layout: ImageLayout, new_layout: ImageLayout) -> Self {
        let (src_stages, src_access) = layout_usage(old_layout);
        let (dst_stages, dst_access) = layout_usage(new_layout);
        Self {
            old_layout,
            new_layout,
            src_stages,
            dst_stages,
            // nothing to make available when leaving Undefined
            src_access: if old_layout == ImageLayout::Undefined { AccessFlags::empty() } else { src_access },
            dst_access,
        }
    }
}

/// Tracked current layout of a GPU image
///
/// The layout only changes through `transition` (which records the barrier
/// while holding the lock) or `assume` (for transitions performed implicitly
/// by a render pass), so it always equals the image's real layout.
#[derive(Debug)]
pub struct LayoutTracker {
    layout: Mutex<ImageLayout>,
}

impl LayoutTracker {
    pub fn new(initial: ImageLayout) -> Self {
        Self { layout: Mutex::new(initial) }
    }

    pub fn current(&self) -> ImageLayout {
        match self.layout.lock() {
            Ok(layout) => *layout,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Transition to `new_layout`; `record` issues the barrier
    ///
    /// The tracked layout is updated only if `record` succeeds.
    pub fn transition<F>(&self, new_layout: ImageLayout, record: F) -> Result<LayoutTransition>
    where
        F: FnOnce(&LayoutTransition) -> Result<()>,
    {
        let mut layout = self.layout.lock().map_err(|_| {
            engine_error!("lumen3d::texture", "Layout tracker lock poisoned");
            Error::BackendError("Layout tracker lock poisoned".to_string())
        })?;
        let transition = LayoutTransition::new(*layout, new_layout);
        record(&transition)?;
        *layout = new_layout;
        Ok(transition)
    }

    /// Record a layout change made by the GPU without an explicit barrier
    /// (render pass final layouts)
    pub fn assume(&self, layout: ImageLayout) {
        match self.layout.lock() {
            Ok(mut current) => *current = layout,
            Err(poisoned) => *poisoned.into_inner() = layout,
        }
    }
}

/// Transition `texture` to `new_layout`, recording the barrier into `cmd`
///
/// Returns the recorded transition; afterwards `texture.current_layout()`
/// equals its `new_layout`.
pub fn transition_layout(
    cmd: &mut dyn CommandList,
    texture: &dyn Texture,
    new_layout: ImageLayout,
) -> Result<LayoutTransition> {
    texture
        .layout_tracker()
        .transition(new_layout, |t| cmd.texture_barrier(texture, t))
}

// ===== SOURCE DATA =====

/// Flat RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            engine_bail!("lumen3d::texture",
                "RGBA8 image {}x{} needs {} bytes, got {}",
                width, height, expected, pixels.len());
        }
        Ok(Self { width, height, pixels })
    }

    /// Decode an image file into RGBA8
    ///
    /// A missing or undecodable file is fatal: there is no placeholder.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| {
            let message = format!("Failed to load image '{}': {}", path.display(), e);
            engine_error!("lumen3d::texture", "{}", message);
            Error::AssetLoad(message)
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self { width, height, pixels: rgba.into_raw() })
    }
}

/// Location of one face x mip level inside a packed cubemap buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceMipRegion {
    pub face: u32,
    pub mip: u32,
    pub offset: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

pub const CUBE_FACES: u32 = 6;

/// Pre-mipmapped cubemap pixels with per face x mip offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapData {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub data: Vec<u8>,
    pub regions: Vec<FaceMipRegion>,
}

impl CubemapData {
    /// Index a tightly packed buffer laid out mip-major, six faces per level
    pub fn from_packed(
        format: TextureFormat,
        width: u32,
        height: u32,
        mip_levels: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || mip_levels == 0 {
            engine_bail!("lumen3d::texture",
                "Cubemap {}x{} with {} mips is empty", width, height, mip_levels);
        }
        if width != height {
            engine_bail!("lumen3d::texture",
                "Cubemap faces must be square, got {}x{}", width, height);
        }
        if mip_levels > full_mip_chain_len(width, height) {
            engine_bail!("lumen3d::texture",
                "Cubemap {}x{} cannot have {} mip levels", width, height, mip_levels);
        }

        let mut regions = Vec::with_capacity((mip_levels * CUBE_FACES) as usize);
        let mut offset = 0u64;
        for mip in 0..mip_levels {
            let w = (width >> mip).max(1);
            let h = (height >> mip).max(1);
            let size = format.image_size(w, h);
            for face in 0..CUBE_FACES {
                regions.push(FaceMipRegion { face, mip, offset, size, width: w, height: h });
                offset += size;
            }
        }

        if (data.len() as u64) < offset {
            let message = format!(
                "Cubemap data holds {} bytes, {} mips of {}x{} {:?} need {}",
                data.len(), mip_levels, width, height, format, offset
            );
            engine_error!("lumen3d::texture", "{}", message);
            return Err(Error::AssetLoad(message));
        }

        Ok(Self { format, width, height, mip_levels, data, regions })
    }
}

/// Pixel data uploaded at creation time
#[derive(Debug, Clone)]
pub enum TextureSource {
    Image(ImageData),
    Cubemap(CubemapData),
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub extent: Extent2D,
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub data: Option<TextureSource>,
}

impl TextureDesc {
    pub fn color_attachment(extent: Extent2D, format: TextureFormat, samples: SampleCount) -> Self {
        Self { kind: TextureKind::ColorAttachment, extent, format, samples, data: None }
    }

    pub fn resolve_target(extent: Extent2D, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::ResolveTarget,
            extent,
            format,
            samples: SampleCount::X1,
            data: None,
        }
    }

    pub fn depth_attachment(extent: Extent2D, format: TextureFormat, samples: SampleCount) -> Self {
        Self { kind: TextureKind::DepthAttachment, extent, format, samples, data: None }
    }

    pub fn shadow_map(size: u32, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::ShadowMap,
            extent: Extent2D::new(size, size),
            format,
            samples: SampleCount::X1,
            data: None,
        }
    }

    pub fn sampler_2d(image: ImageData, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::Sampler2D,
            extent: Extent2D::new(image.width, image.height),
            format,
            samples: SampleCount::X1,
            data: Some(TextureSource::Image(image)),
        }
    }

    pub fn cubemap(data: CubemapData) -> Self {
        Self {
            kind: TextureKind::Cubemap,
            extent: Extent2D::new(data.width, data.height),
            format: data.format,
            samples: SampleCount::X1,
            data: Some(TextureSource::Cubemap(data)),
        }
    }

    /// Check the kind against extent, format, samples and source data
    pub fn validate(&self) -> Result<()> {
        if self.extent.is_zero() {
            engine_bail!("lumen3d::texture", "{:?} texture has zero extent", self.kind);
        }
        if self.kind.is_depth() != self.format.is_depth() {
            engine_bail!("lumen3d::texture",
                "{:?} texture cannot use format {:?}", self.kind, self.format);
        }
        let may_multisample = matches!(
            self.kind,
            TextureKind::ColorAttachment | TextureKind::DepthAttachment
        );
        if self.samples.is_multisampled() && !may_multisample {
            engine_bail!("lumen3d::texture",
                "{:?} texture must be single-sampled", self.kind);
        }

        match (self.kind, &self.data) {
            (TextureKind::Sampler2D, Some(TextureSource::Image(image))) => {
                if Extent2D::new(image.width, image.height) != self.extent {
                    engine_bail!("lumen3d::texture",
                        "Image data is {}x{} but the texture is {}x{}",
                        image.width, image.height, self.extent.width, self.extent.height);
                }
            }
            (TextureKind::Cubemap, Some(TextureSource::Cubemap(cube))) => {
                if cube.format != self.format {
                    engine_bail!("lumen3d::texture",
                        "Cubemap data is {:?} but the texture is {:?}", cube.format, self.format);
                }
                if self.extent.width != self.extent.height {
                    engine_bail!("lumen3d::texture",
                        "Cubemap faces must be square, got {}x{}",
                        self.extent.width, self.extent.height);
                }
                if Extent2D::new(cube.width, cube.height) != self.extent {
                    engine_bail!("lumen3d::texture",
                        "Cubemap data is {}x{} but the texture is {}x{}",
                        cube.width, cube.height, self.extent.width, self.extent.height);
                }
            }
            (TextureKind::Sampler2D, _) | (TextureKind::Cubemap, _) => {
                engine_bail!("lumen3d::texture",
                    "{:?} texture requires matching source data", self.kind);
            }
            (_, Some(_)) => {
                engine_bail!("lumen3d::texture",
                    "{:?} texture does not take source data", self.kind);
            }
            (_, None) => {}
        }
        Ok(())
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub kind: TextureKind,
    pub extent: Extent2D,
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub mip_levels: u32,
    /// 6 for cubemaps, 1 otherwise
    pub array_layers: u32,
    pub usage: TextureUsage,
    pub aspect: ImageAspect,
}

impl TextureInfo {
    /// Validate `desc` and derive every creation parameter from it
    pub fn from_desc(desc: &TextureDesc) -> Result<Self> {
        desc.validate()?;
        let mip_levels = match &desc.data {
            Some(TextureSource::Cubemap(cube)) => cube.mip_levels,
            _ => mip_level_count(desc.kind, desc.extent.width, desc.extent.height),
        };
        let array_layers = if desc.kind == TextureKind::Cubemap { CUBE_FACES } else { 1 };
        Ok(Self {
            kind: desc.kind,
            extent: desc.extent,
            format: desc.format,
            samples: desc.samples,
            mip_levels,
            array_layers,
            usage: usage_for(desc.kind, mip_levels),
            aspect: aspect_for(desc.format),
        })
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g., VulkanTexture).
/// The image, its view and its sampler are destroyed when dropped.
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;

    /// Tracker holding the image's current layout
    fn layout_tracker(&self) -> &LayoutTracker;

    /// Sampler parameters for sampled kinds
    fn sampler(&self) -> Option<&SamplerDesc>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;

    fn current_layout(&self) -> ImageLayout {
        self.layout_tracker().current()
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
