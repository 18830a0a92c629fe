/// Sampler parameters derived from a texture's role

use crate::graphics_device::TextureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    OpaqueBlack,
    OpaqueWhite,
    TransparentBlack,
}

/// Comparison used by depth tests and comparison samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_filter: Filter,
    pub address_mode: AddressMode,
    pub border_color: BorderColor,
    /// Anisotropy level, `None` disables anisotropic filtering
    pub max_anisotropy: Option<f32>,
    /// Comparison for hardware PCF, `None` for plain sampling
    pub compare: Option<CompareOp>,
    pub max_lod: f32,
}

impl SamplerDesc {
    /// Sampler for a texture of `kind`; `None` for render-only attachments
    ///
    /// `device_max_anisotropy` bounds the anisotropy of color textures.
    pub fn for_kind(kind: TextureKind, mip_levels: u32, device_max_anisotropy: f32) -> Option<Self> {
        let anisotropy = if device_max_anisotropy > 1.0 {
            Some(device_max_anisotropy.min(16.0))
        } else {
            None
        };
        match kind {
            TextureKind::ColorAttachment | TextureKind::DepthAttachment => None,
            TextureKind::ShadowMap => Some(Self {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_filter: Filter::Nearest,
                address_mode: AddressMode::ClampToBorder,
                // outside the light frustum counts as lit
                border_color: BorderColor::OpaqueWhite,
                max_anisotropy: None,
                compare: Some(CompareOp::LessOrEqual),
                max_lod: 1.0,
            }),
            TextureKind::ResolveTarget => Some(Self {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_filter: Filter::Nearest,
                address_mode: AddressMode::ClampToEdge,
                border_color: BorderColor::OpaqueBlack,
                max_anisotropy: None,
                compare: None,
                max_lod: 1.0,
            }),
            TextureKind::Sampler2D | TextureKind::Cubemap => Some(Self {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_filter: Filter::Linear,
                address_mode: if kind == TextureKind::Cubemap {
                    AddressMode::ClampToEdge
                } else {
                    AddressMode::Repeat
                },
                border_color: BorderColor::OpaqueBlack,
                max_anisotropy: anisotropy,
                compare: None,
                max_lod: mip_levels as f32,
            }),
        }
    }
}
