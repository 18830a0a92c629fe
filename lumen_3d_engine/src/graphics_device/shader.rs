/// Shader trait and shader descriptor

use std::any::Any;
use std::path::Path;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::{engine_bail, engine_error};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Entry point every shader module is expected to export
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment/Pixel shader
    Fragment,
}

bitflags! {
    /// Set of shader stages (push constant and descriptor visibility)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

impl From<ShaderStage> for ShaderStages {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
        }
    }
}

/// Descriptor for creating a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    /// Shader stage
    pub stage: ShaderStage,
    /// SPIR-V words
    pub code: Vec<u32>,
    /// Entry point function name
    pub entry_point: String,
}

impl ShaderDesc {
    /// Wrap a SPIR-V binary
    ///
    /// The byte length must be a multiple of 4 and the module must start
    /// with the SPIR-V magic number.
    pub fn from_spirv_bytes(stage: ShaderStage, bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            engine_bail!("lumen3d::shader",
                "SPIR-V size {} is not a non-zero multiple of 4", bytes.len());
        }
        let code: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        if code[0] != SPIRV_MAGIC {
            engine_bail!("lumen3d::shader",
                "Bad SPIR-V magic 0x{:08x} (expected 0x{:08x})", code[0], SPIRV_MAGIC);
        }
        Ok(Self {
            stage,
            code,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        })
    }

    /// Load a precompiled SPIR-V file
    pub fn from_file(stage: ShaderStage, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            let message = format!("Failed to read shader '{}': {}", path.display(), e);
            engine_error!("lumen3d::shader", "{}", message);
            Error::AssetLoad(message)
        })?;
        Self::from_spirv_bytes(stage, &bytes)
    }
}

/// Shader resource trait
///
/// Implemented by backend-specific shader types (e.g., VulkanShader).
/// The shader module is destroyed when dropped.
pub trait Shader: Send + Sync {
    fn stage(&self) -> ShaderStage;

    fn entry_point(&self) -> &str;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
