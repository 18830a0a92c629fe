/// Descriptor set layouts, pools and sets
///
/// Three descriptor types cover the renderer: per-frame uniform buffers,
/// per-object dynamic uniform buffers (one buffer, a dynamic offset per
/// draw) and combined image samplers.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{Buffer, BufferUsage, ShaderStages, Texture};
use crate::engine_bail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    UniformBufferDynamic,
    CombinedImageSampler,
}

impl DescriptorType {
    pub const ALL: [DescriptorType; 3] = [
        DescriptorType::UniformBuffer,
        DescriptorType::UniformBufferDynamic,
        DescriptorType::CombinedImageSampler,
    ];
}

/// One binding slot of a set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    /// Array size
    pub count: u32,
    pub stages: ShaderStages,
}

impl DescriptorBinding {
    pub fn new(binding: u32, ty: DescriptorType, stages: ShaderStages) -> Self {
        Self { binding, ty, count: 1, stages }
    }
}

/// Descriptor set layout description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutDesc {
    pub fn new(bindings: Vec<DescriptorBinding>) -> Self {
        Self { bindings }
    }

    /// Binding numbers are unique and every count is non-zero
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if !seen.insert(binding.binding) {
                engine_bail!("lumen3d::descriptor", "Binding {} declared twice", binding.binding);
            }
            if binding.count == 0 {
                engine_bail!("lumen3d::descriptor", "Binding {} has zero descriptors", binding.binding);
            }
        }
        Ok(())
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }

    /// Number of dynamic offsets a bind of this layout needs
    pub fn dynamic_binding_count(&self) -> u32 {
        self.bindings
            .iter()
            .filter(|b| b.ty == DescriptorType::UniformBufferDynamic)
            .map(|b| b.count)
            .sum()
    }

    /// Check a write against this layout
    pub fn validate_write(&self, write: &DescriptorWrite) -> Result<()> {
        let Some(binding) = self.binding(write.binding) else {
            engine_bail!("lumen3d::descriptor",
                "Write targets binding {} which the layout does not declare", write.binding);
        };

        match (&write.resource, binding.ty) {
            (
                DescriptorResource::Buffer { buffer, offset, range },
                DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic,
            ) => {
                if buffer.usage() != BufferUsage::Uniform {
                    engine_bail!("lumen3d::descriptor",
                        "Binding {} needs a uniform buffer, got {:?}",
                        write.binding, buffer.usage());
                }
                if *range == 0 || offset + range > buffer.size() {
                    engine_bail!("lumen3d::descriptor",
                        "Binding {} range {}+{} outside buffer of {} bytes",
                        write.binding, offset, range, buffer.size());
                }
            }
            (DescriptorResource::Texture { texture }, DescriptorType::CombinedImageSampler) => {
                if texture.sampler().is_none() {
                    engine_bail!("lumen3d::descriptor",
                        "Binding {} needs a sampled texture, got a {:?}",
                        write.binding, texture.info().kind);
                }
            }
            (_, ty) => {
                engine_bail!("lumen3d::descriptor",
                    "Resource written to binding {} does not match its type {:?}",
                    write.binding, ty);
            }
        }
        Ok(())
    }
}

/// Total descriptors of one type a pool can hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub ty: DescriptorType,
    pub count: u32,
}

/// Descriptor pool description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub max_sets: u32,
    pub sizes: Vec<DescriptorPoolSize>,
}

impl DescriptorPoolDesc {
    /// Pool sized for `sets` allocations of each layout
    pub fn for_layouts(layouts: &[(&DescriptorSetLayoutDesc, u32)]) -> Self {
        let mut totals: FxHashMap<DescriptorType, u32> = FxHashMap::default();
        let mut max_sets = 0;
        for (layout, sets) in layouts {
            max_sets += sets;
            for binding in &layout.bindings {
                *totals.entry(binding.ty).or_insert(0) += binding.count * sets;
            }
        }
        // fixed order keeps the description deterministic
        let sizes = DescriptorType::ALL
            .iter()
            .filter_map(|ty| totals.get(ty).map(|&count| DescriptorPoolSize { ty: *ty, count }))
            .collect();
        Self { max_sets, sizes }
    }
}

/// Resource bound by a descriptor write
#[derive(Clone)]
pub enum DescriptorResource {
    /// `range` bytes at `offset`; for dynamic bindings `range` is the size
    /// seen by one draw and the offset is added at bind time
    Buffer { buffer: Arc<dyn Buffer>, offset: u64, range: u64 },
    /// Texture with its sampler
    Texture { texture: Arc<dyn Texture> },
}

#[derive(Clone)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

/// Per-object stride of a dynamic uniform buffer
///
/// `size` rounded up to the device's `min_uniform_buffer_offset_alignment`.
pub fn dynamic_stride(size: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// Descriptor set layout resource trait
pub trait DescriptorSetLayout: Send + Sync {
    fn desc(&self) -> &DescriptorSetLayoutDesc;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Descriptor set resource trait
///
/// A set keeps the resources written into it alive.
pub trait DescriptorSet: Send + Sync {
    fn layout(&self) -> &Arc<dyn DescriptorSetLayout>;

    /// Validate and apply `writes`
    ///
    /// Only call for sets the GPU is not using: per-frame sets are written
    /// for the slot whose fence was just waited on.
    fn update(&self, writes: &[DescriptorWrite]) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Descriptor pool resource trait
///
/// Sets are freed together with the pool.
pub trait DescriptorPool: Send + Sync {
    fn allocate(&mut self, layout: &Arc<dyn DescriptorSetLayout>) -> Result<Arc<dyn DescriptorSet>>;

    /// Sets still available
    fn remaining_sets(&self) -> u32;
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
