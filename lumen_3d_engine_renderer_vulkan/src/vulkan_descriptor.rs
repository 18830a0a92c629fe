/// Descriptor set layouts, pools and sets
///
/// Sets hold a reference on their pool's handle, so the VkDescriptorPool is
/// destroyed only once the pool object and every set allocated from it are
/// gone. Resources written into a set stay alive as long as the set does.

use ash::vk;
use std::any::Any;
use std::sync::{Arc, Mutex};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::lumen3d::render::{
    DescriptorPool, DescriptorPoolDesc, DescriptorResource, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, DescriptorType, DescriptorWrite, ImageLayout,
    Texture, TextureKind,
};
use lumen_3d_engine::{engine_bail, engine_err, engine_error, engine_trace};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{descriptor_type_to_vk, image_layout_to_vk, shader_stages_to_vk};
use crate::vulkan_texture::VulkanTexture;

// ===== LAYOUT =====

pub struct VulkanDescriptorSetLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    desc: DescriptorSetLayoutDesc,
}

impl VulkanDescriptorSetLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: DescriptorSetLayoutDesc) -> Result<Self> {
        desc.validate()?;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.bindings.iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.ty))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            ctx.device.create_descriptor_set_layout(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create descriptor set layout: {:?}", e))?
        };

        Ok(Self { ctx, layout, desc })
    }
}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn desc(&self) -> &DescriptorSetLayoutDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_descriptor_set_layout(self.layout, None); }
    }
}

// ===== POOL =====

/// Owns the VkDescriptorPool; shared by the pool object and its sets
struct PoolHandle {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_descriptor_pool(self.pool, None); }
    }
}

pub struct VulkanDescriptorPool {
    handle: Arc<PoolHandle>,
    remaining_sets: u32,
}

impl VulkanDescriptorPool {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &DescriptorPoolDesc) -> Result<Self> {
        if desc.max_sets == 0 || desc.sizes.is_empty() {
            engine_bail!("lumen3d::vulkan",
                "Descriptor pool needs at least one set and one size (max_sets {}, {} sizes)",
                desc.max_sets, desc.sizes.len());
        }

        let sizes: Vec<vk::DescriptorPoolSize> = desc.sizes.iter()
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(s.ty),
                descriptor_count: s.count,
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(desc.max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe {
            ctx.device.create_descriptor_pool(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create descriptor pool: {:?}", e))?
        };

        Ok(Self {
            handle: Arc::new(PoolHandle { ctx, pool }),
            remaining_sets: desc.max_sets,
        })
    }
}

impl DescriptorPool for VulkanDescriptorPool {
    fn allocate(&mut self, layout: &Arc<dyn DescriptorSetLayout>) -> Result<Arc<dyn DescriptorSet>> {
        if self.remaining_sets == 0 {
            engine_error!("lumen3d::vulkan", "Descriptor pool exhausted");
            return Err(Error::OutOfMemory);
        }
        let Some(vk_layout) = layout.as_any().downcast_ref::<VulkanDescriptorSetLayout>() else {
            engine_bail!("lumen3d::vulkan", "Descriptor set layout is not a Vulkan layout");
        };

        let layouts = [vk_layout.layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle.pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.handle.ctx.device.allocate_descriptor_sets(&allocate_info).map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                    engine_error!("lumen3d::vulkan", "Descriptor pool out of memory: {:?}", e);
                    Error::OutOfMemory
                }
                other => engine_err!("lumen3d::vulkan", "Failed to allocate descriptor set: {:?}", other),
            })?
        };
        let Some(&set) = sets.first() else {
            engine_bail!("lumen3d::vulkan", "Descriptor set allocation returned nothing");
        };

        self.remaining_sets -= 1;
        engine_trace!("lumen3d::vulkan", "Allocated descriptor set ({} left)", self.remaining_sets);

        Ok(Arc::new(VulkanDescriptorSet {
            pool: Arc::clone(&self.handle),
            set,
            layout: Arc::clone(layout),
            bound: Mutex::new(Vec::new()),
        }))
    }

    fn remaining_sets(&self) -> u32 {
        self.remaining_sets
    }
}

// ===== SET =====

pub struct VulkanDescriptorSet {
    pool: Arc<PoolHandle>,
    pub(crate) set: vk::DescriptorSet,
    layout: Arc<dyn DescriptorSetLayout>,
    /// (binding, resource) currently written, held alive
    bound: Mutex<Vec<(u32, DescriptorResource)>>,
}

/// Layout a sampled texture is read in
fn sampled_layout(texture: &dyn Texture) -> ImageLayout {
    if texture.info().kind == TextureKind::ShadowMap {
        ImageLayout::DepthStencilReadOnly
    } else {
        ImageLayout::ShaderReadOnly
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn layout(&self) -> &Arc<dyn DescriptorSetLayout> {
        &self.layout
    }

    fn update(&self, writes: &[DescriptorWrite]) -> Result<()> {
        for write in writes {
            self.layout.desc().validate_write(write)?;
        }

        // infos must outlive the vk::WriteDescriptorSet borrowing them
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        for write in writes {
            match &write.resource {
                DescriptorResource::Buffer { buffer, offset, range } => {
                    let Some(vk_buffer) = buffer.as_any().downcast_ref::<VulkanBuffer>() else {
                        engine_bail!("lumen3d::vulkan", "Binding {} buffer is not a Vulkan buffer", write.binding);
                    };
                    buffer_infos.push((write.binding, [vk::DescriptorBufferInfo {
                        buffer: vk_buffer.buffer,
                        offset: *offset,
                        range: *range,
                    }]));
                }
                DescriptorResource::Texture { texture } => {
                    let Some(vk_texture) = texture.as_any().downcast_ref::<VulkanTexture>() else {
                        engine_bail!("lumen3d::vulkan", "Binding {} texture is not a Vulkan texture", write.binding);
                    };
                    let Some(sampler) = vk_texture.sampler else {
                        engine_bail!("lumen3d::vulkan",
                            "Binding {}: {:?} texture cannot be sampled", write.binding, texture.info().kind);
                    };
                    image_infos.push((write.binding, [vk::DescriptorImageInfo {
                        sampler,
                        image_view: vk_texture.view,
                        image_layout: image_layout_to_vk(sampled_layout(texture.as_ref())),
                    }]));
                }
            }
        }

        let mut vk_writes = Vec::with_capacity(writes.len());
        for (binding, info) in &buffer_infos {
            let ty = self.layout.desc().binding(*binding).map(|b| b.ty).unwrap_or(DescriptorType::UniformBuffer);
            vk_writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .descriptor_type(descriptor_type_to_vk(ty))
                    .buffer_info(info),
            );
        }
        for (binding, info) in &image_infos {
            vk_writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(info),
            );
        }

        let mut bound = self.bound.lock()
            .map_err(|_| engine_err!("lumen3d::vulkan", "Descriptor set lock poisoned"))?;
        unsafe { self.pool.ctx.device.update_descriptor_sets(&vk_writes, &[]); }

        for write in writes {
            bound.retain(|(binding, _)| *binding != write.binding);
            bound.push((write.binding, write.resource.clone()));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
