/// VulkanBuffer - host-visible, persistently mapped buffer

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{check_buffer_range, Buffer, BufferDesc, BufferUsage};
use lumen_3d_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;

pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
}

fn usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
    }
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            engine_bail!("lumen3d::vulkan", "{:?} buffer has zero size", desc.usage);
        }
        Self::create(ctx, desc.size, usage_to_vk(desc.usage), desc.usage, "buffer")
    }

    /// Transfer-source buffer for texture uploads
    pub(crate) fn staging(ctx: Arc<GpuContext>, data: &[u8]) -> Result<Self> {
        let staging = Self::create(
            ctx,
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Uniform,
            "staging_buffer",
        )?;
        staging.write(0, data)?;
        Ok(staging)
    }

    fn create(
        ctx: Arc<GpuContext>,
        size: u64,
        vk_usage: vk::BufferUsageFlags,
        usage: BufferUsage,
        name: &str,
    ) -> Result<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(vk_usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create {}: {:?}", name, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate(name, requirements, MemoryLocation::CpuToGpu, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // from here Drop releases both handles
            let result = Self { ctx, buffer, allocation: Some(allocation), size, usage };
            if let Some(allocation) = &result.allocation {
                result.ctx.device
                    .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to bind {} memory: {:?}", name, e))?;
            }
            Ok(result)
        }
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range(self.size, offset, data.len() as u64)?;
        let allocation = self.allocation.as_ref()
            .ok_or_else(|| engine_err!("lumen3d::vulkan", "Buffer has no allocation"))?;
        let mapped = allocation.mapped_ptr()
            .ok_or_else(|| engine_err!("lumen3d::vulkan", "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }
}

impl Buffer for VulkanBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.write(offset, data)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe { self.ctx.device.destroy_buffer(self.buffer, None); }
    }
}
