/// GpuContext - shared ownership of the Vulkan instance, device and allocator
///
/// Every GPU resource (texture, buffer, pipeline, swapchain, ...) holds an
/// `Arc<GpuContext>`, so the device and the instance outlive every object
/// created from them. The last resource to drop destroys the context.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::Mutex;
use lumen_3d_engine::lumen3d::{DeviceLimits, Error, Result};
use lumen_3d_engine::{engine_debug, engine_err, engine_error};

use crate::vulkan_sampler::SamplerCache;

/// Debug-utils loader and messenger created when validation is active
pub(crate) struct DebugMessenger {
    pub(crate) loader: ash::ext::debug_utils::Instance,
    pub(crate) messenger: vk::DebugUtilsMessengerEXT,
}

/// Shared GPU context for all Vulkan resources
pub struct GpuContext {
    /// Vulkan loader; must outlive the instance
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Dropped by hand before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    pub(crate) present_queue: vk::Queue,

    /// Reusable pool for one-shot upload and transition command buffers
    upload_command_pool: Mutex<vk::CommandPool>,

    /// Presentation surface of the window the device was created for
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: ash::khr::surface::Instance,

    pub(crate) sampler_cache: Mutex<SamplerCache>,
    pub(crate) limits: DeviceLimits,

    debug_messenger: Option<DebugMessenger>,
}

/// Everything `GpuContext::new` takes ownership of
pub(crate) struct GpuContextParts {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub upload_command_pool: vk::CommandPool,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub limits: DeviceLimits,
    pub debug_messenger: Option<DebugMessenger>,
}

impl GpuContext {
    pub(crate) fn new(parts: GpuContextParts) -> Self {
        Self {
            _entry: parts.entry,
            instance: parts.instance,
            physical_device: parts.physical_device,
            device: parts.device,
            allocator: ManuallyDrop::new(Mutex::new(parts.allocator)),
            graphics_queue: parts.graphics_queue,
            graphics_queue_family: parts.graphics_queue_family,
            present_queue: parts.present_queue,
            upload_command_pool: Mutex::new(parts.upload_command_pool),
            surface: parts.surface,
            surface_loader: parts.surface_loader,
            sampler_cache: Mutex::new(SamplerCache::new()),
            limits: parts.limits,
            debug_messenger: parts.debug_messenger,
        }
    }

    /// Allocate device memory for an image or buffer
    ///
    /// Allocation failures are reported as `Error::OutOfMemory`.
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self.allocator.lock().map_err(|_| {
            engine_err!("lumen3d::vulkan", "GPU allocator lock poisoned")
        })?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("lumen3d::vulkan",
                    "Out of GPU memory for '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator; never fails loudly (used in Drop)
    pub(crate) fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Record `record` into a one-shot command buffer, submit it on the
    /// graphics queue and block until the GPU has executed it
    pub(crate) fn one_time_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let pool = self.upload_command_pool.lock().map_err(|_| {
            engine_err!("lumen3d::vulkan", "Upload command pool lock poisoned")
        })?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("lumen3d::vulkan",
                    "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.submit_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("lumen3d::vulkan",
                "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer)?;

        self.device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("lumen3d::vulkan",
                "Failed to end upload command buffer: {:?}", e))?;

        let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create upload fence: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let result = self.device
            .queue_submit(self.graphics_queue, &[submit_info], fence)
            .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX))
            .map_err(|e| engine_err!("lumen3d::vulkan", "Upload submission failed: {:?}", e));

        self.device.destroy_fence(fence, None);
        result
    }

    /// Whether `format` supports `features` with optimal tiling
    pub(crate) fn supports_optimal_features(
        &self,
        format: vk::Format,
        features: vk::FormatFeatureFlags,
    ) -> bool {
        let properties = unsafe {
            self.instance.get_physical_device_format_properties(self.physical_device, format)
        };
        properties.optimal_tiling_features.contains(features)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(cache) = self.sampler_cache.get_mut() {
                cache.destroy_all(&self.device);
            }
            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // allocator frees its memory blocks: device must still be alive
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some(debug) = self.debug_messenger.take() {
                #[cfg(feature = "vulkan-validation")]
                crate::debug::shutdown_debug_routing();
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }

            self.instance.destroy_instance(None);
        }
        engine_debug!("lumen3d::vulkan", "GPU context destroyed");
    }
}
