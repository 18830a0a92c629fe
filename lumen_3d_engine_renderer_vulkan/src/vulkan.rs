/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the shared GpuContext; every resource it creates holds a clone of
/// that context, so the device may be dropped before its resources.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::{DeviceLimits, Error, GraphicsDevice, PresentMode, RendererConfig, Result};
use lumen_3d_engine::lumen3d::render::{
    Buffer, BufferDesc, CommandList, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, Extent2D, FrameSync, Framebuffer, FramebufferDesc, Pipeline,
    PipelineDesc, RenderPass, RenderPassDesc, Shader, ShaderDesc, Swapchain, Texture,
    TextureDesc,
};
use lumen_3d_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{DebugMessenger, GpuContext, GpuContextParts};
use crate::vulkan_descriptor::{VulkanDescriptorPool, VulkanDescriptorSetLayout};
use crate::vulkan_format::max_sample_count;
use crate::vulkan_framebuffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_sync::VulkanFrameSync;
use crate::vulkan_texture::VulkanTexture;

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!("lumen3d::vulkan", "Failed to {}: {:?}", what, e);
    Error::InitializationFailed(format!("Failed to {}: {:?}", what, e))
}

/// Device limits as the engine sees them
///
/// MSAA is capped by what both color and depth framebuffers support.
pub(crate) fn limits_from_properties(limits: &vk::PhysicalDeviceLimits, anisotropy_enabled: bool) -> DeviceLimits {
    let samples = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    DeviceLimits {
        max_push_constants_size: limits.max_push_constants_size,
        max_sampler_anisotropy: if anisotropy_enabled { limits.max_sampler_anisotropy } else { 1.0 },
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        max_msaa_samples: max_sample_count(samples),
    }
}

/// Physical device chosen for the surface, with its queue families
struct SelectedDevice {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    name: String,
}

/// Pick the first device with graphics + present support, preferring discrete GPUs
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<SelectedDevice> {
    let devices = instance.enumerate_physical_devices()
        .map_err(|e| init_error("enumerate physical devices", e))?;

    let mut candidates = Vec::new();
    for physical_device in devices {
        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let graphics = families.iter()
            .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);
        let present = (0..families.len() as u32).find(|&i| {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        });
        let has_swapchain = instance.enumerate_device_extension_properties(physical_device)
            .map(|exts| exts.iter().any(|ext| {
                ext.extension_name_as_c_str().map(|n| n == ash::khr::swapchain::NAME).unwrap_or(false)
            }))
            .unwrap_or(false);

        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties.device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        match (graphics, present, has_swapchain) {
            (Some(graphics_family), Some(present_family), true) => {
                let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
                candidates.push((discrete, SelectedDevice { physical_device, graphics_family, present_family, name }));
            }
            _ => {
                engine_debug!("lumen3d::vulkan", "Skipping GPU '{}': no graphics/present queue or swapchain", name);
            }
        }
    }

    // stable sort keeps enumeration order among equals
    candidates.sort_by_key(|(discrete, _)| !*discrete);
    match candidates.into_iter().next() {
        Some((_, selected)) => Ok(selected),
        None => Err(init_error("find a GPU", "no device supports graphics and presentation to this surface")),
    }
}

pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    config: RendererConfig,
}

impl VulkanGraphicsDevice {
    /// Create the instance, surface, device and allocator for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        config.validate()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("load the Vulkan library", e))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_error("use the application name", e))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            let display_handle = window.display_handle().map_err(|e| init_error("get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("get required instance extensions", e))?
                .to_vec();

            let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
            if config.enable_validation && !validation {
                engine_warn!("lumen3d::vulkan",
                    "Validation requested but the vulkan-validation feature is not compiled in");
            }
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(VALIDATION_LAYER.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry.create_instance(&create_info, None)
                .map_err(|e| init_error("create instance", e))?;

            let debug_messenger = if validation {
                Some(Self::create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };

            let window_handle = window.window_handle().map_err(|e| init_error("get window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error("create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let selected = select_physical_device(&instance, &surface_loader, surface)?;
            let physical_device = selected.physical_device;
            let features = instance.get_physical_device_features(physical_device);
            let anisotropy = features.sampler_anisotropy == vk::TRUE;

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(selected.graphics_family)
                    .queue_priorities(&queue_priorities),
            ];
            if selected.present_family != selected.graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(selected.present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(anisotropy)
                .sample_rate_shading(features.sample_rate_shading == vk::TRUE);
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);
            let device = instance.create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error("create logical device", e))?;

            let graphics_queue = device.get_device_queue(selected.graphics_family, 0);
            let present_queue = device.get_device_queue(selected.present_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error("create GPU allocator", e))?;

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(selected.graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device.create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| init_error("create upload command pool", e))?;

            let properties = instance.get_physical_device_properties(physical_device);
            let limits = limits_from_properties(&properties.limits, anisotropy);

            engine_info!("lumen3d::vulkan", "Using GPU '{}' (max MSAA {:?}, anisotropy {})",
                selected.name, limits.max_msaa_samples, limits.max_sampler_anisotropy);

            let ctx = Arc::new(GpuContext::new(GpuContextParts {
                entry,
                instance,
                physical_device,
                device,
                allocator,
                graphics_queue,
                graphics_queue_family: selected.graphics_family,
                present_queue,
                upload_command_pool,
                surface,
                surface_loader,
                limits,
                debug_messenger,
            }));

            Ok(Self { ctx, config: config.clone() })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Result<DebugMessenger> {
        crate::debug::init_debug_routing();
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger = loader
            .create_debug_utils_messenger(&crate::debug::messenger_create_info(), None)
            .map_err(|e| init_error("create debug messenger", e))?;
        Ok(DebugMessenger { loader, messenger })
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(_entry: &ash::Entry, _instance: &ash::Instance) -> Result<DebugMessenger> {
        Err(init_error("create debug messenger", "vulkan-validation feature disabled"))
    }

    /// Configuration the device was created with
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.ctx.limits
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        let compiled = desc.compile()?;
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), compiled)?))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
        swapchain: Option<&dyn Swapchain>,
    ) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::new(Arc::clone(&self.ctx), desc, swapchain)?))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        let limits = self.ctx.limits;
        Ok(Arc::new(VulkanPipeline::new(Arc::clone(&self.ctx), desc, &limits)?))
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(VulkanDescriptorSetLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_descriptor_pool(&mut self, desc: DescriptorPoolDesc) -> Result<Box<dyn DescriptorPool>> {
        Ok(Box::new(VulkanDescriptorPool::new(Arc::clone(&self.ctx), &desc)?))
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), &desc)?))
    }

    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(Arc::clone(&self.ctx))?))
    }

    fn create_frame_sync(&mut self) -> Result<Box<dyn FrameSync>> {
        Ok(Box::new(VulkanFrameSync::new(Arc::clone(&self.ctx))?))
    }

    fn create_swapchain(&mut self, extent: Extent2D, present_mode: PresentMode) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(VulkanSwapchain::new(Arc::clone(&self.ctx), extent, present_mode)?))
    }

    fn submit_frame(&mut self, command_lists: &[&dyn CommandList], sync: &dyn FrameSync) -> Result<()> {
        let Some(sync) = sync.as_any().downcast_ref::<VulkanFrameSync>() else {
            engine_bail!("lumen3d::vulkan", "Frame sync is not a Vulkan frame sync");
        };
        let mut command_buffers = Vec::with_capacity(command_lists.len());
        for (i, list) in command_lists.iter().enumerate() {
            let Some(list) = list.as_any().downcast_ref::<VulkanCommandList>() else {
                engine_bail!("lumen3d::vulkan", "Command list {} is not a Vulkan command list", i);
            };
            command_buffers.push(list.command_buffer);
        }

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx.device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], sync.in_flight)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to submit frame: {:?}", e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }
}
