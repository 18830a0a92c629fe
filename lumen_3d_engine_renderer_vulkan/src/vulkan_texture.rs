/// VulkanTexture - image, view, memory and sampler for every `TextureKind`
///
/// Creation follows one sequence for all kinds: derive the parameters from
/// the kind, allocate the image and its memory, create the view, then run a
/// single-use command buffer that either uploads the pixels (and builds the
/// mip chain) or moves the image to its working layout.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{
    plan_mip_chain, working_layout, CubemapData, ImageData, ImageLayout, LayoutTracker,
    LayoutTransition, MipBarrier, SamplerDesc, Texture, TextureDesc, TextureInfo, TextureKind,
    TextureSource,
};
use lumen_3d_engine::{engine_bail, engine_debug, engine_err};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, aspect_to_vk, format_to_vk, image_layout_to_vk, pipeline_stages_to_vk,
    sample_count_to_vk, texture_usage_to_vk,
};

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// Cached sampler, owned by the context's sampler cache
    pub(crate) sampler: Option<vk::Sampler>,
    allocation: Option<Allocation>,
    info: TextureInfo,
    sampler_desc: Option<SamplerDesc>,
    tracker: LayoutTracker,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: TextureDesc) -> Result<Self> {
        let info = TextureInfo::from_desc(&desc)?;
        let format = format_to_vk(info.format);

        let mut texture = Self::allocate_image(ctx, info, format)?;

        match &desc.data {
            Some(TextureSource::Image(image)) => texture.upload_image(image, format)?,
            Some(TextureSource::Cubemap(cube)) => texture.upload_cubemap(cube)?,
            None => texture.enter_working_layout()?,
        }

        texture.sampler_desc = SamplerDesc::for_kind(
            texture.info.kind,
            texture.info.mip_levels,
            texture.ctx.limits.max_sampler_anisotropy,
        );
        if let Some(sampler_desc) = &texture.sampler_desc {
            let mut cache = texture.ctx.sampler_cache.lock()
                .map_err(|_| engine_err!("lumen3d::vulkan", "Sampler cache lock poisoned"))?;
            texture.sampler = Some(cache.get_or_create(&texture.ctx.device, sampler_desc)?);
        }

        engine_debug!("lumen3d::vulkan", "Created {:?} texture {}x{} {:?} ({} mips, {} samples)",
            texture.info.kind, texture.info.extent.width, texture.info.extent.height,
            texture.info.format, texture.info.mip_levels, texture.info.samples.count());
        Ok(texture)
    }

    /// Image + memory + view; the image starts in UNDEFINED layout
    fn allocate_image(ctx: Arc<GpuContext>, info: TextureInfo, format: vk::Format) -> Result<Self> {
        let is_cube = info.kind == TextureKind::Cubemap;
        let flags = if is_cube { vk::ImageCreateFlags::CUBE_COMPATIBLE } else { vk::ImageCreateFlags::empty() };

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: info.extent.width,
                    height: info.extent.height,
                    depth: 1,
                })
                .mip_levels(info.mip_levels)
                .array_layers(info.array_layers)
                .samples(sample_count_to_vk(info.samples))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(info.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create {:?} image: {:?}", info.kind, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // from here Drop cleans up whatever has been created
            let mut texture = Self {
                ctx,
                image,
                view: vk::ImageView::null(),
                sampler: None,
                allocation: Some(allocation),
                info,
                sampler_desc: None,
                tracker: LayoutTracker::new(ImageLayout::Undefined),
            };

            if let Some(allocation) = &texture.allocation {
                texture.ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to bind texture memory: {:?}", e))?;
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(if is_cube { vk::ImageViewType::CUBE } else { vk::ImageViewType::TYPE_2D })
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(texture.full_range());

            texture.view = texture.ctx.device.create_image_view(&view_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create texture view: {:?}", e))?;

            Ok(texture)
        }
    }

    pub(crate) fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(self.info.aspect),
            base_mip_level: 0,
            level_count: self.info.mip_levels,
            base_array_layer: 0,
            layer_count: self.info.array_layers,
        }
    }

    /// Render-only and shadow textures: one barrier from UNDEFINED
    fn enter_working_layout(&self) -> Result<()> {
        let target = working_layout(self.info.kind);
        self.tracker.transition(target, |transition| {
            self.ctx.one_time_submit(|cmd| {
                record_layout_transition(&self.ctx.device, cmd, self.image, self.full_range(), transition);
                Ok(())
            })
        })?;
        Ok(())
    }

    /// Sampler2D: copy level 0 then blit the rest of the chain
    fn upload_image(&self, image: &ImageData, format: vk::Format) -> Result<()> {
        if self.info.mip_levels > 1
            && !self.ctx.supports_optimal_features(format, vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            engine_bail!("lumen3d::vulkan",
                "Format {:?} does not support linear blits, cannot build mip chain", self.info.format);
        }

        let staging = VulkanBuffer::staging(Arc::clone(&self.ctx), &image.pixels)?;
        let plan = plan_mip_chain(self.info.extent.width, self.info.extent.height);
        let aspect = aspect_to_vk(self.info.aspect);

        self.ctx.one_time_submit(|cmd| unsafe {
            let to_transfer = LayoutTransition::new(ImageLayout::Undefined, ImageLayout::TransferDst);
            record_layout_transition(&self.ctx.device, cmd, self.image, self.full_range(), &to_transfer);

            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D { width: image.width, height: image.height, depth: 1 });
            self.ctx.device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            for step in &plan.steps {
                self.record_mip_barrier(cmd, &step.before);

                let blit = vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: step.blit.src_level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .src_offsets([
                        vk::Offset3D::default(),
                        vk::Offset3D { x: step.blit.src_size.0 as i32, y: step.blit.src_size.1 as i32, z: 1 },
                    ])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: step.blit.dst_level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .dst_offsets([
                        vk::Offset3D::default(),
                        vk::Offset3D { x: step.blit.dst_size.0 as i32, y: step.blit.dst_size.1 as i32, z: 1 },
                    ]);
                self.ctx.device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );

                self.record_mip_barrier(cmd, &step.after);
            }
            self.record_mip_barrier(cmd, &plan.final_barrier);
            Ok(())
        })?;

        self.tracker.assume(ImageLayout::ShaderReadOnly);
        Ok(())
    }

    /// Cubemap: every face x mip region comes from the container, no blits
    fn upload_cubemap(&self, cube: &CubemapData) -> Result<()> {
        let staging = VulkanBuffer::staging(Arc::clone(&self.ctx), &cube.data)?;
        let aspect = aspect_to_vk(self.info.aspect);

        let regions: Vec<vk::BufferImageCopy> = cube.regions.iter()
            .map(|region| {
                vk::BufferImageCopy::default()
                    .buffer_offset(region.offset)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level: region.mip,
                        base_array_layer: region.face,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D { width: region.width, height: region.height, depth: 1 })
            })
            .collect();

        self.ctx.one_time_submit(|cmd| unsafe {
            let to_transfer = LayoutTransition::new(ImageLayout::Undefined, ImageLayout::TransferDst);
            record_layout_transition(&self.ctx.device, cmd, self.image, self.full_range(), &to_transfer);

            self.ctx.device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            let to_shader = LayoutTransition::new(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
            record_layout_transition(&self.ctx.device, cmd, self.image, self.full_range(), &to_shader);
            Ok(())
        })?;

        self.tracker.assume(ImageLayout::ShaderReadOnly);
        Ok(())
    }

    fn record_mip_barrier(&self, cmd: vk::CommandBuffer, barrier: &MipBarrier) {
        let range = vk::ImageSubresourceRange {
            aspect_mask: aspect_to_vk(self.info.aspect),
            base_mip_level: barrier.level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: self.info.array_layers,
        };
        let image_barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(barrier.old_layout))
            .new_layout(image_layout_to_vk(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(range)
            .src_access_mask(access_flags_to_vk(barrier.src_access))
            .dst_access_mask(access_flags_to_vk(barrier.dst_access));
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                cmd,
                pipeline_stages_to_vk(barrier.src_stages),
                pipeline_stages_to_vk(barrier.dst_stages),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
    }
}

/// Record `transition` as one image barrier over `range`
pub(crate) fn record_layout_transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    transition: &LayoutTransition,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(image_layout_to_vk(transition.old_layout))
        .new_layout(image_layout_to_vk(transition.new_layout))
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(access_flags_to_vk(transition.src_access))
        .dst_access_mask(access_flags_to_vk(transition.dst_access));

    // empty masks are invalid stage masks
    let src_stages = pipeline_stages_to_vk(transition.src_stages);
    let dst_stages = pipeline_stages_to_vk(transition.dst_stages);
    let src_stages = if src_stages.is_empty() { vk::PipelineStageFlags::TOP_OF_PIPE } else { src_stages };
    let dst_stages = if dst_stages.is_empty() { vk::PipelineStageFlags::BOTTOM_OF_PIPE } else { dst_stages };

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stages,
            dst_stages,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn layout_tracker(&self) -> &LayoutTracker {
        &self.tracker
    }

    fn sampler(&self) -> Option<&SamplerDesc> {
        self.sampler_desc.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
    }
}
