/// Scene pass graph: shadow -> offscreen -> present
///
/// - shadow: depth-only pass into a fixed-size shadow map, left readable
///   for the lit passes;
/// - offscreen: multisampled scene at a fraction of the window size,
///   resolved into a sampled color target;
/// - present: composites the offscreen image into the swapchain image
///   (subpass 0), then draws the skybox behind it (subpass 1).
///
/// Each pass records into its own command list, submitted in that order.
/// Only the size-dependent targets and framebuffers are rebuilt on resize.

use std::sync::Arc;
use crate::config::RendererConfig;
use crate::error::Result;
use crate::frame::{FrameContext, FrameRecorder, PassAction};
use crate::graphics_device::{
    create_attachment_textures, create_texture_framebuffer, AttachmentDesc, AttachmentLayout,
    CommandList, Extent2D, Framebuffer, GraphicsDevice, PassTarget, Rect2D, RenderPass,
    RenderPassDesc, SampleCount, SubpassDesc, Swapchain, SwapchainFramebuffers, Texture,
    TextureDesc, TextureFormat, Viewport,
};
use crate::utils::{ResourceKey, ResourceTable};
use crate::{engine_bail, engine_debug, engine_info};

pub const SHADOW_PASS: usize = 0;
pub const OFFSCREEN_PASS: usize = 1;
pub const PRESENT_PASS: usize = 2;
pub const SCENE_PASS_COUNT: usize = 3;

pub const COMPOSITE_SUBPASS: u32 = 0;
pub const SKYBOX_SUBPASS: u32 = 1;

pub const SHADOW_FORMAT: TextureFormat = TextureFormat::D32_SFLOAT;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_SFLOAT;
pub const OFFSCREEN_FORMAT: TextureFormat = TextureFormat::R16G16B16A16_SFLOAT;

// offscreen layout positions
const OFFSCREEN_COLOR: usize = 0;
const OFFSCREEN_DEPTH: usize = 1;
const OFFSCREEN_RESOLVE: usize = 2;

/// Where an action is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassSlot {
    Shadow,
    Offscreen,
    Composite,
    Skybox,
}

/// Targets later passes sample
pub struct SceneTargets<'a> {
    pub shadow_map: &'a Arc<dyn Texture>,
    pub offscreen_color: &'a Arc<dyn Texture>,
}

struct PassNode {
    render_pass: Arc<dyn RenderPass>,
    /// Actions per subpass
    subpass_actions: Vec<Vec<Box<dyn PassAction>>>,
}

impl PassNode {
    fn new(render_pass: Arc<dyn RenderPass>) -> Self {
        let subpass_actions = (0..render_pass.subpass_count()).map(|_| Vec::new()).collect();
        Self { render_pass, subpass_actions }
    }

    fn record(
        &mut self,
        cmd: &mut dyn CommandList,
        framebuffer: &Arc<dyn Framebuffer>,
        frame_index: usize,
    ) -> Result<()> {
        let extent = framebuffer.extent();
        cmd.begin_render_pass(&self.render_pass, framebuffer)?;
        for (i, actions) in self.subpass_actions.iter_mut().enumerate() {
            if i > 0 {
                cmd.next_subpass()?;
            }
            cmd.set_viewport(Viewport::full(extent))?;
            cmd.set_scissor(Rect2D::full(extent))?;
            for action in actions.iter_mut() {
                action.execute(cmd, frame_index)?;
            }
        }
        cmd.end_render_pass()
    }

    fn notify(&mut self, targets: &SceneTargets<'_>) -> Result<()> {
        for action in self.subpass_actions.iter_mut().flatten() {
            action.targets_recreated(targets)?;
        }
        Ok(())
    }
}

fn shadow_pass_desc() -> RenderPassDesc {
    let mut layout = AttachmentLayout::new();
    layout.add_attachment(AttachmentDesc::shadow(SHADOW_FORMAT));
    RenderPassDesc::new(layout, PassTarget::Offscreen).with_sampled_output()
}

fn offscreen_pass_desc(samples: SampleCount) -> RenderPassDesc {
    let mut layout = AttachmentLayout::new();
    layout.add_attachment(AttachmentDesc::color(OFFSCREEN_FORMAT, samples));
    layout.add_attachment(AttachmentDesc::depth(DEPTH_FORMAT, samples));
    layout.add_attachment(AttachmentDesc::color_resolve(OFFSCREEN_FORMAT));
    RenderPassDesc::new(layout, PassTarget::Offscreen).with_sampled_output()
}

fn present_pass_desc(format: TextureFormat, samples: SampleCount) -> RenderPassDesc {
    let mut layout = AttachmentLayout::new();
    let resolve = layout.add_attachment(AttachmentDesc::color_resolve_present(format));
    let color = layout.add_attachment(AttachmentDesc::color(format, samples));
    let depth = layout.add_attachment(AttachmentDesc::depth(DEPTH_FORMAT, samples));

    // resolve once, at the end of the last subpass
    let composite = SubpassDesc { color: vec![color], resolve: Vec::new(), depth: Some(depth), input: Vec::new() };
    let skybox = SubpassDesc { color: vec![color], resolve: vec![resolve], depth: Some(depth), input: Vec::new() };
    RenderPassDesc::new(layout, PassTarget::Present)
        .with_subpass(composite)
        .with_subpass(skybox)
        .chain_subpasses()
}

/// Offscreen textures and framebuffer at `extent`
fn build_offscreen(
    device: &mut dyn GraphicsDevice,
    render_pass: &Arc<dyn RenderPass>,
    table: &mut ResourceTable<Arc<dyn Texture>>,
    extent: Extent2D,
) -> Result<(Vec<ResourceKey>, Arc<dyn Framebuffer>)> {
    let mut textures = Vec::with_capacity(render_pass.attachment_count() as usize);
    for texture in create_attachment_textures(device, render_pass.as_ref(), extent)? {
        let Some(texture) = texture else {
            engine_bail!("lumen3d::scene_passes", "Offscreen pass cannot present");
        };
        textures.push(texture);
    }
    let framebuffer = create_texture_framebuffer(device, render_pass, &textures, extent)?;
    let keys = textures.into_iter().map(|t| table.insert(t)).collect();
    Ok((keys, framebuffer))
}

/// The shadow / offscreen / present pass graph
pub struct ScenePasses {
    shadow: PassNode,
    shadow_map: Arc<dyn Texture>,
    shadow_framebuffer: Arc<dyn Framebuffer>,
    offscreen: PassNode,
    offscreen_targets: ResourceTable<Arc<dyn Texture>>,
    /// Keys of the offscreen textures, in layout order
    offscreen_keys: Vec<ResourceKey>,
    offscreen_framebuffer: Arc<dyn Framebuffer>,
    offscreen_divisor: u32,
    present: PassNode,
    present_framebuffers: SwapchainFramebuffers,
}

impl ScenePasses {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        swapchain: &dyn Swapchain,
        config: &RendererConfig,
    ) -> Result<Self> {
        config.validate()?;
        let samples = config.effective_samples(&device.limits());
        if !samples.is_multisampled() {
            engine_bail!("lumen3d::scene_passes",
                "Scene passes resolve multisampled targets; {} sample(s) requested", samples.count());
        }

        // shadow
        let shadow_pass = device.create_render_pass(&shadow_pass_desc())?;
        let shadow_map = device.create_texture(TextureDesc::shadow_map(config.shadow_map_size, SHADOW_FORMAT))?;
        let shadow_extent = Extent2D::new(config.shadow_map_size, config.shadow_map_size);
        let shadow_framebuffer = create_texture_framebuffer(
            device, &shadow_pass, std::slice::from_ref(&shadow_map), shadow_extent)?;

        // offscreen
        let offscreen_pass = device.create_render_pass(&offscreen_pass_desc(samples))?;
        let mut offscreen_targets = ResourceTable::new("offscreen targets");
        let offscreen_extent = swapchain.extent().scaled_down(config.offscreen_divisor);
        let (offscreen_keys, offscreen_framebuffer) =
            build_offscreen(device, &offscreen_pass, &mut offscreen_targets, offscreen_extent)?;

        // present
        let present_pass = device.create_render_pass(&present_pass_desc(swapchain.format(), samples))?;
        let present_framebuffers = SwapchainFramebuffers::new(device, Arc::clone(&present_pass), swapchain)?;

        engine_info!("lumen3d::scene_passes",
            "Scene passes ready: shadow {}x{}, offscreen {}x{}, present {}x{}, {} samples",
            shadow_extent.width, shadow_extent.height,
            offscreen_extent.width, offscreen_extent.height,
            swapchain.extent().width, swapchain.extent().height,
            samples.count());

        Ok(Self {
            shadow: PassNode::new(shadow_pass),
            shadow_map,
            shadow_framebuffer,
            offscreen: PassNode::new(offscreen_pass),
            offscreen_targets,
            offscreen_keys,
            offscreen_framebuffer,
            offscreen_divisor: config.offscreen_divisor,
            present: PassNode::new(present_pass),
            present_framebuffers,
        })
    }

    /// Append `action` to `slot`; it is immediately told the current targets
    pub fn add_action(&mut self, slot: PassSlot, mut action: Box<dyn PassAction>) -> Result<()> {
        action.targets_recreated(&self.targets()?)?;
        let (node, subpass) = match slot {
            PassSlot::Shadow => (&mut self.shadow, 0),
            PassSlot::Offscreen => (&mut self.offscreen, 0),
            PassSlot::Composite => (&mut self.present, COMPOSITE_SUBPASS as usize),
            PassSlot::Skybox => (&mut self.present, SKYBOX_SUBPASS as usize),
        };
        node.subpass_actions[subpass].push(action);
        Ok(())
    }

    pub fn targets(&self) -> Result<SceneTargets<'_>> {
        Ok(SceneTargets {
            shadow_map: &self.shadow_map,
            offscreen_color: self.offscreen_color()?,
        })
    }

    pub fn shadow_pass(&self) -> &Arc<dyn RenderPass> {
        &self.shadow.render_pass
    }

    pub fn offscreen_pass(&self) -> &Arc<dyn RenderPass> {
        &self.offscreen.render_pass
    }

    pub fn present_pass(&self) -> &Arc<dyn RenderPass> {
        &self.present.render_pass
    }

    pub fn shadow_map(&self) -> &Arc<dyn Texture> {
        &self.shadow_map
    }

    /// Resolved offscreen image sampled by the composite subpass
    pub fn offscreen_color(&self) -> Result<&Arc<dyn Texture>> {
        self.offscreen_targets.get(self.offscreen_keys[OFFSCREEN_RESOLVE])
    }

    /// Key of the resolved offscreen image; stale after a resize
    pub fn offscreen_color_key(&self) -> ResourceKey {
        self.offscreen_keys[OFFSCREEN_RESOLVE]
    }

    pub fn offscreen_target(&self, key: ResourceKey) -> Result<&Arc<dyn Texture>> {
        self.offscreen_targets.get(key)
    }

    /// Multisampled offscreen color and depth keys
    pub fn offscreen_attachment_keys(&self) -> (ResourceKey, ResourceKey) {
        (self.offscreen_keys[OFFSCREEN_COLOR], self.offscreen_keys[OFFSCREEN_DEPTH])
    }

    pub fn offscreen_extent(&self) -> Extent2D {
        self.offscreen_framebuffer.extent()
    }

    pub fn present_extent(&self) -> Extent2D {
        self.present_framebuffers.extent()
    }
}

impl FrameRecorder for ScenePasses {
    fn pass_count(&self) -> usize {
        SCENE_PASS_COUNT
    }

    fn record(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        let frame_index = ctx.frame_index;
        self.shadow.record(ctx.command_list(SHADOW_PASS)?, &self.shadow_framebuffer, frame_index)?;
        self.offscreen.record(ctx.command_list(OFFSCREEN_PASS)?, &self.offscreen_framebuffer, frame_index)?;
        let framebuffer = self.present_framebuffers.framebuffer(ctx.image_index)?;
        self.present.record(ctx.command_list(PRESENT_PASS)?, framebuffer, frame_index)
    }

    fn on_swapchain_recreated(
        &mut self,
        device: &mut dyn GraphicsDevice,
        swapchain: &dyn Swapchain,
    ) -> Result<()> {
        let extent = swapchain.extent().scaled_down(self.offscreen_divisor);
        self.offscreen_targets.clear();
        let (keys, framebuffer) =
            build_offscreen(device, &self.offscreen.render_pass, &mut self.offscreen_targets, extent)?;
        self.offscreen_keys = keys;
        self.offscreen_framebuffer = framebuffer;

        self.present_framebuffers.recreate(device, swapchain)?;

        let targets = SceneTargets {
            shadow_map: &self.shadow_map,
            offscreen_color: self.offscreen_targets.get(self.offscreen_keys[OFFSCREEN_RESOLVE])?,
        };
        self.shadow.notify(&targets)?;
        self.offscreen.notify(&targets)?;
        self.present.notify(&targets)?;

        engine_debug!("lumen3d::scene_passes",
            "Rebuilt size-dependent targets: offscreen {}x{}, present {}x{}",
            extent.width, extent.height, swapchain.extent().width, swapchain.extent().height);
        Ok(())
    }
}

#[cfg(test)]
#[path = "scene_passes_tests.rs"]
mod tests;
