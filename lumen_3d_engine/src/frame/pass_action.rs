/// Pass action trait and implementations.
///
/// Defines what a pass records between begin_render_pass() and
/// end_render_pass(), one action list per subpass.

use std::sync::Arc;
use crate::error::Result;
use crate::frame::SceneTargets;
use crate::graphics_device::{
    CommandList, DescriptorResource, DescriptorSet, DescriptorWrite, Pipeline,
};
use crate::engine_bail;

/// Action executed inside a subpass
pub trait PassAction: Send + Sync {
    /// Record draw commands for frame slot `frame_index`
    ///
    /// Viewport and scissor are already set to the framebuffer extent.
    fn execute(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()>;

    /// Size-dependent targets were rebuilt; rewrite descriptors that
    /// sample them
    fn targets_recreated(&mut self, _targets: &SceneTargets<'_>) -> Result<()> {
        Ok(())
    }
}

/// Scene target a fullscreen pass samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampledTarget {
    ShadowMap,
    OffscreenColor,
}

/// Fullscreen pass action (data-driven, no closure)
///
/// Binds a pipeline and the descriptor set of the current frame slot,
/// then draws a fullscreen triangle (3 vertices). Used to composite the
/// low-resolution offscreen image into the present pass.
pub struct FullscreenAction {
    pipeline: Arc<dyn Pipeline>,
    /// One set per frame slot
    descriptor_sets: Vec<Arc<dyn DescriptorSet>>,
    /// Binding that samples a scene target, rewritten when targets change
    sampled: Option<(u32, SampledTarget)>,
}

impl FullscreenAction {
    pub fn new(pipeline: Arc<dyn Pipeline>, descriptor_sets: Vec<Arc<dyn DescriptorSet>>) -> Self {
        Self { pipeline, descriptor_sets, sampled: None }
    }

    /// Keep `binding` of every set pointed at `target`
    pub fn sampling(mut self, binding: u32, target: SampledTarget) -> Self {
        self.sampled = Some((binding, target));
        self
    }
}

impl PassAction for FullscreenAction {
    fn execute(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()> {
        let Some(set) = self.descriptor_sets.get(frame_index) else {
            engine_bail!("lumen3d::pass_action",
                "No descriptor set for frame slot {} ({} sets)", frame_index, self.descriptor_sets.len());
        };
        cmd.bind_pipeline(&self.pipeline)?;
        cmd.bind_descriptor_set(&self.pipeline, 0, set, &[])?;
        cmd.draw(3, 0)
    }

    fn targets_recreated(&mut self, targets: &SceneTargets<'_>) -> Result<()> {
        let Some((binding, target)) = self.sampled else {
            return Ok(());
        };
        let texture = match target {
            SampledTarget::ShadowMap => targets.shadow_map,
            SampledTarget::OffscreenColor => targets.offscreen_color,
        };
        let write = DescriptorWrite {
            binding,
            resource: DescriptorResource::Texture { texture: Arc::clone(texture) },
        };
        for set in &self.descriptor_sets {
            set.update(std::slice::from_ref(&write))?;
        }
        Ok(())
    }
}

/// Custom pass action (closure-based)
///
/// Executes a user-provided closure for full control over draw command
/// recording. Used for scene geometry, shadow casters and the skybox.
pub struct CustomAction {
    callback: Box<dyn FnMut(&mut dyn CommandList, usize) -> Result<()> + Send + Sync>,
}

impl CustomAction {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut dyn CommandList, usize) -> Result<()> + Send + Sync + 'static,
    {
        Self { callback: Box::new(callback) }
    }
}

impl PassAction for CustomAction {
    fn execute(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()> {
        (self.callback)(cmd, frame_index)
    }
}
