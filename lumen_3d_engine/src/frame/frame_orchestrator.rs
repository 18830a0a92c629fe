/// Frame orchestrator - paces CPU recording against GPU execution
///
/// A ring of frame slots, each owning its synchronization objects and one
/// command list per pass. A slot is reused only after the fence of its
/// previous submission signaled, so at most `frames_in_flight` frames are
/// ever queued on the GPU and per-slot resources are never overwritten
/// while in use.
///
/// Per frame:
///
/// ```text
/// Idle -> WaitFence -> AcquireImage -> Recording -> Submitted -> Presented -> Idle
///                           |
///                           +-- OutOfDate: rebuild swapchain state, slot unchanged
/// ```

use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::frame::SurfaceHost;
use crate::graphics_device::{
    AcquireOutcome, CommandList, Extent2D, FenceStatus, FrameSync, GraphicsDevice, PresentOutcome,
    Swapchain,
};
use crate::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};

/// Where the orchestrator is inside `draw_frame`
///
/// Observable between calls; a completed or abandoned frame leaves it
/// at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    WaitFence,
    AcquireImage,
    Recording,
    Submitted,
    Presented,
}

/// Outcome of one `draw_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented; `swapchain_recreated` is set
    /// when presentation reported a stale swapchain and it was rebuilt
    Presented { swapchain_recreated: bool },
    /// Acquisition found the swapchain out of date; it was rebuilt and no
    /// frame was rendered
    SwapchainRecreated,
    /// The surface has zero extent (minimised); nothing was done
    Suspended,
}

/// Records the passes of one frame
///
/// Implemented by the pass graph (`ScenePasses`) or by an application
/// with its own pass layout.
pub trait FrameRecorder {
    /// Number of command lists recorded per frame, one per pass, in
    /// submission order
    fn pass_count(&self) -> usize;

    /// Record every pass into the command lists of `ctx`
    ///
    /// Lists are already begun; the orchestrator ends and submits them.
    fn record(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;

    /// Rebuild swapchain-dependent state (framebuffers, size-dependent
    /// targets). Render passes and pipelines stay valid.
    fn on_swapchain_recreated(
        &mut self,
        device: &mut dyn GraphicsDevice,
        swapchain: &dyn Swapchain,
    ) -> Result<()>;
}

/// Per-frame recording context handed to `FrameRecorder::record`
pub struct FrameContext<'a> {
    /// Frame slot being recorded; index per-frame resources with it
    pub frame_index: usize,
    /// Swapchain image this frame presents
    pub image_index: u32,
    /// Swapchain extent
    pub extent: Extent2D,
    command_lists: &'a mut [Box<dyn CommandList>],
}

impl<'a> FrameContext<'a> {
    pub fn new(
        frame_index: usize,
        image_index: u32,
        extent: Extent2D,
        command_lists: &'a mut [Box<dyn CommandList>],
    ) -> Self {
        Self { frame_index, image_index, extent, command_lists }
    }

    /// Command list of pass `pass`
    pub fn command_list(&mut self, pass: usize) -> Result<&mut dyn CommandList> {
        let count = self.command_lists.len();
        match self.command_lists.get_mut(pass) {
            Some(list) => Ok(list.as_mut()),
            None => {
                engine_bail!("lumen3d::frame", "Pass {} out of range ({} command lists)", pass, count);
            }
        }
    }

    pub fn pass_count(&self) -> usize {
        self.command_lists.len()
    }
}

/// Resources exclusively owned by one ring slot
struct FrameSlot {
    sync: Box<dyn FrameSync>,
    command_lists: Vec<Box<dyn CommandList>>,
}

pub struct FrameOrchestrator {
    slots: Vec<FrameSlot>,
    current: usize,
    state: FrameState,
    swapchain: Box<dyn Swapchain>,
    fence_timeout_ns: u64,
    /// Presentation asked for a rebuild that could not happen yet
    recreate_pending: bool,
    frames_submitted: u64,
}

impl FrameOrchestrator {
    /// Create the swapchain and `config.max_frames_in_flight` slots with
    /// `pass_count` command lists each
    pub fn new(
        device: &mut dyn GraphicsDevice,
        config: &RendererConfig,
        extent: Extent2D,
        pass_count: usize,
    ) -> Result<Self> {
        config.validate()?;
        if pass_count == 0 {
            engine_bail!("lumen3d::frame", "A frame needs at least one pass");
        }

        let swapchain = device.create_swapchain(extent, config.present_mode)?;

        let mut slots = Vec::with_capacity(config.max_frames_in_flight);
        for _ in 0..config.max_frames_in_flight {
            let sync = device.create_frame_sync()?;
            let command_lists = (0..pass_count)
                .map(|_| device.create_command_list())
                .collect::<Result<Vec<_>>>()?;
            slots.push(FrameSlot { sync, command_lists });
        }

        engine_info!("lumen3d::frame",
            "Frame orchestrator ready: {} frames in flight, {} passes, {} swapchain images",
            slots.len(), pass_count, swapchain.image_count());

        Ok(Self {
            slots,
            current: 0,
            state: FrameState::Idle,
            swapchain,
            fence_timeout_ns: config.fence_timeout_ns,
            recreate_pending: false,
            frames_submitted: 0,
        })
    }

    /// Render and present one frame
    ///
    /// Retryable conditions (stale swapchain, minimised window) are handled
    /// here and reported through `FrameStatus`; every returned error is
    /// fatal for the run.
    pub fn draw_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        host: &dyn SurfaceHost,
        recorder: &mut dyn FrameRecorder,
    ) -> Result<FrameStatus> {
        let expected = self.slots[self.current].command_lists.len();
        if recorder.pass_count() != expected {
            engine_bail!("lumen3d::frame",
                "Recorder declares {} passes but the orchestrator was built for {}",
                recorder.pass_count(), expected);
        }

        let result = self.advance_frame(device, host, recorder);
        if result.is_err() {
            self.state = FrameState::Idle;
        }
        result
    }

    fn advance_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        host: &dyn SurfaceHost,
        recorder: &mut dyn FrameRecorder,
    ) -> Result<FrameStatus> {
        let extent = host.framebuffer_extent();
        if extent.is_zero() {
            return Ok(FrameStatus::Suspended);
        }
        if self.recreate_pending {
            self.rebuild(device, recorder, extent)?;
        }

        let index = self.current;

        // WaitFence
        self.state = FrameState::WaitFence;
        match self.slots[index].sync.wait(self.fence_timeout_ns)? {
            FenceStatus::Signaled => {}
            FenceStatus::TimedOut => {
                let message = format!(
                    "Frame slot {} fence not signaled after {} ns", index, self.fence_timeout_ns);
                engine_error!("lumen3d::frame", "{}", message);
                return Err(Error::DeviceHang(message));
            }
        }

        // AcquireImage
        self.state = FrameState::AcquireImage;
        let (image_index, suboptimal) =
            match self.swapchain.acquire_next_image(self.slots[index].sync.as_ref()) {
                Ok(AcquireOutcome::Acquired { image_index, suboptimal }) => (image_index, suboptimal),
                Ok(AcquireOutcome::OutOfDate) | Err(Error::SwapchainOutOfDate) => {
                    engine_debug!("lumen3d::frame", "Swapchain out of date at acquire");
                    self.rebuild(device, recorder, extent)?;
                    self.state = FrameState::Idle;
                    return Ok(FrameStatus::SwapchainRecreated);
                }
                Err(e) => return Err(e),
            };

        // the fence is reset only once a submission is certain to follow
        let slot = &mut self.slots[index];
        slot.sync.reset()?;

        // Recording
        self.state = FrameState::Recording;
        for list in slot.command_lists.iter_mut() {
            list.begin()?;
        }
        {
            let mut ctx = FrameContext::new(index, image_index, self.swapchain.extent(), &mut slot.command_lists);
            recorder.record(&mut ctx)?;
        }
        for list in slot.command_lists.iter_mut() {
            list.end()?;
        }

        // Submitted
        let lists: Vec<&dyn CommandList> = slot.command_lists.iter().map(|l| l.as_ref()).collect();
        device.submit_frame(&lists, slot.sync.as_ref())?;
        self.state = FrameState::Submitted;
        self.frames_submitted += 1;
        self.current = (self.current + 1) % self.slots.len();

        // Presented
        let outcome = match self.swapchain.present(image_index, self.slots[index].sync.as_ref()) {
            Ok(outcome) => outcome,
            Err(Error::SwapchainOutOfDate) => PresentOutcome::OutOfDate,
            Err(e) => return Err(e),
        };
        self.state = FrameState::Presented;

        let mut swapchain_recreated = false;
        if outcome.needs_recreate() || suboptimal {
            let extent = host.framebuffer_extent();
            if extent.is_zero() {
                self.recreate_pending = true;
            } else {
                self.rebuild(device, recorder, extent)?;
                swapchain_recreated = true;
            }
        }

        self.state = FrameState::Idle;
        Ok(FrameStatus::Presented { swapchain_recreated })
    }

    /// Rebuild the swapchain and everything sized after it
    fn rebuild(
        &mut self,
        device: &mut dyn GraphicsDevice,
        recorder: &mut dyn FrameRecorder,
        extent: Extent2D,
    ) -> Result<()> {
        engine_debug!("lumen3d::frame", "Recreating swapchain at {}x{}", extent.width, extent.height);
        device.wait_idle()?;
        self.swapchain.recreate(extent)?;
        recorder.on_swapchain_recreated(device, self.swapchain.as_ref())?;
        self.recreate_pending = false;
        Ok(())
    }

    /// Wait for all submitted work; call before dropping GPU resources
    pub fn shutdown(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if let Err(e) = device.wait_idle() {
            engine_warn!("lumen3d::frame", "wait_idle failed during shutdown: {}", e);
            return Err(e);
        }
        self.state = FrameState::Idle;
        Ok(())
    }

    /// Ring index of the next frame
    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn is_recreate_pending(&self) -> bool {
        self.recreate_pending
    }
}

#[cfg(test)]
#[path = "frame_orchestrator_tests.rs"]
mod tests;
