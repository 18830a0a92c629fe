/// Unit tests for the frame orchestrator, run against the mock GPU timeline

use std::cell::RefCell;
use std::collections::VecDeque;
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::frame::{FrameContext, FrameOrchestrator, FrameRecorder, FrameState, FrameStatus, SurfaceHost};
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    AcquireOutcome, Extent2D, FenceStatus, GraphicsDevice, PresentOutcome, Swapchain,
};

const EXTENT: Extent2D = Extent2D { width: 800, height: 600 };

/// Records one draw per pass and remembers which slots it saw
#[derive(Default)]
struct TestRecorder {
    recorded_slots: Vec<usize>,
    recreated_extents: Vec<Extent2D>,
    fail_next: bool,
}

impl FrameRecorder for TestRecorder {
    fn pass_count(&self) -> usize {
        2
    }

    fn record(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        if self.fail_next {
            self.fail_next = false;
            return Err(Error::InvalidResource("broken pass".to_string()));
        }
        self.recorded_slots.push(ctx.frame_index);
        for pass in 0..ctx.pass_count() {
            ctx.command_list(pass)?.draw(3, 0)?;
        }
        Ok(())
    }

    fn on_swapchain_recreated(&mut self, _device: &mut dyn GraphicsDevice, swapchain: &dyn Swapchain) -> Result<()> {
        self.recreated_extents.push(swapchain.extent());
        Ok(())
    }
}

/// Host whose size follows a script, then stays at the last value
struct ScriptedHost {
    extents: RefCell<VecDeque<Extent2D>>,
    last: RefCell<Extent2D>,
}

impl ScriptedHost {
    fn new(extents: &[Extent2D]) -> Self {
        Self {
            extents: RefCell::new(extents.iter().copied().collect()),
            last: RefCell::new(EXTENT),
        }
    }
}

impl SurfaceHost for ScriptedHost {
    fn framebuffer_extent(&self) -> Extent2D {
        if let Some(next) = self.extents.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        *self.last.borrow()
    }
}

fn setup(frames_in_flight: usize) -> (MockGraphicsDevice, FrameOrchestrator, TestRecorder) {
    let mut device = MockGraphicsDevice::new();
    let config = RendererConfig {
        max_frames_in_flight: frames_in_flight,
        fence_timeout_ns: 1_000_000_000,
        ..RendererConfig::default()
    };
    let recorder = TestRecorder::default();
    let orchestrator = FrameOrchestrator::new(&mut device, &config, EXTENT, recorder.pass_count()).unwrap();
    (device, orchestrator, recorder)
}

// ============================================================================
// RING / THROTTLING
// ============================================================================

#[test]
fn test_creates_slot_resources() {
    let (device, orchestrator, _) = setup(3);
    assert_eq!(orchestrator.frames_in_flight(), 3);
    assert_eq!(device.frame_syncs_created, 3);
    assert_eq!(device.command_lists_created, 6);
    assert_eq!(orchestrator.state(), FrameState::Idle);
}

#[test]
fn test_ten_frames_cycle_the_ring() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);

    for _ in 0..10 {
        let status = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
        assert_eq!(status, FrameStatus::Presented { swapchain_recreated: false });
        assert_eq!(orchestrator.state(), FrameState::Idle);
    }

    assert_eq!(recorder.recorded_slots, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(orchestrator.frames_submitted(), 10);
    assert_eq!(orchestrator.current_frame(), 1);

    let state = device.gpu.state();
    assert_eq!(state.fence_waits.len(), 10);
    assert!(state.fence_waits.iter().all(|w| w.status == FenceStatus::Signaled));
    assert_eq!(state.presented, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_never_more_than_n_frames_outstanding() {
    for n in 1..=3 {
        let (mut device, mut orchestrator, mut recorder) = setup(n);
        for _ in 0..12 {
            orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
        }
        assert_eq!(device.gpu.state().max_outstanding, n);
    }
}

#[test]
fn test_one_submission_per_frame_with_passes_in_order() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();

    let state = device.gpu.state();
    assert_eq!(state.submissions.len(), 1);
    let lists = &state.submissions[0].command_lists;
    assert_eq!(lists.len(), 2);
    assert!(lists.iter().all(|cmds| cmds == &vec!["begin", "draw 3", "end"]));
}

#[test]
fn test_stalled_gpu_reports_device_hang() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    for _ in 0..3 {
        orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
    }

    device.gpu.set_stalled(true);
    let result = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder);
    assert!(matches!(result, Err(Error::DeviceHang(_))));
    assert!(!result.unwrap_err().is_retryable());
    assert_eq!(orchestrator.current_frame(), 0);
    assert_eq!(device.gpu.state().acquire_calls, 3);
}

#[test]
fn test_record_failure_is_fatal() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    recorder.fail_next = true;
    let result = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(device.gpu.state().submissions.is_empty());
    assert_eq!(orchestrator.state(), FrameState::Idle);
}

#[test]
fn test_recorder_pass_count_mismatch_rejected() {
    let mut device = MockGraphicsDevice::new();
    let mut recorder = TestRecorder::default();
    let mut orchestrator = FrameOrchestrator::new(&mut device, &RendererConfig::default(), EXTENT, 3).unwrap();

    let result = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(recorder.recorded_slots.is_empty());
    assert_eq!(device.gpu.state().acquire_calls, 0);
    assert_eq!(orchestrator.state(), FrameState::Idle);
}

// ============================================================================
// SWAPCHAIN RECREATION
// ============================================================================

#[test]
fn test_out_of_date_acquire_rebuilds_without_advancing() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();

    let resized = Extent2D::new(1024, 768);
    device.gpu.script_acquire(AcquireOutcome::OutOfDate);
    let status = orchestrator.draw_frame(&mut device, &resized, &mut recorder).unwrap();

    assert_eq!(status, FrameStatus::SwapchainRecreated);
    assert_eq!(orchestrator.current_frame(), 1);
    assert_eq!(orchestrator.frames_submitted(), 1);
    assert_eq!(orchestrator.swapchain().extent(), resized);
    assert_eq!(recorder.recreated_extents, vec![resized]);
    assert_eq!(device.gpu.state().wait_idle_calls, 1);

    // the same slot renders the next frame, its fence still signaled
    let status = orchestrator.draw_frame(&mut device, &resized, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Presented { swapchain_recreated: false });
    assert_eq!(recorder.recorded_slots, vec![0, 1]);
    assert!(device.gpu.state().fence_waits.iter().all(|w| w.status == FenceStatus::Signaled));
}

#[test]
fn test_out_of_date_present_rebuilds_after_submit() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    device.gpu.script_present(PresentOutcome::OutOfDate);

    let status = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Presented { swapchain_recreated: true });
    assert_eq!(orchestrator.current_frame(), 1);
    assert_eq!(device.gpu.state().swapchain_recreates, 1);
    assert_eq!(recorder.recreated_extents.len(), 1);
}

#[test]
fn test_suboptimal_acquire_rebuilds_after_present() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    device.gpu.script_acquire(AcquireOutcome::Acquired { image_index: 0, suboptimal: true });

    let status = orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Presented { swapchain_recreated: true });
    assert_eq!(device.gpu.state().presented, vec![0]);
}

#[test]
fn test_resize_storm_keeps_running() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    for i in 0..6u32 {
        device.gpu.script_acquire(AcquireOutcome::OutOfDate);
        let extent = Extent2D::new(640 + i * 10, 480);
        let status = orchestrator.draw_frame(&mut device, &extent, &mut recorder).unwrap();
        assert_eq!(status, FrameStatus::SwapchainRecreated);
        let status = orchestrator.draw_frame(&mut device, &extent, &mut recorder).unwrap();
        assert!(matches!(status, FrameStatus::Presented { .. }));
    }
    assert_eq!(recorder.recreated_extents.len(), 6);
    assert!(device.gpu.state().max_outstanding <= 3);
}

// ============================================================================
// MINIMISED WINDOW
// ============================================================================

#[test]
fn test_zero_extent_suspends_frame() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    let minimised = Extent2D::new(0, 0);

    let status = orchestrator.draw_frame(&mut device, &minimised, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Suspended);
    assert_eq!(orchestrator.current_frame(), 0);

    let state = device.gpu.state();
    assert!(state.fence_waits.is_empty());
    assert_eq!(state.acquire_calls, 0);
}

#[test]
fn test_recreation_deferred_while_minimised() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    device.gpu.script_present(PresentOutcome::OutOfDate);

    // full size when the frame starts, minimised by the time it presents
    let host = ScriptedHost::new(&[EXTENT, Extent2D::new(0, 0), Extent2D::new(0, 0)]);
    let status = orchestrator.draw_frame(&mut device, &host, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Presented { swapchain_recreated: false });
    assert!(orchestrator.is_recreate_pending());

    assert_eq!(orchestrator.draw_frame(&mut device, &host, &mut recorder).unwrap(), FrameStatus::Suspended);
    assert!(recorder.recreated_extents.is_empty());

    let restored = ScriptedHost::new(&[Extent2D::new(1280, 720)]);
    let status = orchestrator.draw_frame(&mut device, &restored, &mut recorder).unwrap();
    assert_eq!(status, FrameStatus::Presented { swapchain_recreated: false });
    assert!(!orchestrator.is_recreate_pending());
    assert_eq!(recorder.recreated_extents, vec![Extent2D::new(1280, 720)]);
}

#[test]
fn test_shutdown_waits_for_gpu() {
    let (mut device, mut orchestrator, mut recorder) = setup(3);
    orchestrator.draw_frame(&mut device, &EXTENT, &mut recorder).unwrap();
    orchestrator.shutdown(&mut device).unwrap();
    assert_eq!(device.gpu.outstanding(), 0);
}

#[test]
fn test_zero_passes_rejected() {
    let mut device = MockGraphicsDevice::new();
    let result = FrameOrchestrator::new(&mut device, &RendererConfig::default(), EXTENT, 0);
    assert!(result.is_err());
}
