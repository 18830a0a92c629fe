/// Unit tests for MockGraphicsDevice and the simulated GPU timeline.
///
/// The frame orchestrator tests rely on these behaviours, so they are
/// pinned down here first.

use crate::config::PresentMode;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    AcquireOutcome, Buffer, BufferDesc, BufferUsage, CommandList, Extent2D, FenceStatus, FrameSync,
    GraphicsDevice, PresentOutcome, Swapchain,
};

fn recorded_list(device: &mut MockGraphicsDevice) -> Box<dyn CommandList> {
    let mut list = device.create_command_list().unwrap();
    list.begin().unwrap();
    list.draw(3, 0).unwrap();
    list.end().unwrap();
    list
}

// ============================================================================
// MockBuffer Tests
// ============================================================================

#[test]
fn test_mock_buffer_creation() {
    let mut device = MockGraphicsDevice::new();
    let buffer = device
        .create_buffer(BufferDesc { size: 64, usage: BufferUsage::Uniform })
        .unwrap();
    assert_eq!(buffer.size(), 64);
    assert_eq!(buffer.usage(), BufferUsage::Uniform);
}

#[test]
fn test_mock_buffer_update_writes_bytes() {
    let buffer = MockBuffer::new(8, BufferUsage::Vertex, "vb".to_string());
    buffer.update(2, &[7, 8]).unwrap();
    assert_eq!(buffer.contents(), vec![0, 0, 7, 8, 0, 0, 0, 0]);
    assert!(buffer.update(7, &[1, 2]).is_err());
}

// ============================================================================
// FrameSync / GPU timeline Tests
// ============================================================================

#[test]
fn test_frame_sync_starts_signaled() {
    let gpu = MockGpu::new();
    let sync = MockFrameSync::new(gpu);
    assert!(sync.is_signaled().unwrap());
    assert_eq!(sync.wait(0).unwrap(), FenceStatus::Signaled);
}

#[test]
fn test_submission_stays_outstanding_until_waited() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);

    sync.reset().unwrap();
    device.submit_frame(&[list.as_ref()], sync.as_ref()).unwrap();
    assert_eq!(device.gpu.outstanding(), 1);
    assert!(!sync.is_signaled().unwrap());

    assert_eq!(sync.wait(u64::MAX).unwrap(), FenceStatus::Signaled);
    assert_eq!(device.gpu.outstanding(), 0);
}

#[test]
fn test_gpu_completes_in_submission_order() {
    let mut device = MockGraphicsDevice::new();
    let first = device.create_frame_sync().unwrap();
    let second = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);

    first.reset().unwrap();
    device.submit_frame(&[list.as_ref()], first.as_ref()).unwrap();
    second.reset().unwrap();
    device.submit_frame(&[list.as_ref()], second.as_ref()).unwrap();
    assert_eq!(device.gpu.state().max_outstanding, 2);

    second.wait(u64::MAX).unwrap();
    assert!(first.is_signaled().unwrap());
}

#[test]
fn test_submit_with_signaled_fence_fails() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);
    let result = device.submit_frame(&[list.as_ref()], sync.as_ref());
    assert!(matches!(result, Err(Error::BackendError(_))));
}

#[test]
fn test_reset_while_in_use_fails() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);
    sync.reset().unwrap();
    device.submit_frame(&[list.as_ref()], sync.as_ref()).unwrap();
    assert!(sync.reset().is_err());
}

#[test]
fn test_stalled_gpu_times_out() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);
    sync.reset().unwrap();
    device.submit_frame(&[list.as_ref()], sync.as_ref()).unwrap();

    device.gpu.set_stalled(true);
    assert_eq!(sync.wait(1_000).unwrap(), FenceStatus::TimedOut);

    let waits = device.gpu.state().fence_waits.clone();
    assert_eq!(waits.last().unwrap().status, FenceStatus::TimedOut);
}

#[test]
fn test_submitting_open_list_fails() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let mut list = device.create_command_list().unwrap();
    list.begin().unwrap();
    sync.reset().unwrap();
    assert!(device.submit_frame(&[list.as_ref()], sync.as_ref()).is_err());
}

#[test]
fn test_wait_idle_completes_everything() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);
    sync.reset().unwrap();
    device.submit_frame(&[list.as_ref()], sync.as_ref()).unwrap();

    device.wait_idle().unwrap();
    assert_eq!(device.gpu.outstanding(), 0);
    assert_eq!(device.gpu.state().wait_idle_calls, 1);
}

#[test]
fn test_submission_records_commands() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let list = recorded_list(&mut device);
    sync.reset().unwrap();
    device.submit_frame(&[list.as_ref()], sync.as_ref()).unwrap();

    let state = device.gpu.state();
    assert_eq!(state.submissions.len(), 1);
    assert_eq!(state.submissions[0].command_lists[0], vec!["begin", "draw 3", "end"]);
}

// ============================================================================
// MockSwapchain Tests
// ============================================================================

#[test]
fn test_swapchain_rotates_images() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let mut swapchain = device
        .create_swapchain(Extent2D::new(800, 600), PresentMode::Fifo)
        .unwrap();

    let indices: Vec<u32> = (0..4)
        .map(|_| match swapchain.acquire_next_image(sync.as_ref()).unwrap() {
            AcquireOutcome::Acquired { image_index, .. } => image_index,
            AcquireOutcome::OutOfDate => panic!("unexpected out of date"),
        })
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 0]);
}

#[test]
fn test_swapchain_scripted_outcomes() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let mut swapchain = device
        .create_swapchain(Extent2D::new(800, 600), PresentMode::Fifo)
        .unwrap();

    device.gpu.script_acquire(AcquireOutcome::OutOfDate);
    device.gpu.script_present(PresentOutcome::Suboptimal);

    assert_eq!(swapchain.acquire_next_image(sync.as_ref()).unwrap(), AcquireOutcome::OutOfDate);
    assert!(matches!(
        swapchain.acquire_next_image(sync.as_ref()).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, suboptimal: false }
    ));
    assert_eq!(swapchain.present(0, sync.as_ref()).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(swapchain.present(1, sync.as_ref()).unwrap(), PresentOutcome::Presented);
    assert_eq!(device.gpu.state().presented, vec![0, 1]);
}

#[test]
fn test_swapchain_recreate_resets_rotation() {
    let mut device = MockGraphicsDevice::new();
    let sync = device.create_frame_sync().unwrap();
    let mut swapchain = device
        .create_swapchain(Extent2D::new(800, 600), PresentMode::Fifo)
        .unwrap();
    swapchain.acquire_next_image(sync.as_ref()).unwrap();

    swapchain.recreate(Extent2D::new(1024, 768)).unwrap();
    assert_eq!(swapchain.extent(), Extent2D::new(1024, 768));
    assert_eq!(device.gpu.state().swapchain_recreates, 1);
    assert!(matches!(
        swapchain.acquire_next_image(sync.as_ref()).unwrap(),
        AcquireOutcome::Acquired { image_index: 0, .. }
    ));
}

// ============================================================================
// MockCommandList Tests
// ============================================================================

#[test]
fn test_begin_clears_previous_recording() {
    let mut list = MockCommandList::new();
    list.begin().unwrap();
    list.draw(6, 0).unwrap();
    list.end().unwrap();

    list.begin().unwrap();
    assert_eq!(list.commands, vec!["begin"]);
    assert!(list.recording);
}
