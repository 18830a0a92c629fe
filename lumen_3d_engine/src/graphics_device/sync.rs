/// Pipeline stages, access masks and subpass dependencies
///
/// Backend-neutral mirror of the GPU synchronization vocabulary. The Vulkan
/// backend translates these one-to-one.

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::ImageLayout;

bitflags! {
    /// Pipeline stages a dependency or barrier waits on / blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE             = 1 << 0;
        const VERTEX_SHADER           = 1 << 1;
        const EARLY_FRAGMENT_TESTS    = 1 << 2;
        const FRAGMENT_SHADER         = 1 << 3;
        const LATE_FRAGMENT_TESTS     = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const TRANSFER                = 1 << 6;
        const BOTTOM_OF_PIPE          = 1 << 7;
    }
}

bitflags! {
    /// Memory accesses made visible / available by a dependency or barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ                    = 1 << 0;
        const COLOR_ATTACHMENT_READ          = 1 << 1;
        const COLOR_ATTACHMENT_WRITE         = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 4;
        const TRANSFER_READ                  = 1 << 5;
        const TRANSFER_WRITE                 = 1 << 6;
        const INPUT_ATTACHMENT_READ          = 1 << 7;
    }
}

/// Subpass index designating work outside the render pass
pub const SUBPASS_EXTERNAL: u32 = u32::MAX;

/// Execution + memory dependency between two subpasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub by_region: bool,
}

impl SubpassDependency {
    /// EXTERNAL -> 0: prior GPU work on the attachments (previous frame's
    /// present, an earlier pass writing the same image) completes before
    /// this pass writes color or depth.
    pub fn external_to_first() -> Self {
        Self {
            src_subpass: SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                | PipelineStages::LATE_FRAGMENT_TESTS,
            dst_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                | PipelineStages::EARLY_FRAGMENT_TESTS,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: AccessFlags::COLOR_ATTACHMENT_READ
                | AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            by_region: false,
        }
    }

    /// `src` -> `src + 1`: attachment outputs of one subpass before the next
    /// subpass tests depth, writes color or reads them as input attachments.
    pub fn chained(src: u32) -> Self {
        Self {
            src_subpass: src,
            dst_subpass: src + 1,
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                | PipelineStages::LATE_FRAGMENT_TESTS,
            dst_stages: PipelineStages::EARLY_FRAGMENT_TESTS
                | PipelineStages::FRAGMENT_SHADER
                | PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::COLOR_ATTACHMENT_READ
                | AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::INPUT_ATTACHMENT_READ,
            by_region: true,
        }
    }

    /// `last` -> EXTERNAL: depth/color writes visible to fragment shaders of
    /// the pass that samples this pass's output.
    pub fn to_sampling_pass(last: u32) -> Self {
        Self {
            src_subpass: last,
            dst_subpass: SUBPASS_EXTERNAL,
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                | PipelineStages::LATE_FRAGMENT_TESTS,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: AccessFlags::SHADER_READ,
            by_region: false,
        }
    }
}

/// Stages and accesses that use an image while it sits in `layout`
///
/// Barriers leaving a layout wait on these; barriers entering it block them.
pub fn layout_usage(layout: ImageLayout) -> (PipelineStages, AccessFlags) {
    match layout {
        ImageLayout::Undefined => (PipelineStages::TOP_OF_PIPE, AccessFlags::empty()),
        ImageLayout::ColorAttachment => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        ImageLayout::DepthStencilAttachment => (
            PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        ImageLayout::DepthStencilReadOnly => (
            PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::FRAGMENT_SHADER,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::SHADER_READ,
        ),
        ImageLayout::ShaderReadOnly => (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
        ImageLayout::TransferSrc => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ),
        ImageLayout::TransferDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
        ImageLayout::PresentSrc => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
    }
}

/// Result of waiting on an in-flight fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    TimedOut,
}

/// Synchronization primitives of one frame-in-flight slot
///
/// Holds the "image available" and "render finished" semaphores and the
/// in-flight fence. The fence is created signaled so the first wait on a
/// fresh slot returns immediately.
pub trait FrameSync: Send + Sync {
    /// Block until the slot's previous submission completed or `timeout_ns` elapsed
    fn wait(&self, timeout_ns: u64) -> Result<FenceStatus>;

    /// Return the fence to the unsignaled state
    fn reset(&self) -> Result<()>;

    /// Non-blocking fence query
    fn is_signaled(&self) -> Result<bool>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
