/// Mip chain generation plan
///
/// Backends record exactly these steps after the base level has been copied
/// in (every level is in TransferDst at that point).

use crate::graphics_device::{full_mip_chain_len, AccessFlags, ImageLayout, PipelineStages};

/// Barrier on a single mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipBarrier {
    pub level: u32,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
}

impl MipBarrier {
    fn to_blit_source(level: u32) -> Self {
        Self {
            level,
            old_layout: ImageLayout::TransferDst,
            new_layout: ImageLayout::TransferSrc,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::TRANSFER_READ,
            src_stages: PipelineStages::TRANSFER,
            dst_stages: PipelineStages::TRANSFER,
        }
    }

    fn blit_source_to_shader(level: u32) -> Self {
        Self {
            level,
            old_layout: ImageLayout::TransferSrc,
            new_layout: ImageLayout::ShaderReadOnly,
            src_access: AccessFlags::TRANSFER_READ,
            dst_access: AccessFlags::SHADER_READ,
            src_stages: PipelineStages::TRANSFER,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
        }
    }

    fn last_level_to_shader(level: u32) -> Self {
        Self {
            level,
            old_layout: ImageLayout::TransferDst,
            new_layout: ImageLayout::ShaderReadOnly,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::SHADER_READ,
            src_stages: PipelineStages::TRANSFER,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
        }
    }
}

/// Blit from `src_level` to `src_level + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipBlit {
    pub src_level: u32,
    pub dst_level: u32,
    pub src_size: (u32, u32),
    pub dst_size: (u32, u32),
}

/// Work producing level `blit.dst_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipStep {
    pub before: MipBarrier,
    pub blit: MipBlit,
    pub after: MipBarrier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipChainPlan {
    pub level_count: u32,
    pub steps: Vec<MipStep>,
    /// Last level goes straight from TransferDst: nothing blits from it
    pub final_barrier: MipBarrier,
}

/// Plan the blit cascade for a `width` x `height` base level
pub fn plan_mip_chain(width: u32, height: u32) -> MipChainPlan {
    let level_count = full_mip_chain_len(width, height);
    let mut steps = Vec::with_capacity(level_count.saturating_sub(1) as usize);

    let (mut w, mut h) = (width.max(1), height.max(1));
    for level in 1..level_count {
        let next = ((w / 2).max(1), (h / 2).max(1));
        steps.push(MipStep {
            before: MipBarrier::to_blit_source(level - 1),
            blit: MipBlit {
                src_level: level - 1,
                dst_level: level,
                src_size: (w, h),
                dst_size: next,
            },
            after: MipBarrier::blit_source_to_shader(level - 1),
        });
        (w, h) = next;
    }

    MipChainPlan {
        level_count,
        steps,
        final_barrier: MipBarrier::last_level_to_shader(level_count - 1),
    }
}

#[cfg(test)]
#[path = "mipmap_tests.rs"]
mod tests;
