/// SamplerCache - VkSampler objects shared between textures
///
/// Samplers are created on first use for a given `SamplerDesc` and live as
/// long as the `GpuContext`; a scene only ever needs a handful of them.

use ash::vk;
use rustc_hash::FxHashMap;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{AddressMode, BorderColor, CompareOp, Filter, SamplerDesc};
use lumen_3d_engine::{engine_debug, engine_err};

use crate::vulkan_format::{
    address_mode_to_vk, border_color_to_vk, compare_op_to_vk, filter_to_vk, mipmap_mode_to_vk,
};

/// Hashable form of a `SamplerDesc` (floats stored by bit pattern)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SamplerKey {
    mag_filter: Filter,
    min_filter: Filter,
    mipmap_filter: Filter,
    address_mode: AddressMode,
    border_color: BorderColor,
    max_anisotropy: Option<u32>,
    compare: Option<CompareOp>,
    max_lod: u32,
}

impl From<&SamplerDesc> for SamplerKey {
    fn from(desc: &SamplerDesc) -> Self {
        Self {
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            mipmap_filter: desc.mipmap_filter,
            address_mode: desc.address_mode,
            border_color: desc.border_color,
            max_anisotropy: desc.max_anisotropy.map(f32::to_bits),
            compare: desc.compare,
            max_lod: desc.max_lod.to_bits(),
        }
    }
}

pub(crate) struct SamplerCache {
    cache: FxHashMap<SamplerKey, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new() -> Self {
        Self { cache: FxHashMap::default() }
    }

    /// Sampler matching `desc`, created on first request
    pub(crate) fn get_or_create(&mut self, device: &ash::Device, desc: &SamplerDesc) -> Result<vk::Sampler> {
        let key = SamplerKey::from(desc);
        if let Some(&sampler) = self.cache.get(&key) {
            return Ok(sampler);
        }

        let sampler = create_vk_sampler(device, desc)?;
        self.cache.insert(key, sampler);
        engine_debug!("lumen3d::vulkan", "Created sampler #{} ({:?})", self.cache.len(), key);
        Ok(sampler)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Destroy every cached sampler; the device must still be alive
    pub(crate) fn destroy_all(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            unsafe { device.destroy_sampler(sampler, None); }
        }
    }
}

fn create_vk_sampler(device: &ash::Device, desc: &SamplerDesc) -> Result<vk::Sampler> {
    let address = address_mode_to_vk(desc.address_mode);

    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_filter))
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(desc.max_lod)
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(false);

    create_info = match desc.compare {
        Some(op) => create_info.compare_enable(true).compare_op(compare_op_to_vk(op)),
        None => create_info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
    };

    create_info = match desc.max_anisotropy {
        Some(level) => create_info.anisotropy_enable(true).max_anisotropy(level),
        None => create_info.anisotropy_enable(false).max_anisotropy(1.0),
    };

    unsafe {
        device.create_sampler(&create_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create sampler: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> SamplerDesc {
        SamplerDesc {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_filter: Filter::Linear,
            address_mode: AddressMode::Repeat,
            border_color: BorderColor::OpaqueBlack,
            max_anisotropy: Some(16.0),
            compare: None,
            max_lod: 10.0,
        }
    }

    #[test]
    fn test_identical_descs_share_a_key() {
        assert_eq!(SamplerKey::from(&linear()), SamplerKey::from(&linear()));
    }

    #[test]
    fn test_max_lod_distinguishes_keys() {
        let mut other = linear();
        other.max_lod = 4.0;
        assert_ne!(SamplerKey::from(&linear()), SamplerKey::from(&other));
    }

    #[test]
    fn test_comparison_distinguishes_keys() {
        let mut shadow = linear();
        shadow.compare = Some(CompareOp::LessOrEqual);
        assert_ne!(SamplerKey::from(&linear()), SamplerKey::from(&shadow));
    }

    #[test]
    fn test_new_cache_is_empty() {
        assert_eq!(SamplerCache::new().len(), 0);
    }
}
