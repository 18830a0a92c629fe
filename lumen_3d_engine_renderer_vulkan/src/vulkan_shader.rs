/// VulkanShader - shader module plus what SPIR-V reflection found in it

use ash::vk;
use spirq::spirv::ExecutionModel;
use std::any::Any;
use std::sync::Arc;
use lumen_3d_engine::lumen3d::Result;
use lumen_3d_engine::lumen3d::render::{Shader, ShaderDesc, ShaderStage};
use lumen_3d_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

/// Descriptor binding used by the entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
}

pub struct VulkanShader {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: ShaderStage,
    entry_point: String,
    pub(crate) bindings: Vec<ReflectedBinding>,
    /// Size of the push constant block, if the entry point declares one
    pub(crate) push_constant_size: Option<u32>,
}

fn execution_model(stage: ShaderStage) -> ExecutionModel {
    match stage {
        ShaderStage::Vertex => ExecutionModel::Vertex,
        ShaderStage::Fragment => ExecutionModel::Fragment,
    }
}

/// Bindings and push constant size of `entry_point` for `stage`
///
/// The entry point must exist with the matching execution model.
fn reflect(code: &[u32], stage: ShaderStage, entry_point: &str) -> Result<(Vec<ReflectedBinding>, Option<u32>)> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("lumen3d::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let model = execution_model(stage);
    let Some(entry) = entry_points.iter().find(|e| e.name == entry_point && e.exec_model == model) else {
        let found: Vec<String> = entry_points.iter()
            .map(|e| format!("{}({:?})", e.name, e.exec_model))
            .collect();
        engine_bail!("lumen3d::vulkan",
            "{:?} entry point '{}' not found in module (has: {})", stage, entry_point, found.join(", "));
    };

    let mut bindings = Vec::new();
    let mut push_constant_size = None;
    for var in entry.vars.iter() {
        match var {
            spirq::var::Variable::Descriptor { desc_bind, .. } => {
                bindings.push(ReflectedBinding { set: desc_bind.set(), binding: desc_bind.bind() });
            }
            spirq::var::Variable::PushConstant { ty, .. } => {
                push_constant_size = ty.nbyte().map(|size| size as u32);
            }
            _ => {}
        }
    }
    Ok((bindings, push_constant_size))
}

impl VulkanShader {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: ShaderDesc) -> Result<Self> {
        if desc.code.is_empty() {
            engine_bail!("lumen3d::vulkan", "{:?} shader has no SPIR-V code", desc.stage);
        }
        let (bindings, push_constant_size) = reflect(&desc.code, desc.stage, &desc.entry_point)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&desc.code);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create shader module: {:?}", e))?
        };

        Ok(Self {
            ctx,
            module,
            stage: desc.stage,
            entry_point: desc.entry_point,
            bindings,
            push_constant_size,
        })
    }

    pub(crate) fn stage_flags(&self) -> vk::ShaderStageFlags {
        shader_stage_to_vk(self.stage)
    }
}

impl Shader for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_shader_module(self.module, None); }
    }
}
