/// Per-frame uniform buffers
///
/// Anything the CPU rewrites every frame is duplicated once per frame slot:
/// slot `i` is written only right after its fence was waited on, so the GPU
/// never reads a buffer the CPU is writing. Constant data uses a single
/// shared buffer instead.

use std::marker::PhantomData;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use crate::error::Result;
use crate::graphics_device::{dynamic_stride, Buffer, BufferDesc, BufferUsage, GraphicsDevice};
use crate::engine_bail;

/// Camera and light data shared by every draw of a frame
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Light space transform used to sample the shadow map
    pub light_view_projection: Mat4,
    /// xyz = world position, w unused
    pub camera_position: Vec4,
    /// xyz = direction towards the light, w = intensity
    pub light_direction: Vec4,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            light_view_projection: Mat4::IDENTITY,
            camera_position: Vec4::ZERO,
            light_direction: Vec4::new(0.0, 1.0, 0.0, 1.0),
        }
    }
}

/// Per-object transform, stored in a dynamic uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl ObjectUniforms {
    pub fn from_model(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

fn slot_buffer<'a>(buffers: &'a [Arc<dyn Buffer>], frame_index: usize) -> Result<&'a Arc<dyn Buffer>> {
    match buffers.get(frame_index) {
        Some(buffer) => Ok(buffer),
        None => {
            engine_bail!("lumen3d::uniforms",
                "Frame slot {} out of range ({} slots)", frame_index, buffers.len());
        }
    }
}

/// One uniform buffer of `T` per frame slot
pub struct PerFrameUniforms<T: Pod> {
    buffers: Vec<Arc<dyn Buffer>>,
    _marker: PhantomData<T>,
}

impl<T: Pod> PerFrameUniforms<T> {
    pub fn new(device: &mut dyn GraphicsDevice, frames_in_flight: usize) -> Result<Self> {
        let size = std::mem::size_of::<T>() as u64;
        let buffers = (0..frames_in_flight)
            .map(|_| device.create_buffer(BufferDesc { size, usage: BufferUsage::Uniform }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { buffers, _marker: PhantomData })
    }

    /// Write the uniforms of slot `frame_index`
    pub fn write(&self, frame_index: usize, value: &T) -> Result<()> {
        slot_buffer(&self.buffers, frame_index)?.update(0, bytemuck::bytes_of(value))
    }

    pub fn buffer(&self, frame_index: usize) -> Result<&Arc<dyn Buffer>> {
        slot_buffer(&self.buffers, frame_index)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// `capacity` elements of `T` per frame slot, each at an aligned stride,
/// addressed with dynamic offsets
pub struct DynamicUniforms<T: Pod> {
    buffers: Vec<Arc<dyn Buffer>>,
    stride: u64,
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T: Pod> DynamicUniforms<T> {
    pub fn new(device: &mut dyn GraphicsDevice, frames_in_flight: usize, capacity: u32) -> Result<Self> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let stride = dynamic_stride(std::mem::size_of::<T>() as u64, alignment);
        let size = stride * capacity.max(1) as u64;
        let buffers = (0..frames_in_flight)
            .map(|_| device.create_buffer(BufferDesc { size, usage: BufferUsage::Uniform }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { buffers, stride, capacity, _marker: PhantomData })
    }

    /// Write element `index` of slot `frame_index`
    pub fn write(&self, frame_index: usize, index: u32, value: &T) -> Result<()> {
        if index >= self.capacity {
            engine_bail!("lumen3d::uniforms",
                "Object {} out of range (capacity {})", index, self.capacity);
        }
        slot_buffer(&self.buffers, frame_index)?
            .update(self.stride * index as u64, bytemuck::bytes_of(value))
    }

    /// Dynamic offset selecting element `index` at bind time
    pub fn offset(&self, index: u32) -> Result<u32> {
        if index >= self.capacity {
            engine_bail!("lumen3d::uniforms",
                "Object {} out of range (capacity {})", index, self.capacity);
        }
        let offset = self.stride * index as u64;
        match u32::try_from(offset) {
            Ok(offset) => Ok(offset),
            Err(_) => {
                engine_bail!("lumen3d::uniforms",
                    "Dynamic offset {} of object {} does not fit in 32 bits", offset, index);
            }
        }
    }

    /// Range a single draw sees
    pub fn element_size(&self) -> u64 {
        std::mem::size_of::<T>() as u64
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn buffer(&self, frame_index: usize) -> Result<&Arc<dyn Buffer>> {
        slot_buffer(&self.buffers, frame_index)
    }
}

#[cfg(test)]
#[path = "uniforms_tests.rs"]
mod tests;
