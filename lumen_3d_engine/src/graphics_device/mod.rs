/// Graphics device module - all GPU resource descriptions and traits

// Module declarations
pub mod graphics_device;
pub mod format;
pub mod attachment;
pub mod sync;
pub mod render_pass;
pub mod texture;
pub mod sampler;
pub mod mipmap;
pub mod frame_buffer;
pub mod buffer;
pub mod shader;
pub mod pipeline;
pub mod descriptor;
pub mod command_list;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use format::*;
pub use attachment::*;
pub use sync::*;
pub use render_pass::*;
pub use texture::*;
pub use sampler::*;
pub use mipmap::*;
pub use frame_buffer::*;
pub use buffer::*;
pub use shader::*;
pub use pipeline::*;
pub use descriptor::*;
pub use command_list::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
