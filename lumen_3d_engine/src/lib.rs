/*!
# Lumen3D Engine

Backend-agnostic core of the Lumen3D renderer.

This crate describes GPU work without touching a GPU: attachment layouts are
compiled into render passes, textures get their usage/aspect/layout from a
closed set of kinds, framebuffers are checked against their pass, and the
frame orchestrator paces a ring of frames in flight. Backends (Vulkan) turn
the descriptions into real objects by implementing `GraphicsDevice`.

## Architecture

- **GraphicsDevice**: Factory trait for every GPU resource
- **RenderPass / Framebuffer**: Attachment layout and the images bound to it
- **Texture**: Attachment, sampled, cubemap and shadow-map images
- **Pipeline / Descriptor***: Fixed-function state and resource bindings
- **FrameOrchestrator**: Fence-paced frames in flight, swapchain recovery
- **ScenePasses**: Shadow, offscreen and present passes of one frame
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod frame;
pub mod utils;

// Main lumen3d namespace module
pub mod lumen3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging hub
    pub use crate::engine::Engine;

    // Device factory trait
    pub use crate::graphics_device::GraphicsDevice;

    // Configuration
    pub use crate::config::{DeviceLimits, PresentMode, RendererConfig, MAX_FRAMES_IN_FLIGHT};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all device-level types
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Frame sub-module
    pub mod frame {
        pub use crate::frame::*;
    }

    /// Process exit code for the outcome of a run: 0 on success, 1 on error
    pub fn exit_code<T>(result: &Result<T>) -> i32 {
        crate::engine::Engine::exit_code(result)
    }
}

// Re-export math library at crate root
pub use glam;
