/// Frame module - frame pacing, per-frame resources and the scene pass graph

pub mod frame_orchestrator;
pub mod surface;
pub mod uniforms;
pub mod pass_action;
pub mod scene_passes;

pub use frame_orchestrator::*;
pub use surface::*;
pub use uniforms::*;
pub use pass_action::*;
pub use scene_passes::*;
