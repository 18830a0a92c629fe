/// Small containers shared by the engine modules

pub mod resource_table;

pub use resource_table::{ResourceKey, ResourceTable};
