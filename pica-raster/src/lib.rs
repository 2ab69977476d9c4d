//! Rasterization backend for PICA200 GPU emulation.
//!
//! The crate translates guest GPU register state into draws against an
//! externally-owned wgpu device. It owns the register shadow, the vertex
//! and uniform streaming rings and the pipeline state descriptors;
//! pipeline compilation, surface caching and command submission stay
//! behind the collaborator traits in [`external`].

pub mod config;
pub mod external;
pub mod rasterizer;
pub mod regs;
pub mod state;
pub mod stream_buffer;
pub mod textures;
pub mod uniforms;
pub mod vertex;

#[cfg(test)]
mod testing;

pub use config::{Capabilities, RasterizerConfig};
pub use external::{Externals, ScreenInfo};
pub use rasterizer::{DisplayConfig, Rasterizer};
pub use state::PipelineInfo;
pub use vertex::SoftwareVertex;
