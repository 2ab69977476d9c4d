// Backend configuration and device capabilities.

use serde::{Deserialize, Serialize};

/// User-facing rasterizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizerConfig {
    /// Compile pipelines on background threads and skip draws whose
    /// pipeline is not ready yet.
    pub async_shader_compilation: bool,
    /// Use the accurate (slower) multiplication in generated vertex
    /// shaders.
    pub accurate_mul: bool,
    /// Draws at or below this vertex count always wait for the compiled
    /// pipeline, even with async compilation on. Empirically tuned.
    pub async_vertex_threshold: u32,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            async_shader_compilation: false,
            accurate_mul: true,
            async_vertex_threshold: 6,
        }
    }
}

/// Relevant device limits and optional features, queried once by the
/// embedder at device creation.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Minimum uniform-buffer offset alignment.
    pub min_uniform_alignment: u32,
    /// Minimum vertex-buffer stride alignment; guest strides smaller
    /// than this force a per-vertex re-pack.
    pub min_vertex_stride_alignment: u32,
    pub supports_triangle_fan: bool,
    /// Native barycentric fragment input, which removes the need for the
    /// quaternion-correction geometry stage.
    pub supports_fragment_barycentric: bool,
    /// The device cannot blend with logic ops; the no-op case is
    /// emulated through the color write mask.
    pub needs_logic_op_emulation: bool,
    pub max_texel_buffer_elements: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            min_uniform_alignment: 256,
            min_vertex_stride_alignment: 1,
            supports_triangle_fan: false,
            supports_fragment_barycentric: false,
            needs_logic_op_emulation: true,
            max_texel_buffer_elements: 65536,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RasterizerConfig::default();
        assert!(!config.async_shader_compilation);
        assert_eq!(config.async_vertex_threshold, 6);
    }

    #[test]
    fn config_roundtrips_through_serde() {
        let config = RasterizerConfig {
            async_shader_compilation: true,
            accurate_mul: false,
            async_vertex_threshold: 12,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RasterizerConfig = serde_json::from_str(&json).unwrap();
        assert!(back.async_shader_compilation);
        assert!(!back.accurate_mul);
        assert_eq!(back.async_vertex_threshold, 12);
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let back: RasterizerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(back.async_vertex_threshold, 6);
    }
}
