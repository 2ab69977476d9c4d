// Texture unit binding.
//
// Three fixed units; unit 0 additionally multiplexes the special sampling
// modes (shadow maps, cube maps). Disabled units get a committed null
// surface so every descriptor slot stays valid.

use log::warn;

use crate::external::{
    DescriptorHeap, DescriptorUpdateQueue, FramebufferView, PipelineCache, SurfaceCache,
    TextureCubeConfig,
};
use crate::regs::{CubeFace, PicaRegs, TextureType};

/// How a texture unit's state binds to the descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitBinding {
    Normal,
    Shadow2D,
    ShadowCube,
    TextureCube,
}

fn classify(unit_index: usize, texture_type: TextureType) -> UnitBinding {
    if unit_index != 0 {
        return UnitBinding::Normal;
    }
    match texture_type {
        TextureType::Shadow2D => UnitBinding::Shadow2D,
        TextureType::ShadowCube => UnitBinding::ShadowCube,
        TextureType::TextureCube => UnitBinding::TextureCube,
        TextureType::Texture2D | TextureType::Projection2D => UnitBinding::Normal,
        TextureType::Disabled => {
            warn!("Disabled texture type on an enabled unit");
            UnitBinding::Normal
        }
    }
}

/// Refresh the per-draw texture descriptor set from the texturing
/// registers. Surfaces are resolved through the cache, which flushes any
/// pending guest writes; a unit sampling the current color attachment is
/// redirected to a copy of it to break the feedback loop.
pub fn sync_texture_units(
    regs: &PicaRegs,
    framebuffer: &FramebufferView,
    pipeline_cache: &mut dyn PipelineCache,
    res_cache: &mut dyn SurfaceCache,
    update_queue: &mut dyn DescriptorUpdateQueue,
) {
    let set = pipeline_cache.acquire(DescriptorHeap::Texture);

    for (index, unit) in regs.texturing.units.iter().enumerate() {
        if !unit.enabled {
            let view = res_cache.image_view(res_cache.null_surface());
            let sampler = res_cache.null_sampler();
            update_queue.add_image_sampler(set, index as u32, 0, view, sampler);
            continue;
        }

        match classify(index, unit.texture_type) {
            UnitBinding::Shadow2D => {
                let surface = res_cache.texture_surface(unit);
                res_cache.mark_shadow_map(surface);
                let view = res_cache.storage_view(surface);
                let sampler = res_cache.sampler(unit);
                update_queue.add_image_sampler(set, 0, 0, view, sampler);
            }
            UnitBinding::ShadowCube => {
                // Shadow cubes are sampled as six independent 2D faces.
                let sampler = res_cache.sampler(unit);
                for face in CubeFace::ALL {
                    let address = regs.texturing.cube_physical_address(face);
                    let surface = res_cache.texture_surface_at(unit, address);
                    res_cache.mark_shadow_map(surface);
                    let view = res_cache.storage_view(surface);
                    update_queue.add_image_sampler(set, 0, face as u32, view, sampler);
                }
            }
            UnitBinding::TextureCube => {
                let config = TextureCubeConfig {
                    px: regs.texturing.cube_physical_address(CubeFace::PositiveX),
                    nx: regs.texturing.cube_physical_address(CubeFace::NegativeX),
                    py: regs.texturing.cube_physical_address(CubeFace::PositiveY),
                    ny: regs.texturing.cube_physical_address(CubeFace::NegativeY),
                    pz: regs.texturing.cube_physical_address(CubeFace::PositiveZ),
                    nz: regs.texturing.cube_physical_address(CubeFace::NegativeZ),
                    width: unit.width,
                    levels: unit.max_level + 1,
                    format: unit.format,
                };
                let surface = res_cache.texture_cube(&config);
                let view = res_cache.image_view(surface);
                let sampler = res_cache.sampler(unit);
                update_queue.add_image_sampler(set, 0, 0, view, sampler);
            }
            UnitBinding::Normal => {
                let surface = res_cache.texture_surface(unit);
                let mut view = res_cache.image_view(surface);
                if view == framebuffer.color_view {
                    view = res_cache.copy_view(surface);
                }
                let sampler = res_cache.sampler(unit);
                update_queue.add_image_sampler(set, index as u32, 0, view, sampler);
            }
        }
    }
}

/// Bind the utility storage image used by shadow rendering, which blends
/// into the color attachment manually via image loads and stores.
pub fn sync_utility_textures(
    regs: &PicaRegs,
    framebuffer: &FramebufferView,
    pipeline_cache: &mut dyn PipelineCache,
    update_queue: &mut dyn DescriptorUpdateQueue,
) {
    if !regs.framebuffer.is_shadow_rendering() {
        return;
    }
    let set = pipeline_cache.acquire(DescriptorHeap::Utility);
    update_queue.add_storage_image(set, 0, framebuffer.color_view);
}

// ── Tests ───────────────────────────────────────────────────────
