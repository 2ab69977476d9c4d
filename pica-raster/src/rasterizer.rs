// Draw orchestration.
//
// `Rasterizer` owns the register shadow, the CPU-side streaming rings and
// the uniform/LUT state, and drives the external collaborators through
// one draw at a time. Two entry points produce geometry: the accelerated
// path pulls vertex data straight out of guest memory, and the software
// path consumes pre-transformed vertices batched by the caller.

use std::sync::atomic::AtomicBool;

use log::debug;

use crate::config::{Capabilities, RasterizerConfig};
use crate::external::{
    Command, DescriptorHeap, Externals, ProgressCallback, RingId, ScreenInfo, SubmitAction,
    SurfaceParams,
};
use crate::regs::{ColorFormat, GsMode, PicaRegs, TriangleTopology, MAX_ATTRIBUTES};
use crate::state::{sync_dynamic_state, sync_pipeline_info, DynamicState, PipelineInfo};
use crate::stream_buffer::StreamBuffer;
use crate::textures::{sync_texture_units, sync_utility_textures};
use crate::uniforms::{
    FogLutEntry, FogState, LightingLuts, LutEntry, ProcTexState, UniformStreamer, VsUniformBank,
};
use crate::vertex::{
    analyze_vertex_array, setup_index_array, setup_vertex_array, software_vertex_layout,
    SoftwareVertex, VertexArrayInfo, VertexLayout, MAX_VERTEX_BINDINGS,
};

const STREAM_BUFFER_SIZE: usize = 64 * 1024 * 1024;
const UNIFORM_BUFFER_SIZE: usize = 8 * 1024 * 1024;
const TEXTURE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Display framebuffer description from the guest LCD registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
}

pub struct Rasterizer {
    pub regs: PicaRegs,
    default_attributes: [[f32; 4]; MAX_ATTRIBUTES],

    lighting: LightingLuts,
    fog: FogState,
    proctex: ProcTexState,
    vs_uniform_bank: VsUniformBank,
    uniforms: UniformStreamer,

    stream_buffer: StreamBuffer,
    uniform_buffer: StreamBuffer,
    texture_buffer: StreamBuffer,
    texture_lf_buffer: StreamBuffer,

    pipeline_info: PipelineInfo,
    dynamic: DynamicState,
    software_layout: VertexLayout,
    vertex_info: VertexArrayInfo,
    binding_offsets: [u64; MAX_VERTEX_BINDINGS],
    vertex_batch: Vec<SoftwareVertex>,

    caps: Capabilities,
    config: RasterizerConfig,
}

impl Rasterizer {
    pub fn new(caps: Capabilities, config: RasterizerConfig, ext: &mut Externals) -> Self {
        let uniforms = UniformStreamer::new(caps.min_uniform_alignment as usize);
        let texel_size = TEXTURE_BUFFER_SIZE.min(caps.max_texel_buffer_elements as usize * 8);

        // Static descriptor layout: the uniform ranges and texel rings on
        // the buffer heap, null textures everywhere else. The uniform
        // range offsets move with each upload; everything else is stable.
        let (vs_pica, vs, fs) = uniforms.block_sizes();
        let buffer_set = ext.pipeline_cache.acquire(DescriptorHeap::Buffer);
        ext.update_queue
            .add_buffer(buffer_set, 0, RingId::Uniform, 0, vs_pica as u64);
        ext.update_queue
            .add_buffer(buffer_set, 1, RingId::Uniform, 0, vs as u64);
        ext.update_queue
            .add_buffer(buffer_set, 2, RingId::Uniform, 0, fs as u64);
        ext.update_queue.add_texel_buffer(
            buffer_set,
            3,
            RingId::TexelLf,
            wgpu::TextureFormat::Rg32Float,
        );
        ext.update_queue
            .add_texel_buffer(buffer_set, 4, RingId::Texel, wgpu::TextureFormat::Rg32Float);
        ext.update_queue.add_texel_buffer(
            buffer_set,
            5,
            RingId::Texel,
            wgpu::TextureFormat::Rgba32Float,
        );

        let null_view = ext.res_cache.image_view(ext.res_cache.null_surface());
        let null_sampler = ext.res_cache.null_sampler();
        let texture_set = ext.pipeline_cache.acquire(DescriptorHeap::Texture);
        for unit in 0..3 {
            ext.update_queue
                .add_image_sampler(texture_set, unit, 0, null_view, null_sampler);
        }
        let utility_set = ext.pipeline_cache.acquire(DescriptorHeap::Utility);
        ext.update_queue.add_storage_image(utility_set, 0, null_view);
        ext.update_queue
            .add_image_sampler(utility_set, 1, 0, null_view, null_sampler);
        ext.update_queue.flush();

        // Deferred draw recording leaves render passes open across draws;
        // submission must close them.
        ext.scheduler.register_on_submit(SubmitAction::FinishRendering);

        Self {
            regs: PicaRegs::default(),
            default_attributes: [[0.0, 0.0, 0.0, 1.0]; MAX_ATTRIBUTES],
            lighting: LightingLuts::default(),
            fog: FogState::default(),
            proctex: ProcTexState::default(),
            vs_uniform_bank: VsUniformBank::default(),
            uniforms,
            stream_buffer: StreamBuffer::new(STREAM_BUFFER_SIZE),
            uniform_buffer: StreamBuffer::new(UNIFORM_BUFFER_SIZE),
            texture_buffer: StreamBuffer::new(texel_size),
            texture_lf_buffer: StreamBuffer::new(texel_size),
            pipeline_info: PipelineInfo::default(),
            dynamic: DynamicState::default(),
            software_layout: software_vertex_layout(),
            vertex_info: VertexArrayInfo::default(),
            binding_offsets: [0; MAX_VERTEX_BINDINGS],
            vertex_batch: Vec::new(),
            caps,
            config,
        }
    }

    // ── Accelerated path ────────────────────────────────────────

    /// Drive one hardware draw straight from the guest vertex arrays.
    /// Returns `false` when the configuration cannot be accelerated and
    /// the caller must fall back to software vertex processing.
    pub fn accelerate_draw_batch(&mut self, is_indexed: bool, ext: &mut Externals) -> bool {
        let pipeline = &self.regs.pipeline;
        if pipeline.use_gs {
            // Only point-mode geometry shaders behind the shader topology
            // have an accelerated equivalent.
            if pipeline.gs_config.mode != GsMode::Point {
                return false;
            }
            if pipeline.triangle_topology != TriangleTopology::Shader {
                return false;
            }
        }

        let topology = pipeline.triangle_topology;
        if topology == TriangleTopology::Fan && !self.caps.supports_triangle_fan {
            debug!("Fan topology without hardware support, falling back");
            return false;
        }
        self.pipeline_info.rasterization.topology = topology;

        let stride_align = self.caps.min_vertex_stride_alignment;
        self.vertex_info =
            analyze_vertex_array(&self.regs, ext.memory, ext.res_cache, is_indexed, stride_align);
        let data = setup_vertex_array(
            &self.regs,
            &self.default_attributes,
            ext.memory,
            ext.res_cache,
            &mut self.stream_buffer,
            &self.vertex_info,
            stride_align,
        );
        self.pipeline_info.vertex_layout = data.layout;
        self.binding_offsets = data.binding_offsets;

        if !ext.pipeline_cache.use_programmable_vertex_shader(
            &self.regs,
            &data.layout,
            self.config.accurate_mul,
        ) {
            return false;
        }
        if !self.setup_geometry_shader(ext) {
            return false;
        }

        self.draw(true, is_indexed, ext)
    }

    fn setup_geometry_shader(&mut self, ext: &mut Externals) -> bool {
        // The fixed stage only reconstructs barycentric quaternion
        // interpolation for lighting; without lighting, or with native
        // barycentrics, the trivial stage suffices.
        if self.regs.lighting.disable || self.caps.supports_fragment_barycentric {
            ext.pipeline_cache.use_trivial_geometry_shader();
            true
        } else {
            ext.pipeline_cache.use_fixed_geometry_shader(&self.regs)
        }
    }

    // ── Software path ───────────────────────────────────────────

    pub fn add_triangle(&mut self, v0: SoftwareVertex, v1: SoftwareVertex, v2: SoftwareVertex) {
        self.vertex_batch.push(v0);
        self.vertex_batch.push(v1);
        self.vertex_batch.push(v2);
    }

    /// Flush the batched pre-transformed triangles.
    pub fn draw_triangles(&mut self, ext: &mut Externals) {
        if self.vertex_batch.is_empty() {
            return;
        }
        self.pipeline_info.rasterization.topology = TriangleTopology::List;
        self.pipeline_info.vertex_layout = self.software_layout;
        ext.pipeline_cache.use_trivial_vertex_shader();
        ext.pipeline_cache.use_trivial_geometry_shader();
        self.draw(false, false, ext);
    }

    // ── Draw core ───────────────────────────────────────────────

    fn draw(&mut self, accelerate: bool, is_indexed: bool, ext: &mut Externals) -> bool {
        sync_pipeline_info(&self.regs, &self.caps, &mut self.pipeline_info);
        sync_dynamic_state(&self.regs, &mut self.dynamic);

        let shadow_rendering = self.regs.framebuffer.is_shadow_rendering();
        let has_stencil = self.regs.framebuffer.has_stencil();
        let framebuffer = &self.regs.framebuffer.framebuffer;
        let depth_mask = self.regs.framebuffer.output_merger.depth_color_mask;

        // Shadow rendering writes color through the utility storage
        // image, bypassing the write mask.
        let write_color_fb =
            shadow_rendering || !self.pipeline_info.blending.color_write_mask.is_empty();
        let write_depth_fb = self.pipeline_info.depth_write_enabled();
        let using_color_fb = framebuffer.color_address != 0 && write_color_fb;
        let using_depth_fb = !shadow_rendering
            && framebuffer.depth_address != 0
            && (write_depth_fb
                || depth_mask.depth_test_enable()
                || (has_stencil && self.pipeline_info.depth_stencil.stencil_test_enable));

        let fb = ext.res_cache.framebuffer(using_color_fb, using_depth_fb);
        if fb.handle == 0 {
            // Nothing to render into; the guest drew into unmapped memory.
            self.vertex_batch.clear();
            return true;
        }

        self.pipeline_info.attachments.color = fb.color_format;
        self.pipeline_info.attachments.depth = fb.depth_format;
        self.dynamic.viewport = fb.viewport;
        self.dynamic.scissor = fb.draw_rect;

        self.uniforms.set_scissor(fb.scissor);
        self.uniforms.set_blend_color(unpack_rgba8(
            self.regs.framebuffer.output_merger.blend_const,
        ));

        sync_texture_units(&self.regs, &fb, ext.pipeline_cache, ext.res_cache, ext.update_queue);
        sync_utility_textures(&self.regs, &fb, ext.pipeline_cache, ext.update_queue);
        ext.pipeline_cache.use_fragment_shader(&self.regs);

        self.uniforms.upload_light_fog_luts(
            &mut self.lighting,
            &mut self.fog,
            self.regs.lighting.disable,
            &mut self.texture_lf_buffer,
        );
        self.uniforms
            .upload_proctex_luts(&mut self.proctex, &mut self.texture_buffer);
        self.uniforms.upload(
            accelerate,
            &mut self.vs_uniform_bank,
            &mut self.uniform_buffer,
            ext.pipeline_cache,
        );

        ext.scheduler.record(Command::SetViewport {
            rect: self.dynamic.viewport,
        });
        ext.scheduler.record(Command::SetScissor {
            rect: self.dynamic.scissor,
        });
        ext.scheduler.record(Command::SetStencilState {
            reference: self.dynamic.stencil_reference,
            compare_mask: self.dynamic.stencil_compare_mask,
            write_mask: self.dynamic.stencil_write_mask,
        });
        ext.scheduler.record(Command::SetBlendConstant {
            color: self.dynamic.blend_color,
        });

        let succeeded = if accelerate {
            self.accelerated_draw(is_indexed, ext)
        } else {
            self.software_draw(ext)
        };
        self.vertex_batch.clear();
        succeeded
    }

    fn accelerated_draw(&mut self, is_indexed: bool, ext: &mut Externals) -> bool {
        if is_indexed {
            setup_index_array(&self.regs, ext.memory, &mut self.stream_buffer, ext.scheduler);
        }

        let num_vertices = self.regs.pipeline.num_vertices;
        // Small draws stall on compilation rather than flicker.
        let wait_built = !self.config.async_shader_compilation
            || num_vertices <= self.config.async_vertex_threshold;
        if !ext.pipeline_cache.bind_pipeline(&self.pipeline_info, wait_built) {
            debug!("Skipping draw while pipeline compiles");
            return true;
        }

        ext.scheduler.record(Command::BindVertexBuffers {
            binding_count: self.pipeline_info.vertex_layout.binding_count as u32,
            offsets: self.binding_offsets,
        });
        if is_indexed {
            ext.scheduler.record(Command::DrawIndexed {
                index_count: num_vertices,
                vertex_offset: -(self.vertex_info.index_min as i32),
            });
        } else {
            ext.scheduler.record(Command::Draw {
                vertex_count: num_vertices,
                first_vertex: 0,
            });
        }
        true
    }

    fn software_draw(&mut self, ext: &mut Externals) -> bool {
        if !ext.pipeline_cache.bind_pipeline(&self.pipeline_info, true) {
            return false;
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.vertex_batch);
        let (mapped, offset, _) = self.stream_buffer.map(bytes.len(), 16);
        mapped[..bytes.len()].copy_from_slice(bytes);
        self.stream_buffer.commit(bytes.len());

        let mut offsets = [0u64; MAX_VERTEX_BINDINGS];
        offsets[0] = offset;
        ext.scheduler.record(Command::BindVertexBuffers {
            binding_count: 1,
            offsets,
        });
        ext.scheduler.record(Command::Draw {
            vertex_count: self.vertex_batch.len() as u32,
            first_vertex: 0,
        });
        true
    }

    // ── Display output ──────────────────────────────────────────

    /// Resolve the LCD framebuffer to a cached surface for presentation.
    /// The guest framebuffer is stored rotated a quarter turn, which the
    /// returned texture coordinates undo.
    pub fn accelerate_display(
        &mut self,
        config: &DisplayConfig,
        framebuffer_addr: u32,
        pixel_stride: u32,
        ext: &mut Externals,
    ) -> Option<ScreenInfo> {
        if framebuffer_addr == 0 {
            return None;
        }

        let params = SurfaceParams {
            addr: framebuffer_addr,
            width: config.width.min(pixel_stride),
            height: config.height,
            stride: pixel_stride,
            pixel_format: config.format,
        };
        let display = ext.res_cache.display_surface(&params)?;

        let width = display.scaled_width as f32;
        let height = display.scaled_height as f32;
        Some(ScreenInfo {
            image_view: ext.res_cache.image_view(display.surface),
            texcoords: crate::external::Rect {
                left: display.rect.bottom as f32 / height,
                top: display.rect.left as f32 / width,
                right: display.rect.top as f32 / height,
                bottom: display.rect.right as f32 / width,
            },
        })
    }

    // ── Cache maintenance ───────────────────────────────────────

    pub fn flush_all(&mut self, ext: &mut Externals) {
        ext.res_cache.flush_all();
    }

    pub fn flush_region(&mut self, addr: u32, size: u32, ext: &mut Externals) {
        ext.res_cache.flush_region(addr, size);
    }

    pub fn invalidate_region(&mut self, addr: u32, size: u32, ext: &mut Externals) {
        ext.res_cache.invalidate_region(addr, size);
    }

    pub fn flush_and_invalidate_region(&mut self, addr: u32, size: u32, ext: &mut Externals) {
        ext.res_cache.flush_region(addr, size);
        ext.res_cache.invalidate_region(addr, size);
    }

    pub fn clear_all(&mut self, flush: bool, ext: &mut Externals) {
        ext.res_cache.clear_all(flush);
    }

    pub fn tick_frame(&mut self, ext: &mut Externals) {
        ext.res_cache.tick_frame();
    }

    // ── Disk pipeline cache ─────────────────────────────────────

    pub fn load_disk_resources(
        &mut self,
        program_id: u64,
        stop: &AtomicBool,
        progress: ProgressCallback,
        ext: &mut Externals,
    ) {
        ext.pipeline_cache.set_program_id(program_id);
        ext.pipeline_cache.load_disk_cache(stop, progress);
    }

    pub fn switch_disk_resources(
        &mut self,
        title_id: u64,
        stop: &AtomicBool,
        progress: ProgressCallback,
        ext: &mut Externals,
    ) {
        ext.pipeline_cache.switch_cache(title_id, stop, progress);
    }

    // ── Guest state writes ──────────────────────────────────────

    pub fn set_vs_float_uniform(&mut self, index: usize, value: [f32; 4]) {
        if self.vs_uniform_bank.f[index] != value {
            self.vs_uniform_bank.f[index] = value;
            self.vs_uniform_bank.tracker.mark();
        }
    }

    pub fn set_vs_bool_uniform(&mut self, index: usize, value: bool) {
        if self.vs_uniform_bank.b[index] != value {
            self.vs_uniform_bank.b[index] = value;
            self.vs_uniform_bank.tracker.mark();
        }
    }

    pub fn set_vs_int_uniform(&mut self, index: usize, value: [u32; 4]) {
        if self.vs_uniform_bank.i[index] != value {
            self.vs_uniform_bank.i[index] = value;
            self.vs_uniform_bank.tracker.mark();
        }
    }

    pub fn set_default_attribute(&mut self, index: usize, value: [f32; 4]) {
        self.default_attributes[index] = value;
    }

    pub fn set_clip_state(&mut self, enable_clip1: bool, clip_coef: [f32; 4]) {
        self.uniforms.set_clip(enable_clip1, clip_coef);
    }

    pub fn set_fog_color(&mut self, color: [f32; 4]) {
        self.uniforms.set_fog_color(color);
    }

    pub fn set_light_lut_entry(&mut self, table: usize, index: usize, raw: u32) {
        self.lighting.set_entry(table, index, LutEntry(raw));
    }

    pub fn set_fog_lut_entry(&mut self, index: usize, raw: u32) {
        self.fog.set_entry(index, FogLutEntry(raw));
    }

    pub fn set_proctex_noise_entry(&mut self, index: usize, raw: u32) {
        self.proctex.set_noise_entry(index, LutEntry(raw));
    }

    pub fn set_proctex_color_map_entry(&mut self, index: usize, raw: u32) {
        self.proctex.set_color_map_entry(index, LutEntry(raw));
    }

    pub fn set_proctex_alpha_map_entry(&mut self, index: usize, raw: u32) {
        self.proctex.set_alpha_map_entry(index, LutEntry(raw));
    }

    pub fn set_proctex_color_entry(&mut self, index: usize, rgba: u32) {
        self.proctex.set_color_entry(index, rgba);
    }

    pub fn set_proctex_color_diff_entry(&mut self, index: usize, rgba: u32) {
        self.proctex.set_color_diff_entry(index, rgba);
    }
}

fn unpack_rgba8(color: u32) -> [f32; 4] {
    [
        (color & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 24) & 0xFF) as f32 / 255.0,
    ]
}

// ── Tests ───────────────────────────────────────────────────────
