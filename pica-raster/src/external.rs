// Collaborator contracts.
//
// The backend drives four externally-owned services: the pipeline cache
// (shader selection + pipeline compilation), the surface cache (texture,
// sampler and framebuffer resolution), the scheduler (deferred command
// submission), and the descriptor update queue. They are consumed through
// the narrow traits below; their internals live outside this crate.
//
// Everything handed to the scheduler is plain data copied at record time.
// Nothing recorded may alias the mutable per-draw scratch state, so the
// command stream is an enum of by-value operations rather than closures.

use std::sync::atomic::AtomicBool;

use crate::regs::{ColorFormat, PicaRegs, TexFormat, TextureUnitConfig};
use crate::state::PipelineInfo;
use crate::vertex::{VertexLayout, MAX_VERTEX_BINDINGS};

// ── Opaque handles ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub u32);

/// An image view handle. Comparing two views for equality is meaningful:
/// the resource binder uses it to detect framebuffer feedback loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageView(pub u64);

/// A writable descriptor binding set leased from the pipeline cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSet(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeap {
    Buffer,
    Texture,
    Utility,
}

/// Identifies one of the backend-owned streaming rings in descriptor
/// updates and recorded commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingId {
    Stream,
    Uniform,
    Texel,
    TexelLf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect<T> {
    pub left: T,
    pub top: T,
    pub right: T,
    pub bottom: T,
}

// ── Guest memory ────────────────────────────────────────────────

/// Read access to guest physical memory. Vertex and index data is pulled
/// through this before each accelerated draw.
pub trait GuestMemory {
    /// Contiguous guest-backed bytes starting at `addr`, up to the end of
    /// the containing memory region. May be shorter than the caller
    /// hoped; the caller clamps and reports.
    fn physical_ref(&self, addr: u32) -> &[u8];
}

// ── Scheduler ───────────────────────────────────────────────────

/// One deferred command. All fields are values copied at record time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BindVertexBuffers {
        binding_count: u32,
        offsets: [u64; MAX_VERTEX_BINDINGS],
    },
    BindIndexBuffer {
        offset: u64,
        format: wgpu::IndexFormat,
    },
    SetViewport {
        rect: Rect<i32>,
    },
    SetScissor {
        rect: Rect<i32>,
    },
    SetStencilState {
        reference: u32,
        compare_mask: u32,
        write_mask: u32,
    },
    SetBlendConstant {
        color: u32,
    },
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        vertex_offset: i32,
    },
}

/// Action the scheduler performs at every command-buffer submission
/// boundary, registered once at backend construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    /// End any render pass left open by deferred draw recording.
    FinishRendering,
}

pub trait Scheduler {
    fn record(&mut self, command: Command);
    fn register_on_submit(&mut self, action: SubmitAction);
}

// ── Pipeline cache ──────────────────────────────────────────────

pub type ProgressCallback<'a> = &'a mut dyn FnMut(usize, usize);

pub trait PipelineCache {
    fn acquire(&mut self, heap: DescriptorHeap) -> BindingSet;

    /// Bind the pipeline for `info`, compiling it if necessary. With
    /// `wait_built == false` an in-flight asynchronous compile returns
    /// `false` instead of stalling; the caller skips the draw.
    fn bind_pipeline(&mut self, info: &PipelineInfo, wait_built: bool) -> bool;

    /// `false` if the guest vertex shader cannot be accelerated.
    fn use_programmable_vertex_shader(
        &mut self,
        regs: &PicaRegs,
        layout: &VertexLayout,
        accurate_mul: bool,
    ) -> bool;
    fn use_trivial_vertex_shader(&mut self);
    /// `false` if the fixed quaternion-correction stage cannot be built.
    fn use_fixed_geometry_shader(&mut self, regs: &PicaRegs) -> bool;
    fn use_trivial_geometry_shader(&mut self);
    fn use_fragment_shader(&mut self, regs: &PicaRegs);

    /// Move the authoritative byte offset of one of the static uniform
    /// binding ranges after an upload.
    fn update_range(&mut self, binding: u32, offset: u64);

    fn set_program_id(&mut self, program_id: u64);
    fn load_disk_cache(&mut self, stop: &AtomicBool, progress: ProgressCallback);
    fn switch_cache(&mut self, title_id: u64, stop: &AtomicBool, progress: ProgressCallback);
}

// ── Surface cache ───────────────────────────────────────────────

/// Key for a combined cube-map resource: six face addresses plus the
/// shared dimensions and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureCubeConfig {
    pub px: u32,
    pub nx: u32,
    pub py: u32,
    pub ny: u32,
    pub pz: u32,
    pub nz: u32,
    pub width: u32,
    pub levels: u32,
    pub format: TexFormat,
}

/// The framebuffer resolved for the current draw. A zero `handle` means
/// there is nothing to draw into and the draw is a silent no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramebufferView {
    pub handle: u64,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub color_view: ImageView,
    pub draw_rect: Rect<i32>,
    pub viewport: Rect<i32>,
    /// Scissor bounds as (x1, y2, x2, y1), fed to the fragment uniforms.
    pub scissor: [i32; 4],
}

impl Default for ImageView {
    fn default() -> Self {
        Self(0)
    }
}

/// Source description for the display-accelerated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceParams {
    pub addr: u32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pixel_format: ColorFormat,
}

/// Result of a display-surface lookup: the surface, the matched subrect,
/// and the scaled surface dimensions the subrect is relative to.
#[derive(Debug, Clone, Copy)]
pub struct DisplaySurface {
    pub surface: SurfaceId,
    pub rect: Rect<u32>,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

pub trait SurfaceCache {
    /// Committed 1x1 placeholder surface; always a valid binding.
    fn null_surface(&self) -> SurfaceId;
    fn null_sampler(&self) -> SamplerId;

    fn texture_surface(&mut self, unit: &TextureUnitConfig) -> SurfaceId;
    /// Like [`SurfaceCache::texture_surface`] with the physical address
    /// overridden; used for individual cube faces.
    fn texture_surface_at(&mut self, unit: &TextureUnitConfig, address: u32) -> SurfaceId;
    fn texture_cube(&mut self, config: &TextureCubeConfig) -> SurfaceId;
    fn sampler(&mut self, unit: &TextureUnitConfig) -> SamplerId;

    fn image_view(&self, surface: SurfaceId) -> ImageView;
    /// Raw storage view of the surface, used by shadow-map sampling and
    /// manual blending.
    fn storage_view(&self, surface: SurfaceId) -> ImageView;
    /// Secondary view used in place of the primary one when the surface
    /// is simultaneously bound as the color attachment.
    fn copy_view(&self, surface: SurfaceId) -> ImageView;
    /// Tag the surface as a shadow map for cache bookkeeping.
    fn mark_shadow_map(&mut self, surface: SurfaceId);

    fn framebuffer(&mut self, using_color: bool, using_depth: bool) -> FramebufferView;
    fn display_surface(&mut self, params: &SurfaceParams) -> Option<DisplaySurface>;

    fn flush_region(&mut self, addr: u32, size: u32);
    fn invalidate_region(&mut self, addr: u32, size: u32);
    fn flush_all(&mut self);
    fn clear_all(&mut self, flush: bool);
    fn tick_frame(&mut self);
}

// ── Descriptor update queue ─────────────────────────────────────

/// Batched descriptor writes, applied atomically on `flush`.
pub trait DescriptorUpdateQueue {
    fn add_buffer(&mut self, set: BindingSet, binding: u32, ring: RingId, offset: u64, size: u64);
    fn add_image_sampler(
        &mut self,
        set: BindingSet,
        binding: u32,
        array_index: u32,
        view: ImageView,
        sampler: SamplerId,
    );
    fn add_storage_image(&mut self, set: BindingSet, binding: u32, view: ImageView);
    fn add_texel_buffer(
        &mut self,
        set: BindingSet,
        binding: u32,
        ring: RingId,
        format: wgpu::TextureFormat,
    );
    fn flush(&mut self);
}

// ── Display output ──────────────────────────────────────────────

/// Output of the display-accelerated path: a view of the rendered
/// surface and the normalized texture rectangle to present.
#[derive(Debug, Clone, Copy)]
pub struct ScreenInfo {
    pub image_view: ImageView,
    pub texcoords: Rect<f32>,
}

/// Bundle of collaborator references passed into each backend call.
pub struct Externals<'a> {
    pub memory: &'a dyn GuestMemory,
    pub pipeline_cache: &'a mut dyn PipelineCache,
    pub res_cache: &'a mut dyn SurfaceCache,
    pub scheduler: &'a mut dyn Scheduler,
    pub update_queue: &'a mut dyn DescriptorUpdateQueue,
}
