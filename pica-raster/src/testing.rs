// In-crate mock collaborators for unit tests. Handles are derived from
// guest addresses so repeated lookups of the same resource compare equal.

use std::sync::atomic::AtomicBool;

use crate::external::{
    BindingSet, Command, DescriptorHeap, DescriptorUpdateQueue, DisplaySurface, FramebufferView,
    GuestMemory, ImageView, PipelineCache, ProgressCallback, RingId, SamplerId, Scheduler,
    SubmitAction, SurfaceCache, SurfaceId, SurfaceParams, TextureCubeConfig,
};
use crate::regs::{PicaRegs, TextureUnitConfig};
use crate::state::PipelineInfo;
use crate::vertex::VertexLayout;

// ── Guest memory ────────────────────────────────────────────────

pub struct MockMemory {
    base: u32,
    data: Vec<u8>,
}

impl MockMemory {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn write(&mut self, addr: u32, bytes: &[u8]) {
        let offset = (addr - self.base) as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl GuestMemory for MockMemory {
    fn physical_ref(&self, addr: u32) -> &[u8] {
        &self.data[(addr - self.base) as usize..]
    }
}

// ── Scheduler ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockScheduler {
    pub commands: Vec<Command>,
    pub submit_actions: Vec<SubmitAction>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for MockScheduler {
    fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    fn register_on_submit(&mut self, action: SubmitAction) {
        self.submit_actions.push(action);
    }
}

// ── Surface cache ───────────────────────────────────────────────

pub struct MockSurfaceCache {
    pub flushed: Vec<(u32, u32)>,
    pub invalidated: Vec<(u32, u32)>,
    pub cube_configs: Vec<TextureCubeConfig>,
    pub shadow_marked: Vec<SurfaceId>,
    pub framebuffer_view: FramebufferView,
    pub framebuffer_requests: Vec<(bool, bool)>,
    pub display: Option<DisplaySurface>,
    pub display_requests: Vec<SurfaceParams>,
    pub flush_all_calls: usize,
    pub tick_frames: usize,
}

impl MockSurfaceCache {
    pub fn new() -> Self {
        Self {
            flushed: Vec::new(),
            invalidated: Vec::new(),
            cube_configs: Vec::new(),
            shadow_marked: Vec::new(),
            framebuffer_view: FramebufferView::default(),
            framebuffer_requests: Vec::new(),
            display: None,
            display_requests: Vec::new(),
            flush_all_calls: 0,
            tick_frames: 0,
        }
    }
}

impl SurfaceCache for MockSurfaceCache {
    fn null_surface(&self) -> SurfaceId {
        SurfaceId(0)
    }

    fn null_sampler(&self) -> SamplerId {
        SamplerId(0)
    }

    fn texture_surface(&mut self, unit: &TextureUnitConfig) -> SurfaceId {
        SurfaceId(unit.address)
    }

    fn texture_surface_at(&mut self, _unit: &TextureUnitConfig, address: u32) -> SurfaceId {
        SurfaceId(address)
    }

    fn texture_cube(&mut self, config: &TextureCubeConfig) -> SurfaceId {
        self.cube_configs.push(*config);
        SurfaceId(config.px ^ 1)
    }

    fn sampler(&mut self, unit: &TextureUnitConfig) -> SamplerId {
        SamplerId(unit.address.wrapping_add(1))
    }

    fn image_view(&self, surface: SurfaceId) -> ImageView {
        ImageView(surface.0 as u64 | 0x1_0000_0000)
    }

    fn storage_view(&self, surface: SurfaceId) -> ImageView {
        ImageView(surface.0 as u64 | 0x2_0000_0000)
    }

    fn copy_view(&self, surface: SurfaceId) -> ImageView {
        ImageView(surface.0 as u64 | 0x3_0000_0000)
    }

    fn mark_shadow_map(&mut self, surface: SurfaceId) {
        self.shadow_marked.push(surface);
    }

    fn framebuffer(&mut self, using_color: bool, using_depth: bool) -> FramebufferView {
        self.framebuffer_requests.push((using_color, using_depth));
        self.framebuffer_view
    }

    fn display_surface(&mut self, params: &SurfaceParams) -> Option<DisplaySurface> {
        self.display_requests.push(*params);
        self.display
    }

    fn flush_region(&mut self, addr: u32, size: u32) {
        self.flushed.push((addr, size));
    }

    fn invalidate_region(&mut self, addr: u32, size: u32) {
        self.invalidated.push((addr, size));
    }

    fn flush_all(&mut self) {
        self.flush_all_calls += 1;
    }

    fn clear_all(&mut self, flush: bool) {
        if flush {
            self.flush_all_calls += 1;
        }
    }

    fn tick_frame(&mut self) {
        self.tick_frames += 1;
    }
}

// ── Pipeline cache ──────────────────────────────────────────────

pub struct MockPipelineCache {
    next_set: u32,
    pub acquired: Vec<DescriptorHeap>,
    /// Return value of [`PipelineCache::bind_pipeline`].
    pub bind_result: bool,
    pub bound: Vec<(PipelineInfo, bool)>,
    pub programmable_vs_ok: bool,
    pub fixed_gs_ok: bool,
    pub vs_layouts: Vec<VertexLayout>,
    pub trivial_vs_uses: usize,
    pub trivial_gs_uses: usize,
    pub fixed_gs_uses: usize,
    pub fragment_shader_uses: usize,
    pub range_updates: Vec<(u32, u64)>,
    pub program_ids: Vec<u64>,
}

impl MockPipelineCache {
    pub fn new() -> Self {
        Self {
            next_set: 0,
            acquired: Vec::new(),
            bind_result: true,
            bound: Vec::new(),
            programmable_vs_ok: true,
            fixed_gs_ok: true,
            vs_layouts: Vec::new(),
            trivial_vs_uses: 0,
            trivial_gs_uses: 0,
            fixed_gs_uses: 0,
            fragment_shader_uses: 0,
            range_updates: Vec::new(),
            program_ids: Vec::new(),
        }
    }
}

impl PipelineCache for MockPipelineCache {
    fn acquire(&mut self, heap: DescriptorHeap) -> BindingSet {
        self.acquired.push(heap);
        let set = BindingSet(self.next_set);
        self.next_set += 1;
        set
    }

    fn bind_pipeline(&mut self, info: &PipelineInfo, wait_built: bool) -> bool {
        self.bound.push((*info, wait_built));
        self.bind_result
    }

    fn use_programmable_vertex_shader(
        &mut self,
        _regs: &PicaRegs,
        layout: &VertexLayout,
        _accurate_mul: bool,
    ) -> bool {
        self.vs_layouts.push(*layout);
        self.programmable_vs_ok
    }

    fn use_trivial_vertex_shader(&mut self) {
        self.trivial_vs_uses += 1;
    }

    fn use_fixed_geometry_shader(&mut self, _regs: &PicaRegs) -> bool {
        self.fixed_gs_uses += 1;
        self.fixed_gs_ok
    }

    fn use_trivial_geometry_shader(&mut self) {
        self.trivial_gs_uses += 1;
    }

    fn use_fragment_shader(&mut self, _regs: &PicaRegs) {
        self.fragment_shader_uses += 1;
    }

    fn update_range(&mut self, binding: u32, offset: u64) {
        self.range_updates.push((binding, offset));
    }

    fn set_program_id(&mut self, program_id: u64) {
        self.program_ids.push(program_id);
    }

    fn load_disk_cache(&mut self, _stop: &AtomicBool, _progress: ProgressCallback) {}

    fn switch_cache(&mut self, _title_id: u64, _stop: &AtomicBool, _progress: ProgressCallback) {}
}

// ── Descriptor update queue ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferWrite {
    pub set: BindingSet,
    pub binding: u32,
    pub ring: RingId,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSamplerWrite {
    pub set: BindingSet,
    pub binding: u32,
    pub array_index: u32,
    pub view: ImageView,
    pub sampler: SamplerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageImageWrite {
    pub set: BindingSet,
    pub binding: u32,
    pub view: ImageView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelBufferWrite {
    pub set: BindingSet,
    pub binding: u32,
    pub ring: RingId,
    pub format: wgpu::TextureFormat,
}

#[derive(Default)]
pub struct MockUpdateQueue {
    pub buffers: Vec<BufferWrite>,
    pub image_samplers: Vec<ImageSamplerWrite>,
    pub storage_images: Vec<StorageImageWrite>,
    pub texel_buffers: Vec<TexelBufferWrite>,
    pub flushes: usize,
}

impl MockUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DescriptorUpdateQueue for MockUpdateQueue {
    fn add_buffer(&mut self, set: BindingSet, binding: u32, ring: RingId, offset: u64, size: u64) {
        self.buffers.push(BufferWrite {
            set,
            binding,
            ring,
            offset,
            size,
        });
    }

    fn add_image_sampler(
        &mut self,
        set: BindingSet,
        binding: u32,
        array_index: u32,
        view: ImageView,
        sampler: SamplerId,
    ) {
        self.image_samplers.push(ImageSamplerWrite {
            set,
            binding,
            array_index,
            view,
            sampler,
        });
    }

    fn add_storage_image(&mut self, set: BindingSet, binding: u32, view: ImageView) {
        self.storage_images.push(StorageImageWrite { set, binding, view });
    }

    fn add_texel_buffer(
        &mut self,
        set: BindingSet,
        binding: u32,
        ring: RingId,
        format: wgpu::TextureFormat,
    ) {
        self.texel_buffers.push(TexelBufferWrite {
            set,
            binding,
            ring,
            format,
        });
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
