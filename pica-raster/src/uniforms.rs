// Uniform block and lookup-table streaming.
//
// Guest-visible state lands in three uniform blocks (vertex shader engine
// constants, vertex clip state, fragment state) and a set of float LUTs
// sampled through texel buffer rings. Each block and table carries a
// generation-based dirty tracker: writers bump a generation, uploads
// record the generation they saw, and a ring wrap resets every uploaded
// generation so all data is re-sent into the new buffer region.

use bytemuck::{Pod, Zeroable};

use crate::external::PipelineCache;
use crate::stream_buffer::{align_up, StreamBuffer};

// ── Dirty tracking ──────────────────────────────────────────────

/// Generation pair. `current` starts above `uploaded` so fresh state is
/// dirty by construction.
#[derive(Debug, Clone, Copy)]
pub struct DirtyTracker {
    current: u64,
    uploaded: u64,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self {
            current: 1,
            uploaded: 0,
        }
    }
}

impl DirtyTracker {
    pub fn mark(&mut self) {
        self.current += 1;
    }

    /// Forget every uploaded generation, e.g. after a ring wrap.
    pub fn force(&mut self) {
        self.uploaded = 0;
    }

    pub fn is_dirty(&self) -> bool {
        self.uploaded != self.current
    }

    pub fn mark_clean(&mut self) {
        self.uploaded = self.current;
    }
}

// ── Uniform block layouts ───────────────────────────────────────

/// Vertex shader engine constants. Every member is padded to a 16-byte
/// slot to match std140.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VsPicaUniforms {
    pub bools: [[u32; 4]; 16],
    pub i: [[u32; 4]; 4],
    pub f: [[f32; 4]; 96],
}

impl Default for VsPicaUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct VsUniforms {
    pub enable_clip1: u32,
    _pad: [u32; 3],
    pub clip_coef: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct FsUniforms {
    pub scissor_x1: i32,
    pub scissor_y1: i32,
    pub scissor_x2: i32,
    pub scissor_y2: i32,
    pub fog_color: [f32; 4],
    pub blend_color: [f32; 4],
    /// Texel element offsets of the 24 lighting tables, packed in ivec4s.
    pub lighting_lut_offset: [[i32; 4]; 6],
    pub fog_lut_offset: i32,
    pub proctex_noise_lut_offset: i32,
    pub proctex_color_map_offset: i32,
    pub proctex_alpha_map_offset: i32,
    pub proctex_lut_offset: i32,
    pub proctex_diff_lut_offset: i32,
    _pad: [i32; 2],
}

// ── LUT entries ─────────────────────────────────────────────────

pub const NUM_LIGHTING_LUTS: usize = 24;
pub const LIGHTING_LUT_SIZE: usize = 256;
pub const SMALL_LUT_SIZE: usize = 128;

/// 12-bit value plus signed 12-bit per-step difference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LutEntry(pub u32);

impl LutEntry {
    pub fn value(self) -> f32 {
        ((self.0 >> 12) & 0xFFF) as f32 / 4095.0
    }

    pub fn difference(self) -> f32 {
        let signed = ((self.0 & 0xFFF) as i32) << 20 >> 20;
        signed as f32 / 4095.0
    }
}

/// 11-bit value plus signed 13-bit difference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FogLutEntry(pub u32);

impl FogLutEntry {
    pub fn value(self) -> f32 {
        ((self.0 >> 13) & 0x7FF) as f32 / 2047.0
    }

    pub fn difference(self) -> f32 {
        let signed = ((self.0 & 0x1FFF) as i32) << 19 >> 19;
        signed as f32 / 2047.0
    }
}

// ── Guest-side table state ──────────────────────────────────────

pub struct LightingLuts {
    pub tables: [[LutEntry; LIGHTING_LUT_SIZE]; NUM_LIGHTING_LUTS],
    trackers: [DirtyTracker; NUM_LIGHTING_LUTS],
}

impl Default for LightingLuts {
    fn default() -> Self {
        Self {
            tables: [[LutEntry(0); LIGHTING_LUT_SIZE]; NUM_LIGHTING_LUTS],
            trackers: [DirtyTracker::default(); NUM_LIGHTING_LUTS],
        }
    }
}

impl LightingLuts {
    pub fn set_entry(&mut self, table: usize, index: usize, entry: LutEntry) {
        if self.tables[table][index] != entry {
            self.tables[table][index] = entry;
            self.trackers[table].mark();
        }
    }
}

pub struct FogState {
    pub lut: [FogLutEntry; SMALL_LUT_SIZE],
    tracker: DirtyTracker,
}

impl Default for FogState {
    fn default() -> Self {
        Self {
            lut: [FogLutEntry(0); SMALL_LUT_SIZE],
            tracker: DirtyTracker::default(),
        }
    }
}

impl FogState {
    pub fn set_entry(&mut self, index: usize, entry: FogLutEntry) {
        if self.lut[index] != entry {
            self.lut[index] = entry;
            self.tracker.mark();
        }
    }
}

pub struct ProcTexState {
    pub noise: [LutEntry; SMALL_LUT_SIZE],
    pub color_map: [LutEntry; SMALL_LUT_SIZE],
    pub alpha_map: [LutEntry; SMALL_LUT_SIZE],
    /// RGBA8 color entries.
    pub color_table: [u32; 256],
    pub color_diff_table: [u32; 256],
    noise_tracker: DirtyTracker,
    color_map_tracker: DirtyTracker,
    alpha_map_tracker: DirtyTracker,
    color_tracker: DirtyTracker,
    color_diff_tracker: DirtyTracker,
}

impl Default for ProcTexState {
    fn default() -> Self {
        Self {
            noise: [LutEntry(0); SMALL_LUT_SIZE],
            color_map: [LutEntry(0); SMALL_LUT_SIZE],
            alpha_map: [LutEntry(0); SMALL_LUT_SIZE],
            color_table: [0; 256],
            color_diff_table: [0; 256],
            noise_tracker: DirtyTracker::default(),
            color_map_tracker: DirtyTracker::default(),
            alpha_map_tracker: DirtyTracker::default(),
            color_tracker: DirtyTracker::default(),
            color_diff_tracker: DirtyTracker::default(),
        }
    }
}

impl ProcTexState {
    pub fn set_noise_entry(&mut self, index: usize, entry: LutEntry) {
        if self.noise[index] != entry {
            self.noise[index] = entry;
            self.noise_tracker.mark();
        }
    }

    pub fn set_color_map_entry(&mut self, index: usize, entry: LutEntry) {
        if self.color_map[index] != entry {
            self.color_map[index] = entry;
            self.color_map_tracker.mark();
        }
    }

    pub fn set_alpha_map_entry(&mut self, index: usize, entry: LutEntry) {
        if self.alpha_map[index] != entry {
            self.alpha_map[index] = entry;
            self.alpha_map_tracker.mark();
        }
    }

    pub fn set_color_entry(&mut self, index: usize, rgba: u32) {
        if self.color_table[index] != rgba {
            self.color_table[index] = rgba;
            self.color_tracker.mark();
        }
    }

    pub fn set_color_diff_entry(&mut self, index: usize, rgba: u32) {
        if self.color_diff_table[index] != rgba {
            self.color_diff_table[index] = rgba;
            self.color_diff_tracker.mark();
        }
    }
}

/// Vertex shader engine constant bank, written by the guest through
/// register uploads.
pub struct VsUniformBank {
    pub f: [[f32; 4]; 96],
    pub b: [bool; 16],
    pub i: [[u32; 4]; 4],
    pub tracker: DirtyTracker,
}

impl Default for VsUniformBank {
    fn default() -> Self {
        Self {
            f: [[0.0; 4]; 96],
            b: [false; 16],
            i: [[0; 4]; 4],
            tracker: DirtyTracker::default(),
        }
    }
}

impl VsUniformBank {
    pub fn as_uniform_data(&self) -> VsPicaUniforms {
        let mut data = VsPicaUniforms::zeroed();
        for (slot, &b) in self.b.iter().enumerate() {
            data.bools[slot][0] = b as u32;
        }
        data.i = self.i;
        data.f = self.f;
        data
    }
}

// ── Streaming ───────────────────────────────────────────────────

const VS_PICA_BINDING: u32 = 0;
const VS_BINDING: u32 = 1;
const FS_BINDING: u32 = 2;

pub struct UniformStreamer {
    pub vs_data: VsUniforms,
    pub fs_data: FsUniforms,
    vs_tracker: DirtyTracker,
    fs_tracker: DirtyTracker,
    alignment: usize,
    size_aligned_vs_pica: usize,
    size_aligned_vs: usize,
    size_aligned_fs: usize,
}

impl UniformStreamer {
    pub fn new(min_uniform_alignment: usize) -> Self {
        Self {
            vs_data: VsUniforms::default(),
            fs_data: FsUniforms::default(),
            vs_tracker: DirtyTracker::default(),
            fs_tracker: DirtyTracker::default(),
            alignment: min_uniform_alignment,
            size_aligned_vs_pica: align_up(
                std::mem::size_of::<VsPicaUniforms>(),
                min_uniform_alignment,
            ),
            size_aligned_vs: align_up(std::mem::size_of::<VsUniforms>(), min_uniform_alignment),
            size_aligned_fs: align_up(std::mem::size_of::<FsUniforms>(), min_uniform_alignment),
        }
    }

    pub fn block_sizes(&self) -> (usize, usize, usize) {
        (
            self.size_aligned_vs_pica,
            self.size_aligned_vs,
            self.size_aligned_fs,
        )
    }

    pub fn set_clip(&mut self, enable_clip1: bool, clip_coef: [f32; 4]) {
        let data = VsUniforms {
            enable_clip1: enable_clip1 as u32,
            clip_coef,
            ..Default::default()
        };
        if bytemuck::bytes_of(&data) != bytemuck::bytes_of(&self.vs_data) {
            self.vs_data = data;
            self.vs_tracker.mark();
        }
    }

    /// `bounds` arrives in framebuffer order (x1, y2, x2, y1), see
    /// [`crate::external::FramebufferView::scissor`].
    pub fn set_scissor(&mut self, bounds: [i32; 4]) {
        let [x1, y2, x2, y1] = bounds;
        if (self.fs_data.scissor_x1, self.fs_data.scissor_y1) != (x1, y1)
            || (self.fs_data.scissor_x2, self.fs_data.scissor_y2) != (x2, y2)
        {
            self.fs_data.scissor_x1 = x1;
            self.fs_data.scissor_y1 = y1;
            self.fs_data.scissor_x2 = x2;
            self.fs_data.scissor_y2 = y2;
            self.fs_tracker.mark();
        }
    }

    pub fn set_fog_color(&mut self, color: [f32; 4]) {
        if self.fs_data.fog_color != color {
            self.fs_data.fog_color = color;
            self.fs_tracker.mark();
        }
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) {
        if self.fs_data.blend_color != color {
            self.fs_data.blend_color = color;
            self.fs_tracker.mark();
        }
    }

    /// Stream the dirty uniform blocks into the uniform ring and point the
    /// static descriptor ranges at the fresh copies. A ring wrap discards
    /// the old region, so it forces every block out again.
    pub fn upload(
        &mut self,
        accelerate: bool,
        bank: &mut VsUniformBank,
        uniform_buffer: &mut StreamBuffer,
        pipeline_cache: &mut dyn PipelineCache,
    ) {
        // Only the engine constant bank is exclusive to the accelerated
        // path; the trivial vertex shader reads the clip block too.
        let sync_vs = self.vs_tracker.is_dirty();
        let sync_fs = self.fs_tracker.is_dirty();
        let sync_vs_pica = accelerate && bank.tracker.is_dirty();
        if !sync_vs && !sync_fs && !sync_vs_pica {
            return;
        }

        let total = self.size_aligned_vs + self.size_aligned_fs + self.size_aligned_vs_pica;
        let (mapped, offset, invalidated) = uniform_buffer.map(total, self.alignment);
        if invalidated {
            self.vs_tracker.force();
            self.fs_tracker.force();
            bank.tracker.force();
        }

        let mut used = 0usize;
        if self.vs_tracker.is_dirty() {
            let bytes = bytemuck::bytes_of(&self.vs_data);
            mapped[used..used + bytes.len()].copy_from_slice(bytes);
            pipeline_cache.update_range(VS_BINDING, offset + used as u64);
            self.vs_tracker.mark_clean();
            used += self.size_aligned_vs;
        }
        if self.fs_tracker.is_dirty() {
            let bytes = bytemuck::bytes_of(&self.fs_data);
            mapped[used..used + bytes.len()].copy_from_slice(bytes);
            pipeline_cache.update_range(FS_BINDING, offset + used as u64);
            self.fs_tracker.mark_clean();
            used += self.size_aligned_fs;
        }
        if accelerate && bank.tracker.is_dirty() {
            let data = bank.as_uniform_data();
            let bytes = bytemuck::bytes_of(&data);
            mapped[used..used + bytes.len()].copy_from_slice(bytes);
            pipeline_cache.update_range(VS_PICA_BINDING, offset + used as u64);
            bank.tracker.mark_clean();
            used += self.size_aligned_vs_pica;
        }
        uniform_buffer.commit(used);
    }

    /// Stream the dirty lighting and fog tables into the low-frequency
    /// texel ring as (value, difference) float pairs and record their
    /// element offsets in the fragment uniforms.
    pub fn upload_light_fog_luts(
        &mut self,
        lighting: &mut LightingLuts,
        fog: &mut FogState,
        lighting_disabled: bool,
        texel_lf_buffer: &mut StreamBuffer,
    ) {
        const PAIR_SIZE: usize = std::mem::size_of::<[f32; 2]>();

        // Mapping near the ring end can wrap; never do it for nothing.
        let lighting_dirty =
            !lighting_disabled && lighting.trackers.iter().any(|tracker| tracker.is_dirty());
        if !lighting_dirty && !fog.tracker.is_dirty() {
            return;
        }

        let max_size = (NUM_LIGHTING_LUTS * LIGHTING_LUT_SIZE + SMALL_LUT_SIZE) * PAIR_SIZE;
        let (mapped, offset, invalidated) = texel_lf_buffer.map(max_size, PAIR_SIZE);
        if invalidated {
            for tracker in &mut lighting.trackers {
                tracker.force();
            }
            fog.tracker.force();
        }

        let mut used = 0usize;
        if !lighting_disabled {
            for table in 0..NUM_LIGHTING_LUTS {
                if !lighting.trackers[table].is_dirty() {
                    continue;
                }
                for (i, entry) in lighting.tables[table].iter().enumerate() {
                    let pair = [entry.value(), entry.difference()];
                    let at = used + i * PAIR_SIZE;
                    mapped[at..at + PAIR_SIZE].copy_from_slice(bytemuck::bytes_of(&pair));
                }
                let element = ((offset as usize + used) / PAIR_SIZE) as i32;
                if self.fs_data.lighting_lut_offset[table / 4][table % 4] != element {
                    self.fs_data.lighting_lut_offset[table / 4][table % 4] = element;
                    self.fs_tracker.mark();
                }
                lighting.trackers[table].mark_clean();
                used += LIGHTING_LUT_SIZE * PAIR_SIZE;
            }
        }

        if fog.tracker.is_dirty() {
            for (i, entry) in fog.lut.iter().enumerate() {
                let pair = [entry.value(), entry.difference()];
                let at = used + i * PAIR_SIZE;
                mapped[at..at + PAIR_SIZE].copy_from_slice(bytemuck::bytes_of(&pair));
            }
            let element = ((offset as usize + used) / PAIR_SIZE) as i32;
            if self.fs_data.fog_lut_offset != element {
                self.fs_data.fog_lut_offset = element;
                self.fs_tracker.mark();
            }
            fog.tracker.mark_clean();
            used += SMALL_LUT_SIZE * PAIR_SIZE;
        }

        texel_lf_buffer.commit(used);
    }

    /// Stream the dirty procedural-texture tables into the texel ring.
    /// The map tables are float pairs; the color tables are RGBA floats.
    pub fn upload_proctex_luts(
        &mut self,
        proctex: &mut ProcTexState,
        texel_buffer: &mut StreamBuffer,
    ) {
        const PAIR_SIZE: usize = std::mem::size_of::<[f32; 2]>();
        const RGBA_SIZE: usize = std::mem::size_of::<[f32; 4]>();

        if !proctex.noise_tracker.is_dirty()
            && !proctex.color_map_tracker.is_dirty()
            && !proctex.alpha_map_tracker.is_dirty()
            && !proctex.color_tracker.is_dirty()
            && !proctex.color_diff_tracker.is_dirty()
        {
            return;
        }

        let max_size = 3 * SMALL_LUT_SIZE * PAIR_SIZE + 2 * 256 * RGBA_SIZE;
        let (mapped, offset, invalidated) = texel_buffer.map(max_size, RGBA_SIZE);
        if invalidated {
            proctex.noise_tracker.force();
            proctex.color_map_tracker.force();
            proctex.alpha_map_tracker.force();
            proctex.color_tracker.force();
            proctex.color_diff_tracker.force();
        }

        let mut used = 0usize;
        let mut fs_dirty = false;

        let mut upload_map_table =
            |table: &[LutEntry; SMALL_LUT_SIZE],
             tracker: &mut DirtyTracker,
             slot: &mut i32,
             used: &mut usize| {
                if !tracker.is_dirty() {
                    return false;
                }
                for (i, entry) in table.iter().enumerate() {
                    let pair = [entry.value(), entry.difference()];
                    let at = *used + i * PAIR_SIZE;
                    mapped[at..at + PAIR_SIZE].copy_from_slice(bytemuck::bytes_of(&pair));
                }
                let element = ((offset as usize + *used) / PAIR_SIZE) as i32;
                tracker.mark_clean();
                *used += SMALL_LUT_SIZE * PAIR_SIZE;
                if *slot != element {
                    *slot = element;
                    return true;
                }
                false
            };

        fs_dirty |= upload_map_table(
            &proctex.noise,
            &mut proctex.noise_tracker,
            &mut self.fs_data.proctex_noise_lut_offset,
            &mut used,
        );
        fs_dirty |= upload_map_table(
            &proctex.color_map,
            &mut proctex.color_map_tracker,
            &mut self.fs_data.proctex_color_map_offset,
            &mut used,
        );
        fs_dirty |= upload_map_table(
            &proctex.alpha_map,
            &mut proctex.alpha_map_tracker,
            &mut self.fs_data.proctex_alpha_map_offset,
            &mut used,
        );

        let mut upload_color_table =
            |table: &[u32; 256], tracker: &mut DirtyTracker, slot: &mut i32, used: &mut usize| {
                if !tracker.is_dirty() {
                    return false;
                }
                for (i, &rgba) in table.iter().enumerate() {
                    let color = [
                        (rgba & 0xFF) as f32 / 255.0,
                        ((rgba >> 8) & 0xFF) as f32 / 255.0,
                        ((rgba >> 16) & 0xFF) as f32 / 255.0,
                        ((rgba >> 24) & 0xFF) as f32 / 255.0,
                    ];
                    let at = *used + i * RGBA_SIZE;
                    mapped[at..at + RGBA_SIZE].copy_from_slice(bytemuck::bytes_of(&color));
                }
                let element = ((offset as usize + *used) / RGBA_SIZE) as i32;
                tracker.mark_clean();
                *used += 256 * RGBA_SIZE;
                if *slot != element {
                    *slot = element;
                    return true;
                }
                false
            };

        fs_dirty |= upload_color_table(
            &proctex.color_table,
            &mut proctex.color_tracker,
            &mut self.fs_data.proctex_lut_offset,
            &mut used,
        );
        fs_dirty |= upload_color_table(
            &proctex.color_diff_table,
            &mut proctex.color_diff_tracker,
            &mut self.fs_data.proctex_diff_lut_offset,
            &mut used,
        );

        if fs_dirty {
            self.fs_tracker.mark();
        }
        texel_buffer.commit(used);
    }
}

// ── Tests ───────────────────────────────────────────────────────
