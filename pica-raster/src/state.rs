// Fixed-function state synchronization.
//
// Every draw rebuilds a `PipelineInfo` snapshot from the register shadow.
// The snapshot is the cache key the external pipeline cache compiles
// against, so two snapshots must compare equal exactly when they would
// render identically: dynamic values (viewport, scissor, stencil
// reference/masks, blend constant) are kept out of it and travel through
// recorded commands instead.
//
// Guest state that maps one-to-one onto a wgpu enum is stored as the wgpu
// type; blend factors and the triangle topology keep their guest encoding
// because wgpu cannot express all hardware values.

use crate::config::Capabilities;
use crate::external::Rect;
use crate::regs::{
    BlendEquation, BlendFactor, CompareFunc, CullMode, LogicOp, PicaRegs, StencilAction,
    TriangleTopology,
};
use crate::vertex::VertexLayout;

// ── Descriptor ──────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub topology: TriangleTopology,
    /// Render target is flipped; the viewport must flip to match.
    pub flip_viewport: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendingState {
    pub blend_enable: bool,
    pub color_blend_eq: BlendEquation,
    pub alpha_blend_eq: BlendEquation,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub logic_op: LogicOp,
    pub color_write_mask: wgpu::ColorWrites,
}

impl Default for BlendingState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            color_blend_eq: BlendEquation::Add,
            alpha_blend_eq: BlendEquation::Add,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            logic_op: LogicOp::Copy,
            color_write_mask: wgpu::ColorWrites::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_write_enable: bool,
    pub stencil_test_enable: bool,
    pub stencil_compare: wgpu::CompareFunction,
    pub stencil_fail_op: wgpu::StencilOperation,
    pub stencil_pass_op: wgpu::StencilOperation,
    pub stencil_depth_fail_op: wgpu::StencilOperation,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: false,
            depth_compare: wgpu::CompareFunction::Always,
            depth_write_enable: false,
            stencil_test_enable: false,
            stencil_compare: wgpu::CompareFunction::Always,
            stencil_fail_op: wgpu::StencilOperation::Keep,
            stencil_pass_op: wgpu::StencilOperation::Keep,
            stencil_depth_fail_op: wgpu::StencilOperation::Keep,
        }
    }
}

/// Pipeline compatibility is attachment-format sensitive, so the active
/// formats are part of the key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentFormats {
    pub color: Option<wgpu::TextureFormat>,
    pub depth: Option<wgpu::TextureFormat>,
}

/// The pipeline state descriptor: everything that determines which
/// compiled pipeline a draw needs. Rebuilt from registers every draw,
/// never persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineInfo {
    pub vertex_layout: VertexLayout,
    pub rasterization: RasterizationState,
    pub blending: BlendingState,
    pub depth_stencil: DepthStencilState,
    pub attachments: AttachmentFormats,
}

impl PipelineInfo {
    /// Depth writes reach memory only while the depth test runs.
    pub fn depth_write_enabled(&self) -> bool {
        self.depth_stencil.depth_test_enable && self.depth_stencil.depth_write_enable
    }
}

/// Per-draw values excluded from the descriptor; copied into recorded
/// commands at draw time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DynamicState {
    pub viewport: Rect<i32>,
    pub scissor: Rect<i32>,
    pub blend_color: u32,
    pub stencil_reference: u32,
    pub stencil_compare_mask: u32,
    pub stencil_write_mask: u32,
}

// ── Register translation ────────────────────────────────────────

fn compare_function(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Always => wgpu::CompareFunction::Always,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::LessThan => wgpu::CompareFunction::Less,
        CompareFunc::LessThanOrEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::GreaterThan => wgpu::CompareFunction::Greater,
        CompareFunc::GreaterThanOrEqual => wgpu::CompareFunction::GreaterEqual,
    }
}

fn stencil_operation(action: StencilAction) -> wgpu::StencilOperation {
    match action {
        StencilAction::Keep => wgpu::StencilOperation::Keep,
        StencilAction::Zero => wgpu::StencilOperation::Zero,
        StencilAction::Replace => wgpu::StencilOperation::Replace,
        StencilAction::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilAction::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilAction::Invert => wgpu::StencilOperation::Invert,
        StencilAction::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilAction::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

/// RGBA bit mask (bit 0 = red) to a wgpu write mask.
fn color_writes(mask: u32) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask & 1 != 0 {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask & 2 != 0 {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask & 4 != 0 {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask & 8 != 0 {
        writes |= wgpu::ColorWrites::ALPHA;
    }
    writes
}

/// Rebuild the static parts of `info` from the register shadow. Pure in
/// the registers: identical state always yields a bit-identical
/// descriptor. The topology and vertex layout are owned by the draw
/// orchestrator and left untouched here.
pub fn sync_pipeline_info(regs: &PicaRegs, caps: &Capabilities, info: &mut PipelineInfo) {
    let output_merger = &regs.framebuffer.output_merger;
    let framebuffer = &regs.framebuffer.framebuffer;

    // Rasterization.
    info.rasterization.cull_mode = regs.rasterizer.cull_mode;
    info.rasterization.flip_viewport = framebuffer.flipped;

    // Blending.
    let blend = output_merger.blend_config;
    info.blending.blend_enable = output_merger.alphablend_enable;
    info.blending.color_blend_eq = blend.eq_rgb();
    info.blending.alpha_blend_eq = blend.eq_alpha();
    info.blending.src_color_factor = blend.src_rgb();
    info.blending.dst_color_factor = blend.dst_rgb();
    info.blending.src_alpha_factor = blend.src_alpha();
    info.blending.dst_alpha_factor = blend.dst_alpha();
    info.blending.logic_op = output_merger.logic_op();

    // A no-op logic op with blending disabled means "no color output".
    // Without native logic-op support that is expressed through a zero
    // write mask, which skips color while still allowing depth writes.
    let logic_op_emulated = caps.needs_logic_op_emulation && !output_merger.alphablend_enable;
    let logic_op_noop = output_merger.logic_op() == LogicOp::NoOp;
    info.blending.color_write_mask = if logic_op_emulated && logic_op_noop {
        wgpu::ColorWrites::empty()
    } else if framebuffer.allow_color_write {
        color_writes(output_merger.depth_color_mask.color_mask())
    } else {
        wgpu::ColorWrites::empty()
    };

    // Stencil: only effective when the bound depth buffer carries a
    // stencil aspect.
    let stencil = &output_merger.stencil_test;
    info.depth_stencil.stencil_test_enable = stencil.enable() && regs.framebuffer.has_stencil();
    info.depth_stencil.stencil_compare = compare_function(stencil.func());
    info.depth_stencil.stencil_fail_op = stencil_operation(stencil.action_stencil_fail());
    info.depth_stencil.stencil_pass_op = stencil_operation(stencil.action_depth_pass());
    info.depth_stencil.stencil_depth_fail_op = stencil_operation(stencil.action_depth_fail());

    // Depth: the test is considered enabled when either the compare test
    // or the depth write is on; a write-only configuration compares with
    // Always.
    let depth_mask = output_merger.depth_color_mask;
    info.depth_stencil.depth_test_enable =
        depth_mask.depth_test_enable() || depth_mask.depth_write_enable();
    info.depth_stencil.depth_compare = if depth_mask.depth_test_enable() {
        compare_function(depth_mask.depth_func())
    } else {
        wgpu::CompareFunction::Always
    };
    info.depth_stencil.depth_write_enable =
        framebuffer.allow_depth_stencil_write && depth_mask.depth_write_enable();
}

/// Capture the per-draw dynamic values alongside the descriptor.
pub fn sync_dynamic_state(regs: &PicaRegs, dynamic: &mut DynamicState) {
    let output_merger = &regs.framebuffer.output_merger;
    dynamic.blend_color = output_merger.blend_const;
    dynamic.stencil_reference = output_merger.stencil_test.reference();
    dynamic.stencil_compare_mask = output_merger.stencil_test.input_mask();
    dynamic.stencil_write_mask = if regs.framebuffer.framebuffer.allow_depth_stencil_write {
        output_merger.stencil_test.write_mask()
    } else {
        0
    };
}

// ── Tests ───────────────────────────────────────────────────────
