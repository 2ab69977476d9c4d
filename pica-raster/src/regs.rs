// PICA200 register shadow.
//
// The emulated GPU is configured through a block of memory-mapped registers.
// This module models the subset the rasterization backend reads: vertex
// attribute loaders, index arrays, the output merger (blend, logic op,
// depth/stencil), framebuffer setup, texture units, and the handful of
// pipeline registers that gate the accelerated draw path.
//
// Packed hardware words are kept as raw `u32` values with named accessor
// functions rather than overlapping bit-field structs. Reserved encodings
// decode to a safe default instead of failing.

// ── Hardware enums ──────────────────────────────────────────────

/// Element type of a vertex attribute as stored in guest memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeFormat {
    I8 = 0,
    U8 = 1,
    I16 = 2,
    #[default]
    F32 = 3,
}

impl AttributeFormat {
    pub fn from_raw(value: u32) -> Self {
        match value & 3 {
            0 => Self::I8,
            1 => Self::U8,
            2 => Self::I16,
            _ => Self::F32,
        }
    }

    /// Size in bytes of a single element, which is also its natural
    /// alignment inside an attribute loader.
    pub fn byte_size(self) -> u32 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 => 2,
            Self::F32 => 4,
        }
    }
}

/// Face culling mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CullMode {
    #[default]
    KeepAll = 0,
    KeepClockWise = 1,
    KeepCounterClockWise = 2,
}

impl CullMode {
    pub fn from_raw(value: u32) -> Self {
        match value & 3 {
            1 => Self::KeepClockWise,
            2 => Self::KeepCounterClockWise,
            _ => Self::KeepAll,
        }
    }
}

/// Primitive assembly mode for the current draw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriangleTopology {
    #[default]
    List = 0,
    Strip = 1,
    Fan = 2,
    /// Vertices are routed through the geometry stage.
    Shader = 3,
}

impl TriangleTopology {
    pub fn from_raw(value: u32) -> Self {
        match value & 3 {
            1 => Self::Strip,
            2 => Self::Fan,
            3 => Self::Shader,
            _ => Self::List,
        }
    }
}

/// Blend equation selector, shared by the color and alpha pipes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendEquation {
    #[default]
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

impl BlendEquation {
    pub fn from_raw(value: u32) -> Self {
        match value & 7 {
            1 => Self::Subtract,
            2 => Self::ReverseSubtract,
            3 => Self::Min,
            4 => Self::Max,
            _ => Self::Add,
        }
    }
}

/// Blend factor selector. The hardware distinguishes constant color and
/// constant alpha, which is why this stays a guest-level enum instead of
/// `wgpu::BlendFactor`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    #[default]
    One = 1,
    SourceColor = 2,
    OneMinusSourceColor = 3,
    DestColor = 4,
    OneMinusDestColor = 5,
    SourceAlpha = 6,
    OneMinusSourceAlpha = 7,
    DestAlpha = 8,
    OneMinusDestAlpha = 9,
    ConstantColor = 10,
    OneMinusConstantColor = 11,
    ConstantAlpha = 12,
    OneMinusConstantAlpha = 13,
    SourceAlphaSaturate = 14,
}

impl BlendFactor {
    pub fn from_raw(value: u32) -> Self {
        match value & 0xF {
            0 => Self::Zero,
            2 => Self::SourceColor,
            3 => Self::OneMinusSourceColor,
            4 => Self::DestColor,
            5 => Self::OneMinusDestColor,
            6 => Self::SourceAlpha,
            7 => Self::OneMinusSourceAlpha,
            8 => Self::DestAlpha,
            9 => Self::OneMinusDestAlpha,
            10 => Self::ConstantColor,
            11 => Self::OneMinusConstantColor,
            12 => Self::ConstantAlpha,
            13 => Self::OneMinusConstantAlpha,
            14 => Self::SourceAlphaSaturate,
            _ => Self::One,
        }
    }
}

/// Framebuffer logic operation, active when blending is disabled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogicOp {
    Clear = 0,
    And = 1,
    AndReverse = 2,
    #[default]
    Copy = 3,
    Set = 4,
    CopyInverted = 5,
    NoOp = 6,
    Invert = 7,
    Nand = 8,
    Or = 9,
    Nor = 10,
    Xor = 11,
    Equiv = 12,
    AndInverted = 13,
    OrReverse = 14,
    OrInverted = 15,
}

impl LogicOp {
    pub fn from_raw(value: u32) -> Self {
        match value & 0xF {
            0 => Self::Clear,
            1 => Self::And,
            2 => Self::AndReverse,
            4 => Self::Set,
            5 => Self::CopyInverted,
            6 => Self::NoOp,
            7 => Self::Invert,
            8 => Self::Nand,
            9 => Self::Or,
            10 => Self::Nor,
            11 => Self::Xor,
            12 => Self::Equiv,
            13 => Self::AndInverted,
            14 => Self::OrReverse,
            15 => Self::OrInverted,
            _ => Self::Copy,
        }
    }
}

/// Depth/stencil comparison function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareFunc {
    Never = 0,
    #[default]
    Always = 1,
    Equal = 2,
    NotEqual = 3,
    LessThan = 4,
    LessThanOrEqual = 5,
    GreaterThan = 6,
    GreaterThanOrEqual = 7,
}

impl CompareFunc {
    pub fn from_raw(value: u32) -> Self {
        match value & 7 {
            0 => Self::Never,
            2 => Self::Equal,
            3 => Self::NotEqual,
            4 => Self::LessThan,
            5 => Self::LessThanOrEqual,
            6 => Self::GreaterThan,
            7 => Self::GreaterThanOrEqual,
            _ => Self::Always,
        }
    }
}

/// Stencil buffer update action.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StencilAction {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    Increment = 3,
    Decrement = 4,
    Invert = 5,
    IncrementWrap = 6,
    DecrementWrap = 7,
}

impl StencilAction {
    pub fn from_raw(value: u32) -> Self {
        match value & 7 {
            1 => Self::Zero,
            2 => Self::Replace,
            3 => Self::Increment,
            4 => Self::Decrement,
            5 => Self::Invert,
            6 => Self::IncrementWrap,
            7 => Self::DecrementWrap,
            _ => Self::Keep,
        }
    }
}

/// Render target color format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorFormat {
    #[default]
    Rgba8 = 0,
    Rgb8 = 1,
    Rgb5A1 = 2,
    Rgb565 = 3,
    Rgba4 = 4,
}

/// Render target depth/stencil format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DepthFormat {
    #[default]
    D16 = 0,
    D24 = 2,
    D24S8 = 3,
}

/// Texture unit sampling type. Only unit 0 supports the cube, shadow, and
/// projection variants.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureType {
    #[default]
    Texture2D = 0,
    TextureCube = 1,
    Shadow2D = 2,
    Projection2D = 3,
    ShadowCube = 4,
    Disabled = 5,
}

impl TextureType {
    pub fn from_raw(value: u32) -> Self {
        match value & 7 {
            1 => Self::TextureCube,
            2 => Self::Shadow2D,
            3 => Self::Projection2D,
            4 => Self::ShadowCube,
            5 => Self::Disabled,
            _ => Self::Texture2D,
        }
    }
}

/// Texel formats understood by the texture units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TexFormat {
    #[default]
    Rgba8 = 0,
    Rgb8 = 1,
    Rgb5A1 = 2,
    Rgb565 = 3,
    Rgba4 = 4,
    Ia8 = 5,
    Rg8 = 6,
    I8 = 7,
    A8 = 8,
    Ia4 = 9,
    I4 = 10,
    A4 = 11,
    Etc1 = 12,
    Etc1A4 = 13,
}

/// Output-merger operating mode; `Shadow` switches the fragment stage to
/// software blending into a storage image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FragmentOperationMode {
    #[default]
    Default = 0,
    Gas = 1,
    Shadow = 3,
}

/// Cube map face, in hardware binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];
}

/// Geometry shader operating mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GsMode {
    #[default]
    Point = 0,
    VariablePrimitive = 1,
    FixedPrimitive = 2,
}

// ── Vertex attribute loaders ────────────────────────────────────

pub const NUM_LOADERS: usize = 12;
pub const MAX_ATTRIBUTES: usize = 16;

/// One of the 12 hardware attribute loaders. Each loader walks guest
/// memory at a fixed byte stride and feeds an ordered list of component
/// slots; slots 12-15 are 4/8/12/16-byte paddings.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeLoader {
    /// Byte offset of this loader's data relative to the attribute base.
    pub data_offset: u32,
    /// Component slots 0-7, 4 bits each.
    pub comp_low: u32,
    /// Component slots 8-11 (bits 0-15), byte stride (bits 16-23) and
    /// component count (bits 28-31).
    pub comp_high: u32,
}

impl AttributeLoader {
    pub fn component(&self, slot: u32) -> u32 {
        if slot < 8 {
            (self.comp_low >> (slot * 4)) & 0xF
        } else {
            (self.comp_high >> ((slot - 8) * 4)) & 0xF
        }
    }

    /// Byte stride of one vertex in this loader.
    pub fn byte_count(&self) -> u32 {
        (self.comp_high >> 16) & 0xFF
    }

    pub fn component_count(&self) -> u32 {
        self.comp_high >> 28
    }
}

/// The full vertex-attribute-loader configuration block.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeConfig {
    /// Physical base address of the vertex array data.
    pub base_address: u32,
    /// Formats of attributes 0-7, 4 bits each (2-bit type + 2-bit count).
    pub format_low: u32,
    /// Formats of attributes 8-15.
    pub format_high: u32,
    /// Bit i set: attribute i sources the per-attribute default value
    /// instead of an attribute loader.
    pub fixed_attribute_mask: u32,
    pub loaders: [AttributeLoader; NUM_LOADERS],
}

impl AttributeConfig {
    fn format_bits(&self, index: usize) -> u32 {
        if index < 8 {
            (self.format_low >> (index * 4)) & 0xF
        } else {
            (self.format_high >> ((index - 8) * 4)) & 0xF
        }
    }

    pub fn format(&self, index: usize) -> AttributeFormat {
        AttributeFormat::from_raw(self.format_bits(index))
    }

    /// Number of elements (1-4) of the attribute.
    pub fn element_count(&self, index: usize) -> u32 {
        ((self.format_bits(index) >> 2) & 3) + 1
    }

    pub fn element_size(&self, index: usize) -> u32 {
        self.format(index).byte_size()
    }

    /// Total size in bytes of one value of the attribute.
    pub fn attribute_stride(&self, index: usize) -> u32 {
        self.element_size(index) * self.element_count(index)
    }

    /// Whether the attribute is sourced from the default attribute value.
    /// Indices above the 12 loader-addressable attributes always are.
    pub fn is_default_attribute(&self, index: usize) -> bool {
        index >= 12 || (self.fixed_attribute_mask >> index) & 1 != 0
    }
}

/// Index array register: base-relative offset plus the 16-bit flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexArrayConfig {
    pub raw: u32,
}

impl IndexArrayConfig {
    pub fn offset(&self) -> u32 {
        self.raw & 0x0FFF_FFFF
    }

    /// `false` means 8-bit indices.
    pub fn is_u16(&self) -> bool {
        (self.raw >> 31) & 1 != 0
    }
}

// ── Register groups ─────────────────────────────────────────────

/// Vertex shader input mapping: which input register each attribute
/// lands in, 4 bits per attribute.
#[derive(Debug, Default, Clone, Copy)]
pub struct VertexShaderRegs {
    pub permutation_low: u32,
    pub permutation_high: u32,
}

impl VertexShaderRegs {
    pub fn input_register(&self, attribute: usize) -> usize {
        let nibble = if attribute < 8 {
            self.permutation_low >> (attribute * 4)
        } else {
            self.permutation_high >> ((attribute - 8) * 4)
        };
        (nibble & 0xF) as usize
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RasterizerRegs {
    pub cull_mode: CullMode,
}

/// GPUREG_BLEND_FUNC: equations and factors packed into one word.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlendConfig {
    pub raw: u32,
}

impl BlendConfig {
    pub fn eq_rgb(&self) -> BlendEquation {
        BlendEquation::from_raw(self.raw & 7)
    }

    pub fn eq_alpha(&self) -> BlendEquation {
        BlendEquation::from_raw((self.raw >> 8) & 7)
    }

    pub fn src_rgb(&self) -> BlendFactor {
        BlendFactor::from_raw((self.raw >> 16) & 0xF)
    }

    pub fn dst_rgb(&self) -> BlendFactor {
        BlendFactor::from_raw((self.raw >> 20) & 0xF)
    }

    pub fn src_alpha(&self) -> BlendFactor {
        BlendFactor::from_raw((self.raw >> 24) & 0xF)
    }

    pub fn dst_alpha(&self) -> BlendFactor {
        BlendFactor::from_raw((self.raw >> 28) & 0xF)
    }
}

/// GPUREG_DEPTH_COLOR_MASK: depth test, depth function, and the
/// per-channel write masks share one word.
#[derive(Debug, Default, Clone, Copy)]
pub struct DepthColorMask {
    pub raw: u32,
}

impl DepthColorMask {
    pub fn depth_test_enable(&self) -> bool {
        self.raw & 1 != 0
    }

    pub fn depth_func(&self) -> CompareFunc {
        CompareFunc::from_raw((self.raw >> 4) & 7)
    }

    /// RGBA write mask, one bit per channel starting at bit 8.
    pub fn color_mask(&self) -> u32 {
        (self.raw >> 8) & 0xF
    }

    pub fn depth_write_enable(&self) -> bool {
        (self.raw >> 12) & 1 != 0
    }
}

/// Stencil configuration: a test word and an action word.
#[derive(Debug, Default, Clone, Copy)]
pub struct StencilTest {
    pub config: u32,
    pub actions: u32,
}

impl StencilTest {
    pub fn enable(&self) -> bool {
        self.config & 1 != 0
    }

    pub fn func(&self) -> CompareFunc {
        CompareFunc::from_raw((self.config >> 4) & 7)
    }

    pub fn write_mask(&self) -> u32 {
        (self.config >> 8) & 0xFF
    }

    pub fn reference(&self) -> u32 {
        (self.config >> 16) & 0xFF
    }

    pub fn input_mask(&self) -> u32 {
        (self.config >> 24) & 0xFF
    }

    pub fn action_stencil_fail(&self) -> StencilAction {
        StencilAction::from_raw(self.actions & 7)
    }

    pub fn action_depth_fail(&self) -> StencilAction {
        StencilAction::from_raw((self.actions >> 4) & 7)
    }

    pub fn action_depth_pass(&self) -> StencilAction {
        StencilAction::from_raw((self.actions >> 8) & 7)
    }
}

/// Output merger registers.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputMerger {
    pub alphablend_enable: bool,
    pub blend_config: BlendConfig,
    /// Raw logic op selector, see [`OutputMerger::logic_op`].
    pub logic_op_raw: u32,
    pub depth_color_mask: DepthColorMask,
    pub stencil_test: StencilTest,
    /// Constant blend color, RGBA8.
    pub blend_const: u32,
    pub fragment_operation_mode: FragmentOperationMode,
}

impl OutputMerger {
    pub fn logic_op(&self) -> LogicOp {
        LogicOp::from_raw(self.logic_op_raw)
    }
}

/// Framebuffer block: attachments and global write permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramebufferBlock {
    pub color_format: ColorFormat,
    pub depth_format: DepthFormat,
    pub allow_color_write: bool,
    pub allow_depth_stencil_write: bool,
    pub color_address: u32,
    pub depth_address: u32,
    /// Render target is vertically flipped; the viewport must flip too.
    pub flipped: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FramebufferRegs {
    pub output_merger: OutputMerger,
    pub framebuffer: FramebufferBlock,
}

impl FramebufferRegs {
    pub fn is_shadow_rendering(&self) -> bool {
        self.output_merger.fragment_operation_mode == FragmentOperationMode::Shadow
    }

    pub fn has_stencil(&self) -> bool {
        self.framebuffer.depth_format == DepthFormat::D24S8
    }
}

/// One texture unit's configuration. The sampler word packs the filter
/// and wrap selectors; its interpretation belongs to the surface cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUnitConfig {
    pub enabled: bool,
    /// Only meaningful on unit 0.
    pub texture_type: TextureType,
    pub width: u32,
    pub height: u32,
    pub format: TexFormat,
    pub max_level: u32,
    pub address: u32,
    pub sampler_raw: u32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TexturingRegs {
    pub units: [TextureUnitConfig; 3],
    /// Addresses of cube faces other than +X, which reuses the unit 0
    /// texture address.
    pub cube_addresses: [u32; 5],
}

impl TexturingRegs {
    pub fn cube_physical_address(&self, face: CubeFace) -> u32 {
        match face {
            CubeFace::PositiveX => self.units[0].address,
            _ => self.cube_addresses[face as usize - 1],
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GsConfig {
    pub mode: GsMode,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRegs {
    pub vertex_attributes: AttributeConfig,
    pub index_array: IndexArrayConfig,
    pub num_vertices: u32,
    pub triangle_topology: TriangleTopology,
    pub use_gs: bool,
    pub gs_config: GsConfig,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LightingRegs {
    pub disable: bool,
}

/// The complete register shadow read by the backend. Owned by the draw
/// orchestrator and passed by reference to the components that need it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PicaRegs {
    pub pipeline: PipelineRegs,
    pub rasterizer: RasterizerRegs,
    pub framebuffer: FramebufferRegs,
    pub texturing: TexturingRegs,
    pub lighting: LightingRegs,
    pub vs: VertexShaderRegs,
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_component_slots() {
        let loader = AttributeLoader {
            data_offset: 0,
            comp_low: 0x7654_3210,
            comp_high: (3 << 28) | (20 << 16) | 0xBA98,
        };
        for slot in 0..8 {
            assert_eq!(loader.component(slot), slot);
        }
        assert_eq!(loader.component(8), 8);
        assert_eq!(loader.component(11), 0xB);
        assert_eq!(loader.byte_count(), 20);
        assert_eq!(loader.component_count(), 3);
    }

    #[test]
    fn attribute_format_decoding() {
        let config = AttributeConfig {
            // Attribute 0: f32 x3 (0b10_11), attribute 1: i16 x2 (0b01_10).
            format_low: 0b0110_1011,
            ..Default::default()
        };
        assert_eq!(config.format(0), AttributeFormat::F32);
        assert_eq!(config.element_count(0), 3);
        assert_eq!(config.attribute_stride(0), 12);
        assert_eq!(config.format(1), AttributeFormat::I16);
        assert_eq!(config.element_count(1), 2);
        assert_eq!(config.attribute_stride(1), 4);
    }

    #[test]
    fn default_attribute_mask() {
        let config = AttributeConfig {
            fixed_attribute_mask: 1 << 3,
            ..Default::default()
        };
        assert!(config.is_default_attribute(3));
        assert!(!config.is_default_attribute(2));
        // Attributes beyond the loader-addressable range are always default.
        assert!(config.is_default_attribute(12));
        assert!(config.is_default_attribute(15));
    }

    #[test]
    fn blend_config_word() {
        // eq_rgb=Add, eq_a=ReverseSubtract, src_rgb=SrcAlpha,
        // dst_rgb=OneMinusSrcAlpha, src_a=One, dst_a=Zero.
        let blend = BlendConfig {
            raw: (6 << 16) | (7 << 20) | (1 << 24) | (2 << 8),
        };
        assert_eq!(blend.eq_rgb(), BlendEquation::Add);
        assert_eq!(blend.eq_alpha(), BlendEquation::ReverseSubtract);
        assert_eq!(blend.src_rgb(), BlendFactor::SourceAlpha);
        assert_eq!(blend.dst_rgb(), BlendFactor::OneMinusSourceAlpha);
        assert_eq!(blend.src_alpha(), BlendFactor::One);
        assert_eq!(blend.dst_alpha(), BlendFactor::Zero);
    }

    #[test]
    fn depth_color_mask_word() {
        let mask = DepthColorMask {
            raw: 1 | (4 << 4) | (0xF << 8) | (1 << 12),
        };
        assert!(mask.depth_test_enable());
        assert_eq!(mask.depth_func(), CompareFunc::LessThan);
        assert_eq!(mask.color_mask(), 0xF);
        assert!(mask.depth_write_enable());
    }

    #[test]
    fn stencil_words() {
        let stencil = StencilTest {
            config: 1 | (2 << 4) | (0xFF << 8) | (0x40 << 16) | (0x0F << 24),
            actions: 2 | (3 << 4) | (6 << 8),
        };
        assert!(stencil.enable());
        assert_eq!(stencil.func(), CompareFunc::Equal);
        assert_eq!(stencil.write_mask(), 0xFF);
        assert_eq!(stencil.reference(), 0x40);
        assert_eq!(stencil.input_mask(), 0x0F);
        assert_eq!(stencil.action_stencil_fail(), StencilAction::Replace);
        assert_eq!(stencil.action_depth_fail(), StencilAction::Increment);
        assert_eq!(stencil.action_depth_pass(), StencilAction::IncrementWrap);
    }

    #[test]
    fn index_array_config() {
        let indices = IndexArrayConfig {
            raw: 0x1234 | (1 << 31),
        };
        assert_eq!(indices.offset(), 0x1234);
        assert!(indices.is_u16());
        assert!(!IndexArrayConfig { raw: 0x1234 }.is_u16());
    }

    #[test]
    fn input_register_permutation() {
        let vs = VertexShaderRegs {
            permutation_low: 0x7654_3210,
            permutation_high: 0xFEDC_BA98,
        };
        assert_eq!(vs.input_register(0), 0);
        assert_eq!(vs.input_register(7), 7);
        assert_eq!(vs.input_register(8), 8);
        assert_eq!(vs.input_register(15), 15);
    }

    #[test]
    fn cube_face_addresses() {
        let mut texturing = TexturingRegs::default();
        texturing.units[0].address = 0x1800_0000;
        texturing.cube_addresses = [1, 2, 3, 4, 5];
        assert_eq!(texturing.cube_physical_address(CubeFace::PositiveX), 0x1800_0000);
        assert_eq!(texturing.cube_physical_address(CubeFace::NegativeX), 1);
        assert_eq!(texturing.cube_physical_address(CubeFace::NegativeZ), 5);
    }

    #[test]
    fn enum_raw_fallbacks() {
        assert_eq!(BlendFactor::from_raw(15), BlendFactor::One);
        assert_eq!(BlendEquation::from_raw(7), BlendEquation::Add);
        assert_eq!(TextureType::from_raw(7), TextureType::Texture2D);
    }
}
