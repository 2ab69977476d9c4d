// Vertex assembly.
//
// The guest describes vertex data through up to 12 attribute loaders,
// each an independent interleaved stream in guest memory. This module
// decodes the loaders into a native vertex layout, copies the touched
// index range into the streaming ring (re-packing per vertex when the
// device demands a larger stride alignment), and fills one extra "fixed"
// binding with the default values of every shader input the loaders did
// not cover.

use log::{error, warn};

use crate::external::{Command, GuestMemory, Scheduler, SurfaceCache};
use crate::regs::{AttributeFormat, PicaRegs, MAX_ATTRIBUTES};
use crate::stream_buffer::{align_up, StreamBuffer};

pub const MAX_VERTEX_BINDINGS: usize = 16;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

// ── Layout types ────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u8,
    /// Binding holds constant per-draw values rather than per-vertex data.
    pub fixed: bool,
    pub stride: u16,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub binding: u8,
    pub location: u8,
    pub offset: u16,
    pub format: AttributeFormat,
    /// Element count, 1-4.
    pub size: u8,
}

/// The native vertex layout for one draw. Part of the pipeline
/// descriptor, so equality and hashing must be structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub binding_count: u8,
    pub attribute_count: u8,
    pub bindings: [VertexBinding; MAX_VERTEX_BINDINGS],
    pub attributes: [VertexAttribute; MAX_VERTEX_ATTRIBUTES],
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self {
            binding_count: 0,
            attribute_count: 0,
            bindings: [VertexBinding::default(); MAX_VERTEX_BINDINGS],
            attributes: [VertexAttribute::default(); MAX_VERTEX_ATTRIBUTES],
        }
    }
}

/// Output vertex of the software (CPU-transformed) shader pipeline.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SoftwareVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub tex0: [f32; 2],
    pub tex1: [f32; 2],
    pub tex2: [f32; 2],
    pub tex0_w: f32,
    pub normquat: [f32; 4],
    pub view: [f32; 3],
}

/// The fixed layout used by every non-accelerated draw: one binding of
/// [`SoftwareVertex`] with eight float attributes.
pub fn software_vertex_layout() -> VertexLayout {
    const SIZES: [u8; 8] = [4, 4, 2, 2, 2, 1, 4, 3];

    let mut layout = VertexLayout {
        binding_count: 1,
        attribute_count: 8,
        ..Default::default()
    };
    layout.bindings[0] = VertexBinding {
        binding: 0,
        fixed: false,
        stride: std::mem::size_of::<SoftwareVertex>() as u16,
    };

    let mut offset = 0u16;
    for (i, &size) in SIZES.iter().enumerate() {
        layout.attributes[i] = VertexAttribute {
            binding: 0,
            location: i as u8,
            offset,
            format: AttributeFormat::F32,
            size,
        };
        offset += size as u16 * 4;
    }
    layout
}

// ── Draw analysis ───────────────────────────────────────────────

/// Index range and upload size of the current draw, computed before any
/// other draw state is touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VertexArrayInfo {
    pub index_min: u32,
    pub index_max: u32,
    pub upload_size: u32,
}

/// Scan the index buffer (or take the full array range) to find the
/// contiguous vertex range `[min, max]` the draw touches, and the total
/// ring-buffer space its loaders will need at `stride_align`.
pub fn analyze_vertex_array(
    regs: &PicaRegs,
    memory: &dyn GuestMemory,
    res_cache: &mut dyn SurfaceCache,
    is_indexed: bool,
    stride_align: u32,
) -> VertexArrayInfo {
    let attributes = &regs.pipeline.vertex_attributes;
    let num_vertices = regs.pipeline.num_vertices;

    let (index_min, index_max) = if is_indexed {
        let index_array = &regs.pipeline.index_array;
        let index_size = if index_array.is_u16() { 2 } else { 1 };
        let address = attributes.base_address + index_array.offset();
        let byte_count = num_vertices * index_size;

        // Recent guest writes to the index data must be visible.
        res_cache.flush_region(address, byte_count);

        let data = memory.physical_ref(address);
        let available = (data.len() as u32 / index_size).min(num_vertices);
        if available < num_vertices {
            error!(
                "Index buffer for {} vertices exceeds available space at {:#010X}",
                num_vertices, address
            );
        }

        let mut min = u32::MAX;
        let mut max = 0u32;
        for i in 0..available as usize {
            let index = if index_array.is_u16() {
                u16::from_le_bytes([data[i * 2], data[i * 2 + 1]]) as u32
            } else {
                data[i] as u32
            };
            min = min.min(index);
            max = max.max(index);
        }
        if min == u32::MAX {
            (0, 0)
        } else {
            (min, max)
        }
    } else {
        (0, num_vertices.saturating_sub(1))
    };

    let vertex_num = index_max - index_min + 1;
    let mut upload_size = 0u32;
    for loader in &attributes.loaders {
        if loader.component_count() == 0 || loader.byte_count() == 0 {
            continue;
        }
        let aligned_stride = align_up(loader.byte_count() as usize, stride_align as usize) as u32;
        upload_size += align_up((aligned_stride * vertex_num) as usize, 4) as u32;
    }

    VertexArrayInfo {
        index_min,
        index_max,
        upload_size,
    }
}

// ── Vertex array setup ──────────────────────────────────────────

/// The decoded vertex layout plus the ring offsets each binding was
/// uploaded at.
#[derive(Debug, Clone, Copy)]
pub struct AssembledVertexData {
    pub layout: VertexLayout,
    pub binding_offsets: [u64; MAX_VERTEX_BINDINGS],
}

/// Decode the attribute loaders, upload the touched vertex range into
/// the streaming ring, and append the fixed/default binding.
///
/// Out-of-range guest reads are a guest program error: they are logged,
/// the copy is clamped, and the draw proceeds with best-effort data.
pub fn setup_vertex_array(
    regs: &PicaRegs,
    default_attributes: &[[f32; 4]; MAX_ATTRIBUTES],
    memory: &dyn GuestMemory,
    res_cache: &mut dyn SurfaceCache,
    stream: &mut StreamBuffer,
    info: &VertexArrayInfo,
    stride_align: u32,
) -> AssembledVertexData {
    let attributes = &regs.pipeline.vertex_attributes;
    let base_address = attributes.base_address;
    let vertex_num = info.index_max - info.index_min + 1;

    let mut layout = VertexLayout {
        binding_count: 0,
        attribute_count: MAX_VERTEX_ATTRIBUTES as u8,
        ..Default::default()
    };
    let mut binding_offsets = [0u64; MAX_VERTEX_BINDINGS];
    let mut enabled = [false; MAX_VERTEX_ATTRIBUTES];

    // Flush the loader regions first so the mapped ring region does not
    // have to live across cache calls.
    for loader in &attributes.loaders {
        if loader.component_count() == 0 || loader.byte_count() == 0 {
            continue;
        }
        let data_addr = base_address + loader.data_offset + info.index_min * loader.byte_count();
        res_cache.flush_region(data_addr, loader.byte_count() * vertex_num);
    }

    let (array_ptr, array_offset, _) = stream.map(info.upload_size as usize, 16);

    let mut buffer_offset = 0usize;
    for loader in &attributes.loaders {
        if loader.component_count() == 0 || loader.byte_count() == 0 {
            continue;
        }

        // Walk the component slots to find which attributes this loader
        // provides and at what offsets.
        let mut offset = 0u32;
        for comp in 0..loader.component_count().min(12) {
            let attribute_index = loader.component(comp) as usize;
            if attribute_index >= 12 {
                // Slots 12-15 are 4/8/12/16-byte paddings.
                offset = align_up(offset as usize, 4) as u32;
                offset += (attribute_index as u32 - 11) * 4;
                continue;
            }

            offset = align_up(offset as usize, attributes.element_size(attribute_index) as usize)
                as u32;

            let input_reg = regs.vs.input_register(attribute_index);
            layout.attributes[input_reg] = VertexAttribute {
                binding: layout.binding_count,
                location: input_reg as u8,
                offset: offset as u16,
                format: attributes.format(attribute_index),
                size: attributes.element_count(attribute_index) as u8,
            };
            enabled[input_reg] = true;
            offset += attributes.attribute_stride(attribute_index);
        }

        let data_addr = base_address + loader.data_offset + info.index_min * loader.byte_count();
        let data_size = loader.byte_count() * vertex_num;

        let src = memory.physical_ref(data_addr);
        if (src.len() as u32) < data_size {
            error!(
                "Vertex buffer size {} exceeds available space {} at address {:#010X}",
                data_size,
                src.len(),
                data_addr
            );
        }

        let dst = &mut array_ptr[buffer_offset..];
        let aligned_stride = align_up(loader.byte_count() as usize, stride_align as usize);
        if aligned_stride == loader.byte_count() as usize {
            let copy_len = (data_size as usize).min(src.len());
            dst[..copy_len].copy_from_slice(&src[..copy_len]);
        } else {
            // The device's stride alignment exceeds the guest stride:
            // every vertex must be re-packed individually.
            let guest_stride = loader.byte_count() as usize;
            for vertex in 0..vertex_num as usize {
                let src_start = vertex * guest_stride;
                if src_start >= src.len() {
                    break;
                }
                let copy_len = guest_stride.min(src.len() - src_start);
                dst[vertex * aligned_stride..vertex * aligned_stride + copy_len]
                    .copy_from_slice(&src[src_start..src_start + copy_len]);
            }
        }

        layout.bindings[layout.binding_count as usize] = VertexBinding {
            binding: layout.binding_count,
            fixed: false,
            stride: aligned_stride as u16,
        };
        binding_offsets[layout.binding_count as usize] = array_offset + buffer_offset as u64;
        layout.binding_count += 1;
        buffer_offset += align_up(aligned_stride * vertex_num as usize, 4);
    }

    stream.commit(buffer_offset);

    setup_fixed_attribs(
        regs,
        default_attributes,
        stream,
        &mut layout,
        &mut binding_offsets,
        &mut enabled,
    );

    AssembledVertexData {
        layout,
        binding_offsets,
    }
}

/// Assign every shader input the loaders did not resolve to one shared
/// "fixed" binding: guest-supplied default values for attributes marked
/// default, the constant (0, 0, 0, 1) for merely disabled ones.
fn setup_fixed_attribs(
    regs: &PicaRegs,
    default_attributes: &[[f32; 4]; MAX_ATTRIBUTES],
    stream: &mut StreamBuffer,
    layout: &mut VertexLayout,
    binding_offsets: &mut [u64; MAX_VERTEX_BINDINGS],
    enabled: &mut [bool; MAX_VERTEX_ATTRIBUTES],
) {
    const VEC4_SIZE: usize = 16;

    let attributes = &regs.pipeline.vertex_attributes;
    let (fixed_ptr, fixed_offset, _) = stream.map(MAX_VERTEX_ATTRIBUTES * VEC4_SIZE, 4);
    binding_offsets[layout.binding_count as usize] = fixed_offset;

    // The disabled-attribute constant sits at offset zero.
    const DEFAULT_ATTRIB: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
    fixed_ptr[..VEC4_SIZE].copy_from_slice(bytemuck::cast_slice(&DEFAULT_ATTRIB));

    let mut offset = VEC4_SIZE;
    for i in 0..MAX_VERTEX_ATTRIBUTES {
        if !attributes.is_default_attribute(i) {
            continue;
        }
        let reg = regs.vs.input_register(i);
        if enabled[reg] {
            continue;
        }

        fixed_ptr[offset..offset + VEC4_SIZE]
            .copy_from_slice(bytemuck::cast_slice(&default_attributes[i]));
        layout.attributes[reg] = VertexAttribute {
            binding: layout.binding_count,
            location: reg as u8,
            offset: offset as u16,
            format: AttributeFormat::F32,
            size: 4,
        };
        offset += VEC4_SIZE;
        enabled[reg] = true;
    }

    // Anything still unresolved is disabled: point it at the constant so
    // the shader reads well-defined data if it ever uses the input.
    for i in 0..MAX_VERTEX_ATTRIBUTES {
        if !enabled[i] {
            layout.attributes[i] = VertexAttribute {
                binding: layout.binding_count,
                location: i as u8,
                offset: 0,
                format: AttributeFormat::F32,
                size: 4,
            };
        }
    }

    layout.bindings[layout.binding_count as usize] = VertexBinding {
        binding: layout.binding_count,
        fixed: true,
        stride: offset as u16,
    };
    layout.binding_count += 1;

    stream.commit(offset);
}

// ── Index array setup ───────────────────────────────────────────

/// Upload the index data for an indexed draw and record the bind.
///
/// wgpu has no 8-bit index type, so 8-bit guest indices always widen to
/// 16 bits.
pub fn setup_index_array(
    regs: &PicaRegs,
    memory: &dyn GuestMemory,
    stream: &mut StreamBuffer,
    scheduler: &mut dyn Scheduler,
) {
    let index_array = &regs.pipeline.index_array;
    let num_vertices = regs.pipeline.num_vertices;
    let address = regs.pipeline.vertex_attributes.base_address + index_array.offset();

    let src = memory.physical_ref(address);
    let buffer_size = (num_vertices * 2) as usize;
    let (index_ptr, index_offset, _) = stream.map(buffer_size, 2);

    if index_array.is_u16() {
        let copy_len = buffer_size.min(src.len() & !1);
        if copy_len < buffer_size {
            warn!("Index array truncated at {:#010X}", address);
        }
        index_ptr[..copy_len].copy_from_slice(&src[..copy_len]);
    } else {
        let available = (num_vertices as usize).min(src.len());
        if available < num_vertices as usize {
            warn!("Index array truncated at {:#010X}", address);
        }
        for (i, &index) in src.iter().take(available).enumerate() {
            index_ptr[i * 2..i * 2 + 2].copy_from_slice(&(index as u16).to_le_bytes());
        }
    }

    stream.commit(buffer_size);
    scheduler.record(Command::BindIndexBuffer {
        offset: index_offset,
        format: wgpu::IndexFormat::Uint16,
    });
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockMemory, MockScheduler, MockSurfaceCache};

    fn loader_regs(stride: u32, components: &[u32]) -> PicaRegs {
        let mut regs = PicaRegs::default();
        let loader = &mut regs.pipeline.vertex_attributes.loaders[0];
        for (slot, &comp) in components.iter().enumerate() {
            if slot < 8 {
                loader.comp_low |= comp << (slot * 4);
            } else {
                loader.comp_high |= comp << ((slot - 8) * 4);
            }
        }
        loader.comp_high |= (stride << 16) | ((components.len() as u32) << 28);
        regs
    }

    #[test]
    fn single_float3_loader() {
        // Loader with stride 12, one 3-component float attribute,
        // 4 indexed vertices covering the range [2, 5].
        let mut regs = loader_regs(12, &[0]);
        regs.pipeline.vertex_attributes.format_low = 0b1011; // f32 x3
        regs.pipeline.num_vertices = 4;
        regs.pipeline.index_array.raw = 0x100;

        let mut memory = MockMemory::new(0, 0x200);
        memory.write(0x100, &[2u8, 5, 3, 4]);
        let vertex_bytes: Vec<u8> = (0..96).map(|i| i as u8).collect();
        memory.write(0, &vertex_bytes);

        let mut cache = MockSurfaceCache::new();
        let info = analyze_vertex_array(&regs, &memory, &mut cache, true, 1);
        assert_eq!(info.index_min, 2);
        assert_eq!(info.index_max, 5);
        assert_eq!(info.upload_size, 48);

        let mut stream = StreamBuffer::new(4096);
        let defaults = [[0.0; 4]; MAX_ATTRIBUTES];
        let data = setup_vertex_array(
            &regs, &defaults, &memory, &mut cache, &mut stream, &info, 1,
        );

        // One loader binding plus the fixed binding.
        assert_eq!(data.layout.binding_count, 2);
        assert_eq!(data.layout.bindings[0].stride, 12);
        assert!(!data.layout.bindings[0].fixed);
        assert!(data.layout.bindings[1].fixed);

        let attr = data.layout.attributes[0];
        assert_eq!(attr.binding, 0);
        assert_eq!(attr.location, 0);
        assert_eq!(attr.offset, 0);
        assert_eq!(attr.format, AttributeFormat::F32);
        assert_eq!(attr.size, 3);

        // 48 bytes read starting at base + data_offset + 2 * 12.
        assert_eq!(&stream.contents()[..48], &vertex_bytes[24..72]);
    }

    #[test]
    fn padding_slots_advance_offset() {
        // Components: attribute 0 (f32 x1), 8-byte padding (slot 13),
        // attribute 1 (f32 x1).
        let mut regs = loader_regs(16, &[0, 13, 1]);
        regs.pipeline.vertex_attributes.format_low = 0b0011_0011; // both f32 x1
        regs.pipeline.num_vertices = 1;
        // Identity permutation maps attribute i to input register i.
        regs.vs.permutation_low = 0x7654_3210;

        let memory = MockMemory::new(0, 0x100);
        let mut cache = MockSurfaceCache::new();
        let info = analyze_vertex_array(&regs, &memory, &mut cache, false, 1);
        let mut stream = StreamBuffer::new(4096);
        let defaults = [[0.0; 4]; MAX_ATTRIBUTES];
        let data = setup_vertex_array(
            &regs, &defaults, &memory, &mut cache, &mut stream, &info, 1,
        );

        assert_eq!(data.layout.attributes[0].offset, 0);
        // 4 bytes of attribute 0, aligned to 4, plus 8 bytes of padding.
        assert_eq!(data.layout.attributes[1].offset, 12);
    }

    #[test]
    fn stride_repack_preserves_vertex_bytes() {
        let mut regs = loader_regs(6, &[0]);
        regs.pipeline.vertex_attributes.format_low = 0b0110; // i16 x2
        regs.pipeline.num_vertices = 3;

        let mut memory = MockMemory::new(0, 0x100);
        let vertex_bytes: Vec<u8> = (0..18).map(|i| i as u8 + 1).collect();
        memory.write(0, &vertex_bytes);

        let mut cache = MockSurfaceCache::new();
        // Stride alignment of 8 forces a per-vertex re-pack of the
        // 6-byte guest stride.
        let info = analyze_vertex_array(&regs, &memory, &mut cache, false, 8);
        let mut stream = StreamBuffer::new(4096);
        let defaults = [[0.0; 4]; MAX_ATTRIBUTES];
        let data = setup_vertex_array(
            &regs, &defaults, &memory, &mut cache, &mut stream, &info, 8,
        );

        assert_eq!(data.layout.bindings[0].stride, 8);
        for vertex in 0..3 {
            assert_eq!(
                &stream.contents()[vertex * 8..vertex * 8 + 6],
                &vertex_bytes[vertex * 6..vertex * 6 + 6],
            );
        }
    }

    #[test]
    fn unresolved_attributes_fall_back() {
        // No loaders at all: every input register must still resolve.
        let mut regs = PicaRegs::default();
        regs.pipeline.num_vertices = 3;
        // Attribute 2 is a guest default with a custom value.
        regs.pipeline.vertex_attributes.fixed_attribute_mask = 1 << 2;
        regs.vs.permutation_low = 0x7654_3210;
        regs.vs.permutation_high = 0xFEDC_BA98;

        let mut defaults = [[0.0; 4]; MAX_ATTRIBUTES];
        defaults[2] = [0.25, 0.5, 0.75, 1.0];

        let memory = MockMemory::new(0, 0x10);
        let mut cache = MockSurfaceCache::new();
        let info = analyze_vertex_array(&regs, &memory, &mut cache, false, 1);
        let mut stream = StreamBuffer::new(4096);
        let data = setup_vertex_array(
            &regs, &defaults, &memory, &mut cache, &mut stream, &info, 1,
        );

        assert_eq!(data.layout.binding_count, 1);
        let fixed = data.layout.bindings[0];
        assert!(fixed.fixed);

        // Attribute 2 reads the guest default after the leading constant.
        let attr2 = data.layout.attributes[2];
        assert_eq!(attr2.offset, 16);
        let stored: &[f32] = bytemuck::cast_slice(&stream.contents()[16..32]);
        assert_eq!(stored, &defaults[2]);

        // Registers 0-11 (minus the default) point at the (0, 0, 0, 1)
        // constant; 12-15 are always default-sourced and get own slots.
        for i in 0..12 {
            if i == 2 {
                continue;
            }
            let attr = data.layout.attributes[i];
            assert_eq!(attr.offset, 0);
            assert_eq!(attr.size, 4);
            assert_eq!(attr.format, AttributeFormat::F32);
        }
        for i in 12..MAX_VERTEX_ATTRIBUTES {
            assert_ne!(data.layout.attributes[i].offset, 0);
        }
        // Leading constant + attr 2 + attrs 12-15.
        assert_eq!(fixed.stride, 96);
        let constant: &[f32] = bytemuck::cast_slice(&stream.contents()[..16]);
        assert_eq!(constant, &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn out_of_range_vertex_data_is_clamped() {
        let mut regs = loader_regs(12, &[0]);
        regs.pipeline.vertex_attributes.format_low = 0b1011;
        regs.pipeline.num_vertices = 8;

        // Only 24 bytes of guest memory behind the loader.
        let memory = MockMemory::new(0, 24);
        let mut cache = MockSurfaceCache::new();
        let info = analyze_vertex_array(&regs, &memory, &mut cache, false, 1);
        let mut stream = StreamBuffer::new(4096);
        let defaults = [[0.0; 4]; MAX_ATTRIBUTES];
        // Must not panic; the short read is logged and clamped.
        let data = setup_vertex_array(
            &regs, &defaults, &memory, &mut cache, &mut stream, &info, 1,
        );
        assert_eq!(data.layout.binding_count, 2);
    }

    #[test]
    fn software_layout_shape() {
        let layout = software_vertex_layout();
        assert_eq!(layout.binding_count, 1);
        assert_eq!(layout.attribute_count, 8);
        assert_eq!(
            layout.bindings[0].stride as usize,
            std::mem::size_of::<SoftwareVertex>()
        );
        // 22 floats per vertex.
        assert_eq!(std::mem::size_of::<SoftwareVertex>(), 88);
        assert_eq!(layout.attributes[7].offset, (4 + 4 + 2 + 2 + 2 + 1 + 4) * 4);
    }

    #[test]
    fn index_widening_to_u16() {
        let mut regs = PicaRegs::default();
        regs.pipeline.num_vertices = 3;
        regs.pipeline.index_array.raw = 0x40; // u8 indices at offset 0x40

        let mut memory = MockMemory::new(0, 0x100);
        memory.write(0x40, &[7u8, 1, 250]);

        let mut stream = StreamBuffer::new(256);
        let mut scheduler = MockScheduler::new();
        setup_index_array(&regs, &memory, &mut stream, &mut scheduler);

        let widened: &[u16] = bytemuck::cast_slice(&stream.contents()[..6]);
        assert_eq!(widened, &[7, 1, 250]);
        assert_eq!(
            scheduler.commands,
            vec![Command::BindIndexBuffer {
                offset: 0,
                format: wgpu::IndexFormat::Uint16,
            }]
        );
    }
}
