//! Stateless decoders turning lump bytes into normalized records. Layout
//! selection is driven entirely by the resolved `MapFormat`/`GlVersions`;
//! nothing here re-inspects magic markers per record.

use crate::archive::LumpReader;
use crate::bsp::{BspNode, Child};
use crate::errors::Result;
use crate::formats::MapFormat;
use crate::types::{
    Bounds, GlNodeWide, GlSeg, GlSegNarrow, GlSegWide, GlSubsectorWide, GlVertexWide, HexenLinedef,
    HexenThing, Linedef, Seg, Subsector, Thing, VertexRef, WadCoord, WadLinedef, WadNode, WadSeg,
    WadSubsector, WadThing, WadVertex, NO_INDEX,
};
use math::{Line2f, Pnt2f, Vec2f};

/// Fixed-point scale of version 2 GL vertices (16.16).
const GL_VERT_V2_SCALE: f32 = 65536.0;

/// Fixed-point scale of version 3+ GL vertices. Dividing by 0xFFFF instead
/// of 0x10000 is a format-family quirk, not a typo.
const GL_VERT_V3_SCALE: f32 = 65535.0;

const GL_SEG_NARROW_GL_BIT: u16 = 1 << 15;
const GL_SEG_V3_GL_BIT: u32 = 1 << 30;
const GL_SEG_V5_GL_BIT: u32 = 1 << 31;

const CHILD_NARROW_LEAF_BIT: u16 = 1 << 15;
const CHILD_WIDE_LEAF_BIT: u32 = 1 << 31;

pub fn things(lump: LumpReader, format: MapFormat) -> Result<Vec<Thing>> {
    Ok(match format {
        MapFormat::Doom => lump
            .decode_vec::<WadThing>()?
            .into_iter()
            .map(Thing::Doom)
            .collect(),
        MapFormat::Hexen => lump
            .decode_vec::<HexenThing>()?
            .into_iter()
            .map(Thing::Hexen)
            .collect(),
    })
}

pub fn linedefs(lump: LumpReader, format: MapFormat) -> Result<Vec<Linedef>> {
    Ok(match format {
        MapFormat::Doom => lump
            .decode_vec::<WadLinedef>()?
            .into_iter()
            .map(Linedef::Doom)
            .collect(),
        MapFormat::Hexen => lump
            .decode_vec::<HexenLinedef>()?
            .into_iter()
            .map(Linedef::Hexen)
            .collect(),
    })
}

pub fn vertices(lump: LumpReader) -> Result<Vec<Pnt2f>> {
    Ok(lump
        .decode_vec::<WadVertex>()?
        .into_iter()
        .map(|vertex| Pnt2f::new(f32::from(vertex.x), f32::from(vertex.y)))
        .collect())
}

pub fn segs(lump: LumpReader) -> Result<Vec<Seg>> {
    Ok(lump
        .decode_vec::<WadSeg>()?
        .into_iter()
        .map(|seg| Seg {
            start_vertex: seg.start_vertex,
            end_vertex: seg.end_vertex,
            angle: seg.angle,
            linedef: optional_index(seg.linedef),
            direction: seg.direction,
            offset: seg.offset,
        })
        .collect())
}

pub fn subsectors(lump: LumpReader) -> Result<Vec<Subsector>> {
    Ok(lump
        .decode_vec::<WadSubsector>()?
        .into_iter()
        .map(|subsector| Subsector {
            first_seg: u32::from(subsector.first_seg),
            num_segs: u32::from(subsector.num_segs),
        })
        .collect())
}

pub fn gl_vertices(lump: LumpReader, version: u8) -> Result<Vec<Pnt2f>> {
    if version < 2 {
        return vertices(lump);
    }
    // Versions 2 and up always carry the 4-byte magic header.
    let scale = if version < 3 {
        GL_VERT_V2_SCALE
    } else {
        GL_VERT_V3_SCALE
    };
    Ok(lump
        .decode_vec_from::<GlVertexWide>(4)?
        .into_iter()
        .map(|vertex| Pnt2f::new(vertex.x as f32 / scale, vertex.y as f32 / scale))
        .collect())
}

pub fn gl_segs(lump: LumpReader, version: u8) -> Result<Vec<GlSeg>> {
    if version < 3 {
        return Ok(lump
            .decode_vec::<GlSegNarrow>()?
            .into_iter()
            .map(|seg| GlSeg {
                start_vertex: narrow_vertex_ref(seg.start_vertex),
                end_vertex: narrow_vertex_ref(seg.end_vertex),
                linedef: optional_index(seg.linedef),
                side: seg.side,
                partner: u32::from(seg.partner),
            })
            .collect());
    }

    // v3/v4 carry a 4-byte header, v5 drops it and moves the GL-vertex flag
    // up to bit 31.
    let (skip, gl_bit) = if version < 5 {
        (4, GL_SEG_V3_GL_BIT)
    } else {
        (0, GL_SEG_V5_GL_BIT)
    };
    Ok(lump
        .decode_vec_from::<GlSegWide>(skip)?
        .into_iter()
        .map(|seg| GlSeg {
            start_vertex: wide_vertex_ref(seg.start_vertex, gl_bit),
            end_vertex: wide_vertex_ref(seg.end_vertex, gl_bit),
            linedef: optional_index(seg.linedef),
            side: seg.side,
            partner: seg.partner,
        })
        .collect())
}

pub fn gl_subsectors(lump: LumpReader, version: u8) -> Result<Vec<Subsector>> {
    if version < 3 {
        return subsectors(lump);
    }
    let skip = if version < 5 { 4 } else { 0 };
    Ok(lump
        .decode_vec_from::<GlSubsectorWide>(skip)?
        .into_iter()
        .map(|subsector| Subsector {
            first_seg: subsector.first_seg,
            num_segs: subsector.num_segs,
        })
        .collect())
}

pub fn nodes(lump: LumpReader) -> Result<Vec<BspNode>> {
    Ok(lump
        .decode_vec::<WadNode>()?
        .into_iter()
        .map(narrow_node)
        .collect())
}

pub fn gl_nodes(lump: LumpReader, version: u8) -> Result<Vec<BspNode>> {
    if version < 5 {
        return nodes(lump);
    }
    Ok(lump
        .decode_vec::<GlNodeWide>()?
        .into_iter()
        .map(|node| BspNode {
            partition: partition_line(node.line_x, node.line_y, node.step_x, node.step_y),
            right_bounds: coord_bounds(
                node.right_x_min,
                node.right_y_min,
                node.right_x_max,
                node.right_y_max,
            ),
            left_bounds: coord_bounds(
                node.left_x_min,
                node.left_y_min,
                node.left_x_max,
                node.left_y_max,
            ),
            right: wide_child(node.right),
            left: wide_child(node.left),
        })
        .collect())
}

fn optional_index(index: u16) -> Option<u16> {
    if index == NO_INDEX {
        None
    } else {
        Some(index)
    }
}

fn narrow_vertex_ref(id: u16) -> VertexRef {
    if id & GL_SEG_NARROW_GL_BIT != 0 {
        VertexRef::Gl(u32::from(id & !GL_SEG_NARROW_GL_BIT))
    } else {
        VertexRef::Base(u32::from(id))
    }
}

fn wide_vertex_ref(id: u32, gl_bit: u32) -> VertexRef {
    if id & gl_bit != 0 {
        VertexRef::Gl(id & !gl_bit)
    } else {
        VertexRef::Base(id)
    }
}

fn narrow_child(id: u16) -> Child {
    if id & CHILD_NARROW_LEAF_BIT != 0 {
        Child::Leaf((id & !CHILD_NARROW_LEAF_BIT) as usize)
    } else {
        Child::Branch(id as usize)
    }
}

fn wide_child(id: u32) -> Child {
    if id & CHILD_WIDE_LEAF_BIT != 0 {
        Child::Leaf((id & !CHILD_WIDE_LEAF_BIT) as usize)
    } else {
        Child::Branch(id as usize)
    }
}

fn narrow_node(node: WadNode) -> BspNode {
    BspNode {
        partition: partition_line(node.line_x, node.line_y, node.step_x, node.step_y),
        right_bounds: coord_bounds(
            node.right_x_min,
            node.right_y_min,
            node.right_x_max,
            node.right_y_max,
        ),
        left_bounds: coord_bounds(
            node.left_x_min,
            node.left_y_min,
            node.left_x_max,
            node.left_y_max,
        ),
        right: narrow_child(node.right),
        left: narrow_child(node.left),
    }
}

fn partition_line(x: WadCoord, y: WadCoord, dx: WadCoord, dy: WadCoord) -> Line2f {
    Line2f::from_origin_and_displace(
        Pnt2f::new(f32::from(x), f32::from(y)),
        Vec2f::new(f32::from(dx), f32::from(dy)),
    )
}

fn coord_bounds(x_min: WadCoord, y_min: WadCoord, x_max: WadCoord, y_max: WadCoord) -> Bounds {
    Bounds {
        min: Pnt2f::new(f32::from(x_min), f32::from(y_min)),
        max: Pnt2f::new(f32::from(x_max), f32::from(y_max)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::archive::test::WadBuilder;
    use crate::archive::Archive;
    use crate::formats::GlVersions;

    fn archive_with(name: &'static str, bytes: Vec<u8>) -> Archive {
        Archive::from_bytes(WadBuilder::iwad().lump(name, bytes).build()).unwrap()
    }

    #[test]
    fn gl_vertices_v1_are_raw_shorts() {
        let mut lump = Vec::new();
        for &(x, y) in &[(64i16, -64i16), (-1, 1)] {
            lump.extend_from_slice(&x.to_le_bytes());
            lump.extend_from_slice(&y.to_le_bytes());
        }
        let archive = archive_with("GL_VERT", lump);
        let reader = archive.required_named_lump("GL_VERT").unwrap();
        let versions = GlVersions::resolve(Some(reader.bytes()), None, None, None);
        assert_eq!(versions.vertices, 1);
        let decoded = gl_vertices(reader, versions.vertices).unwrap();
        assert_eq!(decoded[0], Pnt2f::new(64.0, -64.0));
        assert_eq!(decoded[1], Pnt2f::new(-1.0, 1.0));
    }

    #[test]
    fn gl_vertices_v2_use_16_16_fixed_point() {
        let mut lump = b"gNd2".to_vec();
        // (2.5, -1.0) in 16.16 fixed point.
        lump.extend_from_slice(&(0x0002_8000i32).to_le_bytes());
        lump.extend_from_slice(&(-0x0001_0000i32).to_le_bytes());
        let archive = archive_with("GL_VERT", lump);
        let reader = archive.required_named_lump("GL_VERT").unwrap();
        let versions = GlVersions::resolve(Some(reader.bytes()), None, None, None);
        assert_eq!(versions.vertices, 2);
        let decoded = gl_vertices(reader, versions.vertices).unwrap();
        assert_eq!(decoded, vec![Pnt2f::new(2.5, -1.0)]);
    }

    #[test]
    fn gl_vertices_v3_divide_by_0xffff() {
        let mut lump = b"gNd3".to_vec();
        lump.extend_from_slice(&(0xFFFFi32).to_le_bytes());
        lump.extend_from_slice(&(-2 * 0xFFFFi32).to_le_bytes());
        let archive = archive_with("GL_VERT", lump);
        let reader = archive.required_named_lump("GL_VERT").unwrap();
        let decoded = gl_vertices(reader, 3).unwrap();
        assert_eq!(decoded, vec![Pnt2f::new(1.0, -2.0)]);
    }

    #[test]
    fn gl_segs_v1_flag_gl_vertices_on_bit_15() {
        let mut lump = Vec::new();
        for &short in &[0x8003u16, 0x0002, 0xFFFF, 1, 7] {
            lump.extend_from_slice(&short.to_le_bytes());
        }
        let archive = archive_with("GL_SEGS", lump);
        let reader = archive.required_named_lump("GL_SEGS").unwrap();
        let decoded = gl_segs(reader, 1).unwrap();
        assert_eq!(
            decoded,
            vec![GlSeg {
                start_vertex: VertexRef::Gl(3),
                end_vertex: VertexRef::Base(2),
                linedef: None,
                side: 1,
                partner: 7,
            }]
        );
    }

    #[test]
    fn gl_segs_v3_skip_header_and_flag_bit_30() {
        let mut lump = b"gNd3".to_vec();
        lump.extend_from_slice(&(0x4000_0005u32).to_le_bytes());
        lump.extend_from_slice(&(6u32).to_le_bytes());
        lump.extend_from_slice(&(9u16).to_le_bytes());
        lump.extend_from_slice(&(0u16).to_le_bytes());
        lump.extend_from_slice(&(0xFFFF_FFFFu32).to_le_bytes());
        let archive = archive_with("GL_SEGS", lump);
        let reader = archive.required_named_lump("GL_SEGS").unwrap();
        let decoded = gl_segs(reader, 3).unwrap();
        assert_eq!(decoded[0].start_vertex, VertexRef::Gl(5));
        assert_eq!(decoded[0].end_vertex, VertexRef::Base(6));
        assert_eq!(decoded[0].linedef, Some(9));
    }

    #[test]
    fn gl_segs_v5_have_no_header_and_flag_bit_31() {
        let mut lump = Vec::new();
        lump.extend_from_slice(&(0x8000_0005u32).to_le_bytes());
        lump.extend_from_slice(&(0x4000_0006u32).to_le_bytes());
        lump.extend_from_slice(&(0u16).to_le_bytes());
        lump.extend_from_slice(&(1u16).to_le_bytes());
        lump.extend_from_slice(&(3u32).to_le_bytes());
        let archive = archive_with("GL_SEGS", lump);
        let reader = archive.required_named_lump("GL_SEGS").unwrap();
        let decoded = gl_segs(reader, 5).unwrap();
        assert_eq!(decoded[0].start_vertex, VertexRef::Gl(5));
        // Bit 30 is an ordinary id bit in version 5.
        assert_eq!(decoded[0].end_vertex, VertexRef::Base(0x4000_0006));
        assert_eq!(decoded[0].linedef, Some(0));
    }

    #[test]
    fn nodes_decode_children_into_tagged_union() {
        let mut lump = Vec::new();
        for &short in &[0i16, 0, 0, 64] {
            lump.extend_from_slice(&short.to_le_bytes());
        }
        for _ in 0..8 {
            lump.extend_from_slice(&0i16.to_le_bytes());
        }
        lump.extend_from_slice(&(0x8001u16).to_le_bytes());
        lump.extend_from_slice(&(0x0000u16).to_le_bytes());
        let archive = archive_with("NODES", lump);
        let reader = archive.required_named_lump("NODES").unwrap();
        let decoded = nodes(reader).unwrap();
        assert_eq!(decoded[0].right, Child::Leaf(1));
        assert_eq!(decoded[0].left, Child::Branch(0));
    }

    #[test]
    fn gl_subsectors_versions() {
        let mut narrow = Vec::new();
        narrow.extend_from_slice(&(3u16).to_le_bytes());
        narrow.extend_from_slice(&(7u16).to_le_bytes());
        let archive = archive_with("GL_SSECT", narrow);
        let decoded =
            gl_subsectors(archive.required_named_lump("GL_SSECT").unwrap(), 1).unwrap();
        assert_eq!(
            decoded,
            vec![Subsector {
                first_seg: 7,
                num_segs: 3,
            }]
        );

        let mut wide = b"gNd4".to_vec();
        wide.extend_from_slice(&(4u32).to_le_bytes());
        wide.extend_from_slice(&(90_000u32).to_le_bytes());
        let archive = archive_with("GL_SSECT", wide);
        let decoded =
            gl_subsectors(archive.required_named_lump("GL_SSECT").unwrap(), 4).unwrap();
        assert_eq!(
            decoded,
            vec![Subsector {
                first_seg: 90_000,
                num_segs: 4,
            }]
        );
    }
}
