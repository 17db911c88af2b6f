pub use crate::name::WadName;
use math::Pnt2f;
use serde::Deserialize;

pub type LightLevel = i16;
pub type LinedefFlags = u16;
pub type LinedefId = u16;
pub type SectorId = u16;
pub type SectorTag = u16;
pub type SectorType = u16;
pub type SidedefId = u16;
pub type SpecialType = u16;
pub type ThingFlags = u16;
pub type ThingType = u16;
pub type VertexId = u32;
pub type WadCoord = i16;

/// "No lump here" marker used by linedef sidedef references and seg linedef
/// references alike.
pub const NO_INDEX: u16 = 0xffff;

#[derive(Copy, Clone, Deserialize)]
pub struct WadInfo {
    pub identifier: [u8; 4],
    pub num_lumps: i32,
    pub info_table_offset: i32,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadLump {
    pub file_pos: i32,
    pub size: i32,
    pub name: WadName,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadThing {
    pub x: WadCoord,
    pub y: WadCoord,
    pub angle: WadCoord,
    pub thing_type: ThingType,
    pub flags: ThingFlags,
}

#[derive(Copy, Clone, Deserialize)]
pub struct HexenThing {
    pub id: u16,
    pub x: WadCoord,
    pub y: WadCoord,
    pub z: WadCoord,
    pub angle: u16,
    pub thing_type: ThingType,
    pub flags: ThingFlags,
    pub special: u8,
    pub args: [u8; 5],
}

/// A map thing in either of the two record layouts. The Hexen layout is
/// selected by the presence of a `BEHAVIOR` lump in the level's lump run.
#[derive(Copy, Clone)]
pub enum Thing {
    Doom(WadThing),
    Hexen(HexenThing),
}

impl Thing {
    pub fn x(&self) -> WadCoord {
        match self {
            Thing::Doom(thing) => thing.x,
            Thing::Hexen(thing) => thing.x,
        }
    }

    pub fn y(&self) -> WadCoord {
        match self {
            Thing::Doom(thing) => thing.y,
            Thing::Hexen(thing) => thing.y,
        }
    }

    pub fn angle(&self) -> u16 {
        match self {
            Thing::Doom(thing) => thing.angle as u16,
            Thing::Hexen(thing) => thing.angle,
        }
    }

    pub fn thing_type(&self) -> ThingType {
        match self {
            Thing::Doom(thing) => thing.thing_type,
            Thing::Hexen(thing) => thing.thing_type,
        }
    }

    pub fn flags(&self) -> ThingFlags {
        match self {
            Thing::Doom(thing) => thing.flags,
            Thing::Hexen(thing) => thing.flags,
        }
    }

    pub fn on_skill_easy(&self) -> bool {
        self.flags() & 0x0001 != 0
    }

    pub fn on_skill_medium(&self) -> bool {
        self.flags() & 0x0002 != 0
    }

    pub fn on_skill_hard(&self) -> bool {
        self.flags() & 0x0004 != 0
    }

    pub fn ambush(&self) -> bool {
        self.flags() & 0x0008 != 0
    }
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadLinedef {
    pub start_vertex: u16,
    pub end_vertex: u16,
    pub flags: LinedefFlags,
    pub special_type: SpecialType,
    pub sector_tag: SectorTag,
    pub right_side: u16,
    pub left_side: u16,
}

#[derive(Copy, Clone, Deserialize)]
pub struct HexenLinedef {
    pub start_vertex: u16,
    pub end_vertex: u16,
    pub flags: LinedefFlags,
    pub special_type: u8,
    pub args: [u8; 5],
    pub right_side: u16,
    pub left_side: u16,
}

#[derive(Copy, Clone)]
pub enum Linedef {
    Doom(WadLinedef),
    Hexen(HexenLinedef),
}

impl Linedef {
    pub fn start_vertex(&self) -> u16 {
        match self {
            Linedef::Doom(line) => line.start_vertex,
            Linedef::Hexen(line) => line.start_vertex,
        }
    }

    pub fn end_vertex(&self) -> u16 {
        match self {
            Linedef::Doom(line) => line.end_vertex,
            Linedef::Hexen(line) => line.end_vertex,
        }
    }

    pub fn flags(&self) -> LinedefFlags {
        match self {
            Linedef::Doom(line) => line.flags,
            Linedef::Hexen(line) => line.flags,
        }
    }

    pub fn right_side(&self) -> SidedefId {
        match self {
            Linedef::Doom(line) => line.right_side,
            Linedef::Hexen(line) => line.right_side,
        }
    }

    pub fn left_side(&self) -> Option<SidedefId> {
        let side = match self {
            Linedef::Doom(line) => line.left_side,
            Linedef::Hexen(line) => line.left_side,
        };
        if side == NO_INDEX {
            None
        } else {
            Some(side)
        }
    }

    pub fn special_type(&self) -> SpecialType {
        match self {
            Linedef::Doom(line) => line.special_type,
            Linedef::Hexen(line) => SpecialType::from(line.special_type),
        }
    }

    /// The action's sector tag; Hexen linedefs carry args instead.
    pub fn sector_tag(&self) -> Option<SectorTag> {
        match self {
            Linedef::Doom(line) => Some(line.sector_tag),
            Linedef::Hexen(_) => None,
        }
    }

    pub fn args(&self) -> Option<[u8; 5]> {
        match self {
            Linedef::Doom(_) => None,
            Linedef::Hexen(line) => Some(line.args),
        }
    }

    pub fn impassable(&self) -> bool {
        self.flags() & 0x0001 != 0
    }

    pub fn blocks_monsters(&self) -> bool {
        self.flags() & 0x0002 != 0
    }

    pub fn is_two_sided(&self) -> bool {
        self.flags() & 0x0004 != 0
    }

    pub fn upper_unpegged(&self) -> bool {
        self.flags() & 0x0008 != 0
    }

    pub fn lower_unpegged(&self) -> bool {
        self.flags() & 0x0010 != 0
    }

    pub fn secret(&self) -> bool {
        self.flags() & 0x0020 != 0
    }

    pub fn blocks_sound(&self) -> bool {
        self.flags() & 0x0040 != 0
    }
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadSidedef {
    pub x_offset: WadCoord,
    pub y_offset: WadCoord,
    pub upper_texture: WadName,
    pub lower_texture: WadName,
    pub middle_texture: WadName,
    pub sector: SectorId,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadSector {
    pub floor_height: WadCoord,
    pub ceiling_height: WadCoord,
    pub floor_texture: WadName,
    pub ceiling_texture: WadName,
    pub light: LightLevel,
    pub sector_type: SectorType,
    pub tag: SectorTag,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadVertex {
    pub x: WadCoord,
    pub y: WadCoord,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadSeg {
    pub start_vertex: u16,
    pub end_vertex: u16,
    pub angle: u16,
    pub linedef: u16,
    pub direction: u16,
    pub offset: u16,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadSubsector {
    pub num_segs: u16,
    pub first_seg: u16,
}

#[derive(Copy, Clone, Deserialize)]
pub struct WadNode {
    pub line_x: WadCoord,
    pub line_y: WadCoord,
    pub step_x: WadCoord,
    pub step_y: WadCoord,
    pub right_y_max: WadCoord,
    pub right_y_min: WadCoord,
    pub right_x_max: WadCoord,
    pub right_x_min: WadCoord,
    pub left_y_max: WadCoord,
    pub left_y_min: WadCoord,
    pub left_x_max: WadCoord,
    pub left_x_min: WadCoord,
    pub right: u16,
    pub left: u16,
}

#[derive(Copy, Clone, Deserialize)]
pub struct GlVertexWide {
    pub x: i32,
    pub y: i32,
}

#[derive(Copy, Clone, Deserialize)]
pub struct GlSegNarrow {
    pub start_vertex: u16,
    pub end_vertex: u16,
    pub linedef: u16,
    pub side: u16,
    pub partner: u16,
}

#[derive(Copy, Clone, Deserialize)]
pub struct GlSegWide {
    pub start_vertex: u32,
    pub end_vertex: u32,
    pub linedef: u16,
    pub side: u16,
    pub partner: u32,
}

#[derive(Copy, Clone, Deserialize)]
pub struct GlSubsectorWide {
    pub num_segs: u32,
    pub first_seg: u32,
}

#[derive(Copy, Clone, Deserialize)]
pub struct GlNodeWide {
    pub line_x: WadCoord,
    pub line_y: WadCoord,
    pub step_x: WadCoord,
    pub step_y: WadCoord,
    pub right_y_max: WadCoord,
    pub right_y_min: WadCoord,
    pub right_x_max: WadCoord,
    pub right_x_min: WadCoord,
    pub left_y_max: WadCoord,
    pub left_y_min: WadCoord,
    pub left_x_max: WadCoord,
    pub left_x_min: WadCoord,
    pub right: u32,
    pub left: u32,
}

/// A vertex reference, tagged with the pool it belongs to. GL segs may point
/// into either the base `VERTEXES` pool or the GL-extension pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexRef {
    Base(VertexId),
    Gl(VertexId),
}

/// A directed sub-edge of the base BSP, normalized across layouts.
#[derive(Copy, Clone)]
pub struct Seg {
    pub start_vertex: u16,
    pub end_vertex: u16,
    pub angle: u16,
    pub linedef: Option<LinedefId>,
    pub direction: u16,
    pub offset: u16,
}

/// A directed sub-edge from the GL extension, normalized across the five
/// sub-format revisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlSeg {
    pub start_vertex: VertexRef,
    pub end_vertex: VertexRef,
    /// `None` is the "minisegs" sentinel: the seg follows a BSP split rather
    /// than an actual linedef.
    pub linedef: Option<LinedefId>,
    pub side: u16,
    pub partner: u32,
}

/// A convex BSP leaf: a run of consecutive (GL-)segs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Subsector {
    pub first_seg: u32,
    pub num_segs: u32,
}

/// An axis-aligned bounding box in map coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Pnt2f,
    pub max: Pnt2f,
}

impl Bounds {
    pub fn of_points<PointsT: IntoIterator<Item = Pnt2f>>(points: PointsT) -> Option<Bounds> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for point in points {
            bounds.min.x = bounds.min.x.min(point.x);
            bounds.min.y = bounds.min.y.min(point.y);
            bounds.max.x = bounds.max.x.max(point.x);
            bounds.max.y = bounds.max.y.max(point.y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Pnt2f {
        Pnt2f::new(
            self.min.x + self.width() / 2.0,
            self.min.y + self.height() / 2.0,
        )
    }
}
