mod archive;
mod bsp;
mod errors;
mod formats;
mod level;
mod name;
mod pvs;
mod read;
mod spatial;
mod stitch;
mod types;

pub use crate::archive::{Archive, ArchiveKind, ArchiveStack, LumpReader};
pub use crate::bsp::{BspNode, BspTree, Child};
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::formats::{GlVersions, MapFormat};
pub use crate::level::Level;
pub use crate::name::{IntoWadName, WadName};
pub use crate::pvs::VisibilitySet;
pub use crate::spatial::{BlockMap, SpatialIndex};
pub use crate::stitch::{Vertex, VertexPool};
pub use crate::types::{
    Bounds, GlSeg, HexenLinedef, HexenThing, Linedef, LinedefId, SectorId, Seg, SidedefId,
    Subsector, Thing, VertexId, VertexRef, WadCoord, WadInfo, WadLinedef, WadLump, WadSector,
    WadSidedef, WadThing, WadVertex,
};
