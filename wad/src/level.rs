//! A fully decoded level: the contiguous lump run behind a level marker,
//! parsed into records, stitched, indexed and ready for queries.

use crate::archive::{is_level_lump_name, Archive, LumpReader};
use crate::bsp::BspTree;
use crate::errors::{ErrorKind, Result};
use crate::formats::{GlVersions, MapFormat};
use crate::name::WadName;
use crate::pvs::VisibilitySet;
use crate::read;
use crate::spatial::{BlockMap, SpatialIndex};
use crate::stitch::{self, VertexPool};
use crate::types::{
    Bounds, GlSeg, Linedef, LinedefId, SectorId, Seg, SidedefId, Subsector, Thing, VertexRef,
    WadSector, WadSidedef,
};
use indexmap::IndexMap;
use log::{info, warn};
use math::Pnt2f;

pub struct Level {
    pub name: WadName,
    pub format: MapFormat,
    pub gl_versions: GlVersions,
    pub things: Vec<Thing>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<WadSidedef>,
    pub sectors: Vec<WadSector>,
    pub segs: Vec<Seg>,
    pub subsectors: Vec<Subsector>,
    pub gl_segs: Vec<GlSeg>,
    pub gl_subsectors: Vec<Subsector>,
    vertex_pool: VertexPool,
    bounds: Option<Bounds>,
    bsp: BspTree,
    spatial: SpatialIndex,
    block_map: Option<BlockMap>,
    visibility: VisibilitySet,
}

impl Level {
    pub fn from_archive(archive: &Archive, name: WadName) -> Result<Level> {
        info!("Loading level {}...", name);
        let run = lump_run(archive, name)?;

        let format = if lump(&run, b"BEHAVIOR").is_some() {
            MapFormat::Hexen
        } else {
            MapFormat::Doom
        };
        let gl_versions = GlVersions::resolve(
            lump(&run, b"GL_VERT").map(|reader| reader.bytes()),
            lump(&run, b"GL_SEGS").map(|reader| reader.bytes()),
            lump(&run, b"GL_SSECT").map(|reader| reader.bytes()),
            lump(&run, b"GL_NODES").map(|reader| reader.bytes()),
        );

        let things = read::things(required(&run, b"THINGS")?, format)?;
        let linedefs = read::linedefs(required(&run, b"LINEDEFS")?, format)?;
        let sidedefs: Vec<WadSidedef> = required(&run, b"SIDEDEFS")?.decode_vec()?;
        let base_vertices = read::vertices(required(&run, b"VERTEXES")?)?;
        let sectors: Vec<WadSector> = required(&run, b"SECTORS")?.decode_vec()?;

        let segs = optional(&run, b"SEGS", read::segs);
        let subsectors = optional(&run, b"SSECTORS", read::subsectors);
        let gl_vertices = optional(&run, b"GL_VERT", |reader| {
            read::gl_vertices(reader, gl_versions.vertices)
        });
        let gl_segs = optional(&run, b"GL_SEGS", |reader| {
            read::gl_segs(reader, gl_versions.segs)
        });
        let gl_subsectors = optional(&run, b"GL_SSECT", |reader| {
            read::gl_subsectors(reader, gl_versions.subsectors)
        });
        let gl_nodes = optional(&run, b"GL_NODES", |reader| {
            read::gl_nodes(reader, gl_versions.nodes)
        });

        info!(
            "Level {}: {:?} format, {} things, {} linedefs, {} sidedefs, {} sectors, \
             {} vertices + {} GL, {} subsectors + {} GL.",
            name,
            format,
            things.len(),
            linedefs.len(),
            sidedefs.len(),
            sectors.len(),
            base_vertices.len(),
            gl_vertices.len(),
            subsectors.len(),
            gl_subsectors.len(),
        );

        let bounds = Bounds::of_points(base_vertices.iter().copied());
        let mut vertex_pool = VertexPool::new(base_vertices, gl_vertices);
        let stitched = stitch::stitch(&mut vertex_pool, &gl_segs, &linedefs);
        if stitched > 0 {
            info!("Level {}: stitched {} GL seg endpoints.", name, stitched);
        }

        // GL nodes index GL subsectors which index GL segs; point location
        // needs the full set and never falls back to the base tree.
        let gl_complete =
            !gl_nodes.is_empty() && !gl_subsectors.is_empty() && !gl_segs.is_empty();
        let (bsp, spatial) = if gl_complete {
            (
                BspTree::new(gl_nodes),
                SpatialIndex::new(&linedefs, &sidedefs, &gl_subsectors, &gl_segs),
            )
        } else {
            if gl_versions.any() {
                warn!(
                    "Level {} has incomplete GL lumps, point location is unavailable.",
                    name
                );
            } else {
                warn!(
                    "Level {} has no GL lumps, point location is unavailable.",
                    name
                );
            }
            (
                BspTree::default(),
                SpatialIndex::new(&linedefs, &sidedefs, &[], &[]),
            )
        };

        let block_map = match lump(&run, b"BLOCKMAP") {
            Some(reader) if reader.size() > 0 => match BlockMap::new(reader.read_bytes()) {
                Ok(block_map) => Some(block_map),
                Err(error) => {
                    warn!("Level {}: ignoring bad BLOCKMAP: {}", name, error);
                    None
                }
            },
            _ => None,
        };
        let visibility = match lump(&run, b"GL_PVS") {
            Some(reader) if reader.size() > 0 => {
                VisibilitySet::new(reader.read_bytes(), spatial.num_subsectors())
            }
            _ => VisibilitySet::default(),
        };
        if block_map.is_none() {
            warn!(
                "Level {} has no blockmap, proximity queries return nothing.",
                name
            );
        }
        if visibility.is_empty() {
            warn!(
                "Level {} has no visibility data, visibility queries return nothing.",
                name
            );
        }

        Ok(Level {
            name,
            format,
            gl_versions,
            things,
            linedefs,
            sidedefs,
            sectors,
            segs,
            subsectors,
            gl_segs,
            gl_subsectors,
            vertex_pool,
            bounds,
            bsp,
            spatial,
            block_map,
            visibility,
        })
    }

    pub fn name(&self) -> WadName {
        self.name
    }

    /// Bounding box of the base vertex pool; `None` for a vertex-less level.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn vertex_pool(&self) -> &VertexPool {
        &self.vertex_pool
    }

    pub fn bsp(&self) -> &BspTree {
        &self.bsp
    }

    pub fn block_map(&self) -> Option<&BlockMap> {
        self.block_map.as_ref()
    }

    pub fn visibility(&self) -> &VisibilitySet {
        &self.visibility
    }

    /// Position of a vertex after stitching.
    pub fn vertex(&self, vertex: VertexRef) -> Option<Pnt2f> {
        self.vertex_pool
            .resolved(vertex)
            .map(|vertex| vertex.position)
    }

    pub fn sector(&self, id: SectorId) -> Option<&WadSector> {
        self.sectors.get(id as usize)
    }

    pub fn sidedef(&self, id: SidedefId) -> Option<&WadSidedef> {
        self.sidedefs.get(id as usize)
    }

    pub fn right_sidedef(&self, linedef: &Linedef) -> Option<&WadSidedef> {
        self.sidedef(linedef.right_side())
    }

    pub fn left_sidedef(&self, linedef: &Linedef) -> Option<&WadSidedef> {
        self.sidedef(linedef.left_side()?)
    }

    pub fn sidedef_sector(&self, sidedef: &WadSidedef) -> Option<&WadSector> {
        self.sector(sidedef.sector)
    }

    pub fn seg_linedef(&self, seg: &GlSeg) -> Option<&Linedef> {
        self.linedefs.get(seg.linedef? as usize)
    }

    /// Linedefs whose right side faces `sector`.
    pub fn sector_linedefs(&self, sector: SectorId) -> &[LinedefId] {
        self.spatial.linedefs_in_sector(sector)
    }

    pub fn sector_of_subsector(&self, subsector: usize) -> Option<SectorId> {
        self.spatial.sector_of_subsector(subsector)
    }

    /// The subsector containing `at`, found by descending the BSP. Errors
    /// when the level carries no tree at all.
    pub fn subsector_at(&self, at: Pnt2f) -> Result<Option<usize>> {
        if self.bsp.is_empty() {
            return Err(ErrorKind::no_bsp_tree(&self.name).into());
        }
        self.bsp.locate(at)
    }

    pub fn sector_at(&self, at: Pnt2f) -> Result<Option<SectorId>> {
        Ok(self
            .subsector_at(at)?
            .and_then(|subsector| self.spatial.sector_of_subsector(subsector)))
    }

    /// Sectors potentially visible from `subsector`, sorted and deduplicated.
    /// A level without visibility data sees nothing.
    pub fn visible_sectors_from(&self, subsector: usize) -> Vec<SectorId> {
        let mut sectors: Vec<SectorId> = self
            .visibility
            .visible_from(subsector)
            .into_iter()
            .filter_map(|subsector| self.spatial.sector_of_subsector(subsector))
            .collect();
        sectors.sort_unstable();
        sectors.dedup();
        sectors
    }

    /// Linedefs listed in the blockmap cells around `at`. A level without a
    /// blockmap reports nothing.
    pub fn linedefs_near(&self, at: Pnt2f) -> Result<Vec<LinedefId>> {
        match &self.block_map {
            Some(block_map) => block_map.linedefs_near(at),
            None => Ok(Vec::new()),
        }
    }

    /// Bounding box of the linedefs facing `sector`, through stitched
    /// vertices.
    pub fn sector_bounds(&self, sector: SectorId) -> Option<Bounds> {
        let mut points = Vec::new();
        for &id in self.spatial.linedefs_in_sector(sector) {
            let linedef = self.linedefs.get(id as usize)?;
            points.push(self.vertex(VertexRef::Base(u32::from(linedef.start_vertex())))?);
            points.push(self.vertex(VertexRef::Base(u32::from(linedef.end_vertex())))?);
        }
        Bounds::of_points(points)
    }
}

/// Collects the level's lump run: every recognized level lump following the
/// marker, plus the level's own `GL_<label>` companion marker. The first lump
/// of each name wins.
fn lump_run(archive: &Archive, label: WadName) -> Result<IndexMap<WadName, LumpReader<'_>>> {
    let mut marker = None;
    for level in 0..archive.num_levels() {
        let lump = archive.level_lump(level)?;
        if lump.name() == label {
            marker = Some(lump);
            break;
        }
    }
    let marker = match marker {
        Some(marker) => marker,
        None => {
            let kind = if archive.named_lump(&*label)?.is_some() {
                ErrorKind::not_a_level_marker(&label)
            } else {
                ErrorKind::missing_required_lump(&label)
            };
            return Err(kind.into());
        }
    };

    let gl_marker = gl_marker_name(label);
    let mut run = IndexMap::new();
    let mut index = marker.index() + 1;
    while let Ok(reader) = archive.lump_by_index(index) {
        let name = reader.name();
        if !is_level_lump_name(&name) && Some(name) != gl_marker {
            break;
        }
        run.entry(name).or_insert(reader);
        index += 1;
    }
    Ok(run)
}

/// `GL_` + the first five bytes of the label, e.g. `GL_E1M1`, `GL_MAP01`.
fn gl_marker_name(label: WadName) -> Option<WadName> {
    let tail: &str = label.as_ref();
    let tail = tail.as_bytes();
    let tail = &tail[..tail.len().min(5)];
    let mut bytes = [0u8; 8];
    bytes[..3].copy_from_slice(b"GL_");
    bytes[3..3 + tail.len()].copy_from_slice(tail);
    WadName::from_bytes(&bytes).ok()
}

fn lump<'a>(run: &IndexMap<WadName, LumpReader<'a>>, name: &[u8]) -> Option<LumpReader<'a>> {
    WadName::from_bytes(name)
        .ok()
        .and_then(|name| run.get(&name).copied())
}

fn required<'a>(run: &IndexMap<WadName, LumpReader<'a>>, name: &[u8]) -> Result<LumpReader<'a>> {
    lump(run, name)
        .ok_or_else(|| ErrorKind::missing_required_lump(&String::from_utf8_lossy(name)).into())
}

/// Decodes an optional lump, degrading a decode failure to an empty list
/// with a warning.
fn optional<'a, T, F>(
    run: &IndexMap<WadName, LumpReader<'a>>,
    name: &[u8],
    decode: F,
) -> Vec<T>
where
    F: FnOnce(LumpReader<'a>) -> Result<Vec<T>>,
{
    let reader = match lump(run, name) {
        Some(reader) => reader,
        None => return Vec::new(),
    };
    match decode(reader) {
        Ok(values) => values,
        Err(error) => {
            warn!(
                "Failed to decode `{}` lump, treating as empty: {}",
                String::from_utf8_lossy(name),
                error
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod test {
    use crate::archive::test::WadBuilder;
    use crate::archive::Archive;
    use crate::formats::MapFormat;
    use crate::types::VertexRef;
    use math::Pnt2f;

    fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }

    fn shorts(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }

    fn name8(name: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; 8];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        bytes
    }

    fn thing(x: i16, y: i16, angle: i16, thing_type: u16, flags: u16) -> Vec<u8> {
        let mut bytes = shorts(&[x, y, angle]);
        bytes.extend(words(&[thing_type, flags]));
        bytes
    }

    fn linedef(start: u16, end: u16, right: u16, left: u16) -> Vec<u8> {
        words(&[start, end, 0, 0, 0, right, left])
    }

    fn sidedef(sector: u16) -> Vec<u8> {
        let mut bytes = shorts(&[0, 0]);
        for _ in 0..3 {
            bytes.extend(name8("-"));
        }
        bytes.extend(words(&[sector]));
        bytes
    }

    fn sector(floor: i16, ceiling: i16) -> Vec<u8> {
        let mut bytes = shorts(&[floor, ceiling]);
        bytes.extend(name8("FLAT1"));
        bytes.extend(name8("FLAT2"));
        bytes.extend(shorts(&[160]));
        bytes.extend(words(&[0, 0]));
        bytes
    }

    fn gl_seg(start: u16, end: u16, linedef: u16, side: u16) -> Vec<u8> {
        words(&[start, end, linedef, side, 0xffff])
    }

    fn node(
        line: (i16, i16, i16, i16),
        right: u16,
        left: u16,
    ) -> Vec<u8> {
        let mut bytes = shorts(&[line.0, line.1, line.2, line.3]);
        bytes.extend(shorts(&[0; 8]));
        bytes.extend(words(&[right, left]));
        bytes
    }

    // A 128x128 square split down the middle at x = 64: sector 0 on the
    // left, sector 1 on the right, one GL subsector per sector.
    fn square_wad(with_pvs: bool, with_blockmap: bool) -> Vec<u8> {
        let vertices = shorts(&[0, 0, 128, 0, 128, 128, 0, 128, 64, 0, 64, 128]);

        let mut linedefs = Vec::new();
        // Left edge, facing sector 0.
        linedefs.extend(linedef(3, 0, 0, 0xffff));
        // Right edge, facing sector 1.
        linedefs.extend(linedef(1, 2, 1, 0xffff));
        // The middle split, sector 1 to its right, sector 0 to its left.
        linedefs.extend(linedef(4, 5, 1, 0));

        let mut sidedefs = sidedef(0);
        sidedefs.extend(sidedef(1));

        let mut sectors = sector(0, 128);
        sectors.extend(sector(0, 96));

        let mut gl_segs = gl_seg(3, 0, 0, 0);
        gl_segs.extend(gl_seg(1, 2, 1, 0));
        // Subsector boundaries: one seg each.
        let gl_ssect = words(&[1, 0, 1, 1]);

        // One splitter at x = 64 pointing up; left child is subsector 0.
        let gl_nodes = node((64, 0, 0, 128), 0x8001, 0x8000);

        let mut builder = WadBuilder::iwad()
            .lump("E1M1", vec![])
            .lump("THINGS", thing(32, 64, 90, 1, 7))
            .lump("LINEDEFS", linedefs)
            .lump("SIDEDEFS", sidedefs)
            .lump("VERTEXES", vertices)
            .lump("SECTORS", sectors);
        if with_blockmap {
            // 1x1 grid listing every linedef.
            let mut blockmap = words(&[0, 0, 1, 1]);
            blockmap.extend(words(&[5]));
            blockmap.extend(words(&[0, 0, 1, 2, 0xffff]));
            builder = builder.lump("BLOCKMAP", blockmap);
        }
        builder = builder
            .lump("GL_E1M1", vec![])
            .lump("GL_VERT", vec![])
            .lump("GL_SEGS", gl_segs)
            .lump("GL_SSECT", gl_ssect)
            .lump("GL_NODES", gl_nodes);
        if with_pvs {
            // Subsector 0 sees itself; subsector 1 sees both.
            builder = builder.lump("GL_PVS", vec![0b01, 0b11]);
        }
        builder.build()
    }

    fn load(bytes: Vec<u8>) -> crate::Level {
        Archive::from_bytes(bytes).unwrap().load_level("E1M1").unwrap()
    }

    #[test]
    fn decodes_the_whole_lump_run() {
        let level = load(square_wad(true, true));
        assert_eq!(level.format, MapFormat::Doom);
        assert_eq!(level.gl_versions.vertices, 1);
        assert_eq!(level.things.len(), 1);
        assert_eq!(level.things[0].x(), 32);
        assert_eq!(level.linedefs.len(), 3);
        assert_eq!(level.sidedefs.len(), 2);
        assert_eq!(level.sectors.len(), 2);
        assert_eq!(level.gl_segs.len(), 2);
        assert_eq!(level.gl_subsectors.len(), 2);
        assert_eq!(level.bsp().len(), 1);
    }

    #[test]
    fn level_bounds_cover_the_base_vertices() {
        let level = load(square_wad(false, false));
        let bounds = level.bounds().unwrap();
        assert_eq!(bounds.min, Pnt2f::new(0.0, 0.0));
        assert_eq!(bounds.max, Pnt2f::new(128.0, 128.0));
        assert_eq!(bounds.center(), Pnt2f::new(64.0, 64.0));
    }

    #[test]
    fn point_location_descends_to_the_right_sector() {
        let level = load(square_wad(false, false));
        assert_eq!(level.sector_at(Pnt2f::new(32.0, 64.0)).unwrap(), Some(0));
        assert_eq!(level.sector_at(Pnt2f::new(96.0, 64.0)).unwrap(), Some(1));
        // On the splitter: ties go left.
        assert_eq!(level.sector_at(Pnt2f::new(64.0, 64.0)).unwrap(), Some(0));
    }

    #[test]
    fn visibility_maps_subsectors_to_sectors() {
        let level = load(square_wad(true, false));
        assert_eq!(level.visible_sectors_from(0), vec![0]);
        assert_eq!(level.visible_sectors_from(1), vec![0, 1]);
    }

    #[test]
    fn absent_pvs_degrades_to_no_visibility() {
        let level = load(square_wad(false, false));
        assert!(level.visibility().is_empty());
        assert_eq!(level.visible_sectors_from(0), vec![]);
        assert_eq!(level.visible_sectors_from(1), vec![]);
    }

    #[test]
    fn blockmap_proximity_lists_linedefs() {
        let level = load(square_wad(false, true));
        let mut near = level.linedefs_near(Pnt2f::new(64.0, 64.0)).unwrap();
        near.sort_unstable();
        assert_eq!(near, vec![0, 1, 2]);
    }

    #[test]
    fn absent_blockmap_degrades_to_no_proximity() {
        let level = load(square_wad(false, false));
        assert!(level.block_map().is_none());
        assert_eq!(level.linedefs_near(Pnt2f::new(64.0, 64.0)).unwrap(), vec![]);
    }

    #[test]
    fn sector_bounds_follow_their_linedefs() {
        let level = load(square_wad(false, false));
        // Sector 1 is faced by the right edge and the middle splitter.
        let bounds = level.sector_bounds(1).unwrap();
        assert_eq!(bounds.min, Pnt2f::new(64.0, 0.0));
        assert_eq!(bounds.max, Pnt2f::new(128.0, 128.0));
    }

    #[test]
    fn resolves_vertices_through_the_pool() {
        let level = load(square_wad(false, false));
        assert_eq!(
            level.vertex(VertexRef::Base(4)),
            Some(Pnt2f::new(64.0, 0.0))
        );
        assert_eq!(level.vertex(VertexRef::Base(9)), None);
        assert_eq!(level.vertex_pool().base_len(), 6);
        assert_eq!(level.vertex_pool().gl_len(), 0);
    }

    #[test]
    fn missing_level_is_an_error() {
        let archive = Archive::from_bytes(square_wad(false, false)).unwrap();
        assert!(archive.load_level("E9M9").is_err());
    }

    #[test]
    fn marker_without_required_lumps_is_an_error() {
        let bytes = WadBuilder::iwad()
            .lump("E1M1", vec![])
            .lump("THINGS", thing(0, 0, 0, 1, 0))
            .lump("LINEDEFS", linedef(0, 1, 0, 0xffff))
            .build();
        let archive = Archive::from_bytes(bytes).unwrap();
        assert!(archive.load_level("E1M1").is_err());
    }

    #[test]
    fn behavior_lump_selects_the_hexen_layout() {
        // One Hexen thing (20 bytes) and one Hexen linedef (16 bytes).
        let mut things = words(&[9]);
        things.extend(shorts(&[10, -20, 0]));
        things.extend(words(&[45, 3001, 7]));
        things.extend(vec![2, 1, 2, 3, 4, 5]);
        let mut linedefs = words(&[0, 1, 4]);
        linedefs.extend(vec![8, 1, 2, 3, 4, 5]);
        linedefs.extend(words(&[0, 0xffff]));

        let bytes = WadBuilder::iwad()
            .lump("MAP01", vec![])
            .lump("THINGS", things)
            .lump("LINEDEFS", linedefs)
            .lump("SIDEDEFS", sidedef(0))
            .lump("VERTEXES", shorts(&[0, 0, 64, 0]))
            .lump("SECTORS", sector(0, 64))
            .lump("BEHAVIOR", vec![])
            .build();
        let level = load_named(bytes, "MAP01");
        assert_eq!(level.format, MapFormat::Hexen);
        assert_eq!(level.things[0].x(), 10);
        assert_eq!(level.things[0].y(), -20);
        assert_eq!(level.things[0].thing_type(), 3001);
        assert_eq!(level.linedefs[0].special_type(), 8);
        assert_eq!(level.linedefs[0].args(), Some([1, 2, 3, 4, 5]));
        assert_eq!(level.linedefs[0].sector_tag(), None);
    }

    #[test]
    fn base_nodes_do_not_enable_point_location() {
        // A full base BSP but no GL lumps: the records decode, yet point
        // location stays unsupported.
        let bytes = WadBuilder::iwad()
            .lump("E1M1", vec![])
            .lump("THINGS", thing(0, 0, 0, 1, 0))
            .lump("LINEDEFS", linedef(0, 1, 0, 0xffff))
            .lump("SIDEDEFS", sidedef(0))
            .lump("VERTEXES", shorts(&[0, 0, 64, 0]))
            .lump("SEGS", words(&[0, 1, 0, 0, 0, 0]))
            .lump("SSECTORS", words(&[1, 0]))
            .lump("NODES", node((0, 0, 0, 64), 0x8000, 0x8000))
            .lump("SECTORS", sector(0, 64))
            .build();
        let level = load(bytes);
        assert_eq!(level.segs.len(), 1);
        assert_eq!(level.subsectors.len(), 1);
        assert!(level.bsp().is_empty());
        assert!(level.sector_at(Pnt2f::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn point_location_without_any_tree_is_unsupported() {
        let bytes = WadBuilder::iwad()
            .lump("E1M1", vec![])
            .lump("THINGS", thing(0, 0, 0, 1, 0))
            .lump("LINEDEFS", linedef(0, 1, 0, 0xffff))
            .lump("SIDEDEFS", sidedef(0))
            .lump("VERTEXES", shorts(&[0, 0, 64, 0]))
            .lump("SECTORS", sector(0, 64))
            .build();
        let level = load(bytes);
        assert!(level.sector_at(Pnt2f::new(1.0, 1.0)).is_err());
    }

    fn load_named(bytes: Vec<u8>, label: &str) -> crate::Level {
        Archive::from_bytes(bytes).unwrap().load_level(label).unwrap()
    }
}
