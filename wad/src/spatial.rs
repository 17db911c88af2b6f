//! Spatial lookups: the per-sector linedef index, the subsector to sector
//! mapping derived from GL segs, and the `BLOCKMAP` block grid.

use crate::errors::{ErrorKind, Result};
use crate::types::{GlSeg, Linedef, LinedefId, SectorId, Subsector, WadSidedef};
use byteorder::{ByteOrder, LittleEndian};
use failchain::ensure;
use log::warn;
use math::Pnt2f;
use vec_map::VecMap;

/// Side length of one blockmap cell in map units.
const BLOCK_SIZE: f32 = 128.0;

/// Point coordinates are biased by this much before bucketing, matching the
/// engine's blockmap addressing.
const BLOCK_BIAS: f32 = 8.0;

const BLOCKMAP_HEADER_SIZE: usize = 8;
const BLOCK_LIST_END: u16 = 0xffff;

/// Cross-reference tables built once per level: which linedefs border each
/// sector, and which sector each GL subsector lies in.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    sector_linedefs: VecMap<Vec<LinedefId>>,
    subsector_sectors: Vec<Option<SectorId>>,
}

impl SpatialIndex {
    pub fn new(
        linedefs: &[Linedef],
        sidedefs: &[WadSidedef],
        gl_subsectors: &[Subsector],
        gl_segs: &[GlSeg],
    ) -> SpatialIndex {
        let mut sector_linedefs = VecMap::new();
        for (index, linedef) in linedefs.iter().enumerate() {
            match sidedefs.get(linedef.right_side() as usize) {
                Some(sidedef) => sector_linedefs
                    .entry(sidedef.sector as usize)
                    .or_insert_with(Vec::new)
                    .push(index as LinedefId),
                None => warn!(
                    "Linedef {} references missing sidedef {}, not indexing it.",
                    index,
                    linedef.right_side()
                ),
            }
        }

        let subsector_sectors = gl_subsectors
            .iter()
            .enumerate()
            .map(|(index, subsector)| {
                match subsector_sector(subsector, gl_segs, linedefs, sidedefs) {
                    Some(sector) => Some(sector),
                    None => {
                        warn!("Subsector {} has no seg with a linedef, no sector.", index);
                        None
                    }
                }
            })
            .collect();

        SpatialIndex {
            sector_linedefs,
            subsector_sectors,
        }
    }

    /// The linedefs whose right side faces `sector`.
    pub fn linedefs_in_sector(&self, sector: SectorId) -> &[LinedefId] {
        self.sector_linedefs
            .get(sector as usize)
            .map_or(&[], Vec::as_slice)
    }

    pub fn sector_of_subsector(&self, subsector: usize) -> Option<SectorId> {
        self.subsector_sectors.get(subsector).copied().flatten()
    }

    pub fn num_subsectors(&self) -> usize {
        self.subsector_sectors.len()
    }
}

/// The sector of a subsector is read off the first seg that follows a real
/// linedef; minisegs carry no sidedef and are skipped.
fn subsector_sector(
    subsector: &Subsector,
    gl_segs: &[GlSeg],
    linedefs: &[Linedef],
    sidedefs: &[WadSidedef],
) -> Option<SectorId> {
    let first = subsector.first_seg as usize;
    let segs = gl_segs.get(first..first + subsector.num_segs as usize)?;
    segs.iter().find_map(|seg| {
        let linedef = linedefs.get(seg.linedef? as usize)?;
        let side = if seg.side != 0 {
            linedef.left_side()?
        } else {
            linedef.right_side()
        };
        Some(sidedefs.get(side as usize)?.sector)
    })
}

/// The `BLOCKMAP` lump: a uniform grid over the map, each cell listing the
/// linedefs that cross it. Kept as raw bytes and decoded per query.
#[derive(Debug)]
pub struct BlockMap {
    bytes: Vec<u8>,
    origin_x: i16,
    origin_y: i16,
    columns: u16,
    rows: u16,
}

impl BlockMap {
    pub fn new(bytes: Vec<u8>) -> Result<BlockMap> {
        ensure!(
            bytes.len() >= BLOCKMAP_HEADER_SIZE,
            ErrorKind::bad_blockmap("lump shorter than its header")
        );
        let origin_x = LittleEndian::read_i16(&bytes[0..2]);
        let origin_y = LittleEndian::read_i16(&bytes[2..4]);
        let columns = LittleEndian::read_u16(&bytes[4..6]);
        let rows = LittleEndian::read_u16(&bytes[6..8]);
        let num_blocks = usize::from(columns) * usize::from(rows);
        ensure!(
            bytes.len() >= BLOCKMAP_HEADER_SIZE + num_blocks * 2,
            ErrorKind::bad_blockmap("offset table overruns lump")
        );
        Ok(BlockMap {
            bytes,
            origin_x,
            origin_y,
            columns,
            rows,
        })
    }

    pub fn block_count(&self) -> usize {
        usize::from(self.columns) * usize::from(self.rows)
    }

    /// The linedef indices listed for one block. Offsets are in 16-bit words
    /// from the start of the lump; a single leading zero word is skipped and
    /// the list runs until the end marker.
    pub fn block(&self, index: usize) -> Result<Vec<LinedefId>> {
        ensure!(
            index < self.block_count(),
            ErrorKind::bad_blockmap("block index out of range")
        );
        let offset_at = BLOCKMAP_HEADER_SIZE + index * 2;
        let word_offset = LittleEndian::read_u16(&self.bytes[offset_at..offset_at + 2]);
        let mut at = usize::from(word_offset) * 2;

        let mut linedefs = Vec::new();
        let mut first = true;
        loop {
            ensure!(
                at + 2 <= self.bytes.len(),
                ErrorKind::bad_blockmap("block list overruns lump")
            );
            let value = LittleEndian::read_u16(&self.bytes[at..at + 2]);
            at += 2;
            if first {
                first = false;
                if value == 0 {
                    continue;
                }
            }
            if value == BLOCK_LIST_END {
                return Ok(linedefs);
            }
            linedefs.push(value);
        }
    }

    /// The block containing `point`, or `None` when it falls off the grid.
    pub fn block_at(&self, point: Pnt2f) -> Option<usize> {
        let column = ((point.x - BLOCK_BIAS - f32::from(self.origin_x)) / BLOCK_SIZE).floor();
        let row = ((point.y - BLOCK_BIAS - f32::from(self.origin_y)) / BLOCK_SIZE).floor();
        if column < 0.0 || column >= f32::from(self.columns) {
            return None;
        }
        if row < 0.0 || row >= f32::from(self.rows) {
            return None;
        }
        Some(row as usize * usize::from(self.columns) + column as usize)
    }

    /// The blocks within one cell of `point` in every direction, deduplicated.
    pub fn blocks_near(&self, point: Pnt2f) -> Vec<usize> {
        let mut blocks = Vec::with_capacity(9);
        for &dy in &[-BLOCK_SIZE, 0.0, BLOCK_SIZE] {
            for &dx in &[-BLOCK_SIZE, 0.0, BLOCK_SIZE] {
                if let Some(block) = self.block_at(Pnt2f::new(point.x + dx, point.y + dy)) {
                    if !blocks.contains(&block) {
                        blocks.push(block);
                    }
                }
            }
        }
        blocks
    }

    /// Union of the linedef lists of all blocks near `point`, deduplicated.
    pub fn linedefs_near(&self, point: Pnt2f) -> Result<Vec<LinedefId>> {
        let mut linedefs = Vec::new();
        for block in self.blocks_near(point) {
            for linedef in self.block(block)? {
                if !linedefs.contains(&linedef) {
                    linedefs.push(linedef);
                }
            }
        }
        Ok(linedefs)
    }
}
