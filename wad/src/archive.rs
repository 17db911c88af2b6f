use crate::errors::{ErrorKind, Result};
use crate::level::Level;
use crate::name::IntoWadName;
use crate::types::{WadInfo, WadLump, WadName};
use failchain::{ensure, ResultExt};
use indexmap::IndexMap;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::borrow::Borrow;
use std::fs::File;
use std::hash::Hash;
use std::io::{Cursor, Read};
use std::mem;
use std::path::Path;

const IWAD_IDENTIFIER: &[u8] = b"IWAD";
const PWAD_IDENTIFIER: &[u8] = b"PWAD";
const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Lump names that may belong to a level's contiguous lump run, in addition
/// to the level's own `GL_<label>` companion marker.
pub(crate) const LEVEL_LUMP_NAMES: &[&[u8; 8]] = &[
    b"THINGS\0\0",
    b"LINEDEFS",
    b"SIDEDEFS",
    b"VERTEXES",
    b"SEGS\0\0\0\0",
    b"SSECTORS",
    b"NODES\0\0\0",
    b"SECTORS\0",
    b"REJECT\0\0",
    b"BLOCKMAP",
    b"BEHAVIOR",
    b"SCRIPTS\0",
    b"GL_LEVEL",
    b"GL_VERT\0",
    b"GL_SEGS\0",
    b"GL_SSECT",
    b"GL_NODES",
    b"GL_PVS\0\0",
    b"WADCSRC\0",
];

pub(crate) fn is_level_lump_name(name: &WadName) -> bool {
    LEVEL_LUMP_NAMES.iter().any(|&known| name == known)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Iwad,
    Pwad,
}

/// A single WAD file, held entirely in memory. The byte buffer is immutable
/// for the lifetime of the archive; all lump access decodes out of it.
#[derive(Debug)]
pub struct Archive {
    bytes: Vec<u8>,
    lumps: Vec<LumpInfo>,
    index_map: IndexMap<WadName, usize>,
    levels: Vec<usize>,
    kind: ArchiveKind,
}

impl Archive {
    pub fn open<W>(wad_path: &W) -> Result<Archive>
    where
        W: AsRef<Path> + std::fmt::Debug,
    {
        info!("Loading wad file {:?}...", wad_path);
        let mut bytes = Vec::new();
        File::open(wad_path.as_ref())
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .chain_err(ErrorKind::on_file_open)?;
        Archive::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Archive> {
        let header: WadInfo = bincode::deserialize_from(Cursor::new(&bytes))
            .chain_err(ErrorKind::bad_wad_header)?;

        let kind = match &header.identifier[..] {
            identifier if identifier == IWAD_IDENTIFIER => ArchiveKind::Iwad,
            identifier if identifier == PWAD_IDENTIFIER => ArchiveKind::Pwad,
            identifier => {
                return Err(ErrorKind::bad_wad_header_identifier(identifier).into());
            }
        };

        let directory_start = header.info_table_offset;
        let directory_size = (header.num_lumps as i64) * (DIRECTORY_ENTRY_SIZE as i64);
        ensure!(
            header.num_lumps >= 0
                && directory_start >= 0
                && (directory_start as i64) + directory_size <= bytes.len() as i64,
            ErrorKind::directory_out_of_bounds(
                header.info_table_offset,
                header.num_lumps,
                bytes.len()
            ),
        );

        let mut lumps = Vec::with_capacity(header.num_lumps as usize);
        let mut index_map = IndexMap::new();
        let mut cursor = Cursor::new(&bytes[directory_start as usize..]);
        for i_lump in 0..header.num_lumps {
            let fileinfo: WadLump = bincode::deserialize_from(&mut cursor)
                .chain_err(|| ErrorKind::bad_lump_info(i_lump))?;
            ensure!(
                fileinfo.file_pos >= 0
                    && fileinfo.size >= 0
                    && (fileinfo.file_pos as i64) + (fileinfo.size as i64) <= bytes.len() as i64,
                ErrorKind::bad_lump_info(i_lump),
            );

            // The first lump with a given name wins; level lumps repeat by
            // design, anything else repeating is worth flagging.
            let previous = *index_map.entry(fileinfo.name).or_insert(i_lump as usize);
            if previous != i_lump as usize && !is_level_lump_name(&fileinfo.name) {
                warn!(
                    "Lump {} `{}` is double defined (first at {}).",
                    i_lump, fileinfo.name, previous
                );
            }

            lumps.push(LumpInfo {
                name: fileinfo.name,
                offset: fileinfo.file_pos as usize,
                size: fileinfo.size as usize,
            });
        }

        let levels = find_level_markers(&lumps);
        info!(
            "Loaded {:?} archive: {} lumps, {} levels.",
            kind,
            lumps.len(),
            levels.len()
        );

        Ok(Archive {
            bytes,
            lumps,
            index_map,
            levels,
            kind,
        })
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The labels of every level found in this archive, in directory order.
    pub fn level_names(&self) -> Vec<WadName> {
        self.levels
            .iter()
            .map(|&index| self.lumps[index].name)
            .collect()
    }

    /// The label of the level that follows `label`, in directory order.
    pub fn next_level_name(&self, label: WadName) -> Option<WadName> {
        let names = self.level_names();
        let current = names.iter().position(|&name| name == label)?;
        names.get(current + 1).copied()
    }

    pub fn level_lump(&self, level_index: usize) -> Result<LumpReader> {
        self.lump_by_index(self.levels[level_index])
    }

    pub fn load_level<'a, Q>(&self, label: &'a Q) -> Result<Level>
    where
        Q: ?Sized,
        &'a Q: IntoWadName,
    {
        Level::from_archive(self, label.into_wad_name()?)
    }

    pub fn required_named_lump<'a, Q>(&self, name: &'a Q) -> Result<LumpReader>
    where
        Q: ?Sized,
        &'a Q: IntoWadName,
    {
        let name: WadName = name.into_wad_name()?;
        self.named_lump(&name)?
            .ok_or_else(|| ErrorKind::missing_required_lump(&name).into())
    }

    pub fn named_lump<Q>(&self, name: &Q) -> Result<Option<LumpReader>>
    where
        WadName: Borrow<Q>,
        Q: Hash + Eq,
    {
        match self.index_map.get(name) {
            Some(&index) => self.lump_by_index(index).map(Some),
            None => Ok(None),
        }
    }

    pub fn lump_by_index(&self, index: usize) -> Result<LumpReader> {
        Ok(LumpReader {
            archive: self,
            info: self
                .lumps
                .get(index)
                .ok_or_else(|| ErrorKind::missing_required_lump(&index))?,
            index,
        })
    }
}

/// Detects level label entries: a zero-length lump immediately followed by
/// `THINGS` and `LINEDEFS` (and `SIDEDEFS`, when the directory continues).
fn find_level_markers(lumps: &[LumpInfo]) -> Vec<usize> {
    let mut levels = Vec::with_capacity(64);
    for (index, lump) in lumps.iter().enumerate() {
        if lump.size != 0 {
            continue;
        }
        let names_match = lumps.get(index + 1).map_or(false, |next| next.name == *b"THINGS\0\0")
            && lumps.get(index + 2).map_or(false, |next| next.name == *b"LINEDEFS")
            && lumps
                .get(index + 3)
                .map_or(true, |next| next.name == *b"SIDEDEFS");
        if names_match {
            levels.push(index);
        }
    }
    levels
}

/// A stack of overlaid archives. Later additions shadow earlier ones for any
/// lump name collision, directory-style.
#[derive(Debug, Default)]
pub struct ArchiveStack {
    archives: Vec<Archive>,
}

impl ArchiveStack {
    pub fn new() -> ArchiveStack {
        ArchiveStack::default()
    }

    pub fn add(&mut self, archive: Archive) {
        if self.archives.is_empty() && archive.kind() != ArchiveKind::Iwad {
            warn!("First archive in the stack is not an IWAD.");
        }
        self.archives.push(archive);
    }

    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    pub fn named_lump<Q>(&self, name: &Q) -> Result<Option<LumpReader>>
    where
        WadName: Borrow<Q>,
        Q: Hash + Eq,
    {
        for archive in self.archives.iter().rev() {
            if let Some(lump) = archive.named_lump(name)? {
                return Ok(Some(lump));
            }
        }
        Ok(None)
    }

    /// Level labels across the whole stack; a label shadowed by a later
    /// archive is listed once, at its most recent position.
    pub fn level_names(&self) -> Vec<WadName> {
        let mut names = Vec::new();
        for archive in self.archives.iter().rev() {
            for name in archive.level_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Loads the named level from the most recently added archive that
    /// carries it.
    pub fn load_level<'a, Q>(&self, label: &'a Q) -> Result<Level>
    where
        Q: ?Sized,
        &'a Q: IntoWadName,
    {
        let label: WadName = label.into_wad_name()?;
        for archive in self.archives.iter().rev() {
            if archive.level_names().contains(&label) {
                return Level::from_archive(archive, label);
            }
        }
        Err(ErrorKind::missing_required_lump(&label).into())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct LumpReader<'a> {
    archive: &'a Archive,
    info: &'a LumpInfo,
    index: usize,
}

impl<'a> LumpReader<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> WadName {
        self.info.name
    }

    pub fn size(&self) -> usize {
        self.info.size
    }

    pub fn is_virtual(&self) -> bool {
        self.info.size == 0
    }

    /// The lump's raw bytes, borrowed from the archive buffer.
    pub fn bytes(&self) -> &'a [u8] {
        &self.archive.bytes[self.info.offset..self.info.offset + self.info.size]
    }

    pub fn read_bytes(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    /// Decodes the whole lump as a tightly packed array of `T`.
    pub fn decode_vec<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.decode_vec_from(0)
    }

    /// Decodes the lump as an array of `T` after skipping `skip` header
    /// bytes (the `gNd<digit>` marker of versioned GL lumps).
    pub fn decode_vec_from<T: DeserializeOwned>(&self, skip: usize) -> Result<Vec<T>> {
        let LumpReader { info, index, .. } = *self;
        let element_size = mem::size_of::<T>();
        let bytes = self.bytes();
        ensure!(
            bytes.len() >= skip && (bytes.len() - skip) % element_size == 0,
            ErrorKind::bad_lump_size(index, info.name.as_ref(), info.size, element_size),
        );
        let num_elements = (bytes.len() - skip) / element_size;
        let mut cursor = Cursor::new(&bytes[skip..]);
        (0..num_elements)
            .map(|i_element| {
                bincode::deserialize_from(&mut cursor).chain_err(|| {
                    ErrorKind::bad_lump_element(index, info.name.as_ref(), i_element)
                })
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug)]
struct LumpInfo {
    name: WadName,
    offset: usize,
    size: usize,
}
