use failchain::{BoxedError, ChainErrorKind};
use failure::Fail;
use std::fmt::Debug;
use std::result::Result as StdResult;

pub type Error = BoxedError<ErrorKind>;
pub type Result<T> = StdResult<T, Error>;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "Corrupt WAD file: {}", 0)]
    CorruptWad(String),

    #[fail(display = "I/O WAD error: {}", 0)]
    Io(String),

    #[fail(display = "Unsupported query: {}", 0)]
    Unsupported(String),
}

impl ErrorKind {
    pub(crate) fn invalid_byte_in_wad_name(byte: u8, bytes: &[u8]) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Invalid character `{}` in wad name `{}`.",
            char::from(byte),
            String::from_utf8_lossy(bytes),
        ))
    }

    pub(crate) fn wad_name_too_long(bytes: &[u8]) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Wad name too long `{}`.",
            String::from_utf8_lossy(bytes)
        ))
    }

    pub(crate) fn on_file_open() -> ErrorKind {
        ErrorKind::Io("Failed to open file.".to_owned())
    }

    pub(crate) fn bad_wad_header() -> ErrorKind {
        ErrorKind::CorruptWad("Could not read WAD header.".to_owned())
    }

    pub(crate) fn bad_wad_header_identifier(identifier: &[u8]) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Invalid header identifier: {}",
            String::from_utf8_lossy(identifier)
        ))
    }

    pub(crate) fn directory_out_of_bounds(offset: i32, num_lumps: i32, wad_size: usize) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Directory at offset {} with {} entries overruns WAD of {} bytes",
            offset, num_lumps, wad_size
        ))
    }

    pub(crate) fn bad_lump_info(lump_index: i32) -> ErrorKind {
        ErrorKind::CorruptWad(format!("Invalid lump info for lump {}", lump_index))
    }

    pub(crate) fn bad_lump_element(lump_index: usize, lump_name: &str, element_index: usize) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Invalid element {} in lump `{}` (index={})",
            element_index, lump_name, lump_index
        ))
    }

    pub(crate) fn bad_lump_size(
        index: usize,
        name: &str,
        total_size: usize,
        element_size: usize,
    ) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Invalid lump size in `{}` (index={}): total={}, element={}, mod={}",
            name,
            index,
            total_size,
            element_size,
            total_size % element_size
        ))
    }

    pub(crate) fn missing_required_lump<NameT: Debug>(name: &NameT) -> ErrorKind {
        ErrorKind::CorruptWad(format!("Missing required lump {:?}", name))
    }

    pub(crate) fn not_a_level_marker<NameT: Debug>(name: &NameT) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "Lump {:?} does not start a level (expected THINGS/LINEDEFS/SIDEDEFS to follow)",
            name
        ))
    }

    pub(crate) fn bad_blockmap(message: &str) -> ErrorKind {
        ErrorKind::CorruptWad(format!("Invalid BLOCKMAP lump: {}", message))
    }

    pub(crate) fn bad_bsp_child(index: usize, num_nodes: usize) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "BSP branch references node {} of {}",
            index, num_nodes
        ))
    }

    pub(crate) fn bsp_depth_exceeded(depth: usize) -> ErrorKind {
        ErrorKind::CorruptWad(format!(
            "BSP traversal exceeded maximum depth {}, tree is cyclic or corrupt",
            depth
        ))
    }

    pub(crate) fn no_bsp_tree<NameT: Debug>(name: &NameT) -> ErrorKind {
        ErrorKind::Unsupported(format!(
            "Level {:?} carries no GL nodes, point location is unavailable",
            name
        ))
    }
}

impl ChainErrorKind for ErrorKind {
    type Error = Error;
}
