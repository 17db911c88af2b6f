/// Which thing/linedef record layout a level uses. Selected by the presence
/// of a `BEHAVIOR` lump in the level's lump run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapFormat {
    Doom,
    Hexen,
}

/// Resolved format revisions for the four GL-extension lump families.
///
/// A version of 0 means the lump is absent. Versions are resolved once per
/// level and drive every GL record decoder; they are never re-inspected per
/// record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlVersions {
    pub vertices: u8,
    pub segs: u8,
    pub subsectors: u8,
    pub nodes: u8,
}

impl GlVersions {
    /// Resolves all four versions from the first bytes of each GL lump.
    ///
    /// The vertex lump is authoritative: without a `gNd<digit>` marker it is
    /// version 1 (raw 16-bit pairs), with one it is whatever the digit says.
    /// Seg/subsector/node lumps take their own marker when they carry one and
    /// inherit the resolved vertex version otherwise.
    pub fn resolve(
        vertices: Option<&[u8]>,
        segs: Option<&[u8]>,
        subsectors: Option<&[u8]>,
        nodes: Option<&[u8]>,
    ) -> GlVersions {
        let vertices = match vertices {
            None => 0,
            Some(lump) => magic_version(lump).unwrap_or(1),
        };
        let dependent = |lump: Option<&[u8]>| match lump {
            None => 0,
            Some(lump) => magic_version(lump).unwrap_or(vertices),
        };
        GlVersions {
            vertices,
            segs: dependent(segs),
            subsectors: dependent(subsectors),
            nodes: dependent(nodes),
        }
    }

    pub fn any(&self) -> bool {
        self.vertices > 0 || self.segs > 0 || self.subsectors > 0 || self.nodes > 0
    }
}

/// Parses the `gNd<digit>` magic marker from the head of a GL lump.
pub(crate) fn magic_version(lump: &[u8]) -> Option<u8> {
    if lump.len() >= 4 && &lump[..3] == b"gNd" && lump[3].is_ascii_digit() {
        Some(lump[3] - b'0')
    } else {
        None
    }
}
