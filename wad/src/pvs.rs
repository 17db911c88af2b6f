//! The `GL_PVS` lump: one row of bits per subsector, bit `n` of row `m` set
//! when subsector `n` is potentially visible from subsector `m`. Rows are
//! padded to whole bytes.

#[derive(Debug, Default)]
pub struct VisibilitySet {
    bytes: Vec<u8>,
    subsector_count: usize,
    row_stride: usize,
}

impl VisibilitySet {
    pub fn new(bytes: Vec<u8>, subsector_count: usize) -> VisibilitySet {
        VisibilitySet {
            bytes,
            subsector_count,
            row_stride: (subsector_count + 7) / 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn subsector_count(&self) -> usize {
        self.subsector_count
    }

    /// Whether `to` is potentially visible from `from`. Out of range indices
    /// and truncated rows read as not visible.
    pub fn is_visible(&self, from: usize, to: usize) -> bool {
        if from >= self.subsector_count || to >= self.subsector_count {
            return false;
        }
        match self.bytes.get(from * self.row_stride + to / 8) {
            Some(byte) => byte & (1 << (to & 7)) != 0,
            None => false,
        }
    }

    /// All subsectors potentially visible from `from`, in index order.
    pub fn visible_from(&self, from: usize) -> Vec<usize> {
        (0..self.subsector_count)
            .filter(|&to| self.is_visible(from, to))
            .collect()
    }
}
