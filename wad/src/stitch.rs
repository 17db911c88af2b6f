//! Vertex storage and the GL-vertex stitching pass.
//!
//! GL node builders emit their own vertex pool, computed independently of
//! the base `VERTEXES` pool and rounded differently. A GL seg endpoint that
//! claims to lie on a linedef can therefore sit slightly off the segment
//! between the linedef's base vertices. Stitching projects such endpoints
//! back onto the segment and substitutes a "virtual" vertex at the projected
//! location, keyed by the arena slot of the vertex it replaces.

use crate::types::{GlSeg, Linedef, VertexRef};
use log::{debug, warn};
use math::{Line2f, Pnt2f};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Pnt2f,
    pub is_gl: bool,
    pub is_virtual: bool,
}

/// All of a level's vertices in one arena: base pool first, then the GL
/// pool, then any virtual vertices appended by stitching. A parallel
/// substitution table redirects stitched slots to their replacement.
#[derive(Debug, Default)]
pub struct VertexPool {
    vertices: Vec<Vertex>,
    base_count: usize,
    gl_count: usize,
    substitutions: Vec<Option<u32>>,
}

impl VertexPool {
    pub fn new(base: Vec<Pnt2f>, gl: Vec<Pnt2f>) -> VertexPool {
        let base_count = base.len();
        let gl_count = gl.len();
        let mut vertices = Vec::with_capacity(base_count + gl_count);
        vertices.extend(base.into_iter().map(|position| Vertex {
            position,
            is_gl: false,
            is_virtual: false,
        }));
        vertices.extend(gl.into_iter().map(|position| Vertex {
            position,
            is_gl: true,
            is_virtual: false,
        }));
        let substitutions = vec![None; vertices.len()];
        VertexPool {
            vertices,
            base_count,
            gl_count,
            substitutions,
        }
    }

    pub fn base_len(&self) -> usize {
        self.base_count
    }

    pub fn gl_len(&self) -> usize {
        self.gl_count
    }

    pub fn num_virtual(&self) -> usize {
        self.vertices.len() - self.base_count - self.gl_count
    }

    fn slot(&self, vertex: VertexRef) -> Option<usize> {
        match vertex {
            VertexRef::Base(id) if (id as usize) < self.base_count => Some(id as usize),
            VertexRef::Gl(id) if (id as usize) < self.gl_count => {
                Some(self.base_count + id as usize)
            }
            _ => None,
        }
    }

    /// The vertex as decoded from the archive, ignoring substitutions.
    pub fn original(&self, vertex: VertexRef) -> Option<Vertex> {
        self.slot(vertex).map(|slot| self.vertices[slot])
    }

    /// The vertex after stitching: the virtual replacement if one exists,
    /// the decoded vertex otherwise.
    pub fn resolved(&self, vertex: VertexRef) -> Option<Vertex> {
        let slot = self.slot(vertex)?;
        match self.substitutions[slot] {
            Some(replacement) => Some(self.vertices[replacement as usize]),
            None => Some(self.vertices[slot]),
        }
    }

    /// Redirects `vertex` to a virtual vertex at `position`. Returns false
    /// if an equal substitution was already in place.
    fn substitute(&mut self, vertex: VertexRef, position: Pnt2f) -> bool {
        let slot = match self.slot(vertex) {
            Some(slot) => slot,
            None => return false,
        };
        if let Some(existing) = self.substitutions[slot] {
            if self.vertices[existing as usize].position == position {
                return false;
            }
            self.vertices[existing as usize].position = position;
            return true;
        }
        let replacement = self.vertices.len() as u32;
        self.vertices.push(Vertex {
            position,
            is_gl: false,
            is_virtual: true,
        });
        self.substitutions[slot] = Some(replacement);
        true
    }
}

/// Runs the stitching pass over every GL seg with a real linedef. Returns
/// the number of substitutions recorded.
pub(crate) fn stitch(
    pool: &mut VertexPool,
    gl_segs: &[GlSeg],
    linedefs: &[Linedef],
) -> usize {
    let mut stitched = 0;
    for seg in gl_segs {
        let linedef = match seg.linedef.and_then(|id| linedefs.get(id as usize)) {
            Some(linedef) => linedef,
            None => continue,
        };
        let from = pool.original(VertexRef::Base(u32::from(linedef.start_vertex())));
        let to = pool.original(VertexRef::Base(u32::from(linedef.end_vertex())));
        let (from, to) = match (from, to) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                warn!(
                    "Linedef {:?} references vertices outside the base pool, skipping stitch.",
                    seg.linedef
                );
                continue;
            }
        };
        let line = Line2f::from_two_points(from.position, to.position);

        for &endpoint in &[seg.start_vertex, seg.end_vertex] {
            let vertex = match endpoint {
                VertexRef::Gl(_) => match pool.original(endpoint) {
                    Some(vertex) => vertex,
                    None => {
                        warn!("GL seg endpoint {:?} is out of range.", endpoint);
                        continue;
                    }
                },
                VertexRef::Base(_) => continue,
            };
            let nearest = line.nearest_point_on_segment(vertex.position);
            if nearest == vertex.position {
                continue;
            }
            if pool.substitute(endpoint, nearest) {
                debug!(
                    "Stitching {:?} ({:?}) to linedef {:?} at {:?}.",
                    endpoint, vertex.position, seg.linedef, nearest
                );
                stitched += 1;
            }
        }
    }
    stitched
}
