use crate::errors::{ErrorKind, Result};
use crate::types::Bounds;
use math::{Line2f, Pnt2f};

/// Traversal gives up after this many steps; a well-formed tree of any size
/// an archive can hold is far shallower, so running past the cap means the
/// node array is cyclic or corrupt.
pub const MAX_TRAVERSAL_DEPTH: usize = 255;

/// A decoded child reference. The version-specific "leaf" high bit is
/// stripped at decode time, so traversal never touches bit masks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Child {
    Branch(usize),
    Leaf(usize),
}

/// One BSP splitting plane with its two half-space children.
#[derive(Copy, Clone, Debug)]
pub struct BspNode {
    pub partition: Line2f,
    pub right_bounds: Bounds,
    pub left_bounds: Bounds,
    pub right: Child,
    pub left: Child,
}

/// The GL node array assembled into a traversable tree. The root is the last
/// node, by convention.
#[derive(Debug, Default)]
pub struct BspTree {
    nodes: Vec<BspNode>,
}

impl BspTree {
    pub fn new(nodes: Vec<BspNode>) -> BspTree {
        BspTree { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    /// Walks the tree to the subsector containing `at`. Points exactly on a
    /// partition line go left, matching the engine convention. Returns
    /// `Ok(None)` when the tree is empty.
    pub fn locate(&self, at: Pnt2f) -> Result<Option<usize>> {
        let mut node = match self.nodes.last() {
            Some(root) => root,
            None => return Ok(None),
        };
        for _ in 0..MAX_TRAVERSAL_DEPTH {
            let is_behind = node.partition.signed_distance(at) <= 0.0;
            let child = if is_behind { node.left } else { node.right };
            match child {
                Child::Leaf(subsector) => return Ok(Some(subsector)),
                Child::Branch(index) => {
                    node = self
                        .nodes
                        .get(index)
                        .ok_or_else(|| ErrorKind::bad_bsp_child(index, self.nodes.len()))?;
                }
            }
        }
        Err(ErrorKind::bsp_depth_exceeded(MAX_TRAVERSAL_DEPTH).into())
    }
}

#[cfg(test)]
mod test {
    use super::{BspNode, BspTree, Child};
    use crate::types::Bounds;
    use math::{Line2f, Pnt2f, Vec2f};

    fn node(
        origin: (f32, f32),
        displace: (f32, f32),
        right: Child,
        left: Child,
    ) -> BspNode {
        let zero = Bounds {
            min: Pnt2f::new(0.0, 0.0),
            max: Pnt2f::new(0.0, 0.0),
        };
        BspNode {
            partition: Line2f::from_origin_and_displace(
                Pnt2f::new(origin.0, origin.1),
                Vec2f::new(displace.0, displace.1),
            ),
            right_bounds: zero,
            left_bounds: zero,
            right,
            left,
        }
    }

    /// Root splits on x = 0 (pointing up); its right half-space is split
    /// again on y = 0 (pointing right).
    fn two_level_tree() -> BspTree {
        BspTree::new(vec![
            node((0.0, 0.0), (1.0, 0.0), Child::Leaf(1), Child::Leaf(2)),
            node((0.0, 0.0), (0.0, 1.0), Child::Branch(0), Child::Leaf(0)),
        ])
    }

    #[test]
    fn locate_descends_to_the_correct_leaf() {
        let tree = two_level_tree();
        // Left of x = 0.
        assert_eq!(tree.locate(Pnt2f::new(-10.0, 3.0)).unwrap(), Some(0));
        // Right of x = 0, above y = 0: behind the second partition.
        assert_eq!(tree.locate(Pnt2f::new(10.0, 3.0)).unwrap(), Some(2));
        // Right of x = 0, below y = 0.
        assert_eq!(tree.locate(Pnt2f::new(10.0, -3.0)).unwrap(), Some(1));
    }

    #[test]
    fn ties_go_left() {
        let tree = two_level_tree();
        assert_eq!(tree.locate(Pnt2f::new(0.0, 5.0)).unwrap(), Some(0));
    }

    #[test]
    fn empty_tree_locates_nothing() {
        assert_eq!(BspTree::default().locate(Pnt2f::new(0.0, 0.0)).unwrap(), None);
    }

    #[test]
    fn cyclic_tree_errors_instead_of_spinning() {
        let tree = BspTree::new(vec![node(
            (0.0, 0.0),
            (0.0, 1.0),
            Child::Branch(0),
            Child::Branch(0),
        )]);
        assert!(tree.locate(Pnt2f::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn out_of_range_branch_errors() {
        let tree = BspTree::new(vec![node(
            (0.0, 0.0),
            (0.0, 1.0),
            Child::Branch(7),
            Child::Branch(7),
        )]);
        assert!(tree.locate(Pnt2f::new(1.0, 1.0)).is_err());
    }
}
