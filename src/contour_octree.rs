use crate::{
    cell_octree::{Cell, CellId, CellOctree, Edge, Face},
    tables::*,
};

/// Which way the surface crosses a minimal edge, looking from its low end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crossing {
    /// Low end outside, high end inside.
    Entering,
    /// Low end inside, high end outside.
    Exiting,
}

impl CellOctree {
    /// Visits every minimal edge on the interior of the root cell that the
    /// surface crosses, handing `visit_triangle` the cells whose vertices
    /// make up each facet.
    ///
    /// Each crossed edge yields a quad over the four cells sharing it, split
    /// into two triangles wound so their normals point toward the outside.
    /// When a coarse leaf occupies two of the four positions the degenerate
    /// half of the quad is dropped, which is how cells of different sizes
    /// stitch together without cracks.
    pub fn dual_contour(&mut self, mut visit_triangle: impl FnMut(&mut [Cell], [CellId; 3])) {
        self.clear_stacks();
        let Some(root_id) = self.root_id else { return };

        // The non-recursive algorithm requires 3 stacks that are consumed in
        // this order: cells push faces and edges, faces push faces and edges,
        // edges push edges.
        self.cell_stack.push(root_id);
        while let Some(cell) = self.cell_stack.pop() {
            cell_proc(self, cell);
        }

        while let Some(face) = self.face_stack.pop() {
            face_proc(self, face);
        }

        while let Some(edge) = self.edge_stack.pop() {
            edge_proc(self, edge, &mut visit_triangle);
        }
    }
}

// 8 cells, 12 faces, 6 edges
#[inline]
fn cell_proc(octree: &mut CellOctree, cell_id: CellId) {
    let Some(children) = octree.all_cells[cell_id as usize].children else {
        // Leaves have no interior edges.
        return;
    };

    for &child in children.iter().flatten() {
        octree.cell_stack.push(child);
    }

    // What remains of the interior of the parent cell can be found entirely
    // in the face interiors and edge interiors of the children.
    for axis in 0..3 {
        for pair in FACE_ADJACENT_OCTANTS[axis] {
            if let [Some(f0), Some(f1)] = pair.map(|o| children[o as usize]) {
                octree.face_stack.push(Face {
                    axis,
                    cells: [f0, f1],
                });
            }
        }

        for quartet in EDGE_ADJACENT_OCTANTS[axis] {
            if let [Some(e0), Some(e1), Some(e2), Some(e3)] = quartet.map(|o| children[o as usize])
            {
                octree.edge_stack.push(Edge {
                    axis,
                    cells: [e0, e1, e2, e3],
                });
            }
        }
    }
}

/// A leaf keeps participating in place of the children it doesn't have.
#[inline]
fn child_or_self(octree: &CellOctree, parent: CellId, octant: u8) -> Option<CellId> {
    let cell = &octree.all_cells[parent as usize];
    if cell.is_leaf() {
        Some(parent)
    } else {
        cell.child(octant)
    }
}

// 4 faces and 4 edges
#[inline]
fn face_proc(octree: &mut CellOctree, face: Face) {
    // PRECONDITION: `face` cells are given in increasing order (- side of face to + side).

    let [c0, c1] = face.cells.map(|i| &octree.all_cells[i as usize]);
    if c0.is_leaf() && c1.is_leaf() {
        // No edges on the face interior.
        return;
    }

    // Split both sides, mirroring the octants because they have different
    // parents:
    //
    // ```
    // +--+--+--+--+
    // |  | x|x |  |
    // +--+--+--+--+
    // |  | x|x |  |
    // +--+--+--+--+
    //   f0    f1
    // ```
    for o in FACE_ADJACENT_OCTANTS[face.axis] {
        if let [Some(f0), Some(f1)] = [
            child_or_self(octree, face.cells[0], o[1]),
            child_or_self(octree, face.cells[1], o[0]),
        ] {
            octree.face_stack.push(Face {
                axis: face.axis,
                cells: [f0, f1],
            });
        }
    }

    for edge_i in 0..4 {
        let o = FACE_TO_EDGE_ADJACENT_OCTANTS[face.axis][edge_i];
        // Depending on the orientation of the Z curve relative to the parent
        // octants we have to change the order in which we select from the
        // parents and how we mirror across the face.
        let order = FACE_TO_EDGE_NODE_ORDERS[edge_i];
        let mirror = FACE_TO_EDGE_MIRRORS[edge_i];

        let next_edge =
            [0, 1, 2, 3].map(|i| child_or_self(octree, face.cells[order[i]], o[mirror[i]]));
        if let [Some(e0), Some(e1), Some(e2), Some(e3)] = next_edge {
            octree.edge_stack.push(Edge {
                // "Face axis" is not the same as "edge axis."
                axis: FACE_TO_EDGE_AXIS[face.axis][edge_i],
                cells: [e0, e1, e2, e3],
            });
        }
    }
}

// 2 edges
#[inline]
fn edge_proc(
    octree: &mut CellOctree,
    edge: Edge,
    visit_triangle: &mut impl FnMut(&mut [Cell], [CellId; 3]),
) {
    // PRECONDITION: `edge` cells are given in Z order.
    //
    //     e0 e1    00 01
    //     e2 e3    10 11

    let edge_cells = edge.cells.map(|i| &octree.all_cells[i as usize]);
    if edge_cells.iter().all(|c| c.is_leaf()) {
        process_edge(octree, edge, visit_triangle);
        return;
    }

    // Bisect the edge. Diagonal octants are swapped because they have
    // different parents:
    //
    // ```
    // +--+--+  +--+--+
    // |  |  |  |  |  |
    // +--+--+  +--+--+
    // |  | x|  |x |  |
    // +--+--+  +--+--+
    //    e0       e1
    //
    // +--+--+  +--+--+
    // |  | x|  |x |  |
    // +--+--+  +--+--+
    // |  |  |  |  |  |
    // +--+--+  +--+--+
    //    e2       e3
    // ```
    for o in EDGE_ADJACENT_OCTANTS[edge.axis] {
        let next_edge = [0, 1, 2, 3].map(|i| child_or_self(octree, edge.cells[i], o[3 - i]));
        if let [Some(e0), Some(e1), Some(e2), Some(e3)] = next_edge {
            octree.edge_stack.push(Edge {
                axis: edge.axis,
                cells: [e0, e1, e2, e3],
            });
        }
    }
}

/// Decides whether a minimal edge is crossed, from the corner signs of the
/// smallest of the four cells around it (the only one for which the edge is a
/// whole cell edge).
pub(crate) fn edge_crossing(cells: [&Cell; 4], axis: usize) -> Option<Crossing> {
    let mut min_cell = 0;
    for (i, cell) in cells.iter().enumerate() {
        if cell.size < cells[min_cell].size {
            min_cell = i;
        }
    }
    let [c0, c1] = shared_edge_corners(axis, min_cell);
    let cell = cells[min_cell];
    match (cell.is_inside_at(c0), cell.is_inside_at(c1)) {
        (false, true) => Some(Crossing::Entering),
        (true, false) => Some(Crossing::Exiting),
        _ => None,
    }
}

fn process_edge(
    octree: &mut CellOctree,
    edge: Edge,
    visit_triangle: &mut impl FnMut(&mut [Cell], [CellId; 3]),
) {
    let edge_cells = edge.cells.map(|i| &octree.all_cells[i as usize]);
    let Some(crossing) = edge_crossing(edge_cells, edge.axis) else {
        return;
    };
    let tris = match crossing {
        Crossing::Entering => QUAD_TRIANGLES,
        Crossing::Exiting => FLIPPED_QUAD_TRIANGLES,
    };
    for tri in tris {
        let ids = tri.map(|i| edge.cells[i]);
        // A cell repeated around the edge collapses this half of the quad.
        if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
            continue;
        }
        visit_triangle(octree.all_cells.as_mut_slice(), ids);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ContourConfig;
    use glam::{IVec3, Vec3A};

    fn count_triangles(octree: &mut CellOctree) -> Vec<[CellId; 3]> {
        let mut tris = Vec::new();
        octree.dual_contour(|_, t| tris.push(t));
        tris
    }

    #[test]
    fn empty_octree_has_no_triangles() {
        let config = ContourConfig::new(1, 8, IVec3::ZERO);
        let mut octree = CellOctree::build(&config, &|_: Vec3A| 1.0f32).unwrap();
        assert!(count_triangles(&mut octree).is_empty());
    }

    #[test]
    fn plane_emits_two_triangles_per_interior_edge() {
        // z = 3.5 crosses the 7x7 interior z edges between z = 3 and z = 4.
        let config = ContourConfig::new(1, 8, IVec3::ZERO).with_simplification(None);
        let mut octree = CellOctree::build(&config, &|p: Vec3A| p.z - 3.5).unwrap();
        let tris = count_triangles(&mut octree);
        assert_eq!(tris.len(), 2 * 7 * 7);
        for tri in tris {
            for id in tri {
                let cell = octree.cell(id);
                assert!(cell.is_leaf());
                assert_eq!(cell.min.z, 3);
            }
        }
    }

    #[test]
    fn crossing_direction_follows_signs() {
        let config = ContourConfig::new(1, 2, IVec3::ZERO).with_simplification(None);
        let octree = CellOctree::build(&config, &|p: Vec3A| p.z - 0.5).unwrap();
        let root = octree.root().unwrap();
        let children = root.children.unwrap();
        // The four bottom octants surround the central z edge.
        let quartet = EDGE_ADJACENT_OCTANTS[2][0].map(|o| octree.cell(children[o as usize].unwrap()));
        assert_eq!(edge_crossing(quartet, 2), Some(Crossing::Exiting));

        let octree = CellOctree::build(&config, &|p: Vec3A| 0.5 - p.z).unwrap();
        let children = octree.root().unwrap().children.unwrap();
        let quartet = EDGE_ADJACENT_OCTANTS[2][0].map(|o| octree.cell(children[o as usize].unwrap()));
        assert_eq!(edge_crossing(quartet, 2), Some(Crossing::Entering));
    }

    #[test]
    fn repeated_traversal_is_deterministic() {
        let config = ContourConfig::new(1, 8, IVec3::ZERO);
        let field = |p: Vec3A| (p - Vec3A::splat(4.0)).length() - 2.5;
        let mut octree = CellOctree::build(&config, &field).unwrap();
        let a = count_triangles(&mut octree);
        let b = count_triangles(&mut octree);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
