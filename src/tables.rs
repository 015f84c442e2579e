//! Octant case tables for the cell/face/edge contouring procedures.
//!
//! Octant (and corner) `i` has offset `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`.
//! Around an edge parallel to `axis`, the four cells are listed in Z order over
//! the two remaining axes taken cyclically: `(axis + 1) + 2 * (axis + 2)`.

/// Pairs of octants `[o0, o1]` sharing a face perpendicular to the axis, `o0`
/// on the negative side. Four per axis, twelve in total.
pub const FACE_ADJACENT_OCTANTS: [[[u8; 2]; 4]; 3] = [
    [
        //  -X     +X
        [0b000, 0b001],
        [0b010, 0b011],
        [0b100, 0b101],
        [0b110, 0b111],
    ],
    [
        //  -Y     +Y
        [0b000, 0b010],
        [0b001, 0b011],
        [0b100, 0b110],
        [0b101, 0b111],
    ],
    [
        //  -Z     +Z
        [0b000, 0b100],
        [0b001, 0b101],
        [0b010, 0b110],
        [0b011, 0b111],
    ],
];

// Quartets of octants around the half of an internal edge on the negative or
// positive side of the cell center.
const EDGE_NEG_X: [u8; 4] = [0b000, 0b010, 0b100, 0b110];
const EDGE_POS_X: [u8; 4] = [0b001, 0b011, 0b101, 0b111];
const EDGE_NEG_Y: [u8; 4] = [0b000, 0b100, 0b001, 0b101];
const EDGE_POS_Y: [u8; 4] = [0b010, 0b110, 0b011, 0b111];
const EDGE_NEG_Z: [u8; 4] = [0b000, 0b001, 0b010, 0b011];
const EDGE_POS_Z: [u8; 4] = [0b100, 0b101, 0b110, 0b111];

/// Quartets of octants sharing an internal edge parallel to the axis. Two per
/// axis, six in total.
pub const EDGE_ADJACENT_OCTANTS: [[[u8; 4]; 2]; 3] = [
    [EDGE_NEG_X, EDGE_POS_X],
    [EDGE_NEG_Y, EDGE_POS_Y],
    [EDGE_NEG_Z, EDGE_POS_Z],
];

/// For a face perpendicular to the axis, the octant quartets that give the
/// four edges lying in the face interior.
pub const FACE_TO_EDGE_ADJACENT_OCTANTS: [[[u8; 4]; 4]; 3] = [
    [EDGE_NEG_Y, EDGE_POS_Y, EDGE_NEG_Z, EDGE_POS_Z],
    [EDGE_NEG_Z, EDGE_POS_Z, EDGE_NEG_X, EDGE_POS_X],
    [EDGE_NEG_X, EDGE_POS_X, EDGE_NEG_Y, EDGE_POS_Y],
];
/// Axis of each face-interior edge.
pub const FACE_TO_EDGE_AXIS: [[usize; 4]; 3] = [[1, 1, 2, 2], [2, 2, 0, 0], [0, 0, 1, 1]];
/// Which side of the face (0 = negative, 1 = positive) supplies the cell at
/// each position of the face-interior edge.
pub const FACE_TO_EDGE_NODE_ORDERS: [[usize; 4]; 4] =
    [[0, 0, 1, 1], [0, 0, 1, 1], [0, 1, 0, 1], [0, 1, 0, 1]];
/// Position within the quartet of the child to take, mirrored across the face.
pub const FACE_TO_EDGE_MIRRORS: [[usize; 4]; 4] =
    [[2, 3, 0, 1], [2, 3, 0, 1], [1, 0, 3, 2], [1, 0, 3, 2]];

/// Triangles over the quartet positions when the edge runs from outside (low
/// end) to inside (high end). The quad normal then points toward the low end.
pub const QUAD_TRIANGLES: [[usize; 3]; 2] = [[0, 2, 1], [1, 2, 3]];
/// Triangles when the edge runs from inside to outside.
pub const FLIPPED_QUAD_TRIANGLES: [[usize; 3]; 2] = [[0, 1, 2], [1, 3, 2]];

/// Corners `[low, high]` of the cell-local edge a cell at quartet position
/// `i` contributes to the shared edge.
#[inline]
pub fn shared_edge_corners(axis: usize, position: usize) -> [usize; 2] {
    let octants = EDGE_ADJACENT_OCTANTS[axis];
    let opposite = 3 - position;
    [octants[0][opposite] as usize, octants[1][opposite] as usize]
}
