use crate::qef::Qef;
use glam::{IVec3, Vec3A};
use ilattice::prelude::Extent;

/// A scalar density field whose zero level set is the surface to extract.
///
/// Negative values are inside, non-negative values are outside. Evaluation
/// must be free of side effects since the sample cache calls it from many
/// threads.
pub trait DensityField: Sync {
    fn density(&self, p: Vec3A) -> f32;
}

impl<F> DensityField for F
where
    F: Fn(Vec3A) -> f32 + Sync,
{
    #[inline]
    fn density(&self, p: Vec3A) -> f32 {
        self(p)
    }
}

/// Offset of corner `i` of a unit cube, in the same Z order as octants.
#[inline]
pub fn corner_offset(i: usize) -> IVec3 {
    IVec3::new((i & 1) as i32, ((i >> 1) & 1) as i32, ((i >> 2) & 1) as i32)
}

#[inline]
pub fn is_inside(sample: f32) -> bool {
    sample < 0.0
}

/// Bit `i` is set iff corner `i` is inside.
pub fn corner_mask(samples: &[f32; 8]) -> u8 {
    samples
        .iter()
        .enumerate()
        .fold(0, |mask, (i, &s)| mask | ((is_inside(s) as u8) << i))
}

#[inline]
pub fn mask_is_bipolar(mask: u8) -> bool {
    mask != 0 && mask != u8::MAX
}

pub fn central_gradient(field: &impl DensityField, p: Vec3A, delta: f32) -> Vec3A {
    let h = 0.5 * delta;
    let dx = Vec3A::new(h, 0.0, 0.0);
    let dy = Vec3A::new(0.0, h, 0.0);
    let dz = Vec3A::new(0.0, 0.0, h);
    Vec3A::new(
        field.density(p + dx) - field.density(p - dx),
        field.density(p + dy) - field.density(p - dy),
        field.density(p + dz) - field.density(p - dz),
    ) / delta
}

/// Interpolation parameter of the zero crossing between `s1` (at `t = 0`)
/// and `s2` (at `t = 1`).
#[inline]
pub fn crossing_parameter(s1: f32, s2: f32) -> f32 {
    let t = s1 / (s1 - s2);
    if t.is_finite() {
        t.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Accumulates one constraint plane per bipolar edge of the cell.
///
/// Crossings are linearly interpolated from the corner samples. Normals come
/// from the field gradient, falling back to the crossed edge's direction
/// (pointing from inside to outside) when the gradient is degenerate.
///
/// The QEF is centered on the cell's minimum corner and crossings are
/// interpolated in that frame, so the constraints do not depend on where the
/// cell sits in the world.
pub fn estimate_leaf_qef(
    extent: &Extent<Vec3A>,
    samples: &[f32; 8],
    field: &impl DensityField,
    gradient_step: f32,
) -> Qef {
    let origin = extent.minimum;
    let mut qef = Qef::new(origin);

    let corners = extent.corners3().map(|c| c - origin);
    for [e1, e2] in Extent::<Vec3A>::EDGES3 {
        let s1 = samples[e1];
        let s2 = samples[e2];
        if is_inside(s1) == is_inside(s2) {
            continue;
        }
        let t = crossing_parameter(s1, s2);
        let edge_cross_p = corners[e1].lerp(corners[e2], t);

        let gradient = central_gradient(field, origin + edge_cross_p, gradient_step);
        let normal = if gradient.is_finite() && gradient.length_squared() > f32::EPSILON {
            gradient.normalize()
        } else {
            let edge_dir = (corners[e2] - corners[e1]).normalize();
            if is_inside(s1) {
                edge_dir
            } else {
                -edge_dir
            }
        };

        qef.accumulate_local(edge_cross_p, normal);
    }

    qef
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit_extent() -> Extent<Vec3A> {
        Extent::from_min_and_lub(Vec3A::ZERO, Vec3A::ONE)
    }

    #[test]
    fn corner_mask_follows_octant_order() {
        let samples = [-1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, -0.5];
        assert_eq!(corner_mask(&samples), 0b1000_0001);
        assert!(mask_is_bipolar(corner_mask(&samples)));
        assert!(!mask_is_bipolar(corner_mask(&[1.0; 8])));
        assert!(!mask_is_bipolar(corner_mask(&[-1.0; 8])));
    }

    #[test]
    fn corner_offsets_match_extent_corners() {
        let corners = unit_extent().corners3();
        for (i, c) in corners.iter().enumerate() {
            assert_eq!(*c, corner_offset(i).as_vec3a());
        }
    }

    #[test]
    fn crossing_parameter_is_robust() {
        assert_eq!(crossing_parameter(-1.0, 1.0), 0.5);
        assert_eq!(crossing_parameter(-1.0, 3.0), 0.25);
        assert!(crossing_parameter(-1.0, f32::MAX) < 1e-6);
        assert_eq!(crossing_parameter(f32::NAN, 1.0), 0.5);
    }

    #[test]
    fn plane_cell_has_four_constraints() {
        let field = |p: Vec3A| p.z - 0.25;
        let extent = unit_extent();
        let samples = extent.corners3().map(|p| field(p));
        let qef = estimate_leaf_qef(&extent, &samples, &field, 0.01);
        assert_eq!(qef.num_planes(), 4);
        let p = qef.solve(Vec3A::ZERO, Vec3A::ONE);
        assert!((p.z - 0.25).abs() < 1e-5);
        assert!((qef.average_normal() - Vec3A::Z).length() < 1e-4);
    }

    #[test]
    fn degenerate_gradient_falls_back_to_edge_direction() {
        // Sign flips along x but the field is flat wherever the gradient samples it.
        let field = |p: Vec3A| -> f32 {
            if p.x == 0.0 {
                -1.0
            } else if p.x == 1.0 {
                1.0
            } else {
                0.0
            }
        };
        let extent = unit_extent();
        let samples = extent.corners3().map(|p| field(p));
        let qef = estimate_leaf_qef(&extent, &samples, &field, 0.01);
        assert_eq!(qef.num_planes(), 4);
        assert!((qef.average_normal() - Vec3A::X).length() < 1e-6);
    }
}
