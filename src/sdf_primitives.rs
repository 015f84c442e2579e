//! Density fields for common shapes.
//!
//! Free functions follow the usual signed-distance conventions (negative
//! inside). [`PerlinTerrain`] wraps a noise generator into a
//! [`DensityField`] that can be shared across sampling threads.

use crate::DensityField;
use glam::{Vec2, Vec3A, Vec3Swizzles};
use noise::{NoiseFn, Perlin};

pub fn sphere(r: f32, p: Vec3A) -> f32 {
    p.length() - r
}

/// Half-space below the plane through `o` with normal `n`.
pub fn plane(o: Vec3A, n: Vec3A, p: Vec3A) -> f32 {
    (p - o).dot(n)
}

/// Axis-aligned box with half extents `b`.
pub fn cuboid(b: Vec3A, p: Vec3A) -> f32 {
    let q = p.abs() - b;
    q.max(Vec3A::ZERO).length() + q.max_element().min(0.0)
}

pub fn torus(t: Vec2, p: Vec3A) -> f32 {
    let q = Vec2::new(p.xz().length() - t.x, p.y);
    q.length() - t.y
}

/// Rolling sine hills along x, rising in y.
pub fn waves(p: Vec3A) -> f32 {
    (p.x * 0.5).sin() / 0.3 + p.y - 5.5
}

/// Repeats space every `period` along one axis, centered on the origin.
pub fn repeat_axis(p: f32, period: f32) -> f32 {
    p.rem_euclid(period) - 0.5 * period
}

pub fn repeat(p: Vec3A, period: Vec3A) -> Vec3A {
    Vec3A::new(
        repeat_axis(p.x, period.x),
        repeat_axis(p.y, period.y),
        repeat_axis(p.z, period.z),
    )
}

pub fn union(a: f32, b: f32) -> f32 {
    a.min(b)
}

pub fn intersection(a: f32, b: f32) -> f32 {
    a.max(b)
}

pub fn subtraction(a: f32, b: f32) -> f32 {
    a.max(-b)
}

/// Three octaves of Perlin noise at increasing scales. The value itself is
/// the density, so the surface is wherever the summed noise is zero.
#[derive(Clone, Debug)]
pub struct PerlinTerrain {
    noise: Perlin,
    scales: [f32; 3],
    offset: f64,
}

impl PerlinTerrain {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: Perlin::new(seed),
            scales: [13.0, 100.0, 400.0],
            offset: 0.5,
        }
    }

    pub fn with_scales(mut self, scales: [f32; 3]) -> Self {
        self.scales = scales;
        self
    }
}

impl DensityField for PerlinTerrain {
    fn density(&self, p: Vec3A) -> f32 {
        self.scales
            .iter()
            .map(|&divider| {
                let q = (p / divider).as_dvec3();
                self.noise
                    .get([q.x + self.offset, q.y + self.offset, q.z + self.offset])
                    as f32
            })
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signs_of_basic_shapes() {
        assert!(sphere(2.0, Vec3A::ZERO) < 0.0);
        assert!(sphere(2.0, Vec3A::new(3.0, 0.0, 0.0)) > 0.0);
        assert_eq!(cuboid(Vec3A::ONE, Vec3A::new(2.0, 0.0, 0.0)), 1.0);
        assert_eq!(cuboid(Vec3A::ONE, Vec3A::ZERO), -1.0);
        assert_eq!(plane(Vec3A::ZERO, Vec3A::Y, Vec3A::new(4.0, 2.0, 1.0)), 2.0);
        assert!(torus(Vec2::new(4.0, 1.0), Vec3A::new(4.0, 0.0, 0.0)) < 0.0);
        assert!(torus(Vec2::new(4.0, 1.0), Vec3A::ZERO) > 0.0);
    }

    #[test]
    fn repetition_wraps_into_one_period() {
        assert_eq!(repeat_axis(0.0, 10.0), -5.0);
        assert_eq!(repeat_axis(12.0, 10.0), -3.0);
        assert_eq!(repeat_axis(-3.0, 10.0), 2.0);
        let p = repeat(Vec3A::new(15.0, 25.0, 35.0), Vec3A::splat(10.0));
        assert_eq!(p, Vec3A::ZERO);
    }

    #[test]
    fn csg_operators() {
        assert_eq!(union(-1.0, 2.0), -1.0);
        assert_eq!(intersection(-1.0, 2.0), 2.0);
        assert_eq!(subtraction(-1.0, -2.0), 2.0);
    }

    #[test]
    fn perlin_terrain_is_deterministic_and_finite() {
        let a = PerlinTerrain::new(3);
        let b = PerlinTerrain::new(3);
        for i in 0..32 {
            let p = Vec3A::new(i as f32 * 1.7, i as f32 * -0.3, 5.0);
            let d = a.density(p);
            assert!(d.is_finite());
            assert_eq!(d, b.density(p));
        }
    }

    #[test]
    fn waves_cross_zero_near_baseline() {
        assert!(waves(Vec3A::new(0.0, 0.0, 0.0)) < 0.0);
        assert!(waves(Vec3A::new(0.0, 10.0, 0.0)) > 0.0);
    }
}
