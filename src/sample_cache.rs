use crate::{config::check_domain_fits, sdf::DensityField, Error, Result};
use glam::{IVec3, UVec3};
use rayon::prelude::*;

/// Stored in place of non-finite densities so they classify as outside.
pub const OUTSIDE_SAMPLE: f32 = f32::MAX;

/// Densities precomputed on the lattice `min + k * stride` for
/// `k in [0, cells_per_axis]^3`.
///
/// The cache must cover the whole domain before the octree is built; lookups
/// outside the lattice return `None`.
#[derive(Clone, Debug)]
pub struct SampleCache {
    min: IVec3,
    stride: i32,
    points_per_axis: usize,
    samples: Vec<f32>,
    num_non_finite: usize,
}

impl SampleCache {
    /// Samples the cube `[min, min + size]` every `stride` units. Each z slab
    /// is filled by its own rayon task.
    pub fn build(field: &impl DensityField, min: IVec3, size: i32, stride: i32) -> Result<Self> {
        if stride <= 0 {
            return Err(Error::ZeroResolution);
        }
        if size <= 0 {
            return Err(Error::NonPositiveDomain(size));
        }
        if size % stride != 0 {
            return Err(Error::ResolutionDoesNotDivide {
                resolution: stride,
                domain_size: size,
            });
        }
        check_domain_fits(min, size)?;

        let points_per_axis = (size / stride) as usize + 1;
        let slab_len = points_per_axis * points_per_axis;
        let mut samples = vec![0.0; slab_len * points_per_axis];

        let num_non_finite: usize = samples
            .par_chunks_mut(slab_len)
            .enumerate()
            .map(|(z, slab)| {
                let mut non_finite = 0;
                for (i, sample) in slab.iter_mut().enumerate() {
                    let x = i % points_per_axis;
                    let y = i / points_per_axis;
                    let coord = min + IVec3::new(x as i32, y as i32, z as i32) * stride;
                    let d = field.density(coord.as_vec3a());
                    *sample = if d.is_finite() {
                        d
                    } else {
                        non_finite += 1;
                        OUTSIDE_SAMPLE
                    };
                }
                non_finite
            })
            .sum();

        if num_non_finite > 0 {
            log::warn!(
                "{num_non_finite} non-finite density samples in region at {min} (size {size}) treated as outside"
            );
        }
        log::debug!("cached {} density samples", samples.len());

        Ok(Self {
            min,
            stride,
            points_per_axis,
            samples,
            num_non_finite,
        })
    }

    pub fn min(&self) -> IVec3 {
        self.min
    }

    pub fn stride(&self) -> i32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_non_finite(&self) -> usize {
        self.num_non_finite
    }

    /// Density at a lattice point, or `None` if `coord` is not on the cached
    /// lattice.
    pub fn get(&self, coord: IVec3) -> Option<f32> {
        let rel = coord - self.min;
        if rel.cmplt(IVec3::ZERO).any() || rel % self.stride != IVec3::ZERO {
            return None;
        }
        let k = (rel / self.stride).as_uvec3();
        if k.cmpge(UVec3::splat(self.points_per_axis as u32)).any() {
            return None;
        }
        let n = self.points_per_axis;
        let index = k.x as usize + n * (k.y as usize + n * k.z as usize);
        Some(self.samples[index])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use glam::Vec3A;

    #[test]
    fn matches_direct_evaluation() {
        let field = |p: Vec3A| p.x + 10.0 * p.y + 100.0 * p.z;
        let min = IVec3::new(-4, 2, 0);
        let cache = SampleCache::build(&field, min, 8, 2).unwrap();
        assert_eq!(cache.len(), 125);
        for z in 0..=4 {
            for y in 0..=4 {
                for x in 0..=4 {
                    let c = min + IVec3::new(x, y, z) * 2;
                    assert_eq!(cache.get(c), Some(field(c.as_vec3a())));
                }
            }
        }
    }

    #[test]
    fn rejects_out_of_lattice_lookups() {
        let cache = SampleCache::build(&|_: Vec3A| 1.0f32, IVec3::ZERO, 4, 2).unwrap();
        assert_eq!(cache.get(IVec3::new(-2, 0, 0)), None);
        assert_eq!(cache.get(IVec3::new(6, 0, 0)), None);
        assert_eq!(cache.get(IVec3::new(1, 0, 0)), None);
        assert_eq!(cache.get(IVec3::new(4, 4, 4)), Some(1.0));
    }

    #[test]
    fn non_finite_samples_become_outside() {
        let field = |p: Vec3A| if p.x > 1.0 { f32::NAN } else { -1.0 };
        let cache = SampleCache::build(&field, IVec3::ZERO, 2, 1).unwrap();
        assert_eq!(cache.get(IVec3::new(2, 1, 1)), Some(OUTSIDE_SAMPLE));
        assert_eq!(cache.get(IVec3::new(1, 1, 1)), Some(-1.0));
        assert_eq!(cache.num_non_finite(), 9);
    }

    #[test]
    fn rejects_bad_lattices() {
        let field = |_: Vec3A| 1.0f32;
        assert_eq!(
            SampleCache::build(&field, IVec3::ZERO, 8, 0).unwrap_err(),
            Error::ZeroResolution
        );
        assert_eq!(
            SampleCache::build(&field, IVec3::ZERO, -4, 2).unwrap_err(),
            Error::NonPositiveDomain(-4)
        );
        assert_eq!(
            SampleCache::build(&field, IVec3::ZERO, 8, 3).unwrap_err(),
            Error::ResolutionDoesNotDivide {
                resolution: 3,
                domain_size: 8
            }
        );
        assert!(matches!(
            SampleCache::build(&field, IVec3::splat(i32::MAX - 2), 4, 1),
            Err(Error::DomainOverflow { .. })
        ));
    }
}
