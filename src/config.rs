use crate::{Error, Result};
use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Parameters for building and meshing one octree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Edge length of the finest leaf.
    pub max_resolution: i32,
    /// Edge length of the root cube.
    pub domain_size: i32,
    /// World-space minimum corner of the root cube.
    pub min_corner: [i32; 3],
    /// Largest QEF error a branch may have and still collapse into a leaf.
    /// `None` keeps every leaf at `max_resolution`.
    pub simplification_threshold: Option<f32>,
    /// Central-difference step used to estimate constraint normals. A power of
    /// two keeps the gradient samples exactly half a step from the crossing
    /// even far from the origin.
    pub gradient_step: f32,
    /// Dot-product threshold for [`MeshBuffers::repair_sharp_normals`](crate::MeshBuffers::repair_sharp_normals).
    pub sharp_normal_threshold: Option<f32>,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            max_resolution: 1,
            domain_size: 32,
            min_corner: [0; 3],
            simplification_threshold: Some(1e-3),
            gradient_step: 1.0 / 64.0,
            sharp_normal_threshold: None,
        }
    }
}

impl ContourConfig {
    pub fn new(max_resolution: i32, domain_size: i32, min_corner: IVec3) -> Self {
        Self {
            max_resolution,
            domain_size,
            min_corner: min_corner.to_array(),
            ..Default::default()
        }
    }

    pub fn with_simplification(mut self, threshold: Option<f32>) -> Self {
        self.simplification_threshold = threshold;
        self
    }

    pub fn min_corner(&self) -> IVec3 {
        IVec3::from_array(self.min_corner)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_resolution <= 0 {
            return Err(Error::ZeroResolution);
        }
        if self.domain_size <= 0 {
            return Err(Error::NonPositiveDomain(self.domain_size));
        }
        if self.domain_size % self.max_resolution != 0 {
            return Err(Error::ResolutionDoesNotDivide {
                resolution: self.max_resolution,
                domain_size: self.domain_size,
            });
        }
        let cells_per_axis = (self.domain_size / self.max_resolution) as u32;
        if !cells_per_axis.is_power_of_two() {
            return Err(Error::NonPowerOfTwoDepth {
                resolution: self.max_resolution,
                domain_size: self.domain_size,
            });
        }
        check_domain_fits(self.min_corner(), self.domain_size)?;
        if !(self.gradient_step.is_finite() && self.gradient_step > 0.0) {
            return Err(Error::InvalidGradientStep(self.gradient_step));
        }
        Ok(())
    }
}

/// Fails if the far corner `min_corner + domain_size` is not representable.
pub(crate) fn check_domain_fits(min_corner: IVec3, domain_size: i32) -> Result<()> {
    let fits = min_corner
        .to_array()
        .iter()
        .all(|c| c.checked_add(domain_size).is_some());
    if fits {
        Ok(())
    } else {
        Err(Error::DomainOverflow {
            min_corner,
            domain_size,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(ContourConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_resolutions() {
        let zero = ContourConfig::new(0, 8, IVec3::ZERO);
        assert_eq!(zero.validate(), Err(Error::ZeroResolution));

        let uneven = ContourConfig::new(3, 8, IVec3::ZERO);
        assert_eq!(
            uneven.validate(),
            Err(Error::ResolutionDoesNotDivide {
                resolution: 3,
                domain_size: 8
            })
        );

        let not_pow2 = ContourConfig::new(2, 12, IVec3::ZERO);
        assert_eq!(
            not_pow2.validate(),
            Err(Error::NonPowerOfTwoDepth {
                resolution: 2,
                domain_size: 12
            })
        );

        let empty = ContourConfig::new(1, 0, IVec3::ZERO);
        assert_eq!(empty.validate(), Err(Error::NonPositiveDomain(0)));
    }

    #[test]
    fn rejects_domain_past_lattice_bounds() {
        let far = ContourConfig::new(1, 8, IVec3::new(0, i32::MAX - 4, 0));
        assert_eq!(
            far.validate(),
            Err(Error::DomainOverflow {
                min_corner: IVec3::new(0, i32::MAX - 4, 0),
                domain_size: 8
            })
        );

        let edge = ContourConfig::new(1, 8, IVec3::splat(i32::MAX - 8));
        assert_eq!(edge.validate(), Ok(()));
        let negative = ContourConfig::new(1, 8, IVec3::splat(i32::MIN));
        assert_eq!(negative.validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_gradient_step() {
        let mut config = ContourConfig::default();
        config.gradient_step = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidGradientStep(_))
        ));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: ContourConfig =
            serde_json::from_str(r#"{ "domain_size": 64, "min_corner": [-32, 0, -32] }"#).unwrap();
        assert_eq!(config.domain_size, 64);
        assert_eq!(config.min_corner(), IVec3::new(-32, 0, -32));
        assert_eq!(config.max_resolution, 1);
        assert_eq!(config.simplification_threshold, Some(1e-3));

        let json = serde_json::to_string(&config).unwrap();
        let back: ContourConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
