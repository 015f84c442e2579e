//! Error types for octree construction and meshing.

use glam::IVec3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("max resolution must be positive")]
    ZeroResolution,

    #[error("domain size must be positive, got {0}")]
    NonPositiveDomain(i32),

    #[error("max resolution {resolution} does not evenly divide domain size {domain_size}")]
    ResolutionDoesNotDivide { resolution: i32, domain_size: i32 },

    #[error("domain size {domain_size} is not a power-of-two multiple of resolution {resolution}")]
    NonPowerOfTwoDepth { resolution: i32, domain_size: i32 },

    #[error("domain of size {domain_size} at {min_corner} exceeds the i32 lattice")]
    DomainOverflow { min_corner: IVec3, domain_size: i32 },

    #[error("gradient step must be finite and positive, got {0}")]
    InvalidGradientStep(f32),

    #[error("sample {0} lies outside the cached lattice")]
    SampleOutOfRange(IVec3),

    #[error("octree invariant violated: {0}")]
    BrokenInvariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
