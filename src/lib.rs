//! Adaptive Octree Dual Contouring
//!
//! Extracts a triangle mesh from the zero level set of a density field. The
//! field is sampled once over a cubic domain, leaves are created wherever the
//! sign changes across a finest-resolution cell, and branches whose merged
//! QEF stays within a tolerance are collapsed into coarser leaves. Contouring
//! then walks the octree with the cell/face/edge procedures and places one
//! vertex per contributing cell at its QEF minimizer.
//!
//! ```no_run
//! use glam::{IVec3, Vec3A};
//! use octree_mesher::{extract_mesh, sdf_primitives::sphere, ContourConfig};
//!
//! let config = ContourConfig::new(1, 16, IVec3::splat(-8));
//! let mesh = extract_mesh(&config, &|p: Vec3A| sphere(5.0, p)).unwrap();
//! println!("{} triangles", mesh.num_triangles());
//! ```
//!
//! # References
//!
//! - Tao Ju, Frank Losasso, Scott Schaefer, Joe Warren ["Dual Contouring of
//!   Hermite Data"](https://www.cs.rice.edu/~jwarren/papers/dualcontour.pdf)
//! - Peter Lindstrom ["Out-of-Core Simplification of Large Polygonal
//!   Models"](https://doi.org/10.1145/344779.344912) for the truncated
//!   pseudo-inverse QEF solve

mod cell_octree;
mod config;
mod contour_octree;
mod error;
mod extract;
mod mesh;
mod qef;
mod sample_cache;
mod sdf;
mod svd;
mod tables;

pub mod sdf_primitives;

pub use cell_octree::*;
pub use config::*;
pub use contour_octree::Crossing;
pub use error::*;
pub use extract::*;
pub use mesh::*;
pub use qef::*;
pub use sample_cache::*;
pub use sdf::*;
pub use svd::{SymMat3, SymmetricEigen};
