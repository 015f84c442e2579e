use crate::{CellOctree, ContourConfig, DensityField, MeshBuffers, Result};
use rayon::prelude::*;

/// Builds an octree over the configured region and contours it.
pub fn extract_mesh(config: &ContourConfig, field: &impl DensityField) -> Result<MeshBuffers> {
    let mut octree = CellOctree::build(config, field)?;
    let mut mesh = octree.mesh();
    if let Some(threshold) = config.sharp_normal_threshold {
        mesh.repair_sharp_normals(threshold);
    }
    Ok(mesh)
}

/// Meshes independent regions in parallel. Each region gets its own octree,
/// and results come back in the order of `configs`.
pub fn extract_meshes(
    configs: &[ContourConfig],
    field: &impl DensityField,
) -> Vec<Result<MeshBuffers>> {
    let meshes: Vec<_> = configs
        .par_iter()
        .map(|config| extract_mesh(config, field))
        .collect();
    log::info!(
        "meshed {} regions ({} failed)",
        meshes.len(),
        meshes.iter().filter(|m| m.is_err()).count()
    );
    meshes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{sdf_primitives::sphere, Error};
    use glam::{IVec3, Vec3A};

    #[test]
    fn regions_match_sequential_extraction() {
        let field = |p: Vec3A| sphere(5.0, p);
        let configs: Vec<_> = [IVec3::new(-8, -8, -8), IVec3::new(0, -8, -8)]
            .into_iter()
            .map(|min| ContourConfig::new(1, 8, min))
            .collect();

        let parallel = extract_meshes(&configs, &field);
        assert_eq!(parallel.len(), 2);
        for (config, mesh) in configs.iter().zip(parallel) {
            let mesh = mesh.unwrap();
            assert!(!mesh.is_empty());
            assert_eq!(mesh, extract_mesh(config, &field).unwrap());
        }
    }

    #[test]
    fn invalid_region_reports_error() {
        let configs = [ContourConfig::new(0, 8, IVec3::ZERO)];
        let results = extract_meshes(&configs, &|p: Vec3A| sphere(1.0, p));
        assert_eq!(results[0], Err(Error::ZeroResolution));
    }

    #[test]
    fn sharp_normal_repair_is_applied() {
        let field = |p: Vec3A| {
            crate::sdf_primitives::cuboid(Vec3A::splat(2.5), p - Vec3A::splat(4.0))
        };
        let mut config = ContourConfig::new(1, 8, IVec3::ZERO).with_simplification(None);
        let plain = extract_mesh(&config, &field).unwrap();
        config.sharp_normal_threshold = Some(0.95);
        let repaired = extract_mesh(&config, &field).unwrap();
        assert_eq!(plain.indices.len(), repaired.indices.len());
        assert!(repaired.vertices.len() > plain.vertices.len());
    }
}
