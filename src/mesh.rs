use crate::cell_octree::{Cell, CellId, CellOctree};
use glam::Vec3;
use std::time::Instant;

pub type MeshVertexId = u32;
pub const NULL_MESH_VERTEX_ID: MeshVertexId = MeshVertexId::MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Indexed triangle list. Every 3 consecutive indices form one triangle,
/// wound counter-clockwise when seen from outside the surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Unnormalized face normal from the winding order.
    pub fn face_normal(&self, tri: [u32; 3]) -> Vec3 {
        let p = tri.map(|v| self.vertices[v as usize].position);
        (p[1] - p[0]).cross(p[2] - p[0])
    }

    /// Repair normals for vertices on sharp edges.
    ///
    /// Any vertex whose averaged normal points more than
    /// `normal_similarity_threshold` (a cosine) away from a triangle's face
    /// normal is duplicated for that triangle with the face normal instead.
    pub fn repair_sharp_normals(&mut self, normal_similarity_threshold: f32) {
        let mut num_split = 0;
        for t in self.indices.chunks_exact_mut(3) {
            let mut tri = [t[0], t[1], t[2]];
            let v = tri.map(|i| self.vertices[i as usize]);

            let tri_normal = (v[1].position - v[0].position)
                .cross(v[2].position - v[0].position)
                .normalize_or_zero();
            if tri_normal == Vec3::ZERO {
                continue;
            }

            // Force dissident normals to use the triangle's normal.
            for ti in 0..3 {
                if v[ti].normal.dot(tri_normal) < normal_similarity_threshold {
                    tri[ti] = self.vertices.len() as MeshVertexId;
                    self.vertices.push(Vertex {
                        position: v[ti].position,
                        normal: tri_normal,
                    });
                    num_split += 1;
                }
            }

            t.copy_from_slice(&tri);
        }
        log::debug!("split {num_split} vertices on sharp edges");
    }
}

/// Collects triangles from the contouring traversal into shared vertex and
/// index buffers.
///
/// Each cell gets one vertex, created the first time a triangle references
/// it. Later references reuse the index cached on the cell.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    buffers: MeshBuffers,
    num_degenerate: usize,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_index(&mut self, cell: &mut Cell) -> MeshVertexId {
        if cell.mesh_vertex_id == NULL_MESH_VERTEX_ID {
            let position = cell.vertex_position();
            cell.mesh_vertex_id = self.buffers.vertices.len() as MeshVertexId;
            self.buffers.vertices.push(Vertex {
                position,
                normal: cell.normal,
            });
        }
        cell.mesh_vertex_id
    }

    pub fn push_triangle(&mut self, cells: &mut [Cell], tri: [CellId; 3]) {
        let indices = tri.map(|id| self.vertex_index(&mut cells[id as usize]));
        if indices[0] == indices[1] || indices[1] == indices[2] || indices[0] == indices[2] {
            self.num_degenerate += 1;
            return;
        }
        self.buffers.indices.extend_from_slice(&indices);
    }

    pub fn finish(self) -> MeshBuffers {
        if self.num_degenerate > 0 {
            log::debug!("dropped {} degenerate triangles", self.num_degenerate);
        }
        self.buffers
    }
}

impl CellOctree {
    /// Contours the octree into vertex and index buffers.
    ///
    /// Mesh vertex assignments from any previous call are discarded first, so
    /// meshing the same octree twice gives identical buffers.
    pub fn mesh(&mut self) -> MeshBuffers {
        let t0 = Instant::now();
        self.reset_mesh_vertices();

        let mut builder = MeshBuilder::new();
        self.dual_contour(|cells, tri| builder.push_triangle(cells, tri));
        let buffers = builder.finish();

        log::debug!(
            "contoured {} vertices and {} triangles in {} us",
            buffers.vertices.len(),
            buffers.num_triangles(),
            t0.elapsed().as_micros()
        );
        buffers
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn quad() -> MeshBuffers {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        MeshBuffers {
            vertices: positions
                .iter()
                .map(|&position| Vertex {
                    position,
                    normal: Vec3::Z,
                })
                .collect(),
            indices: vec![0, 1, 2, 1, 3, 2],
        }
    }

    #[test]
    fn consistent_normals_need_no_repair() {
        let mut mesh = quad();
        mesh.repair_sharp_normals(0.9);
        assert_eq!(mesh, quad());
        for tri in mesh.triangles() {
            assert!(mesh.face_normal(tri).normalize().dot(Vec3::Z) > 0.99);
        }
    }

    #[test]
    fn dissident_normals_are_split() {
        let mut mesh = quad();
        mesh.vertices[1].normal = Vec3::X;
        mesh.repair_sharp_normals(0.9);
        // Vertex 1 appears in both triangles and gets a copy for each.
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 4, 2, 5, 3, 2]);
        assert_eq!(mesh.vertices[4].normal, Vec3::Z);
        assert_eq!(mesh.vertices[4].position, Vec3::X);
    }
}
