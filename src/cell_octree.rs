use crate::{
    mesh::{MeshVertexId, NULL_MESH_VERTEX_ID},
    qef::Qef,
    sdf::{corner_mask, corner_offset, estimate_leaf_qef, mask_is_bipolar},
    ContourConfig, DensityField, Error, Result, SampleCache,
};
use glam::{IVec3, Vec3, Vec3A};
use ilattice::extent::Extent;
use std::time::Instant;

/// Adaptive octree over a cubic domain.
///
/// All cells live in one arena owned by the octree; branches refer to their
/// children by [`CellId`]. Leaves whose corners all share a sign carry no
/// surface and are not stored. Branches whose whole subtree is empty are not
/// stored either.
#[derive(Debug, Default)]
pub struct CellOctree {
    pub(crate) root_id: Option<CellId>,
    pub(crate) resolution: i32,
    pub(crate) min: IVec3,
    pub(crate) size: i32,

    pub(crate) all_cells: Vec<Cell>,
    pub(crate) cell_stack: Vec<CellId>,
    pub(crate) face_stack: Vec<Face>,
    pub(crate) edge_stack: Vec<Edge>,
}

impl CellOctree {
    pub fn all_cells(&self) -> &[Cell] {
        &self.all_cells
    }

    pub fn root(&self) -> Option<&Cell> {
        self.root_id.map(|id| &self.all_cells[id as usize])
    }

    pub fn root_id(&self) -> Option<CellId> {
        self.root_id
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.all_cells[id as usize]
    }

    /// Edge length of the finest possible leaf.
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    pub fn extent(&self) -> Extent<Vec3A> {
        cube_extent(self.min, self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell> {
        self.all_cells.iter().filter(|c| c.is_leaf())
    }

    /// Smallest and largest leaf edge, if there are any leaves.
    pub fn leaf_size_range(&self) -> Option<(i32, i32)> {
        self.leaves().fold(None, |range, leaf| match range {
            None => Some((leaf.size, leaf.size)),
            Some((lo, hi)) => Some((lo.min(leaf.size), hi.max(leaf.size))),
        })
    }

    pub(crate) fn clear_stacks(&mut self) {
        self.cell_stack.clear();
        self.face_stack.clear();
        self.edge_stack.clear();
    }

    /// Forgets every mesh vertex assignment so the next meshing pass starts
    /// fresh. Solved positions are kept since they only depend on the QEF.
    pub(crate) fn reset_mesh_vertices(&mut self) {
        for cell in &mut self.all_cells {
            cell.mesh_vertex_id = NULL_MESH_VERTEX_ID;
        }
    }

    /// Samples `field` over the configured domain and builds the octree.
    ///
    /// Construction samples every lattice point once (in parallel), creates
    /// leaves at `max_resolution` for every cell whose corner signs differ,
    /// then collapses branches bottom-up while the merged QEF error stays
    /// within `simplification_threshold`.
    pub fn build(config: &ContourConfig, field: &impl DensityField) -> Result<Self> {
        config.validate()?;
        let t0 = Instant::now();
        let cache = SampleCache::build(
            field,
            config.min_corner(),
            config.domain_size,
            config.max_resolution,
        )?;
        let me = Self::build_from_cache(config, field, &cache)?;
        log::debug!(
            "built octree with {} cells ({} leaves) in {} us",
            me.all_cells.len(),
            me.leaves().count(),
            t0.elapsed().as_micros()
        );
        Ok(me)
    }

    /// Builds the octree from an already populated cache. `field` is only
    /// consulted for constraint normals.
    pub fn build_from_cache(
        config: &ContourConfig,
        field: &impl DensityField,
        cache: &SampleCache,
    ) -> Result<Self> {
        config.validate()?;

        let mut me = Self {
            resolution: config.max_resolution,
            min: config.min_corner(),
            size: config.domain_size,
            ..Default::default()
        };
        let mut builder = Builder {
            config,
            field,
            cache,
            num_collapsed: 0,
        };
        let (root_id, _) = builder.build_recursive(&mut me.all_cells, me.min, me.size, true)?;
        me.root_id = root_id;

        log::debug!("collapsed {} branches", builder.num_collapsed);

        if cfg!(debug_assertions) {
            me.check_invariants()?;
        }

        Ok(me)
    }

    /// Verifies the structural invariants of every stored cell.
    pub fn check_invariants(&self) -> Result<()> {
        let Some(root_id) = self.root_id else {
            return Ok(());
        };
        let root = self.cell(root_id);
        if root.min != self.min || root.size != self.size {
            return Err(Error::BrokenInvariant(format!(
                "root covers {} + {} instead of the domain {} + {}",
                root.min, root.size, self.min, self.size
            )));
        }
        self.check_cell(root_id)
    }

    fn check_cell(&self, id: CellId) -> Result<()> {
        let cell = self.cell(id);
        if cell.corner_signs != self.expected_signs(cell) {
            return Err(Error::BrokenInvariant(format!(
                "cell {id} corner signs disagree with its children"
            )));
        }
        match &cell.children {
            None => {
                if cell.size < self.resolution || cell.size % self.resolution != 0 {
                    return Err(Error::BrokenInvariant(format!(
                        "leaf {id} has size {} below resolution {}",
                        cell.size, self.resolution
                    )));
                }
                if !mask_is_bipolar(cell.corner_signs) {
                    return Err(Error::BrokenInvariant(format!(
                        "leaf {id} stored without a surface crossing"
                    )));
                }
            }
            Some(children) => {
                if cell.size <= self.resolution {
                    return Err(Error::BrokenInvariant(format!(
                        "branch {id} at finest resolution"
                    )));
                }
                for (octant, child_id) in children.iter().enumerate() {
                    let Some(child_id) = *child_id else { continue };
                    let child = self.cell(child_id);
                    let expected_min = cell.min + corner_offset(octant) * (cell.size / 2);
                    if child.size * 2 != cell.size || child.min != expected_min {
                        return Err(Error::BrokenInvariant(format!(
                            "child {child_id} is not octant {octant} of {id}"
                        )));
                    }
                    self.check_cell(child_id)?;
                }
            }
        }
        Ok(())
    }

    // Every corner of a cell is the matching corner of the child in that
    // octant, so present children must agree with their parent.
    fn expected_signs(&self, cell: &Cell) -> u8 {
        let Some(children) = &cell.children else {
            return cell.corner_signs;
        };
        let mut signs = cell.corner_signs;
        for (octant, child_id) in children.iter().enumerate() {
            if let Some(child_id) = child_id {
                let bit = 1 << octant;
                signs = (signs & !bit) | (self.cell(*child_id).corner_signs & bit);
            }
        }
        signs
    }
}

struct Builder<'a, F> {
    config: &'a ContourConfig,
    field: &'a F,
    cache: &'a SampleCache,
    num_collapsed: usize,
}

impl<'a, F: DensityField> Builder<'a, F> {
    fn corner_samples(&self, min: IVec3, size: i32) -> Result<[f32; 8]> {
        let mut samples = [0.0; 8];
        for (i, sample) in samples.iter_mut().enumerate() {
            let coord = min + corner_offset(i) * size;
            *sample = self.cache.get(coord).ok_or(Error::SampleOutOfRange(coord))?;
        }
        Ok(samples)
    }

    // Recursive because it's easier and slightly more efficient for post-order
    // traversal. Children are pushed before their parent, so collapsing a
    // branch just truncates the arena back to where its subtree began.
    fn build_recursive(
        &mut self,
        cells: &mut Vec<Cell>,
        min: IVec3,
        size: i32,
        is_root: bool,
    ) -> Result<(Option<CellId>, VertexState)> {
        let samples = self.corner_samples(min, size)?;
        let corner_signs = corner_mask(&samples);

        if size == self.config.max_resolution {
            if !mask_is_bipolar(corner_signs) {
                return Ok((None, VertexState::EmptySpace));
            }
            let qef = estimate_leaf_qef(
                &cube_extent(min, size),
                &samples,
                self.field,
                self.config.gradient_step,
            );
            let leaf = Cell::leaf(min, size, corner_signs, qef.clone());
            let leaf_id = push_cell(cells, leaf);
            return Ok((Some(leaf_id), VertexState::HasVertex { qef }));
        }

        let subtree_start = cells.len();
        let half = size / 2;
        let mut child_cell_ids = [None; 8];
        let mut sum_descendant_qef = Qef::new(min.as_vec3a());
        let mut all_nonempty_children_can_merge = true;
        let mut any_nonempty_children = false;
        for (octant, maybe_child_id) in child_cell_ids.iter_mut().enumerate() {
            let child_min = min + corner_offset(octant) * half;
            let (child_id, child_state) = self.build_recursive(cells, child_min, half, false)?;
            match child_state {
                VertexState::EmptySpace => {}
                VertexState::CannotSimplify => {
                    any_nonempty_children = true;
                    all_nonempty_children_can_merge = false;
                }
                VertexState::HasVertex { qef } => {
                    any_nonempty_children = true;
                    sum_descendant_qef = sum_descendant_qef + qef;
                }
            }
            *maybe_child_id = child_id;
        }

        if !any_nonempty_children {
            return Ok((None, VertexState::EmptySpace));
        }

        // Post-order simplification turns branches into leaves. The root is
        // kept as a branch because only edges interior to it are contoured.
        if let Some(threshold) = self.config.simplification_threshold {
            if !is_root && all_nonempty_children_can_merge && mask_is_bipolar(corner_signs) {
                let mut candidate = Cell::leaf(min, size, corner_signs, sum_descendant_qef);
                let error = candidate.solve_vertex();
                if error <= threshold {
                    cells.truncate(subtree_start);
                    self.num_collapsed += 1;
                    let qef = candidate.qef.clone();
                    let leaf_id = push_cell(cells, candidate);
                    return Ok((Some(leaf_id), VertexState::HasVertex { qef }));
                }
            }
        }

        let branch = Cell::branch(min, size, corner_signs, child_cell_ids);
        let branch_id = push_cell(cells, branch);
        Ok((Some(branch_id), VertexState::CannotSimplify))
    }
}

fn push_cell(cells: &mut Vec<Cell>, cell: Cell) -> CellId {
    let id = cells.len() as CellId;
    cells.push(cell);
    id
}

pub(crate) fn cube_extent(min: IVec3, size: i32) -> Extent<Vec3A> {
    let min = min.as_vec3a();
    Extent::from_min_and_lub(min, min + Vec3A::splat(size as f32))
}

#[derive(Debug)]
enum VertexState {
    EmptySpace,
    CannotSimplify,
    HasVertex { qef: Qef },
}

pub type CellId = u32;

#[derive(Clone, Debug)]
pub struct Cell {
    pub min: IVec3,
    pub size: i32,

    /// Bit `i` set iff corner `i` is inside.
    pub corner_signs: u8,
    /// Present iff this cell is a branch. Empty octants are `None`.
    pub children: Option<[Option<CellId>; 8]>,

    pub qef: Qef,
    /// Solved representative position, filled on first use.
    /// We don't use `Vec3A` because it's 16-byte-aligned.
    pub vertex: Option<Vec3>,
    pub normal: Vec3,
    pub qef_error: f32,

    pub mesh_vertex_id: MeshVertexId,
}

impl Cell {
    fn leaf(min: IVec3, size: i32, corner_signs: u8, qef: Qef) -> Self {
        Self {
            min,
            size,
            corner_signs,
            children: None,
            normal: qef.average_normal().into(),
            qef,
            vertex: None,
            qef_error: 0.0,
            mesh_vertex_id: NULL_MESH_VERTEX_ID,
        }
    }

    fn branch(min: IVec3, size: i32, corner_signs: u8, children: [Option<CellId>; 8]) -> Self {
        Self {
            min,
            size,
            corner_signs,
            children: Some(children),
            qef: Qef::default(),
            vertex: None,
            normal: Vec3::ZERO,
            qef_error: 0.0,
            mesh_vertex_id: NULL_MESH_VERTEX_ID,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    #[inline]
    pub fn child(&self, octant: u8) -> Option<CellId> {
        self.children.and_then(|c| c[octant as usize])
    }

    pub fn extent(&self) -> Extent<Vec3A> {
        cube_extent(self.min, self.size)
    }

    pub fn max(&self) -> IVec3 {
        self.min + IVec3::splat(self.size)
    }

    pub fn contains(&self, other: &Cell) -> bool {
        other.min.cmpge(self.min).all() && other.max().cmple(self.max()).all()
    }

    #[inline]
    pub fn is_inside_at(&self, corner: usize) -> bool {
        (self.corner_signs >> corner) & 1 == 1
    }

    /// Solves the QEF within this cell's cube and caches the result. Returns
    /// the residual error at the solved position.
    pub fn solve_vertex(&mut self) -> f32 {
        let min = self.min.as_vec3a();
        let max = self.max().as_vec3a();
        let (p, error) = self.qef.solve_with_error(min, max);
        self.qef_error = error;
        self.vertex = Some(p.into());
        self.qef_error
    }

    /// The representative vertex, solving the QEF on first use.
    pub fn vertex_position(&mut self) -> Vec3 {
        match self.vertex {
            Some(p) => p,
            None => {
                self.solve_vertex();
                self.vertex.unwrap_or_default()
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Face {
    pub axis: usize,
    pub cells: [CellId; 2],
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Edge {
    pub axis: usize,
    pub cells: [CellId; 4],
}
