//! Fixed-size symmetric eigen-decomposition used by the QEF solve.
//!
//! For a symmetric positive semi-definite matrix the eigen-decomposition is
//! also its SVD, so the pseudo-inverse falls out of cyclic Jacobi rotations
//! without any general-purpose linear algebra.

use glam::{Mat3, Vec3A};

const JACOBI_SWEEPS: usize = 8;
const OFF_DIAGONAL_EPSILON: f32 = 1e-12;

/// Upper triangle of a symmetric 3x3 matrix, row major.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SymMat3 {
    pub m00: f32,
    pub m01: f32,
    pub m02: f32,
    pub m11: f32,
    pub m12: f32,
    pub m22: f32,
}

impl SymMat3 {
    #[inline]
    pub fn mul_vec3(&self, v: Vec3A) -> Vec3A {
        Vec3A::new(
            self.m00 * v.x + self.m01 * v.y + self.m02 * v.z,
            self.m01 * v.x + self.m11 * v.y + self.m12 * v.z,
            self.m02 * v.x + self.m12 * v.y + self.m22 * v.z,
        )
    }

    fn to_rows(self) -> [[f32; 3]; 3] {
        [
            [self.m00, self.m01, self.m02],
            [self.m01, self.m11, self.m12],
            [self.m02, self.m12, self.m22],
        ]
    }
}

/// Eigenvalues and column eigenvectors of a symmetric matrix.
#[derive(Clone, Copy, Debug)]
pub struct SymmetricEigen {
    pub values: Vec3A,
    pub vectors: Mat3,
}

impl SymmetricEigen {
    pub fn new(m: &SymMat3) -> Self {
        let mut a = m.to_rows();
        let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        for _ in 0..JACOBI_SWEEPS {
            let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
            if off <= OFF_DIAGONAL_EPSILON {
                break;
            }
            rotate(&mut a, &mut v, 0, 1);
            rotate(&mut a, &mut v, 0, 2);
            rotate(&mut a, &mut v, 1, 2);
        }

        Self {
            values: Vec3A::new(a[0][0], a[1][1], a[2][2]),
            vectors: Mat3::from_cols_array_2d(&[
                [v[0][0], v[1][0], v[2][0]],
                [v[0][1], v[1][1], v[2][1]],
                [v[0][2], v[1][2], v[2][2]],
            ]),
        }
    }

    /// Applies the pseudo-inverse to `b`. Eigenvalues smaller than
    /// `tolerance` times the largest magnitude are treated as zero, which
    /// leaves the solution unconstrained (zero) along those directions.
    pub fn solve_pseudo_inverse(&self, b: Vec3A, tolerance: f32) -> Vec3A {
        let max_value = self.values.abs().max_element();
        if max_value <= f32::EPSILON {
            return Vec3A::ZERO;
        }
        let cutoff = tolerance * max_value;
        let mut x = Vec3A::ZERO;
        for i in 0..3 {
            let lambda = self.values[i];
            if lambda.abs() < cutoff {
                continue;
            }
            let u = Vec3A::from(self.vectors.col(i));
            x += u * (u.dot(b) / lambda);
        }
        x
    }
}

/// One Jacobi rotation zeroing `a[p][q]`. `v` accumulates the rotations as
/// rows of eigenvectors in column `k` of `v[..][k]`.
fn rotate(a: &mut [[f32; 3]; 3], v: &mut [[f32; 3]; 3], p: usize, q: usize) {
    let apq = a[p][q];
    if apq.abs() <= f32::MIN_POSITIVE {
        return;
    }
    let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    for k in 0..3 {
        let akp = a[k][p];
        let akq = a[k][q];
        a[k][p] = c * akp - s * akq;
        a[k][q] = s * akp + c * akq;
    }
    for k in 0..3 {
        let apk = a[p][k];
        let aqk = a[q][k];
        a[p][k] = c * apk - s * aqk;
        a[q][k] = s * apk + c * aqk;
    }
    for row in v.iter_mut() {
        let vp = row[p];
        let vq = row[q];
        row[p] = c * vp - s * vq;
        row[q] = s * vp + c * vq;
    }
}
