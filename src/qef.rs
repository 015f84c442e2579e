use crate::svd::{SymMat3, SymmetricEigen};
use glam::Vec3A;
use std::ops::Add;

/// Eigenvalues below this fraction of the largest one are truncated in the
/// pseudo-inverse.
pub const PSEUDO_INVERSE_TOLERANCE: f32 = 0.1;

/// Quadric Error Function in normal-equation form.
///
/// `x^T A x - 2 b^T x + c`, where `A = sum(n n^T)`, `b = sum(n (n . p))` and
/// `c = sum((n . p)^2)` over all accumulated constraint planes `(p, n)`.
///
/// Plane points are stored relative to `origin`, and `b`, `c` and the error
/// are all evaluated in that frame. Large world coordinates would otherwise
/// cancel catastrophically in `c - 2 b^T x`.
///
/// The solve is relative to the mass point (average of the plane points) so
/// directions left unconstrained by a rank-deficient `A` resolve to the mass
/// point instead of diverging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Qef {
    origin: Vec3A,

    ata: SymMat3,
    atb: Vec3A,
    btb: f32,

    mass_point_sum: Vec3A,
    normal_sum: Vec3A,
    num_planes: u32,
}

impl Qef {
    /// An empty QEF whose local frame is centered at `origin`.
    pub fn new(origin: Vec3A) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }

    pub fn plane(p: Vec3A, n: Vec3A) -> Self {
        let mut qef = Self::new(p);
        qef.accumulate(p, n);
        qef
    }

    pub fn origin(&self) -> Vec3A {
        self.origin
    }

    /// Adds the plane through world-space `p` with normal `n`.
    pub fn accumulate(&mut self, p: Vec3A, n: Vec3A) {
        self.accumulate_local(p - self.origin, n);
    }

    /// Adds the plane through `origin + p` with normal `n`.
    pub fn accumulate_local(&mut self, p: Vec3A, n: Vec3A) {
        let d = p.dot(n);
        self.ata.m00 += n.x * n.x;
        self.ata.m01 += n.x * n.y;
        self.ata.m02 += n.x * n.z;
        self.ata.m11 += n.y * n.y;
        self.ata.m12 += n.y * n.z;
        self.ata.m22 += n.z * n.z;
        self.atb += d * n;
        self.btb += d * d;

        self.mass_point_sum += p;
        self.normal_sum += n;
        self.num_planes += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.num_planes == 0
    }

    pub fn num_planes(&self) -> u32 {
        self.num_planes
    }

    /// Residual L2 error at world-space `p`.
    pub fn error(&self, p: Vec3A) -> f32 {
        self.local_error(p - self.origin)
    }

    fn local_error(&self, x: Vec3A) -> f32 {
        // Rounding can push an exact fit slightly negative.
        (x.dot(self.ata.mul_vec3(x)) - 2.0 * x.dot(self.atb) + self.btb).max(0.0)
    }

    pub fn mass_point(&self) -> Vec3A {
        self.origin + self.local_mass_point()
    }

    fn local_mass_point(&self) -> Vec3A {
        if self.num_planes == 0 {
            return Vec3A::ZERO;
        }
        self.mass_point_sum / self.num_planes as f32
    }

    /// Normalized mean of the accumulated plane normals.
    pub fn average_normal(&self) -> Vec3A {
        self.normal_sum.normalize_or_zero()
    }

    /// Least-squares minimizer, not confined to any cell.
    pub fn minimizer(&self) -> Vec3A {
        self.origin + self.local_minimizer()
    }

    fn local_minimizer(&self) -> Vec3A {
        let mass_point = self.local_mass_point();
        let eigen = SymmetricEigen::new(&self.ata);
        let residual = self.atb - self.ata.mul_vec3(mass_point);
        mass_point + eigen.solve_pseudo_inverse(residual, PSEUDO_INVERSE_TOLERANCE)
    }

    /// Minimizer clamped to the box `[min, max]`. An empty QEF resolves to the
    /// box center.
    pub fn solve(&self, min: Vec3A, max: Vec3A) -> Vec3A {
        self.solve_with_error(min, max).0
    }

    /// Like [`Qef::solve`], also returning the residual error at the solution.
    /// The error is measured before the position is moved back to world space.
    pub fn solve_with_error(&self, min: Vec3A, max: Vec3A) -> (Vec3A, f32) {
        if self.is_empty() {
            return (0.5 * (min + max), 0.0);
        }
        let (min, max) = (min - self.origin, max - self.origin);
        let mut x = self.local_minimizer();
        if !x.is_finite() {
            x = self.local_mass_point();
        }
        let x = x.clamp(min, max);
        (self.origin + x, self.local_error(x))
    }

    /// The same quadric expressed in the frame centered at `origin`.
    ///
    /// With `x_old = x_new + t` and `t = origin - self.origin`, the linear term
    /// becomes `b - A t` and the constant `c - 2 b^T t + t^T A t`.
    pub fn rebased(mut self, origin: Vec3A) -> Self {
        if origin == self.origin {
            return self;
        }
        let t = origin - self.origin;
        let at = self.ata.mul_vec3(t);
        self.btb += t.dot(at) - 2.0 * t.dot(self.atb);
        self.btb = self.btb.max(0.0);
        self.atb -= at;
        self.mass_point_sum -= self.num_planes as f32 * t;
        self.origin = origin;
        self
    }
}

/// The sum keeps the left-hand side's origin.
impl Add for Qef {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        if rhs.is_empty() {
            return self;
        }
        let rhs = rhs.rebased(self.origin);
        Self {
            origin: self.origin,
            ata: SymMat3 {
                m00: self.ata.m00 + rhs.ata.m00,
                m01: self.ata.m01 + rhs.ata.m01,
                m02: self.ata.m02 + rhs.ata.m02,
                m11: self.ata.m11 + rhs.ata.m11,
                m12: self.ata.m12 + rhs.ata.m12,
                m22: self.ata.m22 + rhs.ata.m22,
            },
            atb: self.atb + rhs.atb,
            btb: self.btb + rhs.btb,
            mass_point_sum: self.mass_point_sum + rhs.mass_point_sum,
            normal_sum: self.normal_sum + rhs.normal_sum,
            num_planes: self.num_planes + rhs.num_planes,
        }
    }
}
