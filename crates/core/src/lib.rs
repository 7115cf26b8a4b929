//! Core constants and small linear-algebra primitives shared across the RPOD workspace.

/// Physical constants expressed in SI units.
pub mod constants {
    /// Boltzmann constant (J/K).
    pub const BOLTZMANN: f64 = 1.380_649e-23;
    /// Magnitudes below this are treated as zero-length vectors.
    pub const GEOMETRY_EPSILON: f64 = 1.0e-12;
}

/// Minimal vector helpers to avoid ad-hoc `[f64; 3]` math everywhere.
pub mod vector {
    use super::constants::GEOMETRY_EPSILON;

    /// Alias for a 3D vector in metres (positions) or unitless (directions).
    pub type Vector3 = [f64; 3];

    /// Euclidean norm of a vector.
    #[inline]
    pub fn norm(v: &Vector3) -> f64 {
        dot(v, v).sqrt()
    }

    /// Dot product of two vectors.
    #[inline]
    pub fn dot(a: &Vector3, b: &Vector3) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Cross product `a × b`.
    #[inline]
    pub fn cross(a: &Vector3, b: &Vector3) -> Vector3 {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    /// Vector addition.
    #[inline]
    pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// Vector subtraction.
    #[inline]
    pub fn sub(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// Scale a vector by a scalar.
    #[inline]
    pub fn scale(v: &Vector3, s: f64) -> Vector3 {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    /// Unit vector and original magnitude, or `None` for (near) zero-length input.
    #[inline]
    pub fn normalize(v: &Vector3) -> Option<(Vector3, f64)> {
        let magnitude = norm(v);
        if !magnitude.is_finite() || magnitude <= GEOMETRY_EPSILON {
            return None;
        }
        Some((scale(v, 1.0 / magnitude), magnitude))
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(v: &Vector3) -> bool {
        v.iter().all(|c| c.is_finite())
    }
}

/// Direction-cosine matrix helpers. Matrices are row-major `[[row0], [row1], [row2]]`.
pub mod dcm {
    use super::vector::{self, Vector3};

    pub type Matrix3 = [[f64; 3]; 3];

    pub const IDENTITY: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    /// Transpose of a matrix.
    #[inline]
    pub fn transpose(m: &Matrix3) -> Matrix3 {
        [
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ]
    }

    /// Matrix product `a · b`.
    pub fn mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        out
    }

    /// Matrix-vector product `m · v`.
    #[inline]
    pub fn apply(m: &Matrix3, v: &Vector3) -> Vector3 {
        [
            vector::dot(&m[0], v),
            vector::dot(&m[1], v),
            vector::dot(&m[2], v),
        ]
    }

    /// True when every entry is finite.
    pub fn is_finite(m: &Matrix3) -> bool {
        m.iter().all(vector::is_finite)
    }
}
