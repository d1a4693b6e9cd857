//! Collapsed (Duffy) Gauss rules for the reference triangle and tetrahedron.
//!
//! The reference triangle has corners `(-1, -1)`, `(1, -1)`, `(-1, 1)` and the reference
//! tetrahedron has corners `(-1, -1, -1)`, `(1, -1, -1)`, `(-1, 1, -1)`, `(-1, -1, 1)`.
//! Points are obtained by collapsing a tensor-product Gauss rule on the cube onto the simplex,
//! so every weight is positive and every point lies strictly inside the simplex.

use crate::univariate::gauss;
use crate::Rule;

/// A collapsed Gauss rule on the reference triangle with `n * n` points.
///
/// The rule integrates polynomials of total degree up to `2 n - 2` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn triangle_collapsed_gauss(num_points_per_dim: usize) -> Rule<2> {
    let (weights1d, points1d) = gauss(num_points_per_dim);

    let mut weights = Vec::new();
    let mut points = Vec::new();
    for (&wa, &[a]) in weights1d.iter().zip(&points1d) {
        for (&wb, &[b]) in weights1d.iter().zip(&points1d) {
            // (a, b) in [-1, 1]^2 is mapped to (u, v) in the unit simplex scaled by 2,
            // with v = 1 + b and u = (1 + a) (2 - v) / 2
            let v = 1.0 + b;
            let u = 0.5 * (1.0 + a) * (2.0 - v);
            let jacobian = 0.5 * (2.0 - v);
            weights.push(wa * wb * jacobian);
            points.push([u - 1.0, v - 1.0]);
        }
    }

    (weights, points)
}

/// A collapsed Gauss rule on the reference tetrahedron with `n * n * n` points.
///
/// The rule integrates polynomials of total degree up to `2 n - 3` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn tetrahedron_collapsed_gauss(num_points_per_dim: usize) -> Rule<3> {
    let (weights1d, points1d) = gauss(num_points_per_dim);

    let mut weights = Vec::new();
    let mut points = Vec::new();
    for (&wa, &[a]) in weights1d.iter().zip(&points1d) {
        for (&wb, &[b]) in weights1d.iter().zip(&points1d) {
            for (&wc, &[c]) in weights1d.iter().zip(&points1d) {
                let w = 1.0 + c;
                let v = 0.5 * (1.0 + b) * (2.0 - w);
                let u = 0.5 * (1.0 + a) * (2.0 - w - v);
                let jacobian = 0.25 * (2.0 - w) * (2.0 - w - v);
                weights.push(wa * wb * wc * jacobian);
                points.push([u - 1.0, v - 1.0, w - 1.0]);
            }
        }
    }

    (weights, points)
}
