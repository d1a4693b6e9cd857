//! 2D and 3D quadrature rules formed by tensor product formulations.
//!
//! For quadrilaterals and hexahedra, quadrature rules can be constructed as tensor products
//! of 1D rules.

use crate::univariate::gauss;
use crate::Rule;

/// A Gauss quadrature rule for the reference quadrilateral `[-1, 1]^2`.
///
/// The rule is constructed as a tensor product from 1D rules, with the provided number of
/// points per dimension.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    let rule1d = || weights1d.iter().zip(&points1d);

    rule1d()
        .flat_map(|(&wx, &[x])| rule1d().map(move |(&wy, &[y])| (wx * wy, [x, y])))
        .unzip()
}

/// A Gauss quadrature rule for the reference hexahedron `[-1, 1]^3`.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    let n = num_points_per_dim;
    let (weights2d, points2d) = quadrilateral_gauss(n);
    let (weights1d, points1d) = gauss(n);

    let mut weights3d = Vec::with_capacity(n * n * n);
    let mut points3d = Vec::with_capacity(n * n * n);
    for (&wxy, &[x, y]) in weights2d.iter().zip(&points2d) {
        for (&wz, &[z]) in weights1d.iter().zip(&points1d) {
            weights3d.push(wxy * wz);
            points3d.push([x, y, z]);
        }
    }

    (weights3d, points3d)
}
