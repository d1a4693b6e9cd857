//! Quadrature point sets on reference cells and their facets.
use crate::element::CellType;
use formc_quadrature::{simplex, tensor, univariate, Error};
use nalgebra::DMatrix;
use rustc_hash::FxHasher;
use std::hash::Hasher;

/// A set of quadrature points with weights.
///
/// The weights of a set with `n` points are emitted as `W<n>`. Basis tables are keyed by the
/// [`fingerprint`](PointSet::fingerprint) of the points, so different rules with the same number
/// of points never share tables.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    weights: Vec<f64>,
    points: DMatrix<f64>,
}

fn check_rule_consistency(weights: &[f64], points: &DMatrix<f64>) {
    assert_eq!(
        weights.len(),
        points.nrows(),
        "Quadrature weights and points must have the same number of entries"
    );
}

impl PointSet {
    /// Creates a point set from weights and a matrix holding one point per row.
    ///
    /// # Panics
    ///
    /// Panics if the number of weights and points differ.
    pub fn new(weights: Vec<f64>, points: DMatrix<f64>) -> Self {
        check_rule_consistency(&weights, &points);
        Self { weights, points }
    }

    /// A Gauss type rule on the given reference cell with `points_per_dim` points per direction.
    ///
    /// Tensor cells use tensor products of Gauss-Legendre rules and simplices use collapsed
    /// Gauss rules.
    pub fn gauss(cell: CellType, points_per_dim: usize) -> Result<Self, Error> {
        if points_per_dim == 0 {
            return Err(Error::NoRuleAvailable);
        }
        let n = points_per_dim;
        let point_set = match cell {
            CellType::Interval => Self::from_rule(univariate::gauss(n)),
            CellType::Triangle => Self::from_rule(simplex::triangle_collapsed_gauss(n)),
            CellType::Quadrilateral => Self::from_rule(tensor::quadrilateral_gauss(n)),
            CellType::Tetrahedron => Self::from_rule(simplex::tetrahedron_collapsed_gauss(n)),
            CellType::Hexahedron => Self::from_rule(tensor::hexahedron_gauss(n)),
        };
        Ok(point_set)
    }

    /// The point set used for facet integrals over the facets of `cell`.
    ///
    /// The points live on the facet reference cell. Facets of intervals are points, which are
    /// represented by a single zero-dimensional point of unit weight.
    pub fn facet_gauss(cell: CellType, points_per_dim: usize) -> Result<Self, Error> {
        match cell.facet_cell() {
            Some(facet_cell) => Self::gauss(facet_cell, points_per_dim),
            None => Ok(Self::new(vec![1.0], DMatrix::zeros(1, 0))),
        }
    }

    fn from_rule<const D: usize>((weights, points): formc_quadrature::Rule<D>) -> Self {
        let points = DMatrix::from_fn(points.len(), D, |i, j| points[i][j]);
        Self::new(weights, points)
    }

    /// Hash of the exact bit patterns of the weights and points.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_usize(self.points.nrows());
        hasher.write_usize(self.points.ncols());
        for value in self.weights.iter().chain(self.points.iter()) {
            hasher.write_u64(value.to_bits());
        }
        hasher.finish()
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    /// Maps the points, given on the facet reference cell, onto a facet of `cell`.
    ///
    /// Returns `None` if the facet does not exist or the point dimension does not match the
    /// facet reference cell.
    pub fn on_facet(&self, cell: CellType, facet: usize) -> Option<DMatrix<f64>> {
        let facet_dim = cell.facet_cell().map_or(0, |facet_cell| facet_cell.topological_dimension());
        if self.dim() != facet_dim {
            return None;
        }
        let tdim = cell.topological_dimension();
        let mut mapped = DMatrix::zeros(self.num_points(), tdim);
        for (i, point) in self.points.row_iter().enumerate() {
            let point: Vec<f64> = point.iter().copied().collect();
            let cell_point = cell.map_facet_point(facet, &point)?;
            for (j, x) in cell_point.into_iter().enumerate() {
                mapped[(i, j)] = x;
            }
        }
        Some(mapped)
    }
}
