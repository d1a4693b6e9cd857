//! Tabulation of basis functions at quadrature points.
use crate::element::{CellType, ElementDescriptor, ElementStructure, Family};
use eyre::{bail, eyre};
use nalgebra::DMatrix;

/// Evaluates reference basis functions (or their reference derivatives) of a simple element.
pub trait Tabulator {
    /// Tabulates the given value component of `element` at the given points.
    ///
    /// `derivatives[i]` is the number of times to differentiate with respect to reference
    /// coordinate `i`, and `points` holds one reference point per row. The result has one row
    /// per point and one column per degree of freedom of `element`.
    fn tabulate(
        &self,
        element: &ElementDescriptor,
        component: usize,
        derivatives: &[usize],
        points: &DMatrix<f64>,
    ) -> eyre::Result<DMatrix<f64>>;
}

/// Tabulates scalar Lagrange and quadrature elements on the reference cells.
///
/// Supported are degree 0 and 1 on every cell, and degree 2 on the interval, triangle and
/// tetrahedron. Derivatives of any order are exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct LagrangeTabulator;

impl Tabulator for LagrangeTabulator {
    fn tabulate(
        &self,
        element: &ElementDescriptor,
        component: usize,
        derivatives: &[usize],
        points: &DMatrix<f64>,
    ) -> eyre::Result<DMatrix<f64>> {
        if !matches!(element.structure(), ElementStructure::Simple) || !element.value_shape().is_empty() {
            bail!("only scalar simple elements can be tabulated, got {}", element.name());
        }
        if component != 0 {
            bail!("scalar element {} has no component {component}", element.name());
        }
        let tdim = element.cell().topological_dimension();
        if derivatives.len() != tdim {
            bail!(
                "expected derivative counts for {tdim} reference directions, got {}",
                derivatives.len()
            );
        }
        if points.ncols() != tdim {
            bail!("expected points of dimension {tdim}, got {}", points.ncols());
        }

        match element.family() {
            Family::Quadrature => tabulate_point_evaluation(element, derivatives, points),
            Family::Lagrange | Family::DiscontinuousLagrange => {
                let basis = lagrange_basis(element.cell(), element.degree())?;
                let mut table = DMatrix::zeros(points.nrows(), basis.len());
                for (j, phi) in basis.iter().enumerate() {
                    let derivative = phi.differentiate(derivatives);
                    for (i, point) in points.row_iter().enumerate() {
                        let point: Vec<f64> = point.iter().copied().collect();
                        table[(i, j)] = derivative.evaluate(&point);
                    }
                }
                Ok(table)
            }
            family => Err(eyre!("cannot tabulate elements of family {family:?}")),
        }
    }
}

fn tabulate_point_evaluation(
    element: &ElementDescriptor,
    derivatives: &[usize],
    points: &DMatrix<f64>,
) -> eyre::Result<DMatrix<f64>> {
    if derivatives.iter().any(|&count| count > 0) {
        bail!("point evaluation element {} has no derivatives", element.name());
    }
    if points.nrows() != element.space_dimension() {
        bail!(
            "point evaluation element {} has {} degrees of freedom, but was tabulated at {} points",
            element.name(),
            element.space_dimension(),
            points.nrows()
        );
    }
    Ok(DMatrix::identity(points.nrows(), points.nrows()))
}

/// A polynomial in up to three variables, stored as a list of monomials.
#[derive(Debug, Clone, PartialEq)]
struct Polynomial {
    terms: Vec<(f64, [u32; 3])>,
}

impl Polynomial {
    fn constant(value: f64) -> Self {
        Self {
            terms: vec![(value, [0; 3])],
        }
    }

    /// The affine polynomial `c + sum_i a_i x_i`.
    fn affine(c: f64, a: &[f64]) -> Self {
        let mut terms = vec![(c, [0; 3])];
        for (i, &coeff) in a.iter().enumerate() {
            let mut exponents = [0; 3];
            exponents[i] = 1;
            terms.push((coeff, exponents));
        }
        Self { terms }
    }

    fn scale(mut self, factor: f64) -> Self {
        for (coeff, _) in &mut self.terms {
            *coeff *= factor;
        }
        self
    }

    fn add(mut self, other: &Polynomial) -> Self {
        self.terms.extend_from_slice(&other.terms);
        self
    }

    fn mul(&self, other: &Polynomial) -> Self {
        let mut terms = Vec::with_capacity(self.terms.len() * other.terms.len());
        for (a, p) in &self.terms {
            for (b, q) in &other.terms {
                terms.push((a * b, [p[0] + q[0], p[1] + q[1], p[2] + q[2]]));
            }
        }
        Self { terms }
    }

    fn differentiate(&self, counts: &[usize]) -> Self {
        let mut terms = self.terms.clone();
        for (direction, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                terms = terms
                    .into_iter()
                    .filter(|(_, exponents)| exponents[direction] > 0)
                    .map(|(coeff, mut exponents)| {
                        let power = exponents[direction];
                        exponents[direction] -= 1;
                        (coeff * f64::from(power), exponents)
                    })
                    .collect();
            }
        }
        Self { terms }
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(coeff, exponents)| {
                exponents
                    .iter()
                    .zip(x)
                    .fold(*coeff, |acc, (&power, &xi)| acc * xi.powi(power as i32))
            })
            .sum()
    }
}

fn linear_basis(cell: CellType) -> Vec<Polynomial> {
    match cell {
        CellType::Interval => vec![Polynomial::affine(0.5, &[-0.5]), Polynomial::affine(0.5, &[0.5])],
        CellType::Triangle => vec![
            Polynomial::affine(0.0, &[-0.5, -0.5]),
            Polynomial::affine(0.5, &[0.5, 0.0]),
            Polynomial::affine(0.5, &[0.0, 0.5]),
        ],
        CellType::Tetrahedron => vec![
            Polynomial::affine(-0.5, &[-0.5, -0.5, -0.5]),
            Polynomial::affine(0.5, &[0.5, 0.0, 0.0]),
            Polynomial::affine(0.5, &[0.0, 0.5, 0.0]),
            Polynomial::affine(0.5, &[0.0, 0.0, 0.5]),
        ],
        CellType::Quadrilateral | CellType::Hexahedron => cell
            .reference_vertices()
            .iter()
            .map(|vertex| {
                // Product of the 1D factors (1 + alpha_i x_i) / 2
                vertex
                    .iter()
                    .enumerate()
                    .fold(Polynomial::constant(1.0), |acc, (i, &alpha)| {
                        let mut a = [0.0; 3];
                        a[i] = 0.5 * alpha;
                        acc.mul(&Polynomial::affine(0.5, &a[..=i]))
                    })
            })
            .collect(),
    }
}

fn lagrange_basis(cell: CellType, degree: usize) -> eyre::Result<Vec<Polynomial>> {
    match (degree, cell) {
        (0, _) => Ok(vec![Polynomial::constant(1.0)]),
        (1, _) => Ok(linear_basis(cell)),
        (2, CellType::Interval | CellType::Triangle | CellType::Tetrahedron) => {
            let psi = linear_basis(cell);
            let mut basis: Vec<_> = psi
                .iter()
                .map(|p| p.mul(&p.clone().scale(2.0).add(&Polynomial::constant(-1.0))))
                .collect();
            // Edge midpoint nodes
            let edges: &[(usize, usize)] = match cell {
                CellType::Interval => &[(0, 1)],
                CellType::Triangle => &[(0, 1), (1, 2), (0, 2)],
                _ => &[(0, 1), (1, 2), (0, 2), (0, 3), (2, 3), (1, 3)],
            };
            basis.extend(
                edges
                    .iter()
                    .map(|&(a, b)| psi[a].mul(&psi[b]).scale(4.0)),
            );
            Ok(basis)
        }
        _ => Err(eyre!("no Lagrange basis of degree {degree} on {cell:?}")),
    }
}
