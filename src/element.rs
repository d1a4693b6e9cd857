//! Finite element metadata consumed by the lowering.
//!
//! The lowering never evaluates basis functions itself. It only needs to know how the value
//! components of an element map onto scalar (or Piola-mapped) sub-elements and their degrees of
//! freedom. Basis values are produced by a [`Tabulator`](tabulate::Tabulator).
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod tabulate;

pub use tabulate::*;

/// Characters that delimit fields in product signatures. Element names must not contain them.
const RESERVED_NAME_CHARACTERS: [char; 4] = [';', '*', '{', '}'];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Interval,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

impl CellType {
    pub fn topological_dimension(&self) -> usize {
        match self {
            Self::Interval => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    /// Vertices of the reference cell.
    ///
    /// The interval is `[-1, 1]`, the quadrilateral and hexahedron are `[-1, 1]^d` and the
    /// simplices are spanned by `(-1, ..., -1)` and its axis-aligned neighbours at distance 2.
    #[rustfmt::skip]
    pub fn reference_vertices(&self) -> Vec<Vec<f64>> {
        let v = |coords: &[f64]| coords.to_vec();
        match self {
            Self::Interval => vec![v(&[-1.0]), v(&[1.0])],
            Self::Triangle => vec![v(&[-1.0, -1.0]), v(&[1.0, -1.0]), v(&[-1.0, 1.0])],
            Self::Quadrilateral => vec![v(&[-1.0, -1.0]), v(&[1.0, -1.0]), v(&[1.0, 1.0]), v(&[-1.0, 1.0])],
            Self::Tetrahedron => vec![
                v(&[-1.0, -1.0, -1.0]), v(&[1.0, -1.0, -1.0]), v(&[-1.0, 1.0, -1.0]), v(&[-1.0, -1.0, 1.0]),
            ],
            Self::Hexahedron => vec![
                v(&[-1.0, -1.0, -1.0]), v(&[1.0, -1.0, -1.0]), v(&[1.0, 1.0, -1.0]), v(&[-1.0, 1.0, -1.0]),
                v(&[-1.0, -1.0, 1.0]), v(&[1.0, -1.0, 1.0]), v(&[1.0, 1.0, 1.0]), v(&[-1.0, 1.0, 1.0]),
            ],
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Interval => 2,
            Self::Triangle => 3,
            Self::Quadrilateral | Self::Tetrahedron => 4,
            Self::Hexahedron => 8,
        }
    }

    pub fn num_facets(&self) -> usize {
        match self {
            Self::Interval => 2,
            Self::Triangle => 3,
            Self::Quadrilateral | Self::Tetrahedron => 4,
            Self::Hexahedron => 6,
        }
    }

    /// The reference cell of the facets of this cell, or `None` for the interval, whose facets
    /// are points.
    pub fn facet_cell(&self) -> Option<CellType> {
        match self {
            Self::Interval => None,
            Self::Triangle | Self::Quadrilateral => Some(Self::Interval),
            Self::Tetrahedron => Some(Self::Triangle),
            Self::Hexahedron => Some(Self::Quadrilateral),
        }
    }

    /// Vertex indices of the given facet, ordered so that they match the vertices of the
    /// facet reference cell.
    ///
    /// Facet `i` of a triangle or tetrahedron is the facet opposite vertex `i`. Facet `i` of an
    /// interval is vertex `i`.
    pub fn facet_vertices(&self, facet: usize) -> Option<Vec<usize>> {
        let vertices: &[usize] = match (self, facet) {
            (Self::Interval, 0) => &[0],
            (Self::Interval, 1) => &[1],
            (Self::Triangle, 0) => &[1, 2],
            (Self::Triangle, 1) => &[0, 2],
            (Self::Triangle, 2) => &[0, 1],
            (Self::Quadrilateral, 0) => &[0, 1],
            (Self::Quadrilateral, 1) => &[1, 2],
            (Self::Quadrilateral, 2) => &[2, 3],
            (Self::Quadrilateral, 3) => &[3, 0],
            (Self::Tetrahedron, 0) => &[1, 2, 3],
            (Self::Tetrahedron, 1) => &[0, 2, 3],
            (Self::Tetrahedron, 2) => &[0, 1, 3],
            (Self::Tetrahedron, 3) => &[0, 1, 2],
            (Self::Hexahedron, 0) => &[0, 1, 2, 3],
            (Self::Hexahedron, 1) => &[4, 5, 6, 7],
            (Self::Hexahedron, 2) => &[0, 1, 5, 4],
            (Self::Hexahedron, 3) => &[1, 2, 6, 5],
            (Self::Hexahedron, 4) => &[2, 3, 7, 6],
            (Self::Hexahedron, 5) => &[3, 0, 4, 7],
            _ => return None,
        };
        Some(vertices.to_vec())
    }

    /// Maps a point on the facet reference cell to the corresponding point on the given facet
    /// of this reference cell.
    pub fn map_facet_point(&self, facet: usize, point: &[f64]) -> Option<Vec<f64>> {
        let facet_vertices = self.facet_vertices(facet)?;
        let cell_vertices = self.reference_vertices();
        let weights = match self.facet_cell() {
            Some(facet_cell) => facet_cell.linear_basis(point),
            None => vec![1.0],
        };
        let mut mapped = vec![0.0; self.topological_dimension()];
        for (weight, &vertex) in weights.iter().zip(&facet_vertices) {
            for (x, v) in mapped.iter_mut().zip(&cell_vertices[vertex]) {
                *x += weight * v;
            }
        }
        Some(mapped)
    }

    /// Evaluates the linear (vertex) basis functions of the reference cell at the given point.
    pub fn linear_basis(&self, xi: &[f64]) -> Vec<f64> {
        let coord = |i: usize| xi.get(i).copied().unwrap_or(0.0);
        let (x, y, z) = (coord(0), coord(1), coord(2));
        match self {
            Self::Interval => vec![0.5 * (1.0 - x), 0.5 * (1.0 + x)],
            Self::Triangle => vec![-0.5 * x - 0.5 * y, 0.5 * x + 0.5, 0.5 * y + 0.5],
            Self::Tetrahedron => vec![-0.5 * x - 0.5 * y - 0.5 * z - 0.5, 0.5 * x + 0.5, 0.5 * y + 0.5, 0.5 * z + 0.5],
            Self::Quadrilateral | Self::Hexahedron => self
                .reference_vertices()
                .iter()
                .map(|vertex| {
                    vertex
                        .iter()
                        .zip(xi)
                        .map(|(alpha, x)| 0.5 * (1.0 + alpha * x))
                        .product()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Lagrange,
    DiscontinuousLagrange,
    /// Point evaluation at quadrature points. Derivatives of these elements are not defined.
    Quadrature,
    RaviartThomas,
    BrezziDouglasMarini,
    Nedelec,
}

impl Family {
    pub fn mapping(&self) -> Mapping {
        match self {
            Self::Lagrange | Self::DiscontinuousLagrange | Self::Quadrature => Mapping::Affine,
            Self::RaviartThomas | Self::BrezziDouglasMarini => Mapping::ContravariantPiola,
            Self::Nedelec => Mapping::CovariantPiola,
        }
    }

    pub fn is_point_evaluation(&self) -> bool {
        matches!(self, Self::Quadrature)
    }
}

/// How reference basis values are mapped to physical values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mapping {
    Affine,
    ContravariantPiola,
    CovariantPiola,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementStructure {
    Simple,
    Mixed(Vec<Arc<ElementDescriptor>>),
    /// Every value component is represented by a copy of `sub_element`.
    ///
    /// `component_map[flat]` is the copy representing the row-major flat value component `flat`.
    /// Symmetric tensors map transposed components to the same copy.
    Tensor {
        sub_element: Arc<ElementDescriptor>,
        component_map: Vec<usize>,
    },
}

/// Metadata of a finite element.
///
/// The name is the identity of the element: it names tables and appears in signatures, so two
/// different elements must not share a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    name: String,
    family: Family,
    cell: CellType,
    degree: usize,
    value_shape: Vec<usize>,
    geometric_dimension: usize,
    space_dimension: usize,
    structure: ElementStructure,
}

fn check_name(name: &str) {
    assert!(
        !name.contains(RESERVED_NAME_CHARACTERS),
        "Element name {name:?} must not contain any of {RESERVED_NAME_CHARACTERS:?}"
    );
}

fn lagrange_space_dimension(cell: CellType, degree: usize) -> usize {
    let n = degree;
    match cell {
        CellType::Interval => n + 1,
        CellType::Triangle => (n + 1) * (n + 2) / 2,
        CellType::Tetrahedron => (n + 1) * (n + 2) * (n + 3) / 6,
        CellType::Quadrilateral => (n + 1).pow(2),
        CellType::Hexahedron => (n + 1).pow(3),
    }
}

impl ElementDescriptor {
    /// A simple element with arbitrary family, value shape and number of degrees of freedom.
    ///
    /// # Panics
    ///
    /// Panics if the name contains one of the signature separators `;`, `*`, `{` or `}`.
    pub fn new(
        name: impl Into<String>,
        family: Family,
        cell: CellType,
        degree: usize,
        value_shape: Vec<usize>,
        space_dimension: usize,
    ) -> Self {
        let name = name.into();
        check_name(&name);
        Self {
            name,
            family,
            cell,
            degree,
            value_shape,
            geometric_dimension: cell.topological_dimension(),
            space_dimension,
            structure: ElementStructure::Simple,
        }
    }

    /// A scalar continuous Lagrange element.
    pub fn lagrange(name: impl Into<String>, cell: CellType, degree: usize) -> Self {
        let space_dimension = lagrange_space_dimension(cell, degree);
        Self::new(name, Family::Lagrange, cell, degree, Vec::new(), space_dimension)
    }

    /// A scalar discontinuous Lagrange element.
    pub fn discontinuous_lagrange(name: impl Into<String>, cell: CellType, degree: usize) -> Self {
        let space_dimension = lagrange_space_dimension(cell, degree);
        Self::new(name, Family::DiscontinuousLagrange, cell, degree, Vec::new(), space_dimension)
    }

    /// A scalar quadrature element with one degree of freedom per quadrature point.
    pub fn quadrature(name: impl Into<String>, cell: CellType, num_points: usize) -> Self {
        Self::new(name, Family::Quadrature, cell, 0, Vec::new(), num_points)
    }

    /// A vector-valued element with `dim` copies of the scalar element `sub_element`.
    pub fn vector(name: impl Into<String>, sub_element: Arc<ElementDescriptor>, dim: usize) -> Self {
        Self::tensor_with_map(name, sub_element, vec![dim], (0..dim).collect())
    }

    /// A matrix-valued element with one copy of `sub_element` per entry.
    pub fn tensor(name: impl Into<String>, sub_element: Arc<ElementDescriptor>, rows: usize, cols: usize) -> Self {
        Self::tensor_with_map(name, sub_element, vec![rows, cols], (0..rows * cols).collect())
    }

    /// A symmetric `dim x dim` element storing one copy of `sub_element` per upper triangular entry.
    pub fn symmetric_tensor(name: impl Into<String>, sub_element: Arc<ElementDescriptor>, dim: usize) -> Self {
        let mut upper = vec![0; dim * dim];
        let mut next = 0;
        for i in 0..dim {
            for j in i..dim {
                upper[i * dim + j] = next;
                next += 1;
            }
        }
        let component_map = (0..dim * dim)
            .map(|flat| {
                let (i, j) = (flat / dim, flat % dim);
                upper[i.min(j) * dim + i.max(j)]
            })
            .collect();
        Self::tensor_with_map(name, sub_element, vec![dim, dim], component_map)
    }

    fn tensor_with_map(
        name: impl Into<String>,
        sub_element: Arc<ElementDescriptor>,
        value_shape: Vec<usize>,
        component_map: Vec<usize>,
    ) -> Self {
        let name = name.into();
        check_name(&name);
        assert!(
            sub_element.value_shape.is_empty(),
            "Tensor element {name} requires a scalar sub-element, got {}",
            sub_element.name
        );
        let num_copies = component_map.iter().max().map(|max| max + 1).unwrap_or(0);
        Self {
            name,
            family: sub_element.family,
            cell: sub_element.cell,
            degree: sub_element.degree,
            value_shape,
            geometric_dimension: sub_element.geometric_dimension,
            space_dimension: num_copies * sub_element.space_dimension,
            structure: ElementStructure::Tensor {
                sub_element,
                component_map,
            },
        }
    }

    /// A mixed element whose value is the concatenation of the flattened values of its sub-elements.
    ///
    /// # Panics
    ///
    /// Panics if there are no sub-elements or the sub-elements live on different cells.
    pub fn mixed(name: impl Into<String>, sub_elements: Vec<Arc<ElementDescriptor>>) -> Self {
        let name = name.into();
        check_name(&name);
        let first = sub_elements
            .first()
            .unwrap_or_else(|| panic!("Mixed element {name} needs at least one sub-element"));
        for sub in &sub_elements {
            assert_eq!(sub.cell, first.cell, "Sub-elements of {name} must share the same cell");
            assert_eq!(
                sub.geometric_dimension, first.geometric_dimension,
                "Sub-elements of {name} must share the same geometric dimension"
            );
        }
        Self {
            family: first.family,
            cell: first.cell,
            degree: sub_elements.iter().map(|sub| sub.degree).max().unwrap_or(0),
            value_shape: vec![sub_elements.iter().map(|sub| sub.value_size()).sum()],
            geometric_dimension: first.geometric_dimension,
            space_dimension: sub_elements.iter().map(|sub| sub.space_dimension).sum(),
            structure: ElementStructure::Mixed(sub_elements),
            name,
        }
    }

    /// Overrides the geometric dimension, e.g. for a triangle embedded in three dimensions.
    pub fn with_geometric_dimension(mut self, geometric_dimension: usize) -> Self {
        self.geometric_dimension = geometric_dimension;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn cell(&self) -> CellType {
        self.cell
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn value_shape(&self) -> &[usize] {
        &self.value_shape
    }

    pub fn geometric_dimension(&self) -> usize {
        self.geometric_dimension
    }

    pub fn space_dimension(&self) -> usize {
        self.space_dimension
    }

    pub fn structure(&self) -> &ElementStructure {
        &self.structure
    }

    pub fn mapping(&self) -> Mapping {
        self.family.mapping()
    }

    /// Total number of scalar value components.
    pub fn value_size(&self) -> usize {
        self.value_shape.iter().product()
    }

    /// The row-major flat value index of a component tuple, or `None` if the tuple does not
    /// address a value component of this element.
    pub fn flatten_component(&self, component: &[usize]) -> Option<usize> {
        if component.len() != self.value_shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&c, &extent) in component.iter().zip(&self.value_shape) {
            if c >= extent {
                return None;
            }
            flat = flat * extent + c;
        }
        Some(flat)
    }

    fn unflatten_component(&self, mut flat: usize) -> Vec<usize> {
        let mut component = vec![0; self.value_shape.len()];
        for (c, &extent) in component.iter_mut().zip(&self.value_shape).rev() {
            *c = flat % extent;
            flat /= extent;
        }
        component
    }

    /// Finds the simple element addressed by a component tuple.
    ///
    /// Returns the component relative to that element along with the element itself.
    pub fn extract_component(self: &Arc<Self>, component: &[usize]) -> Option<(Vec<usize>, Arc<ElementDescriptor>)> {
        let flat = self.flatten_component(component)?;
        match &self.structure {
            ElementStructure::Simple => Some((component.to_vec(), Arc::clone(self))),
            ElementStructure::Tensor { sub_element, .. } => Some((Vec::new(), Arc::clone(sub_element))),
            ElementStructure::Mixed(sub_elements) => {
                let mut value_offset = 0;
                for sub in sub_elements {
                    if flat < value_offset + sub.value_size() {
                        let local = sub.unflatten_component(flat - value_offset);
                        return sub.extract_component(&local);
                    }
                    value_offset += sub.value_size();
                }
                None
            }
        }
    }

    /// Finds the simple element representing the given flat value component, together with the
    /// offset of its degrees of freedom within this element.
    pub fn component_element(self: &Arc<Self>, flat: usize) -> Option<(Arc<ElementDescriptor>, usize)> {
        if flat >= self.value_size() {
            return None;
        }
        match &self.structure {
            ElementStructure::Simple => Some((Arc::clone(self), 0)),
            ElementStructure::Tensor {
                sub_element,
                component_map,
            } => {
                let copy = component_map[flat];
                Some((Arc::clone(sub_element), copy * sub_element.space_dimension))
            }
            ElementStructure::Mixed(sub_elements) => {
                let mut value_offset = 0;
                let mut dof_offset = 0;
                for sub in sub_elements {
                    if flat < value_offset + sub.value_size() {
                        let (element, offset) = sub.component_element(flat - value_offset)?;
                        return Some((element, dof_offset + offset));
                    }
                    value_offset += sub.value_size();
                    dof_offset += sub.space_dimension;
                }
                None
            }
        }
    }
}
