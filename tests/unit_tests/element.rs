use crate::p1;
use formc::element::{CellType, ElementDescriptor, Family, Mapping};
use matrixcompare::assert_scalar_eq;
use std::sync::Arc;

fn taylor_hood() -> Arc<ElementDescriptor> {
    let p2 = Arc::new(ElementDescriptor::lagrange("P2", CellType::Triangle, 2));
    let velocity = Arc::new(ElementDescriptor::vector("VP2", p2, 2));
    Arc::new(ElementDescriptor::mixed("TH", vec![velocity, p1("P1", CellType::Triangle)]))
}

#[test]
fn lagrange_space_dimensions() {
    let dim = |cell, degree| ElementDescriptor::lagrange("P", cell, degree).space_dimension();
    assert_eq!(dim(CellType::Interval, 2), 3);
    assert_eq!(dim(CellType::Triangle, 1), 3);
    assert_eq!(dim(CellType::Triangle, 2), 6);
    assert_eq!(dim(CellType::Tetrahedron, 2), 10);
    assert_eq!(dim(CellType::Quadrilateral, 1), 4);
    assert_eq!(dim(CellType::Hexahedron, 2), 27);
}

#[test]
fn mixed_element_shape_and_dimension() {
    let element = taylor_hood();
    assert_eq!(element.value_shape(), &[3]);
    assert_eq!(element.value_size(), 3);
    assert_eq!(element.space_dimension(), 15);
    assert_eq!(element.geometric_dimension(), 2);
    assert_eq!(element.mapping(), Mapping::Affine);
}

#[test]
fn mixed_element_component_lookup() {
    let element = taylor_hood();

    let (local, pressure) = element.extract_component(&[2]).unwrap();
    assert!(local.is_empty());
    assert_eq!(pressure.name(), "P1");
    let (sub, offset) = element.component_element(2).unwrap();
    assert_eq!(sub.name(), "P1");
    assert_eq!(offset, 12);

    let (local, velocity) = element.extract_component(&[1]).unwrap();
    assert!(local.is_empty());
    assert_eq!(velocity.name(), "P2");
    let (sub, offset) = element.component_element(1).unwrap();
    assert_eq!(sub.name(), "P2");
    assert_eq!(offset, 6);

    assert!(element.extract_component(&[3]).is_none());
    assert!(element.extract_component(&[0, 0]).is_none());
    assert!(element.component_element(3).is_none());
}

#[test]
fn symmetric_tensor_shares_off_diagonal_copies() {
    let element = Arc::new(ElementDescriptor::symmetric_tensor("S", p1("P1", CellType::Triangle), 2));
    assert_eq!(element.value_shape(), &[2, 2]);
    assert_eq!(element.space_dimension(), 9);
    assert_eq!(element.flatten_component(&[1, 0]), Some(2));

    let offsets: Vec<usize> = (0..4)
        .map(|flat| element.component_element(flat).unwrap().1)
        .collect();
    assert_eq!(offsets, vec![0, 3, 3, 6]);
}

#[test]
fn flatten_component_rejects_invalid_tuples() {
    let element = ElementDescriptor::tensor("T", p1("P1", CellType::Tetrahedron), 3, 2);
    assert_eq!(element.flatten_component(&[2, 1]), Some(5));
    assert_eq!(element.flatten_component(&[3, 0]), None);
    assert_eq!(element.flatten_component(&[0]), None);
}

#[test]
fn piola_families_have_piola_mappings() {
    assert_eq!(Family::RaviartThomas.mapping(), Mapping::ContravariantPiola);
    assert_eq!(Family::BrezziDouglasMarini.mapping(), Mapping::ContravariantPiola);
    assert_eq!(Family::Nedelec.mapping(), Mapping::CovariantPiola);
    assert_eq!(Family::DiscontinuousLagrange.mapping(), Mapping::Affine);
    assert!(Family::Quadrature.is_point_evaluation());
    assert!(!Family::Lagrange.is_point_evaluation());
}

#[test]
fn geometric_dimension_can_exceed_topological_dimension() {
    let element = ElementDescriptor::lagrange("P1", CellType::Triangle, 1).with_geometric_dimension(3);
    assert_eq!(element.geometric_dimension(), 3);
    assert_eq!(element.cell().topological_dimension(), 2);
}

#[test]
#[should_panic]
fn element_names_must_not_contain_signature_separators() {
    let _ = ElementDescriptor::lagrange("P1;bad", CellType::Triangle, 1);
}

#[test]
fn element_descriptor_serde_round_trip() {
    let element = taylor_hood();
    let json = serde_json::to_string(element.as_ref()).unwrap();
    let deserialized: ElementDescriptor = serde_json::from_str(&json).unwrap();
    assert_eq!(&deserialized, element.as_ref());
}

#[test]
fn facet_vertices_follow_opposite_vertex_numbering() {
    assert_eq!(CellType::Triangle.facet_vertices(0), Some(vec![1, 2]));
    assert_eq!(CellType::Tetrahedron.facet_vertices(3), Some(vec![0, 1, 2]));
    assert_eq!(CellType::Interval.facet_vertices(1), Some(vec![1]));
    assert_eq!(CellType::Triangle.facet_vertices(3), None);
    for cell in [
        CellType::Interval,
        CellType::Triangle,
        CellType::Quadrilateral,
        CellType::Tetrahedron,
        CellType::Hexahedron,
    ] {
        for facet in 0..cell.num_facets() {
            assert!(cell.facet_vertices(facet).is_some());
        }
        assert!(cell.facet_vertices(cell.num_facets()).is_none());
    }
}

#[test]
fn map_facet_point_to_cell() {
    let mapped = CellType::Triangle.map_facet_point(0, &[0.0]).unwrap();
    assert_scalar_eq!(mapped[0], 0.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(mapped[1], 0.0, comp = abs, tol = 1e-15);

    let mapped = CellType::Tetrahedron
        .map_facet_point(0, &[-1.0, -1.0])
        .unwrap();
    assert_eq!(mapped, vec![1.0, -1.0, -1.0]);

    let mapped = CellType::Hexahedron.map_facet_point(1, &[0.0, 0.0]).unwrap();
    for (x, expected) in mapped.iter().zip([0.0, 0.0, 1.0]) {
        assert_scalar_eq!(*x, expected, comp = abs, tol = 1e-15);
    }

    assert_eq!(CellType::Interval.map_facet_point(1, &[]), Some(vec![1.0]));
    assert_eq!(CellType::Triangle.map_facet_point(5, &[0.0]), None);
}

#[test]
fn linear_basis_is_a_partition_of_unity() {
    let points: [&[f64]; 5] = [&[0.3], &[-0.2, 0.1], &[0.5, -0.7], &[-0.1, -0.2, 0.1], &[0.4, 0.1, -0.9]];
    let cells = [
        CellType::Interval,
        CellType::Triangle,
        CellType::Quadrilateral,
        CellType::Tetrahedron,
        CellType::Hexahedron,
    ];
    for (cell, point) in cells.iter().zip(points) {
        let sum: f64 = cell.linear_basis(point).iter().sum();
        assert_scalar_eq!(sum, 1.0, comp = abs, tol = 1e-14);
    }
}
