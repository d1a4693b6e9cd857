use formc::expr::Restriction;
use formc::signature::{BasisFactor, IntegralDescriptor, ProductTerm, SignatureComputer, TermGroups, TermIndex};
use proptest::collection::vec;
use proptest::prelude::*;

fn factor(element: &str, argument: usize, derivatives: Vec<TermIndex>) -> BasisFactor {
    BasisFactor {
        element: element.to_string(),
        index: TermIndex::Primary {
            id: argument,
            range: 3,
        },
        components: Vec::new(),
        derivatives,
        restriction: None,
    }
}

fn term(coefficient: f64, factors: Vec<BasisFactor>) -> ProductTerm {
    ProductTerm {
        coefficient,
        factors,
        integral: IntegralDescriptor::cell(0),
    }
}

#[test]
fn mass_matrix_signature() {
    let computer = SignatureComputer::default();
    let term = term(1.0, vec![factor("elemV", 1, vec![]), factor("elemU", 0, vec![])]);
    assert_eq!(
        computer.hard_signature(&term),
        "1.000000000000000e+00*{elemU;i0, 3;[];[];None}*{elemV;i1, 3;[];[];None}*dx0"
    );
    assert_eq!(computer.soft_signature(&term), computer.hard_signature(&term));
}

#[test]
fn components_derivatives_and_restrictions_are_recorded() {
    let computer = SignatureComputer::new(3);
    let factor = BasisFactor {
        element: "V".to_string(),
        index: TermIndex::Primary { id: 0, range: 6 },
        components: vec![TermIndex::Fixed(1)],
        derivatives: vec![TermIndex::Secondary { id: 4, range: 2 }],
        restriction: Some(Restriction::Positive),
    };
    let term = ProductTerm {
        coefficient: -0.5,
        factors: vec![factor],
        integral: IntegralDescriptor::interior_facet(2),
    };
    assert_eq!(computer.hard_signature(&term), "-5.000e-01*{V;i0, 6;[1];[a4, 2];+}*dS2");
    assert_eq!(computer.soft_signature(&term), "-5.000e-01*{V;i0, 6;[1];[a, 2];+}*dS2");
}

#[test]
fn integral_descriptors_name_their_measure() {
    assert_eq!(IntegralDescriptor::cell(1).to_string(), "dx1");
    assert_eq!(IntegralDescriptor::exterior_facet(0).to_string(), "ds0");
    assert_eq!(IntegralDescriptor::interior_facet(3).to_string(), "dS3");
}

#[test]
fn term_index_display() {
    assert_eq!(TermIndex::Fixed(2).to_string(), "2");
    assert_eq!(TermIndex::Primary { id: 1, range: 10 }.to_string(), "i1, 10");
    assert_eq!(TermIndex::Secondary { id: 7, range: 3 }.to_string(), "a7, 3");
}

#[test]
fn terms_differing_in_secondary_numbering_share_a_group() {
    let computer = SignatureComputer::default();
    let a = term(
        2.0,
        vec![factor("P1", 0, vec![TermIndex::Secondary { id: 0, range: 2 }]), factor("P1", 1, vec![])],
    );
    let b = term(
        2.0,
        vec![factor("P1", 0, vec![TermIndex::Secondary { id: 5, range: 2 }]), factor("P1", 1, vec![])],
    );
    let c = term(3.0, vec![factor("P1", 0, vec![]), factor("P1", 1, vec![])]);
    assert_ne!(computer.hard_signature(&a), computer.hard_signature(&b));

    let mut groups = TermGroups::new();
    let group_a = groups.insert(&computer.soft_signature(&a));
    let group_b = groups.insert(&computer.soft_signature(&b));
    let group_c = groups.insert(&computer.soft_signature(&c));
    assert_eq!(group_a, 0);
    assert_eq!(group_b, 0);
    assert_eq!(group_c, 1);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.group_of(&computer.soft_signature(&c)), Some(1));
    assert_eq!(groups.soft_signature(0), Some(computer.soft_signature(&a).as_str()));
    assert_eq!(groups.soft_signature(2), None);

    groups.clear();
    assert!(groups.is_empty());
}

fn term_index() -> impl Strategy<Value = TermIndex> {
    prop_oneof![
        (0usize..4).prop_map(TermIndex::Fixed),
        (0usize..3, 1usize..5).prop_map(|(id, range)| TermIndex::Primary { id, range }),
        (0usize..10, 1usize..4).prop_map(|(id, range)| TermIndex::Secondary { id, range }),
    ]
}

fn restriction() -> impl Strategy<Value = Option<Restriction>> {
    prop_oneof![
        Just(None),
        Just(Some(Restriction::Positive)),
        Just(Some(Restriction::Negative))
    ]
}

fn basis_factor() -> impl Strategy<Value = BasisFactor> {
    (
        "[A-Za-z][A-Za-z0-9_]{0,6}",
        term_index(),
        vec(0usize..3, 0..3),
        vec(term_index(), 0..3),
        restriction(),
    )
        .prop_map(|(element, index, components, derivatives, restriction)| BasisFactor {
            element,
            index,
            components: components.into_iter().map(TermIndex::Fixed).collect(),
            derivatives,
            restriction,
        })
}

fn shift_secondary(index: TermIndex, shift: usize) -> TermIndex {
    match index {
        TermIndex::Secondary { id, range } => TermIndex::Secondary { id: id + shift, range },
        other => other,
    }
}

proptest! {
    #[test]
    fn hard_signature_is_independent_of_factor_order(
        (factors, shuffled) in vec(basis_factor(), 0..5)
            .prop_flat_map(|factors| (Just(factors.clone()), Just(factors).prop_shuffle())),
        coefficient in -10.0..10.0f64
    ) {
        let computer = SignatureComputer::default();
        let original = term(coefficient, factors);
        let permuted = term(coefficient, shuffled);
        prop_assert_eq!(computer.hard_signature(&original), computer.hard_signature(&permuted));
        prop_assert_eq!(computer.soft_signature(&original), computer.soft_signature(&permuted));
    }

    #[test]
    fn soft_signature_ignores_secondary_numbering(factors in vec(basis_factor(), 1..5), shift in 1usize..100) {
        let computer = SignatureComputer::default();
        let renamed: Vec<BasisFactor> = factors
            .iter()
            .cloned()
            .map(|factor| BasisFactor {
                index: shift_secondary(factor.index, shift),
                derivatives: factor
                    .derivatives
                    .iter()
                    .map(|&index| shift_secondary(index, shift))
                    .collect(),
                ..factor
            })
            .collect();
        prop_assert_eq!(
            computer.soft_signature(&term(1.0, factors)),
            computer.soft_signature(&term(1.0, renamed))
        );
    }
}
