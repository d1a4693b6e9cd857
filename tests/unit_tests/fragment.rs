use formc::expr::MathFunction;
use formc::format::CFormat;
use formc::transformer::{inner_product, BasisLoop, Fragment, Monomial};
use std::collections::BTreeSet;

fn code(code: &str) -> Fragment {
    Fragment::from_code(code.to_string(), BTreeSet::new())
}

fn monomial(coefficient: f64, code: &str) -> Monomial {
    Monomial {
        coefficient,
        ..Monomial::code(code.to_string(), BTreeSet::new())
    }
}

fn basis(argument: usize, code: &str) -> Fragment {
    let basis_loop = BasisLoop {
        argument,
        range: 3,
        offset: 0,
    };
    Fragment::from_monomial(vec![basis_loop], Monomial::code(code.to_string(), BTreeSet::new()))
}

#[test]
fn inner_product_spells_signs_and_coefficients() {
    let format = CFormat::new();
    let monomials = vec![
        monomial(1.0, "a"),
        monomial(-1.0, "b"),
        monomial(2.0, "c"),
        monomial(-0.5, "d"),
        Monomial::literal(3.0),
        monomial(1e-20, "e"),
    ];
    assert_eq!(
        inner_product(&monomials, &format),
        "a - b + 2.000000000000000e+00*c - 5.000000000000000e-01*d + 3.000000000000000e+00"
    );
}

#[test]
fn inner_product_keeps_the_sign_of_a_leading_negative_term() {
    let format = CFormat::new();
    assert_eq!(
        inner_product(&[monomial(-1.0, "a"), monomial(1.0, "b")], &format),
        "-1.000000000000000e+00*a + b"
    );
    assert_eq!(inner_product(&[Monomial::literal(-2.0)], &format), "-2.000000000000000e+00");
    assert_eq!(inner_product(&[], &format), "0.000000000000000e+00");
    assert_eq!(inner_product(&[monomial(1e-30, "a")], &format), "0.000000000000000e+00");
}

#[test]
fn sums_fold_literals() {
    let format = CFormat::new();
    let sum = Fragment::sum([Fragment::literal(1.0), code("x"), Fragment::literal(2.0)]);
    assert_eq!(sum.num_monomials(), 2);
    assert_eq!(sum.code(&format).unwrap(), "3.000000000000000e+00 + x");

    let cancelled = Fragment::sum([Fragment::literal(1.0), Fragment::literal(-1.0)]);
    assert!(cancelled.is_zero());
    assert_eq!(Fragment::sum([Fragment::literal(1.5), Fragment::zero()]).literal_value(), Some(1.5));
}

#[test]
fn sums_group_terms_by_loop_nest() {
    let sum = Fragment::sum([basis(0, "FE0[ip][j]"), basis(1, "FE0[ip][k]"), basis(0, "FE1[ip][j]")]);
    assert_eq!(sum.len(), 2);
    assert_eq!(sum.num_monomials(), 3);
    let loops: Vec<usize> = sum
        .entries()
        .map(|(loops, _)| loops[0].argument)
        .collect();
    assert_eq!(loops, vec![0, 1]);
}

#[test]
fn products_combine_loop_nests() {
    let format = CFormat::new();
    let product = Fragment::product(
        vec![basis(1, "FE0[ip][k]"), Fragment::literal(2.0), basis(0, "FE0[ip][j]")],
        &format,
        &"v_1*2*v_0",
    )
    .unwrap();

    let (loops, monomials) = product.entries().next().unwrap();
    let arguments: Vec<usize> = loops.iter().map(|l| l.argument).collect();
    assert_eq!(arguments, vec![0, 1]);
    assert_eq!(monomials.len(), 1);
    assert_eq!(monomials[0].coefficient, 2.0);
    assert_eq!(
        product.code(&format).unwrap(),
        "2.000000000000000e+00*FE0[ip][k]*FE0[ip][j]"
    );
}

#[test]
fn products_distribute_over_sums() {
    let format = CFormat::new();
    let sum = Fragment::sum([code("a"), code("b")]);
    let product = Fragment::product(vec![sum, basis(0, "FE0[ip][j]")], &format, &"(a + b)*v_0").unwrap();
    assert_eq!(product.num_monomials(), 2);
    assert_eq!(product.code(&format).unwrap(), "a*FE0[ip][j] + b*FE0[ip][j]");
}

#[test]
fn products_with_zero_vanish() {
    let format = CFormat::new();
    let product = Fragment::product(vec![basis(0, "FE0[ip][j]"), Fragment::zero()], &format, &"v_0*0").unwrap();
    assert!(product.is_zero());
}

#[test]
fn repeated_arguments_in_a_product_are_rejected() {
    let format = CFormat::new();
    let error = Fragment::product(vec![basis(0, "FE0[ip][j]"), basis(0, "FE1[ip][j]")], &format, &"v_0*v_0")
        .unwrap_err();
    assert!(error.is_structural_violation());
}

#[test]
fn division_by_literals_scales() {
    let format = CFormat::new();
    let quotient = basis(0, "FE0[ip][j]")
        .divide(Fragment::literal(4.0), &format, &"v_0/4")
        .unwrap();
    assert_eq!(quotient.code(&format).unwrap(), "2.500000000000000e-01*FE0[ip][j]");
}

#[test]
fn division_by_code() {
    let format = CFormat::new();
    let quotient = Fragment::literal(2.0)
        .divide(code("y"), &format, &"2/y")
        .unwrap();
    assert_eq!(quotient.code(&format).unwrap(), "2.000000000000000e+00/y");

    let quotient = Fragment::sum([code("a"), code("b")])
        .divide(code("c*d"), &format, &"(a + b)/(c*d)")
        .unwrap();
    assert_eq!(quotient.code(&format).unwrap(), "a/(c*d) + b/(c*d)");
}

#[test]
fn invalid_divisions_are_rejected() {
    let format = CFormat::new();
    let by_zero = code("x").divide(Fragment::zero(), &format, &"x/0");
    assert!(by_zero.unwrap_err().is_structural_violation());
    let by_basis = code("x").divide(basis(0, "FE0[ip][j]"), &format, &"x/v_0");
    assert!(by_basis.unwrap_err().is_structural_violation());
}

#[test]
fn powers() {
    let format = CFormat::new();
    let folded = Fragment::literal(2.0)
        .power(Fragment::literal(3.0), &format, &"2**3")
        .unwrap();
    assert_eq!(folded.literal_value(), Some(8.0));

    let squared = code("x")
        .power(Fragment::literal(2.0), &format, &"x**2")
        .unwrap();
    assert_eq!(squared.code(&format).unwrap(), "std::pow(x, 2.000000000000000e+00)");

    let trivial = code("x")
        .power(Fragment::zero(), &format, &"x**0")
        .unwrap();
    assert_eq!(trivial.literal_value(), Some(1.0));

    let error = basis(0, "FE0[ip][j]")
        .power(Fragment::literal(2.0), &format, &"v_0**2")
        .unwrap_err();
    assert!(error.is_structural_violation());
}

#[test]
fn absolute_values_and_math_functions() {
    let format = CFormat::new();
    assert_eq!(
        Fragment::literal(-3.0)
            .abs(&format, &"|-3|")
            .unwrap()
            .literal_value(),
        Some(3.0)
    );
    assert_eq!(
        Fragment::sum([code("a"), code("b")])
            .abs(&format, &"|a + b|")
            .unwrap()
            .code(&format)
            .unwrap(),
        "std::abs(a + b)"
    );

    let root = Fragment::literal(4.0)
        .apply(&MathFunction::Sqrt, &format, &"sqrt(4)")
        .unwrap();
    assert_eq!(root.literal_value(), Some(2.0));
    let log = code("x")
        .apply(&MathFunction::Ln, &format, &"ln(x)")
        .unwrap();
    assert_eq!(log.code(&format).unwrap(), "std::log(x)");

    let error = Fragment::literal(1.0)
        .apply(&MathFunction::Other("erf".to_string()), &format, &"erf(1)")
        .unwrap_err();
    assert!(error.is_unsupported_node());
    let error = basis(0, "FE0[ip][j]")
        .apply(&MathFunction::Exp, &format, &"exp(v_0)")
        .unwrap_err();
    assert!(error.is_structural_violation());
}

#[test]
fn absolute_values_over_basis_functions() {
    let format = CFormat::new();
    let scaled = basis(0, "FE0[ip][j]")
        .scale(-2.0)
        .abs(&format, &"|-2*v_0|")
        .unwrap();
    let (_, monomials) = scaled.entries().next().unwrap();
    assert_eq!(monomials.len(), 1);
    assert_eq!(scaled.code(&format).unwrap(), "std::abs(-2.000000000000000e+00*FE0[ip][j])");

    let sum = Fragment::sum([basis(0, "FE0[ip][j]"), basis(0, "FE1[ip][j]")]);
    let error = sum.abs(&format, &"|v_0 + v_0'|").unwrap_err();
    assert!(error.is_structural_violation());
}

#[test]
fn non_finite_literals_are_rejected() {
    let format = CFormat::new();
    let log_of_zero = Fragment::literal(1.0)
        .scale(0.0)
        .apply(&MathFunction::Ln, &format, &"ln(0)");
    assert!(log_of_zero.unwrap_err().is_structural_violation());

    let root_of_negative = Fragment::literal(-1.0).apply(&MathFunction::Sqrt, &format, &"sqrt(-1)");
    assert!(root_of_negative.unwrap_err().is_structural_violation());

    let reciprocal_of_zero = Fragment::literal(0.5)
        .scale(0.0)
        .power(Fragment::literal(-1.0), &format, &"0**-1");
    assert!(reciprocal_of_zero.unwrap_err().is_structural_violation());

    let finite = Fragment::literal(4.0)
        .power(Fragment::literal(-0.5), &format, &"4**-0.5")
        .unwrap();
    assert_eq!(finite.literal_value(), Some(0.5));
}
