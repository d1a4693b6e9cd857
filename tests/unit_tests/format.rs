use formc::expr::{MathFunction, Restriction};
use formc::format::{CFormat, Format};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn floats_use_fixed_precision_scientific_notation() {
    let format = CFormat::new();
    assert_eq!(format.float(1.0), "1.000000000000000e+00");
    assert_eq!(format.float(0.5), "5.000000000000000e-01");
    assert_eq!(format.float(-12.0), "-1.200000000000000e+01");
    assert_eq!(format.float(1e-20), "0.000000000000000e+00");
    assert_eq!(format.float(-1e-20), "0.000000000000000e+00");

    let coarse = CFormat::new().with_precision(3);
    assert_eq!(coarse.float(-2.5), "-2.500e+00");
    assert_eq!(coarse.float(1234.5678), "1.235e+03");
}

#[test]
fn epsilon_is_configurable() {
    let format = CFormat::new().with_epsilon(1e-8);
    assert_eq!(format.epsilon(), 1e-8);
    assert_eq!(format.float(1e-9), "0.000000000000000e+00");
}

#[test]
fn sums_and_differences() {
    let format = CFormat::new();
    assert_eq!(format.add(&strings(&["a", "b*c", "d"])), "a + b*c + d");
    assert_eq!(format.subtract(&strings(&["a", "b + c", "d*e"])), "a - (b + c) - d*e");
    assert_eq!(format.subtract(&strings(&["a + b", "c"])), "a + b - c");
}

#[test]
fn products_parenthesize_compound_factors() {
    let format = CFormat::new();
    assert_eq!(format.multiply(&strings(&["a", "b"])), "a*b");
    assert_eq!(format.multiply(&strings(&["a + b", "c"])), "(a + b)*c");
    assert_eq!(format.multiply(&strings(&["(a + b)", "c - d"])), "(a + b)*(c - d)");
    assert_eq!(format.multiply(&strings(&["-1.000000000000000e+00", "x"])), "-1.000000000000000e+00*x");
}

#[test]
fn divisions() {
    let format = CFormat::new();
    assert_eq!(format.divide("a", "b"), "a/b");
    assert_eq!(format.divide("a", "b*c"), "a/(b*c)");
    assert_eq!(format.divide("a + b", "c"), "(a + b)/c");
    assert_eq!(format.divide("a", "b - c"), "a/(b - c)");
}

#[test]
fn functions() {
    let format = CFormat::new();
    assert_eq!(format.power("x", "2"), "std::pow(x, 2)");
    assert_eq!(format.absolute("a - b"), "std::abs(a - b)");
    assert_eq!(format.math_function(&MathFunction::Sqrt, "x"), "std::sqrt(x)");
    assert_eq!(format.math_function(&MathFunction::Exp, "x"), "std::exp(x)");
    assert_eq!(format.math_function(&MathFunction::Ln, "x"), "std::log(x)");
    assert_eq!(format.math_function(&MathFunction::Sin, "x"), "std::sin(x)");
    assert_eq!(format.math_function(&MathFunction::Cos, "x"), "std::cos(x)");
}

#[test]
fn symbol_names() {
    let format = CFormat::new();
    assert_eq!(format.point_index(), "ip");
    let dofs: Vec<String> = (0..6).map(|n| format.dof_index(n)).collect();
    assert_eq!(dofs, strings(&["j", "k", "l", "m", "j4", "j5"]));
    assert_eq!(format.table_entry("FE0_D10", "ip", "j"), "FE0_D10[ip][j]");
    assert_eq!(format.coefficient_entry(2, 7), "w[2][7]");
    assert_eq!(format.weight(4), "W4[ip]");
    assert_eq!(format.function_name(3), "F3");
}

#[test]
fn geometry_symbols_carry_the_restriction_side() {
    let format = CFormat::new();
    assert_eq!(format.inverse_jacobian(0, 1, None), "K_01");
    assert_eq!(format.inverse_jacobian(1, 0, Some(Restriction::Positive)), "K0_10");
    assert_eq!(format.inverse_jacobian(2, 2, Some(Restriction::Negative)), "K1_22");
    assert_eq!(format.jacobian(1, 0, None), "J_10");
    assert_eq!(format.jacobian(0, 1, Some(Restriction::Negative)), "J1_01");
    assert_eq!(format.jacobian_determinant(None), "detJ");
    assert_eq!(format.jacobian_determinant(Some(Restriction::Positive)), "detJ0");
}
