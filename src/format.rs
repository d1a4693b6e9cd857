//! The code-emission backend.
//!
//! The lowering decides *what* to compute. A [`Format`] decides how every operation is spelled
//! in the target language.
use crate::expr::{MathFunction, Restriction};
use crate::util::format_scientific;

/// Spelling of scalar operations and symbols in generated code.
///
/// Only the operations are required. The symbol names have defaults matching the conventions of
/// the generated tabulation routines: `ip` is the quadrature point index, `j, k, l, m` are
/// degree-of-freedom indices, `w` holds coefficient values and `K`, `J` and `detJ` are the
/// inverse Jacobian, Jacobian and Jacobian determinant of the cell.
pub trait Format {
    /// Tolerance below which numeric values are treated as zero.
    fn epsilon(&self) -> f64;

    fn float(&self, value: f64) -> String;

    fn add(&self, terms: &[String]) -> String;

    /// `terms[0] - terms[1] - ...`
    fn subtract(&self, terms: &[String]) -> String;

    fn multiply(&self, factors: &[String]) -> String;

    fn divide(&self, numerator: &str, denominator: &str) -> String;

    fn power(&self, base: &str, exponent: &str) -> String;

    fn absolute(&self, value: &str) -> String;

    /// Only called with the supported functions `sqrt`, `exp`, `ln`, `sin` and `cos`.
    fn math_function(&self, function: &MathFunction, argument: &str) -> String;

    fn point_index(&self) -> String {
        "ip".to_string()
    }

    /// Loop index of the degrees of freedom of the given argument.
    fn dof_index(&self, argument: usize) -> String {
        match argument {
            0 => "j".to_string(),
            1 => "k".to_string(),
            2 => "l".to_string(),
            3 => "m".to_string(),
            n => format!("j{n}"),
        }
    }

    fn table_entry(&self, table: &str, point: &str, dof: &str) -> String {
        format!("{table}[{point}][{dof}]")
    }

    fn coefficient_entry(&self, count: usize, dof: usize) -> String {
        format!("w[{count}][{dof}]")
    }

    /// Entry `(r, d)` of the inverse Jacobian, i.e. the derivative of reference coordinate `r`
    /// with respect to physical coordinate `d`.
    fn inverse_jacobian(&self, r: usize, d: usize, restriction: Option<Restriction>) -> String {
        format!("K{}_{r}{d}", side_suffix(restriction))
    }

    fn jacobian(&self, i: usize, r: usize, restriction: Option<Restriction>) -> String {
        format!("J{}_{i}{r}", side_suffix(restriction))
    }

    fn jacobian_determinant(&self, restriction: Option<Restriction>) -> String {
        format!("detJ{}", side_suffix(restriction))
    }

    fn weight(&self, num_points: usize) -> String {
        format!("W{num_points}[{}]", self.point_index())
    }

    fn function_name(&self, slot: usize) -> String {
        format!("F{slot}")
    }
}

fn side_suffix(restriction: Option<Restriction>) -> &'static str {
    match restriction {
        None => "",
        Some(Restriction::Positive) => "0",
        Some(Restriction::Negative) => "1",
    }
}

/// Whether an expression contains an addition or subtraction outside of any parentheses.
fn is_compound(code: &str) -> bool {
    let mut depth = 0i32;
    let bytes = code.as_bytes();
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'+' | b'-' if depth == 0 && i > 0 && bytes[i - 1] == b' ' => return true,
            _ => {}
        }
    }
    false
}

fn parenthesize(code: &str) -> String {
    if is_compound(code) {
        format!("({code})")
    } else {
        code.to_string()
    }
}

/// A C++ backend using `double` arithmetic and the `std::` math functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CFormat {
    precision: usize,
    epsilon: f64,
}

impl Default for CFormat {
    fn default() -> Self {
        Self {
            precision: 15,
            epsilon: 3e-16,
        }
    }
}

impl CFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of digits after the decimal point in floating point literals.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Format for CFormat {
    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn float(&self, value: f64) -> String {
        // Avoid emitting "-0.0..."
        let value = if value.abs() < self.epsilon { 0.0 } else { value };
        format_scientific(value, self.precision)
    }

    fn add(&self, terms: &[String]) -> String {
        terms.join(" + ")
    }

    fn subtract(&self, terms: &[String]) -> String {
        let mut code = String::new();
        for (i, term) in terms.iter().enumerate() {
            if i == 0 {
                code.push_str(term);
            } else {
                code.push_str(" - ");
                code.push_str(&parenthesize(term));
            }
        }
        code
    }

    fn multiply(&self, factors: &[String]) -> String {
        factors
            .iter()
            .map(|factor| parenthesize(factor))
            .collect::<Vec<_>>()
            .join("*")
    }

    fn divide(&self, numerator: &str, denominator: &str) -> String {
        let denominator = if denominator.contains('*') || denominator.contains('/') {
            format!("({denominator})")
        } else {
            parenthesize(denominator)
        };
        format!("{}/{}", parenthesize(numerator), denominator)
    }

    fn power(&self, base: &str, exponent: &str) -> String {
        format!("std::pow({base}, {exponent})")
    }

    fn absolute(&self, value: &str) -> String {
        format!("std::abs({value})")
    }

    fn math_function(&self, function: &MathFunction, argument: &str) -> String {
        let name = match function {
            MathFunction::Ln => "log",
            other => other.name(),
        };
        format!("std::{name}({argument})")
    }
}
