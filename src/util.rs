use itertools::Itertools;

/// Formats a floating point number in C-style scientific notation, i.e. like `printf("%.*e")`.
///
/// Rust's own `{:e}` formatting omits the sign and the zero padding of the exponent, which would
/// make generated code and signatures differ from the established `1.000000000000000e+00` layout.
pub fn format_scientific(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    let parts = formatted
        .split_once('e')
        .and_then(|(mantissa, exponent)| Some((mantissa, exponent.parse::<i32>().ok()?)));
    match parts {
        Some((mantissa, exponent)) => {
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        // NaN and infinities have no exponent
        None => formatted,
    }
}

/// All tuples of length `order` with entries in `0 .. dim`, in lexicographic order.
///
/// For `order == 0` the result contains exactly one (empty) tuple.
pub fn cartesian_power(dim: usize, order: usize) -> Vec<Vec<usize>> {
    if order == 0 {
        return vec![Vec::new()];
    }
    (0..order)
        .map(|_| 0..dim)
        .multi_cartesian_product()
        .collect()
}

/// Converts a tuple of directions into the number of times each direction occurs.
pub fn direction_counts(directions: &[usize], dim: usize) -> Vec<usize> {
    let mut counts = vec![0; dim];
    for &d in directions {
        counts[d] += 1;
    }
    counts
}
