use formc_quadrature::integrate;
use formc_quadrature::simplex::{tetrahedron_collapsed_gauss, triangle_collapsed_gauss};
use matrixcompare::assert_scalar_eq;

/// Integral of (x + 1)^a (y + 1)^b over the reference triangle, i.e. 2^(a + b + 2) a! b! / (a + b + 2)!.
fn triangle_monomial_integral(a: u32, b: u32) -> f64 {
    let factorial = |n: u32| (1..=n).map(f64::from).product::<f64>();
    2f64.powi((a + b + 2) as i32) * factorial(a) * factorial(b) / factorial(a + b + 2)
}

fn tetrahedron_monomial_integral(a: u32, b: u32, c: u32) -> f64 {
    let factorial = |n: u32| (1..=n).map(f64::from).product::<f64>();
    2f64.powi((a + b + c + 3) as i32) * factorial(a) * factorial(b) * factorial(c) / factorial(a + b + c + 3)
}

#[test]
fn triangle_rule_has_reference_area_and_interior_points() {
    for n in 1..=6 {
        let rule = triangle_collapsed_gauss(n);
        assert_scalar_eq!(rule.0.iter().sum::<f64>(), 2.0, comp = abs, tol = 1e-14);
        for &[x, y] in &rule.1 {
            assert!(x > -1.0 && y > -1.0 && x + y < 0.0);
        }
    }
}

#[test]
fn triangle_rule_integrates_polynomials_exactly() {
    for n in 1..=6u32 {
        let degree = 2 * n - 2;
        let rule = triangle_collapsed_gauss(n as usize);
        for a in 0..=degree {
            for b in 0..=(degree - a) {
                let estimated = integrate(&rule, |&[x, y]| (x + 1.0).powi(a as i32) * (y + 1.0).powi(b as i32));
                assert_scalar_eq!(estimated, triangle_monomial_integral(a, b), comp = abs, tol = 1e-13);
            }
        }
    }
}

#[test]
fn tetrahedron_rule_integrates_polynomials_exactly() {
    for n in 2..=5u32 {
        let degree = 2 * n - 3;
        let rule = tetrahedron_collapsed_gauss(n as usize);
        assert_scalar_eq!(rule.0.iter().sum::<f64>(), 4.0 / 3.0, comp = abs, tol = 1e-14);
        for a in 0..=degree {
            for b in 0..=(degree - a) {
                for c in 0..=(degree - a - b) {
                    let estimated = integrate(&rule, |&[x, y, z]| {
                        (x + 1.0).powi(a as i32) * (y + 1.0).powi(b as i32) * (z + 1.0).powi(c as i32)
                    });
                    assert_scalar_eq!(
                        estimated,
                        tetrahedron_monomial_integral(a, b, c),
                        comp = abs,
                        tol = 1e-13
                    );
                }
            }
        }
    }
}
