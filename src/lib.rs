//! Lowering of finite element weak-form integrands to quadrature point code.
//!
//! An integrand is an expression tree (see [`expr`]) over basis functions, coefficients,
//! spatial derivatives, facet restrictions and tensor indices. The
//! [`QuadratureTransformer`](transformer::QuadratureTransformer) turns it into code evaluated at
//! every quadrature point, referencing precomputed basis tables and quadrature weights, and
//! computes signatures that identify terms sharing reference data.
pub mod element;
pub mod error;
pub mod expr;
pub mod format;
pub mod options;
pub mod quadrature;
pub mod signature;
pub mod tables;
pub mod transformer;
pub mod util;

pub extern crate formc_quadrature;
pub extern crate nalgebra;
