//! Intermediate results of the lowering.
//!
//! A [`Fragment`] is a sum of products. Its entries are grouped by the basis function loops they
//! live in, and every entry is a list of [`Monomial`]s: a numeric coefficient times an optional
//! piece of code, together with the basis factors needed to compute the signature of the term.
use crate::error::{LoweringError, Result};
use crate::expr::MathFunction;
use crate::format::Format;
use crate::signature::BasisFactor;
use crate::tables::TableHandle;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// A loop over the degrees of freedom of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisLoop {
    pub argument: usize,
    pub range: usize,
    /// Offset of the loop within the degrees of freedom of the argument's element.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Monomial {
    pub coefficient: f64,
    /// `None` stands for the value one.
    pub code: Option<String>,
    pub factors: Vec<BasisFactor>,
    pub tables: BTreeSet<TableHandle>,
}

impl Monomial {
    pub fn literal(value: f64) -> Self {
        Self {
            coefficient: value,
            code: None,
            factors: Vec::new(),
            tables: BTreeSet::new(),
        }
    }

    pub fn code(code: String, tables: BTreeSet<TableHandle>) -> Self {
        Self {
            coefficient: 1.0,
            code: Some(code),
            factors: Vec::new(),
            tables,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.code.is_none()
    }

    fn times<F: Format + ?Sized>(&self, other: &Monomial, format: &F) -> Monomial {
        let code = match (&self.code, &other.code) {
            (Some(a), Some(b)) => Some(format.multiply(&[a.clone(), b.clone()])),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };
        Monomial {
            coefficient: self.coefficient * other.coefficient,
            code,
            factors: self.factors.iter().chain(&other.factors).cloned().collect(),
            tables: self.tables.union(&other.tables).copied().collect(),
        }
    }
}

/// Materializes a sum of monomials.
///
/// Unit coefficients are not multiplied out, negative coefficients become subtractions and
/// coefficients within the format epsilon of zero are skipped. An empty sum is the literal zero.
pub fn inner_product<F: Format + ?Sized>(monomials: &[Monomial], format: &F) -> String {
    let eps = format.epsilon();
    let mut value: Option<String> = None;
    for monomial in monomials {
        let c = monomial.coefficient;
        if c.abs() <= eps {
            continue;
        }
        let negative = c < 0.0;
        let magnitude = match &monomial.code {
            None => format.float(c.abs()),
            Some(code) if (c.abs() - 1.0).abs() < eps => code.clone(),
            Some(code) => format.multiply(&[format.float(c.abs()), code.clone()]),
        };
        value = Some(match value {
            None if negative => match &monomial.code {
                None => format.float(c),
                Some(code) => format.multiply(&[format.float(c), code.clone()]),
            },
            None => magnitude,
            Some(value) if negative => format.subtract(&[value, magnitude]),
            Some(value) => format.add(&[value, magnitude]),
        });
    }
    value.unwrap_or_else(|| format.float(0.0))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    entries: BTreeMap<Vec<BasisLoop>, Vec<Monomial>>,
}

impl Fragment {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn literal(value: f64) -> Self {
        if value == 0.0 {
            return Self::zero();
        }
        Self::from_monomial(Vec::new(), Monomial::literal(value))
    }

    /// A basis-free fragment holding a single piece of code.
    pub fn from_code(code: String, tables: BTreeSet<TableHandle>) -> Self {
        Self::from_monomial(Vec::new(), Monomial::code(code, tables))
    }

    pub fn from_monomial(loops: Vec<BasisLoop>, monomial: Monomial) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(loops, vec![monomial]);
        Self { entries }
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct loop nests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_monomials(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Entries ordered by their loop nests.
    pub fn entries(&self) -> impl Iterator<Item = (&[BasisLoop], &[Monomial])> {
        self.entries
            .iter()
            .map(|(loops, monomials)| (loops.as_slice(), monomials.as_slice()))
    }

    pub fn monomials(&self, loops: &[BasisLoop]) -> Option<&[Monomial]> {
        self.entries.get(loops).map(Vec::as_slice)
    }

    pub fn is_basis_free(&self) -> bool {
        self.entries.keys().all(Vec::is_empty)
    }

    /// The value of a fragment made up of literals only.
    pub fn literal_value(&self) -> Option<f64> {
        let mut value = 0.0;
        for (loops, monomials) in &self.entries {
            if !loops.is_empty() || monomials.iter().any(|m| !m.is_literal()) {
                return None;
            }
            value += monomials.iter().map(|m| m.coefficient).sum::<f64>();
        }
        Some(value)
    }

    /// Materialized code of a fragment with a single loop nest.
    pub fn code<F: Format + ?Sized>(&self, format: &F) -> Option<String> {
        match self.entries.values().exactly_one() {
            Ok(monomials) => Some(inner_product(monomials, format)),
            Err(_) => None,
        }
    }

    /// All tables referenced by the fragment.
    pub fn tables(&self) -> BTreeSet<TableHandle> {
        self.entries
            .values()
            .flatten()
            .flat_map(|m| m.tables.iter().copied())
            .collect()
    }

    pub fn sum(terms: impl IntoIterator<Item = Fragment>) -> Fragment {
        let mut entries: BTreeMap<Vec<BasisLoop>, Vec<Monomial>> = BTreeMap::new();
        for term in terms {
            for (loops, monomials) in term.entries {
                entries.entry(loops).or_default().extend(monomials);
            }
        }
        // Fold literals without basis functions into a single constant
        if let Some(monomials) = entries.get_mut(&Vec::new()) {
            let (literals, mut rest): (Vec<_>, Vec<_>) = monomials.drain(..).partition(Monomial::is_literal);
            if !literals.is_empty() {
                let value: f64 = literals.iter().map(|m| m.coefficient).sum();
                if value != 0.0 {
                    rest.insert(0, Monomial::literal(value));
                }
            }
            *monomials = rest;
        }
        entries.retain(|_, monomials| !monomials.is_empty());
        Fragment { entries }
    }

    pub fn product<F: Format + ?Sized>(factors: Vec<Fragment>, format: &F, node: &dyn Display) -> Result<Fragment> {
        let mut factors = factors.into_iter();
        let mut result = factors.next().unwrap_or_else(|| Fragment::literal(1.0));
        for factor in factors {
            result = result.times(&factor, format, node)?;
        }
        Ok(result)
    }

    fn times<F: Format + ?Sized>(&self, other: &Fragment, format: &F, node: &dyn Display) -> Result<Fragment> {
        let eps = format.epsilon();
        let mut entries: BTreeMap<Vec<BasisLoop>, Vec<Monomial>> = BTreeMap::new();
        for ((a_loops, a), (b_loops, b)) in self.entries.iter().cartesian_product(&other.entries) {
            if let Some(shared) = a_loops
                .iter()
                .find(|x| b_loops.iter().any(|y| x.argument == y.argument))
            {
                return Err(LoweringError::structural(
                    node,
                    format!("argument {} appears more than once in a product", shared.argument),
                ));
            }
            let mut loops: Vec<BasisLoop> = a_loops.iter().chain(b_loops).copied().collect();
            loops.sort_unstable();
            let monomials = a
                .iter()
                .cartesian_product(b)
                .map(|(x, y)| x.times(y, format))
                .filter(|m| m.coefficient.abs() > eps);
            entries.entry(loops).or_default().extend(monomials);
        }
        entries.retain(|_, monomials| !monomials.is_empty());
        Ok(Fragment { entries })
    }

    fn require_basis_free(&self, node: &dyn Display, operation: &str) -> Result<()> {
        if self.is_basis_free() {
            Ok(())
        } else {
            Err(LoweringError::structural(
                node,
                format!("{operation} of an expression containing basis functions"),
            ))
        }
    }

    fn basis_free_code<F: Format + ?Sized>(&self, format: &F) -> String {
        inner_product(self.monomials(&[]).unwrap_or(&[]), format)
    }

    pub fn divide<F: Format + ?Sized>(self, denominator: Fragment, format: &F, node: &dyn Display) -> Result<Fragment> {
        denominator.require_basis_free(node, "division")?;
        if denominator.is_zero() {
            return Err(LoweringError::structural(node, "division by zero"));
        }
        if let Some(value) = denominator.literal_value() {
            return Ok(self.scale(1.0 / value));
        }

        let denominator_code = denominator.basis_free_code(format);
        let denominator_tables = denominator.tables();
        let mut result = self;
        for monomial in result.entries.values_mut().flatten() {
            let numerator = match monomial.code.take() {
                Some(code) => code,
                None => {
                    let value = format.float(monomial.coefficient);
                    monomial.coefficient = 1.0;
                    value
                }
            };
            monomial.code = Some(format.divide(&numerator, &denominator_code));
            monomial.tables.extend(denominator_tables.iter().copied());
        }
        Ok(result)
    }

    pub fn power<F: Format + ?Sized>(self, exponent: Fragment, format: &F, node: &dyn Display) -> Result<Fragment> {
        self.require_basis_free(node, "power")?;
        exponent.require_basis_free(node, "power")?;
        match (self.literal_value(), exponent.literal_value()) {
            (Some(base), Some(exponent)) => finite_literal(base.powf(exponent), node, "power"),
            (_, Some(exponent)) if exponent == 0.0 => Ok(Fragment::literal(1.0)),
            (Some(base), None) if base == 0.0 => Ok(Fragment::zero()),
            _ => {
                let mut tables = self.tables();
                tables.extend(exponent.tables());
                let code = format.power(&self.basis_free_code(format), &exponent.basis_free_code(format));
                Ok(Fragment::from_code(code, tables))
            }
        }
    }

    /// Absolute value, applied per loop nest.
    ///
    /// The code of an entry collapses into a single monomial, so an entry with basis functions
    /// must consist of one monomial for its signature to remain meaningful.
    pub fn abs<F: Format + ?Sized>(self, format: &F, node: &dyn Display) -> Result<Fragment> {
        if let Some(value) = self.literal_value() {
            return Ok(Fragment::literal(value.abs()));
        }
        if let Some((loops, monomials)) = self
            .entries
            .iter()
            .find(|(loops, monomials)| !loops.is_empty() && monomials.len() > 1)
        {
            return Err(LoweringError::structural(
                node,
                format!(
                    "absolute value of a sum of {} terms over basis function loops {:?}",
                    monomials.len(),
                    loops.iter().map(|l| l.argument).collect::<Vec<_>>()
                ),
            ));
        }
        let entries = self
            .entries
            .into_iter()
            .map(|(loops, monomials)| {
                let code = format.absolute(&inner_product(&monomials, format));
                let factors = monomials
                    .first()
                    .map(|m| m.factors.clone())
                    .unwrap_or_default();
                let tables = monomials
                    .iter()
                    .flat_map(|m| m.tables.iter().copied())
                    .collect();
                let monomial = Monomial {
                    coefficient: 1.0,
                    code: Some(code),
                    factors,
                    tables,
                };
                (loops, vec![monomial])
            })
            .collect();
        Ok(Fragment { entries })
    }

    pub fn apply<F: Format + ?Sized>(self, function: &MathFunction, format: &F, node: &dyn Display) -> Result<Fragment> {
        self.require_basis_free(node, function.name())?;
        if let Some(value) = self.literal_value() {
            let value = function
                .evaluate(value)
                .ok_or_else(|| LoweringError::unsupported(node, format!("math function {}", function.name())))?;
            return finite_literal(value, node, function.name());
        }
        let code = format.math_function(function, &self.basis_free_code(format));
        Ok(Fragment::from_code(code, self.tables()))
    }

    /// Multiplies every coefficient by `factor`.
    pub fn scale(mut self, factor: f64) -> Fragment {
        for monomial in self.entries.values_mut().flatten() {
            monomial.coefficient *= factor;
        }
        self
    }
}

/// Wraps a folded literal, rejecting NaN and infinities.
fn finite_literal(value: f64, node: &dyn Display, operation: &str) -> Result<Fragment> {
    if value.is_finite() {
        Ok(Fragment::literal(value))
    } else {
        Err(LoweringError::structural(
            node,
            format!("{operation} of literal operands evaluates to {value}"),
        ))
    }
}
