//! Lowering of integrand expressions to quadrature point code.
//!
//! [`QuadratureTransformer`] walks an expression tree with one handler per node kind. Structural
//! nodes (indexing, derivatives, restrictions, index sums) update the [`Context`] around the
//! recursive visit of their operands, while terminal nodes consult the [`MemoizationCache`]
//! and fall back to the [`AuxiliaryResolver`] and the table manager on a miss.
//!
//! A transformer is used in cycles. For every facet case and quadrature point set the caller
//! invokes [`update_facets`](QuadratureTransformer::update_facets) and
//! [`update_points`](QuadratureTransformer::update_points), lowers integrands and collects the
//! results, and calls [`reset`](QuadratureTransformer::reset) before the next independent
//! integrand.
use crate::element::{LagrangeTabulator, Tabulator};
use crate::error::{LoweringError, Result};
use crate::expr::{ExpressionArena, Index, MathFunction, NodeId, NodeKind, Restriction};
use crate::format::Format;
use crate::options::TransformerOptions;
use crate::quadrature::PointSet;
use crate::signature::{IntegralDescriptor, ProductTerm, SignatureComputer, TermGroups};
use crate::tables::PsiTableManager;
use log::{debug, trace};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

mod cache;
mod context;
mod fragment;
mod resolve;
mod terminal;

pub use cache::*;
pub use context::*;
pub use fragment::*;
pub use resolve::*;
pub use terminal::FunctionDefinition;

use terminal::TerminalBuilder;

/// One product term of a lowered integrand.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrandTerm {
    pub loops: Vec<BasisLoop>,
    pub coefficient: f64,
    /// Contribution of the term at the current quadrature point, including the weight.
    pub code: String,
    pub signature: String,
    pub soft_signature: String,
    /// Terms of the same group share their reference data.
    pub group: usize,
}

/// The summed contribution of all terms sharing a loop nest.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrandBlock {
    pub loops: Vec<BasisLoop>,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrandCode {
    pub weight: String,
    pub blocks: Vec<IntegrandBlock>,
    pub terms: Vec<IntegrandTerm>,
}

#[derive(Debug, Clone, Copy)]
enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

pub struct QuadratureTransformer<F> {
    context: Context,
    cache: MemoizationCache,
    terminals: TerminalBuilder<F>,
    signatures: SignatureComputer,
    term_groups: TermGroups,
    integral: IntegralDescriptor,
    used_weights: BTreeSet<usize>,
}

impl<F: Format> QuadratureTransformer<F> {
    /// Creates a transformer for integrals of the given kind, tabulating with [`LagrangeTabulator`].
    pub fn new(format: F, integral: IntegralDescriptor) -> Self {
        let options = TransformerOptions::default();
        Self {
            context: Context::new(),
            cache: MemoizationCache::new(),
            terminals: TerminalBuilder::new(format, Box::new(LagrangeTabulator)),
            signatures: SignatureComputer::new(options.signature_precision),
            term_groups: TermGroups::new(),
            integral,
            used_weights: BTreeSet::new(),
        }
    }

    pub fn with_tabulator(mut self, tabulator: impl Tabulator + 'static) -> Self {
        self.terminals.tabulator = Box::new(tabulator);
        self
    }

    pub fn with_options(mut self, options: TransformerOptions) -> Self {
        self.signatures = SignatureComputer::new(options.signature_precision);
        self.terminals.options = options;
        self
    }

    pub fn options(&self) -> &TransformerOptions {
        &self.terminals.options
    }

    pub fn format(&self) -> &F {
        &self.terminals.format
    }

    pub fn integral(&self) -> IntegralDescriptor {
        self.integral
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn cache(&self) -> &MemoizationCache {
        &self.cache
    }

    pub fn resolver(&self) -> &AuxiliaryResolver {
        &self.terminals.resolver
    }

    pub fn tables(&self) -> &PsiTableManager {
        &self.terminals.tables
    }

    pub fn signatures(&self) -> &SignatureComputer {
        &self.signatures
    }

    pub fn term_groups(&self) -> &TermGroups {
        &self.term_groups
    }

    /// Coefficient definitions of the current quadrature loop, ordered by slot.
    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.terminals.functions
    }

    /// Number of function slots handed out since the last facet update or reset.
    pub fn function_count(&self) -> usize {
        self.terminals.function_count
    }

    /// Geometry symbols (Jacobian entries and determinants) referenced so far.
    pub fn geometry_symbols(&self) -> impl Iterator<Item = &str> {
        self.terminals.geometry.iter().map(String::as_str)
    }

    /// Point counts of the quadrature weights referenced by lowered integrands.
    pub fn used_weights(&self) -> &BTreeSet<usize> {
        &self.used_weights
    }

    pub fn points(&self) -> Option<&PointSet> {
        self.terminals.points.as_ref()
    }

    pub fn facets(&self) -> (Option<usize>, Option<usize>) {
        self.terminals.facets
    }

    /// Starts a new facet case.
    ///
    /// Positive and unrestricted terminals are evaluated on `facet0`, negative terminals on
    /// `facet1`. Function definitions and their numbering start over.
    pub fn update_facets(&mut self, facet0: Option<usize>, facet1: Option<usize>) {
        debug!("Updating facets to ({facet0:?}, {facet1:?})");
        self.terminals.facets = (facet0, facet1);
        self.terminals.clear_functions(true);
        self.cache.clear();
    }

    /// Starts a new quadrature loop. Function definitions are forgotten, but their numbering
    /// continues.
    pub fn update_points(&mut self, points: PointSet) {
        debug!("Updating quadrature points ({} points)", points.num_points());
        self.terminals.points = Some(points);
        self.terminals.clear_functions(false);
        self.cache.clear();
    }

    /// Prepares the transformer for an independent integrand.
    ///
    /// Everything except the table deduplication memory is cleared. Fails if the context is not
    /// empty, which indicates an interrupted lowering pass. The transformer is reset regardless.
    pub fn reset(&mut self) -> Result<()> {
        debug!("Resetting transformer");
        let context_was_empty = self.context.is_empty();
        let stale = format!("{:?}", self.context);

        self.context.clear();
        self.cache.clear();
        self.terminals.clear_functions(true);
        self.terminals.resolver.reset();
        self.terminals.reset_secondary_indices();
        self.terminals.points = None;
        self.terminals.facets = (None, None);
        self.terminals.geometry.clear();
        self.terminals.tables.clear_used();
        self.term_groups.clear();
        self.used_weights.clear();

        if context_was_empty {
            Ok(())
        } else {
            Err(LoweringError::structural(
                "transformer",
                format!("context must be empty at reset, found {stale}"),
            ))
        }
    }

    /// Resets the transformer and forgets all tables.
    pub fn clear_session(&mut self) -> Result<()> {
        let result = self.reset();
        self.terminals.tables.clear();
        result
    }

    /// Lowers the expression rooted at `root`.
    pub fn lower(&mut self, arena: &ExpressionArena, root: NodeId) -> Result<Fragment> {
        let fragment = self.visit(arena, root)?;
        debug_assert!(self.context.is_empty(), "Context must be empty after a complete pass");
        Ok(fragment)
    }

    /// Lowers an integrand and collects its terms, signatures and referenced data.
    pub fn lower_integrand(&mut self, arena: &ExpressionArena, root: NodeId) -> Result<IntegrandCode> {
        let num_points = self
            .terminals
            .points
            .as_ref()
            .map(PointSet::num_points)
            .ok_or_else(|| LoweringError::structural(arena.display(root), "no quadrature points have been set"))?;
        if !self.context.is_empty() {
            return Err(LoweringError::structural(
                arena.display(root),
                "lowering started with a non-empty context",
            ));
        }

        let fragment = self.lower(arena, root)?;
        let format = &self.terminals.format;
        let weight = format.weight(num_points);
        if !fragment.is_zero() {
            self.used_weights.insert(num_points);
        }

        let mut blocks = Vec::new();
        let mut terms = Vec::new();
        for (loops, monomials) in fragment.entries() {
            let block = inner_product(monomials, format);
            blocks.push(IntegrandBlock {
                loops: loops.to_vec(),
                code: format.multiply(&[block, weight.clone()]),
            });

            for monomial in monomials {
                for &handle in &monomial.tables {
                    self.terminals.tables.mark_used(handle);
                }
                let term = ProductTerm {
                    coefficient: monomial.coefficient,
                    factors: monomial.factors.clone(),
                    integral: self.integral,
                };
                let signature = self.signatures.hard_signature(&term);
                let soft_signature = self.signatures.soft_signature(&term);
                let group = self.term_groups.insert(&soft_signature);
                let value = inner_product(std::slice::from_ref(monomial), format);
                terms.push(IntegrandTerm {
                    loops: loops.to_vec(),
                    coefficient: monomial.coefficient,
                    code: format.multiply(&[value, weight.clone()]),
                    signature,
                    soft_signature,
                    group,
                });
            }
        }
        debug!(
            "Lowered integrand into {} blocks and {} terms",
            blocks.len(),
            terms.len()
        );

        Ok(IntegrandCode { weight, blocks, terms })
    }

    /// Runs `body` between `enter` and `exit`, restoring the context on every exit path.
    fn scoped<T>(
        &mut self,
        enter: impl FnOnce(&mut Context),
        exit: impl FnOnce(&mut Context),
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        enter(&mut self.context);
        let result = body(self);
        exit(&mut self.context);
        result
    }

    fn operands<'a>(&self, arena: &'a ExpressionArena, id: NodeId, arity: Arity) -> Result<&'a [NodeId]> {
        let operands = arena.operands(id);
        let valid = match arity {
            Arity::Exactly(n) => operands.len() == n,
            Arity::AtLeast(n) => operands.len() >= n,
        };
        if valid {
            Ok(operands)
        } else {
            Err(LoweringError::arity(arena.display(id), arity, operands.len()))
        }
    }

    /// Evaluates a multi-index against the current bindings.
    fn multi_index(&self, arena: &ExpressionArena, id: NodeId) -> Result<Vec<usize>> {
        let NodeKind::MultiIndex(indices) = arena.kind(id) else {
            return Err(LoweringError::structural(arena.display(id), "expected a multi-index"));
        };
        indices
            .iter()
            .map(|index| match index {
                Index::Fixed(value) => Ok(*value),
                Index::Free(free) => self.context.value_of(*free).ok_or_else(|| {
                    LoweringError::structural(arena.display(id), format!("free index {index} is not bound"))
                }),
            })
            .collect()
    }

    fn visit(&mut self, arena: &ExpressionArena, id: NodeId) -> Result<Fragment> {
        trace!("Visiting {}", arena.display(id));
        let node = arena.display(id);
        let unsupported = |reason: &str| Err(LoweringError::unsupported(&node, reason));

        match arena.kind(id) {
            NodeKind::Sum => {
                let operands = self.operands(arena, id, Arity::AtLeast(2))?;
                let terms = self.visit_all(arena, operands)?;
                Ok(Fragment::sum(terms))
            }
            NodeKind::Product => {
                let operands = self.operands(arena, id, Arity::AtLeast(2))?;
                let factors = self.visit_all(arena, operands)?;
                Fragment::product(factors, self.format(), &node)
            }
            NodeKind::Division => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let numerator = self.visit(arena, operands[0])?;
                let denominator = self.visit(arena, operands[1])?;
                numerator.divide(denominator, self.format(), &node)
            }
            NodeKind::Power => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let base = self.visit(arena, operands[0])?;
                let exponent = self.visit(arena, operands[1])?;
                base.power(exponent, self.format(), &node)
            }
            NodeKind::Abs => {
                let operands = self.operands(arena, id, Arity::Exactly(1))?;
                let operand = self.visit(arena, operands[0])?;
                operand.abs(self.format(), &node)
            }
            NodeKind::MathFunction(function) => {
                if matches!(function, MathFunction::Other(_)) {
                    return unsupported("math function outside of sqrt, exp, ln, sin and cos");
                }
                let operands = self.operands(arena, id, Arity::Exactly(1))?;
                let operand = self.visit(arena, operands[0])?;
                operand.apply(function, self.format(), &node)
            }
            NodeKind::BasisFunction(argument) => {
                self.operands(arena, id, Arity::Exactly(0))?;
                let key = self.context.cache_key(id);
                let terminals = &mut self.terminals;
                self.cache
                    .get_or_compute(TerminalKind::BasisFunction, key, |key| {
                        terminals.basis_function(&node, argument, key)
                    })
            }
            NodeKind::Function(coefficient) => {
                self.operands(arena, id, Arity::Exactly(0))?;
                let key = self.context.cache_key(id);
                let terminals = &mut self.terminals;
                self.cache
                    .get_or_compute(TerminalKind::Function, key, |key| terminals.function(&node, coefficient, key))
            }
            NodeKind::ScalarConstant(value) => {
                self.operands(arena, id, Arity::Exactly(0))?;
                if value.abs() <= self.format().epsilon() {
                    Ok(Fragment::zero())
                } else {
                    Ok(Fragment::literal(*value))
                }
            }
            NodeKind::Constant { count } => {
                self.operands(arena, id, Arity::Exactly(0))?;
                if !self.context.component().is_empty() {
                    return Err(LoweringError::structural(
                        &node,
                        format!("scalar constant does not take components, got {:?}", self.context.component()),
                    ));
                }
                let component = match self.context.restriction() {
                    Some(Restriction::Negative) => 1,
                    _ => 0,
                };
                Ok(self.constant_entry(*count, component))
            }
            NodeKind::VectorConstant { count, dim } => {
                self.operands(arena, id, Arity::Exactly(0))?;
                let component = match self.context.component() {
                    &[c] if c < *dim => c,
                    other => {
                        return Err(LoweringError::structural(
                            &node,
                            format!("vector constant of dimension {dim} expects one component, got {other:?}"),
                        ))
                    }
                };
                let offset = match self.context.restriction() {
                    Some(Restriction::Negative) => *dim,
                    _ => 0,
                };
                Ok(self.constant_entry(*count, component + offset))
            }
            NodeKind::TensorConstant { count, shape } => {
                self.operands(arena, id, Arity::Exactly(0))?;
                let component = self.context.component();
                if component.len() != shape.len() || component.iter().zip(shape).any(|(c, n)| c >= n) {
                    return Err(LoweringError::structural(
                        &node,
                        format!("tensor constant of shape {shape:?} cannot be indexed by {component:?}"),
                    ));
                }
                let flat = component
                    .iter()
                    .zip(shape)
                    .fold(0, |flat, (c, n)| flat * n + c);
                let offset = match self.context.restriction() {
                    Some(Restriction::Negative) => shape.iter().product(),
                    _ => 0,
                };
                Ok(self.constant_entry(*count, flat + offset))
            }
            NodeKind::Identity { dim } => {
                self.operands(arena, id, Arity::Exactly(0))?;
                match self.context.component() {
                    &[i, j] if i < *dim && j < *dim => Ok(Fragment::literal(if i == j { 1.0 } else { 0.0 })),
                    other => Err(LoweringError::structural(
                        &node,
                        format!("identity of dimension {dim} expects two components, got {other:?}"),
                    )),
                }
            }
            NodeKind::SpatialDerivative => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let direction = match self.multi_index(arena, operands[1])?.as_slice() {
                    &[direction] => direction,
                    other => {
                        return Err(LoweringError::structural(
                            &node,
                            format!("a derivative needs exactly one direction, got {other:?}"),
                        ))
                    }
                };
                self.scoped(
                    |context| context.push_derivative(direction),
                    |context| context.pop_derivative(),
                    |transformer| transformer.visit(arena, operands[0]),
                )
            }
            NodeKind::Indexed => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let component = self.multi_index(arena, operands[1])?;
                self.scoped(
                    |context| context.push_component(component),
                    |context| context.pop_component(),
                    |transformer| transformer.visit(arena, operands[0]),
                )
            }
            NodeKind::MultiIndex(_) => unsupported("a multi-index is not an expression"),
            NodeKind::IndexSum { dimension } => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let index = match arena.kind(operands[1]) {
                    NodeKind::MultiIndex(indices) => match indices.as_slice() {
                        &[Index::Free(index)] => index,
                        _ => {
                            return Err(LoweringError::structural(
                                &node,
                                "an index sum must bind exactly one free index",
                            ))
                        }
                    },
                    _ => return Err(LoweringError::structural(&node, "expected a multi-index")),
                };
                let mut terms = Vec::with_capacity(*dimension);
                for value in 0..*dimension {
                    terms.push(self.scoped(
                        |context| context.bind(index, value),
                        |context| context.unbind(),
                        |transformer| transformer.visit(arena, operands[0]),
                    )?);
                }
                Ok(Fragment::sum(terms))
            }
            NodeKind::PositiveRestricted => self.visit_restricted(arena, id, Restriction::Positive),
            NodeKind::NegativeRestricted => self.visit_restricted(arena, id, Restriction::Negative),
            NodeKind::ComponentTensor => {
                let operands = self.operands(arena, id, Arity::Exactly(2))?;
                let indices = match arena.kind(operands[1]) {
                    NodeKind::MultiIndex(indices) => indices
                        .iter()
                        .map(|index| match index {
                            Index::Free(free) => Ok(*free),
                            Index::Fixed(_) => Err(LoweringError::structural(
                                &node,
                                "a component tensor can only be formed over free indices",
                            )),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => return Err(LoweringError::structural(&node, "expected a multi-index")),
                };
                let component = self.context.component().to_vec();
                if component.len() != indices.len() {
                    return Err(LoweringError::structural(
                        &node,
                        format!(
                            "{} components are active, but the component tensor has {} indices",
                            component.len(),
                            indices.len()
                        ),
                    ));
                }
                self.scoped(
                    |context| {
                        for (&index, &value) in indices.iter().zip(&component) {
                            context.bind(index, value);
                        }
                        context.push_component(Vec::new());
                    },
                    |context| {
                        context.pop_component();
                        for _ in 0..indices.len() {
                            context.unbind();
                        }
                    },
                    |transformer| transformer.visit(arena, operands[0]),
                )
            }
            NodeKind::ListTensor => {
                let operands = self.operands(arena, id, Arity::AtLeast(1))?;
                let component = self.context.component().to_vec();
                let (&head, tail) = component
                    .split_first()
                    .ok_or_else(|| LoweringError::structural(&node, "a list tensor must be indexed"))?;
                let &item = operands.get(head).ok_or_else(|| {
                    LoweringError::structural(
                        &node,
                        format!("component {head} is out of range for a list of {} items", operands.len()),
                    )
                })?;
                let tail = tail.to_vec();
                self.scoped(
                    |context| context.push_component(tail),
                    |context| context.pop_component(),
                    |transformer| transformer.visit(arena, item),
                )
            }
            NodeKind::Variable { .. } => {
                let operands = self.operands(arena, id, Arity::Exactly(1))?;
                self.visit(arena, operands[0])
            }
            NodeKind::Conditional => unsupported("conditionals are not supported"),
            NodeKind::Condition(_) => unsupported("conditions are not supported"),
            NodeKind::FreeIndex(_) => unsupported("free indices may only appear inside a multi-index"),
            NodeKind::Restricted(_) => unsupported("only positive and negative restrictions are supported"),
            NodeKind::CompoundTensorOperator(_) => {
                unsupported("compound tensor operators must be expanded before lowering")
            }
            NodeKind::Derivative(_) => unsupported("only spatial derivatives are supported"),
            NodeKind::AlgebraOperator(_) => unsupported("algebra operators must be specialized before lowering"),
            NodeKind::Zero => unsupported("zero must be eliminated before lowering"),
            NodeKind::SpatialCoordinate => unsupported("spatial coordinates are not supported"),
            NodeKind::FacetNormal => unsupported("facet normals are not supported"),
        }
    }

    fn visit_all(&mut self, arena: &ExpressionArena, operands: &[NodeId]) -> Result<Vec<Fragment>> {
        operands
            .iter()
            .map(|&operand| self.visit(arena, operand))
            .collect()
    }

    fn visit_restricted(&mut self, arena: &ExpressionArena, id: NodeId, side: Restriction) -> Result<Fragment> {
        let operands = self.operands(arena, id, Arity::Exactly(1))?;
        if let Some(current) = self.context.restriction() {
            return Err(LoweringError::structural(
                arena.display(id),
                format!("expression is restricted twice (already restricted to '{}')", current.symbol()),
            ));
        }
        self.scoped(
            |context| context.set_restriction(Some(side)),
            |context| context.set_restriction(None),
            |transformer| transformer.visit(arena, operands[0]),
        )
    }

    fn constant_entry(&self, count: usize, component: usize) -> Fragment {
        let code = self.format().coefficient_entry(count, component);
        Fragment::from_code(code, BTreeSet::new())
    }
}
