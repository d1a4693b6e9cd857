use crate::element::{ElementDescriptor, Mapping, Tabulator};
use crate::error::{LoweringError, Result};
use crate::expr::{Argument, Coefficient, Restriction};
use crate::format::Format;
use crate::options::TransformerOptions;
use crate::quadrature::PointSet;
use crate::signature::{BasisFactor, TermIndex};
use crate::tables::{PsiTableManager, TableHandle, TableKey, TableKind};
use crate::transformer::context::CacheKey;
use crate::transformer::fragment::{BasisLoop, Fragment, Monomial};
use crate::transformer::resolve::{AuxiliaryResolver, ResolvedTerminal};
use crate::util::direction_counts;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

/// A coefficient evaluated at the current quadrature point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub slot: usize,
    pub name: String,
    /// Expression computing the value from the degrees of freedom of the coefficient.
    pub code: String,
}

/// One term of the reference expansion of a terminal.
struct BasisTerm {
    /// Geometry factors multiplying the table entry.
    factors: Vec<String>,
    /// Geometry symbols referenced by `factors`.
    symbols: Vec<String>,
    /// `None` if the table entry is identically one and omitted.
    table: Option<TableHandle>,
}

/// Produces the code of basis function and coefficient terminals.
pub(crate) struct TerminalBuilder<F> {
    pub(crate) format: F,
    pub(crate) options: TransformerOptions,
    pub(crate) tabulator: Box<dyn Tabulator>,
    pub(crate) resolver: AuxiliaryResolver,
    pub(crate) tables: PsiTableManager,
    pub(crate) functions: Vec<FunctionDefinition>,
    function_slots: FxHashMap<String, usize>,
    pub(crate) function_count: usize,
    pub(crate) points: Option<PointSet>,
    pub(crate) facets: (Option<usize>, Option<usize>),
    pub(crate) geometry: BTreeSet<String>,
    next_secondary: usize,
}

impl<F: Format> TerminalBuilder<F> {
    pub(crate) fn new(format: F, tabulator: Box<dyn Tabulator>) -> Self {
        Self {
            format,
            options: TransformerOptions::default(),
            tabulator,
            resolver: AuxiliaryResolver::new(),
            tables: PsiTableManager::new(),
            functions: Vec::new(),
            function_slots: FxHashMap::default(),
            function_count: 0,
            points: None,
            facets: (None, None),
            geometry: BTreeSet::new(),
            next_secondary: 0,
        }
    }

    /// Restarts the numbering of secondary (derivative) indices. Only valid once no cached
    /// fragment refers to the old numbering.
    pub(crate) fn reset_secondary_indices(&mut self) {
        self.next_secondary = 0;
    }

    /// Forgets all function definitions, and optionally restarts their numbering.
    pub(crate) fn clear_functions(&mut self, reset_count: bool) {
        self.functions.clear();
        self.function_slots.clear();
        if reset_count {
            self.function_count = 0;
        }
    }

    pub(crate) fn basis_function(&mut self, node: &dyn Display, argument: &Argument, key: &CacheKey) -> Result<Fragment> {
        let resolved = self
            .resolver
            .resolve(node, &argument.element, &key.component, &key.derivatives)?;
        let terms = self.reference_terms(node, &resolved, &key.derivatives, key.restriction)?;
        if terms.is_empty() {
            return Ok(Fragment::zero());
        }

        let dof = self.format.dof_index(argument.number);
        let codes: Vec<Option<String>> = terms
            .iter()
            .map(|term| self.term_code(term, &dof))
            .collect();
        let code = match codes.as_slice() {
            [single] => single.clone(),
            codes => {
                let codes: Vec<String> = codes
                    .iter()
                    .map(|code| code.clone().unwrap_or_else(|| self.format.float(1.0)))
                    .collect();
                Some(self.format.add(&codes))
            }
        };
        self.record_symbols(&terms);

        let range = resolved.element.space_dimension();
        let reference_dim = resolved.element.cell().topological_dimension();
        let factor = BasisFactor {
            element: argument.element.name().to_string(),
            index: TermIndex::Primary {
                id: argument.number,
                range,
            },
            components: key.component.iter().map(|&c| TermIndex::Fixed(c)).collect(),
            derivatives: key
                .derivatives
                .iter()
                .map(|_| self.secondary_index(reference_dim))
                .collect(),
            restriction: key.restriction,
        };
        let monomial = Monomial {
            coefficient: 1.0,
            code,
            factors: vec![factor],
            tables: terms.iter().filter_map(|term| term.table).collect(),
        };
        let basis_loop = BasisLoop {
            argument: argument.number,
            range,
            offset: dof_offset(&resolved, &argument.element, key.restriction),
        };
        Ok(Fragment::from_monomial(vec![basis_loop], monomial))
    }

    pub(crate) fn function(&mut self, node: &dyn Display, coefficient: &Coefficient, key: &CacheKey) -> Result<Fragment> {
        let resolved = self
            .resolver
            .resolve(node, &coefficient.element, &key.component, &key.derivatives)?;
        let terms = self.reference_terms(node, &resolved, &key.derivatives, key.restriction)?;
        if terms.is_empty() {
            return Ok(Fragment::zero());
        }
        self.record_symbols(&terms);

        let offset = dof_offset(&resolved, &coefficient.element, key.restriction);
        let mut products = Vec::new();
        for r in 0..resolved.element.space_dimension() {
            let value = self.format.coefficient_entry(coefficient.count, offset + r);
            for term in &terms {
                let product = match self.term_code(term, &r.to_string()) {
                    Some(code) => self.format.multiply(&[code, value.clone()]),
                    None => value.clone(),
                };
                products.push(product);
            }
        }
        let definition = self.format.add(&products);
        let slot = self.function_slot(definition);
        let tables: BTreeSet<TableHandle> = terms.iter().filter_map(|term| term.table).collect();
        // The definition is emitted even if every use of the coefficient is elided later
        for &handle in &tables {
            self.tables.mark_used(handle);
        }
        Ok(Fragment::from_code(self.format.function_name(slot), tables))
    }

    fn function_slot(&mut self, code: String) -> usize {
        if let Some(&slot) = self.function_slots.get(&code) {
            return slot;
        }
        let slot = self.function_count;
        self.function_count += 1;
        let name = self.format.function_name(slot);
        debug!("New function {name} = {code}");
        self.function_slots.insert(code.clone(), slot);
        self.functions.push(FunctionDefinition { slot, name, code });
        slot
    }

    fn secondary_index(&mut self, range: usize) -> TermIndex {
        let id = self.next_secondary;
        self.next_secondary += 1;
        TermIndex::Secondary { id, range }
    }

    fn record_symbols(&mut self, terms: &[BasisTerm]) {
        for term in terms {
            self.geometry.extend(term.symbols.iter().cloned());
        }
    }

    fn term_code(&self, term: &BasisTerm, dof: &str) -> Option<String> {
        let mut factors = term.factors.clone();
        if let Some(handle) = term.table {
            let name = self.tables.table(handle).name();
            factors.push(
                self.format
                    .table_entry(name, &self.format.point_index(), dof),
            );
        }
        match factors.len() {
            0 => None,
            1 => factors.pop(),
            _ => Some(self.format.multiply(&factors)),
        }
    }

    /// Expands a terminal into a sum of geometry factors times reference table entries.
    ///
    /// Physical derivatives expand into sums over reference derivatives weighted by entries of
    /// the inverse Jacobian, and Piola mapped elements expand into sums over reference components.
    fn reference_terms(
        &mut self,
        node: &dyn Display,
        resolved: &ResolvedTerminal,
        derivatives: &[usize],
        restriction: Option<Restriction>,
    ) -> Result<Vec<BasisTerm>> {
        let element = Arc::clone(&resolved.element);
        let tdim = element.cell().topological_dimension();
        let physical = resolved.local_component;
        let format = &self.format;

        // (table component, factors, symbols)
        let reference_components: Vec<(usize, Vec<String>, Vec<String>)> = match resolved.mapping {
            Mapping::Affine => vec![(physical, Vec::new(), Vec::new())],
            Mapping::ContravariantPiola => {
                let det = format.jacobian_determinant(restriction);
                let inverse_det = format.divide(&format.float(1.0), &det);
                (0..element.value_size())
                    .map(|c| {
                        let j = format.jacobian(physical, c, restriction);
                        (c, vec![inverse_det.clone(), j.clone()], vec![det.clone(), j])
                    })
                    .collect()
            }
            Mapping::CovariantPiola => (0..element.value_size())
                .map(|c| {
                    let k = format.inverse_jacobian(c, physical, restriction);
                    (c, vec![k.clone()], vec![k])
                })
                .collect(),
        };

        let mut terms = Vec::new();
        for (component, factors, symbols) in reference_components {
            for multi_index in &resolved.multi_indices {
                // Reference directions beyond the cell dimension do not exist
                if multi_index.iter().any(|&r| r >= tdim) {
                    continue;
                }
                let mut factors = factors.clone();
                let mut symbols = symbols.clone();
                for (&r, &d) in multi_index.iter().zip(derivatives) {
                    let k = self.format.inverse_jacobian(r, d, restriction);
                    factors.push(k.clone());
                    symbols.push(k);
                }

                let counts = direction_counts(multi_index, tdim);
                let handle = self.table(node, &element, component, counts, restriction)?;
                let table = match self.tables.table(handle).kind() {
                    TableKind::Zeros if self.options.eliminate_zeros => continue,
                    TableKind::Ones if self.options.ignore_ones => None,
                    _ => Some(handle),
                };
                terms.push(BasisTerm {
                    factors,
                    symbols,
                    table,
                });
            }
        }
        Ok(terms)
    }

    fn table(
        &mut self,
        node: &dyn Display,
        element: &ElementDescriptor,
        component: usize,
        derivatives: Vec<usize>,
        restriction: Option<Restriction>,
    ) -> Result<TableHandle> {
        let points = self
            .points
            .as_ref()
            .ok_or_else(|| LoweringError::structural(node, "no quadrature points have been set"))?;
        let facet = match restriction {
            Some(Restriction::Negative) => self.facets.1,
            _ => self.facets.0,
        };
        let key = TableKey {
            element: element.name().to_string(),
            num_points: points.num_points(),
            points: points.fingerprint(),
            facet,
            component: (element.value_size() > 1).then_some(component),
            derivatives,
        };
        if let Some(handle) = self.tables.lookup(&key) {
            return Ok(handle);
        }

        let evaluation_points = match facet {
            Some(facet) => points.on_facet(element.cell(), facet).ok_or_else(|| {
                LoweringError::structural(
                    node,
                    format!(
                        "quadrature points of dimension {} cannot be mapped to facet {facet} of a {:?}",
                        points.dim(),
                        element.cell()
                    ),
                )
            })?,
            None => points.points().clone(),
        };
        let values = self
            .tabulator
            .tabulate(element, component, &key.derivatives, &evaluation_points)
            .map_err(|report| LoweringError::tabulation(element.name(), &report))?;
        let tolerance = self
            .options
            .table_tolerance
            .unwrap_or_else(|| self.format.epsilon());
        Ok(self.tables.register(key, values, tolerance))
    }
}

/// Degree of freedom offset of the addressed sub-element. The degrees of freedom of the
/// negative side of an interior facet follow those of the positive side.
fn dof_offset(resolved: &ResolvedTerminal, element: &ElementDescriptor, restriction: Option<Restriction>) -> usize {
    match restriction {
        Some(Restriction::Negative) => resolved.dof_offset + element.space_dimension(),
        _ => resolved.dof_offset,
    }
}
