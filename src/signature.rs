//! Signatures of product terms.
//!
//! A signature identifies the reference data needed to integrate a product of basis functions.
//! Two terms with equal signatures need numerically identical reference tensors, so the
//! tensor can be computed once and shared.
//!
//! The grammar of a signature is
//!
//! ```text
//! <coefficient>*<factor>*...*<factor>*<integral>
//! <factor> = {<element>;<index>;[<component>, ...];[<derivative>, ...];<restriction>}
//! ```
//!
//! where the factors are sorted lexicographically. There is no escaping, which is why element
//! names must not contain `;`, `*`, `{` or `}`.
use crate::expr::Restriction;
use crate::util::format_scientific;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// An index appearing in a basis factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermIndex {
    Fixed(usize),
    /// An index of the element tensor, i.e. a basis function loop.
    Primary { id: usize, range: usize },
    /// An internal summation index. Its numbering is not significant.
    Secondary { id: usize, range: usize },
}

impl Display for TermIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => write!(f, "{value}"),
            Self::Primary { id, range } => write!(f, "i{id}, {range}"),
            Self::Secondary { id, range } => write!(f, "a{id}, {range}"),
        }
    }
}

fn write_index(out: &mut String, index: &TermIndex, soft: bool) {
    match index {
        TermIndex::Secondary { range, .. } if soft => out.push_str(&format!("a, {range}")),
        index => out.push_str(&index.to_string()),
    }
}

/// One basis function appearing in a product term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisFactor {
    pub element: String,
    pub index: TermIndex,
    pub components: Vec<TermIndex>,
    pub derivatives: Vec<TermIndex>,
    pub restriction: Option<Restriction>,
}

impl BasisFactor {
    fn record(&self, soft: bool) -> String {
        let mut record = String::from("{");
        record.push_str(&self.element);
        record.push(';');
        write_index(&mut record, &self.index, soft);
        for (i, list) in [&self.components, &self.derivatives].into_iter().enumerate() {
            record.push_str(if i == 0 { ";[" } else { "];[" });
            for (j, index) in list.iter().enumerate() {
                if j > 0 {
                    record.push_str(", ");
                }
                write_index(&mut record, index, soft);
            }
        }
        record.push_str("];");
        record.push_str(self.restriction.map_or("None", |r| r.symbol()));
        record.push('}');
        record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegralType {
    Cell,
    ExteriorFacet,
    InteriorFacet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegralDescriptor {
    pub integral_type: IntegralType,
    pub subdomain: usize,
}

impl IntegralDescriptor {
    pub fn cell(subdomain: usize) -> Self {
        Self {
            integral_type: IntegralType::Cell,
            subdomain,
        }
    }

    pub fn exterior_facet(subdomain: usize) -> Self {
        Self {
            integral_type: IntegralType::ExteriorFacet,
            subdomain,
        }
    }

    pub fn interior_facet(subdomain: usize) -> Self {
        Self {
            integral_type: IntegralType::InteriorFacet,
            subdomain,
        }
    }
}

impl Display for IntegralDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let measure = match self.integral_type {
            IntegralType::Cell => "dx",
            IntegralType::ExteriorFacet => "ds",
            IntegralType::InteriorFacet => "dS",
        };
        write!(f, "{measure}{}", self.subdomain)
    }
}

/// A product of basis functions with a numeric coefficient, integrated over some domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTerm {
    pub coefficient: f64,
    pub factors: Vec<BasisFactor>,
    pub integral: IntegralDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureComputer {
    precision: usize,
}

impl Default for SignatureComputer {
    fn default() -> Self {
        Self { precision: 15 }
    }
}

impl SignatureComputer {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// The unique signature of a term. Independent of the order of the factors.
    pub fn hard_signature(&self, term: &ProductTerm) -> String {
        self.signature(term, false)
    }

    /// The signature of a term modulo the numbering of its secondary indices.
    pub fn soft_signature(&self, term: &ProductTerm) -> String {
        self.signature(term, true)
    }

    fn signature(&self, term: &ProductTerm, soft: bool) -> String {
        let mut records: Vec<String> = term
            .factors
            .iter()
            .map(|factor| factor.record(soft))
            .collect();
        records.sort_unstable();

        let mut parts = Vec::with_capacity(records.len() + 2);
        parts.push(format_scientific(term.coefficient, self.precision));
        parts.extend(records);
        parts.push(term.integral.to_string());
        parts.join("*")
    }
}

/// Groups terms by soft signature, so that all terms of a group share one reference tensor.
#[derive(Debug, Clone, Default)]
pub struct TermGroups {
    groups: FxHashMap<String, usize>,
    signatures: Vec<String>,
}

impl TermGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the group of the given soft signature, creating a new group if necessary.
    ///
    /// Groups are numbered in the order their first term is inserted.
    pub fn insert(&mut self, soft_signature: &str) -> usize {
        if let Some(&group) = self.groups.get(soft_signature) {
            return group;
        }
        let group = self.signatures.len();
        self.groups.insert(soft_signature.to_string(), group);
        self.signatures.push(soft_signature.to_string());
        group
    }

    pub fn group_of(&self, soft_signature: &str) -> Option<usize> {
        self.groups.get(soft_signature).copied()
    }

    /// The soft signature shared by the terms of a group.
    pub fn soft_signature(&self, group: usize) -> Option<&str> {
        self.signatures.get(group).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.signatures.clear();
    }
}
