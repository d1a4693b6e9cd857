//! Bookkeeping of precomputed basis tables ("psi tables").
//!
//! A table holds the values of one basis component (or one of its reference derivatives) for
//! every degree of freedom of an element at every point of a quadrature point set. Tables are
//! deduplicated by value, so terminals of different elements with identical basis values share
//! a single generated table.
use log::debug;
use nalgebra::DMatrix;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(usize);

impl TableHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identifies the basis values requested by a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub element: String,
    pub num_points: usize,
    /// [`PointSet::fingerprint`](crate::quadrature::PointSet::fingerprint) of the points.
    pub points: u64,
    pub facet: Option<usize>,
    /// Reference value component, for elements with more than one value component.
    pub component: Option<usize>,
    /// Number of derivatives in each reference direction.
    pub derivatives: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// All entries vanish.
    Zeros,
    /// All entries are one.
    Ones,
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PsiTable {
    name: String,
    values: DMatrix<f64>,
    kind: TableKind,
}

impl PsiTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table values with one row per quadrature point and one column per degree of freedom.
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }
}

#[derive(Debug, Clone, Default)]
pub struct PsiTableManager {
    tables: Vec<PsiTable>,
    handles: FxHashMap<TableKey, TableHandle>,
    element_numbers: FxHashMap<String, usize>,
    used: BTreeSet<TableHandle>,
}

impl PsiTableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn lookup(&self, key: &TableKey) -> Option<TableHandle> {
        self.handles.get(key).copied()
    }

    /// Registers the values requested by `key`.
    ///
    /// If a table whose values coincide with `values` within `tolerance` already exists, the key is
    /// mapped to that table instead of creating a new one.
    pub fn register(&mut self, key: TableKey, values: DMatrix<f64>, tolerance: f64) -> TableHandle {
        if let Some(handle) = self.lookup(&key) {
            return handle;
        }

        let existing = self.tables.iter().position(|table| {
            table.values.shape() == values.shape()
                && table
                    .values
                    .iter()
                    .zip(values.iter())
                    .all(|(a, b)| (a - b).abs() <= tolerance)
        });
        if let Some(index) = existing {
            debug!("Reusing table {} for {:?}", self.tables[index].name, key);
            self.handles.insert(key, TableHandle(index));
            return TableHandle(index);
        }

        let name = self.table_name(&key);
        let kind = if values.iter().all(|v| v.abs() <= tolerance) {
            TableKind::Zeros
        } else if values.iter().all(|v| (v - 1.0).abs() <= tolerance) {
            TableKind::Ones
        } else {
            TableKind::General
        };
        debug!("Registered table {name} ({kind:?}) for {key:?}");

        let handle = TableHandle(self.tables.len());
        self.tables.push(PsiTable { name, values, kind });
        self.handles.insert(key, handle);
        handle
    }

    fn table_name(&mut self, key: &TableKey) -> String {
        let next_number = self.element_numbers.len();
        let number = *self
            .element_numbers
            .entry(key.element.clone())
            .or_insert(next_number);

        let mut name = format!("FE{number}");
        if let Some(facet) = key.facet {
            name.push_str(&format!("_f{facet}"));
        }
        if let Some(component) = key.component {
            name.push_str(&format!("_C{component}"));
        }
        if key.derivatives.iter().any(|&count| count > 0) {
            name.push_str("_D");
            for count in &key.derivatives {
                name.push_str(&count.to_string());
            }
        }
        // The same element may be tabulated at several point sets during a session
        let taken = |name: &str| self.tables.iter().any(|table| table.name == name);
        if taken(&name) {
            name.push_str(&format!("_Q{}", key.num_points));
        }
        let base = name.clone();
        let mut suffix = 1;
        while taken(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        name
    }

    /// # Panics
    ///
    /// Panics if the handle was not created by this manager.
    pub fn table(&self, handle: TableHandle) -> &PsiTable {
        &self.tables[handle.0]
    }

    pub fn mark_used(&mut self, handle: TableHandle) {
        self.used.insert(handle);
    }

    pub fn is_used(&self, handle: TableHandle) -> bool {
        self.used.contains(&handle)
    }

    /// Tables referenced by completed lowering passes or by function definitions, in order of
    /// registration.
    pub fn used_tables(&self) -> impl Iterator<Item = &PsiTable> {
        self.used.iter().map(|handle| &self.tables[handle.0])
    }

    pub fn clear_used(&mut self) {
        self.used.clear();
    }

    /// Forgets all tables.
    pub fn clear(&mut self) {
        debug!("Clearing {} tables", self.tables.len());
        self.tables.clear();
        self.handles.clear();
        self.element_numbers.clear();
        self.used.clear();
    }
}
