use crate::transformer::context::CacheKey;
use crate::transformer::fragment::Fragment;
use log::trace;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    BasisFunction,
    Function,
}

/// Fragments of terminal nodes, keyed by node and context.
///
/// Basis functions and coefficient functions are cached in separate tables.
#[derive(Debug, Clone, Default)]
pub struct MemoizationCache {
    basis_functions: FxHashMap<CacheKey, Fragment>,
    functions: FxHashMap<CacheKey, Fragment>,
    hits: usize,
    misses: usize,
}

impl MemoizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: TerminalKind) -> &FxHashMap<CacheKey, Fragment> {
        match kind {
            TerminalKind::BasisFunction => &self.basis_functions,
            TerminalKind::Function => &self.functions,
        }
    }

    pub fn get(&self, kind: TerminalKind, key: &CacheKey) -> Option<&Fragment> {
        self.table(kind).get(key)
    }

    /// Returns the cached fragment for `key`, or computes, stores and returns it.
    ///
    /// Errors are not cached.
    pub fn get_or_compute<E>(
        &mut self,
        kind: TerminalKind,
        key: CacheKey,
        compute: impl FnOnce(&CacheKey) -> Result<Fragment, E>,
    ) -> Result<Fragment, E> {
        let table = match kind {
            TerminalKind::BasisFunction => &mut self.basis_functions,
            TerminalKind::Function => &mut self.functions,
        };
        if let Some(fragment) = table.get(&key) {
            trace!("Cache hit for {kind:?} {key:?}");
            self.hits += 1;
            return Ok(fragment.clone());
        }
        let fragment = compute(&key)?;
        self.misses += 1;
        table.insert(key, fragment.clone());
        Ok(fragment)
    }

    pub fn len(&self, kind: TerminalKind) -> usize {
        self.table(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis_functions.is_empty() && self.functions.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Empties both tables. The hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.basis_functions.clear();
        self.functions.clear();
    }
}
