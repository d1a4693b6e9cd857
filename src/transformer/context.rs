use crate::expr::{IndexId, NodeId, Restriction};

/// Identifies the code produced by a terminal node under a given context.
///
/// The node id is part of the key, never the node content: two distinct nodes are cached
/// separately even if they are structurally equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub node: NodeId,
    pub component: Vec<usize>,
    pub derivatives: Vec<usize>,
    pub restriction: Option<Restriction>,
}

/// The scoped state of one lowering pass.
///
/// Every push performed while visiting a node is undone before the visit returns, so between
/// top-level passes the context is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    derivatives: Vec<usize>,
    components: Vec<Vec<usize>>,
    restriction: Option<Restriction>,
    bindings: Vec<(IndexId, usize)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active derivative directions, outermost first.
    pub fn derivatives(&self) -> &[usize] {
        &self.derivatives
    }

    /// The innermost active component tuple (empty if there is none).
    pub fn component(&self) -> &[usize] {
        self.components.last().map_or(&[], Vec::as_slice)
    }

    pub fn component_depth(&self) -> usize {
        self.components.len()
    }

    pub fn restriction(&self) -> Option<Restriction> {
        self.restriction
    }

    pub fn num_bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Current value of a free index. Later bindings shadow earlier ones.
    pub fn value_of(&self, index: IndexId) -> Option<usize> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == index)
            .map(|&(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.derivatives.is_empty() && self.components.is_empty() && self.bindings.is_empty() && self.restriction.is_none()
    }

    pub fn cache_key(&self, node: NodeId) -> CacheKey {
        CacheKey {
            node,
            component: self.component().to_vec(),
            derivatives: self.derivatives.clone(),
            restriction: self.restriction,
        }
    }

    pub(crate) fn push_derivative(&mut self, direction: usize) {
        self.derivatives.push(direction);
    }

    pub(crate) fn pop_derivative(&mut self) {
        self.derivatives.pop();
    }

    pub(crate) fn push_component(&mut self, component: Vec<usize>) {
        self.components.push(component);
    }

    pub(crate) fn pop_component(&mut self) {
        self.components.pop();
    }

    pub(crate) fn set_restriction(&mut self, restriction: Option<Restriction>) {
        self.restriction = restriction;
    }

    pub(crate) fn bind(&mut self, index: IndexId, value: usize) {
        self.bindings.push((index, value));
    }

    pub(crate) fn unbind(&mut self) {
        self.bindings.pop();
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
