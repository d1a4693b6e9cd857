//! Expression trees for weak-form integrands.
//!
//! Expressions are stored in an [`ExpressionArena`] and referred to by [`NodeId`]. Nodes are
//! immutable once added, every node owns an ordered list of operand ids, and the tree is acyclic
//! because operands must exist before the node referring to them. Node identity is the id,
//! never the content: two structurally equal nodes with different ids are distinct nodes.
use crate::element::ElementDescriptor;
use itertools::Itertools;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identity of a free (summation) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub usize);

/// An entry of a multi-index: either a fixed value or a free index bound by an enclosing
/// index sum or component tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Fixed(usize),
    Free(IndexId),
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Self::Fixed(value)
    }
}

impl From<IndexId> for Index {
    fn from(index: IndexId) -> Self {
        Self::Free(index)
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => write!(f, "{value}"),
            Self::Free(IndexId(id)) => write!(f, "i_{id}"),
        }
    }
}

/// Side of a facet on which a quantity is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Restriction {
    Positive,
    Negative,
}

impl Restriction {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Positive => "+",
            Self::Negative => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MathFunction {
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    /// Any other named function, e.g. `tanh` or `erf`. These can be represented, but not lowered.
    Other(String),
}

impl MathFunction {
    pub fn name(&self) -> &str {
        match self {
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Other(name) => name,
        }
    }

    pub fn evaluate(&self, x: f64) -> Option<f64> {
        match self {
            Self::Sqrt => Some(x.sqrt()),
            Self::Exp => Some(x.exp()),
            Self::Ln => Some(x.ln()),
            Self::Sin => Some(x.sin()),
            Self::Cos => Some(x.cos()),
            Self::Other(_) => None,
        }
    }
}

/// A test or trial basis function. `number` is the argument position (0 for the test function).
#[derive(Debug, Clone)]
pub struct Argument {
    pub element: Arc<ElementDescriptor>,
    pub number: usize,
}

/// A coefficient field interpolated from degrees of freedom stored in `w[count]`.
#[derive(Debug, Clone)]
pub struct Coefficient {
    pub element: Arc<ElementDescriptor>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Sum,
    Product,
    Division,
    Power,
    Abs,
    MathFunction(MathFunction),
    BasisFunction(Argument),
    Function(Coefficient),
    /// A literal scalar value.
    ScalarConstant(f64),
    /// A scalar constant supplied at runtime through `w[count]`.
    Constant { count: usize },
    VectorConstant { count: usize, dim: usize },
    TensorConstant { count: usize, shape: Vec<usize> },
    Identity { dim: usize },
    /// Operands: expression, multi-index holding a single direction.
    SpatialDerivative,
    /// Operands: expression, multi-index.
    Indexed,
    MultiIndex(Vec<Index>),
    /// Operands: summand, multi-index holding the bound index.
    IndexSum { dimension: usize },
    PositiveRestricted,
    NegativeRestricted,
    /// Operands: expression, multi-index naming the free indices that become components.
    ComponentTensor,
    ListTensor,
    Variable { label: usize },

    // Kinds below may appear in a tree, but have no lowering.
    Conditional,
    Condition(String),
    FreeIndex(IndexId),
    Restricted(String),
    CompoundTensorOperator(String),
    Derivative(String),
    AlgebraOperator(String),
    Zero,
    SpatialCoordinate,
    FacetNormal,
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    operands: Vec<NodeId>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn operands(&self) -> &[NodeId] {
        &self.operands
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpressionArena {
    nodes: Vec<Node>,
    num_indices: usize,
}

impl ExpressionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node with the given operands.
    ///
    /// # Panics
    ///
    /// Panics if an operand does not belong to this arena.
    pub fn add(&mut self, kind: NodeKind, operands: Vec<NodeId>) -> NodeId {
        for operand in &operands {
            assert!(
                operand.0 < self.nodes.len(),
                "Operand {} does not refer to an existing node",
                operand.0
            );
        }
        self.nodes.push(Node { kind, operands });
        NodeId(self.nodes.len() - 1)
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not created by this arena.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn operands(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).operands
    }

    /// Allocates a new free index.
    pub fn index(&mut self) -> IndexId {
        self.num_indices += 1;
        IndexId(self.num_indices - 1)
    }

    pub fn display(&self, id: NodeId) -> NodeDisplay<'_> {
        NodeDisplay { arena: self, id }
    }

    pub fn multi_index(&mut self, indices: &[Index]) -> NodeId {
        self.add(NodeKind::MultiIndex(indices.to_vec()), Vec::new())
    }

    pub fn sum(&mut self, terms: &[NodeId]) -> NodeId {
        self.add(NodeKind::Sum, terms.to_vec())
    }

    pub fn product(&mut self, factors: &[NodeId]) -> NodeId {
        self.add(NodeKind::Product, factors.to_vec())
    }

    pub fn division(&mut self, numerator: NodeId, denominator: NodeId) -> NodeId {
        self.add(NodeKind::Division, vec![numerator, denominator])
    }

    pub fn power(&mut self, base: NodeId, exponent: NodeId) -> NodeId {
        self.add(NodeKind::Power, vec![base, exponent])
    }

    pub fn abs(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::Abs, vec![operand])
    }

    pub fn math(&mut self, function: MathFunction, operand: NodeId) -> NodeId {
        self.add(NodeKind::MathFunction(function), vec![operand])
    }

    pub fn basis_function(&mut self, element: &Arc<ElementDescriptor>, number: usize) -> NodeId {
        let argument = Argument {
            element: Arc::clone(element),
            number,
        };
        self.add(NodeKind::BasisFunction(argument), Vec::new())
    }

    pub fn function(&mut self, element: &Arc<ElementDescriptor>, count: usize) -> NodeId {
        let coefficient = Coefficient {
            element: Arc::clone(element),
            count,
        };
        self.add(NodeKind::Function(coefficient), Vec::new())
    }

    pub fn scalar(&mut self, value: f64) -> NodeId {
        self.add(NodeKind::ScalarConstant(value), Vec::new())
    }

    pub fn constant(&mut self, count: usize) -> NodeId {
        self.add(NodeKind::Constant { count }, Vec::new())
    }

    pub fn vector_constant(&mut self, count: usize, dim: usize) -> NodeId {
        self.add(NodeKind::VectorConstant { count, dim }, Vec::new())
    }

    pub fn tensor_constant(&mut self, count: usize, shape: &[usize]) -> NodeId {
        let shape = shape.to_vec();
        self.add(NodeKind::TensorConstant { count, shape }, Vec::new())
    }

    pub fn identity(&mut self, dim: usize) -> NodeId {
        self.add(NodeKind::Identity { dim }, Vec::new())
    }

    pub fn indexed(&mut self, expression: NodeId, indices: &[Index]) -> NodeId {
        let multi_index = self.multi_index(indices);
        self.add(NodeKind::Indexed, vec![expression, multi_index])
    }

    pub fn spatial_derivative(&mut self, expression: NodeId, direction: impl Into<Index>) -> NodeId {
        let multi_index = self.multi_index(&[direction.into()]);
        self.add(NodeKind::SpatialDerivative, vec![expression, multi_index])
    }

    pub fn index_sum(&mut self, summand: NodeId, index: IndexId, dimension: usize) -> NodeId {
        let multi_index = self.multi_index(&[Index::Free(index)]);
        self.add(NodeKind::IndexSum { dimension }, vec![summand, multi_index])
    }

    pub fn positive_restricted(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::PositiveRestricted, vec![operand])
    }

    pub fn negative_restricted(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::NegativeRestricted, vec![operand])
    }

    pub fn component_tensor(&mut self, expression: NodeId, indices: &[IndexId]) -> NodeId {
        let indices: Vec<Index> = indices.iter().copied().map(Index::Free).collect();
        let multi_index = self.multi_index(&indices);
        self.add(NodeKind::ComponentTensor, vec![expression, multi_index])
    }

    pub fn list_tensor(&mut self, items: &[NodeId]) -> NodeId {
        self.add(NodeKind::ListTensor, items.to_vec())
    }

    pub fn variable(&mut self, expression: NodeId, label: usize) -> NodeId {
        self.add(NodeKind::Variable { label }, vec![expression])
    }
}

/// Human-readable rendering of a subtree, used in diagnostics.
pub struct NodeDisplay<'a> {
    arena: &'a ExpressionArena,
    id: NodeId,
}

impl Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let arena = self.arena;
        let node = arena.node(self.id);
        let operand = |i: usize| -> String {
            node.operands
                .get(i)
                .map(|&id| arena.display(id).to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        let all_operands = || {
            node.operands
                .iter()
                .map(|&id| arena.display(id))
                .join(", ")
        };
        let infix = |separator: &str| {
            node.operands
                .iter()
                .map(|&id| arena.display(id))
                .join(separator)
        };

        match &node.kind {
            NodeKind::Sum => write!(f, "({})", infix(" + ")),
            NodeKind::Product => write!(f, "({})", infix(" * ")),
            NodeKind::Division => write!(f, "({})", infix(" / ")),
            NodeKind::Power => write!(f, "({})", infix(" ** ")),
            NodeKind::Abs => write!(f, "|{}|", operand(0)),
            NodeKind::MathFunction(function) => write!(f, "{}({})", function.name(), all_operands()),
            NodeKind::BasisFunction(argument) => write!(f, "v_{}", argument.number),
            NodeKind::Function(coefficient) => write!(f, "w_{}", coefficient.count),
            NodeKind::ScalarConstant(value) => write!(f, "{value}"),
            NodeKind::Constant { count } => write!(f, "c_{count}"),
            NodeKind::VectorConstant { count, .. } => write!(f, "cv_{count}"),
            NodeKind::TensorConstant { count, .. } => write!(f, "ct_{count}"),
            NodeKind::Identity { .. } => write!(f, "I"),
            NodeKind::SpatialDerivative => write!(f, "{}.dx{}", operand(0), operand(1)),
            NodeKind::Indexed => write!(f, "{}[{}]", operand(0), operand(1).trim_matches(|c| c == '(' || c == ')')),
            NodeKind::MultiIndex(indices) => write!(f, "({})", indices.iter().join(", ")),
            NodeKind::IndexSum { dimension } => write!(f, "sum_{{{} < {}}} {}", operand(1), dimension, operand(0)),
            NodeKind::PositiveRestricted => write!(f, "({})('+')", operand(0)),
            NodeKind::NegativeRestricted => write!(f, "({})('-')", operand(0)),
            NodeKind::ComponentTensor => write!(f, "as_tensor({}, {})", operand(0), operand(1)),
            NodeKind::ListTensor => write!(f, "[{}]", all_operands()),
            NodeKind::Variable { label } => write!(f, "var{label}({})", operand(0)),
            NodeKind::Conditional => write!(f, "Conditional({})", all_operands()),
            NodeKind::Condition(operator) => write!(f, "({})", infix(&format!(" {operator} "))),
            NodeKind::FreeIndex(index) => write!(f, "{}", Index::Free(*index)),
            NodeKind::Restricted(name) => write!(f, "{name}({})", all_operands()),
            NodeKind::CompoundTensorOperator(name) => write!(f, "{name}({})", all_operands()),
            NodeKind::Derivative(name) => write!(f, "{name}({})", all_operands()),
            NodeKind::AlgebraOperator(name) => write!(f, "{name}({})", all_operands()),
            NodeKind::Zero => write!(f, "0"),
            NodeKind::SpatialCoordinate => write!(f, "x"),
            NodeKind::FacetNormal => write!(f, "n"),
        }
    }
}
