use crate::element::{ElementDescriptor, Mapping};
use crate::error::{LoweringError, Result};
use crate::util::cartesian_power;
use std::fmt::Display;
use std::sync::Arc;

/// The scalar (or Piola-mapped) sub-component addressed by a terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTerminal {
    /// Flat value component within the whole element.
    pub component: usize,
    /// Flat value component within `element`.
    pub local_component: usize,
    /// Distance between the whole-element component and the local component.
    pub local_offset: usize,
    /// The simple element representing the addressed component.
    pub element: Arc<ElementDescriptor>,
    /// Offset of the degrees of freedom of `element` within the whole element.
    pub dof_offset: usize,
    /// Whether `element` is a point evaluation (quadrature) element.
    pub point_evaluation: bool,
    pub mapping: Mapping,
    /// Reference direction tuples to sum over, one entry per active derivative.
    pub multi_indices: Vec<Vec<usize>>,
}

/// Resolves terminals against the active component and derivative context.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryResolver {
    geometric_dimension: Option<usize>,
    resolve_count: usize,
}

impl AuxiliaryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The geometric dimension shared by all terminals resolved so far.
    pub fn geometric_dimension(&self) -> Option<usize> {
        self.geometric_dimension
    }

    /// Number of calls to [`resolve`](Self::resolve) so far.
    pub fn resolve_count(&self) -> usize {
        self.resolve_count
    }

    /// Forgets the geometric dimension.
    pub fn reset(&mut self) {
        self.geometric_dimension = None;
    }

    pub fn resolve(
        &mut self,
        node: &dyn Display,
        element: &Arc<ElementDescriptor>,
        components: &[usize],
        derivatives: &[usize],
    ) -> Result<ResolvedTerminal> {
        self.resolve_count += 1;

        let invalid_component = || {
            LoweringError::structural(
                node,
                format!(
                    "component {components:?} is not a value component of element {} with value shape {:?}",
                    element.name(),
                    element.value_shape()
                ),
            )
        };
        let (local_tuple, local_element) = element
            .extract_component(components)
            .ok_or_else(invalid_component)?;

        let point_evaluation = local_element.family().is_point_evaluation();
        if point_evaluation && !derivatives.is_empty() {
            return Err(LoweringError::structural(
                node,
                format!("derivatives of point evaluation element {} are not defined", local_element.name()),
            ));
        }

        let local_component = local_element
            .flatten_component(&local_tuple)
            .ok_or_else(invalid_component)?;
        let component = element
            .flatten_component(components)
            .ok_or_else(invalid_component)?;
        let local_offset = component - local_component;
        let (sub_element, dof_offset) = element
            .component_element(component)
            .ok_or_else(invalid_component)?;

        let geometric_dimension = element.geometric_dimension();
        match self.geometric_dimension {
            Some(dim) if dim != geometric_dimension => {
                return Err(LoweringError::structural(
                    node,
                    format!(
                        "all terminals must have the same geometric dimension, \
                         but element {} has dimension {geometric_dimension} instead of {dim}",
                        element.name()
                    ),
                ));
            }
            Some(_) => {}
            None => self.geometric_dimension = Some(geometric_dimension),
        }

        if let Some(&direction) = derivatives
            .iter()
            .find(|&&direction| direction >= geometric_dimension)
        {
            return Err(LoweringError::structural(
                node,
                format!("derivative direction {direction} exceeds the geometric dimension {geometric_dimension}"),
            ));
        }

        Ok(ResolvedTerminal {
            component,
            local_component,
            local_offset,
            mapping: sub_element.mapping(),
            element: sub_element,
            dof_offset,
            point_evaluation,
            multi_indices: cartesian_power(geometric_dimension, derivatives.len()),
        })
    }
}
