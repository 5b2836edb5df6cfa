//! Type definitions for the model module.

use crate::component::Component;
use crate::timestep::{FloatValue, TimeGrid, Timestep};
use ndarray::{Array1, ArrayD};
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Type alias for a component wrapped in an Arc for shared ownership.
pub type C = Arc<dyn Component>;

/// Type alias for the component dependency graph.
///
/// Nodes are component names, edges are the zero-offset bindings between them.
pub type CGraph = Graph<String, Binding>;

/// Where a bound parameter reads its values from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingSource {
    /// An output variable of another (or the same) component
    Variable { component: String, variable: String },
    /// A value supplied to the builder with `set_external`
    External(String),
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSource::Variable {
                component,
                variable,
            } => write!(f, "{component}.{variable}"),
            BindingSource::External(name) => write!(f, "external:{name}"),
        }
    }
}

/// Connection from a source to a component's input parameter.
///
/// A non-zero `offset` makes the consumer read the source `offset` periods
/// later (positive) or earlier (negative) than its own current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub source: BindingSource,
    pub component: String,
    pub parameter: String,
    pub offset: i64,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            0 => write!(f, "{} -> {}.{}", self.source, self.component, self.parameter),
            offset => write!(
                f,
                "{} -> {}.{} (offset {})",
                self.source, self.component, self.parameter, offset
            ),
        }
    }
}

/// A value supplied from outside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Broadcast to every cell of the target
    Scalar(FloatValue),
    /// Must match the target's shape exactly, with the model grid along the time axis
    Array(ArrayD<FloatValue>),
}

impl From<FloatValue> for ParameterValue {
    fn from(value: FloatValue) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<FloatValue>> for ParameterValue {
    fn from(value: Vec<FloatValue>) -> Self {
        ParameterValue::Array(Array1::from(value).into_dyn())
    }
}

impl From<ArrayD<FloatValue>> for ParameterValue {
    fn from(value: ArrayD<FloatValue>) -> Self {
        ParameterValue::Array(value)
    }
}

/// A parameter after its binding has been resolved at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BoundParameter {
    pub name: String,
    /// Storage slot the values are read from
    pub slot: usize,
    /// Periods of the source grid that precede the consumer's first period
    pub grid_offset: i64,
    /// Lead/lag of the binding
    pub offset: i64,
    pub source: BindingSource,
}

/// A component as it sits in a built model.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ComponentInstance {
    pub name: String,
    pub component: C,
    pub grid: Arc<TimeGrid>,
    /// Periods of the model grid that precede the component's first period
    pub grid_offset: usize,
    pub parameters: Vec<BoundParameter>,
    /// Variable name and storage slot
    pub variables: Vec<(String, usize)>,
}

impl ComponentInstance {
    /// This component's position at the model ordinal `model_t`, if it runs then.
    pub fn local_timestep(&self, model_t: usize) -> Option<Timestep> {
        let t = model_t.checked_sub(self.grid_offset)?;
        (t >= 1 && t <= self.grid.period_count())
            .then(|| Timestep::new_unchecked(self.grid.clone(), t))
    }

    pub fn parameter(&self, name: &str) -> Option<&BoundParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn variable_slot(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .find(|(variable, _)| variable == name)
            .map(|(_, slot)| *slot)
    }
}

/// A component registered with a builder.
#[derive(Debug, Clone)]
pub(crate) struct ComponentDefinition {
    pub name: String,
    pub component: C,
    /// Defaults to the model grid
    pub grid: Option<TimeGrid>,
}
