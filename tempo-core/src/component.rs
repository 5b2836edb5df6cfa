use crate::errors::TempoResult;
pub use crate::state::ComponentState;
use crate::timestep::{FloatValue, Timestep};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A single axis of a parameter or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// One entry per period of the owning component's time grid
    Time,
    /// A fixed number of entries, e.g. regions or boxes
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementType {
    /// Read-only input, bound to another component's variable or to an external value
    Parameter,
    /// Output written by the component that declares it
    Variable,
}

/// Declaration of a single parameter or variable of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementDefinition {
    pub name: String,
    pub unit: String,
    pub requirement_type: RequirementType,
    /// Axes in storage order. Empty for a plain scalar.
    pub dimensions: Vec<Dimension>,
    /// Value used for an unbound parameter, broadcast to every cell
    pub default: Option<FloatValue>,
}

impl RequirementDefinition {
    pub fn new(
        name: &str,
        unit: &str,
        requirement_type: RequirementType,
        dimensions: Vec<Dimension>,
    ) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            requirement_type,
            dimensions,
            default: None,
        }
    }

    pub fn scalar_parameter(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Parameter, vec![])
    }

    pub fn timeseries_parameter(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Parameter, vec![Dimension::Time])
    }

    pub fn scalar_variable(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Variable, vec![])
    }

    pub fn timeseries_variable(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Variable, vec![Dimension::Time])
    }

    /// Attach a default value, used when a parameter is left unbound.
    pub fn with_default(mut self, value: FloatValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_parameter(&self) -> bool {
        self.requirement_type == RequirementType::Parameter
    }

    pub fn has_time(&self) -> bool {
        self.dimensions.contains(&Dimension::Time)
    }

    /// 0-based position of the time axis, if there is one
    pub fn time_axis(&self) -> Option<usize> {
        self.dimensions.iter().position(|d| *d == Dimension::Time)
    }

    /// Lengths of the non-time axes, in order
    pub fn fixed_dims(&self) -> Vec<usize> {
        self.dimensions
            .iter()
            .filter_map(|d| match d {
                Dimension::Fixed(n) => Some(*n),
                Dimension::Time => None,
            })
            .collect()
    }
}

/// Component of a model.
///
/// A component declares the parameters it reads and the variables it writes
/// through [`Component::definitions`].
/// When a model is run, the clock hands every component a [`Timestep`] on the
/// component's own time grid, once per period, in dependency order.
/// All reads and writes go through the supplied [`ComponentState`].
///
/// Components are serialised as trait objects via `typetag`, so every implementation
/// needs `#[typetag::serde]` on its `impl Component` block.
#[typetag::serde(tag = "type")]
pub trait Component: Debug + Send + Sync {
    fn definitions(&self) -> Vec<RequirementDefinition>;

    fn parameters(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.requirement_type == RequirementType::Parameter)
            .collect()
    }

    fn variables(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.requirement_type == RequirementType::Variable)
            .collect()
    }

    /// Called once at the start of every run, before the first period is solved.
    ///
    /// Static variables are typically written here.
    fn init(&self, _state: &ComponentState) -> TempoResult<()> {
        Ok(())
    }

    /// Solve the component for a single period.
    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_helpers() {
        let definition = RequirementDefinition::new(
            "regional_temperature",
            "K",
            RequirementType::Variable,
            vec![Dimension::Fixed(4), Dimension::Time],
        );
        assert!(definition.has_time());
        assert_eq!(definition.time_axis(), Some(1));
        assert_eq!(definition.fixed_dims(), vec![4]);
        assert!(!definition.is_parameter());

        let scalar = RequirementDefinition::scalar_parameter("tau", "yr").with_default(30.0);
        assert!(!scalar.has_time());
        assert_eq!(scalar.time_axis(), None);
        assert_eq!(scalar.default, Some(30.0));
    }
}
