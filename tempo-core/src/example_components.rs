#![allow(dead_code)]

use crate::array::{AxisIndex, TimeAddress};
use crate::component::{
    Component, ComponentState, Dimension, RequirementDefinition, RequirementType,
};
use crate::errors::{TempoError, TempoResult};
use crate::timestep::{FloatValue, Period, Timestep};
use serde::{Deserialize, Serialize};

/// Writes twice the ordinal of the current period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OrdinalDoubler {}

#[typetag::serde]
impl Component for OrdinalDoubler {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![RequirementDefinition::timeseries_variable("out", "")]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        state.set_current("out", t, t.t() as FloatValue * 2.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AddOneParameters {
    /// Value used when the input has not been written yet
    pub fallback: Option<FloatValue>,
}

/// Adds one to its input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AddOne {
    pub parameters: AddOneParameters,
}

impl AddOne {
    pub fn new() -> Self {
        Self::from_parameters(AddOneParameters { fallback: None })
    }

    pub fn from_parameters(parameters: AddOneParameters) -> Self {
        Self { parameters }
    }
}

#[typetag::serde]
impl Component for AddOne {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::timeseries_parameter("input", ""),
            RequirementDefinition::timeseries_variable("output", ""),
        ]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let input = match self.parameters.fallback {
            Some(fallback) if !state.has_value("input", t.into(), &[]) => fallback,
            _ => state.get_current("input", t)?,
        };
        state.set_current("output", t, input + 1.0)
    }
}

/// Adds a flow to a stock carried over from the previous period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Accumulator {}

#[typetag::serde]
impl Component for Accumulator {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::timeseries_parameter("flow", ""),
            RequirementDefinition::scalar_parameter("initial", "").with_default(0.0),
            RequirementDefinition::scalar_variable("start", ""),
            RequirementDefinition::timeseries_variable("stock", ""),
        ]
    }

    fn init(&self, state: &ComponentState) -> TempoResult<()> {
        state.set_value("start", &[], state.scalar("initial")?)
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let previous = if t.is_first() {
            state.scalar("start")?
        } else {
            state.get("stock", TimeAddress::Index(t.t() - 1), &[])?
        };
        state.set_current("stock", t, previous + state.get_current("flow", t)?)
    }
}

/// Writes the period label, then fails once it reaches `fail_at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Failing {
    pub fail_at: Period,
}

#[typetag::serde]
impl Component for Failing {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![RequirementDefinition::timeseries_variable("out", "")]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        if t.period() == self.fail_at {
            return Err(TempoError::Component(format!(
                "refusing to solve {}",
                t.period()
            )));
        }
        state.set_current("out", t, t.period() as FloatValue)
    }
}

/// Writes `(region + 1) * scale * t` for each region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Regional {
    pub regions: usize,
}

#[typetag::serde]
impl Component for Regional {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::scalar_parameter("scale", ""),
            RequirementDefinition::new(
                "values",
                "",
                RequirementType::Variable,
                vec![Dimension::Fixed(self.regions), Dimension::Time],
            ),
        ]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let scale = state.scalar("scale")?;
        for region in 0..self.regions {
            let value = (region + 1) as FloatValue * scale * t.t() as FloatValue;
            state.set("values", t.into(), &[region], value)?;
        }
        Ok(())
    }
}

/// Sums a regional input over every region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegionalSum {
    pub regions: usize,
}

#[typetag::serde]
impl Component for RegionalSum {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::new(
                "values",
                "",
                RequirementType::Parameter,
                vec![Dimension::Fixed(self.regions), Dimension::Time],
            ),
            RequirementDefinition::timeseries_variable("total", ""),
        ]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let values = state.select("values", t.into(), &[AxisIndex::All])?;
        state.set_current("total", t, values.sum())
    }
}
