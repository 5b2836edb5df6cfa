//! Radiative forcing from atmospheric CO2.

use serde::{Deserialize, Serialize};
use tempo_core::component::{Component, ComponentState, RequirementDefinition};
use tempo_core::errors::{TempoError, TempoResult};
use tempo_core::timestep::{FloatValue, Timestep};

const CONCENTRATION: &str = "concentration";
const ERF: &str = "erf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CO2ERFParameters {
    /// Forcing added by each doubling of the concentration, in W / m^2
    pub forcing_per_doubling: FloatValue,
    /// Concentration with zero forcing, in ppm
    pub reference_concentration: FloatValue,
}

impl Default for CO2ERFParameters {
    fn default() -> Self {
        Self {
            forcing_per_doubling: 3.7,
            reference_concentration: 278.0,
        }
    }
}

/// Effective radiative forcing that grows with the logarithm of the CO2 concentration.
///
/// `erf = forcing_per_doubling * log2(concentration / reference_concentration)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CO2ERF {
    parameters: CO2ERFParameters,
}

impl CO2ERF {
    pub fn from_parameters(parameters: CO2ERFParameters) -> Self {
        Self { parameters }
    }

    pub fn forcing_at(&self, concentration: FloatValue) -> FloatValue {
        self.parameters.forcing_per_doubling
            * (concentration / self.parameters.reference_concentration).log2()
    }
}

#[typetag::serde]
impl Component for CO2ERF {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::timeseries_parameter(CONCENTRATION, "ppm"),
            RequirementDefinition::timeseries_variable(ERF, "W / m^2"),
        ]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let concentration = state.get_current(CONCENTRATION, t)?;
        if concentration <= 0.0 {
            return Err(TempoError::Component(format!(
                "{}: CO2 concentration must be positive, got {} at {}",
                state.component(),
                concentration,
                t.period()
            )));
        }
        state.set_current(ERF, t, self.forcing_at(concentration))
    }
}
