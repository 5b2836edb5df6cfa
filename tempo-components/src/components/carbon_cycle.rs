//! Carbon cycle component
//!
//! A simple one-box carbon cycle model that tracks atmospheric CO2 concentrations
//! and land uptake based on emissions and temperature.

use crate::constants::GTC_PER_PPM;
use serde::{Deserialize, Serialize};
use tempo_core::component::{Component, ComponentState, RequirementDefinition};
use tempo_core::errors::TempoResult;
use tempo_core::timestep::{FloatValue, Timestep};

const EMISSIONS: &str = "emissions";
const TEMPERATURE: &str = "temperature";
const TAU: &str = "tau";
const CONC_PI: &str = "conc_pi";
const ALPHA_TEMPERATURE: &str = "alpha_temperature";
const CONCENTRATION: &str = "concentration";
const CUMULATIVE_EMISSIONS: &str = "cumulative_emissions";
const CUMULATIVE_UPTAKE: &str = "cumulative_uptake";

/// Scalar parameters of the one-box carbon cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonCycleParameters {
    /// Timescale of the box's response
    /// unit: yr
    pub tau: FloatValue,
    /// Pre-industrial atmospheric CO2 concentration
    /// unit: ppm
    pub conc_pi: FloatValue,
    /// Sensitivity of lifetime to changes in global-mean temperature
    /// unit: 1 / K
    pub alpha_temperature: FloatValue,
}

impl Default for CarbonCycleParameters {
    fn default() -> Self {
        Self {
            tau: 30.0,
            conc_pi: 278.0,
            alpha_temperature: 0.0,
        }
    }
}

impl CarbonCycleParameters {
    fn from_state(state: &ComponentState) -> TempoResult<Self> {
        Ok(Self {
            tau: state.scalar(TAU)?,
            conc_pi: state.scalar(CONC_PI)?,
            alpha_temperature: state.scalar(ALPHA_TEMPERATURE)?,
        })
    }

    /// Land uptake for a concentration and temperature anomaly
    /// unit: ppm / yr
    pub fn uptake(&self, concentration: FloatValue, temperature: FloatValue) -> FloatValue {
        let lifetime = self.tau * (self.alpha_temperature * temperature).exp();
        (concentration - self.conc_pi) / lifetime
    }
}

/// One-box carbon cycle component
///
/// The concentration starts at its pre-industrial value and is stepped forward with
/// $$ C_t = C_{t-1} + \Delta t \left( \frac{E_{t-1}}{GTC\_PER\_PPM} - \frac{C_{t-1} - C_0}{\tau \exp(\alpha_T \cdot T)} \right) $$
///
/// Where:
/// - $C$ is atmospheric CO2 concentration (ppm)
/// - $E$ is emissions (GtC/yr)
/// - $C_0$ is pre-industrial concentration (ppm)
/// - $\tau$ is the baseline lifetime (yr)
/// - $\alpha_T$ is the temperature sensitivity (1/K)
/// - $T$ is the surface temperature anomaly (K)
///
/// Temperature is read at the current period. When it comes from a component that
/// depends on this one, bind it with a lag of one period.
/// The scalar parameters default to [`CarbonCycleParameters::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarbonCycle {}

impl CarbonCycle {
    pub fn new() -> Self {
        Self {}
    }
}

#[typetag::serde]
impl Component for CarbonCycle {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let defaults = CarbonCycleParameters::default();
        vec![
            RequirementDefinition::timeseries_parameter(EMISSIONS, "GtC / yr"),
            RequirementDefinition::timeseries_parameter(TEMPERATURE, "K").with_default(0.0),
            RequirementDefinition::scalar_parameter(TAU, "yr").with_default(defaults.tau),
            RequirementDefinition::scalar_parameter(CONC_PI, "ppm").with_default(defaults.conc_pi),
            RequirementDefinition::scalar_parameter(ALPHA_TEMPERATURE, "1 / K")
                .with_default(defaults.alpha_temperature),
            RequirementDefinition::timeseries_variable(CONCENTRATION, "ppm"),
            RequirementDefinition::timeseries_variable(CUMULATIVE_EMISSIONS, "GtC"),
            RequirementDefinition::timeseries_variable(CUMULATIVE_UPTAKE, "GtC"),
        ]
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        let parameters = CarbonCycleParameters::from_state(state)?;

        if t.is_first() {
            state.set_current(CONCENTRATION, t, parameters.conc_pi)?;
            state.set_current(CUMULATIVE_EMISSIONS, t, 0.0)?;
            return state.set_current(CUMULATIVE_UPTAKE, t, 0.0);
        }

        let previous = t.previous()?;
        let dt = (t.period() - previous.period()) as FloatValue;
        let concentration = state.get_current(CONCENTRATION, &previous)?;
        let emissions = state.get_current(EMISSIONS, &previous)?;
        let temperature = state.get_current(TEMPERATURE, t)?;

        let uptake = parameters.uptake(concentration, temperature);
        state.set_current(
            CONCENTRATION,
            t,
            concentration + dt * (emissions / GTC_PER_PPM - uptake),
        )?;
        state.set_current(
            CUMULATIVE_EMISSIONS,
            t,
            state.get_current(CUMULATIVE_EMISSIONS, &previous)? + dt * emissions,
        )?;
        state.set_current(
            CUMULATIVE_UPTAKE,
            t,
            state.get_current(CUMULATIVE_UPTAKE, &previous)? + dt * uptake * GTC_PER_PPM,
        )
    }
}
