//! Global-mean temperature response to forcing

use serde::{Deserialize, Serialize};
use tempo_core::component::{Component, ComponentState, RequirementDefinition};
use tempo_core::errors::{TempoError, TempoResult};
use tempo_core::timestep::{FloatValue, Timestep};

const FORCING: &str = "forcing";
const CLIMATE_SENSITIVITY: &str = "climate_sensitivity";
const RESPONSE_TIME: &str = "response_time";
const TEMPERATURE: &str = "temperature";

/// Temperature relaxing towards its equilibrium with the current forcing
///
/// $$ T_t = \lambda F_t + (T_{t-1} - \lambda F_t) \exp\left(-\frac{\Delta t}{\tau}\right) $$
///
/// where $\lambda$ is the climate sensitivity in K / (W / m^2) and $\tau$ the response
/// time in years. The anomaly is zero at the first period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearTemperature {}

impl LinearTemperature {
    pub fn new() -> Self {
        Self {}
    }

    pub fn relax(
        previous: FloatValue,
        equilibrium: FloatValue,
        dt: FloatValue,
        response_time: FloatValue,
    ) -> FloatValue {
        equilibrium + (previous - equilibrium) * (-dt / response_time).exp()
    }
}

#[typetag::serde]
impl Component for LinearTemperature {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::timeseries_parameter(FORCING, "W / m^2"),
            RequirementDefinition::scalar_parameter(CLIMATE_SENSITIVITY, "K / (W / m^2)")
                .with_default(0.8),
            RequirementDefinition::scalar_parameter(RESPONSE_TIME, "yr").with_default(4.0),
            RequirementDefinition::timeseries_variable(TEMPERATURE, "K"),
        ]
    }

    fn init(&self, state: &ComponentState) -> TempoResult<()> {
        let response_time = state.scalar(RESPONSE_TIME)?;
        if response_time <= 0.0 {
            return Err(TempoError::Component(format!(
                "{}: response time must be positive, got {}",
                state.component(),
                response_time
            )));
        }
        Ok(())
    }

    fn run_timestep(&self, state: &ComponentState, t: &Timestep) -> TempoResult<()> {
        if t.is_first() {
            return state.set_current(TEMPERATURE, t, 0.0);
        }

        let previous = t.previous()?;
        let equilibrium = state.scalar(CLIMATE_SENSITIVITY)? * state.get_current(FORCING, t)?;
        let temperature = Self::relax(
            state.get_current(TEMPERATURE, &previous)?,
            equilibrium,
            (t.period() - previous.period()) as FloatValue,
            state.scalar(RESPONSE_TIME)?,
        );
        state.set_current(TEMPERATURE, t, temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use std::sync::Arc;
    use tempo_core::model::{ModelBuilder, RunState};
    use tempo_core::timestep::TimeGrid;

    #[test]
    fn relaxes_towards_equilibrium() {
        assert_eq!(LinearTemperature::relax(1.0, 1.0, 1.0, 4.0), 1.0);
        let next = LinearTemperature::relax(0.0, 2.0, 4.0, 4.0);
        assert!(is_close!(next, 2.0 * (1.0 - (-1.0_f64).exp())));
    }

    #[test]
    fn constant_forcing() {
        let mut builder = ModelBuilder::new();
        builder
            .with_time_grid(TimeGrid::from_range(2000, 2200, 1).unwrap())
            .with_component("temperature", Arc::new(LinearTemperature::new()))
            .set_parameter("temperature", FORCING, 3.7);
        let mut model = builder.build().unwrap();
        model.run().unwrap();

        let temperature = model.series("temperature", TEMPERATURE).unwrap();
        assert_eq!(temperature[0], (2000, Some(0.0)));
        assert!(is_close!(temperature.last().unwrap().1.unwrap(), 0.8 * 3.7));
    }

    #[test]
    fn invalid_response_time() {
        let mut builder = ModelBuilder::new();
        builder
            .with_time_grid(TimeGrid::from_range(2000, 2010, 1).unwrap())
            .with_component("temperature", Arc::new(LinearTemperature::new()))
            .set_parameter("temperature", FORCING, 1.0)
            .set_parameter("temperature", RESPONSE_TIME, 0.0);
        let mut model = builder.build().unwrap();

        assert!(model.run().is_err());
        assert_eq!(model.state(), RunState::Failed(2000));
    }
}
