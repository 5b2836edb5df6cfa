mod carbon_cycle;
mod co2_erf;
mod temperature;

pub use carbon_cycle::{CarbonCycle, CarbonCycleParameters};
pub use co2_erf::{CO2ERFParameters, CO2ERF};
pub use temperature::LinearTemperature;
