//! Compose components into models and solve them over a shared time grid.
//!
//! The engine lives in `tempo-core`; a few ready made components live in
//! `tempo-components`. Both are re-exported here.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tempo::components::{CO2ERFParameters, CarbonCycle, CO2ERF};
//! use tempo::model::ModelBuilder;
//! use tempo::timestep::TimeGrid;
//!
//! let mut builder = ModelBuilder::new();
//! builder
//!     .with_time_grid(TimeGrid::from_range(1850, 2100, 1)?)
//!     .with_component("carbon", Arc::new(CarbonCycle::new()))
//!     .with_component("erf", Arc::new(CO2ERF::from_parameters(CO2ERFParameters::default())))
//!     .set_parameter("carbon", "emissions", 10.0)
//!     .connect("carbon", "concentration", "erf", "concentration");
//!
//! let mut model = builder.build()?;
//! model.run()?;
//! let erf = model.series("erf", "erf")?;
//! # Ok::<(), tempo::errors::TempoError>(())
//! ```

pub use ndarray;
pub use tempo_components::{components, constants};
pub use tempo_core::{array, clock, component, config, errors, model, state, timestep};

use log::info;
use std::path::Path;
use tempo_core::config::ModelConfig;
use tempo_core::errors::TempoResult;
use tempo_core::model::ModelBuilder;

/// Read a configuration file and start a builder from it.
///
/// Returns the builder and the parsed configuration, whose
/// [`run_context`](ModelConfig::run_context) carries the stop period.
pub fn builder_from_file(path: &Path) -> TempoResult<(ModelBuilder, ModelConfig)> {
    let config = ModelConfig::from_toml_file(path)?;
    info!("Loaded model configuration from {}", path.display());
    Ok((ModelBuilder::from_config(&config)?, config))
}
