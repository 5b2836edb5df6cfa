//! A model consists of a series of coupled components which are solved together.
//!
//! The model orchestrates the passing of values between different components.
//! Each component is solved for a given period in an order determined by the
//! bindings between them.
//! Once every component has been solved, the clock moves on to the next period.
//! Values from earlier periods are preserved as they are useful as output or in the case
//! where a component reads values with a lag.
//!
//! Every parameter must be bound before a model can be built: to another component's
//! variable, to an external value, or to a default.
//! If a parameter is left unbound, the build step will fail.

mod builder;
mod runtime;
mod simulation;
pub(crate) mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use builder::ModelBuilder;
pub use runtime::{Model, RunContext, RunState};
pub use simulation::Simulation;
pub use types::{Binding, BindingSource, CGraph, ParameterValue, C};
