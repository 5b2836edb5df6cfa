pub mod array;
pub mod clock;
pub mod component;
pub mod config;
#[cfg(test)]
mod example_components;
pub mod model;
pub mod state;
pub mod timestep;

pub mod errors;
