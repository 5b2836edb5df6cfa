use crate::errors::TempoResult;

use super::builder::ModelBuilder;
use super::runtime::{Model, RunContext};

/// A model definition together with a lazily built instance.
///
/// The instance is built on first use and reused for later runs.
/// Any change made through [`Simulation::builder_mut`] drops the instance,
/// so the next run builds a fresh one.
#[derive(Debug)]
pub struct Simulation {
    builder: ModelBuilder,
    instance: Option<Model>,
}

impl Simulation {
    pub fn new(builder: ModelBuilder) -> Self {
        Self {
            builder,
            instance: None,
        }
    }

    pub fn builder(&self) -> &ModelBuilder {
        &self.builder
    }

    /// Edit the definition, discarding any built instance.
    pub fn builder_mut(&mut self) -> &mut ModelBuilder {
        self.instance = None;
        &mut self.builder
    }

    pub fn is_built(&self) -> bool {
        self.instance.is_some()
    }

    /// Build a fresh instance, replacing any existing one.
    pub fn build(&mut self) -> TempoResult<&mut Model> {
        let model = self.builder.build()?;
        Ok(self.instance.insert(model))
    }

    fn instance(&mut self) -> TempoResult<&mut Model> {
        let model = match self.instance.take() {
            Some(model) => model,
            None => self.builder.build()?,
        };
        Ok(self.instance.insert(model))
    }

    /// Run the model, building it first if needed.
    pub fn run(&mut self) -> TempoResult<&Model> {
        let model = self.instance()?;
        model.run()?;
        Ok(model)
    }

    pub fn run_with(&mut self, context: &RunContext) -> TempoResult<&Model> {
        let model = self.instance()?;
        model.run_with(context)?;
        Ok(model)
    }

    /// The built instance, if there is one.
    pub fn model(&self) -> Option<&Model> {
        self.instance.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.instance.as_mut()
    }
}

impl From<ModelBuilder> for Simulation {
    fn from(builder: ModelBuilder) -> Self {
        Self::new(builder)
    }
}
