//! Model struct and runtime execution.

use crate::array::Storage;
use crate::clock::Clock;
use crate::errors::{TempoError, TempoResult};
use crate::state::ComponentState;
use crate::timestep::{FloatValue, Period, TimeGrid};
use log::{error, info};
use petgraph::dot::{Config, Dot};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::{BindingSource, CGraph, ComponentInstance, ParameterValue};

/// Where a model is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
    /// A component failed while solving the given period
    Failed(Period),
}

/// Parameter overrides and a stop period for a single run.
///
/// Overrides only apply for the duration of [`Model::run_with`];
/// the previous values are restored afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    pub overrides: BTreeMap<String, ParameterValue>,
    pub stop_period: Option<Period>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override an external value, see [`Model::update_parameter`].
    pub fn with_override(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.overrides.insert(name.to_string(), value.into());
        self
    }

    pub fn with_stop_period(mut self, period: Period) -> Self {
        self.stop_period = Some(period);
        self
    }
}

/// A coupled set of components that are solved on a common time grid.
///
/// Components are solved once per period, in an order that ensures every component
/// that produces a value is solved before the components that read it in the same period.
/// Components may read values from earlier (or later) periods through offset bindings.
///
/// For example, a component calculating the Effective Radiative Forcing (ERF) of CO_2 may
/// read CO_2 concentrations and write CO_2 ERF.
/// The component is agnostic about where the concentrations come from.
/// If the concentrations are bound to an external value, they are supplied by the modeler.
/// If they are bound to a carbon cycle component, the ERF component is solved after the
/// carbon cycle in every period.
#[derive(Debug, Serialize, Deserialize)]
pub struct Model {
    /// A directed graph with components as nodes and zero-offset bindings as edges.
    graph: CGraph,
    /// Components in declaration order.
    components: Vec<ComponentInstance>,
    /// Indices into `components` in the order they are solved.
    order: Vec<usize>,
    /// One slot per variable and per external value.
    storage: Vec<RefCell<Storage>>,
    /// External value name to storage slot.
    externals: BTreeMap<String, usize>,
    time_grid: Arc<TimeGrid>,
    clock: Clock,
    state: RunState,
}

impl Model {
    pub(crate) fn new(
        graph: CGraph,
        components: Vec<ComponentInstance>,
        order: Vec<usize>,
        storage: Vec<Storage>,
        externals: BTreeMap<String, usize>,
        time_grid: Arc<TimeGrid>,
    ) -> Self {
        Self {
            graph,
            components,
            order,
            storage: storage.into_iter().map(RefCell::new).collect(),
            externals,
            clock: Clock::new(time_grid.clone()),
            time_grid,
            state: RunState::NotStarted,
        }
    }

    pub fn time_grid(&self) -> &Arc<TimeGrid> {
        &self.time_grid
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Gets the period the clock is at.
    pub fn current_period(&self) -> Period {
        self.clock.current_period()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns true if the model has solved every requested period.
    pub fn finished(&self) -> bool {
        self.state == RunState::Finished
    }

    fn instance(&self, component: &str) -> TempoResult<&ComponentInstance> {
        self.components
            .iter()
            .find(|c| c.name == component)
            .ok_or_else(|| TempoError::UnknownComponent(component.to_string()))
    }

    /// Ordinal of the last model period at or before `stop`.
    fn stop_ordinal(&self, stop: Option<Period>) -> TempoResult<usize> {
        let count = self.time_grid.period_count();
        match stop {
            None => Ok(count),
            Some(period) if period < self.time_grid.first_period() => Err(TempoError::NotFound {
                target: format!("model grid {}", self.time_grid),
                period,
            }),
            Some(period) => Ok((1..=count)
                .rev()
                .find(|&t| self.time_grid.label_unchecked(t) <= period)
                .unwrap_or(1)),
        }
    }

    /// Reset to the first period, clear every variable and initialise the components.
    fn start(&mut self) -> TempoResult<()> {
        self.clock.reset();
        for instance in &self.components {
            for (_, slot) in &instance.variables {
                self.storage[*slot].borrow_mut().clear();
            }
        }
        self.state = RunState::Running;
        info!("Starting run over {}", self.time_grid);

        let period = self.clock.current_period();
        for &i in &self.order {
            let instance = &self.components[i];
            let state = ComponentState::new(instance, &self.storage);
            if let Err(e) = instance.component.init(&state) {
                error!("{} failed to initialise: {}", instance.name, e);
                self.state = RunState::Failed(period);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Solve every component for the period the clock is at.
    fn solve_current(&mut self) -> TempoResult<()> {
        let model_t = self.clock.t();
        let period = self.clock.current_period();
        for &i in &self.order {
            let instance = &self.components[i];
            let Some(timestep) = instance.local_timestep(model_t) else {
                continue;
            };
            let state = ComponentState::new(instance, &self.storage);
            if let Err(e) = instance.component.run_timestep(&state, &timestep) {
                error!("{} failed at period {}: {}", instance.name, period, e);
                self.state = RunState::Failed(period);
                return Err(e);
            }
        }
        Ok(())
    }

    fn execute(&mut self, stop: Option<Period>) -> TempoResult<()> {
        let last = self.stop_ordinal(stop)?;
        self.start()?;
        loop {
            self.solve_current()?;
            if self.clock.t() >= last {
                break;
            }
            self.clock.advance()?;
        }
        self.state = RunState::Finished;
        info!("Finished run at {}", self.clock.current_period());
        Ok(())
    }

    /// Solve the model over its whole time grid.
    ///
    /// Every run starts from the first period with all variables unset;
    /// external values are kept.
    /// On failure the clock stays at the period that failed and the values written so
    /// far are kept.
    pub fn run(&mut self) -> TempoResult<()> {
        self.execute(None)
    }

    /// Solve the model from the first period up to and including `stop`.
    pub fn run_until(&mut self, stop: Period) -> TempoResult<()> {
        self.execute(Some(stop))
    }

    /// Solve the model with a set of temporary parameter overrides.
    pub fn run_with(&mut self, context: &RunContext) -> TempoResult<()> {
        let mut previous = Vec::with_capacity(context.overrides.len());
        let mut result = Ok(());
        for (name, value) in &context.overrides {
            let slot = match self.external_slot(name) {
                Ok(slot) => slot,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            previous.push((slot, self.storage[slot].borrow().clone()));
            if let Err(e) = self.update_parameter(name, value.clone()) {
                result = Err(e);
                break;
            }
        }
        if result.is_ok() {
            result = self.execute(context.stop_period);
        }
        for (slot, storage) in previous.into_iter().rev() {
            *self.storage[slot].borrow_mut() = storage;
        }
        result
    }

    /// Steps the model forward one period.
    ///
    /// The first step (or the first after a finished or failed run) starts a new run and
    /// solves the first period.
    pub fn step(&mut self) -> TempoResult<()> {
        match self.state {
            RunState::Running => self.clock.advance()?,
            RunState::NotStarted | RunState::Finished | RunState::Failed(_) => self.start()?,
        }
        self.solve_current()?;
        if self.clock.is_last() {
            self.state = RunState::Finished;
        }
        Ok(())
    }

    fn external_slot(&self, name: &str) -> TempoResult<usize> {
        self.externals
            .get(name)
            .copied()
            .ok_or_else(|| TempoError::UnknownVariable {
                component: "external".to_string(),
                name: name.to_string(),
            })
    }

    /// Replace an external value between runs.
    ///
    /// Values set with `set_parameter` or filled from a default are named
    /// `component.parameter`; shared values keep the name given to `set_external`.
    pub fn update_parameter(&mut self, name: &str, value: impl Into<ParameterValue>) -> TempoResult<()> {
        let slot = self.external_slot(name)?;
        let mut storage = self.storage[slot].borrow_mut();
        match value.into() {
            ParameterValue::Scalar(v) => {
                storage.fill(v);
                Ok(())
            }
            ParameterValue::Array(values) => storage.fill_from(&values),
        }
    }

    /// Storage backing a component's variable or parameter.
    pub fn storage(&self, component: &str, name: &str) -> TempoResult<Ref<'_, Storage>> {
        let instance = self.instance(component)?;
        let slot = instance
            .variable_slot(name)
            .or_else(|| instance.parameter(name).map(|p| p.slot))
            .ok_or_else(|| TempoError::UnknownVariable {
                component: component.to_string(),
                name: name.to_string(),
            })?;
        Ok(self.storage[slot].borrow())
    }

    /// The values of a scalar time-indexed variable, as `(period, value)` pairs.
    pub fn series(&self, component: &str, variable: &str) -> TempoResult<Vec<(Period, Option<FloatValue>)>> {
        self.series_at(component, variable, &[])
    }

    /// The values of a time-indexed variable at a fixed position on its other axes.
    pub fn series_at(
        &self,
        component: &str,
        variable: &str,
        indices: &[usize],
    ) -> TempoResult<Vec<(Period, Option<FloatValue>)>> {
        let storage = self.storage(component, variable)?;
        match &*storage {
            Storage::Series(array) => array.series(indices),
            Storage::Static(array) => Err(TempoError::DimensionMismatch {
                target: array.name().to_string(),
                expected: array.shape().len(),
                got: indices.len() + 1,
            }),
        }
    }

    /// The value of a scalar static variable or parameter.
    pub fn value(&self, component: &str, name: &str) -> TempoResult<FloatValue> {
        self.value_at(component, name, &[])
    }

    pub fn value_at(&self, component: &str, name: &str, indices: &[usize]) -> TempoResult<FloatValue> {
        let storage = self.storage(component, name)?;
        match &*storage {
            Storage::Static(array) => array.get(indices),
            Storage::Series(array) => Err(TempoError::DimensionMismatch {
                target: array.name().to_string(),
                expected: array.ndim(),
                got: indices.len(),
            }),
        }
    }

    /// Component names in the order they are solved.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.components[i].name.as_str())
            .collect()
    }

    /// Component names in the order they were registered.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn variables(&self, component: &str) -> TempoResult<Vec<&str>> {
        Ok(self
            .instance(component)?
            .variables
            .iter()
            .map(|(name, _)| name.as_str())
            .collect())
    }

    /// A component's parameters and what each is bound to.
    pub fn parameters(&self, component: &str) -> TempoResult<Vec<(&str, &BindingSource)>> {
        Ok(self
            .instance(component)?
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), &p.source))
            .collect())
    }

    /// Names of every external value in use.
    pub fn externals(&self) -> Vec<&str> {
        self.externals.keys().map(String::as_str).collect()
    }

    /// Create a diagram that represents the component graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &CGraph> {
        Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| {
                let label = er.weight().to_string();
                format!("label = \"{}\"", label.replace('"', "\\\""))
            },
            &|_, (_, name)| format!("label = \"{}\"", name.replace('"', "\\\"")),
        )
    }
}
