//! Model builder for constructing models from components.

use crate::array::{StaticArray, Storage, TimeIndexedArray};
use crate::component::{RequirementDefinition, RequirementType};
use crate::config::ModelConfig;
use crate::errors::{TempoError, TempoResult};
use crate::timestep::{FloatValue, TimeGrid};
use log::debug;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::runtime::Model;
use super::types::{
    Binding, BindingSource, BoundParameter, CGraph, ComponentDefinition, ComponentInstance,
    ParameterValue, C,
};
use super::validation::{execution_order, verify_definitions, verify_shapes};

/// Build a new model from a set of components.
///
/// Components are registered under a unique name and connected by binding each of
/// their parameters to another component's variable or to an external value.
/// The builder checks that every parameter is bound exactly once, that bound shapes
/// agree and that there are no cycles between components at the same period.
/// The resulting graph defines the order in which components are solved.
///
/// The builder is only a definition; every call to [`ModelBuilder::build`] produces a
/// fresh, independent [`Model`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    components: Vec<ComponentDefinition>,
    bindings: Vec<Binding>,
    externals: BTreeMap<String, ParameterValue>,
    leftover_defaults: BTreeMap<String, FloatValue>,
    /// The time grid for the model.
    pub time_grid: Arc<TimeGrid>,
}

/// A registered component while the model is being built.
struct Pending<'b> {
    definition: &'b ComponentDefinition,
    grid: Arc<TimeGrid>,
    grid_offset: usize,
    requirements: Vec<RequirementDefinition>,
}

impl Pending<'_> {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn find(&self, name: &str, requirement_type: RequirementType) -> Option<&RequirementDefinition> {
        self.requirements
            .iter()
            .find(|r| r.name == name && r.requirement_type == requirement_type)
    }
}

fn external_storage(
    name: &str,
    requirement: &RequirementDefinition,
    grid: &Arc<TimeGrid>,
    value: &ParameterValue,
) -> TempoResult<Storage> {
    let label = format!("external:{name}");
    let mut storage = match requirement.time_axis() {
        Some(axis) => Storage::Series(TimeIndexedArray::new(
            &label,
            grid.clone(),
            axis,
            &requirement.fixed_dims(),
        )?),
        None => Storage::Static(StaticArray::new(&label, &requirement.fixed_dims())),
    };
    match value {
        ParameterValue::Scalar(v) => storage.fill(*v),
        ParameterValue::Array(values) => storage.fill_from(values)?,
    }
    Ok(storage)
}

impl ModelBuilder {
    /// Create a new model builder with default settings.
    ///
    /// The default time grid covers 2000 to 2099 in steps of one.
    pub fn new() -> Self {
        Self {
            components: vec![],
            bindings: vec![],
            externals: BTreeMap::new(),
            leftover_defaults: BTreeMap::new(),
            time_grid: Arc::new(TimeGrid::Uniform {
                first: 2000,
                step: 1,
                count: 100,
            }),
        }
    }

    /// Create a builder with the time grid and defaults of a configuration.
    pub fn from_config(config: &ModelConfig) -> TempoResult<Self> {
        let mut builder = Self::new();
        builder
            .with_time_grid(config.time.to_grid()?)
            .with_leftover_defaults(config.defaults.clone());
        Ok(builder)
    }

    /// Register a component that is solved on the model's time grid.
    pub fn with_component(&mut self, name: &str, component: C) -> &mut Self {
        self.components.push(ComponentDefinition {
            name: name.to_string(),
            component,
            grid: None,
        });
        self
    }

    /// Register a component that is solved on its own time grid.
    ///
    /// The grid must lie within the model's grid: it may start later or end earlier,
    /// but its periods must line up with the model's periods.
    /// The component is skipped for model periods outside its grid.
    pub fn with_component_on_grid(&mut self, name: &str, component: C, grid: TimeGrid) -> &mut Self {
        self.components.push(ComponentDefinition {
            name: name.to_string(),
            component,
            grid: Some(grid),
        });
        self
    }

    /// Bind a component's parameter to another component's variable.
    pub fn connect(
        &mut self,
        source: &str,
        variable: &str,
        component: &str,
        parameter: &str,
    ) -> &mut Self {
        self.connect_with_offset(source, variable, component, parameter, 0)
    }

    /// Bind a component's parameter to another component's variable, `offset` periods
    /// later (positive) or earlier (negative).
    ///
    /// Bindings with a non-zero offset do not constrain the order in which components
    /// are solved, so they may be used to close feedback loops.
    pub fn connect_with_offset(
        &mut self,
        source: &str,
        variable: &str,
        component: &str,
        parameter: &str,
        offset: i64,
    ) -> &mut Self {
        self.bindings.push(Binding {
            source: BindingSource::Variable {
                component: source.to_string(),
                variable: variable.to_string(),
            },
            component: component.to_string(),
            parameter: parameter.to_string(),
            offset,
        });
        self
    }

    /// Set a parameter of a single component directly.
    ///
    /// The value is stored as an external named `component.parameter`,
    /// which can later be changed with [`Model::update_parameter`].
    /// Setting the same parameter again replaces the value.
    pub fn set_parameter(
        &mut self,
        component: &str,
        parameter: &str,
        value: impl Into<ParameterValue>,
    ) -> &mut Self {
        let name = format!("{component}.{parameter}");
        let binding = Binding {
            source: BindingSource::External(name.clone()),
            component: component.to_string(),
            parameter: parameter.to_string(),
            offset: 0,
        };
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
        }
        self.externals.insert(name, value.into());
        self
    }

    /// Supply an external value that may be shared by several parameters.
    ///
    /// Any unused external values will be ignored.
    pub fn set_external(&mut self, name: &str, value: impl Into<ParameterValue>) -> &mut Self {
        self.externals.insert(name.to_string(), value.into());
        self
    }

    /// Bind a component's parameter to an external value.
    pub fn connect_external(&mut self, name: &str, component: &str, parameter: &str) -> &mut Self {
        self.bindings.push(Binding {
            source: BindingSource::External(name.to_string()),
            component: component.to_string(),
            parameter: parameter.to_string(),
            offset: 0,
        });
        self
    }

    /// Values for parameters that are not otherwise bound, keyed by parameter name.
    ///
    /// These take precedence over the defaults declared by the components themselves.
    pub fn with_leftover_defaults(&mut self, defaults: BTreeMap<String, FloatValue>) -> &mut Self {
        self.leftover_defaults.extend(defaults);
        self
    }

    /// Specify the time grid that will be used by the model.
    ///
    /// This grid defines the periods over which the model is iterated.
    pub fn with_time_grid(&mut self, time_grid: TimeGrid) -> &mut Self {
        self.time_grid = Arc::new(time_grid);
        self
    }

    fn resolve_components(&self) -> TempoResult<Vec<Pending<'_>>> {
        let mut seen = BTreeSet::new();
        self.components
            .iter()
            .map(|definition| {
                if !seen.insert(definition.name.as_str()) {
                    return Err(TempoError::DuplicateComponent(definition.name.clone()));
                }
                let grid = match &definition.grid {
                    Some(grid) => Arc::new(grid.clone()),
                    None => self.time_grid.clone(),
                };
                let grid_offset = grid.offset_within(&self.time_grid)?;
                let requirements = definition.component.definitions();
                verify_definitions(&definition.name, &requirements)?;
                Ok(Pending {
                    definition,
                    grid,
                    grid_offset,
                    requirements,
                })
            })
            .collect()
    }

    /// Check every binding refers to something that exists and bind each parameter once.
    ///
    /// Parameters left unbound are filled from the leftover defaults, then from the
    /// component's own defaults.
    /// Returns the complete list of bindings and external values.
    fn resolve_bindings(
        &self,
        pending: &[Pending],
        index: &HashMap<&str, usize>,
    ) -> TempoResult<(Vec<Binding>, BTreeMap<String, ParameterValue>)> {
        let mut bindings = Vec::with_capacity(self.bindings.len());
        let mut externals = self.externals.clone();
        let mut bound = BTreeSet::new();

        for binding in &self.bindings {
            let consumer = index
                .get(binding.component.as_str())
                .map(|&i| &pending[i])
                .ok_or_else(|| TempoError::UnknownComponent(binding.component.clone()))?;
            if consumer
                .find(&binding.parameter, RequirementType::Parameter)
                .is_none()
            {
                return Err(TempoError::UnknownVariable {
                    component: binding.component.clone(),
                    name: binding.parameter.clone(),
                });
            }

            match &binding.source {
                BindingSource::Variable {
                    component,
                    variable,
                } => {
                    let producer = index
                        .get(component.as_str())
                        .map(|&i| &pending[i])
                        .ok_or_else(|| TempoError::UnknownComponent(component.clone()))?;
                    if producer.find(variable, RequirementType::Variable).is_none() {
                        return Err(TempoError::UnknownVariable {
                            component: component.clone(),
                            name: variable.clone(),
                        });
                    }
                }
                BindingSource::External(name) => {
                    if !externals.contains_key(name) {
                        return Err(TempoError::UnknownVariable {
                            component: "external".to_string(),
                            name: name.clone(),
                        });
                    }
                }
            }

            if !bound.insert((binding.component.as_str(), binding.parameter.as_str())) {
                return Err(TempoError::DuplicateBinding {
                    component: binding.component.clone(),
                    parameter: binding.parameter.clone(),
                });
            }
            bindings.push(binding.clone());
        }

        for component in pending {
            for parameter in component
                .requirements
                .iter()
                .filter(|r| r.requirement_type == RequirementType::Parameter)
            {
                if bound.contains(&(component.name(), parameter.name.as_str())) {
                    continue;
                }
                let value = match (
                    self.leftover_defaults.get(&parameter.name),
                    parameter.default,
                ) {
                    (Some(value), _) => {
                        debug!(
                            "{}.{} is unbound, using leftover default {}",
                            component.name(),
                            parameter.name,
                            value
                        );
                        *value
                    }
                    (None, Some(value)) => {
                        debug!(
                            "{}.{} is unbound, using its default {}",
                            component.name(),
                            parameter.name,
                            value
                        );
                        value
                    }
                    (None, None) => {
                        return Err(TempoError::UnboundParameter {
                            component: component.name().to_string(),
                            parameter: parameter.name.clone(),
                        })
                    }
                };

                let name = format!("{}.{}", component.name(), parameter.name);
                externals.insert(name.clone(), ParameterValue::Scalar(value));
                bindings.push(Binding {
                    source: BindingSource::External(name),
                    component: component.name().to_string(),
                    parameter: parameter.name.clone(),
                    offset: 0,
                });
            }
        }

        Ok((bindings, externals))
    }

    /// Builds the component graph for the registered components and creates a concrete model.
    ///
    /// Returns an error if the components or their bindings are inconsistent.
    /// Nothing is executed.
    pub fn build(&self) -> TempoResult<Model> {
        let pending = self.resolve_components()?;
        let index: HashMap<&str, usize> = pending
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();

        let (bindings, externals) = self.resolve_bindings(&pending, &index)?;

        // Variable storage, on each component's own grid
        let mut storage: Vec<Storage> = vec![];
        let mut variables: Vec<Vec<(String, usize)>> = vec![];
        for component in &pending {
            let mut slots = vec![];
            for variable in component
                .requirements
                .iter()
                .filter(|r| r.requirement_type == RequirementType::Variable)
            {
                let label = format!("{}.{}", component.name(), variable.name);
                let array = match variable.time_axis() {
                    Some(axis) => Storage::Series(TimeIndexedArray::new(
                        &label,
                        component.grid.clone(),
                        axis,
                        &variable.fixed_dims(),
                    )?),
                    None => Storage::Static(StaticArray::new(&label, &variable.fixed_dims())),
                };
                slots.push((variable.name.clone(), storage.len()));
                storage.push(array);
            }
            variables.push(slots);
        }

        // External storage is shaped like its first consumer and lives on the model grid
        let mut external_slots: BTreeMap<String, usize> = BTreeMap::new();
        for binding in &bindings {
            if let BindingSource::External(name) = &binding.source {
                if external_slots.contains_key(name) {
                    continue;
                }
                let consumer = &pending[index[binding.component.as_str()]];
                let requirement = consumer
                    .find(&binding.parameter, RequirementType::Parameter)
                    .ok_or_else(|| TempoError::UnknownVariable {
                        component: binding.component.clone(),
                        name: binding.parameter.clone(),
                    })?;
                let value = externals.get(name).ok_or_else(|| TempoError::UnknownVariable {
                    component: "external".to_string(),
                    name: name.clone(),
                })?;
                let array = external_storage(name, requirement, &self.time_grid, value)
                    .map_err(|e| match e {
                        TempoError::ShapeMismatch { producer, reason, .. } => {
                            TempoError::ShapeMismatch {
                                producer,
                                consumer: format!("{}.{}", binding.component, binding.parameter),
                                reason,
                            }
                        }
                        other => other,
                    })?;
                external_slots.insert(name.clone(), storage.len());
                storage.push(array);
            }
        }
        for name in externals.keys().filter(|n| !external_slots.contains_key(*n)) {
            debug!("external value {} is not used by any component", name);
        }

        // Resolve every binding against storage and check shapes
        let mut graph: CGraph = CGraph::new();
        let nodes: Vec<NodeIndex> = pending
            .iter()
            .map(|p| graph.add_node(p.name().to_string()))
            .collect();
        let mut parameters: Vec<Vec<BoundParameter>> = pending.iter().map(|_| vec![]).collect();

        for binding in &bindings {
            let ci = index[binding.component.as_str()];
            let consumer = &pending[ci];
            let consumed = consumer
                .find(&binding.parameter, RequirementType::Parameter)
                .ok_or_else(|| TempoError::UnknownVariable {
                    component: binding.component.clone(),
                    name: binding.parameter.clone(),
                })?;
            let consumer_label = format!("{}.{}", binding.component, binding.parameter);

            let (slot, produced, source_grid) = match &binding.source {
                BindingSource::Variable {
                    component,
                    variable,
                } => {
                    let pi = index[component.as_str()];
                    let producer = &pending[pi];
                    let produced = producer
                        .find(variable, RequirementType::Variable)
                        .ok_or_else(|| TempoError::UnknownVariable {
                            component: component.clone(),
                            name: variable.clone(),
                        })?;
                    let slot = variables[pi]
                        .iter()
                        .find(|(name, _)| name == variable)
                        .map(|(_, slot)| *slot)
                        .ok_or_else(|| TempoError::UnknownVariable {
                            component: component.clone(),
                            name: variable.clone(),
                        })?;
                    if binding.offset == 0 {
                        graph.add_edge(nodes[pi], nodes[ci], binding.clone());
                    }
                    (slot, produced.dimensions.clone(), producer.grid.clone())
                }
                BindingSource::External(name) => {
                    let slot = external_slots[name];
                    let first = bindings
                        .iter()
                        .find(|b| b.source == binding.source)
                        .and_then(|b| {
                            pending[index[b.component.as_str()]]
                                .find(&b.parameter, RequirementType::Parameter)
                        })
                        .map(|r| r.dimensions.clone())
                        .unwrap_or_default();
                    (slot, first, self.time_grid.clone())
                }
            };

            let producer_label = binding.source.to_string();
            verify_shapes(&producer_label, &produced, &consumer_label, &consumed.dimensions)?;

            let grid_offset = if consumed.has_time() {
                consumer.grid.offset_within(&source_grid).map_err(|e| match e {
                    TempoError::ShapeMismatch { reason, .. } => TempoError::ShapeMismatch {
                        producer: producer_label.clone(),
                        consumer: consumer_label.clone(),
                        reason,
                    },
                    other => other,
                })? as i64
            } else {
                if binding.offset != 0 {
                    return Err(TempoError::ShapeMismatch {
                        producer: producer_label,
                        consumer: consumer_label,
                        reason: format!(
                            "offset {} on a binding between static values",
                            binding.offset
                        ),
                    });
                }
                0
            };

            parameters[ci].push(BoundParameter {
                name: binding.parameter.clone(),
                slot,
                grid_offset,
                offset: binding.offset,
                source: binding.source.clone(),
            });
        }

        let order: Vec<usize> = execution_order(&graph)?
            .into_iter()
            .map(|n| n.index())
            .collect();
        debug!(
            "execution order: {}",
            order
                .iter()
                .map(|&i| pending[i].name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let components = pending
            .into_iter()
            .zip(parameters)
            .zip(variables)
            .map(|((p, parameters), variables)| ComponentInstance {
                name: p.definition.name.clone(),
                component: p.definition.component.clone(),
                grid: p.grid,
                grid_offset: p.grid_offset,
                parameters,
                variables,
            })
            .collect();

        Ok(Model::new(
            graph,
            components,
            order,
            storage,
            external_slots,
            self.time_grid.clone(),
        ))
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
