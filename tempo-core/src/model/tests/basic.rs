//! Basic model tests: run, step, dot, serialisation.

use crate::array::Storage;
use crate::example_components::{AddOne, OrdinalDoubler, Regional, RegionalSum};
use crate::model::{Model, ModelBuilder, RunContext, RunState, Simulation};
use crate::timestep::TimeGrid;
use is_close::is_close;
use std::sync::Arc;

fn builder() -> ModelBuilder {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 3).unwrap())
        .with_component("A", Arc::new(OrdinalDoubler {}))
        .with_component("B", Arc::new(AddOne::new()))
        .connect("A", "out", "B", "input");
    builder
}

#[test]
fn full_run() {
    let mut model = builder().build().unwrap();
    assert_eq!(model.state(), RunState::NotStarted);

    model.run().unwrap();

    assert_eq!(model.state(), RunState::Finished);
    assert!(model.finished());
    assert_eq!(model.current_period(), 2022);
    assert_eq!(
        model.series("A", "out").unwrap(),
        vec![(2020, Some(2.0)), (2021, Some(4.0)), (2022, Some(6.0))]
    );
    assert_eq!(
        model.series("B", "output").unwrap(),
        vec![(2020, Some(3.0)), (2021, Some(5.0)), (2022, Some(7.0))]
    );
}

#[test]
fn rerun_reproduces_results() {
    let mut model = builder().build().unwrap();
    model.run().unwrap();
    let first = model.series("B", "output").unwrap();

    model.run().unwrap();
    assert_eq!(model.series("B", "output").unwrap(), first);
    assert_eq!(model.current_period(), 2022);
}

#[test]
fn independent_builds() {
    let builder = builder();
    let mut a = builder.build().unwrap();
    let b = builder.build().unwrap();

    a.run().unwrap();
    assert!(a.finished());
    assert_eq!(b.state(), RunState::NotStarted);
    assert_eq!(b.series("B", "output").unwrap()[0], (2020, None));
}

#[test]
fn step() {
    let mut model = builder().build().unwrap();

    model.step().unwrap();
    assert_eq!(model.state(), RunState::Running);
    assert_eq!(model.current_period(), 2020);
    assert_eq!(
        model.series("B", "output").unwrap(),
        vec![(2020, Some(3.0)), (2021, None), (2022, None)]
    );

    model.step().unwrap();
    model.step().unwrap();
    assert!(model.finished());
    assert_eq!(model.current_period(), 2022);

    // Stepping a finished model starts a new run
    model.step().unwrap();
    assert_eq!(model.current_period(), 2020);
    assert_eq!(model.state(), RunState::Running);
    assert_eq!(model.series("B", "output").unwrap()[1], (2021, None));
}

#[test]
fn run_until() {
    let mut model = builder().build().unwrap();

    model.run_until(2021).unwrap();
    assert!(model.finished());
    assert_eq!(model.current_period(), 2021);
    assert_eq!(model.series("B", "output").unwrap()[2], (2022, None));

    // Stop periods past the end of the grid run the whole grid
    model.run_until(2100).unwrap();
    assert_eq!(model.current_period(), 2022);
    assert_eq!(model.series("B", "output").unwrap()[2], (2022, Some(7.0)));

    assert!(model.run_until(2019).is_err());
}

#[test]
fn introspection() {
    let model = builder().build().unwrap();

    assert_eq!(model.execution_order(), vec!["A", "B"]);
    assert_eq!(model.component_names(), vec!["A", "B"]);
    assert_eq!(model.variables("B").unwrap(), vec!["output"]);
    let parameters = model.parameters("B").unwrap();
    assert_eq!(parameters.len(), 1);
    assert_eq!(parameters[0].0, "input");
    assert_eq!(parameters[0].1.to_string(), "A.out");
    assert!(model.variables("C").is_err());
    assert!(model.series("A", "missing").is_err());
}

#[test]
fn dot() {
    let model = builder().build().unwrap();

    let exp = r#"digraph {
    0 [ label = "A"]
    1 [ label = "B"]
    0 -> 1 [ label = "A.out -> B.input"]
}
"#;

    let res = format!("{:?}", model.as_dot());
    assert_eq!(res, exp);
}

#[test]
fn multi_dimensional_values() {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 4).unwrap())
        .with_component("regional", Arc::new(Regional { regions: 2 }))
        .with_component("sum", Arc::new(RegionalSum { regions: 2 }))
        .set_parameter("regional", "scale", 1.5)
        .connect("regional", "values", "sum", "values");
    let mut model = builder.build().unwrap();
    model.run().unwrap();

    let totals = model.series("sum", "total").unwrap();
    for (t, (_, total)) in totals.iter().enumerate() {
        assert!(is_close!(total.unwrap(), 4.5 * (t + 1) as f64));
    }
    let second = model.series_at("regional", "values", &[1]).unwrap();
    assert_eq!(second[3], (2023, Some(12.0)));

    // The regional variable needs a region index
    assert!(model.series("regional", "values").is_err());
    assert_eq!(model.value("regional", "scale").unwrap(), 1.5);
    match &*model.storage("regional", "values").unwrap() {
        Storage::Series(array) => assert_eq!(array.shape(), &[2, 4]),
        Storage::Static(_) => panic!("expected a time-indexed array"),
    };
}

#[test]
fn update_parameter_between_runs() {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 2).unwrap())
        .with_component("regional", Arc::new(Regional { regions: 1 }))
        .set_parameter("regional", "scale", 1.0);
    let mut model = builder.build().unwrap();

    model.run().unwrap();
    assert_eq!(model.series_at("regional", "values", &[0]).unwrap()[1].1, Some(2.0));

    model.update_parameter("regional.scale", 3.0).unwrap();
    model.run().unwrap();
    assert_eq!(model.series_at("regional", "values", &[0]).unwrap()[1].1, Some(6.0));

    assert!(model.update_parameter("regional.missing", 3.0).is_err());
}

#[test]
fn run_with_restores_overrides() {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 2).unwrap())
        .with_component("regional", Arc::new(Regional { regions: 1 }))
        .set_parameter("regional", "scale", 1.0);
    let mut model = builder.build().unwrap();

    let context = RunContext::new()
        .with_override("regional.scale", 10.0)
        .with_stop_period(2020);
    model.run_with(&context).unwrap();
    assert_eq!(
        model.series_at("regional", "values", &[0]).unwrap(),
        vec![(2020, Some(10.0)), (2021, None)]
    );
    assert_eq!(model.value("regional", "scale").unwrap(), 1.0);

    let bad = RunContext::new().with_override("nope", 1.0);
    assert!(model.run_with(&bad).is_err());
}

#[test]
fn simulation_builds_lazily() {
    let mut simulation = Simulation::new(builder());
    assert!(!simulation.is_built());
    assert!(simulation.model().is_none());

    let model = simulation.run().unwrap();
    assert!(model.finished());
    assert!(simulation.is_built());

    // Structural edits drop the instance
    simulation
        .builder_mut()
        .with_component("C", Arc::new(AddOne::new()))
        .connect("B", "output", "C", "input");
    assert!(!simulation.is_built());

    let model = simulation.run().unwrap();
    assert_eq!(model.series("C", "output").unwrap()[0], (2020, Some(4.0)));
}

#[test]
fn serialise_and_deserialise_model() {
    let mut model = builder().build().unwrap();
    model.run().unwrap();

    let serialised = serde_json::to_string_pretty(&model).unwrap();
    let mut restored: Model = serde_json::from_str(&serialised).unwrap();

    assert_eq!(restored.state(), RunState::Finished);
    assert_eq!(
        restored.series("B", "output").unwrap(),
        model.series("B", "output").unwrap()
    );

    restored.run().unwrap();
    assert_eq!(
        restored.series("B", "output").unwrap(),
        model.series("B", "output").unwrap()
    );
}
