use crate::errors::TempoError;
use crate::example_components::{AddOne, Failing, OrdinalDoubler};
use crate::model::{ModelBuilder, RunState};
use crate::timestep::TimeGrid;
use std::sync::Arc;

fn builder() -> ModelBuilder {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 5).unwrap())
        .with_component("F", Arc::new(Failing { fail_at: 2022 }))
        .with_component("B", Arc::new(AddOne::new()))
        .connect("F", "out", "B", "input");
    builder
}

#[test]
fn failure_stops_the_run() {
    let mut model = builder().build().unwrap();

    match model.run() {
        Err(TempoError::Component(message)) => assert_eq!(message, "refusing to solve 2022"),
        other => panic!("expected the component's error, got {:?}", other),
    }

    assert_eq!(model.state(), RunState::Failed(2022));
    assert!(!model.finished());
    assert_eq!(model.current_period(), 2022);

    // Values written before the failure are kept
    assert_eq!(
        model.series("F", "out").unwrap(),
        vec![
            (2020, Some(2020.0)),
            (2021, Some(2021.0)),
            (2022, None),
            (2023, None),
            (2024, None)
        ]
    );
    assert_eq!(model.series("B", "output").unwrap()[1], (2021, Some(2022.0)));
    assert_eq!(model.series("B", "output").unwrap()[2], (2022, None));
}

#[test]
fn runs_before_the_failure() {
    let mut model = builder().build().unwrap();

    model.run_until(2021).unwrap();
    assert!(model.finished());

    assert!(model.run().is_err());
    model.step().unwrap();
    assert_eq!(model.state(), RunState::Running);
    assert_eq!(model.current_period(), 2020);
    assert_eq!(model.series("F", "out").unwrap()[1], (2021, None));
}

#[test]
fn step_reports_failures() {
    let mut model = builder().build().unwrap();

    model.step().unwrap();
    model.step().unwrap();
    assert!(model.step().is_err());
    assert_eq!(model.state(), RunState::Failed(2022));
}

#[test]
fn reading_before_the_grid_fails() {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 3).unwrap())
        .with_component("A", Arc::new(OrdinalDoubler {}))
        .with_component("B", Arc::new(AddOne::new()))
        .connect_with_offset("A", "out", "B", "input", -1);
    let mut model = builder.build().unwrap();

    match model.run() {
        Err(TempoError::OutOfRange { index, .. }) => assert_eq!(index, 0),
        other => panic!("expected an out of range read, got {:?}", other),
    }
    assert_eq!(model.state(), RunState::Failed(2020));
}

#[test]
fn reading_an_unsolved_period_fails() {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::uniform(2020, 1, 3).unwrap())
        .with_component("A", Arc::new(OrdinalDoubler {}))
        .with_component("B", Arc::new(AddOne::new()))
        .connect_with_offset("A", "out", "B", "input", 1);
    let mut model = builder.build().unwrap();

    match model.run() {
        Err(TempoError::UnsetValue { target, period, .. }) => {
            assert_eq!(target, "A.out");
            assert_eq!(period, 2021);
        }
        other => panic!("expected an unset value, got {:?}", other),
    }
}
