//! Perturbed runs of a single model definition.

use std::sync::Arc;
use std::thread;
use tempo::components::{CO2ERFParameters, LinearTemperature, CO2ERF};
use tempo::model::{ModelBuilder, RunContext};
use tempo::timestep::TimeGrid;

fn builder() -> ModelBuilder {
    let mut builder = ModelBuilder::new();
    builder
        .with_time_grid(TimeGrid::from_range(2000, 2100, 1).unwrap())
        .with_component(
            "erf",
            Arc::new(CO2ERF::from_parameters(CO2ERFParameters::default())),
        )
        .with_component("temperature", Arc::new(LinearTemperature::new()))
        .set_parameter("erf", "concentration", 556.0)
        .connect("erf", "erf", "temperature", "forcing");
    builder
}

fn final_temperature(model: &tempo::model::Model) -> f64 {
    model
        .series("temperature", "temperature")
        .unwrap()
        .last()
        .and_then(|(_, v)| *v)
        .unwrap()
}

#[test]
fn overrides_apply_to_a_single_run() {
    let mut model = builder().build().unwrap();
    model.run().unwrap();
    let baseline = final_temperature(&model);

    let context = RunContext::new().with_override("temperature.climate_sensitivity", 1.2);
    model.run_with(&context).unwrap();
    let perturbed = final_temperature(&model);
    assert!(perturbed > baseline);

    assert_eq!(
        model.value("temperature", "climate_sensitivity").unwrap(),
        0.8
    );
    model.run().unwrap();
    assert_eq!(final_temperature(&model), baseline);
}

#[test]
fn ensemble_on_threads() {
    let builder = builder();
    let sensitivities = [0.4, 0.8, 1.2, 1.6];

    let results: Vec<f64> = thread::scope(|s| {
        let handles: Vec<_> = sensitivities
            .iter()
            .map(|&sensitivity| {
                let builder = &builder;
                s.spawn(move || {
                    let mut model = builder.build().unwrap();
                    model
                        .update_parameter("temperature.climate_sensitivity", sensitivity)
                        .unwrap();
                    model.run().unwrap();
                    final_temperature(&model)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn built_models_move_between_threads() {
    let mut model = builder().build().unwrap();
    let model = thread::spawn(move || {
        model.run().unwrap();
        model
    })
    .join()
    .unwrap();

    assert!(model.finished());
}
