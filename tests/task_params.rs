mod common;

use common::{fit_params, temp_store};
use progenitor_lib::model::knowledge_base::CONDITIONS;
use progenitor_lib::pipeline::tasks::{FitSimData, InitValidationData, Simulation, VariantSimData};
use progenitor_lib::pipeline::{
    InProcessRunner, Orchestrator, OrchestratorOptions, TaskParams, TaskRegistry, TaskSpec,
};
use std::sync::Arc;

#[test]
fn test_missing_required_parameter_names_the_key() {
    let full = fit_params();
    let params: TaskParams = full
        .keys()
        .filter(|k| *k != "output_metrics_data")
        .map(|k| (k.to_string(), full.get(k).cloned().unwrap()))
        .collect();
    let err = FitSimData::from_params(params).unwrap_err();
    assert!(err.0.contains("output_metrics_data"), "{}", err);
    assert!(err.0.contains("FitSimDataTask"), "{}", err);
}

#[test]
fn test_missing_parameter_fails_before_any_io() {
    let (dir, store) = temp_store();
    let mut orchestrator =
        Orchestrator::new(store, Arc::new(InProcessRunner), OrchestratorOptions::default());
    let spec = TaskSpec::new(
        VariantSimData::KIND,
        TaskParams::new()
            .with("variant_function", "double_x")
            .with("variant_index", 1)
            .with("input_sim_data", "kb/sim_data.bin")
            .with("output_sim_data", "double_x_000001/kb/sim_data.bin"),
    );
    let err = orchestrator.add("variant", spec).unwrap_err();
    assert!(err.0.contains("variant_metadata_directory"), "{}", err);
    assert!(orchestrator.nodes().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_wrong_type_is_configuration_error() {
    let err = FitSimData::from_params(fit_params().with("cpus", "four")).unwrap_err();
    assert!(err.0.contains("cpus"), "{}", err);
    let err = FitSimData::from_params(fit_params().with("cpus", 0)).unwrap_err();
    assert!(err.0.contains("cpus"), "{}", err);
}

#[test]
fn test_unknown_parameter_is_tolerated() {
    assert!(FitSimData::from_params(fit_params().with("colour", "blue")).is_ok());
}

#[test]
fn test_null_optional_counts_as_absent() {
    let task = FitSimData::from_params(fit_params().with("cached_data", serde_json::Value::Null));
    assert!(task.is_ok());
}

#[test]
fn test_every_builtin_rejects_empty_params() {
    let registry = TaskRegistry::with_builtins();
    for kind in registry.kinds() {
        let result = registry.build(&TaskSpec::new(kind, TaskParams::new()));
        assert!(result.is_err(), "{} accepted an empty parameter map", kind);
    }
}

#[test]
fn test_params_parse_from_json_object() {
    let params: TaskParams = serde_json::from_str(
        r#"{"validation_data_input": "kb/raw_validation_data.bin",
            "knowledge_base_raw": "kb/raw_data.bin",
            "output_data": "kb/validation_data.bin"}"#,
    )
    .unwrap();
    assert!(InitValidationData::from_params(params).is_ok());
    assert!(serde_json::from_str::<TaskParams>("[1, 2]").is_err());
}

#[test]
fn test_simulation_bounds_checked() {
    let base = TaskParams::new()
        .with("input_sim_data", "kb/sim_data.bin")
        .with("output_directory", "cell")
        .with("seed", 1);
    assert!(Simulation::from_params(base.clone().with("max_steps", 0)).is_err());
    assert!(Simulation::from_params(
        base.clone()
            .with("max_steps", 10)
            .with("mass_fold_threshold", 0.9)
    )
    .is_err());
    assert!(Simulation::from_params(base.with("max_steps", 10).with("time_step_s", -1.0)).is_err());
}

#[test]
fn test_variant_index_outside_static_range_is_rejected() {
    let params = |function: &str, index: u32| {
        TaskParams::new()
            .with("variant_function", function)
            .with("variant_index", index)
            .with("input_sim_data", "kb/sim_data.bin")
            .with("output_sim_data", "variant/kb/sim_data.bin")
            .with("variant_metadata_directory", "variant/metadata")
    };
    for (function, index) in [
        ("wildtype", 5),
        ("wildtype", 1),
        ("double_x", 10),
        ("condition", CONDITIONS.len() as u32),
        ("time_step", 4),
    ] {
        let err = VariantSimData::from_params(params(function, index)).unwrap_err();
        assert!(err.0.contains("out of range"), "{} {}: {}", function, index, err);
        assert!(err.0.contains(function), "{}", err);
    }
    assert!(VariantSimData::from_params(params("wildtype", 0)).is_ok());
    assert!(VariantSimData::from_params(params("time_step", 3)).is_ok());
    // Knockout candidates come from the data, so the bound is checked at run time.
    assert!(VariantSimData::from_params(params("gene_knockout", 1_000)).is_ok());
}
