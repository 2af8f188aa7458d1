mod common;

use common::{seed_sim_data, temp_store};
use progenitor_data::{CellState, ListenerRecord, SimData};
use progenitor_io::read_records;
use progenitor_lib::model::cell::CellDefinition;
use progenitor_lib::pipeline::tasks::{Simulation, VariantSimData, FINAL_STATE, LISTENER_RECORDS};
use progenitor_lib::pipeline::workflow::{RAW_DATA, SIM_DATA};
use progenitor_lib::pipeline::{Task, TaskParams};

const VARIANT_SIM_DATA: &str = "double_x_000003/kb/sim_data.bin";

fn run_chain(store: &progenitor_io::ArtifactStore) {
    seed_sim_data(store);
    VariantSimData::from_params(
        TaskParams::new()
            .with("variant_function", "double_x")
            .with("variant_index", 3)
            .with("input_sim_data", SIM_DATA)
            .with("output_sim_data", VARIANT_SIM_DATA)
            .with("variant_metadata_directory", "double_x_000003/metadata"),
    )
    .unwrap()
    .run(store)
    .unwrap();
}

fn simulate(store: &progenitor_io::ArtifactStore, seed: u64, dir: &str) {
    Simulation::from_params(
        TaskParams::new()
            .with("input_sim_data", SIM_DATA)
            .with("output_directory", dir)
            .with("seed", seed)
            .with("max_steps", 40),
    )
    .unwrap()
    .run(store)
    .unwrap();
}

#[test]
fn test_independent_runs_produce_identical_artifacts() {
    let (_dir1, store1) = temp_store();
    let (_dir2, store2) = temp_store();
    run_chain(&store1);
    run_chain(&store2);

    for path in [RAW_DATA, SIM_DATA, VARIANT_SIM_DATA] {
        let a = std::fs::read(store1.resolve(path)).unwrap();
        let b = std::fs::read(store2.resolve(path)).unwrap();
        assert_eq!(a, b, "{} differs between runs", path);
    }
    let a: SimData = store1.load(VARIANT_SIM_DATA).unwrap();
    let b: SimData = store2.load(VARIANT_SIM_DATA).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_same_seed_same_trajectory() {
    let (_dir, store) = temp_store();
    seed_sim_data(&store);
    simulate(&store, 11, "run_a");
    simulate(&store, 11, "run_b");

    let a: CellState = store.load(format!("run_a/{}", FINAL_STATE)).unwrap();
    let b: CellState = store.load(format!("run_b/{}", FINAL_STATE)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.step, 40);

    let rows_a: Vec<ListenerRecord> = read_records(store.resolve(format!("run_a/{}", LISTENER_RECORDS))).unwrap();
    let rows_b: Vec<ListenerRecord> = read_records(store.resolve(format!("run_b/{}", LISTENER_RECORDS))).unwrap();
    assert_eq!(rows_a, rows_b);
}

#[test]
fn test_scheduler_repeats_with_parallel_tiers() {
    let (_dir, store) = temp_store();
    let sim_data = seed_sim_data(&store);
    let definition = CellDefinition::default();

    let run = || {
        let mut scheduler = definition.build(&sim_data, None, 5).unwrap();
        for _ in 0..25 {
            scheduler.step().unwrap();
        }
        (
            scheduler.state().snapshot(),
            scheduler.log().records().to_vec(),
            scheduler.last_grants().to_vec(),
        )
    };
    let first = run();
    let second = run();
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.2, second.2);
}

#[test]
fn test_different_seeds_get_different_founders() {
    assert_ne!(CellDefinition::founder_id(1), CellDefinition::founder_id(2));
    assert_eq!(CellDefinition::founder_id(3), CellDefinition::founder_id(3));
}

#[test]
fn test_rerunning_a_task_is_idempotent() {
    let (_dir, store) = temp_store();
    run_chain(&store);
    let first = std::fs::read(store.resolve(VARIANT_SIM_DATA)).unwrap();
    let short_name = std::fs::read_to_string(store.resolve("double_x_000003/metadata/short_name")).unwrap();

    run_chain(&store);
    assert_eq!(std::fs::read(store.resolve(VARIANT_SIM_DATA)).unwrap(), first);
    assert_eq!(
        std::fs::read_to_string(store.resolve("double_x_000003/metadata/short_name")).unwrap(),
        short_name
    );
}
