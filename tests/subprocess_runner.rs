mod common;

use common::{seed_sim_data, temp_store};
use progenitor_lib::error::PipelineError;
use progenitor_lib::pipeline::tasks::{InitRawData, Simulation, FINAL_STATE, LISTENER_RECORDS};
use progenitor_lib::pipeline::workflow::{RAW_DATA, SIM_DATA};
use progenitor_lib::pipeline::{
    Orchestrator, OrchestratorOptions, SubprocessRunner, TaskOutcome, TaskParams, TaskRegistry,
    TaskRunner, TaskSpec,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn runner() -> SubprocessRunner {
    SubprocessRunner::new(PathBuf::from(env!("CARGO_BIN_EXE_progenitor")))
}

/// Bytes under `dir`, including hidden partial files.
fn bytes_under(dir: &Path) -> u64 {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok()?.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

fn raw_data_spec() -> TaskSpec {
    TaskSpec::new(InitRawData::KIND, TaskParams::new().with("output", RAW_DATA))
}

#[tokio::test]
async fn test_child_task_publishes_and_reports_outcome() {
    let (_dir, store) = temp_store();
    let spec = raw_data_spec();
    let task = TaskRegistry::with_builtins().build(&spec).unwrap();

    let outcome = runner().run("raw", &spec, task, &store).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed);
    assert!(store.exists(RAW_DATA));
}

#[tokio::test]
async fn test_child_failure_carries_exit_status() {
    let (dir, store) = temp_store();
    let task = TaskRegistry::with_builtins().build(&raw_data_spec()).unwrap();
    let unknown = TaskSpec::new("no_such_task", TaskParams::new().with("output", RAW_DATA));

    let err = runner().run("raw", &unknown, task, &store).await.unwrap_err();
    match err {
        PipelineError::TaskFailed { task, reason } => {
            assert_eq!(task, "raw");
            assert!(reason.contains("exited with"), "{}", reason);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_timed_out_child_is_killed_before_publishing() {
    let (_dir, store) = temp_store();
    seed_sim_data(&store);
    let mut orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(runner()),
        OrchestratorOptions {
            timeout: Duration::from_millis(500),
            max_retries: 0,
            max_parallel: 1,
        },
    );
    orchestrator
        .add(
            "endless",
            TaskSpec::new(
                Simulation::KIND,
                TaskParams::new()
                    .with("input_sim_data", SIM_DATA)
                    .with("output_directory", "cell")
                    .with("seed", 1)
                    .with("max_steps", 1_000_000_000u64)
                    .with("division_enabled", false),
            ),
        )
        .unwrap();

    let started = Instant::now();
    let report = orchestrator.run().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].cause.contains("timed out"), "{}", report.failed[0].cause);

    // A surviving child would keep appending listener rows.
    let cell = store.resolve("cell");
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_kill = bytes_under(&cell);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(bytes_under(&cell), after_kill);
    assert!(!store.exists(format!("cell/{}", FINAL_STATE)));
    assert!(!store.exists(format!("cell/{}", LISTENER_RECORDS)));
}
