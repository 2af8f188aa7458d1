//! Where a task actually executes.

use super::task::{Task, TaskOutcome, TaskSpec};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use progenitor_io::{from_json, to_json, ArtifactStore, CloseOnDrop, PublishGate};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs one task to completion. Dropping the returned future must stop
    /// waiting for it; runners that can kill the work do so.
    async fn run(
        &self,
        label: &str,
        spec: &TaskSpec,
        task: Arc<dyn Task>,
        store: &ArtifactStore,
    ) -> Result<TaskOutcome>;
}

/// Runs each task on its own worker thread.
///
/// A thread cannot be killed, so when the orchestrator stops waiting (a
/// timeout) the attempt's publish gate is closed instead: the worker may run
/// on, but none of its artifacts become visible. The thread is detached and
/// does not hold up runtime shutdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessRunner;

#[async_trait]
impl TaskRunner for InProcessRunner {
    async fn run(
        &self,
        label: &str,
        _spec: &TaskSpec,
        task: Arc<dyn Task>,
        store: &ArtifactStore,
    ) -> Result<TaskOutcome> {
        let gate = PublishGate::new();
        let _cancel = CloseOnDrop(gate.clone());
        let store = store.clone().with_gate(gate);
        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::Builder::new()
            .name(format!("task-{}", label))
            .spawn(move || {
                let _ = tx.send(task.run(&store));
            })
            .map_err(|e| PipelineError::task_failed(label, format!("cannot start worker: {}", e)))?;
        rx.await
            .map_err(|_| PipelineError::task_failed(label, "worker panicked"))?
    }
}

/// Runs every task in a child `progenitor task` process, killed when the
/// orchestrator stops waiting for it.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    program: PathBuf,
}

impl SubprocessRunner {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Re-invokes the running executable.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| PipelineError::task_failed("runner", format!("cannot locate executable: {}", e)))?;
        Ok(Self::new(program))
    }
}

#[async_trait]
impl TaskRunner for SubprocessRunner {
    async fn run(
        &self,
        label: &str,
        spec: &TaskSpec,
        _task: Arc<dyn Task>,
        store: &ArtifactStore,
    ) -> Result<TaskOutcome> {
        let params = to_json(&spec.params).map_err(|e| PipelineError::task_failed(label, e.to_string()))?;
        let output = tokio::process::Command::new(&self.program)
            .arg("--store")
            .arg(store.root())
            .arg("task")
            .arg(&spec.task)
            .arg("--params")
            .arg(params)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::task_failed(label, format!("spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(PipelineError::task_failed(
                label,
                format!("exited with {}: {}", output.status, last.trim()),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        from_json(line)
            .map_err(|e| PipelineError::task_failed(label, format!("unreadable outcome '{}': {}", line, e)))
    }
}
