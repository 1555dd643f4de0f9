//! Worker task registry (SPEC_FULL.md §2.4): pure bookkeeping around
//! in-flight compiled-config tasks, with no gRPC or process dependency.
//!
//! Grounded on `internal/worker/task.go`'s `runTask`/`stopTask`/
//! `registerTaskCompletions`.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};

use crate::vm::CancelToken;

pub type TaskId = String;

struct RunningTask {
    cancel: CancelToken,
}

/// Tracks in-flight tasks by ID and drains a completion channel.
pub struct TaskRegistry {
    tasks: HashMap<TaskId, RunningTask>,
    completions_tx: Sender<TaskId>,
    completions_rx: Receiver<TaskId>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        Self { tasks: HashMap::new(), completions_tx: tx, completions_rx: rx }
    }

    /// Sender clone handed to a task runner so it can report completion via
    /// [`TaskRegistry::reap_completions`].
    pub fn completion_sender(&self) -> Sender<TaskId> {
        self.completions_tx.clone()
    }

    /// Registers `task_id` as running. Rejects (warns, no-ops) a duplicate
    /// submission, mirroring `runTask`'s early-return-on-duplicate.
    pub fn run(&mut self, task_id: TaskId, cancel: CancelToken) {
        if self.tasks.contains_key(&task_id) {
            tracing::warn!(task_id = %task_id, "task already running, ignoring duplicate submission");
            return;
        }
        tracing::info!(task_id = %task_id, "task started");
        self.tasks.insert(task_id, RunningTask { cancel });
    }

    /// Triggers cancellation for `task_id`, if known.
    pub fn stop(&self, task_id: &str) {
        if let Some(task) = self.tasks.get(task_id) {
            task.cancel.cancel();
            tracing::info!(task_id = %task_id, "sent cancellation signal");
        }
    }

    pub fn running_tasks(&self) -> Vec<TaskId> {
        self.tasks.keys().cloned().collect()
    }

    /// Non-blocking drain of the completion channel, mirroring
    /// `registerTaskCompletions`'s `select { ...; default: return }`.
    pub fn reap_completions(&mut self) {
        loop {
            match self.completions_rx.try_recv() {
                Ok(task_id) => {
                    if self.tasks.remove(&task_id).is_some() {
                        tracing::info!(task_id = %task_id, "task completed");
                    } else {
                        tracing::warn!(task_id = %task_id, "spurious task completion for unknown task");
                    }
                }
                Err(_) => return,
            }
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
