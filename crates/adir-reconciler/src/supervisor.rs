//! The reconciler supervisor: owns one `tokio::task` per enabled [`Task`],
//! each looping `run` → sleep-until-next-interval measured from
//! completion, never overlapping itself. A pool of independent periodic
//! jobs, each driven by its own `tokio::select!` between its sleep timer
//! and a shutdown signal, rather than one shared event loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cancel::CancellationToken;
use crate::error::ReconcileError;

/// Shared handles every task's `run` gets access to, so a task never
/// needs bespoke wiring beyond implementing this one trait.
pub struct TaskCtx {
    pub cancellation: CancellationToken,
}

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    fn enabled(&self) -> bool {
        true
    }
    async fn run(&self, ctx: &TaskCtx) -> Result<(), ReconcileError>;
}

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

pub struct Supervisor {
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn one task loop per enabled entry in `tasks`.
    pub fn start(tasks: Vec<Arc<dyn Task>>) -> Self {
        let cancellation = CancellationToken::new();
        let ctx = Arc::new(TaskCtx { cancellation: cancellation.clone() });

        let handles = tasks
            .into_iter()
            .filter(|task| {
                if !task.enabled() {
                    info!(task = task.name(), "task disabled, not scheduling");
                }
                task.enabled()
            })
            .map(|task| {
                let ctx = ctx.clone();
                tokio::spawn(async move { run_loop(task, ctx).await })
            })
            .collect();

        Self { cancellation, handles }
    }

    /// Cancel every task and wait up to [`SHUTDOWN_BUDGET`] for them to
    /// notice and return. Tasks still running past the budget are left
    /// to finish in the background — the process is expected to exit
    /// shortly after this returns regardless.
    pub async fn stop(self) {
        self.cancellation.cancel();
        let join_all = futures::future::join_all(self.handles);
        if tokio::time::timeout(SHUTDOWN_BUDGET, join_all).await.is_err() {
            warn!("reconciler shutdown budget exceeded, some tasks may still be running");
        }
    }
}

async fn run_loop(task: Arc<dyn Task>, ctx: Arc<TaskCtx>) {
    info!(task = task.name(), interval = ?task.interval(), "starting reconciler task");
    loop {
        tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                info!(task = task.name(), "reconciler task cancelled");
                return;
            }
            result = task.run(&ctx) => {
                if let Err(e) = result {
                    error!(task = task.name(), error = %e, "reconciler task run failed, continuing on next interval");
                }
            }
        }

        tokio::select! {
            _ = ctx.cancellation.cancelled() => {
                info!(task = task.name(), "reconciler task cancelled during sleep");
                return;
            }
            _ = tokio::time::sleep(task.interval()) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }
        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }
        async fn run(&self, _ctx: &TaskCtx) -> Result<(), ReconcileError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct DisabledTask;

    #[async_trait]
    impl Task for DisabledTask {
        fn name(&self) -> &str {
            "disabled"
        }
        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }
        fn enabled(&self) -> bool {
            false
        }
        async fn run(&self, _ctx: &TaskCtx) -> Result<(), ReconcileError> {
            panic!("disabled task must never run");
        }
    }

    #[tokio::test]
    async fn runs_enabled_tasks_repeatedly_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = Arc::new(CountingTask { runs: runs.clone() });
        let supervisor = Supervisor::start(vec![task, Arc::new(DisabledTask)]);
        tokio::time::sleep(Duration::from_millis(55)).await;
        supervisor.stop().await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
