use crate::executor::RunExecutor;
use crate::model::ParticipantGroup;
use crate::pool::ParticipantPool;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

/// The result of one run in a batch.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_name: String,
    pub result: anyhow::Result<()>,
}

/// Drives batches of concurrent runs, throttled by participant group availability.
pub struct Orchestrator {
    executor: Arc<RunExecutor>,
}

impl Orchestrator {
    pub fn new(executor: Arc<RunExecutor>) -> Self {
        Self { executor }
    }

    /// Run `count` runs named `{prefix}{index}`, leasing one participant group per run.
    ///
    /// Each iteration waits for a group before spawning the next run, so concurrency is bounded
    /// by the catalog rather than a fixed worker count; because groups are released right after
    /// bootstrap, more than `groups.len()` runs can be in flight at once. The batch completes
    /// once exactly `count` outcomes have been collected, in whatever order runs finish, and a
    /// failed run never short-circuits the rest.
    pub async fn run_batch(
        &self,
        prefix: &str,
        count: usize,
        groups: Vec<ParticipantGroup>,
    ) -> anyhow::Result<Vec<RunOutcome>> {
        if groups.is_empty() && count > 0 {
            anyhow::bail!("cannot run a batch with an empty participant group catalog");
        }

        log::info!(
            "Starting batch {prefix} with {count} runs over {} participant groups",
            groups.len()
        );

        let pool = Arc::new(ParticipantPool::new(groups));
        let (outcomes_tx, mut outcomes_rx) = unbounded_channel();

        for index in 0..count {
            let group = pool.lease().await;
            let run_name = format!("{prefix}{}", index + 1);

            let executor = self.executor.clone();
            let pool = pool.clone();
            let outcomes_tx = outcomes_tx.clone();
            tokio::spawn(async move {
                log::info!("Starting run {run_name}");
                let result = executor.run(&run_name, group, &pool).await;
                if let Err(e) = &result {
                    log::error!("Run {run_name} failed: {e:?}");
                }
                if outcomes_tx.send(RunOutcome { run_name, result }).is_err() {
                    log::warn!("Batch stopped collecting before all runs finished");
                }
            });
        }
        drop(outcomes_tx);

        let mut outcomes = Vec::with_capacity(count);
        while let Some(outcome) = outcomes_rx.recv().await {
            log::info!(
                "Run {} finished: {}",
                outcome.run_name,
                if outcome.result.is_ok() { "ok" } else { "failed" }
            );
            outcomes.push(outcome);
        }

        log::info!(
            "Batch {prefix} complete: {}/{count} runs succeeded",
            outcomes.iter().filter(|o| o.result.is_ok()).count()
        );

        Ok(outcomes)
    }
}
