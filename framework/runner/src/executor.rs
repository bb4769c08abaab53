use crate::alliance::{AllianceManager, GameObserver};
use crate::ledger::{submit_measured, LedgerClient};
use crate::model::{GameTrx, Participant, ParticipantGroup, PlayerColor, Resource, TrxPayload};
use crate::pool::ParticipantPool;
use crate::script::{bulk_publish_script, trade_game_script, ScriptStep};
use squall_core::prelude::RunFaultError;
use squall_instruments::{OperationRecord, Reporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

/// Label for run-level operations: bootstrap, alliance creation and catastrophic faults.
pub(crate) const OP_OPERATIONS: &str = "operations";

/// What to do when one step's submission fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFailurePolicy {
    /// Log the failure, leave the step's response empty and carry on with the next step.
    Skip,
    /// Retry the same step index in place up to `attempts` times in total, then skip it.
    RetryInPlace { attempts: u32 },
}

impl StepFailurePolicy {
    fn attempts(&self) -> u32 {
        match self {
            StepFailurePolicy::Skip => 1,
            StepFailurePolicy::RetryInPlace { attempts } => (*attempts).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllianceConfig {
    /// How many terms each alliance stays active for.
    pub lifespan: u32,
    /// The id assigned to the alliance created at the checkpoint; its channel name is the run
    /// name with this id appended.
    pub base_id: u32,
}

impl Default for AllianceConfig {
    fn default() -> Self {
        Self {
            lifespan: 3,
            base_id: 10012,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Trading rounds per game script, after the join round.
    pub rounds: usize,
    pub step_policy: StepFailurePolicy,
    /// Alliance creation at the checkpoint after the join round, or None to run the plain script.
    pub alliance: Option<AllianceConfig>,
    /// Items for the bulk-publish script run after the game, zero to disable.
    pub bulk_items: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            step_policy: StepFailurePolicy::Skip,
            alliance: Some(AllianceConfig::default()),
            bulk_items: 0,
        }
    }
}

impl From<&crate::cli::SquallCli> for RunConfig {
    fn from(cli: &crate::cli::SquallCli) -> Self {
        Self {
            rounds: cli.rounds,
            step_policy: cli.step_policy,
            alliance: (!cli.no_alliance).then(|| AllianceConfig {
                lifespan: cli.alliance_lifespan,
                ..AllianceConfig::default()
            }),
            bulk_items: cli.bulk_items,
        }
    }
}

/// Executes one run end to end: bootstrap, scripted steps, alliance checkpoints, teardown.
pub struct RunExecutor {
    client: Arc<dyn LedgerClient>,
    reporter: Arc<Reporter>,
    alliances: AllianceManager,
    config: RunConfig,
}

impl RunExecutor {
    pub fn new(client: Arc<dyn LedgerClient>, reporter: Arc<Reporter>, config: RunConfig) -> Self {
        let alliances = AllianceManager::new(client.clone(), reporter.clone());
        Self {
            client,
            reporter,
            alliances,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one complete scripted workload against a freshly bootstrapped context.
    ///
    /// The leased group is returned to the pool as soon as its bootstrap attempt finishes,
    /// success or not; the rest of the run holds no shared resources. A [RunFaultError] anywhere
    /// below is recorded as a failed `operations` sample and surfaces as an ordinary error, it
    /// never takes the orchestrator down.
    pub async fn run(
        &self,
        run_name: &str,
        group: ParticipantGroup,
        pool: &ParticipantPool,
    ) -> anyhow::Result<()> {
        let result = self.run_inner(run_name, group, pool).await;

        if let Err(e) = &result {
            if e.is::<RunFaultError>() {
                self.reporter.add_operation(OperationRecord::finished(
                    OP_OPERATIONS,
                    Duration::ZERO,
                    true,
                ));
            }
        }

        result
    }

    async fn run_inner(
        &self,
        run_name: &str,
        group: ParticipantGroup,
        pool: &ParticipantPool,
    ) -> anyhow::Result<()> {
        let bootstrapped = self.bootstrap_measured(run_name, &group).await;
        // The group's bootstrap attempt is over either way, let the next run have it.
        pool.release(group);
        let participants = bootstrapped?;

        let script = trade_game_script(participants.len(), self.config.rounds);

        // Alliance creation runs concurrently with the rest of the script; only its result is
        // funnelled back here for aggregation.
        let (alliance_results, mut alliance_outcomes) =
            unbounded_channel::<anyhow::Result<Arc<GameObserver>>>();

        // The join round is the checkpoint: the alliance forms once everyone is in the game.
        // Derived from the script itself since not every participant necessarily joins.
        let joined = script
            .steps
            .iter()
            .take_while(|step| matches!(step.payload, TrxPayload::Game(GameTrx::Join { .. })))
            .count();
        let (joins, play) = script.steps.split_at(joined);

        let script_result: anyhow::Result<()> = async {
            self.run_steps(run_name, script.label, joins, &participants)
                .await?;

            if let Some(alliance_config) = &self.config.alliance {
                if joined >= 2 {
                    self.spawn_alliance_creation(
                        run_name,
                        alliance_config,
                        &participants[..joined],
                        alliance_results.clone(),
                    );
                }
            }

            self.run_steps(run_name, script.label, play, &participants)
                .await?;

            if self.config.bulk_items > 0 {
                let bulk = bulk_publish_script(self.config.bulk_items, participants.len());
                self.run_steps(run_name, bulk.label, &bulk.steps, &participants)
                    .await?;
            }

            Ok(())
        }
        .await;

        // Everything below runs whether the script succeeded or not: alliance creation may
        // already be in flight and the participants' handles must always be released.
        drop(alliance_results);
        let mut alliance_error = None;
        while let Some(outcome) = alliance_outcomes.recv().await {
            match outcome {
                Ok(observer) => {
                    log::debug!("Alliance {} created for run {run_name}", observer.name())
                }
                Err(e) => {
                    // Fatal to that alliance only; the script still ran as far as it could. The
                    // caller still learns about it through the run outcome.
                    log::error!("Alliance creation failed for run {run_name}: {e:?}");
                    alliance_error = Some(e);
                }
            }
        }

        // Observers must have stopped submitting before the run's handles are released.
        for participant in &participants {
            participant.shutdown_observers();
        }
        for observer in participants.iter().flat_map(|p| p.observers()) {
            observer.wait_terminated().await;
        }

        log::info!("Finished running {run_name}");
        self.client.teardown_run(&participants).await;

        script_result?;
        match alliance_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Execute a chunk of steps strictly in order. A step submission failure is handled per the
    /// configured policy and never aborts the chunk; only payload encoding or a script that does
    /// not fit the bootstrapped participants is fatal.
    async fn run_steps(
        &self,
        run_name: &str,
        label: &str,
        steps: &[ScriptStep],
        participants: &[Arc<Participant>],
    ) -> anyhow::Result<()> {
        for (index, step) in steps.iter().enumerate() {
            let actor = participants.get(step.actor).ok_or_else(|| {
                anyhow::Error::new(RunFaultError::new(format!(
                    "script step {index} references actor {} but the run has {} participants",
                    step.actor,
                    participants.len()
                )))
            })?;

            log::debug!("Executing script step {:?} as {}", step.payload, actor.label());
            let payload = step.payload.to_bytes()?;

            let mut submitted = false;
            for attempt in 1..=self.config.step_policy.attempts() {
                match submit_measured(
                    self.client.as_ref(),
                    &self.reporter,
                    actor,
                    run_name,
                    label,
                    payload.clone(),
                )
                .await
                {
                    Ok(_response) => {
                        submitted = true;
                        break;
                    }
                    Err(e) => {
                        log::warn!(
                            "Step {index} of {run_name} failed on attempt {attempt}: {e:?}"
                        );
                    }
                }
            }

            if !submitted {
                // Response stays empty and the script carries on.
                continue;
            }

            if let Some(event) = step.payload.completion_event() {
                actor.notify_observers(&event);
            }
        }

        Ok(())
    }

    /// `joined` holds exactly the participants that joined the game, in join order.
    fn spawn_alliance_creation(
        &self,
        run_name: &str,
        config: &AllianceConfig,
        joined: &[Arc<Participant>],
        results: tokio::sync::mpsc::UnboundedSender<anyhow::Result<Arc<GameObserver>>>,
    ) {
        // The last two joined players ally, matching the trade term below.
        let first = joined.len() - 2;
        let allies = [joined[first].clone(), joined[first + 1].clone()];
        let terms = alliance_terms(joined.len());

        let manager = self.alliances.clone();
        let run_name = run_name.to_string();
        let alliance_id = config.base_id;
        let lifespan = config.lifespan;
        tokio::spawn(async move {
            let outcome = manager
                .create_measured(&run_name, alliance_id, allies, terms, lifespan)
                .await;
            if results.send(outcome).is_err() {
                log::warn!("Run {run_name} stopped listening for alliance outcomes");
            }
        });
    }

    async fn bootstrap_measured(
        &self,
        run_name: &str,
        group: &ParticipantGroup,
    ) -> anyhow::Result<Vec<Arc<Participant>>> {
        // Boot the series with a zero sample so the first real measurement has a baseline.
        self.reporter.add_operation(OperationRecord::finished(
            OP_OPERATIONS,
            Duration::ZERO,
            false,
        ));

        let record = OperationRecord::new(OP_OPERATIONS);
        let result = self.client.bootstrap_run(run_name, group.labels()).await;
        self.reporter.report_operation(record, &result);
        result
    }
}

/// The terms the allied pair commits to: a single trade between the two ally colors. Players
/// join with colors in a fixed order, so the last two joined players hold these colors.
fn alliance_terms(joined: usize) -> Vec<GameTrx> {
    let colors = [PlayerColor::Red, PlayerColor::Green, PlayerColor::Blue];
    let n = joined.min(colors.len());
    vec![GameTrx::Trade {
        from: colors[n - 2],
        to: colors[n - 1],
        resource: Resource::Forest,
        amount: 3,
    }]
}
