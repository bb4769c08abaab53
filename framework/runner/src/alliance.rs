use crate::executor::OP_OPERATIONS;
use crate::ledger::{submit_measured, LedgerClient};
use crate::model::{
    collection_id, AllianceAck, AllianceInit, AllianceState, AllianceTrx, GamePhase, GameTrx,
    Participant, TrxCompleted,
};
use anyhow::Context;
use squall_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use squall_instruments::{OperationRecord, Reporter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub(crate) const OP_ALLIANCE: &str = "alliance";

/// How long the observer loop idles before polling again when nothing has arrived.
const OBSERVER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The listener registered on both allies of one alliance.
///
/// Single use and monotonically terminating: once `is_terminated` returns true no further
/// notification is forwarded or consumed, and no further transaction is issued on the alliance
/// channel.
pub struct GameObserver {
    name: String,
    id: u32,
    notifications: UnboundedSender<TrxCompleted>,
    shutdown: ShutdownHandle,
    done: ShutdownHandle,
    terminated: AtomicBool,
}

impl GameObserver {
    /// The alliance channel this observer submits on.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Queue a completed main-script step for this observer. The queue is unbounded so no event
    /// is ever lost while the observer lives; returns false once the observer has terminated.
    pub fn notify(&self, event: TrxCompleted) -> bool {
        if self.is_terminated() {
            return false;
        }
        match self.notifications.send(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Observer {} dropped a notification: {e}", self.name);
                false
            }
        }
    }

    /// Signal the observer loop to stop. Cooperative: a loop blocked on an in-flight submission
    /// sees the signal at its next poll.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Wait for the observer loop to exit. Returns immediately if it already has. The loop holds
    /// no transaction in flight once this returns, so the run's handles are safe to release.
    pub async fn wait_terminated(&self) {
        let mut done = self.done.new_listener();
        done.wait_for_shutdown().await;
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.done.shutdown();
    }
}

impl std::fmt::Debug for GameObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObserver")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Creates alliances between pairs of participants and runs their observer loops.
#[derive(Clone)]
pub struct AllianceManager {
    client: Arc<dyn LedgerClient>,
    reporter: Arc<Reporter>,
}

impl AllianceManager {
    pub fn new(client: Arc<dyn LedgerClient>, reporter: Arc<Reporter>) -> Self {
        Self { client, reporter }
    }

    /// [AllianceManager::create] wrapped in an `operations` sample covering the whole creation.
    pub async fn create_measured(
        &self,
        run_name: &str,
        alliance_id: u32,
        allies: [Arc<Participant>; 2],
        terms: Vec<GameTrx>,
        lifespan: u32,
    ) -> anyhow::Result<Arc<GameObserver>> {
        let record = OperationRecord::new(OP_OPERATIONS);
        let result = self
            .create(run_name, alliance_id, allies, terms, lifespan)
            .await;
        self.reporter.report_operation(record, &result);
        result
    }

    /// Create one alliance: deploy its side channel, submit the INIT transaction carrying the
    /// lifespan and term list, then register an observer on both allies and start its loop.
    ///
    /// Any failure before the observer starts aborts creation; the observer is never started on
    /// a partially-initialised alliance.
    pub async fn create(
        &self,
        run_name: &str,
        alliance_id: u32,
        allies: [Arc<Participant>; 2],
        terms: Vec<GameTrx>,
        lifespan: u32,
    ) -> anyhow::Result<Arc<GameObserver>> {
        let alliance_name = format!("{run_name}{alliance_id}");
        log::info!(
            "Creating alliance {alliance_name} between {} and {}",
            allies[0].label(),
            allies[1].label()
        );

        self.client
            .deploy_side_channel(&allies, &alliance_name)
            .await
            .context("failed to deploy alliance side channel")?;

        let collection = collection_id(allies[0].label(), allies[1].label());
        let ally_labels: Vec<String> = allies.iter().map(|a| a.label().to_string()).collect();
        let init = AllianceTrx::Init {
            init: AllianceInit {
                lifespan,
                start_phase: GamePhase::Trade,
                terms,
                contract_id: alliance_id,
            },
            collection_id: collection.clone(),
            allies: ally_labels.clone(),
        };

        submit_measured(
            self.client.as_ref(),
            &self.reporter,
            &allies[0],
            &alliance_name,
            OP_ALLIANCE,
            serde_json::to_vec(&init)?,
        )
        .await
        .context("alliance INIT transaction failed")?;

        let (notifications, queue) = unbounded_channel();
        let shutdown = ShutdownHandle::new();
        let observer = Arc::new(GameObserver {
            name: alliance_name,
            id: alliance_id,
            notifications,
            shutdown: shutdown.clone(),
            done: ShutdownHandle::new(),
            terminated: AtomicBool::new(false),
        });

        for ally in &allies {
            ally.register_observer(observer.clone());
        }

        let event_loop = ObserverLoop {
            observer: observer.clone(),
            allies,
            collection,
            ally_labels,
            client: self.client.clone(),
            reporter: self.reporter.clone(),
            queue,
            shutdown: shutdown.new_listener(),
        };
        tokio::spawn(event_loop.run());

        Ok(observer)
    }
}

/// The per-alliance event loop. Owns the alliance state exclusively; at most one INVOKE is in
/// flight per alliance because the loop processes notifications one at a time.
struct ObserverLoop {
    observer: Arc<GameObserver>,
    allies: [Arc<Participant>; 2],
    collection: String,
    ally_labels: Vec<String>,
    client: Arc<dyn LedgerClient>,
    reporter: Arc<Reporter>,
    queue: UnboundedReceiver<TrxCompleted>,
    shutdown: DelegatedShutdownListener,
}

impl ObserverLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.wait_for_shutdown() => {
                    log::info!("Observer {} received shutdown, terminating", self.observer.name());
                    break;
                }
                event = self.queue.recv() => {
                    let Some(event) = event else {
                        // Every notifier is gone, nothing left to observe.
                        break;
                    };
                    match self.process(event).await {
                        Ok(AllianceState::Active) => {}
                        Ok(state) => {
                            log::info!(
                                "Alliance {} reached state {state:?}, ending observer loop",
                                self.observer.name()
                            );
                            break;
                        }
                        Err(e) => {
                            log::error!(
                                "Observer {} failed to process a notification: {e:?}",
                                self.observer.name()
                            );
                            self.reporter.add_operation(OperationRecord::finished(
                                OP_OPERATIONS,
                                Duration::ZERO,
                                true,
                            ));
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(OBSERVER_POLL_INTERVAL) => {
                    log::trace!("Observer {} idle, polling again", self.observer.name());
                }
            }
        }

        self.observer.terminate();
    }

    /// Submit one INVOKE tagged with this observer's id and return the alliance state the
    /// contract reports back.
    async fn process(&self, mut event: TrxCompleted) -> anyhow::Result<AllianceState> {
        log::debug!(
            "Observer {} processing completed step {:?}",
            self.observer.name(),
            event.completed
        );

        event.observer_id = self.observer.id();
        let trx = AllianceTrx::Invoke {
            completed: event,
            collection_id: self.collection.clone(),
            allies: self.ally_labels.clone(),
        };

        let response = submit_measured(
            self.client.as_ref(),
            &self.reporter,
            &self.allies[0],
            self.observer.name(),
            OP_ALLIANCE,
            serde_json::to_vec(&trx)?,
        )
        .await?;

        let ack: AllianceAck = serde_json::from_slice(&response)
            .with_context(|| format!("failed to decode alliance response: {response:?}"))?;
        Ok(ack.state)
    }
}
