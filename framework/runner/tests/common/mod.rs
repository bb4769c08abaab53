#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use squall_core::prelude::RunFaultError;
use squall_instruments::{RecordedOperations, ReportConfig, Reporter};
use squall_runner::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub fn recording_reporter() -> (Arc<Reporter>, RecordedOperations) {
    let records = RecordedOperations::default();
    let reporter = Arc::new(
        ReportConfig::default()
            .enable_recording(records.clone())
            .init(),
    );
    (reporter, records)
}

pub fn group(labels: &[&str]) -> ParticipantGroup {
    ParticipantGroup::new(labels.iter().copied())
}

/// Poll until `check` passes or the deadline expires.
pub async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[derive(Default)]
struct MockState {
    fail_bootstrap_runs: HashSet<String>,
    fault_bootstrap_runs: HashSet<String>,
    fail_submissions: HashSet<usize>,
    fail_alliance_init: bool,
    alliance_invoke_delay: Option<Duration>,
    alliance_acks: VecDeque<AllianceState>,
    submissions_per_channel: HashMap<String, usize>,
    alliance_inits: usize,
    alliance_invokes: usize,
    side_channels: Vec<String>,
    ally_pairs: Vec<Vec<String>>,
    teardowns: usize,
    events: Vec<&'static str>,
    bootstraps_in_flight: usize,
    max_bootstraps_in_flight: usize,
}

/// A scriptable stand-in for the real ledger collaborator.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the bootstrap of the named run with an ordinary error.
    pub fn fail_bootstrap(self: &Arc<Self>, run_name: &str) -> Arc<Self> {
        self.state
            .lock()
            .fail_bootstrap_runs
            .insert(run_name.to_string());
        self.clone()
    }

    /// Fail the bootstrap of the named run with an unrecoverable run fault.
    pub fn fault_bootstrap(self: &Arc<Self>, run_name: &str) -> Arc<Self> {
        self.state
            .lock()
            .fault_bootstrap_runs
            .insert(run_name.to_string());
        self.clone()
    }

    /// Fail the nth submission (0-based, counted per channel) on every channel.
    pub fn fail_submission(self: &Arc<Self>, index: usize) -> Arc<Self> {
        self.state.lock().fail_submissions.insert(index);
        self.clone()
    }

    pub fn fail_alliance_init(self: &Arc<Self>) -> Arc<Self> {
        self.state.lock().fail_alliance_init = true;
        self.clone()
    }

    /// Hold every alliance INVOKE submission open for `delay` before acknowledging it, so an
    /// observer can be caught mid-submission.
    pub fn delay_alliance_invokes(self: &Arc<Self>, delay: Duration) -> Arc<Self> {
        self.state.lock().alliance_invoke_delay = Some(delay);
        self.clone()
    }

    /// Script the alliance states returned for successive INVOKE submissions. Once exhausted,
    /// further invokes report `Active`.
    pub fn with_alliance_acks(self: &Arc<Self>, acks: &[AllianceState]) -> Arc<Self> {
        self.state.lock().alliance_acks = acks.iter().copied().collect();
        self.clone()
    }

    pub fn alliance_inits(&self) -> usize {
        self.state.lock().alliance_inits
    }

    pub fn alliance_invokes(&self) -> usize {
        self.state.lock().alliance_invokes
    }

    pub fn side_channels(&self) -> Vec<String> {
        self.state.lock().side_channels.clone()
    }

    /// The ally labels passed to each side channel deploy, in deploy order.
    pub fn ally_pairs(&self) -> Vec<Vec<String>> {
        self.state.lock().ally_pairs.clone()
    }

    pub fn teardowns(&self) -> usize {
        self.state.lock().teardowns
    }

    /// Alliance submissions and teardowns in the order they completed.
    pub fn events(&self) -> Vec<&'static str> {
        self.state.lock().events.clone()
    }

    pub fn max_bootstraps_in_flight(&self) -> usize {
        self.state.lock().max_bootstraps_in_flight
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn bootstrap_run(
        &self,
        run_name: &str,
        participant_labels: &[String],
    ) -> anyhow::Result<Vec<Arc<Participant>>> {
        {
            let mut state = self.state.lock();
            if state.fail_bootstrap_runs.contains(run_name) {
                anyhow::bail!("bootstrap failed for {run_name}");
            }
            if state.fault_bootstrap_runs.contains(run_name) {
                return Err(anyhow::Error::new(RunFaultError::new(format!(
                    "bootstrap fault for {run_name}"
                ))));
            }
            state.bootstraps_in_flight += 1;
            state.max_bootstraps_in_flight =
                state.max_bootstraps_in_flight.max(state.bootstraps_in_flight);
        }

        // Long enough for concurrent bootstraps to overlap.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.state.lock().bootstraps_in_flight -= 1;

        Ok(participant_labels
            .iter()
            .map(|label| Arc::new(Participant::new(label, format!("{label}MSP.peer"))))
            .collect())
    }

    async fn submit_transaction(
        &self,
        _participant: &Participant,
        channel_name: &str,
        payload: Vec<u8>,
    ) -> anyhow::Result<Vec<u8>> {
        if let Ok(trx) = serde_json::from_slice::<AllianceTrx>(&payload) {
            return match trx {
                AllianceTrx::Init { .. } => {
                    let mut state = self.state.lock();
                    if state.fail_alliance_init {
                        anyhow::bail!("alliance INIT rejected");
                    }
                    state.alliance_inits += 1;
                    state.events.push("alliance_init");
                    Ok(serde_json::to_vec(&AllianceAck {
                        state: AllianceState::Created,
                    })?)
                }
                AllianceTrx::Invoke { .. } => {
                    let delay = self.state.lock().alliance_invoke_delay;
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    let mut state = self.state.lock();
                    state.alliance_invokes += 1;
                    state.events.push("alliance_invoke");
                    let ack_state = state
                        .alliance_acks
                        .pop_front()
                        .unwrap_or(AllianceState::Active);
                    Ok(serde_json::to_vec(&AllianceAck { state: ack_state })?)
                }
            };
        }

        let mut state = self.state.lock();
        let index = *state
            .submissions_per_channel
            .entry(channel_name.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(0);
        if state.fail_submissions.contains(&index) {
            anyhow::bail!("submission {index} on {channel_name} rejected");
        }
        Ok(Vec::new())
    }

    async fn deploy_side_channel(
        &self,
        allies: &[Arc<Participant>],
        channel_name_hint: &str,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.side_channels.push(channel_name_hint.to_string());
        state
            .ally_pairs
            .push(allies.iter().map(|a| a.label().to_string()).collect());
        Ok(())
    }

    async fn teardown_run(&self, _participants: &[Arc<Participant>]) {
        let mut state = self.state.lock();
        state.teardowns += 1;
        state.events.push("teardown");
    }
}
