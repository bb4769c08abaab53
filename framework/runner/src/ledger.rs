use crate::model::Participant;
use crate::types::SquallResult;
use async_trait::async_trait;
use squall_instruments::{OperationRecord, Reporter};
use std::sync::Arc;

/// The narrow seam between the orchestration engine and the ledger it drives.
///
/// Everything behind this trait is an external collaborator: channel and contract bootstrap,
/// endorsement policies, submission retries. The engine only ever submits payload bytes and
/// reads response bytes back.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Establish a shared execution context for the given participant labels and return
    /// ready-to-use participant handles, including any contract deployment the main workload
    /// needs.
    async fn bootstrap_run(
        &self,
        run_name: &str,
        participant_labels: &[String],
    ) -> SquallResult<Vec<Arc<Participant>>>;

    /// Submit one transaction on `channel_name`, blocking until it is acknowledged.
    async fn submit_transaction(
        &self,
        participant: &Participant,
        channel_name: &str,
        payload: Vec<u8>,
    ) -> SquallResult<Vec<u8>>;

    /// Create and activate a side channel scoped to exactly the given allies.
    async fn deploy_side_channel(
        &self,
        allies: &[Arc<Participant>],
        channel_name_hint: &str,
    ) -> SquallResult<()>;

    /// Release all handles held for a run. Best effort.
    async fn teardown_run(&self, participants: &[Arc<Participant>]);
}

/// Submit one transaction and record exactly one sample for the attempt, with the failed flag
/// matching the outcome.
pub(crate) async fn submit_measured(
    client: &dyn LedgerClient,
    reporter: &Reporter,
    participant: &Participant,
    channel_name: &str,
    label: &str,
    payload: Vec<u8>,
) -> anyhow::Result<Vec<u8>> {
    let record = OperationRecord::new(label);
    let response = client
        .submit_transaction(participant, channel_name, payload)
        .await;
    reporter.report_operation(record, &response);
    response
}
