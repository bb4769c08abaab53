use crate::report::ReportCollector;
use crate::OperationRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle onto the samples captured by a [RecordingReportCollector].
///
/// Clone it before building the reporter, then read samples back out while or after the session
/// runs.
#[derive(Default, Clone)]
pub struct RecordedOperations {
    records: Arc<Mutex<Vec<OperationRecord>>>,
}

impl RecordedOperations {
    pub fn all(&self) -> Vec<OperationRecord> {
        self.records.lock().clone()
    }

    pub fn count(&self, operation_id: &str, is_error: bool) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|record| record.operation_id() == operation_id && record.is_error() == is_error)
            .count()
    }

    fn push(&self, record: OperationRecord) {
        self.records.lock().push(record);
    }
}

/// Keeps every sample in memory. Intended for tests and workload development rather than long
/// soak sessions.
pub struct RecordingReportCollector {
    records: RecordedOperations,
}

impl RecordingReportCollector {
    pub fn new(records: RecordedOperations) -> Self {
        Self { records }
    }
}

impl ReportCollector for RecordingReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.records.push(operation_record.clone());
    }

    fn finalize(&self) {
        log::debug!("Recorded {} operation samples", self.records.all().len());
    }
}
