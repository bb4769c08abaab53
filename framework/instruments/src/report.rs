mod recording_report;
mod summary_report;

pub use recording_report::{RecordedOperations, RecordingReportCollector};
pub use summary_report::SummaryReportCollector;

use crate::OperationRecord;

/// A destination for operation samples. Collectors must tolerate samples arriving from many
/// concurrent submitters; the [crate::Reporter] serialises calls into each collector.
pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn finalize(&self);
}
