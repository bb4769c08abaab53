mod report;

pub use report::{
    RecordedOperations, RecordingReportCollector, ReportCollector, SummaryReportCollector,
};

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// One timed operation attempt. Created just before the operation starts and finished with the
/// outcome, so that every attempt yields exactly one sample whether it succeeded or failed.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    /// Create an already-finished record with a known duration. Used for samples that are not
    /// timed in place, such as the zero sample that boots a series.
    pub fn finished(operation_id: impl Into<String>, elapsed: Duration, is_error: bool) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: Some(elapsed),
            is_error,
        }
    }

    fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

/// Write-only sink for operation samples, shared by reference between every component that
/// measures anything. Construct one per session with [ReportConfig::init] and pass it around
/// explicitly, there is no global instance.
pub struct Reporter {
    collectors: Mutex<Vec<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    /// Finish `record` against the outcome of `response` and hand it to every collector.
    pub fn report_operation<T, E>(&self, mut record: OperationRecord, response: &Result<T, E>) {
        record.finish(response.is_err());
        self.add_operation(record);
    }

    pub fn add_operation(&self, record: OperationRecord) {
        let mut collectors = self.collectors.lock();
        for collector in collectors.iter_mut() {
            collector.add_operation(&record);
        }
    }

    /// Flush collectors at the end of a session. Safe to call once everything has stopped
    /// submitting; samples added afterwards are not guaranteed to be reported.
    pub fn finalize(&self) {
        let collectors = self.collectors.lock();
        for collector in collectors.iter() {
            collector.finalize();
        }
    }
}

/// Chooses which collectors a [Reporter] writes to.
#[derive(Default)]
pub struct ReportConfig {
    enable_summary: bool,
    recording: Option<RecordedOperations>,
}

impl ReportConfig {
    /// Print a table summarising all operations when the reporter is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    /// Keep every sample in memory, readable through the given handle. Useful in tests and while
    /// developing new workloads.
    pub fn enable_recording(mut self, records: RecordedOperations) -> Self {
        self.recording = Some(records);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.enable_summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }
        if let Some(records) = self.recording {
            collectors.push(Box::new(RecordingReportCollector::new(records)));
        }
        Reporter {
            collectors: Mutex::new(collectors),
        }
    }
}
