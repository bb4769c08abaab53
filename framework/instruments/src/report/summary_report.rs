use crate::report::ReportCollector;
use crate::OperationRecord;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Operation")]
    operation_id: String,
    #[tabled(rename = "Failed")]
    failed: bool,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Total (ms)")]
    total_ms: f64,
    #[tabled(rename = "Avg (ms)")]
    avg_ms: f64,
    #[tabled(rename = "Min (ms)")]
    min_ms: f64,
    #[tabled(rename = "Max (ms)")]
    max_ms: f64,
}

/// Prints a per-operation latency table when the session finishes, split by outcome so that
/// failed submissions never skew the success latencies.
pub struct SummaryReportCollector {
    operation_records: Vec<OperationRecord>,
}

impl Default for SummaryReportCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self {
            operation_records: Vec::new(),
        }
    }

    fn print_summary_of_operations(&self) {
        let mut grouped: BTreeMap<(String, bool), Vec<&OperationRecord>> = BTreeMap::new();
        for record in &self.operation_records {
            grouped
                .entry((record.operation_id().to_string(), record.is_error()))
                .or_default()
                .push(record);
        }

        let rows = grouped
            .into_iter()
            .map(|((operation_id, failed), records)| {
                let micros: Vec<u128> = records
                    .iter()
                    .filter_map(|record| record.elapsed())
                    .map(|elapsed| elapsed.as_micros())
                    .collect();
                let total: u128 = micros.iter().sum();
                let count = records.len();

                OperationRow {
                    operation_id,
                    failed,
                    count,
                    total_ms: total as f64 / 1000.0,
                    avg_ms: (total as f64 / count.max(1) as f64) / 1000.0,
                    min_ms: micros.iter().min().copied().unwrap_or(0) as f64 / 1000.0,
                    max_ms: micros.iter().max().copied().unwrap_or(0) as f64 / 1000.0,
                }
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("\nSummary of operations");
        println!("{table}");
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}
