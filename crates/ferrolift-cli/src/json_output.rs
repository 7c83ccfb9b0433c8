//! JSON output structures for the ferrolift CLI

use chrono::{DateTime, Utc};
use ferrolift_engine::UnitReport;
use ferrolift_types::TransferStats;
use serde::{Deserialize, Serialize};

/// Machine-readable summary of one command
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummaryJson {
    /// ferrolift version
    pub version: String,
    /// Subcommand that ran
    pub command: String,
    /// When the command started
    pub started_at: DateTime<Utc>,
    /// One entry per unit
    pub units: Vec<UnitReportJson>,
    /// Sum over every unit
    pub totals: TransferStats,
    /// Whether every file was moved
    pub success: bool,
}

/// Summary of one unit
#[derive(Debug, Serialize, Deserialize)]
pub struct UnitReportJson {
    /// Unit name
    pub name: String,
    /// Unit kind
    pub kind: String,
    /// Files dispatched by the scanner
    pub files_found: u64,
    /// Transfer counters
    pub stats: TransferStats,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

impl From<&UnitReport> for UnitReportJson {
    fn from(report: &UnitReport) -> Self {
        Self {
            name: report.unit.clone(),
            kind: report.kind.to_string(),
            files_found: report.files_found,
            stats: report.stats.clone(),
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RunSummaryJson {
    /// Build a summary from unit reports
    pub fn new(command: &str, started_at: DateTime<Utc>, reports: &[UnitReport]) -> Self {
        let mut totals = TransferStats::new();
        for report in reports {
            totals.merge(&report.stats);
        }
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            command: command.to_string(),
            started_at,
            units: reports.iter().map(UnitReportJson::from).collect(),
            success: totals.files_failed == 0,
            totals,
        }
    }
}
