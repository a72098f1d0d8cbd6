//! Per-source outcome tracking for aggregate requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a source ended within one aggregate request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SourceStatus {
    Ok,
    /// The source exceeded its deadline and contributed nothing.
    TimedOut,
    /// The source failed and contributed nothing.
    Failed { message: String },
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Record of a single source run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub count: usize,
    pub elapsed_ms: u64,
}

/// Reports of every source of one aggregate request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationDiagnostics {
    pub reports: Vec<SourceReport>,
}

impl AggregationDiagnostics {
    pub fn push(&mut self, report: SourceReport) {
        self.reports.push(report);
    }

    /// Source name to event count, zero for failed or timed-out sources.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.reports
            .iter()
            .map(|report| (report.source.clone(), report.count))
            .collect()
    }

    pub fn get(&self, source: &str) -> Option<&SourceReport> {
        self.reports.iter().find(|report| report.source == source)
    }

    pub fn degraded(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|report| !report.status.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let report = SourceReport {
            source: "agenda".to_string(),
            status: SourceStatus::Failed {
                message: "HTTP 503".to_string(),
            },
            count: 0,
            elapsed_ms: 120,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "HTTP 503");
        assert_eq!(json["elapsedMs"], 120);

        let ok = serde_json::to_value(SourceReport {
            status: SourceStatus::TimedOut,
            ..report
        })
        .unwrap();
        assert_eq!(ok["status"], "timedOut");
    }

    #[test]
    fn test_counts_and_degraded() {
        let mut diagnostics = AggregationDiagnostics::default();
        diagnostics.push(SourceReport {
            source: "spatial".to_string(),
            status: SourceStatus::Ok,
            count: 12,
            elapsed_ms: 40,
        });
        diagnostics.push(SourceReport {
            source: "agenda".to_string(),
            status: SourceStatus::TimedOut,
            count: 0,
            elapsed_ms: 25_000,
        });

        let counts = diagnostics.counts();
        assert_eq!(counts["spatial"], 12);
        assert_eq!(counts["agenda"], 0);
        assert_eq!(diagnostics.degraded().count(), 1);
    }
}
