use std::sync::Mutex;

use crate::builder::{DiagnosticLevel, DiagnosticSink};
use crate::types::SourcePosition;

/// One report received by [`RecordingDiagnostics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: DiagnosticLevel,
    pub position: SourcePosition,
    pub message: String,
}

/// [`DiagnosticSink`] keeping every report in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<Report>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn levels(&self) -> Vec<DiagnosticLevel> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|report| report.level)
            .collect()
    }

    /// Number of reports at `level`.
    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|report| report.level == level)
            .count()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&self, level: DiagnosticLevel, position: SourcePosition, message: &str) {
        self.reports.lock().unwrap().push(Report {
            level,
            position,
            message: message.to_owned(),
        });
    }
}
