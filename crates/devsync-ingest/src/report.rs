//! Run aggregation and process exit status

use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::vendor::VendorTag;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_USAGE: u8 = 1;
pub const EXIT_FAILURE: u8 = 255;

/// What one parsed archive produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveResult {
    pub reference: String,
    pub vendor: String,
    /// Storage keys of persisted entries, in decode order
    pub stored: Vec<String>,
    /// Entries that could not be persisted
    pub failed: usize,
    /// Decode failure that cut the archive short
    pub error: Option<String>,
}

impl ArchiveResult {
    pub fn new(reference: impl Into<String>, vendor: VendorTag) -> Self {
        Self {
            reference: reference.into(),
            vendor: vendor.to_string(),
            stored: Vec::new(),
            failed: 0,
            error: None,
        }
    }

    pub fn persisted(&self) -> usize {
        self.stored.len()
    }
}

/// Per-archive outcome, in task order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Ingested(ArchiveResult),
    /// No vendor tag matched; the reference is reported unparsed
    PassThrough { reference: String },
}

impl ArchiveOutcome {
    pub fn reference(&self) -> &str {
        match self {
            ArchiveOutcome::Ingested(result) => &result.reference,
            ArchiveOutcome::PassThrough { reference } => reference,
        }
    }

    pub fn persisted(&self) -> usize {
        match self {
            ArchiveOutcome::Ingested(result) => result.persisted(),
            ArchiveOutcome::PassThrough { .. } => 0,
        }
    }
}

/// Everything a task run produced
#[derive(Debug)]
pub struct RunReport {
    /// Correlates the log lines of one run
    pub run_id: Uuid,
    pub task_id: String,
    pub archives: Vec<ArchiveOutcome>,
    pub error: Option<SyncError>,
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        exit_code(self.error.as_ref())
    }

    pub fn total_persisted(&self) -> usize {
        self.archives.iter().map(ArchiveOutcome::persisted).sum()
    }

    /// Log the per-archive counts and the summary, returning the exit status.
    pub fn report(&self) -> u8 {
        let _span = info_span!("report", run_id = %self.run_id, task_id = %self.task_id).entered();
        report(self.error.as_ref(), &self.archives)
    }
}

pub fn exit_code(error: Option<&SyncError>) -> u8 {
    match error {
        Some(_) => EXIT_FAILURE,
        None => EXIT_SUCCESS,
    }
}

pub fn report(error: Option<&SyncError>, archives: &[ArchiveOutcome]) -> u8 {
    for (index, outcome) in archives.iter().enumerate() {
        let index = index + 1;
        match outcome {
            ArchiveOutcome::Ingested(result) => {
                info!(
                    archive = %result.reference,
                    vendor = %result.vendor,
                    failed = result.failed,
                    "File[{}] ingested [{}] records",
                    index,
                    result.persisted()
                );
                if let Some(err) = &result.error {
                    warn!(archive = %result.reference, error = %err, "File[{}] stopped early", index);
                }
            },
            ArchiveOutcome::PassThrough { reference } => {
                info!(archive = %reference, "File[{}] passed through unparsed", index);
            },
        }
    }

    let persisted: usize = archives.iter().map(ArchiveOutcome::persisted).sum();
    match error {
        Some(err) => error!(error = %err, archives = archives.len(), persisted, "Sync failed"),
        None => info!(archives = archives.len(), persisted, "Sync complete"),
    }

    exit_code(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;

    fn ingested(reference: &str, stored: usize) -> ArchiveOutcome {
        let mut result = ArchiveResult::new(reference, VendorTag::Dexcom);
        result.stored = (0..stored).map(|i| format!("key{}", i)).collect();
        ArchiveOutcome::Ingested(result)
    }

    #[test]
    fn test_success_exit_code() {
        let archives = vec![ingested("/tmp/a_dexcom", 0), ingested("/tmp/b_dexcom", 10)];
        assert_eq!(report(None, &archives), EXIT_SUCCESS);
    }

    #[test]
    fn test_task_error_exit_code() {
        let err = SyncError::TaskLookup(TaskError::NotFound("t1".to_string()));
        assert_eq!(report(Some(&err), &[]), EXIT_FAILURE);
    }

    #[test]
    fn test_totals() {
        let report = RunReport {
            run_id: Uuid::nil(),
            task_id: "t1".to_string(),
            archives: vec![
                ingested("/tmp/a_dexcom", 3),
                ArchiveOutcome::PassThrough {
                    reference: "/tmp/notes.txt".to_string(),
                },
                ingested("/tmp/b_dexcom", 4),
            ],
            error: None,
        };

        assert_eq!(report.total_persisted(), 7);
        assert_eq!(report.archives[1].reference(), "/tmp/notes.txt");
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let value = serde_json::to_value(ArchiveOutcome::PassThrough {
            reference: "/tmp/notes.txt".to_string(),
        })
        .unwrap();
        assert_eq!(value["outcome"], "pass_through");
        assert_eq!(value["reference"], "/tmp/notes.txt");
    }
}
