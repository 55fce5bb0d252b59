use std::path::Path;

use csv::Writer;
use log::info;
use serde::Serialize;

use crate::batch::job::BatchOutcome;
use crate::batch::spec::FileTask;
use crate::{FailureKind, Result};

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    source: String,
    output: String,
    status: &'static str,
    stage: &'a str,
    error: &'a str,
}

impl<'a> ReportRow<'a> {
    fn new(task: &FileTask, status: &'static str, failure: Option<&'a FailureKind>) -> Self {
        Self {
            source: task.source_path.display().to_string(),
            output: task.derived_output_path.display().to_string(),
            status,
            stage: failure.map_or("", FailureKind::stage),
            error: failure.map_or("", FailureKind::message),
        }
    }
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// One CSV row per enumerated file, in enumeration order.
    pub fn write_batch_report(
        &self,
        outcome: &BatchOutcome,
        output_path: impl AsRef<Path>,
    ) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        let mut rows: Vec<(usize, ReportRow)> = Vec::with_capacity(outcome.total);
        for task in &outcome.succeeded {
            rows.push((task.index, ReportRow::new(task, "success", None)));
        }
        for (task, kind) in &outcome.failed {
            rows.push((task.index, ReportRow::new(task, "failed", Some(kind))));
        }
        for task in &outcome.skipped {
            rows.push((task.index, ReportRow::new(task, "skipped", None)));
        }
        rows.sort_by_key(|(index, _)| *index);

        for (_, row) in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("Report generated: {}", output_path_ref.display());
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
