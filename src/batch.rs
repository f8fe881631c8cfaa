//! Batch orchestration.
//!
//! Drives each query file through execute → delimited export → optional
//! spreadsheet formatting, strictly one job at a time.
//!
//! Output base names:
//! - single file: `{output_file}{timestamp}`
//! - folder: `{output_file}_{stem}{timestamp}`; stems equal ignoring case
//!   get `_2`, `_3`, ... so artifacts never collide on case-insensitive
//!   filesystems.
//!
//! The timestamp suffix is computed once per run. By default the first
//! failing job stops the batch; with `continue_on_error` every job runs and
//! failures are collected in the report.

use crate::config::ExportConfig;
use crate::db::QueryExecutor;
use crate::error::{Result, SqlSheetError};
use crate::export::{
    ArtifactKind, ExportArtifact, ExportFormat, SpreadsheetFormatter, TabularExporter,
};
use crate::source::{QueryFile, QuerySource};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info, warn};

/// One query file paired with the base name of its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub file: QueryFile,
    pub base_name: String,
}

/// Formats the run timestamp as `_yyyyMMdd_HHmmss`.
pub fn timestamp_suffix(at: DateTime<Local>) -> String {
    at.format("_%Y%m%d_%H%M%S").to_string()
}

/// Assigns output base names to the discovered files.
pub fn plan_jobs(
    files: Vec<QueryFile>,
    folder_mode: bool,
    output_file: &str,
    suffix: &str,
) -> Vec<QueryJob> {
    if !folder_mode {
        return files
            .into_iter()
            .map(|file| QueryJob {
                file,
                base_name: format!("{output_file}{suffix}"),
            })
            .collect();
    }

    let mut taken: HashSet<String> = HashSet::new();
    files
        .into_iter()
        .map(|file| {
            let wanted = format!("{output_file}_{}", file.stem());
            let mut candidate = wanted.clone();
            let mut n = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{wanted}_{n}");
                n += 1;
            }
            if candidate != wanted {
                warn!(
                    "{}: output name '{}' already used, writing '{}' instead",
                    file.identifier(),
                    wanted,
                    candidate
                );
            }
            QueryJob {
                file,
                base_name: format!("{candidate}{suffix}"),
            }
        })
        .collect()
}

/// Final state of one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Succeeded { artifact: ExportArtifact, rows: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// Query file name.
    pub file: String,
    pub base_name: String,
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded { .. })
    }
}

/// Per-job results of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    /// Jobs not started because an earlier job failed.
    pub skipped: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when no job failed. A run without jobs is a success.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped == 0
    }

    /// Artifacts produced by successful jobs.
    pub fn artifacts(&self) -> Vec<&ExportArtifact> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                JobStatus::Succeeded { artifact, .. } => Some(artifact),
                JobStatus::Failed { .. } => None,
            })
            .collect()
    }
}

/// Runs every job of a batch against one executor.
pub struct BatchOrchestrator<'a> {
    executor: &'a dyn QueryExecutor,
    config: &'a ExportConfig,
    exporter: TabularExporter,
    formatter: SpreadsheetFormatter,
    started_at: DateTime<Local>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(executor: &'a dyn QueryExecutor, config: &'a ExportConfig) -> Self {
        Self {
            executor,
            config,
            exporter: TabularExporter::new(config.encoding),
            formatter: SpreadsheetFormatter::new(config.encoding, config.keep_intermediate),
            started_at: Local::now(),
        }
    }

    /// Overrides the run start time used for the timestamp suffix.
    pub fn with_start_time(mut self, at: DateTime<Local>) -> Self {
        self.started_at = at;
        self
    }

    /// Runs the batch.
    ///
    /// Errors before the first job (missing input, output directory) are
    /// returned as `Err`. Job failures are logged and recorded in the report.
    pub async fn run(&self, source: &QuerySource) -> Result<BatchReport> {
        let suffix = if self.config.append_timestamp {
            timestamp_suffix(self.started_at)
        } else {
            String::new()
        };

        let files = source.discover()?;
        if files.is_empty() {
            warn!("No .{} files found, nothing to do", source.extension());
            return Ok(BatchReport::default());
        }

        ensure_output_dir(&self.config.output_dir)?;

        let jobs = plan_jobs(
            files,
            source.input().is_folder(),
            &self.config.output_file,
            &suffix,
        );
        let total = jobs.len();
        let mut report = BatchReport::default();

        for (index, job) in jobs.into_iter().enumerate() {
            let file = job.file.identifier();
            info!("[{}/{}] {}", index + 1, total, file);

            let status = match self.run_job(&job).await {
                Ok((artifact, rows)) => {
                    info!("{}: wrote {} ({} rows)", file, artifact.path.display(), rows);
                    JobStatus::Succeeded { artifact, rows }
                }
                Err(e) => {
                    error!("{}: {}: {}", file, e.category(), e);
                    JobStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            let failed = matches!(status, JobStatus::Failed { .. });
            report.outcomes.push(JobOutcome {
                file,
                base_name: job.base_name,
                status,
            });

            if failed && !self.config.continue_on_error {
                report.skipped = total - index - 1;
                if report.skipped > 0 {
                    warn!("Aborting batch, {} jobs not started", report.skipped);
                }
                break;
            }
        }

        info!(
            "Finished: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped
        );

        Ok(report)
    }

    async fn run_job(&self, job: &QueryJob) -> Result<(ExportArtifact, usize)> {
        let file = job.file.identifier();
        let sql = job.file.read_text()?;

        let result = self.executor.execute(&file, &sql).await?;
        let rows = result.row_count();

        let csv = ExportArtifact::in_dir(
            &self.config.output_dir,
            &job.base_name,
            ArtifactKind::DelimitedText,
        );
        let csv = self.exporter.export(&result, &csv.path)?;

        match self.config.format {
            ExportFormat::Delimited => Ok((csv, rows)),
            ExportFormat::Spreadsheet => {
                let xlsx = ExportArtifact::in_dir(
                    &self.config.output_dir,
                    &job.base_name,
                    ArtifactKind::Spreadsheet,
                );
                let artifact = self.formatter.format(
                    &csv.path,
                    &xlsx.path,
                    self.config.sheet_name.as_deref(),
                )?;
                Ok((artifact, rows))
            }
        }
    }
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| SqlSheetError::directory(format!("{}: {e}", dir.display())))
}
