//! Batch orchestration: every selected record through every template.
//!
//! A run takes a snapshot of the session, checks its preconditions and then
//! processes (template, record) pairs with bounded parallelism. Each pair
//! gets its own temporary directory and its own result; a failing pair is
//! logged, counted and reported, and the rest of the run carries on. Only a
//! precondition failure, an overlapping run or a broken archive fail the run
//! as a whole.

pub mod archive;

pub use archive::{ArchiveBuilder, ARCHIVE_FILENAME};

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dataset::{normalize_record, Dataset, NormalizedRecord};
use crate::generators::renderer::render_document_with_scratch;
use crate::generators::validation::validate_preconditions;
use crate::generators::{
    output_filename, DocumentConverter, GeneratorError, LibreOfficeEngine, DOCX_EXTENSION,
    PDF_EXTENSION, PDF_FORMAT,
};
use crate::metrics;
use crate::session::{Session, Template};

const RENDERED_NAME: &str = "document.docx";

/// Run-level failures. Pair failures never show up here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Precondition(String),
    #[error("another generation run is already in progress")]
    RunInProgress,
    #[error("failed to assemble deliverable: {0}")]
    Aggregation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Preview,
    Package,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Preview => "preview",
            RunMode::Package => "package",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            RunMode::Preview => PDF_EXTENSION,
            RunMode::Package => DOCX_EXTENSION,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            RunMode::Preview => "preview(s)",
            RunMode::Package => "document(s)",
        }
    }
}

/// Everything a run reads from the session, copied out under the lock.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub dataset: Arc<Dataset>,
    pub templates: Vec<Template>,
    pub selection: Vec<usize>,
}

impl RunInput {
    pub fn from_session(session: &Session) -> Result<Self, RunError> {
        validate_preconditions(
            session.dataset().map(|d| d.len()).unwrap_or(0),
            session.templates().len(),
            session.selection().len(),
        )
        .map_err(RunError::Precondition)?;

        let dataset = session
            .dataset()
            .cloned()
            .ok_or_else(|| RunError::Precondition("No spreadsheet data loaded".to_string()))?;

        Ok(Self {
            dataset,
            templates: session.templates().to_vec(),
            selection: session.selection().to_vec(),
        })
    }
}

/// One pair that did not produce a document.
#[derive(Debug, Clone, Serialize)]
pub struct PairFailure {
    pub template: String,
    pub record_index: usize,
    pub filename: String,
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated: usize,
    pub failures: Vec<PairFailure>,
    pub status: String,
}

impl RunReport {
    fn new(run_id: Uuid, mode: RunMode, generated: usize, failures: Vec<PairFailure>) -> Self {
        let mut status = format!("Generated {} {}", generated, mode.noun());
        if !failures.is_empty() {
            status.push_str(&format!("; {} skipped due to errors", failures.len()));
        }
        Self {
            run_id,
            generated,
            failures,
            status,
        }
    }

    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// A successfully generated document, before aggregation.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub template: String,
    pub record_index: usize,
}

#[derive(Debug)]
pub struct PreviewRun {
    pub report: RunReport,
    pub previews: Vec<GeneratedDocument>,
}

#[derive(Debug)]
pub struct PackageRun {
    pub report: RunReport,
    pub archive: Vec<u8>,
    pub entries: Vec<String>,
}

struct PairJob {
    template: Template,
    record_index: usize,
    record: Arc<NormalizedRecord>,
}

pub struct BatchOrchestrator {
    converter: Arc<dyn DocumentConverter>,
    render_concurrency: usize,
    conversions: Semaphore,
    run_lock: Mutex<()>,
}

impl BatchOrchestrator {
    pub fn new(
        converter: Arc<dyn DocumentConverter>,
        render_concurrency: usize,
        conversion_concurrency: usize,
    ) -> Self {
        Self {
            converter,
            render_concurrency: render_concurrency.max(1),
            conversions: Semaphore::new(conversion_concurrency.max(1)),
            run_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let engine = LibreOfficeEngine::new(&config.libreoffice_path, config.conversion_timeout);
        Self::new(
            Arc::new(engine),
            config.render_concurrency,
            config.conversion_concurrency,
        )
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Render and convert every pair, keeping the converted bytes.
    pub async fn preview(&self, session: &RwLock<Session>) -> Result<PreviewRun, RunError> {
        let mode = RunMode::Preview;
        let _guard = self.acquire(mode)?;
        let input = snapshot(session, mode)?;
        let run_id = Uuid::new_v4();

        let (previews, failures) = self.generate(run_id, mode, &input).await;
        let report = self.finish(run_id, mode, previews.len(), failures);
        Ok(PreviewRun { report, previews })
    }

    /// Render every pair and pack the documents into one zip archive.
    pub async fn package(&self, session: &RwLock<Session>) -> Result<PackageRun, RunError> {
        let mode = RunMode::Package;
        let _guard = self.acquire(mode)?;
        let input = snapshot(session, mode)?;
        let run_id = Uuid::new_v4();

        let (documents, failures) = self.generate(run_id, mode, &input).await;

        let mut builder = ArchiveBuilder::new();
        let mut entries = Vec::with_capacity(documents.len());
        for document in &documents {
            let entry = builder
                .add(&document.filename, &document.bytes)
                .map_err(|e| self.aggregation_failed(run_id, mode, e))?;
            if entry != document.filename {
                log::warn!(
                    "[run {}] Duplicate filename {} stored as {}",
                    run_id,
                    document.filename,
                    entry
                );
            }
            entries.push(entry);
        }
        let archive = builder
            .finish()
            .map_err(|e| self.aggregation_failed(run_id, mode, e))?;

        let report = self.finish(run_id, mode, entries.len(), failures);
        Ok(PackageRun {
            report,
            archive,
            entries,
        })
    }

    fn acquire(&self, mode: RunMode) -> Result<tokio::sync::MutexGuard<'_, ()>, RunError> {
        self.run_lock.try_lock().map_err(|_| {
            log::warn!("Rejected {} run: another run is in progress", mode.as_str());
            metrics::RUNS.with_label_values(&[mode.as_str(), "busy"]).inc();
            RunError::RunInProgress
        })
    }

    async fn generate(
        &self,
        run_id: Uuid,
        mode: RunMode,
        input: &RunInput,
    ) -> (Vec<GeneratedDocument>, Vec<PairFailure>) {
        // Normalization depends on the record only, so each selected row is
        // normalized once and shared across templates.
        let records: Vec<(usize, Arc<NormalizedRecord>)> = input
            .selection
            .iter()
            .filter_map(|&index| {
                input
                    .dataset
                    .record(index)
                    .map(|record| (index, Arc::new(normalize_record(&record))))
            })
            .collect();

        let jobs: Vec<PairJob> = input
            .templates
            .iter()
            .flat_map(|template| {
                records.iter().map(move |(index, record)| PairJob {
                    template: template.clone(),
                    record_index: *index,
                    record: Arc::clone(record),
                })
            })
            .collect();

        log::info!(
            "[run {}] Starting {} run: {} template(s) x {} record(s)",
            run_id,
            mode.as_str(),
            input.templates.len(),
            records.len()
        );

        let outcomes: Vec<Result<GeneratedDocument, PairFailure>> = stream::iter(jobs)
            .map(|job| self.run_pair(run_id, mode, job))
            .buffered(self.render_concurrency)
            .collect()
            .await;

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(document) => documents.push(document),
                Err(failure) => failures.push(failure),
            }
        }
        (documents, failures)
    }

    async fn run_pair(
        &self,
        run_id: Uuid,
        mode: RunMode,
        job: PairJob,
    ) -> Result<GeneratedDocument, PairFailure> {
        let filename = output_filename(&job.template.naming_pattern, &job.record, mode.extension());

        match self.produce(mode, &job).await {
            Ok(bytes) => {
                log::debug!("[run {}] Generated {}", run_id, filename);
                Ok(GeneratedDocument {
                    filename,
                    bytes,
                    template: job.template.name,
                    record_index: job.record_index,
                })
            }
            Err(e) => {
                let category = e.category();
                log::warn!(
                    "[run {}] {} for template '{}' row {}: {}",
                    run_id,
                    category,
                    job.template.name,
                    job.record_index,
                    e
                );
                metrics::PAIR_FAILURES.with_label_values(&[category]).inc();
                Err(PairFailure {
                    template: job.template.name,
                    record_index: job.record_index,
                    filename,
                    category: category.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Render one pair inside its own temporary directory and return the
    /// deliverable bytes. The directory is removed when this returns or is
    /// dropped.
    async fn produce(&self, mode: RunMode, job: &PairJob) -> Result<Vec<u8>, GeneratorError> {
        let workdir = tempfile::Builder::new()
            .prefix("mailmerge-")
            .tempdir()
            .map_err(GeneratorError::TempDir)?;
        let rendered: PathBuf = workdir.path().join(RENDERED_NAME);

        let content = Arc::clone(&job.template.content);
        let record = Arc::clone(&job.record);
        let scratch = workdir.path().to_path_buf();
        let destination = rendered.clone();
        tokio::task::spawn_blocking(move || {
            render_document_with_scratch(&content, &record, &destination, &scratch)
        })
        .await
        .map_err(|e| GeneratorError::Task(e.to_string()))??;

        let artifact = match mode {
            RunMode::Package => rendered,
            RunMode::Preview => {
                let _permit = self
                    .conversions
                    .acquire()
                    .await
                    .map_err(|e| GeneratorError::Task(e.to_string()))?;
                self.converter.convert(&rendered, PDF_FORMAT).await?
            }
        };

        tokio::fs::read(&artifact)
            .await
            .map_err(GeneratorError::ReadArtifact)
    }

    fn finish(
        &self,
        run_id: Uuid,
        mode: RunMode,
        generated: usize,
        failures: Vec<PairFailure>,
    ) -> RunReport {
        let outcome = if failures.is_empty() { "success" } else { "partial" };
        metrics::DOCUMENTS_GENERATED
            .with_label_values(&[mode.as_str()])
            .inc_by(generated as u64);
        metrics::RUNS
            .with_label_values(&[mode.as_str(), outcome])
            .inc();

        let report = RunReport::new(run_id, mode, generated, failures);
        log::info!("[run {}] {}", run_id, report.status);
        report
    }

    fn aggregation_failed(&self, run_id: Uuid, mode: RunMode, reason: String) -> RunError {
        log::error!("[run {}] Archive construction failed: {}", run_id, reason);
        metrics::RUNS
            .with_label_values(&[mode.as_str(), "failed"])
            .inc();
        RunError::Aggregation(reason)
    }
}

fn snapshot(session: &RwLock<Session>, mode: RunMode) -> Result<RunInput, RunError> {
    let session = session.read();
    RunInput::from_session(&session).map_err(|e| {
        log::warn!("{} run not started: {}", mode.as_str(), e);
        metrics::RUNS
            .with_label_values(&[mode.as_str(), "precondition"])
            .inc();
        e
    })
}
