//! Batch extraction over many documents.
//!
//! Each document is one independent task: read the file, extract, assemble.
//! At most `min(max_workers, n)` tasks are in flight; each runs on the
//! blocking pool under a timeout. Failures of any kind become records with
//! `error` set, so one bad document never aborts the batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::extract::{FieldExtractionEngine, ResultAssembler};
use crate::models::config::BatchConfig;
use crate::models::record::{ExtractedRecord, Field};
use crate::source::DocumentSource;

/// Sample file names kept per missing field.
pub const MAX_MISSING_SAMPLES: usize = 10;

/// Cooperative cancellation, checked before each document is submitted.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop submitting documents. In-flight documents still finish.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reported once per finished document.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub record: &'a ExtractedRecord,
}

/// Per-field NOT_FOUND counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingSummary {
    counts: BTreeMap<Field, usize>,
    samples: BTreeMap<Field, Vec<String>>,
}

impl MissingSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ExtractedRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            for field in record.missing_fields() {
                *summary.counts.entry(field).or_default() += 1;
                let samples = summary.samples.entry(field).or_default();
                if samples.len() < MAX_MISSING_SAMPLES {
                    samples.push(record.source_file().to_string());
                }
            }
        }
        summary
    }

    pub fn count(&self, field: Field) -> usize {
        self.counts.get(&field).copied().unwrap_or(0)
    }

    pub fn samples(&self, field: Field) -> &[String] {
        self.samples.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fields with at least one miss, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, usize, &[String])> {
        Field::ALL
            .into_iter()
            .filter(|f| self.count(*f) > 0)
            .map(|f| (f, self.count(f), self.samples(f)))
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Records of every submitted document, in input order.
    pub records: Vec<ExtractedRecord>,
    pub missing: MissingSummary,
    /// Documents never submitted because the stop signal was raised.
    pub cancelled: usize,
    pub timed_out: usize,
}

/// Runs the extraction engine over many documents.
pub struct BatchRunner {
    engine: Arc<FieldExtractionEngine>,
    source: Arc<dyn DocumentSource>,
    max_workers: usize,
    timeout: Duration,
    stop: StopSignal,
}

struct TaskResult {
    index: usize,
    record: ExtractedRecord,
    timed_out: bool,
}

impl BatchRunner {
    pub fn new(engine: Arc<FieldExtractionEngine>, source: Arc<dyn DocumentSource>, config: &BatchConfig) -> Self {
        Self {
            engine,
            source,
            max_workers: config.max_workers.max(1),
            timeout: Duration::from_secs(config.task_timeout_secs),
            stop: StopSignal::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Process every path; returns after all submitted documents finish or time out.
    pub async fn run<F>(&self, paths: Vec<PathBuf>, mut on_progress: F) -> BatchReport
    where
        F: FnMut(Progress<'_>),
    {
        let total = paths.len();
        let workers = self.max_workers.min(total).max(1);
        info!("Processing {} documents with {} workers", total, workers);

        let mut slots: Vec<Option<ExtractedRecord>> = vec![None; total];
        let mut submitted: Vec<String> = Vec::with_capacity(total);
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut completed = 0;
        let mut timed_out = 0;
        let mut cancelled = 0;

        let mut settle = |joined: Result<TaskResult, JoinError>, slots: &mut Vec<Option<ExtractedRecord>>| {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    // Slot is filled after the drain.
                    warn!("Batch task failed: {}", err);
                    return;
                }
            };
            completed += 1;
            timed_out += usize::from(result.timed_out);
            on_progress(Progress {
                completed,
                total,
                record: &result.record,
            });
            if let Some(slot) = slots.get_mut(result.index) {
                *slot = Some(result.record);
            }
        };

        for (index, path) in paths.into_iter().enumerate() {
            while tasks.len() >= workers {
                if let Some(joined) = tasks.join_next().await {
                    settle(joined, &mut slots);
                }
            }

            if self.stop.is_stopped() {
                cancelled = total - index;
                info!("Stop requested, {} documents not submitted", cancelled);
                break;
            }

            let name = file_name(&path);
            submitted.push(name.clone());
            let engine = Arc::clone(&self.engine);
            let source = Arc::clone(&self.source);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let job_name = name.clone();
                let job = tokio::task::spawn_blocking(move || {
                    process_document(source.as_ref(), &engine, &path, &job_name)
                });

                match tokio::time::timeout(timeout, job).await {
                    Ok(Ok(record)) => TaskResult {
                        index,
                        record,
                        timed_out: false,
                    },
                    Ok(Err(err)) => {
                        warn!("Extraction of {} panicked: {}", name, err);
                        TaskResult {
                            index,
                            record: ResultAssembler::unavailable(name, format!("extraction panicked: {}", err)),
                            timed_out: false,
                        }
                    }
                    Err(_) => {
                        warn!("Extraction of {} timed out after {:?}", name, timeout);
                        TaskResult {
                            index,
                            record: ResultAssembler::unavailable(
                                name,
                                format!("timed out after {}s", timeout.as_secs_f64()),
                            ),
                            timed_out: true,
                        }
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            settle(joined, &mut slots);
        }

        for (slot, name) in slots.iter_mut().zip(submitted) {
            if slot.is_none() {
                *slot = Some(ResultAssembler::unavailable(name, "batch task failed"));
            }
        }

        let records: Vec<ExtractedRecord> = slots.into_iter().flatten().collect();
        let missing = MissingSummary::from_records(&records);
        info!(
            "Batch finished: {} records, {} timed out, {} cancelled",
            records.len(),
            timed_out,
            cancelled
        );

        BatchReport {
            records,
            missing,
            cancelled,
            timed_out,
        }
    }
}

/// Read and extract one document. Unreadable input becomes an error record.
pub fn process_document(
    source: &dyn DocumentSource,
    engine: &FieldExtractionEngine,
    path: &Path,
    name: &str,
) -> ExtractedRecord {
    match source.read(path) {
        Ok(doc) => {
            debug!("{}: {} chars from {:?}", name, doc.text.len(), doc.origin);
            engine.classify_and_extract(&doc.text, name)
        }
        Err(e) => {
            warn!("Could not read {}: {}", name, e);
            ResultAssembler::unavailable(name, e.to_string())
        }
    }
}

/// Name recorded in the `SourceFile` column.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CuponError, Result};
    use crate::models::config::CuponConfig;
    use crate::source::{RawDocument, TextOrigin};
    use pretty_assertions::assert_eq;

    /// In-memory documents keyed by file name; `slow` sleeps, `boom` panics.
    struct FakeSource;

    impl DocumentSource for FakeSource {
        fn read(&self, path: &Path) -> Result<RawDocument> {
            let name = file_name(path);
            let text = match name.as_str() {
                "missing.pdf" => return Err(CuponError::NoText("zero pages".to_string())),
                "boom.pdf" => panic!("recognizer crashed"),
                "slow.pdf" => {
                    std::thread::sleep(Duration::from_millis(400));
                    "Contrato: 111111".to_string()
                }
                other => format!("Contrato: {}\nValor a pagar: $20.000", other.trim_end_matches(".pdf")),
            };
            Ok(RawDocument {
                text,
                origin: TextOrigin::Plain,
            })
        }
    }

    fn runner(workers: usize) -> BatchRunner {
        let config = CuponConfig::default();
        let engine = Arc::new(FieldExtractionEngine::new(&config).unwrap());
        let batch = BatchConfig {
            max_workers: workers,
            ..BatchConfig::default()
        };
        BatchRunner::new(engine, Arc::new(FakeSource), &batch)
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("in").join(n)).collect()
    }

    #[tokio::test]
    async fn test_records_in_input_order() {
        let mut seen = 0;
        let report = runner(3)
            .run(paths(&["300001.pdf", "missing.pdf", "300003.pdf", "300004.pdf"]), |p| {
                seen += 1;
                assert_eq!(p.total, 4);
            })
            .await;

        assert_eq!(seen, 4);
        let names: Vec<&str> = report.records.iter().map(|r| r.source_file()).collect();
        assert_eq!(names, vec!["300001.pdf", "missing.pdf", "300003.pdf", "300004.pdf"]);
        assert_eq!(report.records[0].get(Field::Contract).as_deref(), Some("300001"));
        assert_eq!(report.records[1].error(), Some("no text available: zero pages"));
        assert_eq!(report.records[1].missing_fields(), Field::ALL.to_vec());
        assert_eq!(report.missing.count(Field::Contract), 1);
        assert_eq!(report.missing.samples(Field::Contract), ["missing.pdf".to_string()]);
        assert_eq!(report.cancelled, 0);
    }

    #[tokio::test]
    async fn test_timeout_becomes_record() {
        let report = runner(2)
            .with_timeout(Duration::from_millis(50))
            .run(paths(&["slow.pdf", "300002.pdf"]), |_| {})
            .await;

        assert_eq!(report.timed_out, 1);
        assert_eq!(report.records.len(), 2);
        assert!(report.records[0].error().unwrap_or_default().starts_with("timed out"));
        assert_eq!(report.records[1].get(Field::Contract).as_deref(), Some("300002"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let report = runner(2).run(paths(&["boom.pdf", "300002.pdf"]), |_| {}).await;
        assert!(report.records[0].error().unwrap_or_default().contains("panicked"));
        assert_eq!(report.records[1].error(), None);
    }

    #[tokio::test]
    async fn test_stop_signal_halts_submission() {
        let runner = runner(1);
        let stop = runner.stop_signal();
        let report = runner
            .run(paths(&["300001.pdf", "300002.pdf", "300003.pdf"]), |_| stop.stop())
            .await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.cancelled, 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = runner(4).run(Vec::new(), |_| {}).await;
        assert!(report.records.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_missing_samples_capped() {
        let records: Vec<ExtractedRecord> = (0..15)
            .map(|i| ResultAssembler::unavailable(format!("{}.pdf", i), "unreadable"))
            .collect();
        let summary = MissingSummary::from_records(&records);
        assert_eq!(summary.count(Field::Client), 15);
        assert_eq!(summary.samples(Field::Client).len(), MAX_MISSING_SAMPLES);
        assert_eq!(summary.iter().count(), Field::ALL.len());
    }
}
