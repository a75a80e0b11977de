//! Sweep scheduling: expanding a multi-dataset spec into jobs and running
//! them with isolated failure handling.
//!
//! Jobs run strictly sequentially. Each one carries its own
//! [`GenerationConfig`](longeval_core::GenerationConfig) into the backend
//! call, so nothing mutable is shared across job boundaries; the sequential
//! order is about predictable resource use, not correctness.

use crate::dataset::DatasetProvider;
use crate::job::Job;
use crate::report::score_path;
use crate::runner::{run_job, EvalError, EvalOptions};
use async_trait::async_trait;
use longeval_core::ModelBackend;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors in the sweep specification itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SweepError {
    /// Parallel lists have incompatible lengths
    #[error("Mismatched sweep lists: {0}")]
    Mismatched(String),
}

/// A multi-dataset, multi-length sweep specification.
///
/// The parallel lists are zipped index-by-index into one job each. A
/// single-element length list broadcasts to every dataset.
#[derive(Debug, Clone, Default)]
pub struct SweepSpec {
    pub datasets: Vec<String>,
    pub test_files: Vec<PathBuf>,
    pub demo_files: Vec<PathBuf>,
    pub input_max_lengths: Vec<usize>,
    pub generation_max_lengths: Vec<usize>,
    /// When set, only jobs whose input length is in this set are kept
    pub seq_len_filter: Option<Vec<usize>>,
}

impl SweepSpec {
    /// Expand the spec into concrete jobs.
    ///
    /// `template` supplies the parameters shared by every job (tag, shots,
    /// sampling, chat-template and thinking flags); the per-index fields
    /// are overwritten from the lists.
    pub fn expand(&self, template: &Job) -> Result<Vec<Job>, SweepError> {
        if self.test_files.len() != self.demo_files.len() {
            return Err(SweepError::Mismatched(format!(
                "{} test files but {} demo files",
                self.test_files.len(),
                self.demo_files.len()
            )));
        }
        if self.datasets.len() != self.test_files.len() {
            return Err(SweepError::Mismatched(format!(
                "{} datasets but {} test files",
                self.datasets.len(),
                self.test_files.len()
            )));
        }
        let input_lengths = broadcast(&self.input_max_lengths, self.datasets.len(), "input")?;
        let gen_lengths = broadcast(
            &self.generation_max_lengths,
            self.datasets.len(),
            "generation",
        )?;

        let mut jobs = Vec::with_capacity(self.datasets.len());
        for (idx, dataset) in self.datasets.iter().enumerate() {
            let input_max_length = input_lengths[idx];
            if let Some(filter) = &self.seq_len_filter {
                if !filter.contains(&input_max_length) {
                    continue;
                }
            }
            let mut job = template.clone();
            job.dataset = dataset.clone();
            job.test_file = self.test_files[idx].clone();
            job.demo_file = self.demo_files[idx].clone();
            job.input_max_length = input_max_length;
            job.generation_max_length = gen_lengths[idx];
            jobs.push(job);
        }
        Ok(jobs)
    }
}

fn broadcast(lengths: &[usize], n: usize, what: &str) -> Result<Vec<usize>, SweepError> {
    match lengths.len() {
        1 => Ok(vec![lengths[0]; n]),
        len if len == n => Ok(lengths.to_vec()),
        len => Err(SweepError::Mismatched(format!(
            "{len} {what} lengths for {n} datasets"
        ))),
    }
}

/// External citation-quality evaluator for the alce dataset family.
///
/// Owns that family's scores file: it reads the persisted report and
/// writes `<report>.score` itself.
#[async_trait]
pub trait CitationEvaluator: Send + Sync {
    /// Evaluate the report at `report_path`.
    ///
    /// `citations` is false for the family's `nocite` variants.
    async fn evaluate(&self, report_path: &Path, citations: bool) -> Result<(), EvalError>;
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepSummary {
    /// Report paths of jobs that completed (or were skipped as complete)
    pub completed: Vec<PathBuf>,
    /// Datasets of jobs that failed
    pub failed: Vec<String>,
}

/// Run a queue of jobs sequentially with per-job failure isolation.
///
/// A failing job is logged with its dataset context and the sweep moves
/// on; in debug mode the error propagates immediately so it can be
/// inspected. `on_progress` is called with (finished, total) after every
/// job.
pub async fn run_sweep<F>(
    jobs: &[Job],
    backend: &dyn ModelBackend,
    provider: &dyn DatasetProvider,
    citation: Option<&dyn CitationEvaluator>,
    options: &EvalOptions,
    on_progress: F,
) -> Result<SweepSummary, EvalError>
where
    F: Fn(usize, usize),
{
    log::info!("Total eval tasks: {}", jobs.len());
    let mut summary = SweepSummary::default();

    for (idx, job) in jobs.iter().enumerate() {
        match run_one(job, backend, provider, citation, options).await {
            Ok(path) => summary.completed.push(path),
            Err(e) if options.debug => return Err(e),
            Err(e) => {
                log::error!("Error in {}: {e}, continuing...", job.dataset);
                summary.failed.push(job.dataset.clone());
            }
        }
        on_progress(idx + 1, jobs.len());
    }

    Ok(summary)
}

async fn run_one(
    job: &Job,
    backend: &dyn ModelBackend,
    provider: &dyn DatasetProvider,
    citation: Option<&dyn CitationEvaluator>,
    options: &EvalOptions,
) -> Result<PathBuf, EvalError> {
    let path = run_job(job, backend, provider, options).await?;

    if job.dataset.contains("alce") && !options.count_tokens {
        let scores = score_path(&path);
        if !scores.exists() || options.overwrite {
            let Some(citation) = citation else {
                log::warn!(
                    "{} needs the citation evaluator but none is configured",
                    job.dataset
                );
                return Ok(path);
            };
            log::info!("running citation evaluation for {}...", job.dataset);
            citation
                .evaluate(&path, !job.dataset.contains("nocite"))
                .await?;
        }
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(datasets: &[&str], input_lengths: &[usize]) -> SweepSpec {
        SweepSpec {
            datasets: datasets.iter().map(|s| s.to_string()).collect(),
            test_files: datasets.iter().map(|s| format!("{s}.json").into()).collect(),
            demo_files: datasets.iter().map(|s| format!("{s}_demo.json").into()).collect(),
            input_max_lengths: input_lengths.to_vec(),
            generation_max_lengths: vec![100],
            seq_len_filter: None,
        }
    }

    fn template() -> Job {
        Job::new("placeholder", "v1", "x", "y").with_shots(2)
    }

    #[test]
    fn test_expand_zips_by_index() {
        let jobs = spec(&["nqa", "qasper"], &[8192, 16384])
            .expand(&template())
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].dataset, "nqa");
        assert_eq!(jobs[0].input_max_length, 8192);
        assert_eq!(jobs[0].test_file, PathBuf::from("nqa.json"));
        assert_eq!(jobs[1].dataset, "qasper");
        assert_eq!(jobs[1].input_max_length, 16384);
        // Template parameters carry over.
        assert_eq!(jobs[0].tag, "v1");
        assert_eq!(jobs[0].shots, 2);
    }

    #[test]
    fn test_expand_broadcasts_single_length() {
        let jobs = spec(&["a", "b", "c"], &[8192]).expand(&template()).unwrap();
        assert!(jobs.iter().all(|j| j.input_max_length == 8192));
        assert!(jobs.iter().all(|j| j.generation_max_length == 100));
    }

    #[test]
    fn test_expand_rejects_mismatched_lengths() {
        let err = spec(&["a", "b", "c"], &[8192, 16384])
            .expand(&template())
            .unwrap_err();
        assert!(matches!(err, SweepError::Mismatched(_)));
    }

    #[test]
    fn test_expand_rejects_mismatched_files() {
        let mut s = spec(&["a", "b"], &[8192]);
        s.demo_files.pop();
        let err = s.expand(&template()).unwrap_err();
        assert!(matches!(err, SweepError::Mismatched(_)));
    }

    #[test]
    fn test_seq_len_filter_drops_jobs() {
        let mut s = spec(&["a", "b", "c"], &[8192, 16384, 32768]);
        s.seq_len_filter = Some(vec![8192, 32768]);

        let jobs = s.expand(&template()).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].dataset, "a");
        assert_eq!(jobs[1].dataset, "c");
    }

    #[test]
    fn test_empty_filter_drops_everything() {
        let mut s = spec(&["a", "b"], &[8192]);
        s.seq_len_filter = Some(vec![65536]);
        assert!(s.expand(&template()).unwrap().is_empty());
    }
}
