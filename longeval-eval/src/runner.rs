//! The per-job evaluation pipeline.
//!
//! [`run_job`] takes one [`Job`] through skip-check, staging, dispatch,
//! assembly and aggregation, and returns the path of the persisted report.
//! The path is returned even when the run was skipped or produced nothing,
//! so callers can always locate (or probe for) the job's output.

use crate::assemble::assemble_results;
use crate::dataset::{DatasetError, DatasetProvider};
use crate::dispatch::dispatch_generation;
use crate::job::Job;
use crate::report::RunReport;
use crate::stager::{length_stats, stage_inputs};
use longeval_core::{BackendError, ModelBackend};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// Failed to load the dataset
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// The backend failed at the transport level
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Failed to persist results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize report contents
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external citation evaluator failed
    #[error("Citation evaluation error: {0}")]
    Citation(String),
}

/// Run-wide options that do not affect output content.
///
/// None of these fields participates in the job fingerprint: changing them
/// must never invalidate cached results.
#[derive(Debug, Clone, Serialize)]
pub struct EvalOptions {
    /// Directory receiving report and score files
    pub output_dir: PathBuf,
    /// Redo completed jobs instead of skipping them
    pub overwrite: bool,
    /// Debug mode: no skip, serial staging, failures halt the sweep
    pub debug: bool,
    /// Count input tokens only, skipping generation entirely
    pub count_tokens: bool,
    /// Bounded concurrency for input staging
    pub num_workers: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            overwrite: false,
            debug: false,
            count_tokens: false,
            num_workers: 4,
        }
    }
}

impl EvalOptions {
    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Redo completed jobs instead of skipping them.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Enable debug mode.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Count input tokens only.
    #[must_use]
    pub fn with_count_tokens(mut self, count_tokens: bool) -> Self {
        self.count_tokens = count_tokens;
        self
    }

    /// Set the staging concurrency.
    #[must_use]
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }
}

/// Run one job end to end.
///
/// Returns the report path. When that path already exists and neither
/// overwrite nor debug is set, the job is skipped without loading the
/// dataset or touching the backend; the filesystem is the only bookkeeping
/// for a partially completed sweep.
pub async fn run_job(
    job: &Job,
    backend: &dyn ModelBackend,
    provider: &dyn DatasetProvider,
    options: &EvalOptions,
) -> Result<PathBuf, EvalError> {
    log::info!(
        "running test on {} with test {} and demo {}",
        job.dataset,
        job.test_file.display(),
        job.demo_file.display()
    );

    let output_path = job.output_path(&options.output_dir);
    if output_path.exists() && !options.overwrite && !options.debug {
        log::info!("{} already exists, skipping...", output_path.display());
        return Ok(output_path);
    }
    std::fs::create_dir_all(&options.output_dir)?;

    let dataset = provider.load(job).await?;
    log::info!("loaded {} samples from {}", dataset.data.len(), job.dataset);

    let num_workers = if options.debug { 1 } else { options.num_workers };
    let staged = stage_inputs(&dataset, backend, num_workers).await;

    if options.count_tokens {
        let lens: Vec<usize> = staged.iter().map(|s| s.input_len).collect();
        if let Some(stats) = length_stats(&lens) {
            log::info!(
                "----{}----\nAverage input length: {:.2}, std input length: {:.2}, \
                 max input length: {}, min input length: {}\n----returning----",
                job.dataset,
                stats.mean,
                stats.std,
                stats.max,
                stats.min
            );
        }
        return Ok(output_path);
    }

    let config = job.generation_config();
    if config.thinking {
        log::info!(
            "thinking mode: widening input and generation budgets by the reasoning \
             reserve and disabling stop_newline"
        );
    }

    log::info!("Running generation...");
    let batch_file = batch_manifest_path(&output_path);
    let start = Instant::now();
    let outputs = dispatch_generation(backend, &staged, &batch_file, &config).await?;
    let generation_secs = start.elapsed().as_secs_f64();
    log::info!("Total time: {generation_secs:.2} s");

    let run = assemble_results(outputs, &staged, &dataset, &config, options.debug);

    if run.valid_num == 0 {
        log::error!("No results to evaluate, something went wrong, returning...");
        return Ok(output_path);
    }

    let report = RunReport::from_assembled(
        job_args(job, options)?,
        run,
        generation_secs,
        backend.memory_usage(),
    );
    report.log_summary();

    report.write_json(&output_path)?;
    // The alce family's score file is owned by the external citation
    // evaluator, which computes its own metrics from the full report.
    if !job.dataset.contains("alce") {
        report.write_score_file(&output_path)?;
    }
    log::info!("done, results are written to {}", output_path.display());

    Ok(output_path)
}

/// Batch-manifest path for a report path (`<report>.batch`).
pub fn batch_manifest_path(report_path: &Path) -> PathBuf {
    let mut os = report_path.as_os_str().to_os_string();
    os.push(".batch");
    os.into()
}

/// Flatten job parameters and run options into the report's `args` echo.
fn job_args(job: &Job, options: &EvalOptions) -> Result<Value, EvalError> {
    let mut args = serde_json::to_value(job)?;
    if let (Value::Object(map), Value::Object(opts)) =
        (&mut args, serde_json::to_value(options)?)
    {
        map.extend(opts);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_manifest_path() {
        assert_eq!(
            batch_manifest_path(Path::new("/out/run.json")),
            Path::new("/out/run.json.batch")
        );
    }

    #[test]
    fn test_options_builder() {
        let options = EvalOptions::default()
            .with_output_dir("/tmp/results")
            .with_overwrite(true)
            .with_num_workers(8);
        assert_eq!(options.output_dir, Path::new("/tmp/results"));
        assert!(options.overwrite);
        assert_eq!(options.num_workers, 8);
        assert!(!options.debug);
    }

    #[test]
    fn test_job_args_flattened() {
        let job = Job::new("demo", "t", "a.json", "b.json");
        let args = job_args(&job, &EvalOptions::default()).unwrap();
        assert_eq!(args["dataset"], "demo");
        assert_eq!(args["overwrite"], false);
        assert_eq!(args["num_workers"], 4);
    }
}
