//! # longeval-eval
//!
//! Benchmark-execution harness for evaluating models on long-context tasks
//! across many datasets. For each (dataset, test file, demo file,
//! max-length) job it stages inputs, dispatches generation, scores and
//! aggregates outputs, and persists results idempotently: the output file
//! name is a fingerprint of every content-affecting parameter, and a
//! repeated sweep skips jobs whose file already exists.
//!
//! ## Architecture
//!
//! ```text
//! longeval-core (ModelBackend, GenerationConfig)
//!     ↓
//! longeval-eval (jobs, staging, dispatch, assembly, reports)  ← this crate
//! ```
//!
//! Pipeline per job:
//!
//! ```text
//! scheduler → job fingerprint/skip → stager → dispatcher
//!           → assembler (thinking split, scoring) → report files
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use longeval_eval::{run_job, EvalOptions, Job, JsonFileProvider};
//! use longeval_core::MockBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = Job::new("narrativeqa", "v1", "data/test.json", "data/demo.json")
//!     .with_lengths(65_536, 256);
//! let backend = MockBackend::always("an answer", 100);
//! let provider = JsonFileProvider::new();
//! let options = EvalOptions::default().with_output_dir("results");
//!
//! let report_path = run_job(&job, &backend, &provider, &options).await?;
//! println!("results at {}", report_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! Dataset loading, per-dataset scoring and the citation evaluator are
//! interfaces, not implementations: see [`DatasetProvider`], [`Scorer`]
//! and [`CitationEvaluator`]. The shipped [`JsonFileProvider`] and
//! [`SubstringMatch`] cover the common QA shape.

pub mod assemble;
pub mod dataset;
pub mod dispatch;
pub mod job;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod stager;
pub mod thinking;

pub use assemble::{assemble_results, AssembledRun};
pub use dataset::{
    DatasetError, DatasetProvider, JsonFileProvider, LoadedDataset, Scorer, SubstringMatch,
    TestItem,
};
pub use dispatch::dispatch_generation;
pub use job::Job;
pub use report::{average_metrics, score_path, RunReport};
pub use runner::{batch_manifest_path, run_job, EvalError, EvalOptions};
pub use scheduler::{run_sweep, CitationEvaluator, SweepError, SweepSpec, SweepSummary};
pub use stager::{length_stats, stage_inputs, LengthStats};
pub use thinking::split_thoughts;
