//! Evaluation CLI for long-context benchmark sweeps.
//!
//! Expands comma-separated dataset/test-file/demo-file/length lists into a
//! queue of jobs and runs them against an OpenAI-compatible endpoint.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use longeval_core::ChatCompletionsBackend;
use longeval_eval::{run_sweep, EvalOptions, Job, JsonFileProvider, SweepSpec};
use std::path::PathBuf;
use std::process::ExitCode;

/// Run long-context evaluation sweeps.
#[derive(Parser, Debug)]
#[command(name = "longeval-eval")]
#[command(about = "Benchmark-execution harness for long-context evaluation")]
#[command(version)]
struct Args {
    /// Comma-separated dataset names
    #[arg(long)]
    datasets: String,

    /// Comma-separated test file paths (one per dataset)
    #[arg(long)]
    test_files: String,

    /// Comma-separated demo file paths (one per dataset)
    #[arg(long)]
    demo_files: String,

    /// Comma-separated input length budgets (single value broadcasts)
    #[arg(long, default_value = "131072")]
    input_max_length: String,

    /// Comma-separated generation length budgets (single value broadcasts)
    #[arg(long, default_value = "1024")]
    generation_max_length: String,

    /// Minimum number of tokens to generate
    #[arg(long, default_value = "0")]
    generation_min_length: usize,

    /// Only run jobs whose input length is in this comma-separated set
    #[arg(long)]
    seq_len_filter: Option<String>,

    /// Tag distinguishing sweeps that share all other parameters
    #[arg(long, default_value = "v1")]
    tag: String,

    /// Directory receiving report and score files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Cap on test samples per dataset
    #[arg(long, default_value = "100")]
    max_test_samples: usize,

    /// Number of few-shot demonstrations
    #[arg(long, default_value = "2")]
    shots: usize,

    /// Enable sampling (otherwise greedy decoding)
    #[arg(long)]
    do_sample: bool,

    /// Sampling temperature
    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    /// Nucleus sampling probability mass
    #[arg(long, default_value_t = 1.0)]
    top_p: f32,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Feed raw prompts instead of the model's chat template
    #[arg(long)]
    no_chat_template: bool,

    /// Thinking mode: reserve extra budget and split reasoning traces
    #[arg(long)]
    thinking: bool,

    /// Stop generation at the first newline
    #[arg(long)]
    stop_newline: bool,

    /// Popularity cutoff for the popqa family
    #[arg(long, default_value_t = 3.0)]
    popularity_threshold: f64,

    /// Count input tokens only; skip generation entirely
    #[arg(long)]
    count_tokens: bool,

    /// Redo completed jobs instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Debug mode: no skip, serial staging, first failure halts the sweep
    #[arg(long)]
    debug: bool,

    /// Bounded concurrency for input staging
    #[arg(long, default_value = "4")]
    num_workers: usize,

    /// Model name sent to the endpoint
    #[arg(long)]
    model: String,

    /// OpenAI-compatible endpoint base URL
    #[arg(long, default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// API key (can also use OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    api_key: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() {
            return Err("--model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!("top_p ({}) must be between 0.0 and 1.0", self.top_p));
        }
        Ok(())
    }

    fn sweep_spec(&self) -> Result<SweepSpec, String> {
        Ok(SweepSpec {
            datasets: parse_list(&self.datasets),
            test_files: parse_list(&self.test_files).into_iter().map(Into::into).collect(),
            demo_files: parse_list(&self.demo_files).into_iter().map(Into::into).collect(),
            input_max_lengths: parse_lengths(&self.input_max_length)?,
            generation_max_lengths: parse_lengths(&self.generation_max_length)?,
            seq_len_filter: self
                .seq_len_filter
                .as_deref()
                .map(parse_lengths)
                .transpose()?,
        })
    }

    fn job_template(&self) -> Job {
        let mut job = Job::new("", &self.tag, "", "")
            .with_max_test_samples(self.max_test_samples)
            .with_shots(self.shots)
            .with_sampling(self.do_sample, self.temperature, self.top_p)
            .with_seed(self.seed)
            .with_chat_template(!self.no_chat_template)
            .with_thinking(self.thinking);
        job.generation_min_length = self.generation_min_length;
        job.stop_newline = self.stop_newline;
        job.popularity_threshold = self.popularity_threshold;
        job
    }

    fn eval_options(&self) -> EvalOptions {
        EvalOptions::default()
            .with_output_dir(&self.output_dir)
            .with_overwrite(self.overwrite)
            .with_debug(self.debug)
            .with_count_tokens(self.count_tokens)
            .with_num_workers(self.num_workers)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_lengths(value: &str) -> Result<Vec<usize>, String> {
    parse_list(value)
        .iter()
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| format!("invalid length: {s}"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = args.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let spec = match args.sweep_spec() {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let jobs = match spec.expand(&args.job_template()) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("=== longeval sweep ===");
    eprintln!("Model: {}", args.model);
    eprintln!("Jobs: {}", jobs.len());
    eprintln!("Output dir: {}", args.output_dir.display());
    eprintln!();

    let backend = ChatCompletionsBackend::new(&args.api_base, &args.api_key, &args.model);
    let provider = JsonFileProvider::new();
    let options = args.eval_options();

    let progress_bar = ProgressBar::new(jobs.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} jobs ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = run_sweep(&jobs, &backend, &provider, None, &options, |done, _total| {
        progress_bar.set_position(done as u64);
    })
    .await;
    progress_bar.finish_and_clear();

    match result {
        Ok(summary) => {
            eprintln!(
                "Sweep finished: {} completed, {} failed",
                summary.completed.len(),
                summary.failed.len()
            );
            if summary.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                eprintln!("Failed datasets: {}", summary.failed.join(", "));
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
