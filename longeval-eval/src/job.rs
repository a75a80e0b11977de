//! Job identity and output-file fingerprinting.
//!
//! A [`Job`] is one fully parameterized evaluation run over one
//! dataset/test-file/demo-file combination. It is immutable once built, and
//! every field that affects generation determinism or content is encoded
//! into the output file name, which is the system's only bookkeeping for
//! skip-vs-run decisions.

use longeval_core::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One fully parameterized evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Dataset name, e.g. `narrativeqa` or `alce_asqa`
    pub dataset: String,
    /// Free-form tag distinguishing sweeps that share all other parameters
    pub tag: String,
    /// Path to the test file
    pub test_file: PathBuf,
    /// Path to the demo (few-shot) file
    pub demo_file: PathBuf,
    /// Maximum input length in tokens
    pub input_max_length: usize,
    /// Maximum number of tokens to generate
    pub generation_max_length: usize,
    /// Minimum number of tokens to generate
    pub generation_min_length: usize,
    /// Cap on the number of test samples
    pub max_test_samples: usize,
    /// Number of few-shot demonstrations
    pub shots: usize,
    /// Whether to sample (otherwise greedy)
    pub do_sample: bool,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling probability mass
    pub top_p: f32,
    /// Random seed
    pub seed: u64,
    /// Render inputs through the model's chat template
    pub use_chat_template: bool,
    /// Thinking mode: reserve extra budget and split reasoning traces
    pub thinking: bool,
    /// Stop generation at the first newline (disabled in thinking mode)
    pub stop_newline: bool,
    /// Popularity cutoff, encoded into the tag for the popqa family
    pub popularity_threshold: f64,
}

impl Job {
    /// Create a job with default generation parameters.
    pub fn new(
        dataset: &str,
        tag: &str,
        test_file: impl Into<PathBuf>,
        demo_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            tag: tag.to_string(),
            test_file: test_file.into(),
            demo_file: demo_file.into(),
            input_max_length: 131_072,
            generation_max_length: 1024,
            generation_min_length: 0,
            max_test_samples: 100,
            shots: 2,
            do_sample: false,
            temperature: 1.0,
            top_p: 1.0,
            seed: 42,
            use_chat_template: true,
            thinking: false,
            stop_newline: false,
            popularity_threshold: 3.0,
        }
    }

    /// Set the input and generation length budgets.
    #[must_use]
    pub fn with_lengths(mut self, input_max_length: usize, generation_max_length: usize) -> Self {
        self.input_max_length = input_max_length;
        self.generation_max_length = generation_max_length;
        self
    }

    /// Set the sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, do_sample: bool, temperature: f32, top_p: f32) -> Self {
        self.do_sample = do_sample;
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    /// Set the test-sample cap.
    #[must_use]
    pub fn with_max_test_samples(mut self, max_test_samples: usize) -> Self {
        self.max_test_samples = max_test_samples;
        self
    }

    /// Set the number of few-shot demonstrations.
    #[must_use]
    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set whether inputs go through the chat template.
    #[must_use]
    pub fn with_chat_template(mut self, use_chat_template: bool) -> Self {
        self.use_chat_template = use_chat_template;
        self
    }

    /// Enable or disable thinking mode.
    #[must_use]
    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    /// The tag with dataset-specific suffixes applied.
    ///
    /// The popqa family sweeps a popularity cutoff, so runs at different
    /// cutoffs must not collide on one output file.
    pub fn effective_tag(&self) -> String {
        if self.dataset.contains("popqa") {
            format!("{}_pop{}", self.tag, self.popularity_threshold)
        } else {
            self.tag.clone()
        }
    }

    /// Deterministic output file name for this job.
    ///
    /// A pure function of every field that affects generation content;
    /// fields that do not (like the output directory) are deliberately
    /// excluded so moving a results directory keeps the cache valid.
    pub fn file_name(&self) -> String {
        let test_name = self
            .test_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("test");
        format!(
            "{}_{}_{}_in{}_size{}_shots{}_samp{}max{}min{}t{}p{}_chat{}_{}.json",
            self.dataset,
            self.effective_tag(),
            test_name,
            self.input_max_length,
            self.max_test_samples,
            self.shots,
            self.do_sample,
            self.generation_max_length,
            self.generation_min_length,
            self.temperature,
            self.top_p,
            self.use_chat_template,
            self.seed,
        )
    }

    /// Full output path under the given directory.
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.file_name())
    }

    /// Build the per-call generation configuration for this job.
    ///
    /// Thinking mode widens both budgets by the reasoning reserve and
    /// disables the stop-at-newline heuristic.
    pub fn generation_config(&self) -> GenerationConfig {
        let config = GenerationConfig::default()
            .with_max_length(self.input_max_length)
            .with_generation_max_length(self.generation_max_length)
            .with_generation_min_length(self.generation_min_length)
            .with_sampling(self.do_sample, self.temperature, self.top_p)
            .with_stop_newline(self.stop_newline)
            .with_chat_template(self.use_chat_template)
            .with_seed(self.seed);
        if self.thinking {
            config.with_thinking_reserve()
        } else {
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longeval_core::THINKING_RESERVE_TOKENS;

    fn sample_job() -> Job {
        Job::new("narrativeqa", "v1", "data/test.jsonl", "data/demo.jsonl")
    }

    #[test]
    fn test_file_name_is_stable() {
        assert_eq!(sample_job().file_name(), sample_job().file_name());
    }

    #[test]
    fn test_tracked_fields_change_the_name() {
        let base = sample_job();

        assert_ne!(base.file_name(), base.clone().with_seed(7).file_name());
        assert_ne!(
            base.file_name(),
            base.clone().with_lengths(8192, 1024).file_name()
        );
        assert_ne!(base.file_name(), base.clone().with_shots(0).file_name());
        assert_ne!(
            base.file_name(),
            base.clone().with_sampling(true, 0.7, 0.9).file_name()
        );
        assert_ne!(
            base.file_name(),
            base.clone().with_chat_template(false).file_name()
        );
        assert_ne!(
            base.file_name(),
            base.clone().with_max_test_samples(10).file_name()
        );
    }

    #[test]
    fn test_output_dir_is_untracked() {
        // Same job, different directory: identical file name.
        let job = sample_job();
        let a = job.output_path(Path::new("/tmp/run_a"));
        let b = job.output_path(Path::new("/tmp/run_b"));
        assert_eq!(a.file_name(), b.file_name());
        assert_ne!(a, b);
    }

    #[test]
    fn test_popqa_tag_suffix() {
        let mut job = sample_job();
        assert_eq!(job.effective_tag(), "v1");

        job.dataset = "popqa".to_string();
        assert_eq!(job.effective_tag(), "v1_pop3");
        assert!(job.file_name().contains("_pop3_"));
    }

    #[test]
    fn test_test_file_base_name_in_fingerprint() {
        let job = sample_job();
        assert!(job.file_name().contains("_test_"));

        let mut other = sample_job();
        other.test_file = PathBuf::from("data/test_hard.jsonl");
        assert_ne!(job.file_name(), other.file_name());
    }

    #[test]
    fn test_generation_config_plain() {
        let config = sample_job().generation_config();
        assert_eq!(config.max_length, 131_072);
        assert_eq!(config.generation_max_length, 1024);
        assert!(!config.thinking);
    }

    #[test]
    fn test_generation_min_length_tracked_and_forwarded() {
        let mut job = sample_job();
        job.generation_min_length = 5;

        // Fingerprinted and carried into the per-call config.
        assert!(job.file_name().contains("min5"));
        assert_eq!(job.generation_config().generation_min_length, 5);
    }

    #[test]
    fn test_generation_config_thinking_widens_budgets() {
        let config = sample_job().with_thinking(true).generation_config();
        assert!(config.thinking);
        assert_eq!(config.max_length, 131_072 + THINKING_RESERVE_TOKENS);
        assert_eq!(config.generation_max_length, 1024 + THINKING_RESERVE_TOKENS);
        assert!(!config.stop_newline);
    }
}
