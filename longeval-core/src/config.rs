use serde::{Deserialize, Serialize};

/// Extra length budget reserved for reasoning traces in thinking mode.
///
/// Added to both the input and the generation budget so the model can emit a
/// long `</think>`-delimited trace before the final answer.
pub const THINKING_RESERVE_TOKENS: usize = 32_768;

/// Per-call generation configuration.
///
/// Every field that affects what the model produces lives here, and the
/// config is passed explicitly into each backend call. Backends hold no
/// mutable length state, so two jobs with different budgets never race on a
/// shared model object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GenerationConfig {
    /// Maximum input length in tokens
    ///
    /// Default: 131072
    pub max_length: usize,

    /// Maximum number of tokens to generate
    ///
    /// Default: 1024
    pub generation_max_length: usize,

    /// Minimum number of tokens to generate
    ///
    /// Default: 0
    pub generation_min_length: usize,

    /// Whether to sample (otherwise greedy decoding)
    ///
    /// Default: false
    pub do_sample: bool,

    /// Sampling temperature
    ///
    /// Default: 1.0
    pub temperature: f32,

    /// Nucleus sampling probability mass
    ///
    /// Default: 1.0
    pub top_p: f32,

    /// Stop generation at the first newline
    ///
    /// Useful for short-answer tasks; always disabled in thinking mode
    /// because reasoning traces legitimately contain newlines.
    /// Default: false
    pub stop_newline: bool,

    /// Render inputs through the model's chat template
    ///
    /// When false the model is asked to *continue* a raw prompt instead of
    /// responding to a conversation.
    /// Default: true
    pub use_chat_template: bool,

    /// Thinking mode: reserve extra budget and expect a `</think>` trace
    ///
    /// Default: false
    pub thinking: bool,

    /// Random seed recorded for reproducibility
    ///
    /// Default: 42
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 131_072,
            generation_max_length: 1024,
            generation_min_length: 0,
            do_sample: false,
            temperature: 1.0,
            top_p: 1.0,
            stop_newline: false,
            use_chat_template: true,
            thinking: false,
            seed: 42,
        }
    }
}

impl GenerationConfig {
    /// Set the maximum input length in tokens.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the maximum number of tokens to generate.
    #[must_use]
    pub fn with_generation_max_length(mut self, generation_max_length: usize) -> Self {
        self.generation_max_length = generation_max_length;
        self
    }

    /// Set the minimum number of tokens to generate.
    #[must_use]
    pub fn with_generation_min_length(mut self, generation_min_length: usize) -> Self {
        self.generation_min_length = generation_min_length;
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

    /// Set whether generation stops at the first newline.
    #[must_use]
    pub fn with_stop_newline(mut self, stop_newline: bool) -> Self {
        self.stop_newline = stop_newline;
        self
    }

    /// Set whether inputs are rendered through the chat template.
    #[must_use]
    pub fn with_chat_template(mut self, use_chat_template: bool) -> Self {
        self.use_chat_template = use_chat_template;
        self
    }

    /// Set the recorded random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable thinking mode.
    ///
    /// Widens both length budgets by [`THINKING_RESERVE_TOKENS`] and disables
    /// the stop-at-newline heuristic, which would otherwise truncate
    /// multi-line reasoning traces.
    #[must_use]
    pub fn with_thinking_reserve(mut self) -> Self {
        self.thinking = true;
        self.max_length += THINKING_RESERVE_TOKENS;
        self.generation_max_length += THINKING_RESERVE_TOKENS;
        self.stop_newline = false;
        self
    }
}
