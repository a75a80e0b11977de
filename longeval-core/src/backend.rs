//! The model-backend trait and its data types.
//!
//! A backend turns staged inputs into generation outputs. The harness only
//! depends on this trait; concrete clients (HTTP APIs, local inference,
//! mocks) live behind it.

use crate::config::GenerationConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a backend prefers to receive work.
///
/// Resolved once at backend construction; the dispatcher selects its
/// strategy with a plain match on this tag rather than inspecting the
/// backend's concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// The provider offers asynchronous bulk submission; hand it the whole
    /// input list as one logical batch job and let it poll internally.
    Batch,
    /// One generation call per input, in order.
    Iterative,
}

/// A model-ready input produced by the staging phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedInput {
    /// The fully rendered prompt text
    pub prompt: String,
    /// Input length in tokens (backend tokenizer units)
    pub input_len: usize,
}

impl StagedInput {
    /// Stage a prompt, counting its length with the given backend.
    pub fn new(prompt: String, backend: &dyn ModelBackend) -> Self {
        let input_len = backend.count_tokens(&prompt);
        Self { prompt, input_len }
    }
}

/// One successful generation.
///
/// A backend that could not produce a usable response for an item (for
/// example a runaway reasoning trace that exhausted the budget before any
/// answer) returns `None` for that slot instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The generated text (final answer once thinking traces are split off)
    pub output: String,
    /// Reasoning trace, filled in by the harness when thinking mode is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    /// Input length in tokens
    pub input_len: usize,
    /// Output length in tokens
    pub output_len: usize,
}

/// Interface to a generation backend.
///
/// Implementations must be order-preserving: `generate_batch` returns
/// exactly one slot per input, aligned by index, and a content failure at
/// one index must not shift or corrupt the others. Transport failures
/// (unreachable host, malformed batch) are returned as [`BackendError`];
/// retrying those is the implementation's concern, not the harness's.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name for logging and report metadata.
    fn name(&self) -> &str;

    /// How this backend wants work dispatched.
    fn dispatch_mode(&self) -> DispatchMode;

    /// Count tokens in a piece of text.
    ///
    /// Backends without a real tokenizer may approximate; the count is used
    /// for length auditing, not truncation.
    fn count_tokens(&self, text: &str) -> usize;

    /// Peak accelerator memory in bytes, if this backend tracks it.
    ///
    /// API-hosted backends return `None`.
    fn memory_usage(&self) -> Option<u64> {
        None
    }

    /// Generate for a single input.
    ///
    /// Returns `Ok(None)` when the model produced no usable output for this
    /// item (a content failure, not an error).
    async fn generate(
        &self,
        input: &StagedInput,
        config: &GenerationConfig,
    ) -> Result<Option<GenerationOutput>, BackendError>;

    /// Generate for a whole list of inputs.
    ///
    /// Batch-capable backends submit one bulk job keyed by `batch_file` and
    /// block until it completes. The default implementation falls back to
    /// iterating [`generate`](Self::generate) in order.
    async fn generate_batch(
        &self,
        inputs: &[StagedInput],
        _batch_file: Option<&Path>,
        config: &GenerationConfig,
    ) -> Result<Vec<Option<GenerationOutput>>, BackendError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(self.generate(input, config).await?);
        }
        Ok(outputs)
    }
}
