//! Mock backend for offline, deterministic testing.
//!
//! Replays a scripted list of outputs in order, one per generation call,
//! and counts how often it was invoked so tests can assert that skipped
//! runs perform zero backend calls.

use crate::backend::{DispatchMode, GenerationOutput, ModelBackend, StagedInput};
use crate::config::GenerationConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A backend that replays scripted outputs.
///
/// Each slot is either `Some(text)` for a successful generation or `None`
/// for a content failure. Calls past the end of the script also produce
/// content failures rather than panicking.
pub struct MockBackend {
    outputs: Vec<Option<String>>,
    mode: DispatchMode,
    cursor: AtomicUsize,
    generate_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockBackend {
    /// Create a mock that replays the given outputs iteratively.
    pub fn from_outputs<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            outputs: outputs.into_iter().map(|o| o.map(Into::into)).collect(),
            mode: DispatchMode::Iterative,
            cursor: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that answers every item with the same text.
    pub fn always(text: &str, count: usize) -> Self {
        Self::from_outputs(vec![Some(text.to_string()); count])
    }

    /// Switch the mock to batch dispatch.
    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Total `generate` calls made so far.
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Total `generate_batch` calls made so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Total calls of either kind.
    pub fn total_calls(&self) -> usize {
        self.generate_calls() + self.batch_calls()
    }

    /// Rewind the script to the beginning.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    fn next_output(&self, input: &StagedInput) -> Option<GenerationOutput> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.outputs.get(index) {
            Some(Some(text)) => Some(GenerationOutput {
                output: text.clone(),
                thoughts: None,
                input_len: input.input_len,
                output_len: self.count_tokens(text),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn dispatch_mode(&self) -> DispatchMode {
        self.mode
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    async fn generate(
        &self,
        input: &StagedInput,
        _config: &GenerationConfig,
    ) -> Result<Option<GenerationOutput>, BackendError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_output(input))
    }

    async fn generate_batch(
        &self,
        inputs: &[StagedInput],
        _batch_file: Option<&Path>,
        _config: &GenerationConfig,
    ) -> Result<Vec<Option<GenerationOutput>>, BackendError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|input| self.next_output(input)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(prompt: &str) -> StagedInput {
        StagedInput {
            prompt: prompt.to_string(),
            input_len: prompt.split_whitespace().count(),
        }
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let mock = MockBackend::from_outputs(vec![Some("a"), None, Some("c")]);
        let config = GenerationConfig::default();

        let first = mock.generate(&staged("one"), &config).await.unwrap();
        let second = mock.generate(&staged("two"), &config).await.unwrap();
        let third = mock.generate(&staged("three"), &config).await.unwrap();

        assert_eq!(first.unwrap().output, "a");
        assert!(second.is_none());
        assert_eq!(third.unwrap().output, "c");
        assert_eq!(mock.generate_calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_content_failure() {
        let mock = MockBackend::from_outputs(vec![Some("only")]);
        let config = GenerationConfig::default();

        mock.generate(&staged("one"), &config).await.unwrap();
        let extra = mock.generate(&staged("two"), &config).await.unwrap();
        assert!(extra.is_none());
    }

    #[tokio::test]
    async fn test_batch_preserves_alignment() {
        let mock = MockBackend::from_outputs(vec![Some("a"), None, Some("c")])
            .with_mode(DispatchMode::Batch);
        let config = GenerationConfig::default();
        let inputs = vec![staged("one"), staged("two"), staged("three")];

        let outputs = mock.generate_batch(&inputs, None, &config).await.unwrap();

        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].is_some());
        assert!(outputs[1].is_none());
        assert!(outputs[2].is_some());
        assert_eq!(mock.batch_calls(), 1);
        assert_eq!(mock.generate_calls(), 0);
    }

    #[test]
    fn test_token_counting() {
        let mock = MockBackend::always("hi", 1);
        assert_eq!(mock.count_tokens("three short words"), 3);
        assert_eq!(mock.count_tokens(""), 0);
    }
}
