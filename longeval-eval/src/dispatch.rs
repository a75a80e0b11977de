//! Generation dispatch: batch vs. iterative strategy.

use longeval_core::{
    BackendError, DispatchMode, GenerationConfig, GenerationOutput, ModelBackend, StagedInput,
};
use std::path::Path;

/// Route staged inputs to the backend and collect order-aligned results.
///
/// Batch-capable backends get the whole list as one logical batch job keyed
/// by `batch_file`; everything else gets one call per input, in order.
/// Each slot is `None` when that item produced no usable output; a failure
/// at one index never shifts results at other indices. Transport errors
/// propagate and abort the job.
pub async fn dispatch_generation(
    backend: &dyn ModelBackend,
    inputs: &[StagedInput],
    batch_file: &Path,
    config: &GenerationConfig,
) -> Result<Vec<Option<GenerationOutput>>, BackendError> {
    match backend.dispatch_mode() {
        DispatchMode::Batch => {
            log::info!(
                "dispatching {} inputs as one batch job ({})",
                inputs.len(),
                batch_file.display()
            );
            let outputs = backend
                .generate_batch(inputs, Some(batch_file), config)
                .await?;
            if outputs.len() != inputs.len() {
                return Err(BackendError::Batch(format!(
                    "backend returned {} outputs for {} inputs",
                    outputs.len(),
                    inputs.len()
                )));
            }
            Ok(outputs)
        }
        DispatchMode::Iterative => {
            log::info!("dispatching {} inputs iteratively", inputs.len());
            let mut outputs = Vec::with_capacity(inputs.len());
            for input in inputs {
                outputs.push(backend.generate(input, config).await?);
            }
            Ok(outputs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use longeval_core::MockBackend;
    use std::path::PathBuf;

    fn staged(n: usize) -> Vec<StagedInput> {
        (0..n)
            .map(|i| StagedInput {
                prompt: format!("prompt {i}"),
                input_len: 2,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_iterative_dispatch_aligned() {
        let backend = MockBackend::from_outputs(vec![Some("a"), None, Some("c")]);
        let outputs = dispatch_generation(
            &backend,
            &staged(3),
            Path::new("/tmp/x.batch"),
            &GenerationConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].as_ref().unwrap().output, "a");
        assert!(outputs[1].is_none());
        assert_eq!(outputs[2].as_ref().unwrap().output, "c");
        assert_eq!(backend.generate_calls(), 3);
        assert_eq!(backend.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_dispatch_single_submission() {
        let backend = MockBackend::from_outputs(vec![Some("a"), Some("b")])
            .with_mode(DispatchMode::Batch);
        let outputs = dispatch_generation(
            &backend,
            &staged(2),
            Path::new("/tmp/x.batch"),
            &GenerationConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(backend.batch_calls(), 1);
        assert_eq!(backend.generate_calls(), 0);
    }

    /// Backend returning a misaligned batch, to exercise the length check.
    struct ShortBatchBackend;

    #[async_trait]
    impl ModelBackend for ShortBatchBackend {
        fn name(&self) -> &str {
            "short"
        }
        fn dispatch_mode(&self) -> DispatchMode {
            DispatchMode::Batch
        }
        fn count_tokens(&self, text: &str) -> usize {
            text.len()
        }
        async fn generate(
            &self,
            _input: &StagedInput,
            _config: &GenerationConfig,
        ) -> Result<Option<GenerationOutput>, BackendError> {
            Ok(None)
        }
        async fn generate_batch(
            &self,
            _inputs: &[StagedInput],
            _batch_file: Option<&Path>,
            _config: &GenerationConfig,
        ) -> Result<Vec<Option<GenerationOutput>>, BackendError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_misaligned_batch_is_an_error() {
        let err = dispatch_generation(
            &ShortBatchBackend,
            &staged(2),
            &PathBuf::from("/tmp/x.batch"),
            &GenerationConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BackendError::Batch(_)));
    }
}
