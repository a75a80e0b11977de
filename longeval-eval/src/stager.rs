//! Input staging: items to model-ready inputs.
//!
//! Converts every dataset item into a [`StagedInput`] by rendering the
//! prompt template and counting tokens. Staging order matches dataset
//! iteration order, and every later stage preserves it, because results are
//! zipped back against the items by index.

use crate::dataset::{render_template, LoadedDataset};
use futures_util::stream::{self, StreamExt};
use longeval_core::{ModelBackend, StagedInput};

/// Stage every item of a loaded dataset, in order.
///
/// `num_workers` bounds the concurrency of the rendering/tokenizing work.
/// This is an I/O-bound preparation pool only; generation concurrency is
/// the backend's concern.
pub async fn stage_inputs(
    dataset: &LoadedDataset,
    backend: &dyn ModelBackend,
    num_workers: usize,
) -> Vec<StagedInput> {
    stream::iter(&dataset.data)
        .map(|item| {
            let prompt = render_template(&dataset.prompt_template, item);
            async move { StagedInput::new(prompt, backend) }
        })
        // `buffered`, not `buffer_unordered`: index alignment is an invariant.
        .buffered(num_workers.max(1))
        .collect()
        .await
}

/// Summary statistics over input lengths, for token-counting audits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthStats {
    pub mean: f64,
    pub std: f64,
    pub max: usize,
    pub min: usize,
}

/// Compute mean/std/max/min of a set of input lengths.
///
/// Returns `None` for an empty set.
pub fn length_stats(lens: &[usize]) -> Option<LengthStats> {
    if lens.is_empty() {
        return None;
    }
    let n = lens.len() as f64;
    let mean = lens.iter().map(|&l| l as f64).sum::<f64>() / n;
    let variance = lens
        .iter()
        .map(|&l| {
            let d = l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(LengthStats {
        mean,
        std: variance.sqrt(),
        max: *lens.iter().max().unwrap_or(&0),
        min: *lens.iter().min().unwrap_or(&0),
    })
}
