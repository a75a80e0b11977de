//! Result assembly: merge generations with source items and score them.
//!
//! Consumes the order-aligned (output-or-none, item) pairs, applies
//! completion-mode compensation and thinking-trace splitting, invokes the
//! dataset's scorer, and accumulates both per-example records and the
//! run-level metric lists.

use crate::dataset::{render_template, LoadedDataset, TestItem};
use crate::thinking::split_thoughts;
use longeval_core::{GenerationConfig, GenerationOutput, StagedInput};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields too heavy or too transient to persist per record.
const STRIPPED_FIELDS: [&str; 2] = ["context", "input_ids"];

/// How many scored examples get echoed to the log outside debug mode.
const ECHO_EXAMPLES: usize = 5;

/// Everything the assembler accumulates over one run.
#[derive(Debug, Default)]
pub struct AssembledRun {
    /// One merged record per valid item, in input order
    pub records: Vec<TestItem>,
    /// Run-level metric lists, keyed by metric name
    pub metrics: BTreeMap<String, Vec<f64>>,
    /// Items seen, including failures
    pub total_num: usize,
    /// Items that produced a usable output
    pub valid_num: usize,
}

/// Assemble and score one run's generation outputs.
///
/// Items whose output slot is `None` count toward `total_num` only: they
/// are excluded from the records and from every metric list, so they do
/// not drag averages down. That leniency inflates apparent quality on
/// backends with high failure rates; the valid ratio in the report and
/// console summary is how operators see it.
pub fn assemble_results(
    outputs: Vec<Option<GenerationOutput>>,
    staged: &[StagedInput],
    dataset: &LoadedDataset,
    config: &GenerationConfig,
    debug: bool,
) -> AssembledRun {
    let mut run = AssembledRun::default();

    for (idx, (output, item)) in outputs.into_iter().zip(&dataset.data).enumerate() {
        run.total_num += 1;
        let Some(mut output) = output else {
            log::info!("skipping example {} because the model returned no output", idx + 1);
            continue;
        };
        run.valid_num += 1;

        // In raw-completion mode the model continued a prompt ending in the
        // answer prefix, so the prefix is prepended back before parsing.
        if !config.use_chat_template {
            let prefix = render_template(&dataset.system_template, item);
            output.output = format!("{}{}", prefix, output.output);
        }

        if config.thinking {
            let (thoughts, answer) = split_thoughts(&output.output);
            if thoughts.is_some() {
                output.thoughts = thoughts;
                output.output = answer;
            }
        }

        let (mets, others) = dataset.scorer.score(&output.output, item);

        for (name, value) in &mets {
            run.metrics.entry(name.clone()).or_default().push(*value);
        }
        run.metrics
            .entry("input_len".to_string())
            .or_default()
            .push(output.input_len as f64);
        run.metrics
            .entry("output_len".to_string())
            .or_default()
            .push(output.output_len as f64);

        if idx < ECHO_EXAMPLES || debug {
            echo_example(idx, staged.get(idx), item, &output, &mets, &others);
        }

        run.records.push(merge_record(item, &output, others, &mets));
    }

    run
}

/// Merge item, generation and scoring fields into one persistable record.
fn merge_record(
    item: &TestItem,
    output: &GenerationOutput,
    others: TestItem,
    mets: &BTreeMap<String, f64>,
) -> TestItem {
    let mut record = item.clone();
    record.insert("output".to_string(), Value::String(output.output.clone()));
    if let Some(thoughts) = &output.thoughts {
        record.insert("thoughts".to_string(), Value::String(thoughts.clone()));
    }
    record.insert("input_len".to_string(), Value::from(output.input_len));
    record.insert("output_len".to_string(), Value::from(output.output_len));
    for (key, value) in others {
        record.insert(key, value);
    }
    for (name, value) in mets {
        record.insert(name.clone(), Value::from(*value));
    }
    for field in STRIPPED_FIELDS {
        record.remove(field);
    }
    record
}

fn echo_example(
    idx: usize,
    staged: Option<&StagedInput>,
    item: &TestItem,
    output: &GenerationOutput,
    mets: &BTreeMap<String, f64>,
    others: &TestItem,
) {
    log::info!("Example {}:", idx + 1);
    if let Some(staged) = staged {
        log::info!("Decoder inputs:\n{}", staged.prompt);
    }
    log::info!("Input length: {}", output.input_len);
    log::info!(
        "Question: {}",
        item.get("question").and_then(Value::as_str).unwrap_or("")
    );
    log::info!(
        "Answer: {}",
        item.get("answer").map(Value::to_string).unwrap_or_default()
    );
    log::info!("Output: {}", output.output);
    if let Some(parsed) = others.get("parsed_output") {
        log::info!("Parsed output: {}", parsed);
    }
    log::info!("Metrics: {:?}", mets);
}
