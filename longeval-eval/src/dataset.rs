//! Dataset collaborator boundary.
//!
//! A dataset supplies an ordered list of item records, the templates used
//! to render prompts from them, and a [`Scorer`] computing per-example
//! metrics. The harness depends only on these interfaces; benchmark
//! loaders implement [`DatasetProvider`].

use crate::job::Job;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

/// One test-item record with arbitrary dataset-specific fields.
pub type TestItem = serde_json::Map<String, Value>;

/// Errors that can occur when loading datasets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatasetError {
    /// Failed to read a dataset file
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a dataset file
    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    /// The dataset is structurally invalid
    #[error("Invalid dataset: {0}")]
    Invalid(String),
}

/// Dataset-specific post-processing: one metric mapping and one auxiliary
/// field mapping per scored output.
///
/// Metrics are numeric and feed the run-level averages; auxiliary fields
/// (parsed answers, extracted citations) are merged into the persisted
/// record but not averaged.
pub trait Scorer: Send + Sync {
    /// Score a generated output against its source item.
    fn score(&self, output: &str, item: &TestItem) -> (BTreeMap<String, f64>, TestItem);
}

/// Substring exact match.
///
/// Scores 1.0 when any normalized gold answer is contained in the
/// normalized output. Gold answers come from the item's `answer` field,
/// which may be a string or an array of strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatch;

impl Scorer for SubstringMatch {
    fn score(&self, output: &str, item: &TestItem) -> (BTreeMap<String, f64>, TestItem) {
        let normalized_output = normalize(output);
        let answers: Vec<String> = match item.get("answer") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => vec![],
        };

        let hit = answers
            .iter()
            .any(|answer| normalized_output.contains(&normalize(answer)));

        let mut metrics = BTreeMap::new();
        metrics.insert("sub_em".to_string(), if hit { 1.0 } else { 0.0 });

        let mut others = TestItem::new();
        others.insert(
            "parsed_output".to_string(),
            Value::String(output.lines().next().unwrap_or_default().trim().to_string()),
        );
        (metrics, others)
    }
}

/// Normalize text for comparison: lowercase, collapse whitespace.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A loaded dataset ready for one evaluation run.
pub struct LoadedDataset {
    /// Ordered item records; results are zipped back against this order
    pub data: Vec<TestItem>,
    /// Format string rendering the full model prompt from item fields
    pub prompt_template: String,
    /// Format string for the answer prefix, prepended to raw-completion
    /// outputs so the evaluator sees the logically complete answer
    pub system_template: String,
    /// Post-processing for this dataset family
    pub scorer: Arc<dyn Scorer>,
}

// Scorer trait objects are opaque, so the derive is unavailable.
impl fmt::Debug for LoadedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedDataset")
            .field("data", &format!("{} items", self.data.len()))
            .field("prompt_template", &self.prompt_template)
            .field("system_template", &self.system_template)
            .finish_non_exhaustive()
    }
}

/// Loads a dataset for a job.
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Load the items, templates and scorer for the job's test file.
    async fn load(&self, job: &Job) -> Result<LoadedDataset, DatasetError>;
}

/// Render a `{field}`-style template against an item's fields.
///
/// Unknown placeholders are left in place; dataset authors notice them in
/// the echoed example logs rather than getting a hard failure mid-sweep.
pub fn render_template(template: &str, item: &TestItem) -> String {
    let mut rendered = template.to_string();
    for (key, value) in item {
        let placeholder = format!("{{{key}}}");
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, &value_to_text(value));
        }
    }
    rendered
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Provider reading a JSON array of item objects from the job's test file.
///
/// The default templates suit question-answering over a `context` and
/// `question` field; override them per dataset family.
pub struct JsonFileProvider {
    prompt_template: String,
    system_template: String,
    scorer: Arc<dyn Scorer>,
}

impl JsonFileProvider {
    /// Create a provider with the default QA templates and scorer.
    pub fn new() -> Self {
        Self {
            prompt_template: "{context}\n\nQuestion: {question}\nAnswer:".to_string(),
            system_template: "Answer:".to_string(),
            scorer: Arc::new(SubstringMatch),
        }
    }

    /// Set the prompt template.
    #[must_use]
    pub fn with_prompt_template(mut self, template: &str) -> Self {
        self.prompt_template = template.to_string();
        self
    }

    /// Set the answer-prefix template used in raw-completion mode.
    #[must_use]
    pub fn with_system_template(mut self, template: &str) -> Self {
        self.system_template = template.to_string();
        self
    }

    /// Set the scorer.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    async fn read_items(&self, path: &Path) -> Result<Vec<TestItem>, DatasetError> {
        let content = fs::read_to_string(path).await?;
        let items: Vec<TestItem> =
            serde_json::from_str(&content).map_err(|e| DatasetError::Parse(e.to_string()))?;
        Ok(items)
    }
}

impl Default for JsonFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetProvider for JsonFileProvider {
    async fn load(&self, job: &Job) -> Result<LoadedDataset, DatasetError> {
        let mut data = self.read_items(&job.test_file).await?;
        if data.is_empty() {
            return Err(DatasetError::Invalid(format!(
                "{} contains no items",
                job.test_file.display()
            )));
        }
        data.truncate(job.max_test_samples);

        Ok(LoadedDataset {
            data,
            prompt_template: self.prompt_template.clone(),
            system_template: self.system_template.clone(),
            scorer: self.scorer.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn item(fields: Value) -> TestItem {
        fields.as_object().unwrap().clone()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello   World  "), "hello world");
        assert_eq!(normalize("UPPERCASE"), "uppercase");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_render_template() {
        let item = item(json!({"question": "2+2?", "context": "arithmetic"}));
        let rendered = render_template("{context}\nQ: {question}", &item);
        assert_eq!(rendered, "arithmetic\nQ: 2+2?");
    }

    #[test]
    fn test_render_template_unknown_placeholder_kept() {
        let item = item(json!({"question": "2+2?"}));
        assert_eq!(render_template("{missing}: {question}", &item), "{missing}: 2+2?");
    }

    #[test]
    fn test_render_template_non_string_field() {
        let item = item(json!({"popularity": 42}));
        assert_eq!(render_template("pop={popularity}", &item), "pop=42");
    }

    #[rstest]
    #[case::exact("Paris", json!("Paris"), 1.0)]
    #[case::substring("The capital is Paris.", json!("Paris"), 1.0)]
    #[case::case_insensitive("PARIS", json!("paris"), 1.0)]
    #[case::miss("London", json!("Paris"), 0.0)]
    #[case::any_of_list("It was Berlin", json!(["Paris", "Berlin"]), 1.0)]
    #[case::none_of_list("It was Rome", json!(["Paris", "Berlin"]), 0.0)]
    fn test_substring_match(#[case] output: &str, #[case] answer: Value, #[case] expected: f64) {
        let item = item(json!({ "answer": answer }));
        let (metrics, _) = SubstringMatch.score(output, &item);
        assert_eq!(metrics["sub_em"], expected);
    }

    #[test]
    fn test_substring_match_parsed_output_is_first_line() {
        let item = item(json!({"answer": "x"}));
        let (_, others) = SubstringMatch.score("first line\nsecond line", &item);
        assert_eq!(others["parsed_output"], json!("first line"));
    }

    #[tokio::test]
    async fn test_json_provider_load_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        let items = json!([
            {"id": "a", "question": "q1", "answer": "a1"},
            {"id": "b", "question": "q2", "answer": "a2"},
            {"id": "c", "question": "q3", "answer": "a3"},
        ]);
        std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();

        let job = Job::new("demo", "t", &path, &path).with_max_test_samples(2);
        let dataset = JsonFileProvider::new().load(&job).await.unwrap();

        assert_eq!(dataset.data.len(), 2);
        assert_eq!(dataset.data[0]["id"], json!("a"));
        assert_eq!(dataset.data[1]["id"], json!("b"));
    }

    #[tokio::test]
    async fn test_loaded_dataset_debug_elides_scorer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(&path, r#"[{"id": "a", "answer": "x"}]"#).unwrap();

        let job = Job::new("demo", "t", &path, &path);
        // `unwrap_err` in the error-path tests needs this Debug impl too.
        let dataset = JsonFileProvider::new().load(&job).await.unwrap();

        let rendered = format!("{dataset:?}");
        assert!(rendered.contains("1 items"));
        assert!(!rendered.contains("scorer"));
    }

    #[tokio::test]
    async fn test_json_provider_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]").unwrap();

        let job = Job::new("demo", "t", &path, &path);
        let err = JsonFileProvider::new().load(&job).await.unwrap_err();
        assert!(matches!(err, DatasetError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_json_provider_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let job = Job::new("demo", "t", &path, &path);
        let err = JsonFileProvider::new().load(&job).await.unwrap_err();
        assert!(matches!(err, DatasetError::Parse(_)));
    }
}
