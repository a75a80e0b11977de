//! Run aggregation and persistence.
//!
//! Reduces the assembled per-example metric lists into averaged scores and
//! writes two files: the full report, and a lightweight scores-only file
//! for the downstream dashboard. Both writes are all-or-nothing.

use crate::assemble::AssembledRun;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// The persisted result of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Echo of the job parameters and run options
    pub args: Value,
    /// One merged record per valid item
    pub data: Vec<crate::dataset::TestItem>,
    /// Per-example metric values, keyed by metric name
    pub metrics: BTreeMap<String, Vec<f64>>,
    /// Averaged metrics: percentages, except raw token units for `*_len`
    pub averaged_metrics: BTreeMap<String, f64>,
    /// Valid samples per second of generation wall time
    pub throughput: f64,
    /// Items seen, including failures
    pub total_sample: usize,
    /// Items that produced a usable output
    pub valid_sample: usize,
    /// `valid_sample / total_sample`, formatted `"NN.NN%"`
    pub valid_ratio: String,
    /// Peak accelerator memory in bytes, when the backend tracks it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
}

impl RunReport {
    /// Build a report from an assembled run.
    ///
    /// `generation_secs` is the wall time of the generation phase only;
    /// staging and scoring are excluded from throughput.
    pub fn from_assembled(
        args: Value,
        run: AssembledRun,
        generation_secs: f64,
        memory_usage: Option<u64>,
    ) -> Self {
        let averaged_metrics = average_metrics(&run.metrics);
        let throughput = if generation_secs > 0.0 {
            run.records.len() as f64 / generation_secs
        } else {
            0.0
        };
        Self {
            args,
            data: run.records,
            metrics: run.metrics,
            averaged_metrics,
            throughput,
            total_sample: run.total_num,
            valid_sample: run.valid_num,
            valid_ratio: format_valid_ratio(run.valid_num, run.total_num),
            memory_usage,
        }
    }

    /// Write the full report, atomically.
    ///
    /// Writes to a temp file in the target directory and renames it into
    /// place, so a crash mid-write never leaves a partial report behind.
    pub fn write_json(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_atomic(path, &json)
    }

    /// Write the scores-only file next to the report (`<path>.score`).
    pub fn write_score_file(&self, report_path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.averaged_metrics)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_atomic(&score_path(report_path), &json)
    }

    /// Log the averaged metrics and validity summary.
    pub fn log_summary(&self) {
        log::info!("Averaged metrics:");
        for (name, value) in &self.averaged_metrics {
            log::info!("{name}: {value:.2}");
        }
        log::info!(
            "Eval valid ratio: {}. Total sample: {} | Valid sample: {}",
            self.valid_ratio,
            self.total_sample,
            self.valid_sample
        );
        log::info!("Throughput: {:.2} samples/s", self.throughput);
        if let Some(bytes) = self.memory_usage {
            log::info!("Memory usage: {:.2} GB", bytes as f64 / 1e9);
        }
    }
}

/// Scores-only file path for a report path.
pub fn score_path(report_path: &Path) -> std::path::PathBuf {
    let mut os = report_path.as_os_str().to_os_string();
    os.push(".score");
    os.into()
}

/// Average each metric list.
///
/// Quality metrics are scaled to percentages; metrics whose name ends in
/// `_len` stay in raw token units.
pub fn average_metrics(metrics: &BTreeMap<String, Vec<f64>>) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let scale = if name.ends_with("_len") { 1.0 } else { 100.0 };
            (name.clone(), mean * scale)
        })
        .collect()
}

fn format_valid_ratio(valid: usize, total: usize) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", valid as f64 / total as f64 * 100.0)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}
