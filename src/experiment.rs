use crate::error::{Result, SearchError};
use crate::ga::{Search, SearchOutcome, StopReason};
use crate::observer::GenerationReport;
use crate::param::Param;
use crate::problem::SearchMode;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete record of one search run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e., dataset, mode and timestamp
    pub id: String,
    /// Timestamp of the experiment
    pub timestamp: String,
    /// Crate version and git hash used
    pub version: String,
    /// Key of the dataset searched
    pub dataset: String,
    pub mode: SearchMode,
    /// Parameters used
    pub parameters: Param,

    /// Champion or Pareto front, `None` when the run was stopped before a generation completed
    pub outcome: Option<SearchOutcome>,
    /// One report per completed generation
    pub history: Vec<GenerationReport>,
    pub stop_reason: StopReason,

    /// Execution time in seconds
    pub execution_time: f64,
}

/// One line of the result table
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResultRow {
    pub dataset: String,
    pub mode: String,
    pub mae: f64,
    pub rmse: f64,
    pub complexity: usize,
    pub description: String,
    pub time_s: f64,
}

impl Experiment {
    pub fn new(
        dataset: &str,
        mode: SearchMode,
        parameters: &Param,
        search: Search,
        timestamp: &str,
        version: &str,
        execution_time: f64,
    ) -> Experiment {
        Experiment {
            id: format!("{}_{}_{}", dataset, mode.key(), timestamp),
            timestamp: timestamp.to_string(),
            version: version.to_string(),
            dataset: dataset.to_string(),
            mode,
            parameters: parameters.clone(),
            outcome: search.outcome,
            history: search.history,
            stop_reason: search.stop_reason,
            execution_time,
        }
    }

    pub fn display_results(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "\n=============== Experiment {} ===============\n\n",
            self.id
        ));
        text.push_str(&format!("Version: v{}\n", self.version));
        text.push_str(&format!("Dataset: {}\n", self.dataset));
        text.push_str(&format!("Mode: {}\n", self.mode.description()));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!(
            "Generations: {} ({:?})\n\n",
            self.history.len(),
            self.stop_reason
        ));

        match &self.outcome {
            None => text.push_str("\x1b[1;93mNo result: the search stopped before its first generation completed\x1b[0m\n"),
            Some(SearchOutcome::Best(record)) => {
                text.push_str(&format!("\x1b[1;92mBest configuration\x1b[0m {}\n", record));
            }
            Some(SearchOutcome::Front(front)) => {
                text.push_str(&format!(
                    "\x1b[1;92mPareto front\x1b[0m ({} configuration(s), ascending MAE)\n",
                    front.len()
                ));
                for (rank, record) in front.iter().enumerate() {
                    text.push_str(&format!("  #{:<3} {}\n", rank + 1, record));
                }
            }
        }

        text
    }

    /// Rows of the result table: one for a champion, one per member of a front
    pub fn rows(&self) -> Vec<ResultRow> {
        let Some(outcome) = &self.outcome else {
            return vec![];
        };
        outcome
            .records()
            .into_iter()
            .map(|record| ResultRow {
                dataset: self.dataset.clone(),
                mode: self.mode.key().to_string(),
                mae: record.mae,
                rmse: record.rmse,
                complexity: record.complexity,
                description: record.description.clone(),
                time_s: self.execution_time,
            })
            .collect()
    }

    /// Saves the experiment in a suitable format based on file extension.
    ///
    /// `.json` is written as pretty JSON, `.bin`/`.bincode` as bincode; any other extension
    /// falls back to bincode with a `.bin` extension.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => self.save_json(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in bincode.");
                self.save_bincode(path.with_extension("bin"))
            }
        }
    }

    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads an experiment, picking the format from the file extension.
    /// Unknown extensions are tried as bincode, then JSON.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Experiment> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => Self::load_json(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_with_fallback(path),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Experiment> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Experiment> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn load_with_fallback(path: &Path) -> Result<Experiment> {
        if let Ok(experiment) = Self::load_bincode(path) {
            return Ok(experiment);
        }
        Self::load_json(path).map_err(|e| {
            SearchError::MalformedData {
                path: path.display().to_string(),
                reason: format!("neither bincode nor JSON experiment ({})", e),
            }
        })
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Write the result table of several experiments as CSV
/// (dataset, mode, mae, rmse, complexity, description, time_s).
///
/// Experiments without a result contribute no row.
pub fn export_csv<P: AsRef<Path>>(experiments: &[Experiment], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    let mut n = 0;
    for experiment in experiments {
        let rows = experiment.rows();
        if rows.is_empty() {
            warn!("{} has no result to export", experiment.id);
        }
        for row in rows {
            writer.serialize(row)?;
            n += 1;
        }
    }
    writer.flush()?;
    info!("{} result row(s) written to {}", n, path.as_ref().display());
    Ok(())
}
