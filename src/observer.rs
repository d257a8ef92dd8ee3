use crate::cinfo;
use crate::utils::{display_generation, display_generation_legend};
use serde::{Deserialize, Serialize};

/// Summary of one completed generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationReport {
    /// 0-based generation index
    pub generation: usize,
    /// Champion errors
    pub mae: f64,
    pub rmse: f64,
    pub std_mae: f64,
    pub complexity: usize,
    pub description: String,
    /// Size of the current front, for two objective searches only
    pub front_size: Option<usize>,
}

/// Progress sink of a search. Every call happens on the thread driving the search.
pub trait Observer {
    /// Called before the individuals of `generation` are scored
    fn on_generation_start(&mut self, _generation: usize) {}

    /// Called once per completed generation
    fn on_generation(&mut self, report: &GenerationReport);

    /// Polled after `on_generation_start` and after each report; true ends the search
    /// and keeps the result of the last completed generation.
    fn wants_stop(&self) -> bool {
        false
    }
}

/// Writes a legend, then one line per generation, through `log`
pub struct LogObserver {
    pub mode: String,
    pub n_gen: usize,
    pub colorful: bool,
}

impl LogObserver {
    pub fn new(mode: &str, n_gen: usize, colorful: bool) -> LogObserver {
        LogObserver {
            mode: mode.to_string(),
            n_gen,
            colorful,
        }
    }
}

impl Observer for LogObserver {
    fn on_generation_start(&mut self, generation: usize) {
        if generation == 0 {
            cinfo!(self.colorful, "{}", display_generation_legend(&self.mode, self.n_gen));
        }
        log::debug!("Scoring generation {}...", generation);
    }

    fn on_generation(&mut self, report: &GenerationReport) {
        cinfo!(self.colorful, "{}", display_generation(report, self.n_gen));
    }
}

pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_generation(&mut self, _report: &GenerationReport) {}
}
