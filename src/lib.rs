#![allow(non_snake_case)]

pub mod cv;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod experiment;
pub mod features;
pub mod ga;
pub mod hyperparams;
pub mod individual;
pub mod mlp;
pub mod observer;
pub mod param;
pub mod pareto;
pub mod population;
pub mod problem;
pub mod structure;
pub mod utils;

use crate::data::Data;
use crate::error::Result;
use crate::evaluator::should_stop;
use crate::experiment::Experiment;
use crate::features::FeatureSelection;
use crate::ga::ga;
use crate::hyperparams::HyperparameterSearch;
use crate::observer::LogObserver;
use crate::param::Param;
use crate::problem::SearchMode;
use crate::structure::{ParetoStructureSearch, StructureSearch};
use chrono::Local;
use log::{debug, info};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Crate version, suffixed with the git hash when it was known at build time
pub fn version() -> String {
    match option_env!("LOADSYNTH_GIT_SHA") {
        Some(sha) => format!("{}#{}", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Load the configured dataset and run every requested mode on it.
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Vec<Experiment>> {
    param.check()?;
    let modes = param.modes()?;

    debug!("Loading dataset {}...", param.data.dataset);
    let data = Data::load(&param.data.dataset, &param.data)?;
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);

    run_on_data(&data, &param.data.dataset, &modes, param, running)
}

/// Run `modes` in sequence on an already loaded dataset.
///
/// A cleared stop flag ends the sequence: the interrupted mode is still returned, the
/// following ones are skipped.
pub fn run_on_data(
    data: &Data,
    dataset: &str,
    modes: &[SearchMode],
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<Vec<Experiment>> {
    param.check()?;
    let mut experiments = Vec::with_capacity(modes.len());

    for mode in modes {
        if should_stop(&running) {
            info!("Signal received, {} skipped", mode.description());
            continue;
        }

        let experiment = run_mode(data, dataset, *mode, param, running.clone())?;
        cinfo!(param.general.display_colorful, "{}", experiment.display_results());
        experiments.push(experiment);
    }

    Ok(experiments)
}

/// One search of `mode` on `data`, logged through a [`LogObserver`].
pub fn run_mode(
    data: &Data,
    dataset: &str,
    mode: SearchMode,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<Experiment> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let mut observer = LogObserver::new(mode.description(), param.ga.n_gen, param.general.display_colorful);

    let search = match mode {
        SearchMode::Features => {
            let problem = FeatureSelection::new(data.feature_len, &param.features);
            ga(&problem, data, param, &mut observer, running)?
        }
        SearchMode::Hyperparameters => {
            let problem = HyperparameterSearch::new(&param.hyperparams);
            ga(&problem, data, param, &mut observer, running)?
        }
        SearchMode::Structure => {
            let problem = StructureSearch::new(&param.structure);
            ga(&problem, data, param, &mut observer, running)?
        }
        SearchMode::Pareto => {
            let problem = ParetoStructureSearch::new(&param.structure, &param.pareto);
            ga(&problem, data, param, &mut observer, running)?
        }
    };

    Ok(Experiment::new(
        dataset,
        mode,
        param,
        search,
        &timestamp,
        &version(),
        start.elapsed().as_secs_f64(),
    ))
}
