use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use loadsynth::experiment::{export_csv, Experiment};
use loadsynth::param::{self, Param};
use loadsynth::{run, version};
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn start_logger(param: &Param) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(&param.general.log_level)?;
    if param.general.log_base.is_empty() {
        logger.start()
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .duplicate_to_stderr(Duplicate::Info)
            .start()
    }
}

/// Path of one experiment file: `save_exp` itself for a single mode, `<stem>_<mode>.<ext>` otherwise
fn experiment_path(save_exp: &str, experiment: &Experiment, several: bool) -> PathBuf {
    let path = Path::new(save_exp);
    if !several {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("experiment");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, experiment.mode.key(), ext),
        None => format!("{}_{}", stem, experiment.mode.key()),
    };
    path.with_file_name(name)
}

fn main() {
    let param_file = std::env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(&param_file) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot read parameters from {}: {}", param_file, e);
            process::exit(1);
        }
    };

    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            process::exit(1);
        }
    };

    info!("loadsynth v{}", version());

    let running = Arc::new(AtomicBool::new(true));
    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            let running = running.clone();
            thread::spawn(move || {
                for signal in signals.forever() {
                    warn!("Signal {} received, stopping after the current evaluation...", signal);
                    running.store(false, Ordering::Relaxed);
                }
            });
        }
        Err(e) => warn!("Signal handling unavailable: {}", e),
    }

    let experiments = match run(&param, running) {
        Ok(experiments) => experiments,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if !param.general.save_exp.is_empty() {
        let several = experiments.len() > 1;
        for experiment in &experiments {
            let path = experiment_path(&param.general.save_exp, experiment, several);
            match experiment.save_auto(&path) {
                Ok(()) => info!("Experiment saved to {}", path.display()),
                Err(e) => error!("Cannot save experiment to {}: {}", path.display(), e),
            }
        }
    }

    if !param.general.export_csv.is_empty() {
        if let Err(e) = export_csv(&experiments, &param.general.export_csv) {
            error!("Cannot export results to {}: {}", param.general.export_csv, e);
            process::exit(1);
        }
    }
}
