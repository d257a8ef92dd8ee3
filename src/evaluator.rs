use crate::cv::CV;
use crate::data::Data;
use crate::error::Result;
use crate::mlp::{MlpConfig, MlpRegressor};
use crate::param;
use log::debug;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::sync::atomic::{AtomicBool, Ordering};

/// Error returned for candidates that cannot be scored (no feature, or evaluation cancelled).
pub const SENTINEL: f64 = 1e9;

/// Cross-validated errors of one candidate configuration
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Mean absolute error, averaged across folds
    pub mae: f64,
    /// Root mean squared error, averaged across folds
    pub rmse: f64,
    /// Population standard deviation of the fold MAEs
    pub std_mae: f64,
}

impl Evaluation {
    pub fn sentinel() -> Evaluation {
        Evaluation {
            mae: SENTINEL,
            rmse: SENTINEL,
            std_mae: SENTINEL,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.mae == SENTINEL && self.rmse == SENTINEL && self.std_mae == SENTINEL
    }
}

/// Mean absolute error and root mean squared error of a prediction
pub fn errors(truth: &[f64], prediction: &[f64]) -> (f64, f64) {
    let n = truth.len() as f64;
    let (abs, sq) = truth
        .iter()
        .zip(prediction)
        .fold((0.0, 0.0), |(abs, sq), (t, p)| {
            let e = t - p;
            (abs + e.abs(), sq + e * e)
        });
    (abs / n, (sq / n).sqrt())
}

#[inline]
pub fn should_stop(running: &AtomicBool) -> bool {
    !running.load(Ordering::Relaxed)
}

/// Trains candidate models under time-series cross validation.
///
/// The evaluator only reads the dataset; one instance is shared by every worker thread.
pub struct Evaluator<'a> {
    data: &'a Data,
    cv: CV,
    cv_param: param::CV,
}

impl<'a> Evaluator<'a> {
    pub fn new(data: &'a Data, cv_param: &param::CV) -> Result<Evaluator<'a>> {
        let cv = CV::new(data.sample_len, cv_param.splits)?;
        Ok(Evaluator {
            data,
            cv,
            cv_param: cv_param.clone(),
        })
    }

    pub fn data(&self) -> &Data {
        self.data
    }

    pub fn cv(&self) -> &CV {
        &self.cv
    }

    /// Model configuration with the evaluation budget (iterations, seed...) filled in.
    pub fn model(&self, hidden_layers: Vec<usize>) -> MlpConfig {
        MlpConfig::new(hidden_layers, &self.cv_param)
    }

    /// Cross-validated errors of `model` trained on `columns`.
    ///
    /// Returns the sentinel when `columns` is empty or when `running` is (or becomes) false
    /// before a fold starts. Training failures are returned as errors.
    pub fn evaluate(&self, columns: &[usize], model: &MlpConfig, running: &AtomicBool) -> Result<Evaluation> {
        if should_stop(running) || columns.is_empty() {
            return Ok(Evaluation::sentinel());
        }

        let mut maes: Vec<f64> = Vec::with_capacity(self.cv.len());
        let mut rmses: Vec<f64> = Vec::with_capacity(self.cv.len());

        for fold in &self.cv.folds {
            if should_stop(running) {
                return Ok(Evaluation::sentinel());
            }

            let x_train = self.data.design(fold.train.clone(), columns);
            let y_train = self.data.targets(fold.train.clone());
            let regressor = MlpRegressor::fit(model, &x_train, columns.len(), y_train)?;

            let x_valid = self.data.design(fold.validation.clone(), columns);
            let prediction = regressor.predict(&x_valid);
            let (mae, rmse) = errors(self.data.targets(fold.validation.clone()), &prediction);
            maes.push(mae);
            rmses.push(rmse);
        }

        let evaluation = Evaluation {
            mae: maes.iter().mean(),
            rmse: rmses.iter().mean(),
            std_mae: maes.iter().population_std_dev(),
        };
        debug!(
            "{:?} on {} column(s): MAE {:.4} RMSE {:.4}",
            model.hidden_layers,
            columns.len(),
            evaluation.mae,
            evaluation.rmse
        );

        Ok(evaluation)
    }
}
