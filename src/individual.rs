use crate::evaluator::{Evaluation, SENTINEL};
use crate::pareto::MultiObjective;
use crate::problem::{Configuration, SearchMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate of a population: a genome and, once scored, its cross-validated errors.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Individual<G> {
    pub genome: G,

    /// Mean absolute error across folds
    pub mae: f64,
    /// Root mean squared error across folds
    pub rmse: f64,
    /// Standard deviation of the fold MAEs
    pub std_mae: f64,
    /// Size of the model encoded by the genome
    pub complexity: usize,

    /// Generation that produced the individual
    pub epoch: usize,
    /// False until the individual is scored; scored individuals are never evaluated again
    pub fitted: bool,
}

impl<G> Individual<G> {
    pub fn new(genome: G, epoch: usize) -> Individual<G> {
        Individual {
            genome,
            mae: SENTINEL,
            rmse: SENTINEL,
            std_mae: SENTINEL,
            complexity: 0,
            epoch,
            fitted: false,
        }
    }

    pub fn set_evaluation(&mut self, evaluation: Evaluation, complexity: usize) {
        self.mae = evaluation.mae;
        self.rmse = evaluation.rmse;
        self.std_mae = evaluation.std_mae;
        self.complexity = complexity;
        self.fitted = true;
    }

    pub fn evaluation(&self) -> Evaluation {
        Evaluation {
            mae: self.mae,
            rmse: self.rmse,
            std_mae: self.std_mae,
        }
    }
}

impl<G> MultiObjective for Individual<G> {
    fn objectives(&self) -> Vec<f64> {
        vec![self.mae, self.rmse]
    }
}

/// Scored configuration as handed to result consumers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Record {
    pub mode: SearchMode,
    pub mae: f64,
    pub rmse: f64,
    pub std_mae: f64,
    pub complexity: usize,
    pub epoch: usize,
    pub configuration: Configuration,
    pub description: String,
}

impl Record {
    pub fn new<G>(mode: SearchMode, individual: &Individual<G>, configuration: Configuration) -> Record {
        Record {
            mode,
            mae: individual.mae,
            rmse: individual.rmse,
            std_mae: individual.std_mae,
            complexity: individual.complexity,
            epoch: individual.epoch,
            description: configuration.to_string(),
            configuration,
        }
    }

    /// Selected feature names, for feature selection records
    pub fn features(&self) -> Option<&[String]> {
        match &self.configuration {
            Configuration::Features { names, .. } => Some(names),
            _ => None,
        }
    }
}

impl MultiObjective for Record {
    fn objectives(&self) -> Vec<f64> {
        vec![self.mae, self.rmse]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [gen {}] MAE {:.4} (±{:.4}) | RMSE {:.4} | complexity {}",
            self.description, self.epoch, self.mae, self.std_mae, self.rmse, self.complexity
        )
    }
}
