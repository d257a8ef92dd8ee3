use crate::data::Data;
use crate::error::Result;
use crate::evaluator::{Evaluation, Evaluator};
use crate::param;
use crate::problem::{cut_point, Configuration, HyperParams, Problem, SearchMode};
use rand::prelude::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::AtomicBool;

/// Domain of one continuous hyperparameter: explicit choices, or a log-uniform range.
#[derive(Clone, Debug, PartialEq)]
pub enum LogDomain {
    Choices(Vec<f64>),
    /// Base-10 exponents, inclusive
    Range(f64, f64),
}

impl LogDomain {
    fn new(range: (f64, f64), choices: &[f64]) -> LogDomain {
        if choices.is_empty() {
            LogDomain::Range(range.0, range.1)
        } else {
            LogDomain::Choices(choices.to_vec())
        }
    }

    pub fn draw(&self, rng: &mut ChaCha8Rng) -> f64 {
        match self {
            LogDomain::Choices(c) => *c.choose(rng).unwrap_or(&1e-3),
            LogDomain::Range(low, high) if low == high => 10f64.powf(*low),
            LogDomain::Range(low, high) => 10f64.powf(rng.gen_range(*low..=*high)),
        }
    }
}

/// Hyperparameter search over a single hidden layer network: (width, learning rate, L2 penalty).
pub struct HyperparameterSearch {
    pub hidden_choices: Vec<usize>,
    pub hidden_range: (usize, usize),
    pub learning_rate: LogDomain,
    pub alpha: LogDomain,
    pub mutation_rate: f64,
    pub parent_pool: usize,
}

impl HyperparameterSearch {
    pub fn new(param: &param::Hyperparams) -> HyperparameterSearch {
        HyperparameterSearch {
            hidden_choices: param.hidden_choices.clone(),
            hidden_range: (param.hidden_min, param.hidden_max),
            learning_rate: LogDomain::new(param.lr_log_range, &param.lr_choices),
            alpha: LogDomain::new(param.alpha_log_range, &param.alpha_choices),
            mutation_rate: param.mutation_rate,
            parent_pool: param.parent_pool,
        }
    }

    fn draw_hidden(&self, rng: &mut ChaCha8Rng) -> usize {
        match self.hidden_choices.choose(rng) {
            Some(&h) => h,
            None => rng.gen_range(self.hidden_range.0..=self.hidden_range.1),
        }
    }
}

impl Problem for HyperparameterSearch {
    type Genome = HyperParams;

    fn mode(&self) -> SearchMode {
        SearchMode::Hyperparameters
    }

    fn random(&self, rng: &mut ChaCha8Rng) -> HyperParams {
        HyperParams {
            hidden: self.draw_hidden(rng),
            learning_rate: self.learning_rate.draw(rng),
            alpha: self.alpha.draw(rng),
        }
    }

    /// The tuple is read as (hidden, learning_rate, alpha); the cut falls after the first or second field.
    fn cross_over(&self, p1: &HyperParams, p2: &HyperParams, rng: &mut ChaCha8Rng) -> HyperParams {
        match cut_point(3, rng) {
            Some(1) => HyperParams {
                hidden: p1.hidden,
                learning_rate: p2.learning_rate,
                alpha: p2.alpha,
            },
            _ => HyperParams {
                hidden: p1.hidden,
                learning_rate: p1.learning_rate,
                alpha: p2.alpha,
            },
        }
    }

    fn mutate(&self, genome: &mut HyperParams, rng: &mut ChaCha8Rng) {
        if rng.gen_bool(self.mutation_rate) {
            genome.hidden = self.draw_hidden(rng);
        }
        if rng.gen_bool(self.mutation_rate) {
            genome.learning_rate = self.learning_rate.draw(rng);
        }
        if rng.gen_bool(self.mutation_rate) {
            genome.alpha = self.alpha.draw(rng);
        }
    }

    fn evaluate(&self, evaluator: &Evaluator, genome: &HyperParams, running: &AtomicBool) -> Result<Evaluation> {
        let model = evaluator
            .model(vec![genome.hidden])
            .with_learning_rate(genome.learning_rate)
            .with_alpha(genome.alpha);
        evaluator.evaluate(&evaluator.data().all_columns(), &model, running)
    }

    fn complexity(&self, genome: &HyperParams) -> usize {
        genome.hidden
    }

    fn configuration(&self, _data: &Data, genome: &HyperParams) -> Configuration {
        Configuration::Hyperparameters(*genome)
    }

    fn parent_pool(&self) -> usize {
        self.parent_pool
    }
}
