use crate::data::Data;
use crate::error::{Result, SearchError};
use crate::evaluator::{Evaluation, Evaluator};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

/// Target of a search run
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Subset of the input columns
    Features,
    /// Hidden width, learning rate and L2 penalty of a one-layer network
    Hyperparameters,
    /// Hidden layer widths, ranked by MAE
    Structure,
    /// Hidden layer widths, MAE and RMSE as joint objectives
    Pareto,
}

impl SearchMode {
    pub fn all() -> [SearchMode; 4] {
        [
            SearchMode::Features,
            SearchMode::Hyperparameters,
            SearchMode::Structure,
            SearchMode::Pareto,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            SearchMode::Features => "features",
            SearchMode::Hyperparameters => "params",
            SearchMode::Structure => "structure",
            SearchMode::Pareto => "pareto",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SearchMode::Features => "Feature selection",
            SearchMode::Hyperparameters => "Model hyperparameter synthesis",
            SearchMode::Structure => "Network structure synthesis",
            SearchMode::Pareto => "Network structure optimisation (Pareto front)",
        }
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<SearchMode> {
        match s.to_lowercase().as_str() {
            "features" | "feature" => Ok(SearchMode::Features),
            "params" | "hyperparams" | "hyperparameters" => Ok(SearchMode::Hyperparameters),
            "structure" | "arch" => Ok(SearchMode::Structure),
            "pareto" | "opt" => Ok(SearchMode::Pareto),
            other => Err(SearchError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Hyperparameters of a single hidden layer network
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct HyperParams {
    pub hidden: usize,
    pub learning_rate: f64,
    pub alpha: f64,
}

/// Decoded configuration of an individual, as exposed to result consumers
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Configuration {
    Features { names: Vec<String>, mask: Vec<bool> },
    Hyperparameters(HyperParams),
    Architecture { layers: Vec<usize> },
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Configuration::Features { names, .. } => write!(f, "[{}]", names.join(", ")),
            Configuration::Hyperparameters(hp) => write!(
                f,
                "h={}, lr={:.2e}, alpha={:.2e}",
                hp.hidden, hp.learning_rate, hp.alpha
            ),
            Configuration::Architecture { layers } => write!(
                f,
                "{}",
                layers.iter().map(|w| w.to_string()).collect::<Vec<_>>().join("x")
            ),
        }
    }
}

/// One search target: how candidates are encoded, bred and scored.
///
/// The GA driver is generic over this trait; every stochastic operation receives the
/// driver's random generator explicitly.
pub trait Problem: Sync {
    type Genome: Clone + PartialEq + fmt::Debug + Send + Sync;

    fn mode(&self) -> SearchMode;

    /// Uniformly random genome
    fn random(&self, rng: &mut ChaCha8Rng) -> Self::Genome;

    fn initialize(&self, population_size: usize, rng: &mut ChaCha8Rng) -> Vec<Self::Genome> {
        (0..population_size).map(|_| self.random(rng)).collect()
    }

    /// Single point crossover: prefix of `p1`, suffix of `p2`
    fn cross_over(&self, p1: &Self::Genome, p2: &Self::Genome, rng: &mut ChaCha8Rng) -> Self::Genome;

    fn mutate(&self, genome: &mut Self::Genome, rng: &mut ChaCha8Rng);

    /// Child of two parents
    fn breed(&self, p1: &Self::Genome, p2: &Self::Genome, rng: &mut ChaCha8Rng) -> Self::Genome {
        let mut child = self.cross_over(p1, p2, rng);
        self.mutate(&mut child, rng);
        child
    }

    fn evaluate(&self, evaluator: &Evaluator, genome: &Self::Genome, running: &AtomicBool) -> Result<Evaluation>;

    /// Size of the model a genome stands for; reported, never ranked on
    fn complexity(&self, genome: &Self::Genome) -> usize;

    fn configuration(&self, data: &Data, genome: &Self::Genome) -> Configuration;

    /// Number of minimised objectives: 1 ranks by MAE, 2 keeps the (MAE, RMSE) front
    fn objectives(&self) -> usize {
        1
    }

    /// Size of the top window parents are drawn from, 0 for the whole population
    fn parent_pool(&self) -> usize;
}

/// Cut index of a single point crossover over `len` genes, `None` when no cut is possible.
pub fn cut_point(len: usize, rng: &mut ChaCha8Rng) -> Option<usize> {
    if len <= 1 {
        None
    } else {
        Some(rng.gen_range(1..len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_mode_parsing_accepts_historic_names() {
        assert_eq!("opt".parse::<SearchMode>().unwrap(), SearchMode::Pareto);
        assert_eq!("params".parse::<SearchMode>().unwrap(), SearchMode::Hyperparameters);
        assert_eq!("Structure".parse::<SearchMode>().unwrap(), SearchMode::Structure);
        assert!("nsga".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_mode_key_round_trip() {
        for mode in SearchMode::all() {
            assert_eq!(mode.key().parse::<SearchMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_cut_point_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(cut_point(0, &mut rng), None);
        assert_eq!(cut_point(1, &mut rng), None);
        for _ in 0..100 {
            let cut = cut_point(5, &mut rng).unwrap();
            assert!((1..5).contains(&cut));
        }
        assert_eq!(cut_point(2, &mut rng), Some(1));
    }

    #[test]
    fn test_configuration_display() {
        let arch = Configuration::Architecture { layers: vec![32, 16] };
        assert_eq!(arch.to_string(), "32x16");
        let feats = Configuration::Features {
            names: vec!["temp".to_string(), "hour".to_string()],
            mask: vec![true, false, true],
        };
        assert_eq!(feats.to_string(), "[temp, hour]");
    }
}
