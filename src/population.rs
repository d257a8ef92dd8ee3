use crate::error::Result;
use crate::evaluator::{should_stop, Evaluator};
use crate::individual::Individual;
use crate::problem::Problem;
use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::AtomicBool;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Population<G> {
    pub individuals: Vec<Individual<G>>,
}

impl<G: Clone + Send + Sync> Population<G> {
    pub fn new() -> Population<G> {
        Population {
            individuals: Vec::new(),
        }
    }

    /// Unscored population born at `epoch`
    pub fn from_genomes(genomes: Vec<G>, epoch: usize) -> Population<G> {
        Population {
            individuals: genomes.into_iter().map(|g| Individual::new(g, epoch)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Stable sort, ascending MAE: the champion ends up first and ties keep their order.
    pub fn sort(mut self) -> Self {
        self.individuals
            .sort_by(|i, j| i.mae.partial_cmp(&j.mae).unwrap_or(Ordering::Equal));
        self
    }

    pub fn champion(&self) -> Option<&Individual<G>> {
        self.individuals.first()
    }

    /// Score every unfitted individual on `pool`.
    ///
    /// Individuals reached after `running` turned false are left unfitted. The first
    /// evaluation error aborts the whole generation.
    pub fn fit<P>(&mut self, problem: &P, evaluator: &Evaluator, pool: &ThreadPool, running: &AtomicBool) -> Result<()>
    where
        P: Problem<Genome = G>,
    {
        let pending = self.individuals.iter().filter(|i| !i.fitted).count();
        debug!("Fitting {} individual(s)...", pending);

        pool.install(|| {
            self.individuals
                .par_iter_mut()
                .filter(|i| !i.fitted)
                .try_for_each(|i| -> Result<()> {
                    if should_stop(running) {
                        return Ok(());
                    }
                    let evaluation = problem.evaluate(evaluator, &i.genome, running)?;
                    i.set_evaluation(evaluation, problem.complexity(&i.genome));
                    Ok(())
                })
        })
    }
}

impl<G: Clone + Send + Sync> Default for Population<G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use crate::evaluator::Evaluation;
    use crate::features::FeatureSelection;
    use crate::param;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scored(mae: f64, epoch: usize) -> Individual<Vec<bool>> {
        let mut i = Individual::new(vec![true], epoch);
        i.set_evaluation(
            Evaluation {
                mae,
                rmse: mae,
                std_mae: 0.0,
            },
            1,
        );
        i
    }

    #[test]
    fn test_sort_is_ascending_and_stable() {
        let pop = Population {
            individuals: vec![scored(3.0, 0), scored(1.0, 1), scored(2.0, 2), scored(1.0, 3)],
        };
        let sorted = pop.sort();
        let maes: Vec<f64> = sorted.individuals.iter().map(|i| i.mae).collect();
        assert_eq!(maes, vec![1.0, 1.0, 2.0, 3.0]);
        assert_eq!(sorted.individuals[0].epoch, 1);
        assert_eq!(sorted.individuals[1].epoch, 3);
    }

    #[test]
    fn test_fit_scores_only_unfitted_individuals() {
        let data = Data::test();
        let mut cv = param::CV::default();
        cv.splits = 2;
        cv.max_iter = 20;
        let evaluator = Evaluator::new(&data, &cv).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let running = AtomicBool::new(true);
        let problem = FeatureSelection::new(data.feature_len, &param::Features::default());

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::from_genomes(problem.initialize(3, &mut rng), 0);
        let mut elite = scored(0.123, 0);
        elite.genome = vec![true; data.feature_len];
        pop.individuals.push(elite);

        pop.fit(&problem, &evaluator, &pool, &running).unwrap();
        assert!(pop.individuals.iter().all(|i| i.fitted));
        assert_eq!(pop.individuals[3].mae, 0.123, "a scored individual must keep its scores");
    }

    #[test]
    fn test_fit_after_stop_leaves_individuals_unfitted() {
        let data = Data::test();
        let mut cv = param::CV::default();
        cv.splits = 2;
        let evaluator = Evaluator::new(&data, &cv).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let running = AtomicBool::new(false);
        let problem = FeatureSelection::new(data.feature_len, &param::Features::default());

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::from_genomes(problem.initialize(4, &mut rng), 0);
        pop.fit(&problem, &evaluator, &pool, &running).unwrap();
        assert!(pop.individuals.iter().all(|i| !i.fitted));
    }
}
