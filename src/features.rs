use crate::data::Data;
use crate::error::Result;
use crate::evaluator::{Evaluation, Evaluator};
use crate::param;
use crate::problem::{cut_point, Configuration, Problem, SearchMode};
use rand::prelude::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::AtomicBool;

/// Feature subset search: one flag per input column, scored with a fixed one-layer network.
pub struct FeatureSelection {
    pub feature_len: usize,
    pub hidden_layer: usize,
    pub mutation_rate: f64,
    pub parent_pool: usize,
}

impl FeatureSelection {
    pub fn new(feature_len: usize, param: &param::Features) -> FeatureSelection {
        FeatureSelection {
            feature_len,
            hidden_layer: param.hidden_layer,
            mutation_rate: param.mutation_rate,
            parent_pool: param.parent_pool,
        }
    }
}

/// Indices of the selected columns
pub fn selected(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(j, &on)| if on { Some(j) } else { None })
        .collect()
}

impl Problem for FeatureSelection {
    type Genome = Vec<bool>;

    fn mode(&self) -> SearchMode {
        SearchMode::Features
    }

    fn random(&self, rng: &mut ChaCha8Rng) -> Vec<bool> {
        (0..self.feature_len).map(|_| rng.gen_bool(0.5)).collect()
    }

    fn cross_over(&self, p1: &Vec<bool>, p2: &Vec<bool>, rng: &mut ChaCha8Rng) -> Vec<bool> {
        match cut_point(p1.len(), rng) {
            Some(cut) => p1[..cut].iter().chain(&p2[cut..]).copied().collect(),
            None => [p1, p2].choose(rng).map(|p| (*p).clone()).unwrap_or_default(),
        }
    }

    fn mutate(&self, genome: &mut Vec<bool>, rng: &mut ChaCha8Rng) {
        for bit in genome.iter_mut() {
            if rng.gen_bool(self.mutation_rate) {
                *bit = !*bit;
            }
        }
    }

    fn evaluate(&self, evaluator: &Evaluator, genome: &Vec<bool>, running: &AtomicBool) -> Result<Evaluation> {
        let model = evaluator.model(vec![self.hidden_layer]);
        evaluator.evaluate(&selected(genome), &model, running)
    }

    fn complexity(&self, genome: &Vec<bool>) -> usize {
        genome.iter().filter(|&&on| on).count()
    }

    fn configuration(&self, data: &Data, genome: &Vec<bool>) -> Configuration {
        Configuration::Features {
            names: data.feature_names(&selected(genome)),
            mask: genome.clone(),
        }
    }

    fn parent_pool(&self) -> usize {
        self.parent_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn problem(feature_len: usize, mutation_rate: f64) -> FeatureSelection {
        let mut p = param::Features::default();
        p.mutation_rate = mutation_rate;
        FeatureSelection::new(feature_len, &p)
    }

    #[test]
    fn test_random_mask_has_one_flag_per_column() {
        let fs = problem(7, 0.2);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pop = fs.initialize(10, &mut rng);
        assert_eq!(pop.len(), 10);
        assert!(pop.iter().all(|m| m.len() == 7));
    }

    #[test]
    fn test_cross_over_is_prefix_plus_suffix() {
        let fs = problem(6, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let p1 = vec![true; 6];
        let p2 = vec![false; 6];
        for _ in 0..50 {
            let child = fs.cross_over(&p1, &p2, &mut rng);
            assert_eq!(child.len(), 6);
            let cut = child.iter().position(|b| !b).unwrap();
            assert!(cut >= 1 && cut <= 5);
            assert!(child[cut..].iter().all(|b| !b));
        }
    }

    #[test]
    fn test_cross_over_single_column_copies_a_parent() {
        let fs = problem(1, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let child = fs.cross_over(&vec![true], &vec![false], &mut rng);
        assert!(child == vec![true] || child == vec![false]);
    }

    #[test]
    fn test_mutation_rate_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut mask = vec![true, false, true, false];

        problem(4, 0.0).mutate(&mut mask, &mut rng);
        assert_eq!(mask, vec![true, false, true, false]);

        problem(4, 1.0).mutate(&mut mask, &mut rng);
        assert_eq!(mask, vec![false, true, false, true]);
    }

    #[test]
    fn test_empty_mask_is_scored_with_sentinel() {
        let data = Data::test();
        let mut cv = param::CV::default();
        cv.splits = 2;
        let evaluator = Evaluator::new(&data, &cv).unwrap();
        let running = AtomicBool::new(true);
        let fs = problem(data.feature_len, 0.2);
        let evaluation = fs.evaluate(&evaluator, &vec![false; data.feature_len], &running).unwrap();
        assert!(evaluation.is_sentinel());
    }

    #[test]
    fn test_configuration_lists_selected_names() {
        let data = Data::test_with_shape(10, 3);
        let fs = problem(3, 0.2);
        let mask = vec![true, false, true];
        assert_eq!(fs.complexity(&mask), 2);
        match fs.configuration(&data, &mask) {
            Configuration::Features { names, mask: m } => {
                assert_eq!(names, vec!["f0".to_string(), "f2".to_string()]);
                assert_eq!(m, mask);
            }
            other => panic!("unexpected configuration {:?}", other),
        }
    }
}
