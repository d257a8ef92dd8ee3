use crate::data::Data;
use crate::error::Result;
use crate::evaluator::{Evaluation, Evaluator};
use crate::param;
use crate::problem::{Configuration, Problem, SearchMode};
use log::debug;
use rand::prelude::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::AtomicBool;

// Redraws attempted before a child identical to a parent is accepted
const MAX_NOVELTY_ATTEMPTS: usize = 16;

/// Architecture search: the genome lists hidden layer widths, input side first.
pub struct StructureSearch {
    pub min_layers: usize,
    pub max_layers: usize,
    pub width_min: usize,
    pub width_max: usize,
    pub mutation_rate: f64,
    pub parent_pool: usize,
    /// Re-mutate children identical to one of their parents
    pub force_novelty: bool,
}

impl StructureSearch {
    pub fn new(param: &param::Structure) -> StructureSearch {
        StructureSearch {
            min_layers: param.min_layers,
            max_layers: param.max_layers,
            width_min: param.width_min,
            width_max: param.width_max,
            mutation_rate: param.mutation_rate,
            parent_pool: param.parent_pool,
            force_novelty: param.force_novelty,
        }
    }

    fn draw_width(&self, rng: &mut ChaCha8Rng) -> usize {
        rng.gen_range(self.width_min..=self.width_max)
    }

    /// Redraw the width of one random layer
    fn redraw_layer(&self, genome: &mut Vec<usize>, rng: &mut ChaCha8Rng) {
        if genome.is_empty() {
            return;
        }
        let idx = rng.gen_range(0..genome.len());
        genome[idx] = self.draw_width(rng);
    }
}

impl Problem for StructureSearch {
    type Genome = Vec<usize>;

    fn mode(&self) -> SearchMode {
        SearchMode::Structure
    }

    fn random(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let depth = rng.gen_range(self.min_layers..=self.max_layers);
        (0..depth).map(|_| self.draw_width(rng)).collect()
    }

    /// The cut is drawn within the shallower parent and the child keeps the depth of `p2`.
    fn cross_over(&self, p1: &Vec<usize>, p2: &Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let min_len = p1.len().min(p2.len());
        if min_len > 1 {
            let cut = rng.gen_range(1..min_len);
            p1[..cut].iter().chain(&p2[cut..]).copied().collect()
        } else {
            [p1, p2].choose(rng).map(|p| (*p).clone()).unwrap_or_default()
        }
    }

    fn mutate(&self, genome: &mut Vec<usize>, rng: &mut ChaCha8Rng) {
        if rng.gen_bool(self.mutation_rate) {
            self.redraw_layer(genome, rng);
        }
    }

    fn breed(&self, p1: &Vec<usize>, p2: &Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut child = self.cross_over(p1, p2, rng);
        self.mutate(&mut child, rng);

        if self.force_novelty {
            let mut attempts = 0;
            while (&child == p1 || &child == p2) && attempts < MAX_NOVELTY_ATTEMPTS {
                self.redraw_layer(&mut child, rng);
                attempts += 1;
            }
            if &child == p1 || &child == p2 {
                debug!("No novel child found for parents {:?} and {:?}", p1, p2);
            }
        }

        child
    }

    fn evaluate(&self, evaluator: &Evaluator, genome: &Vec<usize>, running: &AtomicBool) -> Result<Evaluation> {
        let model = evaluator.model(genome.clone());
        evaluator.evaluate(&evaluator.data().all_columns(), &model, running)
    }

    /// Total number of hidden neurons
    fn complexity(&self, genome: &Vec<usize>) -> usize {
        genome.iter().sum()
    }

    fn configuration(&self, _data: &Data, genome: &Vec<usize>) -> Configuration {
        Configuration::Architecture {
            layers: genome.clone(),
        }
    }

    fn parent_pool(&self) -> usize {
        self.parent_pool
    }
}

/// Architecture search with MAE and RMSE as joint objectives; the result is a Pareto front.
pub struct ParetoStructureSearch {
    pub structure: StructureSearch,
}

impl ParetoStructureSearch {
    pub fn new(structure: &param::Structure, pareto: &param::Pareto) -> ParetoStructureSearch {
        let mut search = StructureSearch::new(structure);
        search.mutation_rate = pareto.mutation_rate;
        search.force_novelty = pareto.force_novelty;
        ParetoStructureSearch { structure: search }
    }
}

impl Problem for ParetoStructureSearch {
    type Genome = Vec<usize>;

    fn mode(&self) -> SearchMode {
        SearchMode::Pareto
    }

    fn random(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        self.structure.random(rng)
    }

    fn cross_over(&self, p1: &Vec<usize>, p2: &Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        self.structure.cross_over(p1, p2, rng)
    }

    fn mutate(&self, genome: &mut Vec<usize>, rng: &mut ChaCha8Rng) {
        self.structure.mutate(genome, rng)
    }

    fn breed(&self, p1: &Vec<usize>, p2: &Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        self.structure.breed(p1, p2, rng)
    }

    fn evaluate(&self, evaluator: &Evaluator, genome: &Vec<usize>, running: &AtomicBool) -> Result<Evaluation> {
        self.structure.evaluate(evaluator, genome, running)
    }

    fn complexity(&self, genome: &Vec<usize>) -> usize {
        self.structure.complexity(genome)
    }

    fn configuration(&self, data: &Data, genome: &Vec<usize>) -> Configuration {
        self.structure.configuration(data, genome)
    }

    fn objectives(&self) -> usize {
        2
    }

    fn parent_pool(&self) -> usize {
        self.structure.parent_pool
    }
}
