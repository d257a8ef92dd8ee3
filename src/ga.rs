use crate::data::Data;
use crate::error::Result;
use crate::evaluator::{should_stop, Evaluator};
use crate::individual::{Individual, Record};
use crate::observer::{GenerationReport, Observer};
use crate::pareto::{non_dominated, Archive, ParetoStrategy};
use crate::param::Param;
use crate::population::Population;
use crate::problem::Problem;
use log::{debug, info};
use rand::prelude::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Why a search ended
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested generation ran
    Completed,
    /// The stop flag was cleared
    Cancelled,
    /// The observer asked for the search to end
    ObserverRequest,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// Champion of a single objective search
    Best(Record),
    /// Pareto front of a two objective search, ascending MAE
    Front(Vec<Record>),
}

impl SearchOutcome {
    pub fn records(&self) -> Vec<&Record> {
        match self {
            SearchOutcome::Best(record) => vec![record],
            SearchOutcome::Front(front) => front.iter().collect(),
        }
    }
}

/// Result of [`ga`]. `outcome` is `None` when no generation completed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Search {
    pub outcome: Option<SearchOutcome>,
    pub history: Vec<GenerationReport>,
    pub stop_reason: StopReason,
}

//-----------------------------------------------------------------------------
// Genetic Algorithm core functions
//-----------------------------------------------------------------------------

/// Main function to run the genetic algorithm
///
/// # Arguments
///
/// * `problem` - The search variant: encoding, breeding and scoring of genomes.
/// * `data` - The dataset candidates are cross-validated on.
/// * `param` - Parameters of the run (`ga`, `cv`, `general` and `pareto` sections are read).
/// * `observer` - Progress sink, notified once per generation.
/// * `running` - Atomic boolean cleared to stop the search.
///
/// # Returns
///
/// The champion (or the Pareto front), the per-generation history and the reason the search ended.
///
/// # Errors
///
/// Fails before any evaluation when `param` does not pass [`Param::check`], when the dataset
/// is too short for the requested splits or when the thread pool cannot be built. Fails
/// mid-run when a model cannot be trained.
pub fn ga<P: Problem>(
    problem: &P,
    data: &Data,
    param: &Param,
    observer: &mut dyn Observer,
    running: Arc<AtomicBool>,
) -> Result<Search> {
    let time = Instant::now();

    param.check()?;
    let evaluator = Evaluator::new(data, &param.cv)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(param.general.thread_number)
        .build()?;

    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);
    let pop = Population::from_genomes(problem.initialize(param.ga.population_size, &mut rng), 0);

    info!(
        "{}: population size {}, {} generation(s), {} fold(s), {} thread(s)",
        problem.mode().description(),
        pop.len(),
        param.ga.n_gen,
        evaluator.cv().len(),
        pool.current_num_threads()
    );

    let search = iterative_evolution(pop, problem, &evaluator, &pool, param, observer, &running, &mut rng)?;

    info!(
        "Genetic algorithm computed {} generation(s) in {:.2?}",
        search.history.len(),
        time.elapsed()
    );

    Ok(search)
}

/// Generation loop: score, rank, breed, report, until a stop criterion is met
///
/// # Arguments
///
/// * `pop` - Initial, unscored population.
/// * `problem` - The search variant.
/// * `evaluator` - Cross-validation evaluator shared by the worker threads.
/// * `pool` - Thread pool the evaluations run on.
/// * `param` - Parameters of the run.
/// * `observer` - Progress sink.
/// * `running` - Stop flag.
/// * `rng` - Random number generator used for breeding.
#[allow(clippy::too_many_arguments)]
pub fn iterative_evolution<P: Problem>(
    mut pop: Population<P::Genome>,
    problem: &P,
    evaluator: &Evaluator,
    pool: &rayon::ThreadPool,
    param: &Param,
    observer: &mut dyn Observer,
    running: &AtomicBool,
    rng: &mut ChaCha8Rng,
) -> Result<Search> {
    let n_gen = param.ga.n_gen;
    let two_objectives = problem.objectives() > 1;

    let mut history: Vec<GenerationReport> = vec![];
    let mut archive: Archive<P::Genome, Individual<P::Genome>> = Archive::new();
    let mut completed: Option<Population<P::Genome>> = None;
    let mut stop_reason = StopReason::Completed;

    for generation in 0..n_gen {
        observer.on_generation_start(generation);

        if should_stop(running) {
            info!("Signal received");
            stop_reason = StopReason::Cancelled;
            break;
        }

        if observer.wants_stop() {
            info!("Stop requested by observer before generation {}", generation);
            stop_reason = StopReason::ObserverRequest;
            break;
        }

        pop.fit(problem, evaluator, pool, running)?;

        // A generation cut short by the stop flag is not trusted
        if should_stop(running) {
            info!("Signal received, generation {} discarded", generation);
            stop_reason = StopReason::Cancelled;
            break;
        }

        let scored = mem::take(&mut pop).sort();

        let front_size = if two_objectives {
            for individual in &scored.individuals {
                archive.insert(individual.genome.clone(), individual.clone());
            }
            Some(match param.pareto.strategy {
                ParetoStrategy::generation => non_dominated(&scored.individuals).len(),
                ParetoStrategy::cumulative => archive.len(),
            })
        } else {
            None
        };

        if generation + 1 < n_gen {
            pop = evolve(&scored, problem, param.ga.population_size, generation + 1, rng);
        }

        let report = match scored.champion() {
            Some(champion) => {
                let configuration = problem.configuration(evaluator.data(), &champion.genome);
                GenerationReport {
                    generation,
                    mae: champion.mae,
                    rmse: champion.rmse,
                    std_mae: champion.std_mae,
                    complexity: champion.complexity,
                    description: configuration.to_string(),
                    front_size,
                }
            }
            None => break,
        };
        completed = Some(scored);

        observer.on_generation(&report);
        history.push(report);

        if observer.wants_stop() {
            info!("Stop requested by observer after generation {}", generation);
            stop_reason = StopReason::ObserverRequest;
            break;
        }
    }

    if stop_reason == StopReason::Completed {
        info!("Reach max generation");
    }

    let outcome = completed.map(|last| {
        if two_objectives {
            let front = match param.pareto.strategy {
                ParetoStrategy::generation => non_dominated(&last.individuals),
                ParetoStrategy::cumulative => archive.items(),
            };
            let mut records: Vec<Record> = front
                .iter()
                .map(|i| Record::new(problem.mode(), i, problem.configuration(evaluator.data(), &i.genome)))
                .collect();
            records.sort_by(|a, b| a.mae.partial_cmp(&b.mae).unwrap_or(std::cmp::Ordering::Equal));
            SearchOutcome::Front(records)
        } else {
            // sorted population is never empty here
            let champion = &last.individuals[0];
            SearchOutcome::Best(Record::new(
                problem.mode(),
                champion,
                problem.configuration(evaluator.data(), &champion.genome),
            ))
        }
    });

    Ok(Search {
        outcome,
        history,
        stop_reason,
    })
}

/// Build the next generation: the champion first, then children of sampled parents
///
/// # Arguments
///
/// * `pop` - The scored population, sorted by ascending MAE.
/// * `problem` - The search variant breeding the children.
/// * `population_size` - Size of the next generation.
/// * `epoch` - Index of the next generation, stamped on the children.
/// * `rng` - Random number generator.
///
/// # Returns
///
/// A population holding the unchanged champion at index 0 and unscored children.
pub fn evolve<P: Problem>(
    pop: &Population<P::Genome>,
    problem: &P,
    population_size: usize,
    epoch: usize,
    rng: &mut ChaCha8Rng,
) -> Population<P::Genome> {
    let mut new_pop = Population::new();

    if let Some(champion) = pop.champion() {
        new_pop.individuals.push(champion.clone());
    }

    let parents = select_parents(pop, problem.parent_pool());
    while new_pop.len() < population_size {
        let (Some(p1), Some(p2)) = (parents.choose(rng), parents.choose(rng)) else {
            break;
        };
        let child = problem.breed(&p1.genome, &p2.genome, rng);
        new_pop.individuals.push(Individual::new(child, epoch));
    }

    debug!(
        "Generation {}: {} children bred from {} parent(s)",
        epoch,
        new_pop.len().saturating_sub(1),
        parents.len()
    );

    new_pop
}

/// Parents are drawn with replacement from the `parent_pool` best individuals, or from the
/// whole population when `parent_pool` is 0 or exceeds its size.
fn select_parents<G: Clone + Send + Sync>(pop: &Population<G>, parent_pool: usize) -> &[Individual<G>] {
    let n = if parent_pool == 0 {
        pop.len()
    } else {
        parent_pool.min(pop.len())
    };
    &pop.individuals[..n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::features::FeatureSelection;
    use crate::observer::NoopObserver;
    use crate::structure::{ParetoStructureSearch, StructureSearch};
    use crate::pareto::dominates;
    use std::sync::atomic::Ordering;

    fn test_param(population_size: usize, n_gen: usize) -> Param {
        let mut param = Param::default();
        param.ga.population_size = population_size;
        param.ga.n_gen = n_gen;
        param.cv.splits = 2;
        param.cv.max_iter = 15;
        param.general.thread_number = 2;
        param
    }

    #[derive(Default)]
    struct Recorder {
        starts: Vec<usize>,
        reports: Vec<GenerationReport>,
        stop_after: Option<usize>,
        stop_at_start: Option<usize>,
        cancel_at_start: Option<(usize, Arc<AtomicBool>)>,
    }

    impl Observer for Recorder {
        fn on_generation_start(&mut self, generation: usize) {
            self.starts.push(generation);
            if let Some((g, running)) = &self.cancel_at_start {
                if *g == generation {
                    running.store(false, Ordering::Relaxed);
                }
            }
        }

        fn on_generation(&mut self, report: &GenerationReport) {
            self.reports.push(report.clone());
        }

        fn wants_stop(&self) -> bool {
            matches!(self.stop_after, Some(n) if self.reports.len() >= n)
                || matches!(self.stop_at_start, Some(g) if self.starts.last() == Some(&g))
        }
    }

    fn scored(genome: Vec<bool>, mae: f64) -> Individual<Vec<bool>> {
        let mut i = Individual::new(genome, 0);
        i.set_evaluation(
            crate::evaluator::Evaluation {
                mae,
                rmse: mae,
                std_mae: 0.0,
            },
            1,
        );
        i
    }

    #[test]
    fn test_champion_mae_never_increases() {
        let data = Data::test();
        let param = test_param(6, 4);
        let problem = FeatureSelection::new(data.feature_len, &param.features);
        let mut recorder = Recorder::default();
        let search = ga(&problem, &data, &param, &mut recorder, Arc::new(AtomicBool::new(true))).unwrap();

        assert_eq!(search.stop_reason, StopReason::Completed);
        assert_eq!(recorder.reports.len(), 4);
        assert_eq!(recorder.starts, vec![0, 1, 2, 3]);
        for pair in search.history.windows(2) {
            assert!(pair[1].mae <= pair[0].mae, "champion MAE rose from {} to {}", pair[0].mae, pair[1].mae);
        }
        match search.outcome {
            Some(SearchOutcome::Best(record)) => assert_eq!(record.mae, search.history[3].mae),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_first_generation_returns_nothing() {
        let data = Data::test();
        let param = test_param(4, 3);
        let problem = FeatureSelection::new(data.feature_len, &param.features);
        let mut recorder = Recorder::default();
        let running = Arc::new(AtomicBool::new(false));
        let search = ga(&problem, &data, &param, &mut recorder, running).unwrap();

        assert!(search.outcome.is_none());
        assert!(search.history.is_empty());
        assert!(recorder.reports.is_empty());
        assert_eq!(search.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn test_cancelled_after_first_generation_keeps_its_champion() {
        let data = Data::test();
        let param = test_param(4, 4);
        let problem = FeatureSelection::new(data.feature_len, &param.features);
        let running = Arc::new(AtomicBool::new(true));
        let mut recorder = Recorder {
            cancel_at_start: Some((1, running.clone())),
            ..Default::default()
        };
        let search = ga(&problem, &data, &param, &mut recorder, running).unwrap();

        assert_eq!(search.stop_reason, StopReason::Cancelled);
        assert_eq!(search.history.len(), 1);
        assert_eq!(recorder.starts, vec![0, 1]);
        match search.outcome {
            Some(SearchOutcome::Best(record)) => {
                assert_eq!(record.mae, search.history[0].mae);
                assert_eq!(record.epoch, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_observer_can_stop_before_a_generation_is_scored() {
        let data = Data::test();
        let param = test_param(4, 5);
        let problem = FeatureSelection::new(data.feature_len, &param.features);
        let mut recorder = Recorder {
            stop_at_start: Some(2),
            ..Default::default()
        };
        let search = ga(&problem, &data, &param, &mut recorder, Arc::new(AtomicBool::new(true))).unwrap();

        assert_eq!(search.stop_reason, StopReason::ObserverRequest);
        assert_eq!(recorder.starts, vec![0, 1, 2]);
        assert_eq!(search.history.len(), 2);
        match search.outcome {
            Some(SearchOutcome::Best(record)) => assert_eq!(record.mae, search.history[1].mae),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters_are_rejected_before_any_generation() {
        let data = Data::test();
        let problem = FeatureSelection::new(data.feature_len, &test_param(4, 2).features);

        let mut no_generation = test_param(4, 2);
        no_generation.ga.n_gen = 0;
        let mut empty_population = test_param(4, 2);
        empty_population.ga.population_size = 0;
        let mut bad_rate = test_param(4, 2);
        bad_rate.features.mutation_rate = 1.5;

        for param in [no_generation, empty_population, bad_rate] {
            let problem = FeatureSelection::new(data.feature_len, &param.features);
            let mut recorder = Recorder::default();
            let result = ga(&problem, &data, &param, &mut recorder, Arc::new(AtomicBool::new(true)));
            assert!(matches!(result, Err(SearchError::InvalidConfig(_))), "{:?}", result);
            assert!(recorder.starts.is_empty());
        }

        let mut inverted_widths = test_param(4, 2);
        inverted_widths.structure.width_min = 80;
        let structure = StructureSearch::new(&inverted_widths.structure);
        let result = ga(&structure, &data, &inverted_widths, &mut NoopObserver, Arc::new(AtomicBool::new(true)));
        assert!(matches!(result, Err(SearchError::InvalidConfig(_))));

        let valid = ga(&problem, &data, &test_param(4, 1), &mut NoopObserver, Arc::new(AtomicBool::new(true)));
        assert!(valid.is_ok());
    }

    #[test]
    fn test_observer_can_stop_the_search() {
        let data = Data::test();
        let param = test_param(4, 5);
        let problem = FeatureSelection::new(data.feature_len, &param.features);
        let mut recorder = Recorder {
            stop_after: Some(2),
            ..Default::default()
        };
        let running = Arc::new(AtomicBool::new(true));
        let search = ga(&problem, &data, &param, &mut recorder, running.clone()).unwrap();

        assert_eq!(search.stop_reason, StopReason::ObserverRequest);
        assert_eq!(search.history.len(), 2);
        assert!(search.outcome.is_some());
        assert!(running.load(Ordering::Relaxed), "the observer must not touch the stop flag");
    }

    #[test]
    fn test_same_seed_same_search() {
        let data = Data::test();
        let param = test_param(4, 2);
        let problem = StructureSearch::new(&param.structure);
        let s1 = ga(&problem, &data, &param, &mut NoopObserver, Arc::new(AtomicBool::new(true))).unwrap();
        let s2 = ga(&problem, &data, &param, &mut NoopObserver, Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_pareto_search_returns_mutually_non_dominating_front() {
        let data = Data::test();
        let param = test_param(5, 3);
        let problem = ParetoStructureSearch::new(&param.structure, &param.pareto);
        let search = ga(&problem, &data, &param, &mut Recorder::default(), Arc::new(AtomicBool::new(true))).unwrap();

        let front = match search.outcome {
            Some(SearchOutcome::Front(front)) => front,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(!front.is_empty());
        for a in &front {
            for b in &front {
                assert!(!dominates(&[a.mae, a.rmse], &[b.mae, b.rmse]));
            }
        }
        assert!(search.history.iter().all(|r| r.front_size.is_some()));
        assert_eq!(search.history.last().and_then(|r| r.front_size), Some(front.len()));
    }

    #[test]
    fn test_evolve_keeps_champion_first() {
        let param = test_param(6, 2);
        let problem = FeatureSelection::new(3, &param.features);
        let pop = Population {
            individuals: vec![
                scored(vec![true, false, true], 0.1),
                scored(vec![false, true, true], 0.2),
                scored(vec![true, true, true], 0.3),
            ],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let next = evolve(&pop, &problem, 6, 1, &mut rng);

        assert_eq!(next.len(), 6);
        assert_eq!(next.individuals[0], pop.individuals[0]);
        assert!(next.individuals[1..].iter().all(|i| !i.fitted && i.epoch == 1));
    }

    #[test]
    fn test_parent_pool_window() {
        let pop = Population {
            individuals: (0..8).map(|k| scored(vec![true], k as f64)).collect(),
        };
        assert_eq!(select_parents(&pop, 0).len(), 8);
        assert_eq!(select_parents(&pop, 5).len(), 5);
        assert_eq!(select_parents(&pop, 20).len(), 8);
        assert!(select_parents(&pop, 3).iter().all(|i| i.mae < 3.0));
    }
}
