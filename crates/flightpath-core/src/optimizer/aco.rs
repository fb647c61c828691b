//! Ant-colony selection over a fixed candidate set.

use super::{best_index, derive_seed, score_candidates, Optimization, OptimizerKind, RouteOptimizer};
use crate::error::OptimizeError;
use crate::fitness::FitnessEvaluator;
use crate::models::{AircraftProfile, OptimizationMethod, Route};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fitness values below this are clamped before inversion.
const MIN_FITNESS: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntColonyConfig {
    pub ants: usize,
    pub iterations: usize,
    /// Pheromone exponent.
    pub alpha: f64,
    /// Heuristic (1 / fitness) exponent.
    pub beta: f64,
    /// Fraction of pheromone lost per iteration.
    pub evaporation: f64,
    pub initial_pheromone: f64,
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
    /// Run each iteration's ants on scoped threads.
    pub parallel_ants: bool,
}

impl Default for AntColonyConfig {
    fn default() -> Self {
        Self {
            ants: 10,
            iterations: 10,
            alpha: 1.0,
            beta: 2.0,
            evaporation: 0.5,
            initial_pheromone: 1.0,
            seed: None,
            parallel_ants: false,
        }
    }
}

/// Pheromone levels, one per candidate.
///
/// Ants read an immutable snapshot; the next iteration's table is built
/// separately and swapped in whole, so a partially updated table is never
/// observable.
#[derive(Debug, Clone)]
pub struct PheromoneTable {
    levels: Arc<[f64]>,
}

impl PheromoneTable {
    pub fn uniform(len: usize, value: f64) -> Self {
        Self {
            levels: vec![value; len].into(),
        }
    }

    pub fn snapshot(&self) -> Arc<[f64]> {
        Arc::clone(&self.levels)
    }

    pub fn commit(&mut self, next: Vec<f64>) {
        self.levels = next.into();
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }
}

#[derive(Debug, Clone, Default)]
pub struct AntColony {
    config: AntColonyConfig,
}

impl AntColony {
    pub fn new(config: AntColonyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AntColonyConfig {
        &self.config
    }

    /// Search and also hand back the final pheromone table.
    pub fn run(
        &self,
        candidates: &[Route],
        evaluator: &FitnessEvaluator,
        aircraft: &AircraftProfile,
    ) -> Result<(Optimization, PheromoneTable), OptimizeError> {
        let scored = score_candidates(candidates, evaluator, aircraft)?;
        let cfg = &self.config;
        let mut table = PheromoneTable::uniform(scored.len(), cfg.initial_pheromone);
        let seed = cfg.seed.unwrap_or_else(|| rand::rng().random());

        let heuristic: Vec<f64> = scored
            .iter()
            .map(|route| (1.0 / route.fitness.max(MIN_FITNESS)).powf(cfg.beta))
            .collect();

        let mut best: Option<usize> = None;
        let mut evaluations = 0usize;

        if cfg.ants > 0 {
            for iteration in 0..cfg.iterations {
                let levels = table.snapshot();
                let picks = self.run_ants(&levels, &heuristic, seed, iteration);

                for &pick in &picks {
                    evaluations += 1;
                    let improved = match best {
                        None => true,
                        Some(incumbent) => scored[pick].fitness < scored[incumbent].fitness,
                    };
                    if improved {
                        best = Some(pick);
                    }
                }

                let mut next: Vec<f64> = levels.iter().map(|p| p * (1.0 - cfg.evaporation)).collect();
                for &pick in &picks {
                    next[pick] += 1.0 / scored[pick].fitness.max(MIN_FITNESS);
                }
                table.commit(next);
            }
        }

        let best_idx = match best {
            Some(idx) => idx,
            None => best_index(&scored).ok_or(OptimizeError::NoCandidates)?,
        };
        let mut best_route = scored[best_idx].fork();
        best_route.optimization_method = Some(OptimizationMethod::Aco);

        let rounds = if cfg.ants > 0 { cfg.iterations } else { 0 };
        Ok((
            Optimization {
                best: best_route,
                evaluated: scored,
                kind: OptimizerKind::AntColony,
                rounds,
                evaluations,
            },
            table,
        ))
    }

    /// One draw per ant against a fixed pheromone snapshot, in ant order.
    fn run_ants(&self, levels: &[f64], heuristic: &[f64], seed: u64, iteration: usize) -> Vec<usize> {
        let ants = self.config.ants;
        if !self.config.parallel_ants || ants < 2 {
            return (0..ants)
                .map(|ant| self.draw(levels, heuristic, derive_seed(seed, iteration, ant)))
                .collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..ants)
                .map(|ant| {
                    scope.spawn(move || self.draw(levels, heuristic, derive_seed(seed, iteration, ant)))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(pick) => pick,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    /// Roulette-wheel pick weighted by pheromone^alpha * heuristic.
    fn draw(&self, levels: &[f64], heuristic: &[f64], seed: u64) -> usize {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights: Vec<f64> = levels
            .iter()
            .zip(heuristic)
            .map(|(p, h)| p.max(0.0).powf(self.config.alpha) * h)
            .collect();
        let total: f64 = weights.iter().sum();

        if !total.is_finite() || total <= 0.0 {
            return rng.random_range(0..levels.len());
        }

        let mut target = rng.random::<f64>() * total;
        for (idx, weight) in weights.iter().enumerate() {
            target -= weight;
            if target <= 0.0 {
                return idx;
            }
        }
        weights.len() - 1
    }
}

impl RouteOptimizer for AntColony {
    fn optimize(
        &self,
        candidates: &[Route],
        evaluator: &FitnessEvaluator,
        aircraft: &AircraftProfile,
    ) -> Result<Optimization, OptimizeError> {
        self.run(candidates, evaluator, aircraft).map(|(outcome, _)| outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn seeded(seed: u64) -> AntColony {
        AntColony::new(AntColonyConfig {
            seed: Some(seed),
            ..AntColonyConfig::default()
        })
    }

    #[test]
    fn test_zero_iterations_is_pure_ranking() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let colony = AntColony::new(AntColonyConfig {
            iterations: 0,
            seed: Some(1),
            ..AntColonyConfig::default()
        });
        let outcome = colony.optimize(&candidates, &evaluator, &a320()).expect("ok");
        let expected = best_index(&outcome.evaluated).expect("non-empty");
        assert_eq!(outcome.best.coordinates(), outcome.evaluated[expected].coordinates());
        assert_ne!(outcome.best.id, outcome.evaluated[expected].id);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.evaluations, 0);
        // Calm weather: the direct route is the shortest and must win.
        assert_eq!(outcome.best.path_type.to_string(), "direct");
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let first = seeded(42).optimize(&candidates, &evaluator, &a320()).expect("ok");
        let second = seeded(42).optimize(&candidates, &evaluator, &a320()).expect("ok");
        assert_eq!(first.best.coordinates(), second.best.coordinates());
        assert_eq!(first.best.fitness.to_bits(), second.best.fitness.to_bits());
    }

    #[test]
    fn test_parallel_ants_match_sequential() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let sequential = seeded(5).run(&candidates, &evaluator, &a320()).expect("ok");
        let parallel = AntColony::new(AntColonyConfig {
            seed: Some(5),
            parallel_ants: true,
            ..AntColonyConfig::default()
        })
        .run(&candidates, &evaluator, &a320())
        .expect("ok");
        assert_eq!(sequential.0.best.coordinates(), parallel.0.best.coordinates());
        assert_eq!(sequential.1.levels(), parallel.1.levels());
    }

    #[test]
    fn test_pheromone_concentrates_on_low_fitness() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let (outcome, table) = AntColony::new(AntColonyConfig {
            seed: Some(11),
            iterations: 30,
            ants: 20,
            beta: 200.0,
            ..AntColonyConfig::default()
        })
        .run(&candidates, &evaluator, &a320())
        .expect("ok");

        let strongest = table
            .levels()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .expect("non-empty");
        let direct = best_index(&outcome.evaluated).expect("non-empty");
        assert_eq!(strongest, direct);
        assert_eq!(outcome.evaluations, 30 * 20);
    }

    #[test]
    fn test_commit_swaps_whole_table() {
        let mut table = PheromoneTable::uniform(3, 1.0);
        let snapshot = table.snapshot();
        table.commit(snapshot.iter().map(|p| p * 0.5).collect());
        assert_eq!(table.levels(), &[0.5, 0.5, 0.5]);
        // The old snapshot is unaffected by the commit.
        assert_eq!(&*snapshot, &[1.0, 1.0, 1.0]);
    }
}
