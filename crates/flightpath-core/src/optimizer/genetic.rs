//! Genetic search over mixtures of the candidate routes.
//!
//! A genome names, for every intermediate waypoint slot, which candidate
//! supplies that waypoint. Pure genomes reproduce a candidate exactly; mixed
//! genomes are hybrids whose waypoints (and snapshots) are copied from their
//! donors, so no new atmospheric data is needed to score them.

use super::{derive_seed, score_candidates, Optimization, OptimizerKind, RouteOptimizer};
use crate::error::OptimizeError;
use crate::fitness::FitnessEvaluator;
use crate::models::{AircraftProfile, OptimizationMethod, PathStyle, PathType, Route, Waypoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub generations: usize,
    pub population: usize,
    pub crossover_rate: f64,
    /// Per-gene probability of switching donor.
    pub mutation_rate: f64,
    pub elite_count: usize,
    pub tournament_size: usize,
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            generations: 20,
            population: 10,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            elite_count: 2,
            tournament_size: 3,
            seed: None,
        }
    }
}

type Genome = Vec<usize>;

#[derive(Debug, Clone, Default)]
pub struct Genetic {
    config: GeneticConfig,
}

/// Scoring context for one run: decoded fitness is memoized per genome.
struct Population<'a> {
    candidates: &'a [Route],
    evaluator: &'a FitnessEvaluator,
    aircraft: &'a AircraftProfile,
    genes: usize,
    memo: HashMap<Genome, f64>,
    evaluations: usize,
}

impl<'a> Population<'a> {
    fn new(candidates: &'a [Route], evaluator: &'a FitnessEvaluator, aircraft: &'a AircraftProfile) -> Self {
        let len = candidates[0].waypoints.len();
        let uniform = candidates.iter().all(|route| route.waypoints.len() == len);
        // Slot-wise mixing needs aligned waypoint lists with at least one
        // intermediate slot; otherwise a single gene picks a whole candidate.
        let genes = if uniform && len >= 3 { len - 2 } else { 1 };
        Self {
            candidates,
            evaluator,
            aircraft,
            genes,
            memo: HashMap::new(),
            evaluations: 0,
        }
    }

    fn pure(&self, idx: usize) -> Genome {
        vec![idx; self.genes]
    }

    fn random(&self, rng: &mut StdRng) -> Genome {
        (0..self.genes)
            .map(|_| rng.random_range(0..self.candidates.len()))
            .collect()
    }

    fn fitness(&mut self, genome: &Genome) -> f64 {
        if let Some(&cached) = self.memo.get(genome) {
            return cached;
        }
        self.evaluations += 1;
        let fitness = match uniform_donor(genome) {
            Some(idx) => self.candidates[idx].fitness,
            None => self.decode(genome).fitness,
        };
        self.memo.insert(genome.clone(), fitness);
        fitness
    }

    fn decode(&self, genome: &Genome) -> Route {
        if let Some(idx) = uniform_donor(genome) {
            return self.candidates[idx].fork();
        }

        let base = &self.candidates[0];
        let last = base.waypoints.len() - 1;
        let mut waypoints: Vec<Waypoint> = Vec::with_capacity(base.waypoints.len());
        waypoints.push(base.waypoints[0].duplicate());
        for (slot, &donor) in genome.iter().enumerate() {
            waypoints.push(self.candidates[donor].waypoints[slot + 1].duplicate());
        }
        waypoints.push(base.waypoints[last].duplicate());

        let mut route = Route::new(
            base.origin.clone(),
            base.destination.clone(),
            waypoints,
            PathType::Generated(self.dominant_style(genome)),
        );
        self.evaluator.apply(&mut route, self.aircraft);
        route
    }

    /// Style of the donor supplying the most slots; lower index wins ties.
    fn dominant_style(&self, genome: &Genome) -> PathStyle {
        let mut counts = vec![0usize; self.candidates.len()];
        for &donor in genome {
            counts[donor] += 1;
        }
        let mut winner = 0;
        for (idx, &count) in counts.iter().enumerate() {
            if count > counts[winner] {
                winner = idx;
            }
        }
        self.candidates[winner].path_type.style()
    }
}

fn uniform_donor(genome: &Genome) -> Option<usize> {
    let first = *genome.first()?;
    genome.iter().all(|&g| g == first).then_some(first)
}

impl Genetic {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    fn select<'g>(&self, ranked: &'g [(Genome, f64)], rng: &mut StdRng) -> &'g Genome {
        let size = self.config.tournament_size.max(1);
        let mut winner = rng.random_range(0..ranked.len());
        for _ in 1..size {
            let challenger = rng.random_range(0..ranked.len());
            if ranked[challenger].1 < ranked[winner].1 {
                winner = challenger;
            }
        }
        &ranked[winner].0
    }

    fn crossover(&self, a: &Genome, b: &Genome, rng: &mut StdRng) -> Genome {
        if rng.random::<f64>() >= self.config.crossover_rate {
            return a.clone();
        }
        a.iter()
            .zip(b)
            .map(|(&x, &y)| if rng.random::<bool>() { x } else { y })
            .collect()
    }

    fn mutate(&self, genome: &mut Genome, donors: usize, rng: &mut StdRng) {
        for gene in genome.iter_mut() {
            if rng.random::<f64>() < self.config.mutation_rate {
                *gene = rng.random_range(0..donors);
            }
        }
    }
}

impl RouteOptimizer for Genetic {
    fn optimize(
        &self,
        candidates: &[Route],
        evaluator: &FitnessEvaluator,
        aircraft: &AircraftProfile,
    ) -> Result<Optimization, OptimizeError> {
        let scored = score_candidates(candidates, evaluator, aircraft)?;
        let cfg = &self.config;
        let seed = cfg.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(derive_seed(seed, 0, 0));
        let mut pop = Population::new(&scored, evaluator, aircraft);

        let size = cfg.population.max(scored.len()).max(2);
        let mut genomes: Vec<Genome> = (0..scored.len()).map(|idx| pop.pure(idx)).collect();
        while genomes.len() < size {
            genomes.push(pop.random(&mut rng));
        }

        let mut ranked = rank(&mut pop, genomes);
        let mut best = ranked[0].clone();

        for _ in 0..cfg.generations {
            let mut next: Vec<Genome> = ranked
                .iter()
                .take(cfg.elite_count.min(size))
                .map(|(genome, _)| genome.clone())
                .collect();
            while next.len() < size {
                let a = self.select(&ranked, &mut rng).clone();
                let b = self.select(&ranked, &mut rng).clone();
                let mut child = self.crossover(&a, &b, &mut rng);
                self.mutate(&mut child, scored.len(), &mut rng);
                next.push(child);
            }

            ranked = rank(&mut pop, next);
            if ranked[0].1 < best.1 {
                best = ranked[0].clone();
            }
        }

        let mut best_route = pop.decode(&best.0);
        best_route.optimization_method = Some(OptimizationMethod::Genetic);
        let evaluations = pop.evaluations;

        Ok(Optimization {
            best: best_route,
            evaluated: scored,
            kind: OptimizerKind::Genetic,
            rounds: cfg.generations,
            evaluations,
        })
    }
}

/// Score and stable-sort a generation, best first.
fn rank(pop: &mut Population<'_>, genomes: Vec<Genome>) -> Vec<(Genome, f64)> {
    let mut ranked: Vec<(Genome, f64)> = genomes
        .into_iter()
        .map(|genome| {
            let fitness = pop.fitness(&genome);
            (genome, fitness)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::super::best_index;
    use super::super::test_support::*;
    use super::*;

    fn seeded(seed: u64) -> Genetic {
        Genetic::new(GeneticConfig {
            seed: Some(seed),
            ..GeneticConfig::default()
        })
    }

    #[test]
    fn test_never_worse_than_best_candidate() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let outcome = seeded(3).optimize(&candidates, &evaluator, &a320()).expect("ok");
        let floor = best_index(&outcome.evaluated)
            .map(|idx| outcome.evaluated[idx].fitness)
            .expect("non-empty");
        assert!(outcome.best.fitness <= floor);
        assert_eq!(outcome.best.optimization_method, Some(OptimizationMethod::Genetic));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let first = seeded(9).optimize(&candidates, &evaluator, &a320()).expect("ok");
        let second = seeded(9).optimize(&candidates, &evaluator, &a320()).expect("ok");
        assert_eq!(first.best.fitness.to_bits(), second.best.fitness.to_bits());
        assert_eq!(first.best.coordinates(), second.best.coordinates());
    }

    #[test]
    fn test_hybrid_keeps_endpoints_and_sequence() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let scored = score_candidates(&candidates, &evaluator, &a320()).expect("scored");
        let aircraft = a320();
        let pop = Population::new(&scored, &evaluator, &aircraft);
        let mut genome = pop.pure(0);
        genome[3] = 1;
        let hybrid = pop.decode(&genome);

        assert_eq!(hybrid.waypoints.len(), scored[0].waypoints.len());
        assert_eq!(hybrid.waypoints[0].position, scored[0].waypoints[0].position);
        assert_eq!(hybrid.waypoints[4].position, scored[1].waypoints[4].position);
        assert_ne!(hybrid.waypoints[4].id, scored[1].waypoints[4].id);
        assert_eq!(hybrid.path_type.style(), scored[0].path_type.style());
        let sequences: Vec<u32> = hybrid.waypoints.iter().map(|wp| wp.sequence).collect();
        assert_eq!(sequences, (1..=hybrid.waypoints.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_generations_returns_best_initial() {
        let candidates = calm_candidates();
        let evaluator = FitnessEvaluator::default();
        let outcome = Genetic::new(GeneticConfig {
            generations: 0,
            seed: Some(1),
            ..GeneticConfig::default()
        })
        .optimize(&candidates, &evaluator, &a320())
        .expect("ok");
        assert_eq!(outcome.rounds, 0);
        assert!(outcome.best.fitness <= outcome.evaluated[0].fitness);
        // Any slot taken from an offset candidate lengthens the direct path.
        assert_eq!(outcome.best.path_type.style(), PathStyle::Direct);
    }
}
