//! Population optimizers that pick the best candidate route.
//!
//! Both strategies share one contract: take the generated candidates and the
//! fitness evaluator, score each candidate once, search, and return the best
//! route together with the scored population. Callers choose a strategy with
//! [`OptimizerKind`].

mod aco;
mod genetic;

pub use aco::{AntColony, AntColonyConfig, PheromoneTable};
pub use genetic::{Genetic, GeneticConfig};

use crate::error::OptimizeError;
use crate::fitness::FitnessEvaluator;
use crate::models::{AircraftProfile, OptimizationMethod, Route};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dispatcher key for the available strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizerKind {
    #[default]
    #[serde(rename = "aco", alias = "ant_colony")]
    AntColony,
    #[serde(rename = "genetic", alias = "ga")]
    Genetic,
}

impl OptimizerKind {
    pub const ALL: [OptimizerKind; 2] = [OptimizerKind::AntColony, OptimizerKind::Genetic];

    pub fn method(&self) -> OptimizationMethod {
        match self {
            OptimizerKind::AntColony => OptimizationMethod::Aco,
            OptimizerKind::Genetic => OptimizationMethod::Genetic,
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.method().fmt(f)
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aco" | "ant_colony" => Ok(OptimizerKind::AntColony),
            "genetic" | "ga" => Ok(OptimizerKind::Genetic),
            other => Err(format!("unknown optimization method '{}'", other)),
        }
    }
}

/// Tunables for every strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub ant_colony: AntColonyConfig,
    pub genetic: GeneticConfig,
}

/// Result of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    pub best: Route,
    /// Candidates in input order with their final fitness.
    pub evaluated: Vec<Route>,
    pub kind: OptimizerKind,
    /// Iterations or generations executed.
    pub rounds: usize,
    /// Fitness look-ups performed during the search.
    pub evaluations: usize,
}

pub trait RouteOptimizer {
    fn optimize(
        &self,
        candidates: &[Route],
        evaluator: &FitnessEvaluator,
        aircraft: &AircraftProfile,
    ) -> Result<Optimization, OptimizeError>;
}

/// Closed set of strategies behind one interface.
#[derive(Debug, Clone)]
pub enum Optimizer {
    AntColony(AntColony),
    Genetic(Genetic),
}

impl Optimizer {
    pub fn for_kind(kind: OptimizerKind, settings: &OptimizerSettings) -> Self {
        match kind {
            OptimizerKind::AntColony => Optimizer::AntColony(AntColony::new(settings.ant_colony.clone())),
            OptimizerKind::Genetic => Optimizer::Genetic(Genetic::new(settings.genetic.clone())),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::AntColony(_) => OptimizerKind::AntColony,
            Optimizer::Genetic(_) => OptimizerKind::Genetic,
        }
    }
}

impl RouteOptimizer for Optimizer {
    fn optimize(
        &self,
        candidates: &[Route],
        evaluator: &FitnessEvaluator,
        aircraft: &AircraftProfile,
    ) -> Result<Optimization, OptimizeError> {
        let outcome = match self {
            Optimizer::AntColony(inner) => inner.optimize(candidates, evaluator, aircraft),
            Optimizer::Genetic(inner) => inner.optimize(candidates, evaluator, aircraft),
        }?;
        tracing::debug!(
            "{} selected {} (fitness {:.4}) after {} rounds, {} evaluations",
            outcome.kind,
            outcome.best.path_type,
            outcome.best.fitness,
            outcome.rounds,
            outcome.evaluations
        );
        Ok(outcome)
    }
}

/// Run the strategy selected by `kind`.
pub fn optimize(
    kind: OptimizerKind,
    candidates: &[Route],
    evaluator: &FitnessEvaluator,
    aircraft: &AircraftProfile,
    settings: &OptimizerSettings,
) -> Result<Optimization, OptimizeError> {
    Optimizer::for_kind(kind, settings).optimize(candidates, evaluator, aircraft)
}

/// Upper bound on scoring threads per run.
const MAX_SCORING_WORKERS: usize = 8;

/// Score every candidate once, preserving input order.
///
/// Candidates are split into contiguous chunks scored on scoped threads and
/// reassembled in chunk order.
pub(crate) fn score_candidates(
    candidates: &[Route],
    evaluator: &FitnessEvaluator,
    aircraft: &AircraftProfile,
) -> Result<Vec<Route>, OptimizeError> {
    if candidates.is_empty() {
        return Err(OptimizeError::NoCandidates);
    }
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_SCORING_WORKERS)
        .min(candidates.len());
    Ok(score_in_chunks(candidates, evaluator, aircraft, workers))
}

fn score_in_chunks(
    candidates: &[Route],
    evaluator: &FitnessEvaluator,
    aircraft: &AircraftProfile,
    workers: usize,
) -> Vec<Route> {
    let score = |batch: &[Route]| -> Vec<Route> {
        batch
            .iter()
            .cloned()
            .map(|mut route| {
                evaluator.apply(&mut route, aircraft);
                route
            })
            .collect()
    };
    if workers < 2 {
        return score(candidates);
    }

    let chunk = candidates.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .chunks(chunk)
            .map(|batch| scope.spawn(move || score(batch)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(scored) => scored,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// Index of the lowest fitness; the first wins ties.
pub(crate) fn best_index(routes: &[Route]) -> Option<usize> {
    routes
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.fitness.total_cmp(&b.1.fitness))
        .map(|(idx, _)| idx)
}

/// Per-draw seed derived from a run seed, so draws do not depend on which
/// thread performs them.
pub(crate) fn derive_seed(seed: u64, round: usize, lane: usize) -> u64 {
    let mut z = seed
        .wrapping_add((round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((lane as u64).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::atmosphere::AtmosphericSnapshot;
    use crate::generator::{GenerationRequest, RouteGenerator};
    use crate::models::{AircraftProfile, Airport, Coordinate, Route};

    pub fn a320() -> AircraftProfile {
        AircraftProfile {
            model: "A320".to_string(),
            cruise_speed_kmh: 840.0,
            fuel_capacity_l: 24_210.0,
            fuel_burn_lph: 2_500.0,
        }
    }

    fn airport(code: &str, lat: f64, lon: f64) -> Airport {
        Airport {
            code: code.to_string(),
            name: code.to_string(),
            city: String::new(),
            location: Coordinate::new(lat, lon),
            elevation_m: 0.0,
            timezone: String::new(),
        }
    }

    /// Generated DEL-BOM candidates with calm snapshots attached.
    pub fn calm_candidates() -> Vec<Route> {
        let request = GenerationRequest {
            origin: airport("DEL", 28.5562, 77.1000),
            destination: airport("BOM", 19.0896, 72.8656),
            styles: Vec::new(),
            exclusions: Vec::new(),
        };
        let mut routes = RouteGenerator::default()
            .generate(&request)
            .expect("candidates");
        for route in &mut routes {
            for wp in &mut route.waypoints {
                wp.snapshot = Some(AtmosphericSnapshot::calm());
            }
        }
        routes
    }
}
