// Genetic-algorithm combinatorial search over candidate indexes: an
// individual is a bitvector selecting a subset of candidates; fitness is
// the summed benefit of the selection, penalized when it violates the
// `max_indexes`/`max_total_size` constraints. Deterministic given a seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct GaParams {
    pub population: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub tournament_size: usize,
    pub max_indexes: usize,
    pub max_total_size: u64,
    /// Best-fitness-window stall detection: window size and the minimum
    /// change across it below which the search is considered stalled.
    pub stall_window: usize,
    pub stall_epsilon: f64,
    pub seed: u64,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population: 50,
            generations: 100,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            tournament_size: 3,
            max_indexes: 5,
            max_total_size: 10 * 1024 * 1024 * 1024,
            stall_window: 5,
            stall_epsilon: 1e-4,
            seed: 42,
        }
    }
}

/// One candidate's inputs to the fitness function.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFitnessInput {
    pub benefit: f64,
    pub estimated_size: u64,
}

type Individual = Vec<bool>;

const PENALTY: f64 = 1_000.0;

fn fitness(individual: &Individual, inputs: &[CandidateFitnessInput], params: &GaParams) -> f64 {
    let mut benefit_sum = 0.0;
    let mut count = 0usize;
    let mut total_size = 0u64;
    for (selected, input) in individual.iter().zip(inputs.iter()) {
        if *selected {
            benefit_sum += input.benefit;
            count += 1;
            total_size = total_size.saturating_add(input.estimated_size);
        }
    }
    let mut penalty = 0.0;
    if count > params.max_indexes {
        penalty += PENALTY * (count - params.max_indexes) as f64;
    }
    if total_size > params.max_total_size {
        penalty += PENALTY;
    }
    benefit_sum - penalty
}

fn random_individual(rng: &mut StdRng, n: usize) -> Individual {
    (0..n).map(|_| rng.random_bool(0.3)).collect()
}

fn tournament_select<'a>(
    population: &'a [Individual],
    fitnesses: &[f64],
    rng: &mut StdRng,
    tournament_size: usize,
) -> &'a Individual {
    let mut best_idx = rng.random_range(0..population.len());
    for _ in 1..tournament_size {
        let idx = rng.random_range(0..population.len());
        if fitnesses[idx] > fitnesses[best_idx] {
            best_idx = idx;
        }
    }
    &population[best_idx]
}

fn crossover(a: &Individual, b: &Individual, rng: &mut StdRng) -> Individual {
    if a.is_empty() {
        return a.clone();
    }
    let point = rng.random_range(0..a.len());
    a[..point].iter().chain(b[point..].iter()).copied().collect()
}

fn mutate(individual: &mut Individual, rate: f64, rng: &mut StdRng) {
    for bit in individual.iter_mut() {
        if rng.random_bool(rate) {
            *bit = !*bit;
        }
    }
}

/// Best individual found, plus whether the deadline cut the search short
/// (the advisor surfaces this as `AdvisorTimeout` -- non-fatal, partial
/// results).
pub struct GaResult {
    pub selected: Vec<usize>,
    pub fitness: f64,
    pub timed_out: bool,
    pub generations_run: usize,
}

/// Run the GA over `n` candidates. `deadline` is checked at each generation
/// boundary per the documented cancellation model.
pub fn run(n: usize, inputs: &[CandidateFitnessInput], params: &GaParams, deadline: Option<Instant>) -> GaResult {
    if n == 0 {
        return GaResult { selected: vec![], fitness: 0.0, timed_out: false, generations_run: 0 };
    }
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut population: Vec<Individual> = (0..params.population).map(|_| random_individual(&mut rng, n)).collect();

    let mut mutation_rate = params.mutation_rate;
    let mut crossover_rate = params.crossover_rate;
    let mut best_window: Vec<f64> = Vec::with_capacity(params.stall_window);

    let mut best: Individual = population[0].clone();
    let mut best_fitness = f64::MIN;
    let mut timed_out = false;
    let mut generations_run = 0;

    for generation in 0..params.generations {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
        }
        generations_run = generation + 1;

        let fitnesses: Vec<f64> = population.iter().map(|ind| fitness(ind, inputs, params)).collect();
        for (ind, &f) in population.iter().zip(fitnesses.iter()) {
            if f > best_fitness {
                best_fitness = f;
                best = ind.clone();
            }
        }

        best_window.push(best_fitness);
        if best_window.len() > params.stall_window {
            best_window.remove(0);
        }
        if best_window.len() == params.stall_window {
            let spread = best_window.iter().cloned().fold(f64::MIN, f64::max)
                - best_window.iter().cloned().fold(f64::MAX, f64::min);
            if spread.abs() < params.stall_epsilon {
                // Stalled: diversify.
                mutation_rate = 0.25;
                crossover_rate = 0.6;
            } else {
                mutation_rate = params.mutation_rate;
                crossover_rate = params.crossover_rate;
            }
        }

        info!(generation, best_fitness, "advisor GA generation complete");

        let mut next_generation = Vec::with_capacity(params.population);
        next_generation.push(best.clone()); // elitism: never lose the best individual
        while next_generation.len() < params.population {
            let parent_a = tournament_select(&population, &fitnesses, &mut rng, params.tournament_size);
            let child = if rng.random_bool(crossover_rate) {
                let parent_b = tournament_select(&population, &fitnesses, &mut rng, params.tournament_size);
                crossover(parent_a, parent_b, &mut rng)
            } else {
                parent_a.clone()
            };
            let mut child = child;
            mutate(&mut child, mutation_rate, &mut rng);
            next_generation.push(child);
        }
        population = next_generation;
        population.shuffle(&mut rng);
    }

    let selected = best.iter().enumerate().filter(|(_, &b)| b).map(|(i, _)| i).collect();
    GaResult { selected, fitness: best_fitness, timed_out, generations_run }
}
