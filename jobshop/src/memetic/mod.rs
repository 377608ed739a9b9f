//! Memetic wrapper around the tabu engine.
//!
//! A small population of tabu-improved solutions is recombined with a
//! longest-common-subsequence crossover; after every generation the two
//! members scoring worst on a combined quality/diversity measure are
//! dropped, so the population stays both good and spread out.

use std::time::Instant;

use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::problem::Instance;
use crate::solution::{SearchResult, Solution};
use crate::tabu::TabuSearch;

pub struct Memetic<'a> {
    instance: &'a Instance,
    tabu: TabuSearch<'a>,
    population_size: usize,
    ts_iterations: u64,
    beta: f64,
    rng: ChaCha8Rng,
    population: Vec<Solution>,
    best: Solution,
    history: Vec<(f64, u32)>,
    started: Instant,
}

impl<'a> Memetic<'a> {
    /// Population 30, 12000 tabu iterations per improvement and beta 0.6
    /// follow the reference parameterization.
    pub fn new(instance: &'a Instance) -> Self {
        Self::with_params(instance, 30, 12_000, 0.6)
    }

    pub fn with_params(instance: &'a Instance, population_size: usize, ts_iterations: u64, beta: f64) -> Self {
        Memetic {
            instance,
            tabu: TabuSearch::new(instance),
            population_size,
            ts_iterations,
            beta,
            rng: ChaCha8Rng::seed_from_u64(instance.seed),
            population: Vec::with_capacity(population_size + 2),
            best: Solution { machines: Vec::new(), makespan: u32::MAX },
            history: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn set_tabu_params(&mut self, tt: i64, d1: i64, d2: i64, capacity: Option<usize>) {
        self.tabu.set_tabu_params(tt, d1, d2, capacity);
    }

    /// Optimizes from a fresh random population until the wall-clock budget
    /// runs out or `lower_bound` is reached.
    pub fn optimize(&mut self, seconds: f64, lower_bound: u32) -> SearchResult {
        self.start_run(Vec::new());
        self.run(seconds, lower_bound)
    }

    /// Like [`optimize`](Self::optimize), but starts from the given feasible
    /// solutions, topped up with random ones to the population size.
    pub fn optimize_with_population(&mut self, seconds: f64, population: Vec<Solution>, lower_bound: u32) -> SearchResult {
        self.start_run(population);
        self.run(seconds, lower_bound)
    }

    /// Runs a fixed number of generations without a deadline. Mainly for
    /// tests and calibration; no history is recorded.
    pub fn optimize_generations(&mut self, generations: u64) -> Solution {
        self.start_run(Vec::new());
        self.improve_initial_population(f64::INFINITY, 0);
        for _ in 0..generations {
            self.generation();
        }
        self.best.clone()
    }

    fn start_run(&mut self, population: Vec<Solution>) {
        self.started = Instant::now();
        self.history.clear();
        self.best = Solution { machines: Vec::new(), makespan: u32::MAX };
        self.rng = ChaCha8Rng::seed_from_u64(self.instance.seed);
        self.population = population;
        while self.population.len() < self.population_size {
            let solution = self.instance.random_solution(&mut self.rng);
            self.population.push(solution);
        }
        if let Some(best) = self.population.iter().min_by_key(|s| s.makespan) {
            self.best = best.clone();
            self.log_makespan(self.best.makespan);
        }
        tracing::debug!(size = self.population.len(), best = self.best.makespan, "population initialized");
    }

    fn run(&mut self, seconds: f64, lower_bound: u32) -> SearchResult {
        if self.improve_initial_population(seconds, lower_bound) {
            while self.started.elapsed().as_secs_f64() < seconds && self.best.makespan != lower_bound {
                self.generation();
            }
        }
        SearchResult {
            solution: self.best.clone(),
            history: std::mem::take(&mut self.history),
        }
    }

    /// Tabu-improves every initial member. Stops early only when the budget
    /// is exhausted or the known optimum has been matched.
    fn improve_initial_population(&mut self, seconds: f64, lower_bound: u32) -> bool {
        for index in 0..self.population.len() {
            if self.started.elapsed().as_secs_f64() >= seconds || self.best.makespan == lower_bound {
                return false;
            }
            let improved = self.tabu.optimize_iterations(&self.population[index], self.ts_iterations);
            if improved.makespan < self.best.makespan {
                self.best = improved.clone();
                self.log_makespan(improved.makespan);
                tracing::debug!(makespan = improved.makespan, member = index, "initial improvement");
            }
            self.population[index] = improved;
        }
        true
    }

    /// One generation: two children from two distinct parents, both repaired
    /// and tabu-improved, then two members evicted.
    fn generation(&mut self) {
        let first = self.rng.random_range(0..self.population_size);
        let mut second = self.rng.random_range(0..self.population_size);
        while first == second {
            second = self.rng.random_range(0..self.population_size);
        }

        let (child_1, child_2) = self.recombine(first, second);
        for child in [child_1, child_2] {
            let improved = self.tabu.optimize_iterations(&child, self.ts_iterations);
            if improved.makespan < self.best.makespan {
                self.best = improved.clone();
                self.log_makespan(improved.makespan);
                tracing::debug!(makespan = improved.makespan, "generation improved best");
            }
            self.population.push(improved);
        }
        self.shrink_population();
    }

    /// Per-machine LCS crossover in both directions. Either child may be
    /// cyclic; the repair sweep makes it feasible and prices it.
    fn recombine(&mut self, first: usize, second: usize) -> (Solution, Solution) {
        let mut machines_1 = Vec::with_capacity(self.instance.machine_count);
        let mut machines_2 = Vec::with_capacity(self.instance.machine_count);
        for machine in 0..self.instance.machine_count {
            let p1 = &self.population[first].machines[machine];
            let p2 = &self.population[second].machines[machine];
            let lcs = longest_common_subsequence(p1, p2);
            machines_1.push(crossover(p1, p2, &lcs));
            machines_2.push(crossover(p2, p1, &lcs));
        }
        let seed_1 = self.rng.random();
        let seed_2 = self.rng.random();
        let makespan_1 = self.instance.makespan_and_repair(&mut machines_1, Some(seed_1));
        let makespan_2 = self.instance.makespan_and_repair(&mut machines_2, Some(seed_2));
        (
            Solution { machines: machines_1, makespan: makespan_1 },
            Solution { machines: machines_2, makespan: makespan_2 },
        )
    }

    /// Worst-case similarity of a member: the summed per-machine LCS length
    /// against its closest other member.
    fn similarity_degree(&self, index: usize) -> usize {
        (0..self.population.len())
            .filter(|&other| other != index)
            .map(|other| {
                (0..self.instance.machine_count)
                    .map(|machine| {
                        longest_common_subsequence(
                            &self.population[index].machines[machine],
                            &self.population[other].machines[machine],
                        )
                        .len()
                    })
                    .sum::<usize>()
            })
            .max()
            .unwrap_or(0)
    }

    /// Scores every member on makespan and diversity and removes the two
    /// worst, bringing the population back to its target size.
    fn shrink_population(&mut self) {
        let similarity: Vec<usize> = (0..self.population.len())
            .map(|index| self.similarity_degree(index))
            .collect();
        let (min_makespan, max_makespan) = self
            .population
            .iter()
            .map(|s| s.makespan)
            .minmax()
            .into_option()
            .expect("population cannot shrink below two members");
        let (min_similarity, max_similarity) = similarity
            .iter()
            .copied()
            .minmax()
            .into_option()
            .expect("population cannot shrink below two members");

        let mut scored: Vec<(f64, usize)> = (0..self.population.len())
            .map(|index| {
                let quality = self.beta
                    * normalize(max_makespan as f64, min_makespan as f64, self.population[index].makespan as f64)
                    + (1.0 - self.beta)
                        * normalize(max_similarity as f64, min_similarity as f64, similarity[index] as f64);
                (quality, index)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (evict_1, evict_2) = (scored[0].1, scored[1].1);
        // the larger index must go first or it would shift under the removal
        self.population.remove(evict_1.max(evict_2));
        self.population.remove(evict_1.min(evict_2));
    }

    fn log_makespan(&mut self, makespan: u32) {
        self.history.push((self.started.elapsed().as_secs_f64(), makespan));
    }
}

/// Windowed linear scaling onto `[0, 1)`: the closer `value` sits to `high`,
/// the smaller the score. The widened denominator keeps the score defined
/// when the whole population collapses onto one value.
fn normalize(high: f64, low: f64, value: f64) -> f64 {
    (high - value) / (high - low + 1.0)
}

/// Longest common subsequence of two job permutations by the usual quadratic
/// dynamic program. Ties in the walk-back resolve towards the first
/// argument, which keeps the walk strictly monotone.
pub(crate) fn longest_common_subsequence(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut dp = vec![vec![0u32; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let mut lcs = Vec::with_capacity(dp[a.len()][b.len()] as usize);
    let mut i = a.len();
    let mut j = b.len();
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            lcs.push(a[i - 1]);
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    lcs.reverse();
    lcs
}

/// Builds one child permutation: the common subsequence keeps the positions
/// it has in the first parent, every other slot is filled with the remaining
/// jobs in the order the second parent runs them.
pub(crate) fn crossover(parent_1: &[usize], parent_2: &[usize], lcs: &[usize]) -> Vec<usize> {
    let mut leftover = Vec::with_capacity(parent_2.len() - lcs.len());
    let mut consumed = 0;
    for &job in parent_2 {
        if consumed < lcs.len() && job == lcs[consumed] {
            consumed += 1;
        } else {
            leftover.push(job);
        }
    }

    let mut child = Vec::with_capacity(parent_1.len());
    let mut consumed = 0;
    let mut next_leftover = 0;
    for &job in parent_1 {
        if consumed < lcs.len() && job == lcs[consumed] {
            child.push(job);
            consumed += 1;
        } else {
            child.push(leftover[next_leftover]);
            next_leftover += 1;
        }
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcs_of_shifted_permutations() {
        let lcs = longest_common_subsequence(&[1, 2, 3, 4, 5, 6], &[5, 1, 6, 2, 3, 4]);
        assert_eq!(lcs, vec![1, 2, 3, 4]);
    }

    #[test]
    fn lcs_is_a_subsequence_of_both_arguments() {
        let a = vec![4, 0, 2, 5, 1, 3];
        let b = vec![0, 4, 5, 2, 3, 1];
        let lcs = longest_common_subsequence(&a, &b);
        for sequence in [&a, &b] {
            let mut position = 0;
            for &job in sequence.iter() {
                if position < lcs.len() && lcs[position] == job {
                    position += 1;
                }
            }
            assert_eq!(position, lcs.len());
        }
    }

    #[test]
    fn lcs_of_equal_permutations_is_the_permutation() {
        let a = vec![3, 1, 4, 0, 2];
        assert_eq!(longest_common_subsequence(&a, &a), a);
    }

    #[test]
    fn crossover_children_are_permutations() {
        let p1 = vec![1, 2, 3, 4, 5, 6];
        let p2 = vec![3, 2, 4, 1, 5, 6];
        let lcs = longest_common_subsequence(&p1, &p2);
        for child in [crossover(&p1, &p2, &lcs), crossover(&p2, &p1, &lcs)] {
            let mut sorted = child.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn crossover_of_identical_parents_reproduces_them() {
        let parent = vec![2, 0, 3, 1];
        let lcs = longest_common_subsequence(&parent, &parent);
        assert_eq!(crossover(&parent, &parent, &lcs), parent);
    }

    fn tiny_instance() -> Instance {
        Instance::from_reader(
            "3\t3\n0\t3\t1\t2\t2\t2\n1\t4\t0\t3\t2\t1\n2\t2\t1\t4\t0\t2\n".as_bytes(),
            1234,
        )
        .unwrap()
    }

    #[test]
    fn generations_return_feasible_consistent_solutions() {
        let instance = tiny_instance();
        let mut memetic = Memetic::with_params(&instance, 6, 60, 0.6);
        let best = memetic.optimize_generations(3);
        assert_eq!(instance.makespan(&best.machines), best.makespan);
    }

    #[test]
    fn generations_are_deterministic() {
        let instance = tiny_instance();
        let first = Memetic::with_params(&instance, 6, 60, 0.6).optimize_generations(3);
        let second = Memetic::with_params(&instance, 6, 60, 0.6).optimize_generations(3);
        assert_eq!(first, second);
    }

    #[test]
    fn eviction_drops_poor_redundant_members() {
        let instance = tiny_instance();
        let mut memetic = Memetic::with_params(&instance, 2, 10, 0.6);
        let good_a = Solution { machines: vec![vec![0, 1, 2], vec![1, 0, 2], vec![2, 1, 0]], makespan: 10 };
        let good_b = Solution { machines: vec![vec![2, 1, 0], vec![0, 2, 1], vec![1, 0, 2]], makespan: 11 };
        let poor = Solution { machines: vec![vec![0, 1, 2], vec![0, 1, 2], vec![0, 1, 2]], makespan: 40 };
        memetic.population = vec![good_a.clone(), good_b.clone(), poor.clone(), poor.clone()];

        memetic.shrink_population();

        assert_eq!(memetic.population, vec![good_a, good_b]);
    }
}
