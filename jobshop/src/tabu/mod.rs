//! Tabu search over the N7 neighbourhood.
//!
//! The engine keeps one disjunctive graph alive per optimization call and
//! commits moves by rewiring machine arcs instead of rebuilding. Candidate
//! moves are ranked by their approximate makespan; an aspiring candidate is
//! only accepted after its exact makespan confirms the improvement.

mod neighbourhood;
mod tabu_list;

pub use neighbourhood::Neighbour;
pub use tabu_list::TabuList;

use std::time::Instant;

use disjunctgraph::{DisjunctiveGraph, Op};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::problem::Instance;
use crate::solution::{SearchResult, Solution};

pub struct TabuSearch<'a> {
    instance: &'a Instance,
    /// Job chains in the graph crate's vocabulary, converted once.
    ops: Vec<Vec<Op>>,
    tabu_list: TabuList,
    rng: ChaCha8Rng,
    history: Vec<(f64, u32)>,
    started: Instant,
}

impl<'a> TabuSearch<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        let ops = instance
            .jobs
            .iter()
            .map(|job| {
                job.iter()
                    .map(|op| Op { machine: op.machine, duration: op.duration })
                    .collect()
            })
            .collect();
        TabuSearch {
            instance,
            ops,
            tabu_list: TabuList::new(instance),
            rng: ChaCha8Rng::seed_from_u64(instance.seed),
            history: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn set_tabu_params(&mut self, tt: i64, d1: i64, d2: i64, capacity: Option<usize>) {
        self.tabu_list.set_params(tt, d1, d2, capacity);
    }

    /// Improves `solution` for at most `max_iterations` moves. The workhorse
    /// mode for the memetic algorithm: no history is recorded.
    pub fn optimize_iterations(&mut self, solution: &Solution, max_iterations: u64) -> Solution {
        self.tabu_list.reset();
        let mut current = solution.clone();
        let mut best = solution.clone();
        let mut graph = DisjunctiveGraph::build(&self.ops, &current.machines)
            .expect("tabu search needs a feasible seed solution");

        for _ in 0..max_iterations {
            if !self.step(&mut graph, &mut current, best.makespan) {
                break;
            }
            if current.makespan < best.makespan {
                best = current.clone();
            }
        }
        best
    }

    /// Standalone mode: improves `solution` until the wall-clock budget runs
    /// out or `lower_bound` is reached, recording every new best.
    pub fn optimize_time(&mut self, solution: &Solution, seconds: f64, lower_bound: u32) -> SearchResult {
        self.started = Instant::now();
        self.history.clear();
        self.tabu_list.reset();
        let mut current = solution.clone();
        let mut best = solution.clone();
        let mut graph = DisjunctiveGraph::build(&self.ops, &current.machines)
            .expect("tabu search needs a feasible seed solution");
        self.log_makespan(best.makespan);

        while self.started.elapsed().as_secs_f64() < seconds && best.makespan != lower_bound {
            if !self.step(&mut graph, &mut current, best.makespan) {
                break;
            }
            if current.makespan < best.makespan {
                best = current.clone();
                self.log_makespan(best.makespan);
                tracing::debug!(makespan = best.makespan, "tabu search improved best");
            }
        }
        SearchResult {
            solution: best,
            history: std::mem::take(&mut self.history),
        }
    }

    /// One move: generate, select, apply. Returns false when the
    /// neighbourhood is empty and the search cannot continue.
    fn step(&mut self, graph: &mut DisjunctiveGraph, current: &mut Solution, best_makespan: u32) -> bool {
        let mut neighbourhood = neighbourhood::generate(graph, &current.machines);
        if neighbourhood.is_empty() {
            return false;
        }
        neighbourhood.sort_by_key(|n| n.makespan);

        let pick = self.select(&neighbourhood, current, best_makespan);
        let neighbour = neighbourhood.swap_remove(pick);
        self.apply(graph, current, neighbour, best_makespan);
        true
    }

    /// Selection order: best approximate makespan first; an apparently
    /// improving candidate must prove itself with an exact evaluation before
    /// it may override the tabu list. When everything is tabu, one candidate
    /// is drawn at random to force the search onto a new trajectory.
    fn select(&mut self, neighbourhood: &[Neighbour], current: &Solution, best_makespan: u32) -> usize {
        for (index, neighbour) in neighbourhood.iter().enumerate() {
            if neighbour.makespan < best_makespan {
                let mut candidate = current.machines.clone();
                candidate[neighbour.machine] = neighbour.sequence.clone();
                let exact = self.instance.makespan(&candidate);
                if exact >= best_makespan && self.tabu_list.is_tabu(neighbour) {
                    continue;
                }
                return index;
            } else if !self.tabu_list.is_tabu(neighbour) {
                return index;
            }
        }
        self.rng.random_range(0..neighbourhood.len())
    }

    fn apply(&mut self, graph: &mut DisjunctiveGraph, current: &mut Solution, neighbour: Neighbour, best_makespan: u32) {
        let sequence = &current.machines[neighbour.machine];
        let n1 = graph.node_on_machine(sequence[neighbour.start_index], neighbour.machine);
        let n2 = graph.node_on_machine(sequence[neighbour.end_index], neighbour.machine);

        graph.apply_swap(n1, n2, neighbour.kind);
        current.makespan = graph.left_shift();
        self.tabu_list.insert(&neighbour, best_makespan);
        current.machines[neighbour.machine] = neighbour.sequence;
    }

    fn log_makespan(&mut self, makespan: u32) {
        self.history.push((self.started.elapsed().as_secs_f64(), makespan));
    }
}
