//! Randomized construction heuristics for seeding the optimizers.

use rand::Rng;

use crate::problem::Instance;
use crate::solution::Solution;

#[derive(Debug, Clone, Copy)]
struct Placed {
    job: usize,
    start: u32,
    duration: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Placed {
    fn end(&self) -> u32 {
        self.start + self.duration
    }
}

/// Operations placed on one machine so far, kept as a linked list over an
/// arena so gap insertion never shifts elements.
#[derive(Debug, Default)]
struct MachineList {
    slots: Vec<Placed>,
    first: Option<usize>,
}

impl MachineList {
    /// Places an operation at the earliest point that fits its duration and
    /// respects `min_time`, the completion of the job's previous operation.
    /// Returns the chosen start.
    fn insert(&mut self, job: usize, duration: u32, min_time: u32) -> u32 {
        let Some(mut current) = self.first else {
            self.slots.push(Placed { job, start: min_time, duration, prev: None, next: None });
            self.first = Some(0);
            return min_time;
        };

        let mut gap_start = 0u32;
        loop {
            let Placed { start, prev, next, .. } = self.slots[current];
            // does the gap before `current` hold the operation?
            if gap_start + duration <= start && min_time + duration <= start {
                let chosen = match prev {
                    Some(p) => self.slots[p].end().max(min_time),
                    None => min_time,
                };
                let id = self.slots.len();
                self.slots.push(Placed { job, start: chosen, duration, prev, next: Some(current) });
                match prev {
                    Some(p) => self.slots[p].next = Some(id),
                    None => self.first = Some(id),
                }
                self.slots[current].prev = Some(id);
                return chosen;
            }
            match next {
                Some(n) => {
                    gap_start = self.slots[current].end();
                    current = n;
                }
                None => {
                    let chosen = self.slots[current].end().max(min_time);
                    let id = self.slots.len();
                    self.slots.push(Placed { job, start: chosen, duration, prev: Some(current), next: None });
                    self.slots[current].next = Some(id);
                    return chosen;
                }
            }
        }
    }

    /// The job order on this machine, by increasing start time.
    fn sequence(&self) -> Vec<usize> {
        let mut sequence = Vec::with_capacity(self.slots.len());
        let mut current = self.first;
        while let Some(id) = current {
            sequence.push(self.slots[id].job);
            current = self.slots[id].next;
        }
        sequence
    }
}

/// Builds a random semi-active solution: jobs are drawn uniformly and their
/// next operation is slotted into the earliest feasible gap on its machine.
/// The start times are discarded; only the machine orders survive.
pub fn random_semi_active<R: Rng>(instance: &Instance, rng: &mut R) -> Solution {
    let mut machines: Vec<MachineList> = (0..instance.machine_count).map(|_| MachineList::default()).collect();
    let mut job_ptr = vec![0usize; instance.job_count];
    let mut job_ready = vec![0u32; instance.job_count];

    let mut remaining = instance.operation_count();
    while remaining > 0 {
        let mut job = rng.random_range(0..instance.job_count);
        while job_ptr[job] == instance.jobs[job].len() {
            job = rng.random_range(0..instance.job_count);
        }
        let op = instance.jobs[job][job_ptr[job]];
        let start = machines[op.machine].insert(job, op.duration, job_ready[job]);
        job_ready[job] = start + op.duration;
        job_ptr[job] += 1;
        remaining -= 1;
    }

    let machines: Vec<Vec<usize>> = machines.iter().map(MachineList::sequence).collect();
    let makespan = instance.makespan(&machines);
    Solution { machines, makespan }
}
