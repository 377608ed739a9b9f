use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashSet;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::solution::Solution;

/// One operation of a job: which machine it needs and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub machine: usize,
    pub duration: u32,
    pub job: usize,
}

/// An immutable job-shop instance: every job is a fixed chain of operations,
/// every machine occurs in every job exactly once.
///
/// The master `seed` is the root of all randomness derived from this
/// instance; engines seed their own generators from it so that runs are
/// reproducible.
#[derive(Debug, Clone)]
pub struct Instance {
    pub jobs: Vec<Vec<Operation>>,
    pub job_count: usize,
    pub machine_count: usize,
    pub seed: u64,
}

impl Instance {
    pub fn new(jobs: Vec<Vec<Operation>>, seed: u64) -> Result<Self, String> {
        if jobs.is_empty() {
            return Err("instance has no jobs".to_owned());
        }
        let machine_count = jobs[0].len();
        for (job_id, job) in jobs.iter().enumerate() {
            if job.len() != machine_count {
                return Err(format!("job {} has {} operations, expected {}", job_id, job.len(), machine_count));
            }
            let mut seen = HashSet::with_capacity(machine_count);
            for op in job {
                if op.machine >= machine_count {
                    return Err(format!("job {} uses machine {} out of range", job_id, op.machine));
                }
                if !seen.insert(op.machine) {
                    return Err(format!("job {} visits machine {} twice", job_id, op.machine));
                }
                if op.duration == 0 {
                    return Err(format!("job {} has an operation with zero duration", job_id));
                }
            }
        }
        Ok(Instance {
            job_count: jobs.len(),
            machine_count,
            jobs,
            seed,
        })
    }

    /// Parses the tab-separated benchmark format: the first line holds the
    /// job and machine counts, each following line one job as alternating
    /// machine id and duration.
    pub fn from_reader<R: BufRead>(reader: R, seed: u64) -> Result<Self, String> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or("missing header line")?
            .map_err(|e| e.to_string())?;
        let (job_count, machine_count) = header
            .split_whitespace()
            .map(|x| x.parse::<usize>().ok())
            .collect_tuple()
            .and_then(|(jobs, machines)| Some((jobs?, machines?)))
            .ok_or("header is not '<jobs>\\t<machines>'")?;

        let mut jobs = Vec::with_capacity(job_count);
        for job_id in 0..job_count {
            let line = lines
                .next()
                .ok_or_else(|| format!("missing line for job {}", job_id))?
                .map_err(|e| e.to_string())?;
            let fields: Vec<usize> = line
                .split_whitespace()
                .map(|x| x.parse::<usize>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?;
            if fields.len() != 2 * machine_count {
                return Err(format!("job {} has {} fields, expected {}", job_id, fields.len(), 2 * machine_count));
            }
            let operations = fields
                .into_iter()
                .tuples()
                .map(|(machine, duration)| Operation {
                    machine,
                    duration: duration as u32,
                    job: job_id,
                })
                .collect();
            jobs.push(operations);
        }
        Instance::new(jobs, seed)
    }

    pub fn read<P: AsRef<Path>>(path: P, seed: u64) -> Result<Self, String> {
        let file = File::open(path).map_err(|_| "Could not read file".to_owned())?;
        Instance::from_reader(BufReader::new(file), seed)
    }

    pub fn operation_count(&self) -> usize {
        self.jobs.iter().map(Vec::len).sum()
    }

    /// Exact makespan of a feasible solution by forward simulation.
    ///
    /// Sweeps the machines, scheduling the next operation of a machine
    /// whenever it is also its job's next operation. Panics if the sweep
    /// stalls: the caller promised a feasible set of machine orders.
    pub fn makespan(&self, machines: &[Vec<usize>]) -> u32 {
        let mut machine_end = vec![0u32; machines.len()];
        let mut sol_ptr = vec![0usize; machines.len()];
        let mut job_end = vec![0u32; self.job_count];
        let mut job_ptr = vec![0usize; self.job_count];

        let mut remaining = self.operation_count();
        while remaining > 0 {
            let mut progressed = false;
            for machine in 0..machines.len() {
                if sol_ptr[machine] == machines[machine].len() {
                    continue;
                }
                let job = machines[machine][sol_ptr[machine]];
                if self.jobs[job][job_ptr[job]].machine != machine {
                    continue;
                }
                let end = job_end[job].max(machine_end[machine]) + self.jobs[job][job_ptr[job]].duration;
                job_end[job] = end;
                machine_end[machine] = end;
                sol_ptr[machine] += 1;
                job_ptr[job] += 1;
                remaining -= 1;
                progressed = true;
            }
            if !progressed {
                panic!("exact makespan of an infeasible solution ({} operations unscheduled)", remaining);
            }
        }
        machine_end.into_iter().max().unwrap_or(0)
    }

    /// Like [`makespan`](Self::makespan), but repairs the solution in place
    /// whenever the sweep stalls, so any permutation-per-machine input comes
    /// out feasible. Returns the makespan of the repaired solution.
    ///
    /// The relocation order is driven by a generator seeded with `seed`, or
    /// with the instance master seed when `None`.
    pub fn makespan_and_repair(&self, machines: &mut [Vec<usize>], seed: Option<u64>) -> u32 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(self.seed));

        let mut machine_end = vec![0u32; machines.len()];
        let mut sol_ptr = vec![0usize; machines.len()];
        let mut job_end = vec![0u32; self.job_count];
        let mut job_ptr = vec![0usize; self.job_count];

        let mut remaining = self.operation_count();
        while remaining > 0 {
            let mut progressed = false;
            for machine in 0..machines.len() {
                if sol_ptr[machine] == machines[machine].len() {
                    continue;
                }
                let job = machines[machine][sol_ptr[machine]];
                if self.jobs[job][job_ptr[job]].machine != machine {
                    continue;
                }
                let end = job_end[job].max(machine_end[machine]) + self.jobs[job][job_ptr[job]].duration;
                job_end[job] = end;
                machine_end[machine] = end;
                sol_ptr[machine] += 1;
                job_ptr[job] += 1;
                remaining -= 1;
                progressed = true;
            }
            if !progressed {
                self.recover(machines, &sol_ptr, &job_ptr, &mut rng);
            }
        }
        machine_end.into_iter().max().unwrap_or(0)
    }

    /// Unblocks a stalled sweep: a random job with unscheduled operations is
    /// pulled to the front of the unscheduled part of its target machine,
    /// keeping the relative order of the others.
    fn recover(&self, machines: &mut [Vec<usize>], sol_ptr: &[usize], job_ptr: &[usize], rng: &mut ChaCha8Rng) {
        let open_jobs: Vec<usize> = (0..self.job_count)
            .filter(|&job| job_ptr[job] < self.jobs[job].len())
            .collect();
        let job = open_jobs[rng.random_range(0..open_jobs.len())];
        let op = self.jobs[job][job_ptr[job]];

        let old = machines[op.machine]
            .iter()
            .position(|&j| j == job)
            .expect("job missing from machine permutation");
        machines[op.machine].remove(old);
        machines[op.machine].insert(sol_ptr[op.machine], job);
        tracing::trace!(job, machine = op.machine, "relocated job to unblock sweep");
    }

    /// A feasible solution from uniformly shuffled machine permutations,
    /// fixed up by the repair sweep.
    pub fn random_solution<R: Rng>(&self, rng: &mut R) -> Solution {
        let mut machines: Vec<Vec<usize>> = (0..self.machine_count)
            .map(|_| {
                let mut permutation: Vec<usize> = (0..self.job_count).collect();
                permutation.shuffle(rng);
                permutation
            })
            .collect();
        let makespan = self.makespan_and_repair(&mut machines, Some(rng.random()));
        Solution { machines, makespan }
    }

    /// Reads a solution file (first line makespan, then one machine
    /// permutation per line) and recomputes its makespan.
    pub fn read_solution<R: BufRead>(&self, reader: R) -> Result<Solution, String> {
        let mut lines = reader.lines();
        lines
            .next()
            .ok_or("missing makespan line")?
            .map_err(|e| e.to_string())?;

        let mut machines = Vec::with_capacity(self.machine_count);
        for machine in 0..self.machine_count {
            let line = lines
                .next()
                .ok_or_else(|| format!("missing line for machine {}", machine))?
                .map_err(|e| e.to_string())?;
            let permutation: Vec<usize> = line
                .split_whitespace()
                .map(|x| x.parse::<usize>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?;
            if permutation.len() != self.job_count {
                return Err(format!("machine {} lists {} jobs, expected {}", machine, permutation.len(), self.job_count));
            }
            machines.push(permutation);
        }
        let makespan = self.makespan(&machines);
        Ok(Solution { machines, makespan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn crossing_instance() -> Instance {
        Instance::from_reader("2\t2\n0\t3\t1\t2\n1\t4\t0\t3\n".as_bytes(), 7).unwrap()
    }

    #[test]
    fn parses_tab_separated_instances() {
        let instance = crossing_instance();
        assert_eq!(instance.job_count, 2);
        assert_eq!(instance.machine_count, 2);
        assert_eq!(instance.operation_count(), 4);
        assert_eq!(
            instance.jobs[1][0],
            Operation { machine: 1, duration: 4, job: 1 }
        );
    }

    #[test]
    fn rejects_malformed_headers_and_jobs() {
        assert!(Instance::from_reader("nonsense".as_bytes(), 0).is_err());
        // one field too few in job 0
        assert!(Instance::from_reader("1\t2\n0\t3\t1\n".as_bytes(), 0).is_err());
        // machine visited twice
        assert!(Instance::from_reader("1\t2\n0\t3\t0\t2\n".as_bytes(), 0).is_err());
        // zero duration
        assert!(Instance::from_reader("1\t2\n0\t0\t1\t2\n".as_bytes(), 0).is_err());
    }

    #[test]
    fn exact_makespan_of_a_feasible_solution() {
        let instance = crossing_instance();
        assert_eq!(instance.makespan(&[vec![0, 1], vec![1, 0]]), 7);
        assert_eq!(instance.makespan(&[vec![0, 1], vec![0, 1]]), 12);
    }

    #[test]
    #[should_panic(expected = "infeasible")]
    fn exact_makespan_panics_on_stall() {
        let instance = crossing_instance();
        instance.makespan(&[vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn repair_produces_consistent_feasible_solutions() {
        let instance = crossing_instance();
        let mut machines = vec![vec![1, 0], vec![0, 1]];
        let makespan = instance.makespan_and_repair(&mut machines, Some(99));
        assert_eq!(instance.makespan(&machines), makespan);
    }

    #[test]
    fn random_solutions_are_feasible() {
        let instance = crossing_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(instance.seed);
        for _ in 0..20 {
            let solution = instance.random_solution(&mut rng);
            assert_eq!(instance.makespan(&solution.machines), solution.makespan);
        }
    }

    #[test]
    fn solution_files_round_trip() {
        let instance = crossing_instance();
        let solution = crate::solution::Solution {
            machines: vec![vec![0, 1], vec![1, 0]],
            makespan: instance.makespan(&[vec![0, 1], vec![1, 0]]),
        };
        let mut buffer = Vec::new();
        solution.write_to(&mut buffer).unwrap();
        let read = instance.read_solution(buffer.as_slice()).unwrap();
        assert_eq!(read, solution);
    }
}
