use crate::{GraphError, Op, OpNode, SwapKind};

/// Arena of operation nodes for one schedule.
///
/// Node ids are stable for the lifetime of the graph: job `j`'s operations
/// occupy the contiguous id range `job_offsets[j]..job_offsets[j + 1]` in
/// job order. Machine arcs are the only links that change when a move is
/// applied.
#[derive(Debug, Clone)]
pub struct DisjunctiveGraph {
    nodes: Vec<OpNode>,
    job_offsets: Vec<usize>,
    makespan: u32,
}

impl DisjunctiveGraph {
    /// Builds the graph by scheduling `machines` against the job chains.
    ///
    /// Runs the same forward sweep an exact makespan evaluation would: every
    /// time an operation becomes schedulable it is given its earliest start
    /// and hooked into its job and machine chains. A full pass over all
    /// machines without progress means the machine orders are cyclic.
    pub fn build(jobs: &[Vec<Op>], machines: &[Vec<usize>]) -> Result<Self, GraphError> {
        let mut job_offsets = Vec::with_capacity(jobs.len() + 1);
        let mut total = 0;
        for job in jobs {
            job_offsets.push(total);
            total += job.len();
        }
        job_offsets.push(total);

        let mut nodes = Vec::with_capacity(total);
        for (job_id, job) in jobs.iter().enumerate() {
            let first = job_offsets[job_id];
            for (index, op) in job.iter().enumerate() {
                let id = first + index;
                nodes.push(OpNode {
                    machine: op.machine,
                    job: job_id,
                    duration: op.duration,
                    head: 0,
                    tail: 0,
                    job_pred: (index > 0).then(|| id - 1),
                    job_succ: (index + 1 < job.len()).then(|| id + 1),
                    mach_pred: None,
                    mach_succ: None,
                });
            }
        }

        let mut sol_ptr = vec![0usize; machines.len()];
        let mut job_ptr = vec![0usize; jobs.len()];
        let mut machine_end = vec![0u32; machines.len()];
        let mut job_end = vec![0u32; jobs.len()];
        let mut machine_last: Vec<Option<usize>> = vec![None; machines.len()];

        let mut remaining = total;
        while remaining > 0 {
            let mut progressed = false;
            for machine in 0..machines.len() {
                if sol_ptr[machine] == machines[machine].len() {
                    continue;
                }
                let job = machines[machine][sol_ptr[machine]];
                if job_ptr[job] == jobs[job].len() || jobs[job][job_ptr[job]].machine != machine {
                    continue;
                }
                let id = job_offsets[job] + job_ptr[job];
                nodes[id].head = job_end[job].max(machine_end[machine]);
                if let Some(prev) = machine_last[machine] {
                    nodes[prev].mach_succ = Some(id);
                    nodes[id].mach_pred = Some(prev);
                }
                machine_last[machine] = Some(id);

                let end = nodes[id].end();
                job_end[job] = end;
                machine_end[machine] = end;
                sol_ptr[machine] += 1;
                job_ptr[job] += 1;
                remaining -= 1;
                progressed = true;
            }
            if !progressed {
                return Err(GraphError::Cyclic);
            }
        }

        Ok(DisjunctiveGraph {
            nodes,
            job_offsets,
            makespan: machine_end.into_iter().max().unwrap_or(0),
        })
    }

    pub fn makespan(&self) -> u32 {
        self.makespan
    }

    pub fn node(&self, id: usize) -> &OpNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[OpNode] {
        &self.nodes
    }

    pub fn job_count(&self) -> usize {
        self.job_offsets.len() - 1
    }

    /// Id of the node where `job` runs on `machine`.
    pub fn node_on_machine(&self, job: usize, machine: usize) -> usize {
        let chain = self.job_offsets[job]..self.job_offsets[job + 1];
        chain
            .into_iter()
            .find(|&id| self.nodes[id].machine == machine)
            .expect("job has no operation on that machine")
    }

    /// Recomputes every `tail` label by backward relaxation.
    ///
    /// Machine tails are settled in order of decreasing completion time, so
    /// most nodes are final the first time they are relaxed; a node that is
    /// improved later simply propagates again.
    pub fn compute_tails(&mut self) {
        for node in &mut self.nodes {
            node.tail = 0;
        }

        let mut seeds: Vec<usize> = (0..self.nodes.len())
            .filter(|&id| self.nodes[id].mach_succ.is_none())
            .collect();
        seeds.sort_by(|&a, &b| self.nodes[b].end().cmp(&self.nodes[a].end()));

        let mut stack = Vec::with_capacity(self.nodes.len());
        for seed in seeds {
            stack.push(seed);
            while let Some(id) = stack.pop() {
                let reach = self.nodes[id].tail + self.nodes[id].duration;
                for pred in [self.nodes[id].mach_pred, self.nodes[id].job_pred] {
                    if let Some(p) = pred {
                        if self.nodes[p].tail < reach {
                            self.nodes[p].tail = reach;
                            stack.push(p);
                        }
                    }
                }
            }
        }
    }

    /// One longest path from a source to a sink, as node ids.
    ///
    /// Requires `compute_tails` to have run since the last move. The walk
    /// prefers the machine successor when both successors lie on a longest
    /// path, matching the order blocks are folded in.
    pub fn longest_path(&self) -> Vec<usize> {
        let start = self
            .job_offsets
            .iter()
            .take(self.job_count())
            .copied()
            .find(|&id| self.nodes[id].tail + self.nodes[id].duration == self.makespan);
        let Some(start) = start else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        while self.nodes[current].tail != 0 {
            let target = self.nodes[current].tail;
            let next = [self.nodes[current].mach_succ, self.nodes[current].job_succ]
                .into_iter()
                .flatten()
                .find(|&s| self.nodes[s].tail + self.nodes[s].duration == target);
            match next {
                Some(s) => {
                    path.push(s);
                    current = s;
                }
                None => break,
            }
        }
        path
    }

    /// Folds a critical path into maximal same-machine runs of length >= 2.
    pub fn blocks(&self, path: &[usize]) -> Vec<Vec<usize>> {
        let mut blocks = Vec::new();
        let mut block: Vec<usize> = Vec::new();
        for &id in path {
            let same_machine = block
                .last()
                .map_or(true, |&last| self.nodes[id].machine == self.nodes[last].machine);
            if !same_machine {
                if block.len() > 1 {
                    blocks.push(std::mem::take(&mut block));
                } else {
                    block.clear();
                }
            }
            block.push(id);
        }
        if block.len() > 1 {
            blocks.push(block);
        }
        blocks
    }

    /// Rewires the machine chain for a move between `n1` and `n2`.
    ///
    /// `n1` must precede `n2` on their common machine. The job chain is never
    /// touched; callers follow up with [`left_shift`](Self::left_shift) to
    /// restore the start labels.
    pub fn apply_swap(&mut self, n1: usize, n2: usize, kind: SwapKind) {
        match kind {
            SwapKind::Forward => {
                // n1 leaves its slot and re-enters directly after n2
                let old_pred = self.nodes[n1].mach_pred;
                let old_succ = self.nodes[n1].mach_succ;
                self.nodes[n1].mach_pred = Some(n2);
                self.nodes[n1].mach_succ = self.nodes[n2].mach_succ;
                if let Some(s) = self.nodes[n1].mach_succ {
                    self.nodes[s].mach_pred = Some(n1);
                }
                self.nodes[n2].mach_succ = Some(n1);
                if let Some(p) = old_pred {
                    self.nodes[p].mach_succ = old_succ;
                }
                if let Some(s) = old_succ {
                    self.nodes[s].mach_pred = old_pred;
                }
            }
            SwapKind::Backward => {
                // n2 leaves its slot and re-enters directly before n1
                let old_pred = self.nodes[n2].mach_pred;
                let old_succ = self.nodes[n2].mach_succ;
                self.nodes[n2].mach_pred = self.nodes[n1].mach_pred;
                self.nodes[n2].mach_succ = Some(n1);
                if let Some(p) = self.nodes[n2].mach_pred {
                    self.nodes[p].mach_succ = Some(n2);
                }
                self.nodes[n1].mach_pred = Some(n2);
                if let Some(p) = old_pred {
                    self.nodes[p].mach_succ = old_succ;
                }
                if let Some(s) = old_succ {
                    self.nodes[s].mach_pred = old_pred;
                }
            }
            SwapKind::Adjacent => {
                let old_pred = self.nodes[n1].mach_pred;
                self.nodes[n1].mach_succ = self.nodes[n2].mach_succ;
                if let Some(s) = self.nodes[n1].mach_succ {
                    self.nodes[s].mach_pred = Some(n1);
                }
                self.nodes[n1].mach_pred = Some(n2);
                self.nodes[n2].mach_pred = old_pred;
                self.nodes[n2].mach_succ = Some(n1);
                if let Some(p) = old_pred {
                    self.nodes[p].mach_succ = Some(n2);
                }
            }
        }
    }

    /// Recomputes all start labels from scratch and returns the new makespan.
    ///
    /// Breadth-first label correction from the true sources (no job and no
    /// machine predecessor): a node is re-queued whenever one of its
    /// successors moves to a later start.
    pub fn left_shift(&mut self) -> u32 {
        let mut queue: Vec<usize> = Vec::with_capacity(self.nodes.len());
        for job in 0..self.job_count() {
            let first = self.job_offsets[job];
            if self.nodes[first].mach_pred.is_none() {
                queue.push(first);
            }
        }
        for node in &mut self.nodes {
            node.head = 0;
            node.tail = 0;
        }

        let mut pos = 0;
        while pos < queue.len() {
            let id = queue[pos];
            pos += 1;
            let end = self.nodes[id].end();
            for succ in [self.nodes[id].mach_succ, self.nodes[id].job_succ] {
                if let Some(s) = succ {
                    if self.nodes[s].head < end {
                        self.nodes[s].head = end;
                        queue.push(s);
                    }
                }
            }
        }

        self.makespan = (0..self.job_count())
            .map(|job| self.nodes[self.job_offsets[job + 1] - 1].end())
            .max()
            .unwrap_or(0);
        self.makespan
    }
}
