//! N7-style neighbourhood over critical-path blocks.
//!
//! Every move relocates one operation inside a block, either behind a later
//! block member (forward) or in front of an earlier one (backward). The
//! candidate makespan is approximated locally from the graph labels; only
//! the chosen move is ever evaluated exactly.

use disjunctgraph::{DisjunctiveGraph, SwapKind};

/// One candidate move: the machine permutation after the move, the index
/// range it changes, and an approximate makespan used for ranking.
#[derive(Debug, Clone)]
pub struct Neighbour {
    pub sequence: Vec<usize>,
    pub machine: usize,
    pub makespan: u32,
    pub start_index: usize,
    pub end_index: usize,
    pub kind: SwapKind,
}

/// Generates the neighbourhood of the schedule currently in `graph`.
///
/// Relabels the graph, folds one longest path into blocks and emits every
/// feasibility-checked block move. An empty result means the critical path
/// has no block, so no move can improve the schedule.
pub fn generate(graph: &mut DisjunctiveGraph, machines: &[Vec<usize>]) -> Vec<Neighbour> {
    graph.compute_tails();
    let path = graph.longest_path();
    let blocks = graph.blocks(&path);

    let mut neighbourhood = Vec::new();
    for block in &blocks {
        from_block(graph, machines, block, &mut neighbourhood);
    }
    neighbourhood
}

fn from_block(graph: &DisjunctiveGraph, machines: &[Vec<usize>], block: &[usize], out: &mut Vec<Neighbour>) {
    let machine = graph.node(block[0]).machine();
    let sequence = &machines[machine];
    let start_index = sequence
        .iter()
        .position(|&job| job == graph.node(block[0]).job())
        .expect("block head missing from machine permutation");

    if block.len() == 2 {
        out.push(forward_swap(graph, sequence, start_index, 0, 1, machine, block));
        return;
    }

    let last = block.len() - 1;
    // middle operations behind the tail
    for u in 1..last {
        if check_forward(graph, block[u], block[last]) {
            out.push(forward_swap(graph, sequence, start_index, u, last, machine, block));
        }
    }
    // the head behind every later operation
    for v in 1..=last {
        if check_forward(graph, block[0], block[v]) {
            out.push(forward_swap(graph, sequence, start_index, 0, v, machine, block));
        }
    }
    // middle operations in front of the head
    for v in 1..last {
        if check_backward(graph, block[0], block[v]) {
            out.push(backward_swap(graph, sequence, start_index, 0, v, machine, block));
        }
    }
    // the tail in front of every earlier operation
    for u in 0..last {
        if check_backward(graph, block[u], block[last]) {
            out.push(backward_swap(graph, sequence, start_index, u, last, machine, block));
        }
    }
}

/// Moving `u` behind `v` cannot break the job chain hanging off `u`.
fn check_forward(graph: &DisjunctiveGraph, u: usize, v: usize) -> bool {
    match graph.node(u).job_succ() {
        None => true,
        Some(js) => {
            let v = graph.node(v);
            let js = graph.node(js);
            v.tail() + v.duration() >= js.tail() + js.duration()
        }
    }
}

/// Moving `v` in front of `u` cannot break the job chain leading into `v`.
fn check_backward(graph: &DisjunctiveGraph, u: usize, v: usize) -> bool {
    match graph.node(v).job_pred() {
        None => true,
        Some(jp) => {
            let u = graph.node(u);
            let jp = graph.node(jp);
            u.head() + u.duration() >= jp.head() + jp.duration()
        }
    }
}

fn end_of_job_pred(graph: &DisjunctiveGraph, id: usize) -> u32 {
    graph.node(id).job_pred().map(|p| graph.node(p).end()).unwrap_or(0)
}

fn end_of_mach_pred(graph: &DisjunctiveGraph, id: usize) -> u32 {
    graph.node(id).mach_pred().map(|p| graph.node(p).end()).unwrap_or(0)
}

fn tail_of_job_succ(graph: &DisjunctiveGraph, id: usize) -> u32 {
    graph
        .node(id)
        .job_succ()
        .map(|s| graph.node(s).tail() + graph.node(s).duration())
        .unwrap_or(0)
}

fn tail_of_mach_succ(graph: &DisjunctiveGraph, id: usize) -> u32 {
    graph
        .node(id)
        .mach_succ()
        .map(|s| graph.node(s).tail() + graph.node(s).duration())
        .unwrap_or(0)
}

/// Moves `block[u]` directly behind `block[v]` and estimates the resulting
/// makespan over the shifted range.
///
/// `len_to[w]` is the new earliest start of the original `block[u + w]`,
/// `len_from[w]` its new tail including its own duration; both are filled in
/// the order the move permutes the range (the displaced head settles last in
/// the forward pass, first in the backward pass).
fn forward_swap(
    graph: &DisjunctiveGraph,
    sequence: &[usize],
    start_index: usize,
    u: usize,
    v: usize,
    machine: usize,
    block: &[usize],
) -> Neighbour {
    let mut sequence = sequence.to_vec();
    let moved = sequence.remove(start_index + u);
    sequence.insert(start_index + v, moved);

    let size = v - u + 1;
    let mut len_to = vec![0u32; size];
    let mut len_from = vec![0u32; size];
    let dur = |id: usize| graph.node(id).duration();

    len_to[1] = end_of_job_pred(graph, block[u + 1]).max(end_of_mach_pred(graph, block[u]));
    for w in 2..size {
        len_to[w] = end_of_job_pred(graph, block[u + w]).max(len_to[w - 1] + dur(block[u + w - 1]));
    }
    len_to[0] = end_of_job_pred(graph, block[u]).max(len_to[size - 1] + dur(block[v]));

    len_from[0] = tail_of_job_succ(graph, block[u]).max(tail_of_mach_succ(graph, block[v])) + dur(block[u]);
    len_from[size - 1] = tail_of_job_succ(graph, block[v]).max(len_from[0]) + dur(block[v]);
    for w in (1..size - 1).rev() {
        len_from[w] = tail_of_job_succ(graph, block[u + w]).max(len_from[w + 1]) + dur(block[u + w]);
    }

    let makespan = (0..size).map(|w| len_to[w] + len_from[w]).max().unwrap_or(0);
    let kind = if v - u == 1 { SwapKind::Adjacent } else { SwapKind::Forward };
    Neighbour {
        sequence,
        machine,
        makespan,
        start_index: start_index + u,
        end_index: start_index + v,
        kind,
    }
}

/// Moves `block[v]` directly in front of `block[u]`; otherwise as
/// [`forward_swap`].
fn backward_swap(
    graph: &DisjunctiveGraph,
    sequence: &[usize],
    start_index: usize,
    u: usize,
    v: usize,
    machine: usize,
    block: &[usize],
) -> Neighbour {
    let mut sequence = sequence.to_vec();
    let moved = sequence.remove(start_index + v);
    sequence.insert(start_index + u, moved);

    let size = v - u + 1;
    let mut len_to = vec![0u32; size];
    let mut len_from = vec![0u32; size];
    let dur = |id: usize| graph.node(id).duration();

    len_to[size - 1] = end_of_job_pred(graph, block[v]).max(end_of_mach_pred(graph, block[u]));
    len_to[0] = end_of_job_pred(graph, block[u]).max(len_to[size - 1] + dur(block[v]));
    for w in 1..size - 1 {
        len_to[w] = end_of_job_pred(graph, block[u + w]).max(len_to[w - 1] + dur(block[u + w - 1]));
    }

    len_from[size - 2] = tail_of_job_succ(graph, block[v - 1]).max(tail_of_mach_succ(graph, block[v])) + dur(block[v - 1]);
    for w in (0..size - 2).rev() {
        len_from[w] = tail_of_job_succ(graph, block[u + w]).max(len_from[w + 1]) + dur(block[u + w]);
    }
    len_from[size - 1] = tail_of_job_succ(graph, block[v]).max(len_from[0]) + dur(block[v]);

    let makespan = (0..size).map(|w| len_to[w] + len_from[w]).max().unwrap_or(0);
    let kind = if v - u == 1 { SwapKind::Adjacent } else { SwapKind::Backward };
    Neighbour {
        sequence,
        machine,
        makespan,
        start_index: start_index + u,
        end_index: start_index + v,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disjunctgraph::Op;

    // Three single-operation jobs on one machine: the whole schedule is one
    // block and every relocation stays feasible.
    fn single_machine_graph() -> (Vec<Vec<Op>>, Vec<Vec<usize>>) {
        let jobs = vec![
            vec![Op { machine: 0, duration: 2 }],
            vec![Op { machine: 0, duration: 5 }],
            vec![Op { machine: 0, duration: 1 }],
        ];
        let machines = vec![vec![0, 1, 2]];
        (jobs, machines)
    }

    #[test]
    fn two_operation_block_yields_one_adjacent_swap() {
        let jobs = vec![
            vec![Op { machine: 0, duration: 2 }],
            vec![Op { machine: 0, duration: 5 }],
        ];
        let machines = vec![vec![0, 1]];
        let mut graph = DisjunctiveGraph::build(&jobs, &machines).unwrap();

        let neighbourhood = generate(&mut graph, &machines);
        assert_eq!(neighbourhood.len(), 1);
        let neighbour = &neighbourhood[0];
        assert_eq!(neighbour.kind, SwapKind::Adjacent);
        assert_eq!(neighbour.sequence, vec![1, 0]);
        assert_eq!((neighbour.start_index, neighbour.end_index), (0, 1));
        // with no external arcs the estimate is exact: the same two
        // durations run back to back either way
        assert_eq!(neighbour.makespan, 7);
    }

    #[test]
    fn three_operation_block_emits_all_four_families() {
        let (jobs, machines) = single_machine_graph();
        let mut graph = DisjunctiveGraph::build(&jobs, &machines).unwrap();

        let mut neighbourhood = generate(&mut graph, &machines);
        // u=1 -> tail, head -> v in {1, 2}, v=1 -> head, tail -> u in {0, 1}
        assert_eq!(neighbourhood.len(), 6);
        for neighbour in &neighbourhood {
            let mut sorted = neighbour.sequence.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2]);
            // a pure permutation of durations on one machine: the estimate
            // can never beat the total processing time
            assert!(neighbour.makespan >= 8);
        }
        // every generated permutation differs from the current order
        neighbourhood.retain(|n| n.sequence == machines[0]);
        assert!(neighbourhood.is_empty());
    }

    #[test]
    fn job_linked_swaps_are_filtered_out() {
        // two jobs chained over two machines; the critical path crosses
        // machines, so its blocks never have length two on one machine
        let jobs = vec![
            vec![Op { machine: 0, duration: 3 }, Op { machine: 1, duration: 2 }],
            vec![Op { machine: 1, duration: 4 }, Op { machine: 0, duration: 3 }],
        ];
        let machines = vec![vec![0, 1], vec![1, 0]];
        let mut graph = DisjunctiveGraph::build(&jobs, &machines).unwrap();

        let neighbourhood = generate(&mut graph, &machines);
        assert!(neighbourhood.is_empty());
    }
}
