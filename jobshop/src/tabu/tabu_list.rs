use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::problem::Instance;
use crate::tabu::neighbourhood::Neighbour;

/// One prohibited move attribute: the permutation snapshot a machine had
/// right after a move, together with the index range the move touched.
#[derive(Debug, Clone)]
struct TabuItem {
    tenure: i64,
    machine: usize,
    id: u64,
    start_index: usize,
    end_index: usize,
    sequence: Vec<usize>,
}

/// Attribute-based tabu memory with dynamic tenure.
///
/// A neighbour is tabu when some stored item of the same machine matches the
/// neighbour's permutation on the item's whole index range. Capacity and
/// tenure follow Zhang et al.: the capacity is sampled once per search from
/// `[10 + J/M, 1.5 * (10 + J/M)]`, the tenure of a new item is
/// `tt + U[0, max((makespan - best) / d1, d2)]`.
#[derive(Debug)]
pub struct TabuList {
    items: Vec<TabuItem>,
    capacity: usize,
    rng: ChaCha8Rng,
    next_id: u64,
    tt: i64,
    d1: i64,
    d2: i64,
}

impl TabuList {
    pub fn new(instance: &Instance) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(instance.seed);
        let capacity = sample_capacity(instance, &mut rng);
        TabuList {
            items: Vec::with_capacity(capacity),
            capacity,
            rng,
            next_id: 0,
            tt: 2,
            d1: 5,
            d2: 12,
        }
    }

    pub fn set_params(&mut self, tt: i64, d1: i64, d2: i64, capacity: Option<usize>) {
        self.tt = tt;
        self.d1 = d1;
        self.d2 = d2;
        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
    }

    pub fn is_tabu(&self, neighbour: &Neighbour) -> bool {
        self.items.iter().any(|item| {
            item.machine == neighbour.machine
                && neighbour.sequence[item.start_index..=item.end_index]
                    == item.sequence[item.start_index..=item.end_index]
        })
    }

    /// Ages the list by one move, evicts for capacity if needed, then stores
    /// the just-taken neighbour.
    pub fn insert(&mut self, neighbour: &Neighbour, best_makespan: u32) {
        for item in &mut self.items {
            item.tenure -= 1;
        }
        self.items.retain(|item| item.tenure > 0);
        if self.items.len() >= self.capacity {
            if let Some(pos) = self
                .items
                .iter()
                .enumerate()
                .min_by_key(|(_, item)| item.tenure)
                .map(|(pos, _)| pos)
            {
                let evicted = self.items.remove(pos);
                tracing::trace!(id = evicted.id, tenure = evicted.tenure, "evicted tabu item for capacity");
            }
        }

        let spread = ((neighbour.makespan as i64 - best_makespan as i64) / self.d1)
            .max(self.d2)
            .max(0);
        let tenure = self.tt + self.rng.random_range(0..=spread);
        self.next_id += 1;
        self.items.push(TabuItem {
            tenure,
            machine: neighbour.machine,
            id: self.next_id,
            start_index: neighbour.start_index,
            end_index: neighbour.end_index,
            sequence: neighbour.sequence.clone(),
        });
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.next_id = 0;
    }
}

fn sample_capacity(instance: &Instance, rng: &mut ChaCha8Rng) -> usize {
    let min = 10.0 + instance.job_count as f64 / instance.machine_count as f64;
    let max = if instance.machine_count * 2 > instance.job_count {
        1.4 * min
    } else {
        1.5 * min
    };
    (rng.random_range(0.0..1.0) * (max - min) + min).ceil() as usize
}
