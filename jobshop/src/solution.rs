use std::io::{self, Write};

use itertools::Itertools;

/// A schedule as the optimizers exchange it: one job permutation per machine
/// plus the exact makespan of the induced schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub machines: Vec<Vec<usize>>,
    pub makespan: u32,
}

impl Solution {
    /// Writes the solution file format: the makespan, then one machine
    /// permutation per line, tab-separated.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self.makespan)?;
        for machine in &self.machines {
            writeln!(writer, "{}", machine.iter().join("\t"))?;
        }
        Ok(())
    }
}

/// Outcome of a time-budgeted optimization run: the best solution found and
/// every improvement as `(elapsed seconds, makespan)`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub solution: Solution,
    pub history: Vec<(f64, u32)>,
}
