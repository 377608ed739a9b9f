pub mod heuristics;
pub mod memetic;
pub mod problem;
pub mod solution;
pub mod tabu;

#[cfg(test)]
mod tests {
    use crate::memetic::Memetic;
    use crate::problem::Instance;
    use crate::tabu::TabuSearch;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    // Fisher & Thompson 6x6, optimum 55.
    const FT06: &str = "6\t6\n\
        2\t1\t0\t3\t1\t6\t3\t7\t5\t3\t4\t6\n\
        1\t8\t2\t5\t4\t10\t5\t10\t0\t10\t3\t4\n\
        2\t5\t3\t4\t5\t8\t0\t9\t1\t1\t4\t7\n\
        1\t5\t0\t5\t2\t5\t3\t3\t4\t8\t5\t9\n\
        2\t9\t1\t3\t4\t5\t5\t4\t0\t3\t3\t1\n\
        1\t3\t3\t3\t5\t9\t0\t10\t4\t4\t2\t1\n";

    fn ft06(seed: u64) -> Instance {
        Instance::from_reader(FT06.as_bytes(), seed).unwrap()
    }

    #[test]
    fn ft06_parses() {
        let instance = ft06(1234);
        assert_eq!(instance.job_count, 6);
        assert_eq!(instance.machine_count, 6);
        assert_eq!(instance.operation_count(), 36);
    }

    #[test]
    fn repair_accepts_arbitrary_permutations() {
        let instance = ft06(1234);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            let solution = instance.random_solution(&mut rng);
            assert_eq!(instance.makespan(&solution.machines), solution.makespan);
        }
    }

    #[test]
    fn semi_active_seeds_are_feasible() {
        let instance = ft06(1234);
        let mut rng = ChaCha8Rng::seed_from_u64(instance.seed);
        let solution = crate::heuristics::random_semi_active(&instance, &mut rng);
        assert_eq!(instance.makespan(&solution.machines), solution.makespan);
    }

    #[test]
    fn tabu_search_never_degrades_the_seed() {
        let instance = ft06(1234);
        let mut rng = ChaCha8Rng::seed_from_u64(instance.seed);
        let seed_solution = instance.random_solution(&mut rng);

        let mut search = TabuSearch::new(&instance);
        let best = search.optimize_iterations(&seed_solution, 2_000);

        assert!(best.makespan <= seed_solution.makespan);
        assert_eq!(instance.makespan(&best.machines), best.makespan);
    }

    #[test]
    fn tabu_search_solves_ft06() {
        let instance = ft06(1234);
        let mut rng = ChaCha8Rng::seed_from_u64(instance.seed);
        let seed_solution = instance.random_solution(&mut rng);

        let mut search = TabuSearch::new(&instance);
        let result = search.optimize_time(&seed_solution, 2.0, 55);

        assert_eq!(result.solution.makespan, 55);
        assert_eq!(instance.makespan(&result.solution.machines), 55);
        for pair in result.history.windows(2) {
            assert!(pair[1].1 < pair[0].1);
        }
    }

    #[test]
    fn memetic_runs_on_ft06() {
        let instance = ft06(1234);
        let mut memetic = Memetic::with_params(&instance, 8, 400, 0.6);
        let result = memetic.optimize(2.0, 55);

        assert_eq!(instance.makespan(&result.solution.machines), result.solution.makespan);
        assert!(result.solution.makespan < 100);
        for pair in result.history.windows(2) {
            assert!(pair[1].1 < pair[0].1);
        }
    }
}
