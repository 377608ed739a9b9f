use std::fs::File;
use std::io::BufWriter;
use std::process::exit;

use jobshop::memetic::Memetic;
use jobshop::problem::Instance;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: jobshop <instance> [seconds] [seed] [lower-bound] [solution-out]");
        exit(2);
    };
    let seconds: f64 = parse_arg(args.next(), 60.0, "seconds");
    let seed: u64 = parse_arg(args.next(), 0, "seed");
    let lower_bound: u32 = parse_arg(args.next(), 0, "lower-bound");
    let solution_out = args.next();

    let instance = Instance::read(&path, seed).unwrap_or_else(|error| {
        eprintln!("{}: {}", path, error);
        exit(1);
    });
    tracing::info!(
        jobs = instance.job_count,
        machines = instance.machine_count,
        seed,
        seconds,
        "starting memetic optimization"
    );

    let mut memetic = Memetic::new(&instance);
    let result = memetic.optimize(seconds, lower_bound);

    println!("makespan\t{}", result.solution.makespan);
    for (elapsed, makespan) in &result.history {
        println!("{:.3}\t{}", elapsed, makespan);
    }

    if let Some(out) = solution_out {
        let file = File::create(&out).unwrap_or_else(|error| {
            eprintln!("{}: {}", out, error);
            exit(1);
        });
        if let Err(error) = result.solution.write_to(BufWriter::new(file)) {
            eprintln!("{}: {}", out, error);
            exit(1);
        }
        tracing::info!(path = %out, "solution written");
    }
}

fn parse_arg<T: std::str::FromStr>(arg: Option<String>, default: T, name: &str) -> T {
    match arg {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("{} must be a number, got '{}'", name, raw);
            exit(2);
        }),
    }
}
