use clap::Parser;

use amdahl_sched_sim::experiment::ExperimentConfig;
use amdahl_sched_sim::simulation::Policy;

#[derive(Debug, clap::Parser)]
#[command(long_about = None)]
struct Args {
    /// Experiment axis to sweep: 1 = server count, 2 = job size rate,
    /// 3 = arrival rate, 4 = partial vs whole servers, 5 = reallocation period
    #[arg(long)]
    option: u32,
    /// Number of independent trials per parameter value
    #[arg(long, default_value_t = 1)]
    trials: usize,
    /// Name of the CSV output file where to save the metrics collected.
    #[arg(long, default_value_t = String::from("out.csv"))]
    csv: String,
    /// Generate graphs from the collected metrics
    #[arg(long, default_value_t = false)]
    graphs: bool,
    /// Seed to initialize the pseudo-random number generators
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Schedulers to run: "all" or a comma-separated subset of EQUI,R1..R9
    #[arg(long, default_value_t = String::from("all"))]
    schedulers: String,
    /// Number of trials run in parallel
    #[arg(long, default_value_t = std::thread::available_parallelism().unwrap().get())]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    anyhow::ensure!(
        (1..=5).contains(&args.option),
        "option must be between 1 and 5"
    );
    anyhow::ensure!(args.trials >= 1, "trials must be >= 1");

    let schedulers = if args.schedulers == "all" {
        Policy::all()
    } else {
        args.schedulers
            .split(',')
            .map(|name| Policy::from(name.trim()))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    if args.graphs {
        log::warn!("graph generation is delegated to external tooling, writing CSV only");
    }

    amdahl_sched_sim::experiment::run(&ExperimentConfig {
        option: args.option,
        trials: args.trials,
        csv_path: args.csv,
        seed: args.seed,
        concurrency: args.concurrency,
        schedulers,
    })
    .await
}
