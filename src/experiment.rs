use futures::StreamExt;
use std::io::Write;

use crate::simulation::{Config, Output, Policy, Simulation};

/// Operating point of a single trial.
#[derive(Debug, Clone, Copy)]
pub struct TrialSettings {
    pub server_count: usize,
    pub arrival_lambda: f64,
    pub job_size_lambda: f64,
    pub partial_servers: bool,
    pub full_realloc_period: usize,
    pub num_jobs: usize,
}

/// One value of a parameter sweep, with the settings it implies.
#[derive(Debug, Clone)]
pub struct SweepPoint {
    /// CSV `Parameter` column.
    pub parameter: &'static str,
    /// CSV `Value` column.
    pub value: String,
    pub settings: TrialSettings,
}

#[derive(Debug)]
pub struct ExperimentConfig {
    /// Sweep axis, 1 to 5.
    pub option: u32,
    /// Independent trials per parameter value.
    pub trials: usize,
    /// Name of the CSV output file where to save the metrics collected.
    pub csv_path: String,
    /// Base seed; trial `t` uses `seed + t`.
    pub seed: u64,
    /// Number of trials run in parallel.
    pub concurrency: usize,
    /// Schedulers compared against the same workloads.
    pub schedulers: Vec<Policy>,
}

/// The parameter values of one sweep axis:
/// 1. server count, 2. job size rate, 3. arrival rate,
/// 4. partial vs whole servers, 5. full reallocation period.
pub fn sweep(option: u32) -> anyhow::Result<Vec<SweepPoint>> {
    let mut points = vec![];
    match option {
        1 => {
            for server_count in (50..=200).step_by(25) {
                points.push(SweepPoint {
                    parameter: "Servers",
                    value: server_count.to_string(),
                    settings: TrialSettings {
                        server_count,
                        arrival_lambda: 1.0,
                        job_size_lambda: 9.0,
                        partial_servers: true,
                        full_realloc_period: 1,
                        num_jobs: 300,
                    },
                });
            }
        }
        2 => {
            for job_size_lambda in (0..).map(|i| 0.1 + 0.5 * i as f64).take_while(|l| *l <= 20.0) {
                points.push(SweepPoint {
                    parameter: "JobSizeLambda",
                    value: job_size_lambda.to_string(),
                    settings: TrialSettings {
                        server_count: 1000,
                        arrival_lambda: 20.0,
                        job_size_lambda,
                        partial_servers: false,
                        full_realloc_period: 1,
                        num_jobs: 300,
                    },
                });
            }
        }
        3 => {
            for arrival_lambda in (1..=5).map(|i| 0.5 * i as f64) {
                points.push(SweepPoint {
                    parameter: "JobSpacingLambda",
                    value: arrival_lambda.to_string(),
                    settings: TrialSettings {
                        server_count: 100,
                        arrival_lambda,
                        job_size_lambda: 1.0,
                        partial_servers: true,
                        full_realloc_period: 1,
                        num_jobs: 300,
                    },
                });
            }
        }
        4 => {
            for partial_servers in [true, false] {
                points.push(SweepPoint {
                    parameter: "PartialServers",
                    value: partial_servers.to_string(),
                    settings: TrialSettings {
                        server_count: 100,
                        arrival_lambda: 1.0,
                        job_size_lambda: 1.0,
                        partial_servers,
                        full_realloc_period: 1,
                        num_jobs: 300,
                    },
                });
            }
        }
        5 => {
            for full_realloc_period in [1, 5, 10, 15, 20] {
                points.push(SweepPoint {
                    parameter: "ReallocationFrequency",
                    value: full_realloc_period.to_string(),
                    settings: TrialSettings {
                        server_count: 100,
                        arrival_lambda: 1.0,
                        job_size_lambda: 1.0,
                        partial_servers: true,
                        full_realloc_period,
                        num_jobs: 1000,
                    },
                });
            }
        }
        _ => anyhow::bail!("unknown experiment option: {}", option),
    }
    Ok(points)
}

/// Run every scheduler once against the same workload.
pub fn run_trial(
    settings: &TrialSettings,
    schedulers: &[Policy],
    seed: u64,
) -> anyhow::Result<Vec<(Policy, Output)>> {
    let workload =
        crate::job::JobFactory::new(seed, settings.arrival_lambda, settings.job_size_lambda)?
            .schedule(settings.num_jobs);

    let mut outputs = vec![];
    for policy in schedulers {
        let mut sim = Simulation::new(
            Config {
                policy: policy.clone(),
                server_count: settings.server_count,
                partial_servers: settings.partial_servers,
                full_realloc_period: settings.full_realloc_period,
                job_size_lambda: settings.job_size_lambda,
            },
            workload.clone(),
        )?;
        outputs.push((policy.clone(), sim.run()));
    }
    Ok(outputs)
}

/// Run the selected sweep and write one CSV row per (scheduler, value),
/// averaging over the trials. Trials run on blocking workers, up to
/// `concurrency` at a time; outputs are collected in trial order so the
/// result does not depend on completion order.
pub async fn run(config: &ExperimentConfig) -> anyhow::Result<()> {
    anyhow::ensure!(config.trials >= 1, "trials must be >= 1");
    anyhow::ensure!(!config.schedulers.is_empty(), "no scheduler selected");
    let points = sweep(config.option)?;

    let mut csv = std::fs::File::create(&config.csv_path)?;
    writeln!(csv, "Scheduler,Parameter,Value,AverageProcessingTime,AvgRealTime")?;

    for point in points {
        log::info!("sweeping {} = {}", point.parameter, point.value);
        let trial_outputs: Vec<anyhow::Result<Vec<(Policy, Output)>>> =
            futures::stream::iter(0..config.trials)
                .map(|trial| {
                    let schedulers = config.schedulers.clone();
                    let settings = point.settings;
                    let seed = config.seed + trial as u64;
                    async move {
                        tokio::task::spawn_blocking(move || {
                            run_trial(&settings, &schedulers, seed)
                        })
                        .await
                        .map_err(anyhow::Error::from)?
                    }
                })
                .buffered(config.concurrency.max(1))
                .collect()
                .await;

        let mut sojourn_stats: Vec<_> = (0..config.schedulers.len())
            .map(|_| incr_stats::incr::Stats::new())
            .collect();
        let mut real_time_stats: Vec<_> = (0..config.schedulers.len())
            .map(|_| incr_stats::incr::Stats::new())
            .collect();
        for trial_output in trial_outputs {
            for (ndx, (_, output)) in trial_output?.iter().enumerate() {
                sojourn_stats[ndx].update(output.avg_sojourn)?;
                real_time_stats[ndx].update(output.sched_time)?;
            }
        }

        for (ndx, policy) in config.schedulers.iter().enumerate() {
            writeln!(
                csv,
                "{},{},{},{:.7},{:.7}",
                policy,
                point.parameter,
                point.value,
                sojourn_stats[ndx].mean().unwrap_or(0.0),
                real_time_stats[ndx].mean().unwrap_or(0.0)
            )?;
        }
    }

    Ok(())
}
