use rand::{distributions::Distribution, SeedableRng};

/// Immutable descriptor of a simulated job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    /// Time at which the job enters the system, in s.
    pub arrival_time: f64,
    /// Total amount of work, in service units.
    pub size: f64,
    /// Fraction of the work that is parallelizable, in [0, 1].
    pub p: f64,
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(arrival = {}, size = {}, p = {})",
            self.arrival_time, self.size, self.p
        )
    }
}

/// Synthetic workload generator: inter-arrival times and job sizes are
/// exponential, the speedup parameter is uniform on [0, 1]. Each random
/// variable draws from its own seeded stream so a run is reproducible.
pub struct JobFactory {
    interarrival_rng: rand::rngs::StdRng,
    size_rng: rand::rngs::StdRng,
    speedup_rng: rand::rngs::StdRng,
    interarrival_rv: rand_distr::Exp<f64>,
    size_rv: rand_distr::Exp<f64>,
    speedup_rv: rand::distributions::Uniform<f64>,
    elapsed_time: f64,
    next_id: u64,
}

impl JobFactory {
    pub fn new(seed: u64, arrival_lambda: f64, job_size_lambda: f64) -> anyhow::Result<Self> {
        anyhow::ensure!(arrival_lambda > 0.0, "vanishing arrival rate");
        anyhow::ensure!(job_size_lambda > 0.0, "vanishing job size rate");
        Ok(Self {
            interarrival_rng: rand::rngs::StdRng::seed_from_u64(seed),
            size_rng: rand::rngs::StdRng::seed_from_u64(seed + 1000000),
            speedup_rng: rand::rngs::StdRng::seed_from_u64(seed + 1100000),
            interarrival_rv: rand_distr::Exp::new(arrival_lambda)?,
            size_rv: rand_distr::Exp::new(job_size_lambda)?,
            speedup_rv: rand::distributions::Uniform::new(0.0, 1.0),
            elapsed_time: 0.0,
            next_id: 0,
        })
    }

    /// Create the next job of the arrival process.
    pub fn make(&mut self) -> Job {
        self.elapsed_time += self.interarrival_rv.sample(&mut self.interarrival_rng);
        let job = Job {
            id: self.next_id,
            arrival_time: self.elapsed_time,
            size: self.size_rv.sample(&mut self.size_rng),
            p: self.speedup_rv.sample(&mut self.speedup_rng),
        };
        self.next_id += 1;
        job
    }

    /// Create the full arrival schedule of a run, ordered by arrival time.
    pub fn schedule(&mut self, num_jobs: usize) -> Vec<Job> {
        (0..num_jobs).map(|_| self.make()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_factory_schedule() -> anyhow::Result<()> {
        let mut factory = JobFactory::new(42, 1.0, 1.0)?;
        let jobs = factory.schedule(100);
        assert_eq!(jobs.len(), 100);
        let mut last_arrival = 0.0;
        for (ndx, job) in jobs.iter().enumerate() {
            assert_eq!(job.id, ndx as u64);
            assert!(job.arrival_time >= last_arrival);
            assert!(job.size > 0.0);
            assert!((0.0..1.0).contains(&job.p));
            last_arrival = job.arrival_time;
        }
        Ok(())
    }

    #[test]
    fn test_job_factory_deterministic() -> anyhow::Result<()> {
        let jobs1 = JobFactory::new(7, 2.0, 0.5)?.schedule(50);
        let jobs2 = JobFactory::new(7, 2.0, 0.5)?.schedule(50);
        for (a, b) in jobs1.iter().zip(jobs2.iter()) {
            assert_eq!(a.arrival_time, b.arrival_time);
            assert_eq!(a.size, b.size);
            assert_eq!(a.p, b.p);
        }
        Ok(())
    }

    #[test]
    fn test_job_factory_seed_changes_workload() -> anyhow::Result<()> {
        let jobs1 = JobFactory::new(1, 1.0, 1.0)?.schedule(10);
        let jobs2 = JobFactory::new(2, 1.0, 1.0)?.schedule(10);
        assert!(jobs1
            .iter()
            .zip(jobs2.iter())
            .any(|(a, b)| a.arrival_time != b.arrival_time));
        Ok(())
    }

    #[test]
    fn test_job_factory_rejects_bad_rates() {
        assert!(JobFactory::new(0, 0.0, 1.0).is_err());
        assert!(JobFactory::new(0, 1.0, -1.0).is_err());
    }

    #[test]
    fn test_job_factory_mean_size() -> anyhow::Result<()> {
        let jobs = JobFactory::new(99, 1.0, 2.0)?.schedule(20000);
        let mean = jobs.iter().map(|j| j.size).sum::<f64>() / jobs.len() as f64;
        // sizes are Exp(2), mean 0.5
        assert!((mean - 0.5).abs() < 0.02, "mean = {}", mean);
        Ok(())
    }
}
