use crate::speedup::{speedup_factor, EPSILON};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Equipartitioning over a flat job set.
    Equi,
    /// Hierarchical greedy allocation over a `p`-interval tree of the
    /// given depth.
    RcGreedy(usize),
}

impl Policy {
    pub fn from(policy: &str) -> anyhow::Result<Self> {
        match policy {
            "EQUI" => Ok(Policy::Equi),
            _ => match policy.strip_prefix('R').and_then(|d| d.parse::<usize>().ok()) {
                Some(depth) if (1..=9).contains(&depth) => Ok(Policy::RcGreedy(depth)),
                _ => Err(anyhow::anyhow!("unknown scheduler: {}", policy)),
            },
        }
    }

    pub fn all() -> Vec<Policy> {
        let mut policies = vec![Policy::Equi];
        policies.extend((1..=9).map(Policy::RcGreedy));
        policies
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Equi => write!(f, "EQUI"),
            Policy::RcGreedy(depth) => write!(f, "R{}", depth),
        }
    }
}

enum Event {
    /// A new job enters the system.
    /// 0: Event time.
    Arrival(f64, crate::job::Job),
    /// A job is expected to finish.
    /// 0: Event time.
    /// 1: Job ID.
    Completion(f64, u64),
}

impl Event {
    fn time(&self) -> f64 {
        match self {
            Self::Arrival(t, _) | Self::Completion(t, _) => *t,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time() == other.time()
    }
}

impl Eq for Event {}

#[allow(clippy::non_canonical_partial_ord_impl)]
impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        other.time().partial_cmp(&self.time())
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other).unwrap()
    }
}

#[derive(Debug)]
pub struct Config {
    /// The allocation policy driving the run.
    pub policy: Policy,
    /// Number of servers shared by all jobs.
    pub server_count: usize,
    /// Jobs may hold fractions of a server when true.
    pub partial_servers: bool,
    /// Scheduler operations between two forced full reallocations.
    pub full_realloc_period: usize,
    /// Rate of the job size distribution, 1/E(X) of the workload.
    pub job_size_lambda: f64,
}

#[derive(Debug)]
pub struct Output {
    /// Number of jobs that ran to completion.
    pub completed: usize,
    /// Mean sojourn time over completed jobs, in s.
    pub avg_sojourn: f64,
    /// Wall-clock time spent inside scheduler calls, in s.
    pub sched_time: f64,
}

/// Mutable progress state of a live job, owned by the simulator.
struct JobState {
    remaining_size: f64,
    current_speedup: f64,
    last_update_time: f64,
    expected_completion: f64,
}

enum Scheduler {
    Equi(crate::equi::Equi),
    RcGreedy(crate::rcgreedy::RcGreedy),
}

/// Discrete-event simulation of one scheduler over one workload: a virtual
/// clock advances from event to event, the scheduler reshuffles allocations
/// on every arrival and departure, and each affected job's completion event
/// is rewritten from its new speedup. Superseded completion events stay in
/// the queue and are discarded when their timestamp no longer matches the
/// job's expected completion.
pub struct Simulation {
    scheduler: Scheduler,
    workload: Vec<crate::job::Job>,
    active_jobs: std::collections::HashMap<u64, crate::job::Job>,
    job_states: std::collections::HashMap<u64, JobState>,
    realloc_counter: usize,
    sojourn_times: Vec<f64>,
    sched_time: std::time::Duration,
    config: Config,
}

impl Simulation {
    pub fn new(config: Config, workload: Vec<crate::job::Job>) -> anyhow::Result<Self> {
        anyhow::ensure!(config.server_count > 1, "server count must be > 1");
        anyhow::ensure!(
            config.full_realloc_period >= 1,
            "vanishing full reallocation period"
        );
        anyhow::ensure!(config.job_size_lambda > 0.0, "vanishing job size rate");

        let scheduler = match config.policy {
            Policy::Equi => Scheduler::Equi(crate::equi::Equi::new(
                config.server_count,
                config.partial_servers,
            )),
            Policy::RcGreedy(depth) => Scheduler::RcGreedy(crate::rcgreedy::RcGreedy::new(
                config.server_count,
                depth,
                1.0 / config.job_size_lambda,
                config.partial_servers,
            )?),
        };

        Ok(Self {
            scheduler,
            workload,
            active_jobs: std::collections::HashMap::new(),
            job_states: std::collections::HashMap::new(),
            realloc_counter: config.full_realloc_period,
            sojourn_times: vec![],
            sched_time: std::time::Duration::ZERO,
            config,
        })
    }

    /// Run the simulation to completion and report the recorded sojourns.
    pub fn run(&mut self) -> Output {
        let mut events = std::collections::BinaryHeap::new();
        for job in std::mem::take(&mut self.workload) {
            events.push(Event::Arrival(job.arrival_time, job));
        }

        while let Some(event) = events.pop() {
            let now = event.time();
            match event {
                Event::Arrival(_, job) => self.handle_arrival(now, job, &mut events),
                Event::Completion(_, job_id) => self.handle_completion(now, job_id, &mut events),
            }
        }

        let avg_sojourn = if self.sojourn_times.is_empty() {
            0.0
        } else {
            self.sojourn_times.iter().sum::<f64>() / self.sojourn_times.len() as f64
        };

        Output {
            completed: self.sojourn_times.len(),
            avg_sojourn,
            sched_time: self.sched_time.as_secs_f64(),
        }
    }

    fn handle_arrival(
        &mut self,
        now: f64,
        job: crate::job::Job,
        events: &mut std::collections::BinaryHeap<Event>,
    ) {
        log::debug!("A {} job ID {} {}", now, job.id, job);
        let job_id = job.id;
        let p = job.p;
        self.job_states.insert(
            job_id,
            JobState {
                remaining_size: job.size,
                current_speedup: 1.0,
                last_update_time: now,
                expected_completion: 0.0,
            },
        );
        let _insert_ret = self.active_jobs.insert(job_id, job);
        assert!(_insert_ret.is_none());

        let real_now = std::time::Instant::now();
        match &mut self.scheduler {
            Scheduler::Equi(equi) => equi.insert_job(job_id),
            Scheduler::RcGreedy(rcg) => {
                if self.realloc_counter == 0 {
                    rcg.full_realloc();
                    self.realloc_counter = self.config.full_realloc_period;
                }
                rcg.add_job(job_id, p, true);
                self.realloc_counter -= 1;
            }
        }
        self.process_allocation_changes(now, events);
        self.sched_time += real_now.elapsed();
    }

    fn handle_completion(
        &mut self,
        now: f64,
        job_id: u64,
        events: &mut std::collections::BinaryHeap<Event>,
    ) {
        let expected = match self.job_states.get(&job_id) {
            Some(state) => state.expected_completion,
            None => return, // already completed
        };
        if (now - expected).abs() > EPSILON {
            return; // superseded by a reallocation
        }

        let arrival_time = match self.active_jobs.get(&job_id) {
            Some(job) => job.arrival_time,
            None => return,
        };
        log::debug!("C {} job ID {}", now, job_id);
        self.sojourn_times.push(now - arrival_time);

        let real_now = std::time::Instant::now();
        match &mut self.scheduler {
            Scheduler::Equi(equi) => equi.delete_job(job_id),
            Scheduler::RcGreedy(rcg) => {
                if self.realloc_counter == 0 {
                    rcg.full_realloc();
                    self.realloc_counter = self.config.full_realloc_period;
                }
                rcg.delete_job(job_id, true);
                self.realloc_counter -= 1;
            }
        }
        self.process_allocation_changes(now, events);
        self.sched_time += real_now.elapsed();

        let _state_ret = self.job_states.remove(&job_id);
        assert!(_state_ret.is_some());
        let _job_ret = self.active_jobs.remove(&job_id);
        assert!(_job_ret.is_some());
    }

    /// Rewrite the completion event of every job whose allocation the last
    /// scheduler operation touched: all jobs under EQUI, the reported delta
    /// under RCGREEDY.
    fn process_allocation_changes(
        &mut self,
        now: f64,
        events: &mut std::collections::BinaryHeap<Event>,
    ) {
        let changed = match &mut self.scheduler {
            Scheduler::Equi(equi) => equi.all_allocations(),
            Scheduler::RcGreedy(rcg) => rcg.server_changes(),
        };
        for (job_id, servers) in changed {
            if self.job_states.contains_key(&job_id) {
                self.update_job_processing(job_id, now, servers, events);
            }
        }
    }

    fn update_job_processing(
        &mut self,
        job_id: u64,
        now: f64,
        servers: f64,
        events: &mut std::collections::BinaryHeap<Event>,
    ) {
        let p = match self.active_jobs.get(&job_id) {
            Some(job) => job.p,
            None => return,
        };
        let state = match self.job_states.get_mut(&job_id) {
            Some(state) => state,
            None => return,
        };

        // bank the work done at the old speedup, then reschedule at the new one
        let elapsed = now - state.last_update_time;
        state.remaining_size -= state.current_speedup * elapsed;
        state.last_update_time = now;

        let new_speedup = speedup_factor(p, servers);
        state.current_speedup = new_speedup;
        state.expected_completion = now + state.remaining_size / new_speedup;
        log::debug!(
            "U {} job ID {} servers {} speedup {} completion {}",
            now,
            job_id,
            servers,
            new_speedup,
            state.expected_completion
        );
        events.push(Event::Completion(state.expected_completion, job_id));
    }
}
