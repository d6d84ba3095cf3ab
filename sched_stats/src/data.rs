use std::{cmp::Ordering, fmt::Display, str::FromStr};

use anyhow::anyhow;

/// A group of real servers resolved at one level of the scheduling hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    pub servers: u64,
    pub level: u32,
}

impl Cluster {
    pub fn new(servers: u64, level: u32) -> Self {
        Cluster { servers, level }
    }
}

impl Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.servers, self.level)
    }
}

/// Scheduling policies whose runs can be post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scheduler {
    Qps,
    Run,
}

impl Scheduler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduler::Qps => "QPS",
            Scheduler::Run => "RUN",
        }
    }
}

impl Display for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheduler {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QPS" => Ok(Scheduler::Qps),
            "RUN" => Ok(Scheduler::Run),
            _ => Err(anyhow!(
                "Unsupported scheduler: {}. Valid values are 'QPS' or 'RUN'",
                s
            )),
        }
    }
}

/// Experimental configuration a run belongs to. Repeated runs of the same
/// configuration share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunKey {
    pub scheduler: Scheduler,
    pub utilization: String,
    pub cap: String,
    pub tasks: usize,
}

impl Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} util={} cap={} tasks={}",
            self.scheduler, self.utilization, self.cap, self.tasks
        )
    }
}

/// Orders parameter values: numbers first and numerically, then everything
/// else lexicographically.
pub fn compare_param_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
