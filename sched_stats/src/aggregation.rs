//! Reduction of per-run clusters into per-configuration metrics, and of those
//! into per-(scheduler, cap) statistics.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};

use crate::{
    data::{compare_param_values, Cluster, RunKey, Scheduler},
    experiment::Experiment,
    point::{ExpPoint, Measurement, PointError, SummaryPoint, TypeMap},
    stats,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AggregationError {
    #[error("Run of configuration '{0}' has no clusters")]
    EmptyClusters(String),

    #[error(transparent)]
    Point(#[from] PointError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Clusters,
    LevelsMax,
    LevelsAvg,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Clusters, Metric::LevelsMax, Metric::LevelsAvg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Clusters => "clusters",
            Metric::LevelsMax => "levels-max",
            Metric::LevelsAvg => "levels-avg",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster metrics of one configuration, folded over its repeated runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunMetrics {
    pub clusters: f64,
    pub levels_max: f64,
    pub levels_avg: f64,
}

impl RunMetrics {
    pub fn from_clusters(key: &RunKey, clusters: &[Cluster]) -> Result<Self, AggregationError> {
        let levels_max = clusters
            .iter()
            .map(|c| c.level)
            .max()
            .ok_or_else(|| AggregationError::EmptyClusters(key.to_string()))?;
        let levels_avg = stats::mean(clusters.iter().map(|c| c.level as f64))
            .ok_or_else(|| AggregationError::EmptyClusters(key.to_string()))?;
        Ok(RunMetrics {
            clusters: clusters.len() as f64,
            levels_max: levels_max as f64,
            levels_avg,
        })
    }

    /// Folds another run into the metrics.
    ///
    /// This is a running fold, not a mean over all runs: the cluster count
    /// becomes the mean of the previous value and the new count, and the
    /// average level is the mean of the previous value and every new level.
    pub fn merge(&mut self, key: &RunKey, clusters: &[Cluster]) -> Result<(), AggregationError> {
        let run = RunMetrics::from_clusters(key, clusters)?;
        self.clusters = (self.clusters + run.clusters) / 2.0;
        self.levels_max = self.levels_max.max(run.levels_max);
        self.levels_avg = stats::mean(
            std::iter::once(self.levels_avg).chain(clusters.iter().map(|c| c.level as f64)),
        )
        .ok_or_else(|| AggregationError::EmptyClusters(key.to_string()))?;
        Ok(())
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Clusters => self.clusters,
            Metric::LevelsMax => self.levels_max,
            Metric::LevelsAvg => self.levels_avg,
        }
    }
}

/// Folds runs, in the given order, into metrics per configuration key.
pub fn fold_runs(
    runs: impl IntoIterator<Item = (RunKey, Vec<Cluster>)>,
) -> Result<BTreeMap<RunKey, RunMetrics>, AggregationError> {
    let mut rows: BTreeMap<RunKey, RunMetrics> = BTreeMap::new();
    for (key, clusters) in runs {
        match rows.get_mut(&key) {
            Some(metrics) => metrics.merge(&key, &clusters)?,
            None => {
                let metrics = RunMetrics::from_clusters(&key, &clusters)?;
                rows.insert(key, metrics);
            }
        }
    }
    Ok(rows)
}

/// Derives the clusters of every experiment and folds them per configuration.
pub fn fold_experiments(experiments: &[Experiment]) -> Result<BTreeMap<RunKey, RunMetrics>> {
    let runs = experiments
        .iter()
        .map(|e| e.clusters().map(|c| (e.key(), c)))
        .collect::<Result<Vec<_>>>()?;
    let rows = fold_runs(runs).context("Failed to fold runs")?;
    info!(
        "{} runs folded into {} configurations",
        experiments.len(),
        rows.len()
    );
    Ok(rows)
}

/// Per-(scheduler, cap) statistics of every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Collapsed {
    /// Caps in ascending order.
    pub classes: Vec<String>,
    pub schedulers: Vec<Scheduler>,
    groups: HashMap<(Scheduler, String), BTreeMap<Metric, Measurement>>,
}

impl Collapsed {
    /// Max, min, avg and var of `metric` over all configurations of the
    /// pair. `None` if no run of the pair was seen.
    #[must_use]
    pub fn get(&self, scheduler: Scheduler, class: &str, metric: Metric) -> Option<&Measurement> {
        self.groups
            .get(&(scheduler, class.to_string()))
            .and_then(|g| g.get(&metric))
    }
}

/// Groups the configurations by (scheduler, cap) and describes every
/// metric's values within each group.
pub fn collapse(rows: &BTreeMap<RunKey, RunMetrics>) -> Result<Collapsed, AggregationError> {
    let mut grouped: HashMap<(Scheduler, String), BTreeMap<Metric, Vec<f64>>> = HashMap::new();
    for (key, metrics) in rows {
        let group = grouped
            .entry((key.scheduler, key.cap.clone()))
            .or_default();
        for metric in Metric::ALL {
            group.entry(metric).or_default().push(metrics.get(metric));
        }
    }

    let classes = grouped
        .keys()
        .map(|(_, c)| c.clone())
        .unique()
        .sorted_by(|a, b| compare_param_values(a, b))
        .collect_vec();
    let schedulers = grouped.keys().map(|(s, _)| *s).unique().sorted().collect_vec();

    let mut groups = HashMap::new();
    for ((scheduler, class), values) in grouped {
        let mut described = BTreeMap::new();
        for (metric, vals) in values {
            let id = format!("{scheduler}/{class}/{metric}");
            described.insert(metric, Measurement::describe(id, vals.into_iter())?);
        }
        debug!("{}/{}: {} metrics", scheduler, class, described.len());
        groups.insert((scheduler, class), described);
    }

    Ok(Collapsed {
        classes,
        schedulers,
        groups,
    })
}

/// A [`SummaryPoint`] over the runs of every configuration.
pub fn summarize_runs(
    experiments: &[Experiment],
    typemap: &TypeMap,
) -> Result<BTreeMap<RunKey, SummaryPoint>> {
    let mut points: BTreeMap<RunKey, Vec<ExpPoint>> = BTreeMap::new();
    for e in experiments {
        points.entry(e.key()).or_default().push(e.to_point()?);
    }
    points
        .into_iter()
        .map(|(key, runs)| -> Result<(RunKey, SummaryPoint)> {
            let summary = SummaryPoint::new(&key, &runs, typemap)
                .with_context(|| format!("Failed to summarize {}", key))?;
            Ok((key, summary))
        })
        .collect()
}
