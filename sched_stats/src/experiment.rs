//! Loading of experiment directories and derivation of per-run clusters.

use std::{
    fs::File as StdFile,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, File};
use log::{debug, info};

use crate::{
    config::ParseConfig,
    cpu_mapping::{cpu_clusters, read_masters},
    data::{Cluster, RunKey, Scheduler},
    defaults,
    point::{ExpPoint, Measurement},
    tree::{read_tree, unit_servers},
};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Invalid experiment '{}'", .0.display())]
    NotADirectory(PathBuf),

    #[error("Experiment '{}' has no parameter '{key}'", dir.display())]
    MissingParam { dir: PathBuf, key: String },

    #[error("Experiment '{}' has no clusters", .0.display())]
    NoClusters(PathBuf),
}

/// Parameters of one run, read from its params file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpParams {
    pub cpus: usize,
    pub scheduler: Scheduler,
    pub utilization: String,
    pub cap: String,
}

fn load_params(dir: &Path, conf: &ParseConfig) -> Result<Config> {
    let param_file = dir.join(&conf.files.params_file);
    let mut builder = Config::builder();
    if param_file.is_file() {
        builder = builder.add_source(File::from(param_file.as_path()));
    } else {
        debug!("no parameters in {}", dir.display());
    }
    builder
        .build()
        .with_context(|| format!("Failed to read parameters of {}", dir.display()))
}

fn required<T>(dir: &Path, key: &str, value: Result<T, config::ConfigError>) -> Result<T> {
    match value {
        Ok(v) => Ok(v),
        Err(config::ConfigError::NotFound(_)) => Err(ExperimentError::MissingParam {
            dir: dir.to_path_buf(),
            key: key.to_string(),
        }
        .into()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("Invalid parameter '{}' in {}", key, dir.display()))),
    }
}

impl ExpParams {
    pub fn load(dir: &Path, conf: &ParseConfig) -> Result<Self> {
        let params = load_params(dir, conf)?;
        let cpus = required(dir, defaults::CPUS_KEY, params.get_int(defaults::CPUS_KEY))?;
        let cpus = usize::try_from(cpus)
            .with_context(|| format!("Negative cpu count {} in {}", cpus, dir.display()))?;
        let scheduler: Scheduler = required(
            dir,
            defaults::SCHEDULER_KEY,
            params.get_string(defaults::SCHEDULER_KEY),
        )?
        .parse()
        .with_context(|| format!("Invalid scheduler in {}", dir.display()))?;
        let utilization = required(
            dir,
            &conf.params.utilization_key,
            params.get_string(&conf.params.utilization_key),
        )?;
        let cap = required(
            dir,
            &conf.params.cap_key,
            params.get_string(&conf.params.cap_key),
        )?;
        Ok(ExpParams {
            cpus,
            scheduler,
            utilization,
            cap,
        })
    }
}

/// Number of tasks of a task-set file (one per line).
pub fn count_tasks(path: &Path) -> Result<usize> {
    let f = StdFile::open(path)
        .with_context(|| format!("Failed to open task set {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(f).lines() {
        line.with_context(|| format!("Failed to read task set {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}

/// One experiment directory together with its parameters.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub path: PathBuf,
    pub params: ExpParams,
    pub tasks: usize,
    conf: ParseConfig,
}

impl Experiment {
    pub fn load(dir: &Path, conf: &ParseConfig) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ExperimentError::NotADirectory(dir.to_path_buf()).into());
        }
        let params = ExpParams::load(dir, conf)?;
        let tasks = count_tasks(&dir.join(&conf.files.sched_file))?;
        debug!(
            "{}: {} tasks on {} cpus with {}",
            dir.display(),
            tasks,
            params.cpus,
            params.scheduler
        );
        Ok(Experiment {
            path: dir.to_path_buf(),
            params,
            tasks,
            conf: conf.clone(),
        })
    }

    pub fn key(&self) -> RunKey {
        RunKey {
            scheduler: self.params.scheduler,
            utilization: self.params.utilization.clone(),
            cap: self.params.cap.clone(),
            tasks: self.tasks,
        }
    }

    /// Clusters the run's workload was partitioned into.
    pub fn clusters(&self) -> Result<Vec<Cluster>> {
        let cpus = self.params.cpus;
        let clusters = match self.params.scheduler {
            Scheduler::Qps => {
                let records = read_masters(&self.path.join(&self.conf.files.masters_file))?;
                cpu_clusters(&records, cpus)
                    .with_context(|| format!("Invalid CPU mapping in {}", self.path.display()))?
            }
            Scheduler::Run if self.tasks <= cpus => {
                // one task per cpu, nothing to partition
                vec![Cluster::new(1, 0); cpus]
            }
            Scheduler::Run => {
                let root = read_tree(&self.path.join(&self.conf.files.nodes_file))?;
                unit_servers(&root)
                    .with_context(|| format!("Invalid scheduling tree in {}", self.path.display()))?
            }
        };
        info!(
            "{}: {} clusters ({})",
            self.path.display(),
            clusters.len(),
            self.key()
        );
        Ok(clusters)
    }

    /// The run's clusters as measurements `servers` and `levels`.
    pub fn to_point(&self) -> Result<ExpPoint> {
        let clusters = self.clusters()?;
        if clusters.is_empty() {
            return Err(ExperimentError::NoClusters(self.path.clone()).into());
        }
        let mut point = ExpPoint::new(self.path.display().to_string());
        point.insert(
            "servers",
            Measurement::from_values("servers", clusters.iter().map(|c| c.servers as f64))?,
        );
        point.insert(
            "levels",
            Measurement::from_values("levels", clusters.iter().map(|c| c.level as f64))?,
        );
        Ok(point)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::point::StatType;
    use crate::test_helpers::ExperimentDir;

    #[test]
    fn test_load_params() {
        let exp = ExperimentDir::new(r#"{"cpus": 4, "scheduler": "QPS", "autils": 0.5, "mutils": "0.9"}"#);
        let params = ExpParams::load(exp.path(), &ParseConfig::default()).unwrap();
        assert_eq!(params.cpus, 4);
        assert_eq!(params.scheduler, Scheduler::Qps);
        assert_eq!(params.utilization, "0.5");
        assert_eq!(params.cap, "0.9");
    }

    #[test]
    fn test_missing_param_names_key() {
        let exp = ExperimentDir::new(r#"{"cpus": 4, "autils": 1, "mutils": 1}"#);
        let err = ExpParams::load(exp.path(), &ParseConfig::default()).unwrap_err();
        match err.downcast_ref::<ExperimentError>() {
            Some(ExperimentError::MissingParam { key, .. }) => assert_eq!(key, "scheduler"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_params_file_fails_on_first_lookup() {
        let exp = ExperimentDir::empty();
        let err = ExpParams::load(exp.path(), &ParseConfig::default()).unwrap_err();
        match err.downcast_ref::<ExperimentError>() {
            Some(ExperimentError::MissingParam { key, .. }) => assert_eq!(key, "cpus"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_scheduler_is_rejected() {
        let exp = ExperimentDir::new(r#"{"cpus": 4, "scheduler": "EDF", "autils": 1, "mutils": 1}"#);
        assert!(ExpParams::load(exp.path(), &ParseConfig::default()).is_err());
    }

    #[test]
    fn test_not_a_directory() {
        let err = Experiment::load(Path::new("/nonexistent/exp"), &ParseConfig::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid experiment"));
    }

    #[test]
    fn test_count_tasks() {
        let exp = ExperimentDir::run(2, "1", "0.5").with_tasks(3);
        assert_eq!(count_tasks(&exp.path().join("sched.csv")).unwrap(), 3);
    }

    #[test]
    fn test_run_with_few_tasks_uses_one_server_per_cpu() {
        let exp = ExperimentDir::run(4, "1", "0.5").with_tasks(3);
        let e = Experiment::load(exp.path(), &ParseConfig::default()).unwrap();
        assert_eq!(e.clusters().unwrap(), vec![Cluster::new(1, 0); 4]);
    }

    #[test]
    fn test_run_reduces_tree() {
        let exp = ExperimentDir::run(2, "1", "0.5").with_tasks(3).with_nodes(
            r#"{"id": 0, "cost": 0, "period": 1, "level": 1, "children": [
                {"id": 1, "cost": 1, "period": 4, "level": 0, "children": []},
                {"id": 2, "cost": 1, "period": 4, "level": 0, "children": []},
                {"id": 3, "cost": 0, "period": 1, "level": 0, "children": []}
            ]}"#,
        );
        let e = Experiment::load(exp.path(), &ParseConfig::default()).unwrap();
        assert_eq!(
            e.clusters().unwrap(),
            vec![Cluster::new(1, 0), Cluster::new(2, 1)]
        );
        assert_eq!(e.key().tasks, 3);
        assert_eq!(e.key().scheduler, Scheduler::Run);
    }

    #[test]
    fn test_qps_replays_masters() {
        let exp = ExperimentDir::qps(3, "1", "0.5")
            .with_tasks(5)
            .with_masters("1 0 0\n2 0 1\n");
        let e = Experiment::load(exp.path(), &ParseConfig::default()).unwrap();
        assert_eq!(e.clusters().unwrap(), vec![Cluster::new(3, 2)]);
    }

    #[test]
    fn test_to_point() {
        let exp = ExperimentDir::qps(4, "1", "0.5")
            .with_tasks(5)
            .with_masters("1 0 0\n");
        let e = Experiment::load(exp.path(), &ParseConfig::default()).unwrap();
        let point = e.to_point().unwrap();
        // clusters: (2, 1), (1, 0), (1, 0)
        let servers = point.get("servers").unwrap();
        assert_eq!(servers.get(StatType::Max), Some(2.0));
        let levels = point.get("levels").unwrap();
        assert_eq!(levels.get(StatType::Max), Some(1.0));
        assert!(!levels.contains(StatType::Min));
    }

    #[test]
    fn test_to_point_without_clusters_is_an_error() {
        let exp = ExperimentDir::run(1, "1", "0.5")
            .with_tasks(2)
            .with_nodes(r#"{"id": 0, "cost": 1, "period": 2, "level": 0, "children": []}"#);
        let e = Experiment::load(exp.path(), &ParseConfig::default()).unwrap();
        assert!(e.clusters().unwrap().is_empty());
        assert!(e.to_point().is_err());
    }
}
