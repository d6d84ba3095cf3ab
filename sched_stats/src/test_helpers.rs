//! Centralized test helpers for sched-stats
//!
//! This module provides fixture builders for experiment directories, used
//! by unit tests and by benchmarks built with the `test-helpers` feature.

use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use crate::defaults;

/// A temporary experiment directory laid out with the default file names.
///
/// The directory is removed when the value is dropped.
pub struct ExperimentDir {
    dir: TempDir,
}

impl ExperimentDir {
    /// Creates an experiment whose params file holds `params_json`.
    ///
    /// # Panics
    /// Panics if the temporary directory or the params file cannot be created.
    pub fn new(params_json: &str) -> Self {
        let exp = ExperimentDir::empty();
        exp.write(defaults::DEFAULT_PARAMS_FILE, params_json);
        exp
    }

    /// Creates an experiment without any artifact.
    pub fn empty() -> Self {
        ExperimentDir {
            dir: tempdir().unwrap(),
        }
    }

    /// Creates a RUN experiment with the given cpu count, utilization and cap.
    pub fn run(cpus: usize, utilization: &str, cap: &str) -> Self {
        ExperimentDir::with_scheduler("RUN", cpus, utilization, cap)
    }

    /// Creates a QPS experiment with the given cpu count, utilization and cap.
    pub fn qps(cpus: usize, utilization: &str, cap: &str) -> Self {
        ExperimentDir::with_scheduler("QPS", cpus, utilization, cap)
    }

    fn with_scheduler(scheduler: &str, cpus: usize, utilization: &str, cap: &str) -> Self {
        ExperimentDir::new(&format!(
            r#"{{"cpus": {cpus}, "scheduler": "{scheduler}", "{}": "{utilization}", "{}": "{cap}"}}"#,
            defaults::DEFAULT_UTILIZATION_KEY,
            defaults::DEFAULT_CAP_KEY,
        ))
    }

    /// Writes a task set with `tasks` lines.
    pub fn with_tasks(self, tasks: usize) -> Self {
        let content: String = (0..tasks).map(|i| format!("{i} 10 100\n")).collect();
        self.write(defaults::DEFAULT_SCHED_FILE, &content);
        self
    }

    /// Writes the serialized scheduling tree.
    pub fn with_nodes(self, json: &str) -> Self {
        self.write(defaults::DEFAULT_NODES_FILE, json);
        self
    }

    /// Writes the CPU-mapping trace.
    pub fn with_masters(self, trace: &str) -> Self {
        self.write(defaults::DEFAULT_MASTERS_FILE, trace);
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, content: &str) {
        fs::write(self.dir.path().join(name), content).unwrap();
    }
}
