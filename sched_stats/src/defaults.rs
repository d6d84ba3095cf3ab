//! Centralized default values for sched-stats configuration.
//!
//! These are used as fallback values when neither the system-wide nor the
//! local configuration file provides a setting.

// ============================================================================
// Experiment Artifact Defaults
// ============================================================================

/// Key-value parameters of an experiment (cpus, scheduler, ...).
///
/// The format is inferred from the extension, so a `params.toml` works as
/// well once configured.
pub const DEFAULT_PARAMS_FILE: &str = "params.json";

/// Task set of an experiment, one task per line.
pub const DEFAULT_SCHED_FILE: &str = "sched.csv";

/// CPU-mapping trace written by the QPS scheduler.
pub const DEFAULT_MASTERS_FILE: &str = "masters.csv";

/// Serialized scheduling tree written by the RUN scheduler.
pub const DEFAULT_NODES_FILE: &str = "nodes.json";

// ============================================================================
// Experiment Parameter Keys
// ============================================================================

/// Parameter holding the number of CPUs.
pub const CPUS_KEY: &str = "cpus";

/// Parameter holding the scheduler name.
pub const SCHEDULER_KEY: &str = "scheduler";

/// Parameter holding the generated task-set utilization.
pub const DEFAULT_UTILIZATION_KEY: &str = "autils";

/// Parameter holding the utilization cap runs are classified by.
pub const DEFAULT_CAP_KEY: &str = "mutils";

// ============================================================================
// Configuration Files
// ============================================================================

/// Per-project configuration file, searched upward from the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".schedstatsconfig";

/// Directory below `$XDG_CONFIG_HOME` (or `~/.config`) holding `config.toml`.
pub const SYSTEM_CONFIG_DIR: &str = "sched-stats";
