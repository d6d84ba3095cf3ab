use anyhow::{anyhow, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// CSV tables plus gnuplot scripts rendering them to PDF
    #[default]
    Gnuplot,
    /// Self-contained plotly HTML charts
    Html,
}

#[derive(Parser)]
#[command(version, name = "sched-stats")]
pub struct Cli {
    /// Increase verbosity level (can be specified multiple times.) The first level sets level
    /// "info", second sets level "debug", and third sets level "trace" for the logger.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Create a versionless command for manpage generation
    pub fn command_without_version() -> clap::Command {
        let mut cmd = Self::command();
        cmd = cmd.version(None::<&str>);
        cmd
    }
}

#[derive(Args)]
pub struct CliExperiments {
    /// Experiment directories, each holding the artifacts of one run
    #[arg(required(true))]
    pub data_dirs: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive cluster statistics for all runs, aggregate them per
    /// (scheduler, utilization cap) and write plot data.
    ///
    /// For every metric (clusters, levels-max, levels-avg) and every measure
    /// (max, min, avg, var) one artifact set named `<metric>_<measure>` is
    /// written to the output directory.
    Clusters {
        /// Directory for data output
        #[arg(short, long, default_value = "/tmp")]
        out_dir: PathBuf,

        /// Output format of the generated plots
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Gnuplot)]
        format: ReportFormat,

        #[command(flatten)]
        experiments: CliExperiments,
    },

    /// Reduce a single cluster-tree JSON file and print its unit-server clusters
    Tree {
        /// Serialized scheduling tree
        file: PathBuf,
    },

    /// Compute clusters from a single CPU-mapping (masters) trace
    Masters {
        /// Number of CPUs of the traced machine
        #[arg(short, long, value_parser=clap::value_parser!(u32).range(1..))]
        cpus: u32,

        /// Whitespace-delimited merge trace
        file: PathBuf,
    },

    /// Summarize the per-run cluster measurements of every experimental configuration
    Summarize {
        #[command(flatten)]
        experiments: CliExperiments,
    },

    /// Launch an executable, wait for it and report a non-zero exit
    Run {
        /// Redirect the standard output of the executable to this file
        #[arg(long, value_parser=parse_output_path)]
        stdout: Option<PathBuf>,

        /// Redirect the standard error of the executable to this file
        #[arg(long, value_parser=parse_output_path)]
        stderr: Option<PathBuf>,

        /// Executable followed by its arguments
        #[arg(required(true), trailing_var_arg(true), allow_hyphen_values(true))]
        command: Vec<String>,
    },
}

fn parse_output_path(s: &str) -> Result<PathBuf> {
    if s.trim().is_empty() {
        Err(anyhow!("invalid output path: '{}' is empty", s))
    } else {
        Ok(PathBuf::from(s))
    }
}
