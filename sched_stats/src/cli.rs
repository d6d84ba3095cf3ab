use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use itertools::Itertools;
use log::{info, Level};

use crate::aggregation::{collapse, fold_experiments, summarize_runs};
use crate::config::ParseConfig;
use crate::cpu_mapping::{cpu_clusters, read_masters};
use crate::data::Cluster;
use crate::executable::Executable;
use crate::experiment::Experiment;
use crate::point::TypeMap;
use crate::reporting::report;
use crate::stats;
use crate::tree::{read_tree, unit_servers};
use sched_stats_cli_types::{Cli, Commands};

pub fn handle_calls() -> Result<()> {
    let cli = Cli::parse();
    let logger_level = match cli.verbose {
        0 => Level::Warn,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(logger_level.as_str())).init();

    match cli.command {
        Commands::Clusters {
            out_dir,
            format,
            experiments,
        } => {
            let conf = ParseConfig::load()?;
            let experiments = load_experiments(&experiments.data_dirs, &conf)?;
            let rows = fold_experiments(&experiments)?;
            let collapsed = collapse(&rows)?;
            report(&collapsed, &out_dir, format)?;
            Ok(())
        }
        Commands::Tree { file } => {
            let root = read_tree(&file)?;
            let clusters = unit_servers(&root)
                .with_context(|| format!("Failed to reduce {}", file.display()))?;
            print_clusters(&clusters);
            Ok(())
        }
        Commands::Masters { cpus, file } => {
            let records = read_masters(&file)?;
            let clusters = cpu_clusters(&records, cpus as usize)
                .with_context(|| format!("Failed to replay {}", file.display()))?;
            print_clusters(&clusters);
            Ok(())
        }
        Commands::Summarize { experiments } => {
            let conf = ParseConfig::load()?;
            let experiments = load_experiments(&experiments.data_dirs, &conf)?;
            for (key, summary) in summarize_runs(&experiments, &TypeMap::default())? {
                println!("{key}");
                println!("{summary}");
            }
            Ok(())
        }
        Commands::Run {
            stdout,
            stderr,
            command,
        } => run(stdout, stderr, &command),
    }
}

fn load_experiments(dirs: &[PathBuf], conf: &ParseConfig) -> Result<Vec<Experiment>> {
    let experiments = dirs
        .iter()
        .map(|d| Experiment::load(d, conf))
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} experiments", experiments.len());
    Ok(experiments)
}

fn print_clusters(clusters: &[Cluster]) {
    println!("{}", clusters.iter().join(" "));
    if let Some(servers) = stats::aggregate(clusters.iter().map(|c| c.servers as f64)) {
        info!("servers per cluster: {}", servers);
    }
    if let Some(levels) = stats::aggregate(clusters.iter().map(|c| c.level as f64)) {
        info!("levels: {}", levels);
    }
}

fn run(stdout: Option<PathBuf>, stderr: Option<PathBuf>, command: &[String]) -> Result<()> {
    let (exec_file, args) = command
        .split_first()
        .context("No executable given")?;
    let mut exe = Executable::new(exec_file, args)?;
    if let Some(path) = stdout {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        exe = exe.stdout_file(file);
    }
    if let Some(path) = stderr {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        exe = exe.stderr_file(file);
    }

    exe.execute()?;
    let success = exe.wait()?;
    exe.close()?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
