//! Clusters derived from a CPU-mapping ("masters") trace.
//!
//! Each trace row records that the master of one CPU became another CPU.
//! Replaying the rows in order merges CPUs into trees; every final tree is one
//! cluster whose size is its CPU count and whose level is its depth.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, trace};

use crate::data::Cluster;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MappingError {
    #[error("CPU {cpu} referenced by record {record} is outside of 0..{cpus}")]
    CpuOutOfRange { cpu: usize, record: usize, cpus: usize },

    #[error("Line {line} has {fields} fields, expected at least 3")]
    TooFewFields { line: usize, fields: usize },

    #[error("Line {line}: cannot parse CPU '{value}'")]
    InvalidCpu { line: usize, value: String },
}

/// One merge: every CPU rooted where `from_cpu` is rooted moves under `to_cpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterRecord {
    pub to_cpu: usize,
    pub from_cpu: usize,
}

impl MasterRecord {
    pub fn new(to_cpu: usize, from_cpu: usize) -> Self {
        MasterRecord { to_cpu, from_cpu }
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuSlot {
    root: usize,
    level: u32,
}

fn parse_cpu(line: usize, value: &str) -> Result<usize, MappingError> {
    value.parse::<usize>().map_err(|_| MappingError::InvalidCpu {
        line,
        value: value.to_string(),
    })
}

/// Parses a whitespace-delimited trace. Only fields 0 (`to_cpu`) and 2
/// (`from_cpu`) are read; row order is preserved.
pub fn parse_masters(input: &str) -> Result<Vec<MasterRecord>, MappingError> {
    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line_num = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 3 {
            return Err(MappingError::TooFewFields {
                line: line_num,
                fields: fields.len(),
            });
        }
        records.push(MasterRecord {
            to_cpu: parse_cpu(line_num, fields[0])?,
            from_cpu: parse_cpu(line_num, fields[2])?,
        });
    }
    Ok(records)
}

pub fn read_masters(path: &Path) -> Result<Vec<MasterRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read masters trace {}", path.display()))?;
    parse_masters(&content).with_context(|| format!("Invalid masters trace {}", path.display()))
}

/// Replays `records` over `cpus` CPUs and groups them by final root.
///
/// Roots are looked up when each record is applied, so a later record moves
/// everything an earlier one attached. Clusters are ordered by root CPU.
pub fn cpu_clusters(records: &[MasterRecord], cpus: usize) -> Result<Vec<Cluster>, MappingError> {
    let mut mapping: Vec<CpuSlot> = (0..cpus).map(|k| CpuSlot { root: k, level: 0 }).collect();

    for (idx, record) in records.iter().enumerate() {
        for cpu in [record.to_cpu, record.from_cpu] {
            if cpu >= cpus {
                return Err(MappingError::CpuOutOfRange {
                    cpu,
                    record: idx,
                    cpus,
                });
            }
        }

        let from_root = mapping[record.from_cpu].root;
        let to_root = mapping[record.to_cpu].root;
        trace!(
            "record {}: moving root {} under root {}",
            idx,
            from_root,
            to_root
        );
        for slot in mapping.iter_mut().filter(|s| s.root == from_root) {
            slot.root = to_root;
            slot.level += 1;
        }
    }

    let mut groups: BTreeMap<usize, (u64, u32)> = BTreeMap::new();
    for slot in &mapping {
        let entry = groups.entry(slot.root).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry.1.max(slot.level);
    }

    debug!(
        "{} merge records over {} cpus produced {} clusters",
        records.len(),
        cpus,
        groups.len()
    );

    Ok(groups
        .into_values()
        .map(|(size, level)| Cluster::new(size, level))
        .collect())
}
