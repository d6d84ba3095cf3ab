//! Containers for named scalar statistics and their summaries across runs.
//!
//! A [`Measurement`] maps the closed set of [`StatType`]s to values. A
//! [`Summary`] reduces many same-shaped measurements with the operators a
//! [`TypeMap`] enables, and a [`SummaryPoint`] does so for every named
//! measurement of a set of [`ExpPoint`]s.

use std::{
    collections::{btree_map, BTreeMap},
    fmt::Display,
};

use itertools::Itertools;

use crate::stats::{self, aggregate};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointError {
    #[error("measurement '{id}' missing type '{stat}'")]
    MissingStat { id: String, stat: StatType },

    #[error("cannot build measurement '{id}' from an empty sample")]
    EmptySample { id: String },

    #[error("cannot build '{id}' from no measurements")]
    EmptySummary { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatType {
    Min,
    Max,
    Avg,
    Var,
}

impl StatType {
    pub const ALL: [StatType; 4] = [StatType::Min, StatType::Max, StatType::Avg, StatType::Var];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Min => "min",
            StatType::Max => "max",
            StatType::Avg => "avg",
            StatType::Var => "var",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Display for StatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators a [`Summary`] can apply across measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOp {
    Min,
    Max,
    Avg,
}

impl SummaryOp {
    pub const ALL: [SummaryOp; 3] = [SummaryOp::Min, SummaryOp::Max, SummaryOp::Avg];

    fn apply(self, first: f64, rest: impl Iterator<Item = f64>) -> f64 {
        match self {
            SummaryOp::Min => rest.fold(first, f64::min),
            SummaryOp::Max => rest.fold(first, f64::max),
            SummaryOp::Avg => stats::mean_of(first, rest),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl From<SummaryOp> for StatType {
    fn from(op: SummaryOp) -> Self {
        match op {
            SummaryOp::Min => StatType::Min,
            SummaryOp::Max => StatType::Max,
            SummaryOp::Avg => StatType::Avg,
        }
    }
}

/// `enabled[op][base]`: apply `op` over the `base` stat of every measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMap {
    enabled: [[bool; 4]; 3],
}

impl Default for TypeMap {
    /// Every operator over max, avg and var; never over min.
    fn default() -> Self {
        let mut map = TypeMap::empty();
        for op in SummaryOp::ALL {
            for base in [StatType::Max, StatType::Avg, StatType::Var] {
                map.enable(op, base);
            }
        }
        map
    }
}

impl TypeMap {
    pub fn empty() -> Self {
        TypeMap {
            enabled: [[false; 4]; 3],
        }
    }

    pub fn enable(&mut self, op: SummaryOp, base: StatType) -> &mut Self {
        self.enabled[op.index()][base.index()] = true;
        self
    }

    #[must_use]
    pub fn is_enabled(&self, op: SummaryOp, base: StatType) -> bool {
        self.enabled[op.index()][base.index()]
    }

    /// Base stats at least one operator needs.
    pub fn required_base_stats(&self) -> Vec<StatType> {
        StatType::ALL
            .into_iter()
            .filter(|base| SummaryOp::ALL.iter().any(|op| self.is_enabled(*op, *base)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measurement {
    pub id: String,
    stats: BTreeMap<StatType, f64>,
}

impl Measurement {
    pub fn new(id: impl Into<String>) -> Self {
        Measurement {
            id: id.into(),
            stats: BTreeMap::new(),
        }
    }

    /// Max, avg and (population) var of a raw sample.
    pub fn from_values(
        id: impl Into<String>,
        values: impl Iterator<Item = f64>,
    ) -> Result<Self, PointError> {
        let id = id.into();
        let s = aggregate(values).ok_or_else(|| PointError::EmptySample { id: id.clone() })?;
        let mut m = Measurement::new(id);
        m.set(StatType::Max, s.max);
        m.set(StatType::Avg, s.mean);
        m.set(StatType::Var, s.variance);
        Ok(m)
    }

    /// Like [`Measurement::from_values`], but with min as well.
    pub fn describe(
        id: impl Into<String>,
        values: impl Iterator<Item = f64>,
    ) -> Result<Self, PointError> {
        let id = id.into();
        let s = aggregate(values).ok_or_else(|| PointError::EmptySample { id: id.clone() })?;
        let mut m = Measurement::new(id);
        m.set(StatType::Min, s.min);
        m.set(StatType::Max, s.max);
        m.set(StatType::Avg, s.mean);
        m.set(StatType::Var, s.variance);
        Ok(m)
    }

    #[must_use]
    pub fn get(&self, stat: StatType) -> Option<f64> {
        self.stats.get(&stat).copied()
    }

    pub fn set(&mut self, stat: StatType, value: f64) {
        self.stats.insert(stat, value);
    }

    #[must_use]
    pub fn contains(&self, stat: StatType) -> bool {
        self.stats.contains_key(&stat)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatType, f64)> + '_ {
        self.stats.iter().map(|(k, v)| (*k, *v))
    }

    fn require(&self, stat: StatType) -> Result<f64, PointError> {
        self.get(stat).ok_or_else(|| PointError::MissingStat {
            id: self.id.clone(),
            stat,
        })
    }
}

impl Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Measurement-{}> {}",
            self.id,
            self.iter().map(|(k, v)| format!("{k}: {v}")).join(" ")
        )
    }
}

/// Summary statistics over a list of measurements. Holds one
/// [`Measurement`] per [`SummaryOp`], keyed by base stat.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub id: String,
    ops: [Measurement; 3],
}

impl Summary {
    /// Fails before computing anything if `measurements` is empty or a
    /// measurement lacks a base stat the typemap requires.
    pub fn new(
        id: impl Display,
        measurements: &[Measurement],
        typemap: &TypeMap,
    ) -> Result<Self, PointError> {
        let id = format!("Summary-{id}");
        let (first, rest) = measurements
            .split_first()
            .ok_or_else(|| PointError::EmptySummary { id: id.clone() })?;

        // (base, value of the first measurement, values of the rest)
        let mut columns = typemap
            .required_base_stats()
            .into_iter()
            .map(|base| -> Result<_, PointError> {
                Ok((base, first.require(base)?, Vec::<f64>::with_capacity(rest.len())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for m in rest {
            for (base, _, tail) in columns.iter_mut() {
                tail.push(m.require(*base)?);
            }
        }

        let ops = SummaryOp::ALL.map(|op| {
            let mut summary = Measurement::new(id.clone());
            for (base, head, tail) in &columns {
                if typemap.is_enabled(op, *base) {
                    summary.set(*base, op.apply(*head, tail.iter().copied()));
                }
            }
            summary
        });

        Ok(Summary { id, ops })
    }

    /// The measurement produced by `op`.
    #[must_use]
    pub fn get(&self, op: SummaryOp) -> &Measurement {
        &self.ops[op.index()]
    }

    /// Summary stat `summary` over base stat `base`. `None` when
    /// `summary` is not a summary operator or the pair was not enabled.
    #[must_use]
    pub fn value(&self, summary: StatType, base: StatType) -> Option<f64> {
        let op = match summary {
            StatType::Min => SummaryOp::Min,
            StatType::Max => SummaryOp::Max,
            StatType::Avg => SummaryOp::Avg,
            StatType::Var => return None,
        };
        self.get(op).get(base)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatType, &Measurement)> + '_ {
        SummaryOp::ALL
            .into_iter()
            .map(|op| (StatType::from(op), self.get(op)))
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Measurement-{}> {}",
            self.id,
            self.iter().map(|(k, m)| format!("{k}: {m}")).join(" ")
        )
    }
}

/// All named measurements of one experimental run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpPoint {
    pub id: String,
    stats: BTreeMap<String, Measurement>,
}

impl ExpPoint {
    pub fn new(id: impl Into<String>) -> Self {
        ExpPoint {
            id: id.into(),
            stats: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.stats.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, measurement: Measurement) {
        self.stats.insert(name.into(), measurement);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Measurement> {
        self.stats.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.stats.keys().map(String::as_str)
    }
}

impl Display for ExpPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<ExpPoint-{}>", self.id)?;
        write!(
            f,
            "{}",
            self.iter().map(|(k, v)| format!("{k}: {v}")).join("\n")
        )
    }
}

/// Summaries of every measurement name found in a set of points.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPoint {
    pub id: String,
    stats: BTreeMap<String, Summary>,
}

impl SummaryPoint {
    /// Names need not be shared: a name seen in a single point is
    /// summarized over that one measurement.
    pub fn new(id: impl Display, points: &[ExpPoint], typemap: &TypeMap) -> Result<Self, PointError> {
        let mut grouped: BTreeMap<&str, Vec<Measurement>> = BTreeMap::new();
        for point in points {
            for (name, measurement) in point.iter() {
                grouped
                    .entry(name.as_str())
                    .or_default()
                    .push(measurement.clone());
            }
        }

        let stats = grouped
            .into_iter()
            .map(|(name, measurements)| {
                Summary::new(name, &measurements, typemap).map(|s| (name.to_string(), s))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(SummaryPoint {
            id: format!("Summary-{id}"),
            stats,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Summary> {
        self.stats.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Summary> {
        self.stats.iter()
    }
}

impl Display for SummaryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "<ExpPoint-{}>", self.id)?;
        write!(
            f,
            "{}",
            self.iter().map(|(k, v)| format!("{k}: {v}")).join("\n")
        )
    }
}
