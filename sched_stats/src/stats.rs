use std::fmt::Display;

use average::{self, concatenate, Estimate, Max, Mean, Min, Variance};

use readable::num::*;

concatenate!(
    AggStats,
    [Min, min],
    [Max, max],
    [Mean, mean],
    [Variance, population_variance]
);

/// Descriptive statistics of a sample. The variance is the population
/// variance (divisor `n`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub len: usize,
}

/// Returns `None` for an empty sample.
pub fn aggregate(values: impl Iterator<Item = f64>) -> Option<Stats> {
    let s: AggStats = values.collect();
    if s.mean.is_empty() {
        return None;
    }
    Some(Stats {
        min: s.min(),
        max: s.max(),
        mean: s.mean(),
        variance: s.population_variance(),
        len: s.mean.len() as usize,
    })
}

/// Arithmetic mean of a sample known to hold at least `first`.
pub fn mean_of(first: f64, rest: impl Iterator<Item = f64>) -> f64 {
    let m: Mean = std::iter::once(first).chain(rest).collect();
    m.mean()
}

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let m: Mean = values.collect();
    if m.is_empty() {
        None
    } else {
        Some(m.mean())
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min: {} max: {} μ: {} σ²: {} n: {}",
            Float::from(self.min),
            Float::from(self.max),
            Float::from(self.mean),
            Float::from(self.variance),
            Unsigned::from(self.len),
        )
    }
}
