pub mod aggregation;
pub mod cli;
pub mod config;
pub mod cpu_mapping;
pub mod data;
pub mod defaults;
pub mod executable;
pub mod experiment;
pub mod point;
pub mod reporting;
pub mod stats;
pub mod tree;

// Fixture builders shared by unit tests and the pipeline benchmark
#[doc(hidden)]
#[cfg(any(test, doctest, feature = "test-helpers"))]
pub mod test_helpers;
