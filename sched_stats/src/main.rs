use anyhow::Result;
use sched_stats::cli;

// Main entry point
fn main() -> Result<()> {
    cli::handle_calls()
}
