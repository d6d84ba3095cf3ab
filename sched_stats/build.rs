use std::env;
use std::fs;
use std::path::PathBuf;

fn render(cmd: clap::Command) -> Result<Vec<u8>, std::io::Error> {
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;
    Ok(buffer)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    // Path calculation to the workspace root
    let workspace_root = out_dir.join("../../../../../");
    let man_dir = workspace_root.join("man").join("man1");
    fs::create_dir_all(&man_dir)?;

    // Versionless so the pages only change along with the CLI
    let cmd = sched_stats_cli_types::Cli::command_without_version();
    fs::write(man_dir.join("sched-stats.1"), render(cmd.clone())?)?;

    for subcmd in cmd.get_subcommands() {
        let name = format!("sched-stats-{}", subcmd.get_name());
        let name: &'static str = Box::leak(name.into_boxed_str());
        let subcmd = subcmd.clone().name(name);
        fs::write(man_dir.join(format!("{name}.1")), render(subcmd)?)?;
    }

    // Tell cargo to re-run this if the CLI definition changes
    println!("cargo:rerun-if-changed=../cli_types/src/lib.rs");

    Ok(())
}
