use clap::Parser;
use env_logger::Env;
use hazards::application::runner;
use hazards::cli::Args;
use hazards::domain::ids::DisplayIds;
use hazards::infra::console::ConsoleReporter;
use std::io;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let config = Args::parse().into_config();
    log::debug!(config:? = config; "parsed arguments");

    let mut reporter = ConsoleReporter::new(io::stdout().lock());
    let mut ids = DisplayIds::new();
    runner::run(&config, &mut reporter, &mut ids)?;

    Ok(())
}
