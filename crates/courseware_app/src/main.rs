mod cli;
mod config;
mod run;

use std::path::Path;

use clap::Parser;
use engine_logging::LogDestination;
use log::LevelFilter;

const LOG_FILE: &str = "downloads.log";

fn main() {
    let cli = cli::Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(LogDestination::Both, Path::new(LOG_FILE), level);

    if let Err(err) = run::run(&cli) {
        log::error!("{:#}", err);
        eprintln!("courseware error: {:#}", err);
        std::process::exit(1);
    }
}
