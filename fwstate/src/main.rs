use anyhow::Result;
use clap::Parser;
use fwstate::schema::embedded_schema_names;

mod apply_cmd;
mod cli;
mod normalize_cmd;
mod plan_cmd;
mod resolve;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Schemas => {
            for name in embedded_schema_names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Normalize(args) => normalize_cmd::run_normalize(args),
        Command::Plan(args) => plan_cmd::run_plan(args),
        Command::Apply(args) => apply_cmd::run_apply(args),
    }
}
