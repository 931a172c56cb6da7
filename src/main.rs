mod calendar;
mod cli;
mod dates;
mod dimension;
mod error;
mod export;
mod fmt;
mod join;
mod loader;
mod metrics;
mod models;
mod pipeline;
mod settings;
mod tables;

use clap::Parser;
use tracing_subscriber::{fmt as log_fmt, EnvFilter};

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    log_fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            output_dir,
            locale,
            invalid_dates,
        } => cli::init::run(data_dir, output_dir, locale, invalid_dates),
        Commands::Run {
            data_dir,
            output_dir,
            html,
        } => cli::run::run(data_dir, output_dir, html),
        Commands::Report { command, data_dir } => cli::report::dispatch(command, data_dir),
        Commands::Check { data_dir } => cli::check::run(data_dir),
        Commands::FixDates {
            file,
            column,
            output,
        } => cli::fix_dates::run(&file, &column, output),
        Commands::Demo { data_dir } => cli::demo::run(data_dir),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
