/*
 * Invoice from an iCalendar file
 *
 * Time tracking lives in a calendar, one event per block of work, titled
 * with the service performed. To bill a client:
 *  - Read the events of the calendar
 *  - Keep the part of each event inside the billing window
 *  - Sum the hours per service (event title by default)
 *  - Price the hours with the rates in the config
 *  - Fill the LaTeX invoice template
 *  - Convert to docx with pandoc, every table drawn as a grid
 *
 * With --no-invoice only the hours per service are printed.
 */

mod aggregate;
mod billing;
mod calendar;
mod cli;
mod config;
mod document;
mod error;
mod run;
mod templates;
mod window;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Opts;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let opts = Opts::parse();

    if let Err(error) = run::run(opts) {
        eprintln!("{}", error);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
