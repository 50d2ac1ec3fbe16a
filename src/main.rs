use clap::Parser;
use trendfilter::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
