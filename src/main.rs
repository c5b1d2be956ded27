use clap::Parser;
use investr::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
