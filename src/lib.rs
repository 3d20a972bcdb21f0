pub mod algorithms;
pub mod cli;
pub mod formats;
pub mod jobs;
pub mod model;
pub mod runtime;
pub mod session;

pub fn run_cli() -> Result<(), String> {
    cli::run_cli()
}
