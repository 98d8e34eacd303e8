use std::process;

use clap::Parser;
use colored::Colorize;
use kiq::{cli::Args, run};

fn main() {
    let args = Args::parse();

    #[cfg(feature = "tracing")]
    init_tracing(args.verbose, args.debug);

    if let Err(e) = run::run(args) {
        eprintln!(
            "{}\n {}",
            "Application error:".red().bold(),
            e.to_string().red()
        );
        process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_tracing(verbose: bool, debug: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match (debug, verbose) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
