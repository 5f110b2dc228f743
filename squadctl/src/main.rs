use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = squadctl::Cli::parse();
    init_tracing(&cli.log_level);
    if let Err(err) = squadctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

// Logs go to stderr so `--format json` output stays parseable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
