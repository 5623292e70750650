use clap::Parser;
use securden_bridge::cli::{execute, Cli};
use securden_bridge::VaultClient;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // stdout carries the JSON result, logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = VaultClient::new(cli.connection_config()?);

    let report = execute(&client, &cli.command)?;
    if report.is_success() {
        println!("{}", serde_json::to_string_pretty(&report.body)?);
        Ok(())
    } else {
        eprintln!("{}", report.warning());
        std::process::exit(1);
    }
}
