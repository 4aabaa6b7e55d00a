use anyhow::Context;
use clap::Parser;
use std::io::{Read, Write};
use std::process::ExitCode;
use texrt::app::{self, Report};
use texrt::tracing_support::init_subscriber_with_config;
use texrt::Cli;

fn read_input(cli: &Cli) -> anyhow::Result<String> {
    match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

fn write_report(cli: &Cli, report: &Report) -> anyhow::Result<()> {
    if let Some(path) = &cli.report {
        let json = serde_json::to_vec_pretty(report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_subscriber_with_config(&cli.tracing_config()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let report = match read_input(&cli) {
        Ok(input) => {
            app::run(&cli, &input, |document| {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(document)?;
                stdout.flush()
            })
            .await
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(error = %message, "Failed to read input");
            Report::failed(message)
        }
    };

    if let Err(e) = write_report(&cli, &report) {
        tracing::warn!(error = %e, "Report not written");
    }
    report.status.exit_code()
}
