use clap::Parser;
use miette::{IntoDiagnostic, Result};
use orderpay::application::orders::OrderService;
use orderpay::application::payments::PaymentCoordinator;
use orderpay::config::Config;
use orderpay::interfaces::csv::command_reader::CommandReader;
use orderpay::interfaces::outcome::OutcomeWriter;
use orderpay::interfaces::runner::CommandRunner;
use std::fs::File;
use std::io;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::parse();

    let stores = config.stores().into_diagnostic()?;
    let provider = config.provider_client().into_diagnostic()?;
    let runner = CommandRunner::new(
        OrderService::new(stores.orders()),
        PaymentCoordinator::new(
            stores.orders(),
            stores.payments(),
            stores.transactions(),
            provider,
        ),
    );

    let file = File::open(&config.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    let mut executed = 0u64;
    for (index, command) in reader.commands().enumerate() {
        let row = index as u64 + 1;
        match command {
            Ok(command) => {
                let op = command.op();
                let outcome = runner.run(row, command).await;
                if !outcome.ok {
                    info!(row, ?op, status = outcome.status, "Command rejected");
                }
                writer.write(&outcome).into_diagnostic()?;
                executed += 1;
            }
            Err(e) => {
                warn!(row, error = %e, "Skipping malformed command");
            }
        }
    }
    writer.flush().into_diagnostic()?;

    info!(
        executed,
        breaker = ?runner.payments().provider().breaker().state(),
        "Script finished"
    );
    Ok(())
}
