//! graphrelay - watch a Microsoft 365 mailbox and relay new mail over SMTP
//!
//! Reads its settings from flags, the environment and an optional `.env` file.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Config};
use graphrelay_auth::Authenticator;
use graphrelay_core::{Forwarder, GraphMailSource, MailboxPoller, Monitor, RunStats, WatermarkFile};
use graphrelay_graph::GraphMailClient;
use graphrelay_smtp::{validate_addresses, SmtpRelay};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_EXIT: u8 = 2;

fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphrelay=info")),
        )
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::from(CONFIG_EXIT);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(stats) => {
            println!("\nMonitor stopped");
            println!("Total checks: {}", stats.checks);
            println!("Total new emails: {}", stats.new_messages);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            ExitCode::from(CONFIG_EXIT)
        }
    }
}

async fn run(config: Config) -> Result<RunStats> {
    info!("Starting graphrelay for {}", config.credentials.mailbox);

    let auth = Authenticator::new(
        &config.credentials,
        config
            .credentials
            .oauth2_config(&config.graph_authority)
            .with_timeout(config.http_timeout),
    )
    .context("Invalid identity platform settings")?;

    let graph = GraphMailClient::with_base_url(
        &config.graph_api_base,
        &config.credentials.mailbox,
        config.http_timeout,
    )
    .context("Invalid Graph API settings")?;

    let poller = match &config.watermark_file {
        Some(path) => MailboxPoller::with_store(WatermarkFile::new(path)),
        None => MailboxPoller::new(),
    };

    let mut monitor = Monitor::new(
        GraphMailSource::new(auth, graph),
        poller,
        config.monitor.clone(),
    );

    if let Some(forward) = &config.forward {
        let relay = SmtpRelay::new(&forward.smtp).context("Invalid SMTP settings")?;
        validate_addresses(&forward.recipients).context("Invalid SMTP_TO")?;
        info!(
            "Relaying new messages via {}:{} to {}",
            forward.smtp.host,
            forward.smtp.port,
            forward.recipients.join(", ")
        );
        monitor = monitor.with_forwarder(Forwarder::new(
            Box::new(relay),
            forward.recipients.clone(),
        ));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current check");
            let _ = shutdown_tx.send(true);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });

    println!(
        "Monitoring {} ({}) - press Ctrl+C to stop",
        config.credentials.mailbox, config.monitor.folder
    );

    Ok(monitor.run(shutdown_rx).await)
}
