mod cli;

use crate::cli::ArgParser;

use modbus_sim::config::Config;
use modbus_sim::instance::{State, TransportManager};
use modbus_sim::memory::RegisterTable;
use modbus_sim::net::Transport;
use modbus_sim::sim::{Simulator, Ticker};

use anyhow::anyhow;
use clap::Parser;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn run() -> Result<(), anyhow::Error> {
    // Parse all arguments
    let args = ArgParser::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if args.verbose { "debug" } else { "info" })
            }),
        )
        .with_target(false)
        .init();

    // Read configuration
    let config = Config::read_or_init(&args.config)
        .map_err(|e| anyhow!("Failed to read configuration file {}. [{}]", args.config, e))?;
    tracing::info!("Configuration: {}", args.config);
    tracing::info!("Config Title : {}", config.title);

    // Initialize register table and simulated sequences
    let table = Arc::new(RegisterTable::new());
    let mut simulator = Simulator::new(table.clone());
    for e in config.apply(&table, &mut simulator) {
        tracing::error!("Configuration entry rejected. [{}]", e);
    }
    tracing::info!("{} simulated sequences loaded", simulator.len());

    // Initialize tokio runtime for the modbus servers
    let runtime = Runtime::new().map_err(|e| anyhow!("Failed to create runtime. [{}]", e))?;

    runtime.block_on(async move {
        let mut manager = TransportManager::new(table);

        // Failures are logged by the manager, the other transport still starts
        if config.enable.tcp {
            let _ = manager.start_tcp(&config.tcp).await;
        }
        if config.enable.rtu {
            let _ = manager.start_rtu(&config.rtu);
        }
        if [Transport::Tcp, Transport::Rtu]
            .iter()
            .all(|t| manager.state(*t) != State::Listening)
        {
            tracing::warn!("No listener is running, only the simulation is active");
        }

        let ticker = Ticker::spawn(simulator, config.interval());

        let res = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");

        ticker.stop().await;
        manager.stop_all().await;
        res.map_err(|e| anyhow!("Failed to wait for shutdown signal. [{}]", e))
    })
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
