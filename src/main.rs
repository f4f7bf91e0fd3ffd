//! `settix` worker and publishing CLI.
//!
//! ```text
//! settix run      bootstrap → one consumer per cluster → wait for signal → drain
//! settix publish  bootstrap → fan a request out to every cluster → print report
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};

use settix_rabbitmq::amqp::lapin_client::LapinConnectionFactory;
use settix_rabbitmq::amqp::ConnectionFactory;
use settix_rabbitmq::config::load_config;
use settix_rabbitmq::consumer::{Consumer, LoggingProcessor};
use settix_rabbitmq::lifecycle::{wait_for_signal, Shutdown};
use settix_rabbitmq::observability::{init_metrics, init_tracing};
use settix_rabbitmq::publisher::PublishReport;
use settix_rabbitmq::topology::queue_name;
use settix_rabbitmq::{
    ChannelResolver, ClusterHealth, ConfigurationRequest, Publisher, RemoveConfigurationRequest,
    SettixConfig, TopologyOrchestrator,
};

#[derive(Parser)]
#[command(name = "settix")]
#[command(about = "Settix configuration propagation over RabbitMQ", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "settix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision topology and consume until SIGINT/SIGTERM
    Run {
        /// Service key; defaults to `service.key` from the config file
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Publish a configuration request to every cluster
    Publish {
        #[arg(short, long)]
        tenant: String,

        #[arg(short, long)]
        service: Option<String>,

        /// Configuration entry as key=value; repeatable
        #[arg(long = "set", value_parser = parse_key_value)]
        entries: Vec<(String, String)>,

        /// Send a removal request instead
        #[arg(long)]
        remove: bool,

        #[arg(long, requires = "remove")]
        restart_required: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Logging already initialised: {e}");
    }
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(clusters = config.rabbitmq.len(), "settix starting");

    match cli.command {
        Commands::Run { service } => {
            let service = service.unwrap_or_else(|| config.service.key.clone());
            run(config, &service).await
        }
        Commands::Publish {
            tenant,
            service,
            entries,
            remove,
            restart_required,
        } => {
            let service = service.unwrap_or_else(|| config.service.key.clone());
            let data: HashMap<String, String> = entries.into_iter().collect();
            publish(config, &tenant, &service, data, remove, restart_required).await
        }
    }
}

async fn run(config: SettixConfig, service: &str) -> Result<(), Box<dyn std::error::Error>> {
    let factory: Arc<dyn ConnectionFactory> = Arc::new(LapinConnectionFactory::new());
    let health = Arc::new(ClusterHealth::new());
    let shutdown = Arc::new(Shutdown::new());
    tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            wait_for_signal().await;
            shutdown.trigger();
        }
    });

    let orchestrator = TopologyOrchestrator::new(config.rabbitmq.clone(), Arc::clone(&factory), Arc::clone(&health))
        .with_shutdown(shutdown.subscribe());
    let bootstrap = orchestrator.bootstrap(service).await;
    if shutdown.is_triggered() {
        tracing::info!("Shutdown requested during bootstrap");
        return Ok(());
    }
    for (cluster, error) in bootstrap.failed() {
        tracing::warn!(cluster = %cluster, error = %error, "Cluster not provisioned");
    }

    let queue = queue_name(service);
    let processor = Arc::new(LoggingProcessor);
    let drain_interval = Duration::from_millis(config.consumer.drain_poll_interval_ms);
    let mut subscriptions = Vec::new();

    for cluster in &config.rabbitmq {
        let identity = cluster.identity();
        let consumer = match Consumer::connect(factory.as_ref(), cluster, processor.clone()).await {
            Ok(consumer) => consumer.with_drain_poll_interval(drain_interval),
            Err(e) => {
                tracing::error!(cluster = %identity, error = %e, "Failed to connect consumer");
                continue;
            }
        };
        match consumer.subscribe(&queue).await {
            Ok(handle) => subscriptions.push(handle),
            Err(e) => tracing::error!(cluster = %identity, error = %e, "Failed to subscribe"),
        }
    }

    tracing::info!(consumers = subscriptions.len(), queue = %queue, "settix running");
    shutdown.subscribe().triggered().await;

    tracing::info!("Draining consumers");
    for handle in subscriptions {
        handle.cancel().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn publish(
    config: SettixConfig,
    tenant: &str,
    service: &str,
    data: HashMap<String, String>,
    remove: bool,
    restart_required: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let factory: Arc<dyn ConnectionFactory> = Arc::new(LapinConnectionFactory::new());
    let health = Arc::new(ClusterHealth::new());

    TopologyOrchestrator::new(config.rabbitmq.clone(), Arc::clone(&factory), Arc::clone(&health))
        .bootstrap(service)
        .await;

    let resolver = Arc::new(ChannelResolver::new(factory));
    let publisher = Publisher::new(config.rabbitmq.clone(), Arc::clone(&resolver), health);

    let report = if remove {
        let request = RemoveConfigurationRequest::new(tenant, service, data, restart_required, Utc::now());
        publisher.publish(&request).await
    } else {
        let request = ConfigurationRequest::new(tenant, service, data, Utc::now());
        publisher.publish(&request).await
    };

    resolver.close_all().await;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PublishReport) {
    println!("{} → {}", report.contract, report.routing_key);
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => println!("  {:<30} published", outcome.cluster),
            Err(e) => println!("  {:<30} FAILED: {}", outcome.cluster, e),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}
