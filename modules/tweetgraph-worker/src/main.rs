use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use tweetgraph_common::{Config, DeliveryMode};
use tweetgraph_graph::{migrate::migrate, GraphClient, GraphWriter};
use tweetgraph_worker::{
    delivery::LoopbackDelivery,
    ingest::Ingestor,
    loopback::LoopbackClient,
    scheduler,
    source::ApifySource,
    tickets::LoopbackTicketStore,
    traits::{ContentSource, GroupSink},
    PipelineSettings, Worker,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tweetgraph=info".parse()?)
                .add_directive("apify_client=info".parse()?),
        )
        .init();

    info!("Tweet graph worker starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    // Ctrl-C cancels the in-flight cycle and stops the loop
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    let source: Arc<dyn ContentSource> =
        Arc::new(ApifySource::new(ApifyClient::new(config.apify_token.clone())));

    let api = LoopbackClient::new(&config.ticket_api_url, config.api_token.clone())?;
    let tickets = Arc::new(LoopbackTicketStore::new(
        api.clone(),
        config.ticket_order,
        config.claim_candidates,
    ));

    let sink: Arc<dyn GroupSink> = match config.delivery {
        DeliveryMode::Graph => {
            let client = GraphClient::from_config(&config).await?;

            // Idempotent
            migrate(&client).await?;

            let writer = Arc::new(GraphWriter::new(client));
            Arc::new(Ingestor::new(writer, source.clone()))
        }
        DeliveryMode::Api => {
            info!(url = %api.url("/TwitScraps/insert2GraphDB"), "Delivering through the ticket API");
            Arc::new(LoopbackDelivery::new(api))
        }
    };

    let worker = Worker::new(tickets, source, sink, PipelineSettings::from_config(&config));
    let stats = scheduler::run(&worker, config.scrape_interval, cancel).await;

    info!(?stats, "Worker stopped");
    Ok(())
}
