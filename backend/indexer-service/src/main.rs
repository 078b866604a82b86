use anyhow::Context;
use batch_producer::{KafkaBatchSender, KafkaTopic, TopicPublisher};
use consumer_runtime::{ConsumerGroupIdentity, ConsumerRuntime, RdKafkaConsumerClient, RunSettings};
use db_pool::{create_pool, DbConfig};
use dedup_queue::DedupQueue;
use indexer_config::IndexerConfig;
use indexer_service::flusher::run_periodic_flush;
use indexer_service::handlers::DepositHandler;
use indexer_service::telemetry;
use position_store::{AssetPositionRepository, PgAssetPositionRepository};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = Arc::new(IndexerConfig::from_env().context("Failed to load configuration")?);
    config.log_config();
    info!(at = "main#start", service = %config.service_name, "Starting indexer service");

    // Database
    let db_config = DbConfig::new(&config.service_name, &config.database_url);
    db_config.log_config();
    let pool = create_pool(db_config)
        .await
        .context("Failed to connect to database")?;
    position_store::migrate(&pool)
        .await
        .context("Failed to run migrations")?;
    let positions: Arc<dyn AssetPositionRepository> =
        Arc::new(PgAssetPositionRepository::new(pool.clone()));

    // Producer side
    let sender = Arc::new(
        KafkaBatchSender::from_config(&config.kafka.producer_client_config(&config.service_name))
            .context("Failed to create Kafka producer")?,
    );
    let publisher = Arc::new(Mutex::new(TopicPublisher::new(
        sender,
        config.kafka.max_batch_message_size_bytes,
    )));
    // Outbound updates go out on the offset commit cadence
    let (flush_shutdown, flush_shutdown_rx) = watch::channel(false);
    let flusher = tokio::spawn(run_periodic_flush(
        publisher.clone(),
        config.kafka.autocommit_interval(),
        flush_shutdown_rx,
    ));

    // One admission gate for the whole process
    let in_flight = DedupQueue::default();

    // Consumer side
    let identity = ConsumerGroupIdentity::from_config(&config);
    let client = Arc::new(RdKafkaConsumerClient::new(
        config
            .kafka
            .consumer_client_config(&config.service_name, &identity.group_id()),
    ));
    let runtime = Arc::new(ConsumerRuntime::new(client, identity));

    let deposits = Arc::new(DepositHandler::new(
        positions,
        in_flight.clone(),
        publisher.clone(),
    ));
    runtime.add_on_message_function(move |message| {
        let deposits = deposits.clone();
        async move { deposits.handle(message).await.map(|_| ()) }
    });

    runtime.connect().await.context("Failed to connect consumer")?;
    runtime
        .subscribe(&[KafkaTopic::ToEnder], false)
        .await
        .context("Failed to subscribe consumer")?;
    let mut run = runtime.start_consumer(RunSettings::from_config(&config.kafka))?;

    let outcome = tokio::select! {
        result = &mut run => result.context("Consumer task failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!(at = "main#shutdown", "Shutdown signal received");
            runtime.stop_consumer().await?;
            run.await.context("Consumer task failed")?
        }
    };

    flush_shutdown.send_replace(true);
    if let Err(e) = flusher.await {
        error!(at = "main#shutdown", error = %e, "Publisher flusher task failed");
    }
    in_flight.clear_queue();
    pool.close().await;

    match outcome {
        Ok(()) => {
            info!(at = "main#shutdown", "Indexer service stopped");
            Ok(())
        }
        Err(e) => {
            error!(at = "main#shutdown", error = %e, "Consumer stopped with error");
            Err(e.into())
        }
    }
}
