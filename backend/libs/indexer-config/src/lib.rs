//! Process-wide configuration for the indexer
//!
//! Values are read once at startup and shared as `Arc<IndexerConfig>`; nothing
//! re-reads the environment afterwards.

use rdkafka::ClientConfig;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub mod env;

use env::{parse_env_with_default, parse_list};

/// Configuration loading errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} not set")]
    Missing(String),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Constraint(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Broker connection, consumer-group and batching tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub broker_urls: Vec<String>,
    pub connection_timeout_ms: u64,
    pub session_timeout_ms: u64,
    pub rebalance_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Number of partitions whose messages are dispatched concurrently
    pub concurrent_partitions: usize,
    /// Commit once this many handled messages are pending
    pub autocommit_threshold: usize,
    /// Commit at least this often while messages are pending
    pub autocommit_interval_ms: u64,
    /// Append a per-process random suffix to the consumer group id
    pub enable_unique_consumer_group_ids: bool,
    /// Byte ceiling (key + value) for a single producer batch
    pub max_batch_message_size_bytes: usize,
    pub wait_max_time_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            broker_urls: vec!["localhost:9092".to_string()],
            connection_timeout_ms: 5_000,
            session_timeout_ms: 60_000,
            rebalance_timeout_ms: 50_000,
            heartbeat_interval_ms: 5_000,
            concurrent_partitions: 1,
            autocommit_threshold: 50,
            autocommit_interval_ms: 5_000,
            enable_unique_consumer_group_ids: false,
            max_batch_message_size_bytes: 900_000,
            wait_max_time_ms: 5_000,
        }
    }
}

impl KafkaConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();

        let broker_urls = match std::env::var("KAFKA_BROKER_URLS") {
            Ok(raw) => parse_list(&raw),
            Err(_) => defaults.broker_urls,
        };

        let config = Self {
            broker_urls,
            connection_timeout_ms: parse_env_with_default(
                "KAFKA_CONNECTION_TIMEOUT_MS",
                defaults.connection_timeout_ms,
            )?,
            session_timeout_ms: parse_env_with_default(
                "KAFKA_SESSION_TIMEOUT_MS",
                defaults.session_timeout_ms,
            )?,
            rebalance_timeout_ms: parse_env_with_default(
                "KAFKA_REBALANCE_TIMEOUT_MS",
                defaults.rebalance_timeout_ms,
            )?,
            heartbeat_interval_ms: parse_env_with_default(
                "KAFKA_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            )?,
            concurrent_partitions: parse_env_with_default(
                "KAFKA_CONCURRENT_PARTITIONS",
                defaults.concurrent_partitions,
            )?,
            autocommit_threshold: parse_env_with_default(
                "KAFKA_AUTOCOMMIT_THRESHOLD",
                defaults.autocommit_threshold,
            )?,
            autocommit_interval_ms: parse_env_with_default(
                "KAFKA_AUTOCOMMIT_INTERVAL_MS",
                defaults.autocommit_interval_ms,
            )?,
            enable_unique_consumer_group_ids: parse_env_with_default(
                "KAFKA_ENABLE_UNIQUE_CONSUMER_GROUP_IDS",
                defaults.enable_unique_consumer_group_ids,
            )?,
            max_batch_message_size_bytes: parse_env_with_default(
                "KAFKA_MAX_BATCH_WEBSOCKET_MESSAGE_SIZE_BYTES",
                defaults.max_batch_message_size_bytes,
            )?,
            wait_max_time_ms: parse_env_with_default(
                "KAFKA_WAIT_MAX_TIME_MS",
                defaults.wait_max_time_ms,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.broker_urls.is_empty() {
            return Err(ConfigError::Constraint(
                "KAFKA_BROKER_URLS must list at least one broker".to_string(),
            ));
        }
        if self.concurrent_partitions == 0 {
            return Err(ConfigError::Constraint(
                "KAFKA_CONCURRENT_PARTITIONS must be at least 1".to_string(),
            ));
        }
        if self.max_batch_message_size_bytes == 0 {
            return Err(ConfigError::Constraint(
                "KAFKA_MAX_BATCH_WEBSOCKET_MESSAGE_SIZE_BYTES must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn autocommit_interval(&self) -> Duration {
        Duration::from_millis(self.autocommit_interval_ms)
    }

    /// librdkafka properties for a producer identified by `client_id`
    pub fn producer_client_config(&self, client_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.broker_urls.join(","))
            .set("client.id", client_id)
            .set(
                "socket.connection.setup.timeout.ms",
                self.connection_timeout_ms.to_string(),
            )
            .set("acks", "all")
            .set("enable.idempotence", "true");
        config
    }

    /// librdkafka properties for a member of consumer group `group_id`
    ///
    /// Offsets are stored and committed explicitly by the consumer runtime, so
    /// librdkafka's own auto commit and auto offset store are disabled.
    pub fn consumer_client_config(&self, client_id: &str, group_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.broker_urls.join(","))
            .set("client.id", client_id)
            .set("group.id", group_id)
            .set(
                "socket.connection.setup.timeout.ms",
                self.connection_timeout_ms.to_string(),
            )
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", self.rebalance_timeout_ms.to_string())
            .set(
                "heartbeat.interval.ms",
                self.heartbeat_interval_ms.to_string(),
            )
            .set("fetch.wait.max.ms", self.wait_max_time_ms.to_string())
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false");
        config
    }
}

/// Top-level service configuration
#[derive(Clone)]
pub struct IndexerConfig {
    /// Consumer group prefix and producer client id
    pub service_name: String,
    pub kafka: KafkaConfig,
    pub database_url: String,
}

impl fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("service_name", &self.service_name)
            .field("kafka", &self.kafka)
            .field("database_url", &"[REDACTED]")
            .finish()
    }
}

impl IndexerConfig {
    /// Load configuration from the environment (and `.env` when present)
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        let service_name = std::env::var("SERVICE_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "indexer-service".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;

        Ok(Self {
            service_name,
            kafka: KafkaConfig::from_env()?,
            database_url,
        })
    }

    pub fn log_config(&self) {
        info!(
            at = "config#log_config",
            service_name = %self.service_name,
            brokers = ?self.kafka.broker_urls,
            concurrent_partitions = self.kafka.concurrent_partitions,
            autocommit_threshold = self.kafka.autocommit_threshold,
            autocommit_interval_ms = self.kafka.autocommit_interval_ms,
            unique_group_ids = self.kafka.enable_unique_consumer_group_ids,
            max_batch_bytes = self.kafka.max_batch_message_size_bytes,
            "Indexer configuration loaded"
        );
    }
}
