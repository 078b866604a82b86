use anyhow::Context;
use batch_producer::{KafkaTopic, OutboundMessage, TopicPublisher};
use bigdecimal::BigDecimal;
use consumer_runtime::ConsumedMessage;
use dedup_queue::DedupQueue;
use position_store::{AssetPosition, AssetPositionRepository, AssetPositionUpsert, Subaccount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Deposit event read from `to-ender`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub address: String,
    pub subaccount_number: u32,
    pub asset_id: String,
    /// New position magnitude after the deposit
    pub size: BigDecimal,
    pub is_long: bool,
}

/// Subaccount update fanned out on `to-websockets-subaccounts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubaccountUpdate {
    pub subaccount_id: Uuid,
    pub address: String,
    pub subaccount_number: u32,
    pub asset_positions: Vec<AssetPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Position written and update published
    Applied(AssetPosition),
    /// Another deposit for the address is in flight
    Busy,
}

/// Applies deposit events: one workflow per address at a time, subaccount and
/// position upserts, then a buffered websocket update
///
/// The update is only queued on the shared publisher; it reaches the broker
/// when the publisher is next flushed.
pub struct DepositHandler {
    positions: Arc<dyn AssetPositionRepository>,
    in_flight: DedupQueue,
    publisher: Arc<Mutex<TopicPublisher>>,
}

impl DepositHandler {
    pub fn new(
        positions: Arc<dyn AssetPositionRepository>,
        in_flight: DedupQueue,
        publisher: Arc<Mutex<TopicPublisher>>,
    ) -> Self {
        Self {
            positions,
            in_flight,
            publisher,
        }
    }

    pub async fn handle(&self, message: Arc<ConsumedMessage>) -> anyhow::Result<DepositOutcome> {
        let event: DepositEvent = serde_json::from_slice(message.payload()).with_context(|| {
            format!(
                "Invalid deposit event at {}[{}]@{}",
                message.topic, message.partition, message.offset
            )
        })?;

        if !self.in_flight.add_to_queue(&event.address) {
            info!(
                at = "deposit_handler#handle",
                address = %event.address,
                offset = message.offset,
                "Deposit already processing for address, skipping"
            );
            return Ok(DepositOutcome::Busy);
        }

        // The key is released on every path, including failures
        let outcome = self.apply(&event).await;
        self.in_flight.remove_from_queue(&event.address);

        outcome.map(DepositOutcome::Applied)
    }

    async fn apply(&self, event: &DepositEvent) -> anyhow::Result<AssetPosition> {
        let subaccount = Subaccount::new(event.address.clone(), event.subaccount_number);
        let subaccount_id = subaccount.id;
        self.positions
            .ensure_subaccount(&subaccount)
            .await
            .with_context(|| format!("Failed to create subaccount for {}", event.address))?;

        let position = self
            .positions
            .upsert(AssetPositionUpsert::new(
                subaccount_id,
                event.asset_id.clone(),
                event.size.clone(),
                event.is_long,
            ))
            .await
            .with_context(|| format!("Failed to upsert position for {}", event.address))?;

        let update = SubaccountUpdate {
            subaccount_id,
            address: event.address.clone(),
            subaccount_number: event.subaccount_number,
            asset_positions: vec![position.clone()],
        };
        let value = serde_json::to_vec(&update)?;

        self.publisher.lock().await.add_message(
            KafkaTopic::ToWebsocketsSubaccounts,
            OutboundMessage::new(value).with_key(subaccount_id.to_string()),
        );

        debug!(
            at = "deposit_handler#apply",
            address = %event.address,
            subaccount_id = %subaccount_id,
            asset_id = %event.asset_id,
            size = %event.size,
            "Deposit applied"
        );
        Ok(position)
    }
}
