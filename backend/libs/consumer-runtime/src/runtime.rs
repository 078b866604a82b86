use futures::future::{join_all, BoxFuture, FutureExt};
use indexer_config::KafkaConfig;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::client::{ClientEvent, ConsumerClient};
use crate::commit::CommitTracker;
use crate::error::{ConsumerError, ConsumerResult};
use crate::group::ConsumerGroupIdentity;
use crate::message::ConsumedMessage;
use crate::metrics::{COMMITS, DISPATCH_DURATION, HANDLER_FAILURES, MESSAGES_TOTAL, RECONNECTS};
use crate::state::ConsumerState;

/// A registered message handler
pub type MessageHandler =
    Arc<dyn Fn(Arc<ConsumedMessage>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Messages buffered per dispatch lane before the receive loop waits
const LANE_CAPACITY: usize = 256;

/// Dispatch and commit settings for `start_consumer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Number of dispatch lanes; partition `p` is always handled by lane
    /// `p mod lanes`
    pub partitions_consumed_concurrently: usize,
    /// Commit once this many handled messages are pending
    pub commit_threshold: usize,
    /// Commit at least this often while messages are pending
    pub commit_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            partitions_consumed_concurrently: 1,
            commit_threshold: 50,
            commit_interval: Duration::from_millis(5_000),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &KafkaConfig) -> Self {
        Self {
            partitions_consumed_concurrently: config.concurrent_partitions,
            commit_threshold: config.autocommit_threshold,
            commit_interval: config.autocommit_interval(),
        }
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    topics: Vec<String>,
    from_beginning: bool,
}

/// Long-lived consumer group member
///
/// Owns the subscription, fans every message out to all registered handlers
/// and reconnects on its own after a transport-level disconnect. Only
/// `stop_consumer` ends it for good.
///
/// # Example
///
/// ```ignore
/// let runtime = Arc::new(ConsumerRuntime::new(client, identity));
/// runtime.connect().await?;
/// runtime.subscribe(&["to-ender"], false).await?;
/// runtime.add_on_message_function(|message| async move { handle(message).await });
/// let run = runtime.start_consumer(RunSettings::from_config(&config.kafka))?;
/// // ...
/// runtime.stop_consumer().await?;
/// run.await??;
/// ```
pub struct ConsumerRuntime {
    client: Arc<dyn ConsumerClient>,
    identity: ConsumerGroupIdentity,
    state: Mutex<ConsumerState>,
    subscription: Mutex<Option<Subscription>>,
    handlers: RwLock<Vec<MessageHandler>>,
    shutdown: watch::Sender<bool>,
    /// Held by the run loop until it has drained its lanes and committed
    run_lock: Arc<AsyncMutex<()>>,
}

impl ConsumerRuntime {
    pub fn new(client: Arc<dyn ConsumerClient>, identity: ConsumerGroupIdentity) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            client,
            identity,
            state: Mutex::new(ConsumerState::Disconnected),
            subscription: Mutex::new(None),
            handlers: RwLock::new(Vec::new()),
            shutdown,
            run_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.lock_state()
    }

    pub fn group_id(&self) -> String {
        self.identity.group_id()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_state(&self) -> MutexGuard<'_, ConsumerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` only if the runtime has not been stopped meanwhile
    fn advance_unless_stopped(&self, next: ConsumerState) -> bool {
        let mut state = self.lock_state();
        if state.is_stopped() {
            return false;
        }
        *state = next;
        true
    }

    fn expect_state(
        &self,
        allowed: &[ConsumerState],
        expected: &'static str,
        next: ConsumerState,
    ) -> ConsumerResult<()> {
        let mut state = self.lock_state();
        if !allowed.contains(&*state) {
            return Err(ConsumerError::InvalidState {
                expected,
                found: state.to_string(),
            });
        }
        *state = next;
        Ok(())
    }

    pub async fn connect(&self) -> ConsumerResult<()> {
        self.expect_state(
            &[ConsumerState::Disconnected],
            "disconnected",
            ConsumerState::Connecting,
        )?;

        if let Err(e) = self.client.connect().await {
            self.advance_unless_stopped(ConsumerState::Disconnected);
            return Err(e);
        }

        info!(
            at = "consumer#connect",
            group_id = %self.group_id(),
            "Consumer connected"
        );
        Ok(())
    }

    /// Subscribe to `topics`; the subscription is re-issued after every reconnect
    pub async fn subscribe<T: AsRef<str>>(
        &self,
        topics: &[T],
        from_beginning: bool,
    ) -> ConsumerResult<()> {
        let topics: Vec<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();
        {
            let state = self.lock_state();
            if !matches!(*state, ConsumerState::Connecting | ConsumerState::Subscribed) {
                return Err(ConsumerError::InvalidState {
                    expected: "connected",
                    found: state.to_string(),
                });
            }
        }

        self.client.subscribe(&topics, from_beginning).await?;

        info!(
            at = "consumer#subscribe",
            group_id = %self.group_id(),
            topics = ?topics,
            from_beginning,
            "Consumer subscribed"
        );
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Subscription {
            topics,
            from_beginning,
        });
        self.advance_unless_stopped(ConsumerState::Subscribed);
        Ok(())
    }

    /// Register another handler. Every handler sees every message; handlers
    /// for one message run concurrently and all of them settle before the
    /// message counts as processed.
    pub fn add_on_message_function<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<ConsumedMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: MessageHandler = Arc::new(move |message| handler(message).boxed());
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Start the run loop on the tokio runtime
    ///
    /// The returned task resolves once the runtime stops. It resolves to an
    /// error if a handler fails (the failing message's offset is never
    /// stored) or a reconnect attempt fails; in both cases the runtime is
    /// left `Stopped` and disconnected.
    pub fn start_consumer(
        self: &Arc<Self>,
        settings: RunSettings,
    ) -> ConsumerResult<JoinHandle<ConsumerResult<()>>> {
        let running = Arc::clone(&self.run_lock).try_lock_owned().map_err(|_| {
            ConsumerError::InvalidState {
                expected: "subscribed",
                found: ConsumerState::Running.to_string(),
            }
        })?;
        self.expect_state(
            &[ConsumerState::Subscribed],
            "subscribed",
            ConsumerState::Running,
        )?;

        info!(
            at = "consumer#start",
            group_id = %self.group_id(),
            partitions_consumed_concurrently = settings.partitions_consumed_concurrently,
            commit_threshold = settings.commit_threshold,
            commit_interval_ms = settings.commit_interval.as_millis() as u64,
            handlers = self.handler_count(),
            "Starting consumer"
        );

        let runtime = Arc::clone(self);
        Ok(tokio::spawn(async move {
            runtime.run(settings, running).await
        }))
    }

    /// Stop for good: the state flips to `Stopped` before the client is
    /// disconnected, so the resulting disconnect never triggers a reconnect.
    ///
    /// Waits for a running loop to finish the messages it already received
    /// and commit their offsets.
    pub async fn stop_consumer(&self) -> ConsumerResult<()> {
        let previous = std::mem::replace(&mut *self.lock_state(), ConsumerState::Stopped);
        if previous.is_stopped() {
            return Ok(());
        }

        info!(
            at = "consumer#stop",
            group_id = %self.group_id(),
            previous = %previous,
            "Stopping consumer"
        );
        self.shutdown.send_replace(true);

        let _idle = self.run_lock.lock().await;
        self.client.disconnect().await?;

        info!(at = "consumer#stop", group_id = %self.group_id(), "Consumer stopped");
        Ok(())
    }

    async fn run(
        self: Arc<Self>,
        settings: RunSettings,
        _running: OwnedMutexGuard<()>,
    ) -> ConsumerResult<()> {
        let lanes = settings.partitions_consumed_concurrently.max(1);
        let commits = Arc::new(AsyncMutex::new(CommitTracker::new(
            settings.commit_threshold,
            settings.commit_interval,
        )));

        let (failure_tx, mut failures) = mpsc::unbounded_channel();
        let mut senders = Vec::with_capacity(lanes);
        let mut lane_tasks = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let (tx, rx) = mpsc::channel(LANE_CAPACITY);
            lane_tasks.push(tokio::spawn(Arc::clone(&self).run_lane(
                lane,
                rx,
                Arc::clone(&commits),
                failure_tx.clone(),
            )));
            senders.push(tx);
        }
        drop(failure_tx);

        let mut shutdown = self.shutdown.subscribe();
        let mut commit_tick =
            tokio::time::interval(settings.commit_interval.max(Duration::from_millis(1)));
        commit_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            if self.state().is_stopped() {
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => {}
                Some(failure) = failures.recv() => break Err(failure),
                _ = commit_tick.tick() => self.commit_if_due(&commits, false).await,
                event = self.client.recv() => match event {
                    ClientEvent::Message(message) => {
                        let lane = message.partition.rem_euclid(lanes as i32) as usize;
                        if senders[lane].send(Arc::new(message)).await.is_err() {
                            break Err(failures
                                .try_recv()
                                .unwrap_or(ConsumerError::LaneClosed(lane)));
                        }
                    }
                    ClientEvent::Disconnected => {
                        if let Err(e) = self.reconnect().await {
                            break Err(e);
                        }
                    }
                    ClientEvent::Error(reason) => {
                        warn!(
                            at = "consumer#run",
                            group_id = %self.group_id(),
                            error = %reason,
                            "Kafka consumer error"
                        );
                    }
                },
            }
        };

        // Let the lanes finish what they already received
        drop(senders);
        for (lane, task) in lane_tasks.into_iter().enumerate() {
            if let Err(e) = task.await {
                error!(at = "consumer#run", lane, error = %e, "Dispatch lane task failed");
            }
        }
        let outcome = match outcome {
            Ok(()) => failures.try_recv().map_or(Ok(()), Err),
            Err(e) => Err(e),
        };

        self.commit_if_due(&commits, true).await;

        if let Err(e) = &outcome {
            error!(
                at = "consumer#run",
                group_id = %self.group_id(),
                error = %e,
                "Consumer run loop failed"
            );
            let previous = std::mem::replace(&mut *self.lock_state(), ConsumerState::Stopped);
            if !previous.is_stopped() {
                if let Err(disconnect_err) = self.client.disconnect().await {
                    warn!(
                        at = "consumer#run",
                        error = %disconnect_err,
                        "Disconnect after failure failed"
                    );
                }
            }
        }

        info!(at = "consumer#run", group_id = %self.group_id(), "Consumer run loop exited");
        outcome
    }

    async fn run_lane(
        self: Arc<Self>,
        lane: usize,
        mut messages: mpsc::Receiver<Arc<ConsumedMessage>>,
        commits: Arc<AsyncMutex<CommitTracker>>,
        failures: mpsc::UnboundedSender<ConsumerError>,
    ) {
        while let Some(message) = messages.recv().await {
            if let Err(e) = self.dispatch(Arc::clone(&message)).await {
                // Later messages of this partition must not be stored past the failure
                let _ = failures.send(e);
                return;
            }

            if let Err(e) = self.client.store_offset(&message).await {
                warn!(
                    at = "consumer#store_offset",
                    lane,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to store offset"
                );
                continue;
            }

            commits.lock().await.record();
            self.commit_if_due(&commits, false).await;
        }
    }

    async fn dispatch(&self, message: Arc<ConsumedMessage>) -> ConsumerResult<()> {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let started = Instant::now();
        let results = join_all(
            handlers
                .iter()
                .map(|handler| handler(Arc::clone(&message))),
        )
        .await;
        let elapsed = started.elapsed();

        DISPATCH_DURATION.observe(elapsed.as_secs_f64());
        MESSAGES_TOTAL.with_label_values(&[&message.topic]).inc();

        let mut failed = 0;
        let mut first_error = None;
        for e in results.into_iter().filter_map(Result::err) {
            failed += 1;
            HANDLER_FAILURES.with_label_values(&[&message.topic]).inc();
            error!(
                at = "consumer#dispatch",
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Message handler failed"
            );
            first_error.get_or_insert(e);
        }

        match first_error {
            None => {
                debug!(
                    at = "consumer#dispatch",
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    handlers = handlers.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Message dispatched"
                );
                Ok(())
            }
            Some(source) => Err(ConsumerError::Handler {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                failed,
                source: source.into(),
            }),
        }
    }

    async fn commit_if_due(&self, commits: &AsyncMutex<CommitTracker>, force: bool) {
        let mut tracker = commits.lock().await;
        let pending = tracker.pending();
        if !(tracker.is_due() || (force && pending > 0)) {
            return;
        }

        match self.client.commit().await {
            Ok(()) => {
                tracker.committed();
                COMMITS.inc();
                debug!(at = "consumer#commit", pending, "Committed offsets");
            }
            Err(e) => {
                // Offsets stay stored; the next due check retries
                warn!(at = "consumer#commit", pending, error = %e, "Offset commit failed");
            }
        }
    }

    async fn reconnect(&self) -> ConsumerResult<()> {
        {
            let mut state = self.lock_state();
            if state.is_stopped() {
                debug!(
                    at = "consumer#disconnect",
                    "Consumer disconnected after stop, not reconnecting"
                );
                return Ok(());
            }
            *state = ConsumerState::Reconnecting;
        }

        info!(
            at = "consumer#disconnect",
            group_id = %self.group_id(),
            "Consumer disconnected unexpectedly, reconnecting"
        );
        RECONNECTS.inc();

        self.client.connect().await?;
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(subscription) = subscription {
            self.client
                .subscribe(&subscription.topics, subscription.from_beginning)
                .await?;
        }

        if self.advance_unless_stopped(ConsumerState::Running) {
            info!(
                at = "consumer#disconnect",
                group_id = %self.group_id(),
                "Consumer reconnected"
            );
        }
        Ok(())
    }
}
