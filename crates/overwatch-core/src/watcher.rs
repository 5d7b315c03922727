//! The watch loop.
//!
//! [`Watcher`] consumes change signals from an [`EventSource`], re-lists the
//! namespace's events on every signal, runs each event through
//! [`WatchState`], and launches a delivery task for every event that should
//! be notified. Delivery tasks classify, resolve the mention and dispatch
//! without holding up the loop.
//!
//! ```text
//! Idle -> AwaitingSignal -> Listing -> PerEventDecision -> AwaitingSignal
//!                  \            \
//!                   +------------+--> Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::dispatcher::{Dispatcher, FailurePolicy};
use crate::error::{Result, WatchError};
use crate::event::Event;
use crate::notifier::Notification;
use crate::resolver::MentionResolver;
use crate::severity::SeverityTable;
use crate::source::EventSource;
use crate::state::{DEFAULT_STARTUP_HORIZON_SECS, Decision, WatchState};

/// Default cap on concurrent deliveries.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Configuration for the watch loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Namespace to watch. Empty watches all namespaces.
    pub namespace: String,
    /// Cluster name attached to notifications.
    pub cluster_name: String,
    /// What a failed delivery does to the loop.
    pub failure_policy: FailurePolicy,
    /// Maximum deliveries running at once.
    pub max_in_flight: usize,
    /// Relist on a timer as well as on signals.
    pub resync_interval: Option<Duration>,
    /// Events last seen this long before start are ignored.
    pub startup_horizon: chrono::Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            cluster_name: "local".to_string(),
            failure_policy: FailurePolicy::Exit,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            resync_interval: None,
            startup_horizon: chrono::Duration::seconds(DEFAULT_STARTUP_HORIZON_SECS),
        }
    }
}

impl WatcherConfig {
    /// Creates a configuration for `namespace` in `cluster_name`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the concurrent delivery cap. Zero is treated as one.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Enables periodic relisting.
    #[must_use]
    pub const fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// Not started.
    Idle,
    /// Waiting for the next change signal.
    AwaitingSignal,
    /// Fetching the current event list.
    Listing,
    /// Running listed events through dedup and throttle.
    PerEventDecision,
    /// Stopped on a fatal error.
    Failed,
}

impl fmt::Display for WatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingSignal => "awaiting-signal",
            Self::Listing => "listing",
            Self::PerEventDecision => "per-event-decision",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts from one listing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Events returned by the listing.
    pub listed: usize,
    /// Skipped as already seen.
    pub duplicates: usize,
    /// Skipped as older than the startup horizon.
    pub stale: usize,
    /// Skipped inside the quiet period.
    pub throttled: usize,
    /// Handed to a delivery task.
    pub dispatched: usize,
}

/// Drives events from a source to the dispatcher.
pub struct Watcher {
    config: WatcherConfig,
    source: Arc<dyn EventSource>,
    severity: Arc<SeverityTable>,
    resolver: MentionResolver,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    state: WatchState,
    phase: WatchPhase,
    permits: Arc<Semaphore>,
    deliveries: JoinSet<Result<()>>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("observed", &self.state.observed_count())
            .field("in_flight", &self.deliveries.len())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a watcher using the built-in severity table, no mention
    /// lookups and the system clock.
    #[must_use]
    pub fn new(config: WatcherConfig, source: Arc<dyn EventSource>, dispatcher: Dispatcher) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let state = WatchState::with_horizon(clock.now(), config.startup_horizon);
        let resolver = MentionResolver::new(source.clone(), config.namespace.clone(), "", "");
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));

        Self {
            config,
            source,
            severity: Arc::new(SeverityTable::default()),
            resolver,
            dispatcher: Arc::new(dispatcher),
            clock,
            state,
            phase: WatchPhase::Idle,
            permits,
            deliveries: JoinSet::new(),
        }
    }

    /// Replaces the severity table.
    #[must_use]
    pub fn with_severity_table(mut self, table: SeverityTable) -> Self {
        self.severity = Arc::new(table);
        self
    }

    /// Replaces the mention resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: MentionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the clock. Process start is taken from the new clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state = WatchState::with_horizon(clock.now(), self.config.startup_horizon);
        self.clock = clock;
        self
    }

    /// The loop's configuration.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// The current phase.
    #[must_use]
    pub const fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// The dedup and throttle records.
    #[must_use]
    pub const fn state(&self) -> &WatchState {
        &self.state
    }

    /// Deliveries spawned and not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.deliveries.len()
    }

    /// Runs the loop until the stream ends, a fatal error occurs or
    /// `shutdown` is cancelled.
    ///
    /// In-flight deliveries are aborted when the loop stops.
    ///
    /// # Errors
    ///
    /// Returns the fatal condition that stopped the loop. Cancellation is not
    /// an error.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let result = self.run_until_stopped(&shutdown).await;
        if let Err(e) = &result {
            self.phase = WatchPhase::Failed;
            error!(error = %e, phase = %self.phase, "watch loop failed");
        }

        self.deliveries.shutdown().await;
        result
    }

    async fn run_until_stopped(&mut self, shutdown: &CancellationToken) -> Result<()> {
        self.phase = WatchPhase::AwaitingSignal;
        let namespace = self.config.namespace.clone();

        let mut signals = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            watch = self.source.watch(&namespace) => watch.map_err(WatchError::Watch)?,
        };
        info!(namespace = %namespace, "watching for events");

        let mut resync = self.config.resync_interval.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(in_flight = self.deliveries.len(), "watch loop cancelled");
                    return Ok(());
                }
                Some(joined) = self.deliveries.join_next(), if !self.deliveries.is_empty() => {
                    Self::reap(joined)?;
                }
                () = next_tick(&mut resync) => {
                    debug!("periodic resync");
                    if !self.pass(shutdown).await? {
                        return Ok(());
                    }
                }
                signal = signals.next() => match signal {
                    Some(Ok(signal)) => {
                        info!(kind = %signal.kind, "event change detected");
                        if !self.pass(shutdown).await? {
                            return Ok(());
                        }
                    }
                    Some(Err(e)) => return Err(WatchError::Watch(e)),
                    None => return Err(WatchError::StreamClosed),
                },
            }
        }
    }

    /// Runs one pass unless `shutdown` fires first. Returns false when
    /// cancelled, including while the pass waits for a delivery slot.
    async fn pass(&mut self, shutdown: &CancellationToken) -> Result<bool> {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("watch loop cancelled during a pass");
                Ok(false)
            }
            summary = self.sync() => summary.map(|_| true),
        }
    }

    /// Lists the current events and launches deliveries for those that
    /// qualify.
    ///
    /// Waits for a delivery slot when the in-flight cap is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails or a finished delivery reported
    /// a fatal failure.
    pub async fn sync(&mut self) -> Result<PassSummary> {
        self.phase = WatchPhase::Listing;
        let events = self
            .source
            .list(&self.config.namespace)
            .await
            .map_err(WatchError::List)?;

        self.phase = WatchPhase::PerEventDecision;
        let mut summary = PassSummary {
            listed: events.len(),
            ..PassSummary::default()
        };

        for event in events {
            let now = self.clock.now();
            match self.state.observe(&event, now) {
                Decision::Duplicate => {
                    summary.duplicates += 1;
                    debug!(
                        id = %event.id,
                        reason = %event.reason,
                        event_message = %event.message,
                        "skip: already notified"
                    );
                }
                Decision::Stale { age } => {
                    summary.stale += 1;
                    debug!(
                        id = %event.id,
                        reason = %event.reason,
                        event_message = %event.message,
                        last_seen = %event.last_seen,
                        age_secs = age.num_seconds(),
                        "skip: happened before the watcher started"
                    );
                }
                Decision::Throttled { until, backoff_level } => {
                    summary.throttled += 1;
                    debug!(
                        id = %event.id,
                        reason = %event.reason,
                        event_message = %event.message,
                        backoff_minutes = backoff_level,
                        until = %until,
                        "skip: throttling notifications"
                    );
                }
                Decision::Notify { backoff_level } => {
                    summary.dispatched += 1;
                    debug!(id = %event.id, reason = %event.reason, backoff_level, "notifying");
                    self.spawn_delivery(event).await?;
                }
            }
        }

        while let Some(joined) = self.deliveries.try_join_next() {
            Self::reap(joined)?;
        }

        self.phase = WatchPhase::AwaitingSignal;
        Ok(summary)
    }

    /// Waits for every in-flight delivery to finish.
    ///
    /// # Errors
    ///
    /// Returns the first fatal delivery failure.
    pub async fn drain(&mut self) -> Result<()> {
        while let Some(joined) = self.deliveries.join_next().await {
            Self::reap(joined)?;
        }
        Ok(())
    }

    async fn spawn_delivery(&mut self, event: Event) -> Result<()> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| WatchError::Task(e.to_string()))?;

        let severity = Arc::clone(&self.severity);
        let resolver = self.resolver.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let cluster = self.config.cluster_name.clone();
        let policy = self.config.failure_policy;

        self.deliveries.spawn(async move {
            let _permit = permit;

            let level = severity.classify(&event.reason);
            let mention = resolver.resolve(&event).await;
            let notification = Notification::new(cluster, event, level, mention);
            let report = dispatcher.dispatch(&notification).await;

            let mut fatal = None;
            for (channel, e) in report.failed {
                error!(
                    channel = %channel,
                    error = %e,
                    id = %notification.event.id,
                    policy = %policy,
                    "notification delivery failed"
                );
                if policy == FailurePolicy::Exit && fatal.is_none() {
                    fatal = Some(WatchError::Delivery { channel, source: e });
                }
            }

            fatal.map_or(Ok(()), Err)
        });

        Ok(())
    }

    fn reap(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(WatchError::Task(e.to_string())),
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
