//! End-to-end tests: settings through the running watch loop, against an
//! in-memory event source and a recording channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use futures::channel::mpsc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use overwatch::{Config, Settings, build_dispatcher, build_watcher, serve};
use overwatch_core::{
    BoxFuture, Event, EventSource, Level, ManualClock, Notification, Notifier, NotifyError, ResourceKind,
    ResourceMeta, SignalKind, SignalStream, SourceError, WatchSignal,
};

type SignalSender = mpsc::UnboundedSender<Result<WatchSignal, SourceError>>;

struct MemorySource {
    events: Mutex<Vec<Event>>,
    signals: Mutex<Option<mpsc::UnboundedReceiver<Result<WatchSignal, SourceError>>>>,
    lists: AtomicUsize,
}

impl MemorySource {
    fn new() -> (Arc<Self>, SignalSender) {
        let (tx, rx) = mpsc::unbounded();
        let source = Arc::new(Self {
            events: Mutex::new(Vec::new()),
            signals: Mutex::new(Some(rx)),
            lists: AtomicUsize::new(0),
        });
        (source, tx)
    }

    fn set_events(&self, events: Vec<Event>) {
        *self.events.lock() = events;
    }

    fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

impl EventSource for MemorySource {
    fn watch<'a>(&'a self, _namespace: &'a str) -> BoxFuture<'a, Result<SignalStream, SourceError>> {
        Box::pin(async move {
            let rx = self
                .signals
                .lock()
                .take()
                .ok_or_else(|| SourceError::Transport("already watching".to_string()))?;
            Ok(Box::pin(rx) as SignalStream)
        })
    }

    fn list<'a>(&'a self, _namespace: &'a str) -> BoxFuture<'a, Result<Vec<Event>, SourceError>> {
        Box::pin(async move {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self.events.lock().clone())
        })
    }

    fn get_resource<'a>(
        &'a self,
        kind: ResourceKind,
        _namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ResourceMeta, SourceError>> {
        Box::pin(async move {
            if kind == ResourceKind::Pod && name == "checkout-7d9f8-abcde" {
                Ok(ResourceMeta::new(name).with_label("team", "payments"))
            } else {
                Err(SourceError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                })
            }
        })
    }
}

#[derive(Debug, Default)]
struct Recording {
    sent: Mutex<Vec<Notification>>,
}

impl Recording {
    fn len(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Notifier for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.sent.lock().push(notification.clone());
            Ok(())
        })
    }
}

fn config(extra: &[&str]) -> Config {
    let mut argv = vec!["overwatch", "--listen-address", "127.0.0.1:0", "--notify-log", "false"];
    argv.extend_from_slice(extra);
    Settings::try_parse_from(argv).unwrap().validate().unwrap()
}

fn scheduled(object: &str, count: u32, last_seen: DateTime<Utc>) -> Event {
    Event::new("x", "Scheduled", last_seen)
        .with_count(count)
        .with_message("Successfully assigned default/pod to node-1")
        .with_involved_object("Pod", object)
        .with_namespace("default")
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn scenario(object: &str, expected_mention: &str) {
    let config = config(&["--mention-label", "team"]);
    let (source, signals) = MemorySource::new();
    let recording = Arc::new(Recording::default());
    let start = Utc::now();
    let clock = ManualClock::new(start);

    let dispatcher = build_dispatcher(&config).with_channel(recording.clone());
    let watcher = build_watcher(&config, source.clone(), dispatcher).with_clock(Arc::new(clock.clone()));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));

    // First signal: a fresh event is classified, addressed and dispatched.
    source.set_events(vec![scheduled(object, 1, start)]);
    signals.unbounded_send(Ok(WatchSignal::new(SignalKind::Added))).unwrap();
    wait_until("first dispatch", || recording.len() == 1).await;
    {
        let sent = recording.sent.lock();
        assert_eq!(sent[0].level, Level::Info);
        assert_eq!(sent[0].mention, expected_mention);
        assert_eq!(sent[0].cluster, "local");
        assert_eq!(sent[0].event.reason, "Scheduled");
    }

    // Second signal with the same count: nothing new to say.
    signals.unbounded_send(Ok(WatchSignal::new(SignalKind::Modified))).unwrap();
    wait_until("second listing", || source.lists() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recording.len(), 1);

    // One minute later the count moves: dispatched again.
    clock.advance(chrono::Duration::minutes(1));
    source.set_events(vec![scheduled(object, 2, start + chrono::Duration::minutes(1))]);
    signals.unbounded_send(Ok(WatchSignal::new(SignalKind::Modified))).unwrap();
    wait_until("second dispatch", || recording.len() == 2).await;
    assert_eq!(recording.sent.lock()[1].event.count, 2);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn scheduled_event_mentions_label_owner() {
    scenario("checkout-7d9f8-abcde", "payments").await;
}

#[tokio::test]
async fn scheduled_event_falls_back_to_default_mention() {
    scenario("unlabelled", "here").await;
}

#[tokio::test]
async fn old_events_are_ignored_at_startup() {
    let config = config(&[]);
    let (source, signals) = MemorySource::new();
    let recording = Arc::new(Recording::default());
    let start = Utc::now();

    let dispatcher = build_dispatcher(&config).with_channel(recording.clone());
    let watcher = build_watcher(&config, source.clone(), dispatcher).with_clock(Arc::new(ManualClock::new(start)));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));

    source.set_events(vec![
        scheduled("old", 1, start - chrono::Duration::minutes(2)),
        Event::new("y", "Pulled", start - chrono::Duration::seconds(30))
            .with_involved_object("Pod", "recent")
            .with_namespace("default"),
    ]);
    signals.unbounded_send(Ok(WatchSignal::new(SignalKind::Added))).unwrap();
    wait_until("dispatch", || recording.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(recording.len(), 1);
    assert_eq!(recording.sent.lock()[0].event.id, "y");

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn threshold_drops_quiet_levels() {
    let config = config(&["--notification-level", "WARN"]);
    let (source, signals) = MemorySource::new();
    let recording = Arc::new(Recording::default());
    let start = Utc::now();

    let dispatcher = build_dispatcher(&config).with_channel(recording.clone());
    let watcher = build_watcher(&config, source.clone(), dispatcher).with_clock(Arc::new(ManualClock::new(start)));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(shutdown.clone()));

    source.set_events(vec![
        Event::new("a", "Scheduled", start).with_involved_object("Pod", "p"),
        Event::new("b", "BackOff", start).with_involved_object("Pod", "p"),
        Event::new("c", "SomethingNew", start).with_involved_object("Pod", "p"),
    ]);
    signals.unbounded_send(Ok(WatchSignal::new(SignalKind::Added))).unwrap();
    wait_until("dispatches", || recording.len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ids: Vec<String> = recording.sent.lock().iter().map(|n| n.event.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["b", "c"]);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn serve_fails_when_the_watch_ends() {
    let (source, signals) = MemorySource::new();
    drop(signals);

    let err = serve(config(&[]), source, CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.to_string(), "watcher stopped");
    assert_eq!(err.root_cause().to_string(), "event watching has ended");
}

#[tokio::test]
async fn serve_stops_cleanly_on_cancel() {
    let (source, _signals) = MemorySource::new();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(config(&[]), source, shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    handle.await.unwrap().unwrap();
}
