//! Client-side refresh loop for the traffic dashboard.
//!
//! A mounted poller fetches once immediately and again on every tick of a
//! fixed interval until it is unmounted. Each tick's fetch runs as its own
//! task and writes its outcome when it resolves, so a slow response from an
//! earlier tick can overwrite a faster later one (last write wins). Results
//! that resolve after unmount are dropped.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::TRAFFIC_FETCH_FAILED;
use crate::snapshot::TrafficSnapshot;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to reach traffic service: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{}", TRAFFIC_FETCH_FAILED)]
    Status(StatusCode),
    #[error("Invalid traffic data: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Anything that can produce a fresh snapshot for the dashboard.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<TrafficSnapshot, FetchError>> + Send;
}

/// Fetches the proxy's `/api/traffic` endpoint, bypassing caches.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    http: Client,
    endpoint: Url,
}

impl HttpSnapshotSource {
    pub fn new(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }
}

impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<TrafficSnapshot, FetchError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        response.json().await.map_err(FetchError::Decode)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Ready {
        snapshot: TrafficSnapshot,
        last_update: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

/// The state a fetch outcome moves the view into.
pub fn transition(
    result: Result<TrafficSnapshot, FetchError>,
    now: DateTime<Utc>,
) -> ViewState {
    match result {
        Ok(snapshot) => ViewState::Ready {
            snapshot,
            last_update: now,
        },
        Err(err) => ViewState::Error {
            message: err.to_string(),
        },
    }
}

pub struct PollingClient<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: SnapshotSource> PollingClient<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source: Arc::new(source),
            interval,
        }
    }

    /// Starts polling. Must be called from within a tokio runtime.
    pub fn mount(self) -> MountedPoller {
        let (tx, rx) = watch::channel(ViewState::Loading);
        let tx = Arc::new(tx);
        let cancel = CancellationToken::new();

        let source = self.source;
        let interval = self.interval;
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        spawn_fetch(source.clone(), tx.clone(), loop_cancel.clone());
                    }
                }
            }
            tracing::debug!("traffic poller stopped");
        });

        MountedPoller {
            state: rx,
            cancel,
            task: Some(task),
        }
    }
}

fn spawn_fetch<S: SnapshotSource>(
    source: Arc<S>,
    tx: Arc<watch::Sender<ViewState>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let result = source.fetch().await;
        if cancel.is_cancelled() {
            return;
        }
        if let Err(err) = &result {
            tracing::warn!("traffic refresh failed: {err}");
        }
        tx.send_replace(transition(result, Utc::now()));
    });
}

/// Handle to a running poller. Dropping it unmounts.
pub struct MountedPoller {
    state: watch::Receiver<ViewState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MountedPoller {
    pub fn current(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancels the refresh timer. Fetches already in flight are left to
    /// finish but their results are discarded.
    pub fn unmount(&self) {
        self.cancel.cancel();
    }

    /// Unmounts and waits for the timer task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!("traffic poller task failed: {err}");
            }
        }
    }
}

impl Drop for MountedPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::reading;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct ScriptedSource {
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
        delays: Arc<Mutex<HashMap<usize, Duration>>>,
    }

    impl ScriptedSource {
        fn delay_call(&self, call: usize, delay: Duration) {
            self.delays.lock().unwrap().insert(call, delay);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn fetch(&self) -> impl Future<Output = Result<TrafficSnapshot, FetchError>> + Send {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.lock().unwrap().get(&call).copied();
            let failing = self.failing.load(Ordering::SeqCst);
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if failing {
                    return Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR));
                }
                Ok(TrafficSnapshot {
                    timestamp: format!("call-{call}"),
                    cameras: vec![reading("2704")],
                })
            }
        }
    }

    fn snapshot_timestamp(state: &ViewState) -> Option<&str> {
        match state {
            ViewState::Ready { snapshot, .. } => Some(snapshot.timestamp.as_str()),
            _ => None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_on_mount_then_every_interval_until_unmounted() {
        let source = ScriptedSource::default();
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();

        settle().await;
        assert_eq!(source.calls(), 1);
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-0"));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(source.calls(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(source.calls(), 2);
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-1"));

        poller.unmount();
        assert!(!poller.is_mounted());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn starts_loading_and_never_returns_to_loading() {
        let source = ScriptedSource::default();
        source.delay_call(0, Duration::from_secs(2));
        source.delay_call(1, Duration::from_secs(2));
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();

        assert!(poller.current().is_loading());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-0"));

        // Second tick is in flight for two seconds; the previous snapshot stays visible.
        tokio::time::sleep(Duration::from_secs(18)).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-0"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-1"));
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_shows_generic_error_and_recovers_on_next_success() {
        let source = ScriptedSource::default();
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();
        settle().await;
        assert!(matches!(poller.current(), ViewState::Ready { .. }));

        source.failing.store(true, Ordering::SeqCst);
        tokio::time::sleep(DEFAULT_REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(
            poller.current(),
            ViewState::Error {
                message: TRAFFIC_FETCH_FAILED.to_string()
            }
        );

        source.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(DEFAULT_REFRESH_INTERVAL).await;
        settle().await;
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-2"));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_earlier_response_overwrites_newer_one() {
        let source = ScriptedSource::default();
        source.delay_call(0, Duration::from_secs(30));
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-1"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(snapshot_timestamp(&poller.current()), Some("call-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn results_arriving_after_unmount_are_discarded() {
        let source = ScriptedSource::default();
        source.delay_call(0, Duration::from_secs(5));
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();
        let mut updates = poller.subscribe();

        settle().await;
        assert_eq!(source.calls(), 1);
        poller.unmount();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(poller.current().is_loading());
        assert!(!updates.has_changed().unwrap_or(false));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_timer() {
        let source = ScriptedSource::default();
        let poller = PollingClient::new(source.clone(), DEFAULT_REFRESH_INTERVAL).mount();
        settle().await;
        drop(poller);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn transition_records_update_time() {
        let now = Utc::now();
        let state = transition(
            Ok(TrafficSnapshot {
                timestamp: "2025-11-06T23:29:52+08:00".to_string(),
                cameras: vec![],
            }),
            now,
        );
        match state {
            ViewState::Ready { last_update, .. } => assert_eq!(last_update, now),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_source_maps_error_status_to_generic_message() {
        use axum::routing::get;
        use axum::Router;

        let app = Router::new().route(
            "/api/traffic",
            get(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": TRAFFIC_FETCH_FAILED })),
                )
            }),
        );
        let Some(addr) = crate::test_support::spawn_server(app).await else {
            return;
        };
        let endpoint = Url::parse(&format!("http://{addr}/api/traffic")).unwrap();
        let source = HttpSnapshotSource::new(Client::new(), endpoint);

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Status(status) if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.to_string(), TRAFFIC_FETCH_FAILED);
    }

    #[tokio::test]
    async fn http_source_decodes_snapshot() {
        use axum::routing::get;
        use axum::Router;

        let app = Router::new().route(
            "/api/traffic",
            get(|| async {
                axum::Json(TrafficSnapshot {
                    timestamp: "2025-11-06T23:29:52+08:00".to_string(),
                    cameras: vec![reading("4713")],
                })
            }),
        );
        let Some(addr) = crate::test_support::spawn_server(app).await else {
            return;
        };
        let endpoint = Url::parse(&format!("http://{addr}/api/traffic")).unwrap();
        let snapshot = HttpSnapshotSource::new(Client::new(), endpoint)
            .fetch()
            .await
            .unwrap();
        assert_eq!(snapshot.cameras[0].camera_id, "4713");
    }
}
