//! Viewport synchronization.
//!
//! A single actor task owns the current viewport, the fetch generation and
//! the published spot set. Map movement is debounced; a box that matches
//! the last fetched one within epsilon is suppressed; every fetch is tagged
//! with a generation and only the newest generation may publish.
//!
//! ```text
//! Idle --moved--> Debouncing --timer--> Fetching --done--> Idle
//!                     ^                     |
//!                     +-------moved---------+
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use mapch_config::MapConfig;
use mapch_model::{BoundingBox, Spot, ViewportSnapshot};

use crate::infra::api::{ApiError, ApiResult, SpotSource};
use crate::infra::events::SpotEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSettings {
    pub debounce: Duration,
    pub result_limit: u32,
    pub epsilon: f64,
}

impl From<&MapConfig> for ViewportSettings {
    fn from(config: &MapConfig) -> Self {
        Self {
            debounce: config.debounce,
            result_limit: config.result_limit,
            epsilon: config.near_identical_epsilon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Debouncing,
    Fetching,
}

/// Diagnostics for the most recent failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

impl From<&ApiError> for FetchError {
    fn from(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Published controller state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewportState {
    pub phase: SyncPhase,
    pub generation: u64,
    pub spots: Vec<Spot>,
    /// Box of the most recently started fetch.
    pub bounds: Option<BoundingBox>,
    pub loading: bool,
    pub last_error: Option<FetchError>,
}

enum Command {
    ViewportChanged(ViewportSnapshot),
    ForceRefresh(Option<ViewportSnapshot>),
    FetchCompleted {
        generation: u64,
        result: ApiResult<Vec<Spot>>,
    },
}

/// Cloneable front door to a running controller. The actor stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct ViewportHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ViewportState>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ViewportChanged(snapshot) => {
                f.debug_tuple("ViewportChanged").field(snapshot).finish()
            }
            Command::ForceRefresh(snapshot) => {
                f.debug_tuple("ForceRefresh").field(snapshot).finish()
            }
            Command::FetchCompleted { generation, result } => f
                .debug_struct("FetchCompleted")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

impl ViewportHandle {
    /// Report the visible region. Returns `false` if the controller is gone.
    pub fn viewport_changed(&self, snapshot: ViewportSnapshot) -> bool {
        self.commands
            .send(Command::ViewportChanged(snapshot))
            .is_ok()
    }

    /// Refetch even if the box matches the last fetch. Without a snapshot
    /// the last reported viewport is used.
    pub fn force_refresh(&self, snapshot: Option<ViewportSnapshot>) -> bool {
        self.commands.send(Command::ForceRefresh(snapshot)).is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewportState> {
        self.state.clone()
    }

    pub fn current(&self) -> ViewportState {
        self.state.borrow().clone()
    }
}

struct PendingFetch {
    bounds: BoundingBox,
    deadline: Instant,
}

enum SpotSignal {
    Event(SpotEvent),
    Missed(u64),
    Closed,
}

pub struct ViewportSyncController {
    source: Arc<dyn SpotSource>,
    settings: ViewportSettings,
    state: watch::Sender<ViewportState>,
    mailbox: mpsc::WeakUnboundedSender<Command>,
    generation: u64,
    last_fetched: Option<BoundingBox>,
    last_viewport: Option<ViewportSnapshot>,
    pending: Option<PendingFetch>,
    /// A fetch for the current generation has not completed yet.
    outstanding: bool,
}

impl fmt::Debug for ViewportSyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportSyncController")
            .field("settings", &self.settings)
            .field("generation", &self.generation)
            .field("last_fetched", &self.last_fetched)
            .field("pending", &self.pending.is_some())
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

impl ViewportSyncController {
    /// Start the actor. When `spot_events` is given, created, updated and
    /// deleted spots trigger a refresh of the last viewport.
    pub fn spawn(
        source: Arc<dyn SpotSource>,
        settings: ViewportSettings,
        spot_events: Option<broadcast::Receiver<SpotEvent>>,
    ) -> (ViewportHandle, JoinHandle<()>) {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ViewportState::default());
        let controller = Self {
            source,
            settings,
            state,
            mailbox: commands.downgrade(),
            generation: 0,
            last_fetched: None,
            last_viewport: None,
            pending: None,
            outstanding: false,
        };
        let task = tokio::spawn(controller.run(mailbox, spot_events));
        let handle = ViewportHandle {
            commands,
            state: state_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut mailbox: mpsc::UnboundedReceiver<Command>,
        mut spot_events: Option<broadcast::Receiver<SpotEvent>>,
    ) {
        loop {
            let deadline = self.pending.as_ref().map(|p| p.deadline);
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.fire(),
                signal = next_spot_signal(&mut spot_events) => match signal {
                    SpotSignal::Event(event) => self.on_spot_event(&event),
                    SpotSignal::Missed(skipped) => {
                        warn!(
                            "[ViewportSync] missed {skipped} spot events, \
                             refreshing"
                        );
                        self.force_refresh(None);
                    }
                    SpotSignal::Closed => spot_events = None,
                },
            }
        }
        debug!("[ViewportSync] all handles dropped, stopping");
    }

    fn handle(&mut self, command: Command) {
        trace!("[ViewportSync] {command:?}");
        match command {
            Command::ViewportChanged(snapshot) => {
                self.viewport_changed(snapshot);
            }
            Command::ForceRefresh(snapshot) => self.force_refresh(snapshot),
            Command::FetchCompleted { generation, result } => {
                self.fetch_completed(generation, result);
            }
        }
    }

    fn is_suppressed(&self, bounds: &BoundingBox) -> bool {
        self.last_fetched.is_some_and(|last| {
            last.is_near_identical(bounds, self.settings.epsilon)
        })
    }

    fn viewport_changed(&mut self, snapshot: ViewportSnapshot) {
        self.last_viewport = Some(snapshot);
        let bounds = snapshot.bounding_box();

        if self.is_suppressed(&bounds) {
            trace!("[ViewportSync] {bounds:?} matches last fetch, suppressed");
            self.pending = None;
        } else {
            self.pending = Some(PendingFetch {
                bounds,
                deadline: Instant::now() + self.settings.debounce,
            });
        }
        self.publish_phase();
    }

    fn force_refresh(&mut self, snapshot: Option<ViewportSnapshot>) {
        self.last_fetched = None;
        match snapshot.or(self.last_viewport) {
            Some(snapshot) => self.viewport_changed(snapshot),
            None => {
                debug!("[ViewportSync] refresh before any viewport, ignored");
            }
        }
    }

    fn on_spot_event(&mut self, event: &SpotEvent) {
        match event {
            SpotEvent::Created { .. }
            | SpotEvent::Updated { .. }
            | SpotEvent::Deleted { .. } => {
                debug!("[ViewportSync] {event:?}, refreshing");
                self.force_refresh(None);
            }
            SpotEvent::PhotosUpdated { .. } => {}
        }
    }

    /// Debounce timer elapsed: start a new generation unless the box has
    /// been fetched in the meantime.
    fn fire(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if self.is_suppressed(&pending.bounds) {
            self.publish_phase();
            return;
        }

        self.generation += 1;
        self.last_fetched = Some(pending.bounds);
        self.outstanding = true;
        let generation = self.generation;
        let bounds = pending.bounds;
        debug!("[ViewportSync] fetch #{generation} for {bounds:?}");

        self.state.send_modify(|state| {
            state.generation = generation;
            state.bounds = Some(bounds);
        });
        self.publish_phase();

        let source = Arc::clone(&self.source);
        let mailbox = self.mailbox.clone();
        let limit = self.settings.result_limit;
        tokio::spawn(async move {
            let result = source.spots_in_bounds(bounds, limit).await;
            if let Some(mailbox) = mailbox.upgrade() {
                let _ = mailbox
                    .send(Command::FetchCompleted { generation, result });
            }
        });
    }

    fn fetch_completed(
        &mut self,
        generation: u64,
        result: ApiResult<Vec<Spot>>,
    ) {
        if generation != self.generation {
            debug!(
                "[ViewportSync] discarding fetch #{generation}, current is \
                 #{}",
                self.generation
            );
            return;
        }
        self.outstanding = false;
        match result {
            Ok(spots) => {
                debug!(
                    "[ViewportSync] fetch #{generation} returned {} spots",
                    spots.len()
                );
                self.state.send_modify(|state| {
                    state.spots = spots;
                    state.last_error = None;
                });
            }
            Err(err) => {
                warn!("[ViewportSync] fetch #{generation} failed: {err}");
                let error = FetchError::from(&err);
                self.state
                    .send_modify(|state| state.last_error = Some(error));
            }
        }
        self.publish_phase();
    }

    fn publish_phase(&self) {
        let phase = if self.outstanding {
            SyncPhase::Fetching
        } else if self.pending.is_some() {
            SyncPhase::Debouncing
        } else {
            SyncPhase::Idle
        };
        let loading = self.outstanding;
        self.state.send_if_modified(|state| {
            let changed = state.phase != phase || state.loading != loading;
            state.phase = phase;
            state.loading = loading;
            changed
        });
    }
}

async fn next_spot_signal(
    events: &mut Option<broadcast::Receiver<SpotEvent>>,
) -> SpotSignal {
    let Some(events) = events else {
        return std::future::pending().await;
    };
    match events.recv().await {
        Ok(event) => SpotSignal::Event(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            SpotSignal::Missed(skipped)
        }
        Err(broadcast::error::RecvError::Closed) => SpotSignal::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::executor::RequestFailure;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<BoundingBox>>,
        fail: bool,
    }

    #[async_trait]
    impl SpotSource for Recording {
        async fn spots_in_bounds(
            &self,
            bounds: BoundingBox,
            _limit: u32,
        ) -> ApiResult<Vec<Spot>> {
            self.calls.lock().push(bounds);
            if self.fail {
                Err(RequestFailure::Status {
                    status: 503,
                    body: "down".into(),
                }
                .into())
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn settings() -> ViewportSettings {
        ViewportSettings {
            debounce: Duration::from_millis(500),
            result_limit: 800,
            epsilon: 0.0005,
        }
    }

    fn tokyo() -> ViewportSnapshot {
        ViewportSnapshot::new(35.68, 139.76, 0.1, 0.1)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(600)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_fetch_updates_state() {
        let source = Arc::new(Recording::default());
        let (handle, _task) =
            ViewportSyncController::spawn(source.clone(), settings(), None);

        handle.viewport_changed(tokyo());
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.current().phase, SyncPhase::Debouncing);

        settle().await;
        let state = handle.current();
        assert_eq!(source.calls.lock().len(), 1);
        assert_eq!(state.generation, 1);
        assert_eq!(state.phase, SyncPhase::Idle);
        assert!(!state.loading);
        assert_eq!(state.bounds, Some(tokyo().bounding_box()));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_kept_as_diagnostics() {
        let source = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let (handle, _task) =
            ViewportSyncController::spawn(source, settings(), None);

        handle.viewport_changed(tokyo());
        settle().await;
        let state = handle.current();
        assert_eq!(state.phase, SyncPhase::Idle);
        let error = state.last_error.expect("error recorded");
        assert_eq!(error.status, Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_bypasses_suppression() {
        let source = Arc::new(Recording::default());
        let (handle, _task) =
            ViewportSyncController::spawn(source.clone(), settings(), None);

        handle.viewport_changed(tokyo());
        settle().await;
        handle.viewport_changed(tokyo());
        settle().await;
        assert_eq!(source.calls.lock().len(), 1);

        handle.force_refresh(None);
        settle().await;
        assert_eq!(source.calls.lock().len(), 2);
        assert_eq!(handle.current().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spot_events_refresh_last_viewport() {
        let source = Arc::new(Recording::default());
        let (events, rx) = broadcast::channel(8);
        let (handle, _task) = ViewportSyncController::spawn(
            source.clone(),
            settings(),
            Some(rx),
        );

        handle.viewport_changed(tokyo());
        settle().await;
        events
            .send(SpotEvent::Deleted {
                id: mapch_model::SpotId(7),
            })
            .expect("subscriber");
        settle().await;
        assert_eq!(source.calls.lock().len(), 2);

        events
            .send(SpotEvent::PhotosUpdated {
                id: mapch_model::SpotId(7),
                paths: vec![],
            })
            .expect("subscriber");
        settle().await;
        assert_eq!(source.calls.lock().len(), 2);
    }
}
