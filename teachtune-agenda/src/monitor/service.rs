//! Background runner for the upcoming-lesson monitor
//!
//! Two independent tasks share an agenda snapshot:
//! - refresh: reloads `[now, now + refresh_window]` from the store
//! - scan: runs [`UpcomingLessonMonitor::scan`] over the snapshot
//!
//! Both run once immediately on start, then on their own interval. The scan
//! never waits on the database.

use super::UpcomingLessonMonitor;
use crate::db::{AgendaEntry, ScheduleStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use teachtune_common::db::RuntimeSettings;
use teachtune_common::{Clock, Result};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Agenda entries the scan reads
pub type AgendaSnapshot = Arc<RwLock<Vec<AgendaEntry>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub scan_interval: Duration,
    pub refresh_interval: Duration,
    /// How far ahead the snapshot reaches
    pub refresh_window: chrono::Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

impl From<&RuntimeSettings> for MonitorConfig {
    /// The snapshot spans at least one day and at least twice the lookahead
    fn from(settings: &RuntimeSettings) -> Self {
        let day = chrono::Duration::days(1);
        let refresh_window = settings
            .alert_lookahead_minutes
            .checked_mul(2)
            .and_then(chrono::Duration::try_minutes)
            .map_or(day, |twice| twice.max(day));

        Self {
            scan_interval: settings.alert_scan_interval,
            refresh_interval: settings.agenda_refresh_interval,
            refresh_window,
        }
    }
}

pub struct MonitorService {
    monitor: UpcomingLessonMonitor,
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    snapshot: AgendaSnapshot,
}

impl MonitorService {
    pub fn new(
        monitor: UpcomingLessonMonitor,
        store: Arc<dyn ScheduleStore>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            monitor,
            store,
            clock,
            config,
            snapshot: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn snapshot(&self) -> AgendaSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Spawn the refresh and scan tasks
    ///
    /// The first refresh completes before the first scan runs.
    pub async fn start(self, cancel: CancellationToken) -> MonitorHandle {
        let Self {
            mut monitor,
            store,
            clock,
            config,
            snapshot,
        } = self;

        if let Err(e) = refresh_snapshot(store.as_ref(), clock.as_ref(), &config, &snapshot).await {
            warn!("Initial agenda load failed: {}", e);
        }
        {
            let entries = snapshot.read().await;
            monitor.scan(&entries);
        }

        info!(
            "Upcoming-lesson monitor started (scan every {:?}, refresh every {:?})",
            config.scan_interval, config.refresh_interval
        );

        let refresh = tokio::spawn(refresh_loop(
            store,
            clock,
            config.clone(),
            Arc::clone(&snapshot),
            cancel.clone(),
        ));
        let scan = tokio::spawn(scan_loop(monitor, config.scan_interval, snapshot, cancel.clone()));

        MonitorHandle {
            cancel,
            refresh,
            scan,
        }
    }
}

/// Reload the snapshot from the store
pub async fn refresh_snapshot(
    store: &dyn ScheduleStore,
    clock: &dyn Clock,
    config: &MonitorConfig,
    snapshot: &AgendaSnapshot,
) -> Result<usize> {
    let now = clock.now();
    let end = now.checked_add_signed(config.refresh_window).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let entries = store.list_agenda(now, end).await?;
    let count = entries.len();
    *snapshot.write().await = entries;

    debug!("Agenda snapshot refreshed: {} lessons", count);
    Ok(count)
}

async fn refresh_loop(
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    snapshot: AgendaSnapshot,
    cancel: CancellationToken,
) {
    let mut timer = tokio::time::interval(config.refresh_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Initial refresh already ran in start()
    timer.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                if let Err(e) = refresh_snapshot(store.as_ref(), clock.as_ref(), &config, &snapshot).await {
                    warn!("Agenda refresh failed, keeping previous snapshot: {}", e);
                }
            }
        }
    }

    debug!("Agenda refresh task stopped");
}

async fn scan_loop(
    mut monitor: UpcomingLessonMonitor,
    scan_interval: Duration,
    snapshot: AgendaSnapshot,
    cancel: CancellationToken,
) -> UpcomingLessonMonitor {
    let mut timer = tokio::time::interval(scan_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                let entries = snapshot.read().await;
                monitor.scan(&entries);
            }
        }
    }

    debug!("Upcoming-lesson scan task stopped");
    monitor
}

/// Running monitor tasks
pub struct MonitorHandle {
    cancel: CancellationToken,
    refresh: JoinHandle<()>,
    scan: JoinHandle<UpcomingLessonMonitor>,
}

impl MonitorHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop both tasks and hand back the monitor with its notified set
    pub async fn shutdown(self) -> Option<UpcomingLessonMonitor> {
        self.cancel.cancel();

        if let Err(e) = self.refresh.await {
            warn!("Agenda refresh task ended abnormally: {}", e);
        }
        match self.scan.await {
            Ok(monitor) => {
                info!(
                    "Upcoming-lesson monitor stopped ({} lessons notified)",
                    monitor.notified().len()
                );
                Some(monitor)
            }
            Err(e) => {
                warn!("Upcoming-lesson scan task ended abnormally: {}", e);
                None
            }
        }
    }
}
