//! Upcoming-lesson monitor
//!
//! Scans an agenda snapshot and raises one alert per pending lesson that
//! starts within the lookahead window. The monitor never mutates lessons.
//!
//! **At-most-once:** a lesson id enters the [`NotifiedSet`] when its alert is
//! raised and is never alerted again by the same monitor. The set lives as
//! long as the monitor; a restart starts with an empty set.

pub mod service;
pub mod sinks;

pub use service::{MonitorConfig, MonitorHandle, MonitorService};
pub use sinks::{AlertSink, DeliveryChannel, EventBusSink, TerminalBellSink, TracingSink};

use crate::db::AgendaEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use teachtune_common::db::settings::MAX_ALERT_LOOKAHEAD_MINUTES;
use teachtune_common::events::{AlertSeverity, TtEvent};
use teachtune_common::Clock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default alert window in minutes
pub const DEFAULT_LOOKAHEAD_MINUTES: i64 = 15;

/// Lesson ids already alerted
#[derive(Debug, Clone, Default)]
pub struct NotifiedSet {
    ids: HashSet<Uuid>,
}

impl NotifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, lesson_id: &Uuid) -> bool {
        self.ids.contains(lesson_id)
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, lesson_id: Uuid) -> bool {
        self.ids.insert(lesson_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One raised upcoming-lesson alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonAlert {
    /// Also the dedupe key for every notification surface
    pub lesson_id: Uuid,
    pub student_id: Uuid,
    pub student_name: Option<String>,
    pub message: String,
    pub severity: AlertSeverity,
    /// Whole minutes until start, rounded up
    pub minutes_until: i64,
    pub scheduled_at: DateTime<Utc>,
    pub raised_at: DateTime<Utc>,
}

impl LessonAlert {
    fn new(entry: &AgendaEntry, minutes_until: i64, raised_at: DateTime<Utc>) -> Self {
        let lesson = &entry.lesson;
        Self {
            lesson_id: lesson.id,
            student_id: lesson.student_id,
            student_name: entry.student_name.clone(),
            message: alert_message(entry.student_name.as_deref(), minutes_until),
            severity: AlertSeverity::Warning,
            minutes_until,
            scheduled_at: lesson.scheduled_at,
            raised_at,
        }
    }

    pub fn dedupe_key(&self) -> Uuid {
        self.lesson_id
    }

    pub fn to_event(&self) -> TtEvent {
        TtEvent::UpcomingLesson {
            lesson_id: self.lesson_id,
            student_id: self.student_id,
            student_name: self.student_name.clone(),
            message: self.message.clone(),
            severity: self.severity,
            minutes_until: self.minutes_until,
            scheduled_at: self.scheduled_at,
            timestamp: self.raised_at,
        }
    }
}

fn alert_message(student_name: Option<&str>, minutes: i64) -> String {
    let who = student_name.unwrap_or("your student");
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!("Your lesson with {} starts in {} {}!", who, minutes, unit)
}

/// Fractional minutes from `now` until `at`
fn minutes_between(now: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - now).num_milliseconds() as f64 / 60_000.0
}

pub struct UpcomingLessonMonitor {
    notified: NotifiedSet,
    clock: Arc<dyn Clock>,
    lookahead_minutes: i64,
    sinks: Vec<Box<dyn AlertSink>>,
}

impl UpcomingLessonMonitor {
    /// `lookahead_minutes` is clamped to `0..=MAX_ALERT_LOOKAHEAD_MINUTES`
    pub fn new(notified: NotifiedSet, clock: Arc<dyn Clock>, lookahead_minutes: i64) -> Self {
        let clamped = lookahead_minutes.clamp(0, MAX_ALERT_LOOKAHEAD_MINUTES);
        if clamped != lookahead_minutes {
            warn!(
                "Alert lookahead of {} minutes clamped to {}",
                lookahead_minutes, clamped
            );
        }

        Self {
            notified,
            clock,
            lookahead_minutes: clamped,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn notified(&self) -> &NotifiedSet {
        &self.notified
    }

    pub fn lookahead_minutes(&self) -> i64 {
        self.lookahead_minutes
    }

    /// Raise alerts for entries entering the window
    ///
    /// Returns the alerts recorded as notified during this scan.
    pub fn scan(&mut self, entries: &[AgendaEntry]) -> Vec<LessonAlert> {
        let now = self.clock.now();
        let lookahead = self.lookahead_minutes as f64;
        let mut raised = Vec::new();

        for entry in entries {
            let lesson = &entry.lesson;
            if !lesson.attendance.is_pending() || self.notified.contains(&lesson.id) {
                continue;
            }

            let minutes_until = minutes_between(now, lesson.scheduled_at);
            if minutes_until <= 0.0 || minutes_until > lookahead {
                continue;
            }

            // In (0, lookahead], so the rounded value fits the lookahead
            let minutes_until = minutes_until.ceil() as i64;
            debug_assert!((1..=self.lookahead_minutes).contains(&minutes_until));

            let alert = LessonAlert::new(entry, minutes_until, now);
            if self.deliver(&alert) {
                self.notified.insert(lesson.id);
                raised.push(alert);
            }
        }

        debug!(
            "Scanned {} agenda entries: {} alerts raised, {} notified in total",
            entries.len(),
            raised.len(),
            self.notified.len()
        );
        raised
    }

    /// Deliver to every sink; true when all in-app sinks succeeded
    fn deliver(&self, alert: &LessonAlert) -> bool {
        let mut in_app_ok = true;

        for sink in &self.sinks {
            if let Err(e) = sink.deliver(alert) {
                warn!(
                    "Alert for lesson {} not delivered via {}: {}",
                    alert.lesson_id,
                    sink.name(),
                    e
                );
                if sink.channel() == DeliveryChannel::InApp {
                    in_app_ok = false;
                }
            }
        }

        in_app_ok
    }
}
