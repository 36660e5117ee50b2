//! Event types for the TeachTune event system
//!
//! Provides shared event definitions and the EventBus used by the agenda
//! service and anything displaying its output.

mod alert_types;

pub use alert_types::{AlertSeverity, ReconcileTrigger};

use crate::model::Attendance;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// TeachTune event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TtEvent {
    /// Student registered or edited
    StudentSaved {
        student_id: Uuid,
        active: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Future auto-generated lessons were purged and regenerated
    ScheduleReconciled {
        student_id: Uuid,
        trigger: ReconcileTrigger,
        /// Future auto-generated lessons deleted
        removed: u64,
        /// Lessons inserted by the new generation run
        created: usize,
        /// Group id of the new run (None when nothing was generated)
        recurrence_group_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Single lesson booked by hand
    LessonBooked {
        lesson_id: Uuid,
        student_id: Uuid,
        scheduled_at: chrono::DateTime<chrono::Utc>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attendance, notes or repertoire changed
    LessonUpdated {
        lesson_id: Uuid,
        attendance: Attendance,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    LessonDeleted {
        lesson_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A pending lesson starts within the alert window
    ///
    /// `lesson_id` doubles as the dedupe key for notification surfaces.
    UpcomingLesson {
        lesson_id: Uuid,
        student_id: Uuid,
        student_name: Option<String>,
        message: String,
        severity: AlertSeverity,
        minutes_until: i64,
        scheduled_at: chrono::DateTime<chrono::Utc>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TtEvent {
    /// Event name for logs and client-side routing
    pub fn event_type(&self) -> &'static str {
        match self {
            TtEvent::StudentSaved { .. } => "StudentSaved",
            TtEvent::ScheduleReconciled { .. } => "ScheduleReconciled",
            TtEvent::LessonBooked { .. } => "LessonBooked",
            TtEvent::LessonUpdated { .. } => "LessonUpdated",
            TtEvent::LessonDeleted { .. } => "LessonDeleted",
            TtEvent::UpcomingLesson { .. } => "UpcomingLesson",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers see a `Lagged` error instead of stalling producers.
///
/// ```
/// use teachtune_common::events::{EventBus, TtEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit(TtEvent::LessonDeleted {
///     lesson_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TtEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TtEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TtEvent) -> Result<usize, broadcast::error::SendError<TtEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TtEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
