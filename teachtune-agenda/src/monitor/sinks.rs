//! Alert delivery channels

use super::LessonAlert;
use std::io::Write;
use teachtune_common::events::EventBus;
use teachtune_common::{Error, Result};
use tracing::info;

/// Kind of surface an alert is delivered to
///
/// Only `InApp` delivery decides whether an alert counts as raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    /// Event bus consumed by the teacher-facing display
    InApp,
    /// Sound cue
    Audible,
    /// Operating-system or log level notification
    System,
}

/// Receives raised alerts
///
/// Implementations must not block: delivery runs inside the scan.
pub trait AlertSink: Send + Sync {
    fn channel(&self) -> DeliveryChannel;

    fn name(&self) -> &str;

    fn deliver(&self, alert: &LessonAlert) -> Result<()>;
}

/// Publishes `TtEvent::UpcomingLesson` on the event bus
pub struct EventBusSink {
    bus: EventBus,
}

impl EventBusSink {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl AlertSink for EventBusSink {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::InApp
    }

    fn name(&self) -> &str {
        "event-bus"
    }

    fn deliver(&self, alert: &LessonAlert) -> Result<()> {
        self.bus
            .emit(alert.to_event())
            .map(|_| ())
            .map_err(|_| Error::Delivery("no in-app listener subscribed".to_string()))
    }
}

/// Writes the alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::System
    }

    fn name(&self) -> &str {
        "tracing"
    }

    fn deliver(&self, alert: &LessonAlert) -> Result<()> {
        info!(
            target: "teachtune::alerts",
            lesson_id = %alert.lesson_id,
            minutes_until = alert.minutes_until,
            "{}",
            alert.message
        );
        Ok(())
    }
}

/// Rings the terminal bell on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBellSink;

impl AlertSink for TerminalBellSink {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Audible
    }

    fn name(&self) -> &str {
        "terminal-bell"
    }

    fn deliver(&self, _alert: &LessonAlert) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| Error::Delivery(format!("terminal bell: {}", e)))
    }
}
