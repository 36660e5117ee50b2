//! Runtime settings stored in the `settings` table
//!
//! Missing or NULL values are written back with built-in defaults on
//! startup, so the table always documents the values in effect.

use crate::Result;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};

pub const HORIZON_MONTHS: &str = "horizon_months";
pub const ALERT_LOOKAHEAD_MINUTES: &str = "alert_lookahead_minutes";
pub const ALERT_SCAN_INTERVAL_SECS: &str = "alert_scan_interval_secs";
pub const AGENDA_REFRESH_INTERVAL_SECS: &str = "agenda_refresh_interval_secs";
pub const AGENDA_DEFAULT_DAYS: &str = "agenda_default_days";

const DEFAULT_HORIZON_MONTHS: u32 = 6;
const DEFAULT_ALERT_LOOKAHEAD_MINUTES: i64 = 15;
const DEFAULT_ALERT_SCAN_INTERVAL_SECS: u64 = 30;
const DEFAULT_AGENDA_REFRESH_INTERVAL_SECS: u64 = 60;
const DEFAULT_AGENDA_DEFAULT_DAYS: i64 = 30;

/// Longest accepted generation horizon (ten years)
pub const MAX_HORIZON_MONTHS: u32 = 120;
/// Longest accepted alert window (one day)
pub const MAX_ALERT_LOOKAHEAD_MINUTES: i64 = 1440;
/// Longest accepted scan or refresh period (one day)
pub const MAX_INTERVAL_SECS: u64 = 86_400;
/// Longest accepted agenda listing (ten years)
pub const MAX_AGENDA_DAYS: i64 = 3650;

/// Initialize or repair default settings
pub(crate) async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, HORIZON_MONTHS, &DEFAULT_HORIZON_MONTHS.to_string()).await?;
    ensure_setting(pool, ALERT_LOOKAHEAD_MINUTES, &DEFAULT_ALERT_LOOKAHEAD_MINUTES.to_string()).await?;
    ensure_setting(pool, ALERT_SCAN_INTERVAL_SECS, &DEFAULT_ALERT_SCAN_INTERVAL_SECS.to_string()).await?;
    ensure_setting(
        pool,
        AGENDA_REFRESH_INTERVAL_SECS,
        &DEFAULT_AGENDA_REFRESH_INTERVAL_SECS.to_string(),
    )
    .await?;
    ensure_setting(pool, AGENDA_DEFAULT_DAYS, &DEFAULT_AGENDA_DEFAULT_DAYS.to_string()).await?;
    Ok(())
}

/// Insert `key` with `default` unless a non-NULL value already exists
async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    debug!("Setting {} = {}", key, value);
    Ok(())
}

/// Scheduling settings read at startup
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Months of lessons pre-generated per recurrence
    pub horizon_months: u32,
    /// Alert window before a lesson starts, in minutes
    pub alert_lookahead_minutes: i64,
    /// Period of the upcoming-lesson scan
    pub alert_scan_interval: Duration,
    /// Period of the agenda snapshot refresh
    pub agenda_refresh_interval: Duration,
    /// Agenda length when no end date is given
    pub agenda_default_days: i64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            horizon_months: DEFAULT_HORIZON_MONTHS,
            alert_lookahead_minutes: DEFAULT_ALERT_LOOKAHEAD_MINUTES,
            alert_scan_interval: Duration::from_secs(DEFAULT_ALERT_SCAN_INTERVAL_SECS),
            agenda_refresh_interval: Duration::from_secs(DEFAULT_AGENDA_REFRESH_INTERVAL_SECS),
            agenda_default_days: DEFAULT_AGENDA_DEFAULT_DAYS,
        }
    }
}

impl RuntimeSettings {
    /// Load settings, falling back to defaults for unparsable or
    /// out-of-range values
    pub async fn from_database(pool: &SqlitePool) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(months) = parse_bounded(pool, HORIZON_MONTHS, MAX_HORIZON_MONTHS).await? {
            settings.horizon_months = months;
        }
        if let Some(minutes) =
            parse_bounded(pool, ALERT_LOOKAHEAD_MINUTES, MAX_ALERT_LOOKAHEAD_MINUTES).await?
        {
            settings.alert_lookahead_minutes = minutes;
        }
        if let Some(secs) = parse_bounded(pool, ALERT_SCAN_INTERVAL_SECS, MAX_INTERVAL_SECS).await? {
            settings.alert_scan_interval = Duration::from_secs(secs);
        }
        if let Some(secs) =
            parse_bounded(pool, AGENDA_REFRESH_INTERVAL_SECS, MAX_INTERVAL_SECS).await?
        {
            settings.agenda_refresh_interval = Duration::from_secs(secs);
        }
        if let Some(days) = parse_bounded(pool, AGENDA_DEFAULT_DAYS, MAX_AGENDA_DAYS).await? {
            settings.agenda_default_days = days;
        }

        Ok(settings)
    }
}

/// Parse a setting in `1..=max`; anything else is logged and ignored
async fn parse_bounded<T>(pool: &SqlitePool, key: &str, max: T) -> Result<Option<T>>
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display,
{
    let Some(raw) = get_setting(pool, key).await? else {
        return Ok(None);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() && value <= max => Ok(Some(value)),
        Ok(_) => {
            warn!(
                "Setting {} = {:?} is outside 1..={}; using default",
                key, raw, max
            );
            Ok(None)
        }
        Err(_) => {
            warn!("Setting {} has invalid value {:?}; using default", key, raw);
            Ok(None)
        }
    }
}
