//! TeachTune Agenda (teachtune-agenda) - Main entry point
//!
//! Opens the teacher's schedule database and either watches for upcoming
//! lessons (default) or prints the agenda or dashboard summary.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teachtune_agenda::db::{ScheduleStore, SqliteScheduleStore};
use teachtune_agenda::monitor::{
    EventBusSink, MonitorConfig, MonitorService, NotifiedSet, TerminalBellSink, TracingSink,
    UpcomingLessonMonitor,
};
use teachtune_agenda::services::{DashboardService, LessonService};
use teachtune_agenda::AgendaContext;
use teachtune_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use teachtune_common::db::settings::MAX_AGENDA_DAYS;
use teachtune_common::db::{init_database, RuntimeSettings};
use teachtune_common::events::TtEvent;
use teachtune_common::ids::DEFAULT_TEACHER_ID;
use teachtune_common::{Clock, SchedulingZone, SystemClock};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const MODULE_NAME: &str = "teachtune-agenda";

/// Command-line arguments for teachtune-agenda
#[derive(Parser, Debug)]
#[command(name = "teachtune-agenda")]
#[command(about = "Lesson agenda and upcoming-lesson alerts for TeachTune")]
#[command(version)]
struct Args {
    /// Folder holding teachtune.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Teacher whose schedule is opened
    #[arg(long, env = "TEACHTUNE_TEACHER_ID", default_value_t = DEFAULT_TEACHER_ID)]
    teacher_id: Uuid,

    /// Scheduling zone ("local", "utc" or "+HH:MM"); overrides the config file
    #[arg(long)]
    timezone: Option<SchedulingZone>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Watch for upcoming lessons until interrupted
    Watch,
    /// Print lessons from today onwards
    Agenda {
        /// Number of days to list
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_AGENDA_DAYS))]
        days: Option<i64>,
    },
    /// Print today's dashboard summary
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = TomlConfig::load_module(MODULE_NAME);
    let toml_config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => TomlConfig::default(),
    };

    // Logs go to stderr unless a file is configured
    let (writer, ansi, log_file_error) = match toml_config.logging.open_file() {
        Ok(Some(file)) => (BoxMakeWriter::new(Mutex::new(file)), false, None),
        Ok(None) => (BoxMakeWriter::new(std::io::stderr), true, None),
        Err(e) => (BoxMakeWriter::new(std::io::stderr), true, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi))
        .init();

    if let Err(e) = &loaded {
        warn!("Ignoring unreadable config file, using defaults: {}", e);
    }
    if let Some(e) = log_file_error {
        warn!(
            "Cannot open log file {:?}, logging to stderr: {}",
            toml_config.logging.file, e
        );
    }

    info!(
        "Starting TeachTune Agenda v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    if initializer.database_exists() {
        info!("Opening database {}", initializer.database_path().display());
    } else {
        info!("Creating database {}", initializer.database_path().display());
    }

    let pool = init_database(&initializer.database_path())
        .await
        .context("Failed to initialize database")?;
    let settings = RuntimeSettings::from_database(&pool)
        .await
        .context("Failed to load runtime settings")?;
    let zone = args.timezone.unwrap_or(toml_config.timezone);
    info!("Scheduling zone: {}", zone);

    let store = SqliteScheduleStore::open(pool.clone(), args.teacher_id)
        .await
        .with_context(|| format!("Failed to open schedule for teacher {}", args.teacher_id))?;
    let store: Arc<dyn ScheduleStore> = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ctx = AgendaContext::new(store, clock, zone, settings);

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(ctx).await?,
        Command::Agenda { days } => print_agenda(ctx, days).await?,
        Command::Summary => print_summary(ctx).await?,
    }

    pool.close().await;
    Ok(())
}

/// Run the monitor until Ctrl+C or SIGTERM
async fn watch(ctx: AgendaContext) -> Result<()> {
    let mut events = ctx.events.subscribe();
    let cancel = CancellationToken::new();

    let event_logger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(TtEvent::UpcomingLesson { message, .. }) => println!("{}", message),
                        Ok(event) => debug!("Event: {}", event.event_type()),
                        Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, skipped {} events", skipped),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    };

    let monitor = UpcomingLessonMonitor::new(
        NotifiedSet::new(),
        Arc::clone(&ctx.clock),
        ctx.settings.alert_lookahead_minutes,
    )
    .with_sink(Box::new(EventBusSink::new(ctx.events.clone())))
    .with_sink(Box::new(TerminalBellSink))
    .with_sink(Box::new(TracingSink));

    let service = MonitorService::new(
        monitor,
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.clock),
        MonitorConfig::from(&ctx.settings),
    );
    let handle = service.start(cancel.clone()).await;

    shutdown_signal().await;

    handle.shutdown().await;
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

async fn print_agenda(ctx: AgendaContext, days: Option<i64>) -> Result<()> {
    let zone = ctx.zone;
    let lessons = LessonService::new(ctx);

    let entries = match days {
        Some(days) => lessons.upcoming_days(days).await,
        None => lessons.agenda(None, None).await,
    }
    .context("Failed to load agenda")?;
    if entries.is_empty() {
        println!("No lessons scheduled.");
    }
    for entry in entries {
        let lesson = &entry.lesson;
        println!(
            "{}  {:<24} {:<8} {}",
            zone.to_local(lesson.scheduled_at).format("%Y-%m-%d %a %H:%M"),
            entry.student_name.as_deref().unwrap_or("?"),
            format!("{:?}", lesson.attendance).to_lowercase(),
            if lesson.auto_generated { "" } else { "(booked)" }
        );
    }
    Ok(())
}

async fn print_summary(ctx: AgendaContext) -> Result<()> {
    let zone = ctx.zone;
    let summary = DashboardService::new(ctx)
        .summary()
        .await
        .context("Failed to build summary")?;

    println!("{}", summary.date.format("%A, %Y-%m-%d"));
    println!(
        "Students: {} ({} active)",
        summary.total_students, summary.active_students
    );
    println!(
        "Estimated monthly income: {}.{:02}",
        summary.estimated_monthly_income_cents / 100,
        summary.estimated_monthly_income_cents % 100
    );
    println!(
        "Lessons today: {} ({} pending)",
        summary.lessons_today, summary.pending_today
    );
    for entry in &summary.today {
        println!(
            "  {}  {}",
            zone.to_local(entry.lesson.scheduled_at).format("%H:%M"),
            entry.student_name.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
