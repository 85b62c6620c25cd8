//! HealthPoint Queue Engine - Main Entry Point
//! Composition root: storage, estimator, background tasks and the RPC server

mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use healthpoint_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use healthpoint_core::application::queue::outbox_channel;
use healthpoint_core::application::{
    shutdown_channel, AppointmentService, EstimatePolicy, MaintenanceScheduler, PersistenceWriter,
    QueueEstimator, RecoveryService, RetryPolicy,
};
use healthpoint_core::port::id_provider::UuidProvider;
use healthpoint_core::port::time_provider::SystemTimeProvider;
use healthpoint_core::port::{DepartmentRepository, MaintenanceConfig};
use healthpoint_infra_sqlite::{
    create_pool, run_migrations, SqliteAppointmentRepository, SqliteDepartmentRepository,
    SqliteMaintenance, SqliteTokenRepository,
};
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration, then logging (the file sink depends on it)
    let settings = Settings::load()?;
    let _log_guard = init_logging(&settings)?;

    info!("HealthPoint queue engine v{} starting...", VERSION);

    // 2. Database
    if !settings.db_path.starts_with("sqlite:") {
        if let Some(parent) = std::path::Path::new(&settings.db_path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }
    info!(db_path = %settings.db_path, "Initializing database...");
    let pool = create_pool(&settings.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Department catalogue: configuration is seeded into storage, storage is authoritative
    let department_repo = SqliteDepartmentRepository::new(pool.clone());
    department_repo
        .upsert_departments(&settings.departments)
        .await?;
    let departments = department_repo.load_departments().await?;
    info!(count = departments.len(), "Departments loaded");

    // 4. DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let token_repo = Arc::new(SqliteTokenRepository::new(pool.clone()));
    let appointment_repo = Arc::new(SqliteAppointmentRepository::new(pool.clone()));
    let maintenance = Arc::new(SqliteMaintenance::new(pool.clone()));

    let (outbox_tx, outbox_rx) = outbox_channel();
    let estimator = Arc::new(
        QueueEstimator::new(
            departments.clone(),
            EstimatePolicy::new(settings.queue.fixed_overhead_minutes),
            id_provider.clone(),
            time_provider.clone(),
        )?
        .with_outbox(outbox_tx),
    );

    // 5. Persistence writer (started before recovery so corrected positions are saved)
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let writer = PersistenceWriter::new(
        token_repo.clone(),
        RetryPolicy::new(
            settings.persistence.max_attempts,
            std::time::Duration::from_millis(settings.persistence.base_delay_ms),
        ),
        outbox_rx,
    );
    let writer_handle = tokio::spawn(writer.run(shutdown_rx.clone()));

    // 6. Rebuild queues from storage
    info!("Running queue recovery...");
    RecoveryService::new(token_repo, estimator.clone())
        .recover()
        .await
        .context("Queue recovery failed")?;

    // 7. Maintenance scheduler
    let scheduler = Arc::new(MaintenanceScheduler::new(
        maintenance,
        estimator.clone(),
        time_provider.clone(),
        MaintenanceConfig {
            retention_days: settings.maintenance.retention_days,
            ..Default::default()
        },
        settings.maintenance_interval(),
    ));
    let maintenance_task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // 8. JSON-RPC server
    let appointments = Arc::new(AppointmentService::new(
        appointment_repo,
        departments,
        settings.appointments.slots.clone(),
        id_provider,
        time_provider,
    ));
    let handler = RpcHandler::new(estimator, appointments, scheduler, settings.ack_timeout());
    let rpc_config = RpcServerConfig {
        host: settings.rpc.host.clone(),
        port: settings.rpc.port,
    };
    let (addr, rpc_handle) = RpcServer::new(rpc_config, handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(%addr, "System ready. Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Stop accepting requests, then flush pending writes
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    rpc_handle.stopped().await;

    shutdown_tx.shutdown();
    match tokio::time::timeout(std::time::Duration::from_secs(10), writer_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Persistence writer panicked"),
        Err(_) => warn!("Persistence writer did not finish in time; some changes may be lost"),
    }
    let _ = maintenance_task.await;

    info!("Shutdown complete.");
    Ok(())
}

/// stdout (pretty or JSON via `HEALTHPOINT_LOG_FORMAT`) plus an optional daily JSON file
fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("healthpoint=info"))
        .context("Failed to create env filter")?;

    let log_format =
        std::env::var("HEALTHPOINT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let stdout_layer = match log_format.as_str() {
        "json" => fmt::layer().json().boxed(),
        _ => fmt::layer().pretty().boxed(),
    };

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "healthpoint.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
