//! Queue engine backed by SQLite
//!
//! Every committed queue mutation must reach storage through the
//! persistence writer, and a restarted engine must rebuild the same queues.

use std::sync::Arc;

use healthpoint_core::application::queue::outbox_channel;
use healthpoint_core::application::{
    shutdown_channel, EstimatePolicy, PersistenceWriter, QueueEstimator, RecoveryService,
    RetryPolicy, ShutdownSender,
};
use healthpoint_core::domain::{default_departments, TokenStatus};
use healthpoint_core::port::mocks::{ManualClock, SequentialIdProvider};
use healthpoint_core::port::{Maintenance, MaintenanceConfig, TokenRepository};
use healthpoint_infra_sqlite::{create_pool, run_migrations, SqliteMaintenance, SqliteTokenRepository};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

// 2026-03-02T00:00:00Z
const START_MS: i64 = 1_772_409_600_000;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

struct Engine {
    estimator: Arc<QueueEstimator>,
    repo: Arc<SqliteTokenRepository>,
    shutdown: ShutdownSender,
    writer: JoinHandle<()>,
}

impl Engine {
    fn start(pool: SqlitePool, id_prefix: &str, clock: Arc<ManualClock>) -> Self {
        let repo = Arc::new(SqliteTokenRepository::new(pool));
        let (outbox_tx, outbox_rx) = outbox_channel();
        let estimator = Arc::new(
            QueueEstimator::new(
                default_departments(),
                EstimatePolicy::default(),
                Arc::new(SequentialIdProvider::new(id_prefix)),
                clock,
            )
            .unwrap()
            .with_outbox(outbox_tx),
        );

        let (shutdown, shutdown_rx) = shutdown_channel();
        let writer = PersistenceWriter::new(repo.clone(), RetryPolicy::default(), outbox_rx);
        let writer = tokio::spawn(writer.run(shutdown_rx));

        Self {
            estimator,
            repo,
            shutdown,
            writer,
        }
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        self.writer.await.unwrap();
    }
}

async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Issued tokens and every re-estimate they cause are stored
#[tokio::test]
async fn test_mutations_reach_sqlite() {
    let engine = Engine::start(
        memory_pool().await,
        "tok",
        Arc::new(ManualClock::with_step(START_MS, 1_000)),
    );

    let first = engine.estimator.issue_token("GEN", false).unwrap();
    let first_id = first.value.id.clone();
    first.ack.wait().await.unwrap();

    let second = engine.estimator.issue_token("GEN", false).unwrap();
    second.ack.wait().await.unwrap();

    // Priority token jumps the queue and pushes both normal tokens back
    let urgent = engine.estimator.issue_token("GEN", true).unwrap();
    let urgent_id = urgent.value.id.clone();
    urgent.ack.wait().await.unwrap();

    let stored = engine.repo.find_by_department("GEN").await.unwrap();
    assert_eq!(stored.len(), 3);
    for token in &stored {
        let live = engine.estimator.get_token(&token.id).unwrap();
        assert_eq!(token, &live, "storage diverged for {}", token.number);
    }

    let urgent_row = engine.repo.find_by_id(&urgent_id).await.unwrap().unwrap();
    assert_eq!(urgent_row.queue_position, 1);
    assert_eq!(urgent_row.estimated_wait_minutes, 7);

    let first_row = engine.repo.find_by_id(&first_id).await.unwrap().unwrap();
    assert_eq!(first_row.number, "GEN-001");
    assert_eq!(first_row.queue_position, 2);
    assert_eq!(first_row.estimated_wait_minutes, 20);

    engine.stop().await;
}

/// Calling a token in clears its position and moves the others up, in storage too
#[tokio::test]
async fn test_transition_and_delete_are_stored() {
    let engine = Engine::start(
        memory_pool().await,
        "tok",
        Arc::new(ManualClock::with_step(START_MS, 1_000)),
    );

    let ids: Vec<String> = {
        let mut ids = Vec::new();
        for _ in 0..3 {
            let receipt = engine.estimator.issue_token("ENT", false).unwrap();
            ids.push(receipt.value.id.clone());
            receipt.ack.wait().await.unwrap();
        }
        ids
    };

    let called = engine
        .estimator
        .transition_status(&ids[0], TokenStatus::InProgress)
        .unwrap();
    called.ack.wait().await.unwrap();

    let row = engine.repo.find_by_id(&ids[0]).await.unwrap().unwrap();
    assert_eq!(row.status, TokenStatus::InProgress);
    assert_eq!(row.queue_position, 0);

    let next = engine.repo.find_by_id(&ids[1]).await.unwrap().unwrap();
    assert_eq!(next.queue_position, 1);
    assert_eq!(next.estimated_wait_minutes, 20);

    let deleted = engine.estimator.delete_token(&ids[1]).unwrap();
    deleted.ack.wait().await.unwrap();
    assert!(engine.repo.find_by_id(&ids[1]).await.unwrap().is_none());

    let last = engine.repo.find_by_id(&ids[2]).await.unwrap().unwrap();
    assert_eq!(last.queue_position, 1);
    assert_eq!(last.estimated_wait_minutes, 20);

    engine.stop().await;
}

/// Restart: numbering resumes and stale stored positions are corrected
#[tokio::test]
async fn test_restart_recovers_queues() {
    let db_path = std::env::temp_dir().join(format!(
        "healthpoint-restart-{}.db",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&db_path);
    let url = format!("sqlite://{}", db_path.display());

    let clock = Arc::new(ManualClock::with_step(START_MS, 1_000));

    // First run
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let engine = Engine::start(pool.clone(), "run1", clock.clone());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let receipt = engine.estimator.issue_token("GEN", false).unwrap();
        ids.push(receipt.value.id.clone());
        receipt.ack.wait().await.unwrap();
    }
    let called = engine
        .estimator
        .transition_status(&ids[0], TokenStatus::InProgress)
        .unwrap();
    called.ack.wait().await.unwrap();
    engine.stop().await;

    // A crash between writes can leave positions behind
    sqlx::query("UPDATE tokens SET queue_position = 9, estimated_wait_minutes = 999 WHERE id = ?")
        .bind(&ids[2])
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    // Second run
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let engine = Engine::start(pool.clone(), "run2", clock);

    let report = RecoveryService::new(engine.repo.clone(), engine.estimator.clone())
        .recover()
        .await
        .unwrap();
    assert_eq!(report.loaded, 3);
    assert_eq!(report.restored, 3);

    assert_eq!(
        engine.estimator.get_token(&ids[0]).unwrap().status,
        TokenStatus::InProgress
    );
    let waiting = engine.estimator.waiting_set("GEN").unwrap();
    let positions: Vec<(String, u32, u32)> = waiting
        .iter()
        .map(|t| (t.number.clone(), t.queue_position, t.estimated_wait_minutes))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("GEN-002".to_string(), 1, 20),
            ("GEN-003".to_string(), 2, 35),
        ]
    );

    // Numbering continues after the highest stored sequence
    let next = engine.estimator.issue_token("GEN", false).unwrap();
    assert_eq!(next.value.number, "GEN-004");
    // The writer applies batches in order, so the corrections landed first
    next.ack.wait().await.unwrap();

    let corrected = engine.repo.find_by_id(&ids[2]).await.unwrap().unwrap();
    assert_eq!(corrected.queue_position, 2);
    assert_eq!(corrected.estimated_wait_minutes, 35);

    engine.stop().await;
    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}

/// Numbers of deleted or purged tokens are never handed out again after a restart
#[tokio::test]
async fn test_restart_does_not_reissue_removed_numbers() {
    let pool = memory_pool().await;
    let clock = Arc::new(ManualClock::with_step(START_MS, 1_000));
    let engine = Engine::start(pool.clone(), "run1", clock.clone());

    let mut gen_ids = Vec::new();
    for _ in 0..2 {
        let receipt = engine.estimator.issue_token("GEN", false).unwrap();
        gen_ids.push(receipt.value.id.clone());
        receipt.ack.wait().await.unwrap();
    }
    let lab = engine.estimator.issue_token("LAB", false).unwrap();
    let lab_id = lab.value.id.clone();
    lab.ack.wait().await.unwrap();
    for status in [TokenStatus::InProgress, TokenStatus::Completed] {
        engine
            .estimator
            .transition_status(&lab_id, status)
            .unwrap()
            .ack
            .wait()
            .await
            .unwrap();
    }

    // Top GEN token removed by hand, top LAB token aged out by retention
    engine
        .estimator
        .delete_token(&gen_ids[1])
        .unwrap()
        .ack
        .wait()
        .await
        .unwrap();
    engine.stop().await;

    let purge = SqliteMaintenance::new(pool.clone())
        .run_purge(&MaintenanceConfig::default(), START_MS + 8 * DAY_MS)
        .await
        .unwrap();
    assert_eq!(purge.tokens_deleted, 1);

    let engine = Engine::start(pool, "run2", clock);
    let report = RecoveryService::new(engine.repo.clone(), engine.estimator.clone())
        .recover()
        .await
        .unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.unsaved_corrections, 0);

    let gen = engine.estimator.issue_token("GEN", false).unwrap();
    assert_eq!(gen.value.number, "GEN-003");
    gen.ack.wait().await.unwrap();
    let lab = engine.estimator.issue_token("LAB", false).unwrap();
    assert_eq!(lab.value.number, "LAB-002");
    lab.ack.wait().await.unwrap();

    engine.stop().await;
}

/// Queues of different departments number and estimate independently
#[tokio::test]
async fn test_departments_are_independent() {
    let engine = Engine::start(
        memory_pool().await,
        "tok",
        Arc::new(ManualClock::with_step(START_MS, 1_000)),
    );

    for dept in ["PED", "LAB", "PED"] {
        engine
            .estimator
            .issue_token(dept, false)
            .unwrap()
            .ack
            .wait()
            .await
            .unwrap();
    }

    let ped = engine.repo.find_by_department("PED").await.unwrap();
    let numbers: Vec<&str> = ped.iter().map(|t| t.number.as_str()).collect();
    assert_eq!(numbers, vec!["PED-001", "PED-002"]);
    assert_eq!(ped[1].estimated_wait_minutes, 20 + 45);

    let lab = engine.repo.find_by_department("LAB").await.unwrap();
    assert_eq!(lab.len(), 1);
    assert_eq!(lab[0].number, "LAB-001");
    assert_eq!(lab[0].queue_position, 1);

    engine.stop().await;
}
