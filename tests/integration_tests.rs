use seat_reservation::*;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use tokio::time::Duration;

#[tokio::test]
async fn test_config_parsing_integration() {
    let config_content = r#"
application.id=ignored-by-caller
seats.initial=120
seats.reset.on.start=false
server.port=8081
store.backend=rocksdb
state.dir=/var/lib/seats
queue.job.timeout.ms=250
queue.timeout.policy=requeue
queue.max.attempts=5
queue.remove.on.complete=true
log.format=json
"#;

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.properties");
    std::fs::write(&config_path, config_content).unwrap();

    let config = parse_properties_file(&config_path, "test-service").unwrap();

    // The file wins over the default id
    assert_eq!(config.application_id, "ignored-by-caller");
    assert_eq!(config.initial_seats, 120);
    assert!(!config.reset_seats_on_start);
    assert_eq!(config.port, 8081);
    assert_eq!(config.store.backend, StoreBackendKind::RocksDB);
    assert_eq!(config.store.state_dir, "/var/lib/seats");
    assert_eq!(config.queue.job_timeout(), Duration::from_millis(250));
    assert_eq!(config.queue.timeout_policy, TimeoutPolicy::Requeue);
    assert_eq!(config.queue.max_attempts, 5);
    assert!(config.queue.remove_on_complete);
    assert!(config.queue.process_on_startup);
    assert_eq!(config.additional_properties.get("log.format"), Some(&"json".to_string()));

    // Overlay file
    let overlay_path = temp_dir.path().join("overlay.properties");
    std::fs::write(&overlay_path, "seats.initial=3\nqueue.timeout.policy=fail\n").unwrap();

    let merged = merge_properties_file(config, &overlay_path).unwrap();
    assert_eq!(merged.initial_seats, 3);
    assert_eq!(merged.queue.timeout_policy, TimeoutPolicy::Fail);
    assert_eq!(merged.port, 8081);
}

#[tokio::test]
async fn test_config_defaults() {
    let config = ServiceConfig::default();

    assert_eq!(config.initial_seats, 50);
    assert_eq!(config.port, 1245);
    assert_eq!(config.store.backend, StoreBackendKind::Memory);
    assert_eq!(config.queue.timeout_policy, TimeoutPolicy::Fail);
    assert!(config.reset_seats_on_start);
}

#[tokio::test]
async fn test_config_rejects_invalid_values() {
    let mut config = ServiceConfig::default();

    assert!(apply_property(&mut config, "seats.initial", "-1").is_err());
    assert!(apply_property(&mut config, "seats.initial", "many").is_err());
    assert!(apply_property(&mut config, "store.backend", "postgres").is_err());
    assert!(apply_property(&mut config, "queue.timeout.policy", "ignore").is_err());
    assert!(apply_property(&mut config, "queue.max.attempts", "0").is_err());

    assert_eq!(config.initial_seats, 50);

    let missing = parse_properties_file("/definitely/not/here.properties", "test");
    assert!(matches!(missing, Err(ReservationError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_config_overrides_from_source() {
    let source = ::config::Config::builder()
        .set_override("seats_initial", "7")
        .unwrap()
        .set_override("queue_job_timeout_ms", "1500")
        .unwrap()
        .set_override("store_backend", "rocksdb")
        .unwrap()
        .build()
        .unwrap();

    let config = apply_overrides(ServiceConfig::default(), &source).unwrap();

    assert_eq!(config.initial_seats, 7);
    assert_eq!(config.queue.job_timeout_ms, 1500);
    assert_eq!(config.store.backend, StoreBackendKind::RocksDB);
    assert_eq!(config.port, 1245);
}

#[tokio::test]
async fn test_rocksdb_state_store_integration() {
    let temp_dir = tempdir().unwrap();
    let store = RocksDBStore::open(temp_dir.path().join("test_store")).unwrap();

    store.put("job:00000000000000000002", &2_i64).unwrap();
    store.put("job:00000000000000000001", &1_i64).unwrap();
    store.put("job:00000000000000000010", &10_i64).unwrap();

    assert_eq!(store.get::<i64>("job:00000000000000000002").unwrap(), Some(2));

    // Key order, not insertion order
    let values: Vec<i64> = store.values().unwrap();
    assert_eq!(values, vec![1, 2, 10]);

    store.delete("job:00000000000000000001").unwrap();
    assert_eq!(store.get::<i64>("job:00000000000000000001").unwrap(), None);
    store.flush().unwrap();
}

#[tokio::test]
async fn test_state_store_backend_open() {
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig {
        backend: StoreBackendKind::RocksDB,
        state_dir: temp_dir.path().to_string_lossy().to_string(),
    };

    let backend: StateStoreBackend<i64> = StateStoreBackend::open(&config, Stores::SEATS).unwrap();
    backend.put("a", &1).unwrap();
    assert_eq!(backend.get("a").unwrap(), Some(1));
    assert!(temp_dir.path().join(Stores::SEATS).exists());

    backend.remove("a").unwrap();
    assert_eq!(backend.get("a").unwrap(), None);

    let memory: StateStoreBackend<i64> =
        StateStoreBackend::open(&StoreConfig::default(), Stores::SEATS).unwrap();
    let shared = memory.clone();
    memory.put("b", &2).unwrap();
    assert_eq!(shared.get("b").unwrap(), Some(2));
}

#[tokio::test]
async fn test_in_memory_values_follow_key_order() {
    let store: StateStoreBackend<u64> = StateStoreBackend::in_memory();
    for id in [10_u64, 2, 7, 1] {
        store.put(&job_key(JobId::new(id)), &id).unwrap();
    }

    assert_eq!(store.values().unwrap(), vec![1, 2, 7, 10]);
}

#[tokio::test]
async fn test_counter_store_get_and_set() {
    let store = KvCounterStore::in_memory(Keys::AVAILABLE_SEATS);

    // Uninitialized reads as zero
    assert_eq!(store.current().await.unwrap(), None);
    assert_eq!(store.get().await.unwrap(), 0);

    // Last write wins
    store.set(10).await.unwrap();
    store.set(4).await.unwrap();
    assert_eq!(store.get().await.unwrap(), 4);

    store.set(4).await.unwrap();
    assert_eq!(store.get().await.unwrap(), 4);
}

#[tokio::test]
async fn test_counter_store_decrement_stops_at_zero() {
    let store = KvCounterStore::in_memory(Keys::AVAILABLE_SEATS);
    store.set(2).await.unwrap();

    assert_eq!(store.decrement_if_positive().await.unwrap(), Decrement::Applied { remaining: 1 });
    assert_eq!(store.decrement_if_positive().await.unwrap(), Decrement::Applied { remaining: 0 });
    assert_eq!(store.decrement_if_positive().await.unwrap(), Decrement::Exhausted { current: 0 });
    assert_eq!(store.get().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_store_concurrent_decrements() {
    let store = Arc::new(KvCounterStore::in_memory(Keys::AVAILABLE_SEATS));
    store.set(25).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move { store.decrement_if_positive().await.unwrap() }));
    }

    let mut applied = 0;
    for task in tasks {
        match task.await.unwrap() {
            Decrement::Applied { remaining } => {
                assert!(remaining >= 0);
                applied += 1;
            }
            Decrement::Exhausted { current } => assert_eq!(current, 0),
        }
    }

    assert_eq!(applied, 25);
    assert_eq!(store.get().await.unwrap(), 0);
}

#[tokio::test]
async fn test_counter_store_persists_in_rocksdb() {
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig {
        backend: StoreBackendKind::RocksDB,
        state_dir: temp_dir.path().to_string_lossy().to_string(),
    };

    {
        let store = KvCounterStore::new(
            Keys::AVAILABLE_SEATS,
            StateStoreBackend::open(&config, Stores::SEATS).unwrap(),
        );
        store.set(7).await.unwrap();
        store.flush().await.unwrap();
    }

    let reopened = KvCounterStore::new(
        Keys::AVAILABLE_SEATS,
        StateStoreBackend::open(&config, Stores::SEATS).unwrap(),
    );
    assert_eq!(reopened.get().await.unwrap(), 7);
}

#[tokio::test]
async fn test_reservation_gate() {
    let gate = ReservationGate::new();
    let shared = gate.clone();
    assert!(gate.is_open());

    assert!(shared.close());
    assert!(!shared.close());

    assert!(!gate.is_open());
    assert!(!shared.is_open());
}

#[tokio::test]
async fn test_retry_with_backoff() {
    let attempts = AtomicU32::new(0);
    let config = RetryConfig::with_delays(3, Duration::from_millis(1), Duration::from_millis(5));

    let result = retry_with_backoff(&config, "flaky write", || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt < 3 {
                Err(ReservationError::StoreUnavailable("busy".to_string()))
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let failures = AtomicU32::new(0);
    let result: Result<()> = retry_with_backoff(&config, "broken write", || {
        failures.fetch_add(1, Ordering::SeqCst);
        async { Err(ReservationError::StoreUnavailable("down".to_string())) }
    })
    .await;

    assert!(matches!(result, Err(ReservationError::StoreUnavailable(_))));
    assert_eq!(failures.load(Ordering::SeqCst), 3);
}

#[test]
fn test_retry_delay_never_exceeds_cap() {
    let config = RetryConfig::with_delays(10, Duration::from_millis(80), Duration::from_millis(100));
    assert!(config.jitter);

    let mut delay = config.initial_delay;
    for _ in 0..50 {
        delay = config.next_delay(delay);
        assert!(delay <= config.max_delay, "delay {:?} above cap", delay);
    }
    assert_eq!(delay, config.max_delay);

    let steady = RetryConfig::job_state();
    assert_eq!(steady.next_delay(Duration::from_millis(10)), Duration::from_millis(20));
    assert_eq!(steady.next_delay(Duration::from_millis(150)), steady.max_delay);
}

struct FlagComponent {
    flag: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl ShutdownComponent for FlagComponent {
    async fn shutdown(&self) -> Result<()> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "flag"
    }
}

struct StuckComponent;

#[async_trait::async_trait]
impl ShutdownComponent for StuckComponent {
    async fn shutdown(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "stuck"
    }
}

#[tokio::test]
async fn test_shutdown_coordinator_runs_components() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
    let flag = Arc::new(AtomicBool::new(false));
    coordinator
        .register_component(Box::new(FlagComponent { flag: Arc::clone(&flag) }))
        .await;

    let mut signal = coordinator.subscribe();
    coordinator.shutdown().await.unwrap();

    assert!(flag.load(Ordering::SeqCst));
    assert!(signal.try_recv().is_ok());
}

#[tokio::test]
async fn test_shutdown_coordinator_times_out() {
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
    coordinator.register_component(Box::new(StuckComponent)).await;

    assert!(coordinator.shutdown().await.is_err());
}

#[tokio::test]
async fn test_run_with_graceful_shutdown_stops_on_trigger() {
    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
    let flag = Arc::new(AtomicBool::new(false));
    coordinator
        .register_component(Box::new(FlagComponent { flag: Arc::clone(&flag) }))
        .await;

    let trigger = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();
    });

    run_with_graceful_shutdown(
        "test-service",
        || async {
            std::future::pending::<()>().await;
            Ok(())
        },
        coordinator,
    )
    .await
    .unwrap();

    assert!(flag.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_metrics_export() {
    let metrics = Metrics::new().unwrap();
    metrics.record_enqueue(true);
    metrics.record_reservation(true);
    metrics.update_available_seats(49);
    metrics.update_gate(false);

    let exported = metrics.export().unwrap();
    assert!(exported.contains("jobs_enqueued_total 1"));
    assert!(exported.contains("available_seats 49"));
    assert!(exported.contains("reservation_gate_open 0"));
}
