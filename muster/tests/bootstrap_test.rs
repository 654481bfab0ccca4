// Bootstrap protocol tests against scripted workers, on a paused clock

mod common;

use std::time::Duration;

use common::{MockSpawner, Script};
use muster::thread::RegionLoader;
use muster::{BootstrapError, LoadError, SharedMemory, SpawnError, WorkerHandle, WorkerId, WorkerPoolBootstrapper};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(3000);

#[tokio::test(start_paused = true)]
async fn test_empty_pool_spawns_nothing() {
    let bootstrapper = WorkerPoolBootstrapper::new(MockSpawner::new());

    let handles = bootstrapper
        .bootstrap(SharedMemory::new(4), 0, TIMEOUT)
        .await
        .expect("empty pool should bootstrap");

    assert!(handles.is_empty());
    assert_eq!(bootstrapper.spawner().spawned(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_workers_ready() {
    let spawner = MockSpawner::new()
        .script(0, Script::Ready(Duration::from_millis(40)))
        .script(3, Script::Ready(Duration::from_millis(10)));
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let start = Instant::now();
    let handles = bootstrapper
        .bootstrap(SharedMemory::new(4), 4, TIMEOUT)
        .await
        .expect("all workers should acknowledge");

    // Returns with the slowest worker, not at the deadline
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40) && elapsed < Duration::from_millis(100), "{:?}", elapsed);
    let ids: Vec<_> = handles.iter().map(|h| h.id()).collect();
    assert_eq!(ids, (0..4).map(WorkerId::new).collect::<Vec<_>>());
    assert!(handles.iter().all(|h| !h.is_terminated()));
    assert_eq!(bootstrapper.spawner().inits(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_silent_worker_times_out() {
    let spawner = MockSpawner::new().script(2, Script::Silent);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let start = Instant::now();
    let err = bootstrapper
        .bootstrap(SharedMemory::new(4), 4, TIMEOUT)
        .await
        .expect_err("worker 2 never acknowledges");
    let elapsed = start.elapsed();

    assert!(elapsed >= TIMEOUT, "failed early: {:?}", elapsed);
    assert!(elapsed < TIMEOUT + Duration::from_millis(100), "failed late: {:?}", elapsed);
    assert!(err.is_timeout());
    assert_eq!(err.worker_id(), Some(WorkerId::new(2)));
    match err {
        BootstrapError::Timeout { after, .. } => assert_eq!(after, TIMEOUT),
        other => panic!("unexpected error: {:?}", other),
    }

    // Ready workers are terminated along with the silent one
    assert_eq!(bootstrapper.spawner().terminated_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_worker_just_inside_deadline() {
    let spawner = MockSpawner::new().script(1, Script::Ready(Duration::from_millis(2999)));
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let handles = bootstrapper
        .bootstrap(SharedMemory::new(1), 2, TIMEOUT)
        .await
        .expect("worker 1 answers before its deadline");

    assert_eq!(handles.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_decides_without_waiting() {
    let spawner = MockSpawner::new()
        .script(0, Script::Silent)
        .script(1, Script::Nack(Duration::from_millis(10), "no device".into()));
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let start = Instant::now();
    let err = bootstrapper
        .bootstrap(SharedMemory::new(1), 3, TIMEOUT)
        .await
        .expect_err("worker 1 rejects init");

    assert!(start.elapsed() < Duration::from_millis(100), "waited for the silent worker");
    match err {
        BootstrapError::SetupFailed { id, reason } => {
            assert_eq!(id, WorkerId::new(1));
            assert_eq!(reason, "no device");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(bootstrapper.spawner().all_terminated());
}

#[tokio::test(start_paused = true)]
async fn test_exited_worker() {
    let spawner = MockSpawner::new().script(0, Script::Exit);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let err = bootstrapper
        .bootstrap(SharedMemory::new(1), 2, TIMEOUT)
        .await
        .expect_err("worker 0 exits");

    assert!(matches!(err, BootstrapError::WorkerExited { id } if id == WorkerId::new(0)));
    assert!(bootstrapper.spawner().all_terminated());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ready_counts_once() {
    let spawner = MockSpawner::new().script(1, Script::ReadyTwice);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let mut pool = bootstrapper
        .bootstrap_pool(SharedMemory::new(1), 3, TIMEOUT)
        .await
        .expect("duplicate ready is harmless");
    assert_eq!(pool.len(), 3);

    // The stray second ready is skipped by the work phase
    pool.send_to(WorkerId::new(1), vec![9]).unwrap();
    assert_eq!(pool.recv_from(WorkerId::new(1)).await, Some(vec![9]));
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_message_during_handshake_is_skipped() {
    let spawner = MockSpawner::new().script(0, Script::ChatterThenReady);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let handles = bootstrapper
        .bootstrap(SharedMemory::new(1), 1, TIMEOUT)
        .await
        .expect("chatter before ready does not fail the handshake");
    assert_eq!(handles.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_failure_terminates_earlier_workers() {
    let spawner = MockSpawner::new().script(2, Script::FailSpawn);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let err = bootstrapper
        .bootstrap(SharedMemory::new(1), 4, TIMEOUT)
        .await
        .expect_err("worker 2 cannot be spawned");

    match err {
        BootstrapError::Spawn { id, source } => {
            assert_eq!(id, WorkerId::new(2));
            assert!(matches!(source, SpawnError::Rejected(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // No spawn is attempted after the failure
    assert_eq!(bootstrapper.spawner().spawned(), 3);
    assert_eq!(bootstrapper.spawner().terminated_count(), 2);
    assert!(bootstrapper.spawner().all_terminated());
}

#[tokio::test(start_paused = true)]
async fn test_undeliverable_init() {
    let spawner = MockSpawner::new().script(1, Script::Unreachable);
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);

    let err = bootstrapper
        .bootstrap(SharedMemory::new(1), 3, TIMEOUT)
        .await
        .expect_err("init to worker 1 cannot be delivered");

    assert!(matches!(err, BootstrapError::Channel { id, .. } if id == WorkerId::new(1)));
    assert_eq!(bootstrapper.spawner().spawned(), 2);
    assert!(bootstrapper.spawner().all_terminated());
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_spawns_nothing() {
    let bootstrapper = WorkerPoolBootstrapper::new(MockSpawner::new());

    let err = bootstrapper
        .bootstrap_with_loader(&RegionLoader::new(0), 4, TIMEOUT)
        .await
        .expect_err("zero-sized region is rejected");

    assert!(matches!(err, BootstrapError::Load(LoadError::InvalidSize(0))));
    assert_eq!(bootstrapper.spawner().spawned(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resource_is_shared_not_copied() {
    let bootstrapper = WorkerPoolBootstrapper::new(MockSpawner::new());

    let pool = bootstrapper
        .bootstrap_with_loader(&RegionLoader::new(16).with_image(vec![1, 2, 3]), 3, TIMEOUT)
        .await
        .expect("pool should bootstrap");

    assert_eq!(pool.resource().len(), 16);
    assert_eq!(&pool.resource().snapshot()[..3], &[1, 2, 3]);
    // The pool plus one copy held by each live worker
    assert_eq!(pool.resource().handle_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_does_not_overflow() {
    let bootstrapper = WorkerPoolBootstrapper::new(MockSpawner::new());

    let handles = bootstrapper
        .bootstrap(SharedMemory::new(1), 2, Duration::MAX)
        .await
        .expect("Duration::MAX means no practical limit");
    assert_eq!(handles.len(), 2);

    let spawner = MockSpawner::new().script(1, Script::Nack(Duration::from_millis(5), "no device".into()));
    let bootstrapper = WorkerPoolBootstrapper::new(spawner);
    let err = bootstrapper
        .bootstrap(SharedMemory::new(1), 2, Duration::MAX)
        .await
        .expect_err("failures are still reported");
    assert!(matches!(err, BootstrapError::SetupFailed { id, .. } if id == WorkerId::new(1)));
}
