use docstore_conn_mgr::{ConnectionPool, Driver, Error, PoolConfig, PoolStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
#[error("fake driver: {0}")]
struct FakeError(&'static str);

#[derive(Debug)]
struct FakeHandle {
   id: usize,
   closed: AtomicBool,
}

/// In-process driver that records every connect and close
#[derive(Default)]
struct FakeDriver {
   connects: AtomicUsize,
   closes: AtomicUsize,
   open: AtomicUsize,
   max_open: AtomicUsize,
   failing_connects: AtomicUsize,
   fail_close: AtomicBool,
   gate: Option<Arc<Semaphore>>,
}

impl FakeDriver {
   fn gated() -> (Self, Arc<Semaphore>) {
      let gate = Arc::new(Semaphore::new(0));
      let driver = Self {
         gate: Some(Arc::clone(&gate)),
         ..Default::default()
      };
      (driver, gate)
   }
}

impl Driver for FakeDriver {
   type Handle = FakeHandle;
   type Error = FakeError;

   async fn connect(&self, uri: &str, _config: &PoolConfig) -> Result<FakeHandle, FakeError> {
      assert_eq!(uri, "fake://store");
      let id = self.connects.fetch_add(1, Ordering::SeqCst) + 1;

      if let Some(gate) = &self.gate {
         gate.acquire().await.unwrap().forget();
      }

      let should_fail = self
         .failing_connects
         .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
         .is_ok();
      if should_fail {
         return Err(FakeError("connection refused"));
      }

      let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_open.fetch_max(open, Ordering::SeqCst);

      Ok(FakeHandle {
         id,
         closed: AtomicBool::new(false),
      })
   }

   async fn close(&self, handle: &FakeHandle) -> Result<(), FakeError> {
      self.closes.fetch_add(1, Ordering::SeqCst);
      assert!(
         !handle.closed.swap(true, Ordering::SeqCst),
         "handle {} closed twice",
         handle.id
      );
      self.open.fetch_sub(1, Ordering::SeqCst);

      if self.fail_close.load(Ordering::SeqCst) {
         return Err(FakeError("socket already gone"));
      }
      Ok(())
   }
}

fn init_tracing() {
   let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn new_pool(driver: FakeDriver) -> Arc<ConnectionPool<FakeDriver>> {
   init_tracing();
   Arc::new(ConnectionPool::new(driver, "fake://store", PoolConfig::default()).unwrap())
}

async fn wait_for_ref_count(pool: &ConnectionPool<FakeDriver>, expected: usize) {
   tokio::time::timeout(Duration::from_secs(1), async {
      while pool.ref_count() != expected {
         tokio::task::yield_now().await;
      }
   })
   .await
   .unwrap_or_else(|_| panic!("ref count never reached {expected}"));
}

async fn wait_for_closes(pool: &ConnectionPool<FakeDriver>, expected: usize) {
   tokio::time::timeout(Duration::from_secs(1), async {
      while pool.driver().closes.load(Ordering::SeqCst) != expected {
         tokio::task::yield_now().await;
      }
   })
   .await
   .unwrap_or_else(|_| panic!("driver never saw {expected} closes"));
}

#[tokio::test]
async fn test_concurrent_acquires_share_one_connect() {
   let (driver, gate) = FakeDriver::gated();
   let pool = new_pool(driver);

   let handles: Vec<_> = (0..2)
      .map(|_| {
         let pool = Arc::clone(&pool);
         tokio::spawn(async move { pool.acquire().await.unwrap() })
      })
      .collect();

   // Both callers have latched onto the attempt before it is allowed to finish
   wait_for_ref_count(&pool, 2).await;
   assert!(!pool.is_connected());
   gate.add_permits(1);

   let mut acquired = Vec::new();
   for handle in handles {
      acquired.push(handle.await.unwrap());
   }

   assert!(Arc::ptr_eq(&acquired[0], &acquired[1]));
   assert_eq!(pool.driver().connects.load(Ordering::SeqCst), 1);
   assert_eq!(pool.stats().connect_attempts, 1);
   assert_eq!(pool.ref_count(), 2);

   pool.release().await;
   pool.release().await;
   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_attempt_is_shared_then_retried() {
   let (driver, gate) = FakeDriver::gated();
   driver.failing_connects.store(1, Ordering::SeqCst);
   let pool = new_pool(driver);

   let waiters: Vec<_> = (0..3)
      .map(|_| {
         let pool = Arc::clone(&pool);
         tokio::spawn(async move { pool.acquire().await })
      })
      .collect();

   wait_for_ref_count(&pool, 3).await;
   gate.add_permits(1);

   for waiter in waiters {
      let err = waiter.await.unwrap().unwrap_err();
      assert!(matches!(err, Error::Connect(_)));
      assert!(err.to_string().contains("connection refused"));
   }

   assert_eq!(
      pool.stats(),
      PoolStats {
         ref_count: 0,
         connected: false,
         connect_attempts: 1,
         closes: 0,
      }
   );

   // State was cleared, so the next call starts a fresh attempt
   gate.add_permits(1);
   let handle = pool.acquire().await.unwrap();
   assert_eq!(handle.id, 2);
   assert_eq!(pool.driver().connects.load(Ordering::SeqCst), 2);

   pool.release().await;
   assert!(!pool.is_connected());
}

#[tokio::test]
async fn test_double_release_clamps_at_zero() {
   let pool = new_pool(FakeDriver::default());

   let _handle = pool.acquire().await.unwrap();
   pool.release().await;
   pool.release().await;

   assert_eq!(pool.ref_count(), 0);
   assert_eq!(pool.stats().closes, 1);
   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 1);

   // The clamped count still pairs correctly with the next acquire
   let _handle = pool.acquire().await.unwrap();
   assert_eq!(pool.ref_count(), 1);
   pool.release().await;
   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_handle_stays_open_while_referenced() {
   let pool = new_pool(FakeDriver::default());

   let first = pool.acquire().await.unwrap();
   let second = pool.acquire().await.unwrap();
   assert_eq!(first.id, second.id);

   pool.release().await;
   assert!(pool.is_connected());
   assert!(!first.closed.load(Ordering::SeqCst));

   pool.release().await;
   assert!(!pool.is_connected());
   assert!(first.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_close_failure_still_resets_state() {
   let pool = new_pool(FakeDriver::default());
   pool.driver().fail_close.store(true, Ordering::SeqCst);

   let _ = pool.acquire().await.unwrap();
   pool.release().await;
   assert!(!pool.is_connected());

   pool.driver().fail_close.store(false, Ordering::SeqCst);
   let handle = pool.acquire().await.unwrap();
   assert_eq!(handle.id, 2);
   pool.release().await;
}

#[tokio::test]
async fn test_with_connection_releases_on_error() {
   let pool = new_pool(FakeDriver::default());

   let result: Result<(), Error> = pool
      .with_connection(|_handle| async move { Err(Error::MissingConnectionString) })
      .await;

   assert!(matches!(result, Err(Error::MissingConnectionString)));
   assert_eq!(pool.ref_count(), 0);
   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_with_connection_returns_operation_value() {
   let pool = new_pool(FakeDriver::default());

   let id = pool
      .with_connection(|handle| async move { Ok::<_, Error>(handle.id) })
      .await
      .unwrap();

   assert_eq!(id, 1);
   assert_eq!(pool.ref_count(), 0);
}

#[tokio::test]
async fn test_with_connection_surfaces_connect_failure() {
   let driver = FakeDriver::default();
   driver.failing_connects.store(1, Ordering::SeqCst);
   let pool = new_pool(driver);

   let ran = Arc::new(AtomicBool::new(false));
   let flag = Arc::clone(&ran);
   let result = pool
      .with_connection(|_handle| async move {
         flag.store(true, Ordering::SeqCst);
         Ok::<_, Error>(())
      })
      .await;

   assert!(matches!(result, Err(Error::Connect(_))));
   assert!(!ran.load(Ordering::SeqCst));
   assert_eq!(pool.ref_count(), 0);

   // Calling again re-attempts the connection
   pool
      .with_connection(|_handle| async move { Ok::<_, Error>(()) })
      .await
      .unwrap();
   assert_eq!(pool.driver().connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_with_connection_releases_on_panic() {
   let pool = new_pool(FakeDriver::default());

   let task_pool = Arc::clone(&pool);
   let joined = tokio::spawn(async move {
      task_pool
         .with_connection(|_handle| async move {
            if true {
               panic!("operation blew up");
            }
            Ok::<_, Error>(())
         })
         .await
   })
   .await;

   assert!(joined.unwrap_err().is_panic());
   assert_eq!(pool.ref_count(), 0);
   assert!(!pool.is_connected());
   wait_for_closes(&pool, 1).await;
}

#[tokio::test]
async fn test_with_connection_releases_when_cancelled() {
   let pool = new_pool(FakeDriver::default());

   let result = tokio::time::timeout(
      Duration::from_millis(20),
      pool.with_connection(|_handle| async move {
         futures::future::pending::<()>().await;
         Ok::<_, Error>(())
      }),
   )
   .await;

   assert!(result.is_err(), "operation should have been cut off");
   assert_eq!(pool.ref_count(), 0);
   wait_for_closes(&pool, 1).await;
}

#[tokio::test]
async fn test_cancelled_waiter_gives_back_reference() {
   let (driver, gate) = FakeDriver::gated();
   let pool = new_pool(driver);

   let task_pool = Arc::clone(&pool);
   let waiter = tokio::spawn(async move { task_pool.acquire().await });
   wait_for_ref_count(&pool, 1).await;

   waiter.abort();
   assert!(waiter.await.unwrap_err().is_cancelled());
   assert_eq!(pool.ref_count(), 0);

   // The abandoned attempt is picked up by the next caller instead of a new one
   gate.add_permits(1);
   let handle = pool.acquire().await.unwrap();
   assert_eq!(handle.id, 1);
   assert_eq!(pool.driver().connects.load(Ordering::SeqCst), 1);
   pool.release().await;
}

#[tokio::test]
async fn test_lease_drop_releases() {
   let pool = new_pool(FakeDriver::default());

   {
      let lease = pool.lease().await.unwrap();
      assert_eq!(lease.id, 1);
      assert_eq!(pool.ref_count(), 1);
   }

   assert_eq!(pool.ref_count(), 0);
   wait_for_closes(&pool, 1).await;
}

#[test]
fn test_lease_dropped_outside_runtime_still_releases() {
   let pool = new_pool(FakeDriver::default());
   let runtime = tokio::runtime::Runtime::new().unwrap();

   let lease = runtime.block_on(pool.lease()).unwrap();
   assert_eq!(pool.ref_count(), 1);

   // No runtime context here, so the handle is dropped without a close
   drop(lease);

   assert_eq!(pool.ref_count(), 0);
   assert!(!pool.is_connected());
   assert_eq!(pool.stats().closes, 1);
   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lease_explicit_release_closes_inline() {
   let pool = new_pool(FakeDriver::default());

   let lease = pool.lease().await.unwrap();
   lease.release().await;

   assert_eq!(pool.driver().closes.load(Ordering::SeqCst), 1);
   assert_eq!(pool.ref_count(), 0);
}

#[tokio::test]
async fn test_interleaved_requests_never_open_two_handles() {
   let pool = new_pool(FakeDriver::default());

   let tasks: Vec<_> = (0..32u64)
      .map(|i| {
         let pool = Arc::clone(&pool);
         tokio::spawn(async move {
            pool
               .with_connection(|handle| async move {
                  tokio::time::sleep(Duration::from_millis(i % 5)).await;
                  assert!(!handle.closed.load(Ordering::SeqCst));
                  Ok::<_, Error>(())
               })
               .await
               .unwrap();
         })
      })
      .collect();

   for task in tasks {
      task.await.unwrap();
   }

   let driver = pool.driver();
   assert_eq!(pool.ref_count(), 0);
   assert!(!pool.is_connected());
   assert_eq!(driver.max_open.load(Ordering::SeqCst), 1);
   assert_eq!(
      driver.connects.load(Ordering::SeqCst),
      driver.closes.load(Ordering::SeqCst)
   );
}
