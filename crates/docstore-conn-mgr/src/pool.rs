//! Lazily connected, reference-counted shared document store handle

use crate::Result;
use crate::config::PoolConfig;
use crate::driver::Driver;
use crate::error::{DriverError, Error};
use crate::lease::ConnectionLease;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

type ConnectFuture<H> = Shared<BoxFuture<'static, std::result::Result<Arc<H>, DriverError>>>;

/// The single in-flight connection attempt every concurrent acquirer awaits
struct PendingConnect<H> {
   attempt: u64,
   future: ConnectFuture<H>,
}

struct PoolState<H> {
   handle: Option<Arc<H>>,
   pending: Option<PendingConnect<H>>,
   ref_count: usize,
   last_attempt: u64,
}

/// Point-in-time view of the pool, mostly useful for tests and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
   /// Callers currently holding (or waiting for) the shared handle
   pub ref_count: usize,
   /// Whether an established handle is currently installed
   pub connected: bool,
   /// Physical connection attempts made over the lifetime of the pool
   pub connect_attempts: u64,
   /// Handles torn down because the reference count reached zero
   pub closes: u64,
}

/// Owner of the one shared connection to the backing document store.
///
/// The first caller to [`acquire`](Self::acquire) starts a connection attempt;
/// callers arriving while it is in flight await the same attempt rather than
/// opening their own. Every successful acquire must be paired with exactly one
/// [`release`](Self::release). When the last reference is released the handle
/// is closed and the next acquire connects again.
///
/// Application code should prefer [`with_connection`](Self::with_connection),
/// which guarantees the release even when the operation fails, panics or is
/// cancelled.
///
/// # Example
///
/// ```no_run
/// # use docstore_conn_mgr::{ConnectionPool, Driver};
/// # async fn example<D: Driver>(driver: D) -> Result<(), docstore_conn_mgr::Error> {
/// let pool = ConnectionPool::new(driver, "sqlite://admin.db", Default::default())?;
///
/// let answer = pool
///    .with_connection(|_handle| async move { Ok::<_, docstore_conn_mgr::Error>(42) })
///    .await?;
/// assert_eq!(answer, 42);
/// # Ok(())
/// # }
/// ```
pub struct ConnectionPool<D: Driver> {
   driver: Arc<D>,
   uri: Arc<str>,
   config: PoolConfig,
   state: Mutex<PoolState<D::Handle>>,
   connect_attempts: Arc<AtomicU64>,
   closes: AtomicU64,
}

impl<D: Driver> ConnectionPool<D> {
   /// Create an idle pool. Nothing is connected until the first acquire.
   ///
   /// Returns [`Error::MissingConnectionString`] when `connection_string` is
   /// blank.
   pub fn new(
      driver: D,
      connection_string: impl Into<String>,
      config: PoolConfig,
   ) -> Result<Self> {
      let uri: String = connection_string.into();
      if uri.trim().is_empty() {
         return Err(Error::MissingConnectionString);
      }

      Ok(Self {
         driver: Arc::new(driver),
         uri: uri.into(),
         config,
         state: Mutex::new(PoolState {
            handle: None,
            pending: None,
            ref_count: 0,
            last_attempt: 0,
         }),
         connect_attempts: Arc::new(AtomicU64::new(0)),
         closes: AtomicU64::new(0),
      })
   }

   pub fn driver(&self) -> &D {
      &self.driver
   }

   pub fn config(&self) -> &PoolConfig {
      &self.config
   }

   /// Number of outstanding references to the shared handle
   pub fn ref_count(&self) -> usize {
      self.state.lock().ref_count
   }

   /// Whether an established handle is currently installed
   pub fn is_connected(&self) -> bool {
      self.state.lock().handle.is_some()
   }

   pub fn stats(&self) -> PoolStats {
      let state = self.state.lock();
      PoolStats {
         ref_count: state.ref_count,
         connected: state.handle.is_some(),
         connect_attempts: self.connect_attempts.load(Ordering::SeqCst),
         closes: self.closes.load(Ordering::SeqCst),
      }
   }

   /// Take a reference to the shared handle, connecting first if necessary.
   ///
   /// On failure the pending attempt is cleared so the next call starts from
   /// scratch, and the caller's reference is dropped. Callers that use this
   /// directly must call [`release`](Self::release) exactly once after a
   /// successful acquire.
   pub async fn acquire(&self) -> Result<Arc<D::Handle>> {
      let (attempt, future) = {
         let mut state = self.state.lock();
         state.ref_count += 1;

         if let Some(handle) = &state.handle {
            debug!(active = state.ref_count, "Getting document store connection");
            return Ok(Arc::clone(handle));
         }

         let joined = state
            .pending
            .as_ref()
            .map(|pending| (pending.attempt, pending.future.clone()));

         match joined {
            Some(joined) => joined,
            None => {
               state.last_attempt += 1;
               let attempt = state.last_attempt;
               let future = self.connect_future();
               state.pending = Some(PendingConnect {
                  attempt,
                  future: future.clone(),
               });
               debug!(attempt, "Creating new document store client");
               (attempt, future)
            }
         }
      };

      // Dropping this future while the attempt is in flight gives the
      // reference back.
      let join = JoinGuard::new(self);
      let outcome = future.await;
      join.disarm();

      match outcome {
         Ok(handle) => {
            let mut state = self.state.lock();
            if state.pending.as_ref().is_some_and(|p| p.attempt == attempt) {
               state.pending = None;
               state.handle = Some(Arc::clone(&handle));
            }
            debug!(active = state.ref_count, "Getting document store connection");
            Ok(handle)
         }
         Err(err) => {
            let idle = {
               let mut state = self.state.lock();
               if state.pending.as_ref().is_some_and(|p| p.attempt == attempt) {
                  state.pending = None;
                  state.handle = None;
               }
               self.drop_reference(&mut state)
            };
            if let Some(handle) = idle {
               self.close_idle(handle).await;
            }
            Err(Error::Connect(err))
         }
      }
   }

   /// Give back a reference taken by [`acquire`](Self::acquire).
   ///
   /// Closes the handle once no references remain. Close failures are logged
   /// and the pool is reset regardless. Releasing more times than acquiring
   /// is tolerated: the count stays at zero and nothing is closed twice.
   pub async fn release(&self) {
      if let Some(handle) = self.begin_release() {
         self.close_idle(handle).await;
      }
   }

   /// Acquire a reference wrapped in a guard that releases it when dropped
   pub async fn lease(&self) -> Result<ConnectionLease<'_, D>> {
      let handle = self.acquire().await?;
      Ok(ConnectionLease::new(self, handle))
   }

   /// Run `operation` against the shared handle, releasing it afterwards.
   ///
   /// The reference is released exactly once whether the operation returns
   /// `Ok`, returns `Err`, panics, or is dropped before completing.
   pub async fn with_connection<F, Fut, T, E>(&self, operation: F) -> std::result::Result<T, E>
   where
      F: FnOnce(Arc<D::Handle>) -> Fut,
      Fut: Future<Output = std::result::Result<T, E>>,
      E: From<Error>,
   {
      let lease = self.lease().await?;
      let result = operation(lease.handle()).await;
      lease.release().await;
      result
   }

   /// Decrement the count and hand back the handle if it is now idle
   pub(crate) fn begin_release(&self) -> Option<Arc<D::Handle>> {
      let mut state = self.state.lock();
      if state.ref_count == 0 {
         warn!("Document store connection released more times than it was acquired");
         return None;
      }
      self.drop_reference(&mut state)
   }

   /// Release without awaiting the close. Used from `Drop` implementations.
   pub(crate) fn release_detached(&self) {
      let Some(handle) = self.begin_release() else {
         return;
      };

      match tokio::runtime::Handle::try_current() {
         Ok(runtime) => {
            let driver = Arc::clone(&self.driver);
            runtime.spawn(async move {
               if let Err(err) = driver.close(&handle).await {
                  error!("Error closing document store client: {}", err);
               }
            });
         }
         Err(_) => warn!("No tokio runtime available, dropping document store client without closing"),
      }
   }

   fn drop_reference(&self, state: &mut PoolState<D::Handle>) -> Option<Arc<D::Handle>> {
      state.ref_count = state.ref_count.saturating_sub(1);
      debug!(remaining = state.ref_count, "Releasing document store connection");
      if state.ref_count > 0 {
         return None;
      }

      let handle = state.handle.take()?;
      self.closes.fetch_add(1, Ordering::SeqCst);
      Some(handle)
   }

   pub(crate) async fn close_idle(&self, handle: Arc<D::Handle>) {
      debug!("No active connections, closing document store client");
      match self.driver.close(&handle).await {
         Ok(()) => debug!("Document store client closed successfully"),
         Err(err) => error!("Error closing document store client: {}", err),
      }
   }

   fn connect_future(&self) -> ConnectFuture<D::Handle> {
      let driver = Arc::clone(&self.driver);
      let uri = Arc::clone(&self.uri);
      let config = self.config.clone();
      let attempts = Arc::clone(&self.connect_attempts);

      async move {
         attempts.fetch_add(1, Ordering::SeqCst);
         match driver.connect(&uri, &config).await {
            Ok(handle) => {
               debug!("Document store connected successfully");
               Ok(Arc::new(handle))
            }
            Err(err) => {
               error!("Failed to connect to document store: {}", err);
               Err(Arc::new(err) as DriverError)
            }
         }
      }
      .boxed()
      .shared()
   }
}

impl<D: Driver> fmt::Debug for ConnectionPool<D> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionPool")
         .field("config", &self.config)
         .field("stats", &self.stats())
         .finish_non_exhaustive()
   }
}

/// Holds an acquirer's reference while it waits on a pending attempt
struct JoinGuard<'a, D: Driver> {
   pool: &'a ConnectionPool<D>,
   armed: bool,
}

impl<'a, D: Driver> JoinGuard<'a, D> {
   fn new(pool: &'a ConnectionPool<D>) -> Self {
      Self { pool, armed: true }
   }

   fn disarm(mut self) {
      self.armed = false;
   }
}

impl<D: Driver> Drop for JoinGuard<'_, D> {
   fn drop(&mut self) {
      if self.armed {
         debug!("Connection attempt abandoned by caller");
         self.pool.release_detached();
      }
   }
}
