//! ConnectionLease for scoped use of the shared handle

use crate::driver::Driver;
use crate::pool::ConnectionPool;
use std::ops::Deref;
use std::sync::Arc;

/// RAII guard holding one reference to the pool's shared handle
///
/// The lease derefs to the driver handle. Call [`release`](Self::release) to
/// give the reference back and await the close if this was the last user.
/// A lease that is dropped instead (early return, panic, cancelled future)
/// still releases its reference; the close then runs on a spawned task.
///
/// # Example
///
/// ```no_run
/// # use docstore_conn_mgr::{ConnectionPool, Driver};
/// # async fn example<D: Driver>(pool: &ConnectionPool<D>) -> Result<(), docstore_conn_mgr::Error> {
/// let lease = pool.lease().await?;
/// let handle: &D::Handle = &lease;
/// // ... use handle ...
/// lease.release().await;
/// # Ok(())
/// # }
/// ```
#[must_use = "dropping a lease immediately releases the connection"]
pub struct ConnectionLease<'a, D: Driver> {
   pool: &'a ConnectionPool<D>,
   handle: Arc<D::Handle>,
   released: bool,
}

impl<'a, D: Driver> ConnectionLease<'a, D> {
   pub(crate) fn new(pool: &'a ConnectionPool<D>, handle: Arc<D::Handle>) -> Self {
      Self {
         pool,
         handle,
         released: false,
      }
   }

   /// Shared pointer to the handle, for moving into an operation
   pub fn handle(&self) -> Arc<D::Handle> {
      Arc::clone(&self.handle)
   }

   /// Give the reference back, closing the handle if no other user remains
   pub async fn release(mut self) {
      let idle = self.pool.begin_release();
      self.released = true;
      if let Some(handle) = idle {
         self.pool.close_idle(handle).await;
      }
   }
}

impl<D: Driver> Deref for ConnectionLease<'_, D> {
   type Target = D::Handle;

   fn deref(&self) -> &Self::Target {
      &self.handle
   }
}

impl<D: Driver> Drop for ConnectionLease<'_, D> {
   fn drop(&mut self) {
      if !self.released {
         self.pool.release_detached();
      }
   }
}
