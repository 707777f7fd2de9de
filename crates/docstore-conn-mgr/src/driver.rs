//! The seam between the pool and a concrete document store client

use crate::config::PoolConfig;
use std::future::Future;

/// A document store client that can open and close a session
///
/// The pool calls [`connect`](Driver::connect) at most once per idle period
/// and [`close`](Driver::close) once the last user releases the handle.
/// Both futures must be `Send` so connection attempts can be shared across
/// tasks running on a multi-threaded runtime.
pub trait Driver: Send + Sync + 'static {
   /// Live session with the store. Shared between callers behind an `Arc`.
   type Handle: Send + Sync + 'static;

   /// Error reported for failed connects and closes
   type Error: std::error::Error + Send + Sync + 'static;

   /// Establish a new session using `uri` and the pool's driver options
   fn connect(
      &self,
      uri: &str,
      config: &PoolConfig,
   ) -> impl Future<Output = Result<Self::Handle, Self::Error>> + Send;

   /// Tear down a session, releasing its network resources
   fn close(&self, handle: &Self::Handle) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
