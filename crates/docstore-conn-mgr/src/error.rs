//! Error types for docstore-conn-mgr

use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a driver, shared between every caller that waited on
/// the same connection attempt
pub type DriverError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that may occur when working with docstore-conn-mgr
#[derive(Error, Debug, Clone)]
pub enum Error {
   /// The pool was constructed without a connection string
   #[error("connection string is empty")]
   MissingConnectionString,

   /// Establishing the shared connection failed. Every acquirer that joined
   /// the failed attempt receives a clone of the same driver error.
   #[error("failed to connect to document store: {0}")]
   Connect(DriverError),
}
