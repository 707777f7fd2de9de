//! # docstore-conn-mgr
//!
//! Shares one lazily established connection to a document store between every
//! concurrent request in a process, and closes it once nobody is using it.
//!
//! ## Core Types
//!
//! - **[`ConnectionPool`]**: Owns the shared handle, its reference count and the pending connect
//! - **[`Driver`]**: Trait a store client implements so the pool can connect and close it
//! - **[`ConnectionLease`]**: RAII guard releasing its reference on drop
//! - **[`PoolConfig`]**: Driver options applied on every connect
//! - **[`Error`]**: Error type for pool operations
//!
//! ## Architecture
//!
//! - **Single physical connection**: Concurrent acquirers join one in-flight attempt
//! - **Reference counting**: The handle is closed when the count drops from one to zero
//! - **Retry by reacquiring**: A failed attempt clears all state; the next acquire starts over
//! - **No global state**: Pools are plain values, constructed with an explicit connection string
//!
//! ## Usage
//!
//! ```no_run
//! use docstore_conn_mgr::{ConnectionPool, Driver, PoolConfig};
//!
//! # async fn example<D: Driver>(driver: D) -> docstore_conn_mgr::Result<()> {
//! let pool = ConnectionPool::new(driver, "sqlite://admin.db", PoolConfig::default())?;
//!
//! // Preferred: the reference is released however the operation ends
//! pool.with_connection(|handle| async move {
//!    // ... issue reads and writes through `handle` ...
//!    Ok::<_, docstore_conn_mgr::Error>(())
//! })
//! .await?;
//!
//! // Escape hatch: manual pairing
//! let handle = pool.acquire().await?;
//! drop(handle);
//! pool.release().await;
//! # Ok(())
//! # }
//! ```
//!
mod config;
mod driver;
mod error;
mod lease;
mod pool;

// Re-export public types
pub use config::PoolConfig;
pub use driver::Driver;
pub use error::{DriverError, Error};
pub use lease::ConnectionLease;
pub use pool::{ConnectionPool, PoolStats};

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
