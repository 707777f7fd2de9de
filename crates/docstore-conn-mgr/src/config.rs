//! Configuration handed to a driver when the shared connection is established

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Driver options applied every time the pool establishes its shared connection
///
/// # Examples
///
/// ```
/// use docstore_conn_mgr::PoolConfig;
///
/// // Use defaults
/// let config = PoolConfig::default();
///
/// // Override just one field
/// let config = PoolConfig {
///     max_pool_size: 4,
///     ..Default::default()
/// };
/// assert_eq!(config.server_selection_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
   /// Maximum number of sockets the driver keeps open behind the shared handle
   ///
   /// Default: 10
   pub max_pool_size: u32,

   /// How long the driver may spend locating a usable server (in milliseconds)
   ///
   /// Default: 5000
   pub server_selection_timeout_ms: u64,

   /// Idle time after which the driver closes an individual socket (in milliseconds)
   ///
   /// Default: 45000
   pub socket_timeout_ms: u64,
}

impl PoolConfig {
   pub fn server_selection_timeout(&self) -> Duration {
      Duration::from_millis(self.server_selection_timeout_ms)
   }

   pub fn socket_timeout(&self) -> Duration {
      Duration::from_millis(self.socket_timeout_ms)
   }
}

impl Default for PoolConfig {
   fn default() -> Self {
      Self {
         max_pool_size: 10,
         server_selection_timeout_ms: 5_000,
         socket_timeout_ms: 45_000,
      }
   }
}
