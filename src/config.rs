//! Startup configuration read from the process environment

use docstore_conn_mgr::PoolConfig;
use docstore_toolkit::{Namespace, is_memory_uri};

use crate::{Error, Result};

/// Connection string of the backing store (required).
pub const STORE_URI_VAR: &str = "WIZE_STORE_URI";
/// Upper bound on sockets behind the shared handle.
pub const POOL_MAX_SIZE_VAR: &str = "WIZE_POOL_MAX_SIZE";
/// Database holding tenant records.
pub const IDENTITY_DB_VAR: &str = "WIZE_IDENTITY_DB";
/// Collection holding tenant records.
pub const TENANTS_COLLECTION_VAR: &str = "WIZE_TENANTS_COLLECTION";

pub const DEFAULT_IDENTITY_DB: &str = "wize-identity";
pub const DEFAULT_TENANTS_COLLECTION: &str = "tenants";

/// Everything the admin backend needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
   pub store_uri: String,
   pub pool: PoolConfig,
   pub identity: Namespace,
}

impl AdminConfig {
   /// Build a configuration around an explicit connection string, with
   /// default pool options and identity namespace.
   pub fn new(store_uri: impl Into<String>) -> Self {
      Self {
         store_uri: store_uri.into(),
         pool: PoolConfig::default(),
         identity: Namespace::new(DEFAULT_IDENTITY_DB, DEFAULT_TENANTS_COLLECTION),
      }
   }

   /// Reject settings the shared connection cannot honour.
   ///
   /// In-memory stores are refused: the pool closes its handle between
   /// requests, which would discard every write.
   pub fn validate(&self) -> Result<()> {
      if is_memory_uri(&self.store_uri) {
         return Err(Error::InvalidConfig {
            name: STORE_URI_VAR,
            value: self.store_uri.clone(),
         });
      }
      Ok(())
   }

   /// Read the configuration from environment variables.
   ///
   /// A missing or blank `WIZE_STORE_URI` is an error; the process should
   /// not start without it.
   pub fn from_env() -> Result<Self> {
      Self::from_lookup(|name| std::env::var(name).ok())
   }

   /// Same as [`AdminConfig::from_env`] with a custom variable source.
   pub fn from_lookup<F>(lookup: F) -> Result<Self>
   where
      F: Fn(&str) -> Option<String>,
   {
      let store_uri = lookup(STORE_URI_VAR)
         .map(|v| v.trim().to_string())
         .filter(|v| !v.is_empty())
         .ok_or(Error::MissingConnectionString(STORE_URI_VAR))?;

      let mut config = Self::new(store_uri);
      config.validate()?;

      if let Some(raw) = lookup(POOL_MAX_SIZE_VAR) {
         config.pool.max_pool_size = match raw.trim().parse::<u32>() {
            Ok(size) if size > 0 => size,
            _ => {
               return Err(Error::InvalidConfig {
                  name: POOL_MAX_SIZE_VAR,
                  value: raw,
               });
            }
         };
      }

      if let Some(database) = non_empty(lookup(IDENTITY_DB_VAR)) {
         config.identity.database = database;
      }
      if let Some(collection) = non_empty(lookup(TENANTS_COLLECTION_VAR)) {
         config.identity.collection = collection;
      }

      Ok(config)
   }
}

fn non_empty(value: Option<String>) -> Option<String> {
   value.filter(|v| !v.trim().is_empty())
}
