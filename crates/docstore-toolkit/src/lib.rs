//! Document store toolkit built on the shared connection manager.
//!
//! This crate sits between the connection manager (`docstore-conn-mgr`) and
//! application-level code (e.g., the admin record service). It provides:
//!
//! - [`DocumentStore`] : operations a connected driver handle offers
//! - [`SqliteDriver`] / [`SqliteDocumentStore`] : a driver keeping JSON documents in SQLite
//! - [`Filter`], [`Namespace`] and [`Document`] for addressing records
//! - [`coerce_value`] / [`coerce_fields`] : typing of string-valued form submissions
//!
//! # Example
//!
//! ```no_run
//! use docstore_toolkit::{
//!    ConnectionPool, DocumentStore, Filter, Namespace, PoolConfig, SqliteDriver, coerce_fields,
//! };
//! use indexmap::IndexMap;
//!
//! # async fn example() -> Result<(), docstore_toolkit::Error> {
//! let pool = ConnectionPool::new(SqliteDriver, "sqlite://admin.db", PoolConfig::default())?;
//! let users = Namespace::new("app", "users");
//!
//! let mut form = IndexMap::new();
//! form.insert("name".to_string(), "Alice".to_string());
//! form.insert("age".to_string(), "30".to_string());
//! let record = coerce_fields(&form);
//!
//! let stored = pool
//!    .with_connection(|store| async move {
//!       let inserted = store.insert_one(&users, record).await?;
//!       store.find_one(&users, &Filter::new().eq("age", 30)).await?;
//!       Ok::<_, docstore_toolkit::Error>(inserted)
//!    })
//!    .await?;
//! println!("stored {}", stored["_id"]);
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod error;
pub mod sqlite;
pub mod store;

pub use coerce::{coerce_fields, coerce_value};
pub use error::{Error, Result};
pub use sqlite::{SqliteDocumentStore, SqliteDriver, is_memory_uri};
pub use store::{Document, DocumentStore, Filter, ID_FIELD, Namespace, document_key};

// Re-export commonly used types from dependencies
pub use docstore_conn_mgr::{ConnectionLease, ConnectionPool, Driver, PoolConfig, PoolStats};
