//! Core of the Wize multi-tenant admin backend.
//!
//! Operators browse databases, collections and records of a document store,
//! either as the admin role or as a tenant whose reads and writes are scoped
//! to its `tenantId`. All store access goes through one lazily connected,
//! reference-counted handle ([`ConnectionPool`]).
//!
//! # Example
//!
//! ```no_run
//! use wize_admin::{AdminConfig, FormSubmission, Principal, RecordService, SqliteDriver};
//!
//! # async fn example() -> wize_admin::Result<()> {
//! let config = AdminConfig::from_env()?;
//! let records = RecordService::from_config(SqliteDriver, &config)?;
//!
//! let form = FormSubmission::from_pairs([
//!    ("db", "shop"),
//!    ("table", "products"),
//!    ("name", "Widget"),
//!    ("stock", "12"),
//! ]);
//! let created = records.create_record(&form, &Principal::Admin).await?;
//!
//! let tenant = Principal::tenant("cfg-acme");
//! let visible = records.query_table("shop", "products", &tenant).await?;
//! println!("created {} ({} visible to tenant)", created["_id"], visible.len());
//! # Ok(())
//! # }
//! ```

mod access;
mod config;
mod error;
mod form;
mod identity;
mod records;

pub use access::{ADMIN_CLIENT, Principal};
pub use config::{
   AdminConfig, DEFAULT_IDENTITY_DB, DEFAULT_TENANTS_COLLECTION, IDENTITY_DB_VAR, POOL_MAX_SIZE_VAR,
   STORE_URI_VAR, TENANTS_COLLECTION_VAR,
};
pub use error::{Error, Result};
pub use form::{DB_KEY, FormSubmission, RECORD_ID_KEY, TABLE_KEY};
pub use identity::{API_KEY_FIELD, CLIENT_APP_FIELD, IdentityDirectory, TENANT_ID_FIELD};
pub use records::{FIELD_SAMPLE_SIZE, FieldInfo, FieldKind, RecordService, infer_fields};

// Re-export commonly used types from the store layers
pub use docstore_conn_mgr::{ConnectionPool, Driver, PoolConfig, PoolStats};
pub use docstore_toolkit::{Document, DocumentStore, Filter, Namespace, SqliteDriver, coerce_value};
