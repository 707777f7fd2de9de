//! Record browsing and editing on behalf of an admin or tenant principal
//!
//! Every operation borrows the shared store handle through
//! [`ConnectionPool::with_connection`], so the handle is released however the
//! operation ends. Tenants only ever see and touch documents whose
//! `tenantId` matches the id recorded for their client configuration.

use std::sync::Arc;

use docstore_conn_mgr::{ConnectionPool, Driver};
use docstore_toolkit::{Document, DocumentStore, Filter, Namespace};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::form::FormSubmission;
use crate::identity::{self, IdentityDirectory, TENANT_ID_FIELD};
use crate::{AdminConfig, Error, Principal, Result};

/// Number of documents inspected when inferring field names.
pub const FIELD_SAMPLE_SIZE: usize = 100;

/// Dynamic type name of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
   String,
   Number,
   Boolean,
   /// Objects, arrays and null.
   Object,
}

impl FieldKind {
   pub fn of(value: &JsonValue) -> Self {
      match value {
         JsonValue::String(_) => FieldKind::String,
         JsonValue::Number(_) => FieldKind::Number,
         JsonValue::Bool(_) => FieldKind::Boolean,
         JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => FieldKind::Object,
      }
   }
}

/// A field seen in a collection and the kind of its first sampled value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
   pub name: String,
   pub kind: FieldKind,
}

/// Record operations over the shared store handle.
pub struct RecordService<D: Driver> {
   pool: Arc<ConnectionPool<D>>,
   identity: Namespace,
}

impl<D> Clone for RecordService<D>
where
   D: Driver,
{
   fn clone(&self) -> Self {
      Self {
         pool: Arc::clone(&self.pool),
         identity: self.identity.clone(),
      }
   }
}

impl<D> RecordService<D>
where
   D: Driver,
   D::Handle: DocumentStore,
{
   /// HTTP status for a created record.
   pub const CREATED: u16 = 201;

   /// Service over an existing pool. `identity` names the tenant records.
   pub fn new(pool: Arc<ConnectionPool<D>>, identity: Namespace) -> Self {
      Self { pool, identity }
   }

   /// Build the pool from configuration and wrap it.
   ///
   /// Nothing connects until the first operation. Fails with
   /// [`Error::InvalidConfig`] for in-memory stores.
   pub fn from_config(driver: D, config: &AdminConfig) -> Result<Self> {
      config.validate()?;
      let pool = ConnectionPool::new(driver, config.store_uri.as_str(), config.pool.clone())?;
      Ok(Self::new(Arc::new(pool), config.identity.clone()))
   }

   pub fn pool(&self) -> &Arc<ConnectionPool<D>> {
      &self.pool
   }

   /// Identity lookups sharing this service's pool.
   pub fn identity(&self) -> IdentityDirectory<D> {
      IdentityDirectory::new(Arc::clone(&self.pool), self.identity.clone())
   }

   pub async fn list_databases(&self, principal: &Principal) -> Result<Vec<String>> {
      require_admin(principal)?;
      self
         .pool
         .with_connection(|store| async move { Ok::<_, Error>(store.list_databases().await?) })
         .await
   }

   pub async fn list_tables(&self, database: &str, principal: &Principal) -> Result<Vec<String>> {
      require_admin(principal)?;
      self
         .pool
         .with_connection(|store| async move {
            Ok::<_, Error>(store.list_collections(database).await?)
         })
         .await
   }

   /// Field names of a collection with the kind of their first seen value,
   /// inferred from a sample of [`FIELD_SAMPLE_SIZE`] documents.
   pub async fn field_names(
      &self,
      database: &str,
      table: &str,
      principal: &Principal,
   ) -> Result<Vec<FieldInfo>> {
      require_admin(principal)?;
      let namespace = Namespace::new(database, table);

      let sample = self
         .pool
         .with_connection(|store| {
            let namespace = &namespace;
            async move {
               Ok::<_, Error>(
                  store
                     .find(namespace, &Filter::new(), Some(FIELD_SAMPLE_SIZE))
                     .await?,
               )
            }
         })
         .await?;

      Ok(infer_fields(&sample))
   }

   /// All documents of a collection visible to the principal.
   pub async fn query_table(
      &self,
      database: &str,
      table: &str,
      principal: &Principal,
   ) -> Result<Vec<Document>> {
      let namespace = Namespace::new(database, table);
      let tenants = &self.identity;

      let documents = self
         .pool
         .with_connection(|store| {
            let namespace = &namespace;
            async move {
               let scope = identity::resolve_scope(&*store, tenants, principal).await?;
               let filter = scoped(Filter::new(), scope.as_deref());
               Ok::<_, Error>(store.find(namespace, &filter, None).await?)
            }
         })
         .await?;

      debug!(%namespace, count = documents.len(), "Queried table");
      Ok(documents)
   }

   /// One record by `_id`.
   pub async fn fetch_record(
      &self,
      database: &str,
      table: &str,
      record_id: &str,
      principal: &Principal,
   ) -> Result<Document> {
      let namespace = Namespace::new(database, table);
      let tenants = &self.identity;

      let found = self
         .pool
         .with_connection(|store| {
            let namespace = &namespace;
            async move {
               let scope = identity::resolve_scope(&*store, tenants, principal).await?;
               let filter = scoped(Filter::by_id(record_id), scope.as_deref());
               Ok::<_, Error>(store.find_one(namespace, &filter).await?)
            }
         })
         .await?;

      found.ok_or_else(|| not_found(&namespace, record_id))
   }

   /// Insert the submitted fields as a new record.
   ///
   /// Records created by a tenant are stamped with its `tenantId`, replacing
   /// any submitted value.
   pub async fn create_record(
      &self,
      submission: &FormSubmission,
      principal: &Principal,
   ) -> Result<Document> {
      let namespace = submission.require_collection()?;
      let record = submission.coerced();
      let tenants = &self.identity;

      let stored = self
         .pool
         .with_connection(|store| {
            let namespace = &namespace;
            async move {
               let mut record = record;
               if let Some(tenant_id) =
                  identity::resolve_scope(&*store, tenants, principal).await?
               {
                  record.insert(TENANT_ID_FIELD.to_string(), JsonValue::String(tenant_id));
               }
               Ok::<_, Error>(store.insert_one(namespace, record).await?)
            }
         })
         .await?;

      info!(%namespace, admin = principal.is_admin(), "Created record");
      Ok(stored)
   }

   /// Set the submitted fields on an existing record and return it updated.
   ///
   /// Tenants can neither reach another tenant's record nor move a record
   /// to another tenant: a submitted `tenantId` is dropped.
   pub async fn update_record(
      &self,
      submission: &FormSubmission,
      principal: &Principal,
   ) -> Result<Document> {
      let (namespace, record_id) = submission.require_record()?;
      let mut fields = submission.coerced();
      if !principal.is_admin() {
         fields.shift_remove(TENANT_ID_FIELD);
      }
      let tenants = &self.identity;

      let updated = self
         .pool
         .with_connection(|store| {
            let namespace = &namespace;
            let record_id = record_id.as_str();
            async move {
               let scope = identity::resolve_scope(&*store, tenants, principal).await?;
               let filter = scoped(Filter::by_id(record_id), scope.as_deref());
               Ok::<_, Error>(store.find_one_and_update(namespace, &filter, fields).await?)
            }
         })
         .await?;

      match updated {
         Some(record) => {
            info!(%namespace, id = %record_id, "Updated record");
            Ok(record)
         }
         None => Err(not_found(&namespace, &record_id)),
      }
   }
}

fn require_admin(principal: &Principal) -> Result<()> {
   if principal.is_admin() {
      Ok(())
   } else {
      Err(Error::NotAuthorized)
   }
}

fn scoped(filter: Filter, tenant_id: Option<&str>) -> Filter {
   match tenant_id {
      Some(tenant_id) => filter.eq(TENANT_ID_FIELD, tenant_id),
      None => filter,
   }
}

fn not_found(namespace: &Namespace, record_id: &str) -> Error {
   Error::RecordNotFound {
      namespace: namespace.to_string(),
      id: record_id.to_string(),
   }
}

/// First-seen kind of every field across `documents`, in first-seen order.
pub fn infer_fields(documents: &[Document]) -> Vec<FieldInfo> {
   let mut kinds: IndexMap<&str, FieldKind> = IndexMap::new();
   for document in documents {
      for (name, value) in document {
         kinds.entry(name.as_str()).or_insert_with(|| FieldKind::of(value));
      }
   }

   kinds
      .into_iter()
      .map(|(name, kind)| FieldInfo {
         name: name.to_string(),
         kind,
      })
      .collect()
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn doc(value: JsonValue) -> Document {
      match value {
         JsonValue::Object(map) => map,
         other => panic!("not an object: {other}"),
      }
   }

   #[test]
   fn test_field_kinds() {
      assert_eq!(FieldKind::of(&json!("x")), FieldKind::String);
      assert_eq!(FieldKind::of(&json!(1.5)), FieldKind::Number);
      assert_eq!(FieldKind::of(&json!(false)), FieldKind::Boolean);
      assert_eq!(FieldKind::of(&json!([1])), FieldKind::Object);
      assert_eq!(FieldKind::of(&JsonValue::Null), FieldKind::Object);
      assert_eq!(serde_json::to_value(FieldKind::Boolean).unwrap(), json!("boolean"));
   }

   #[test]
   fn test_infer_fields_keeps_first_seen_kind() {
      let documents = vec![
         doc(json!({"_id": "a", "age": 30})),
         doc(json!({"_id": "b", "age": "thirty", "active": true})),
         doc(json!({"_id": "c", "tags": null})),
      ];

      let fields = infer_fields(&documents);
      let summary: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.kind)).collect();
      assert_eq!(
         summary,
         [
            ("_id", FieldKind::String),
            ("age", FieldKind::Number),
            ("active", FieldKind::Boolean),
            ("tags", FieldKind::Object),
         ]
      );
   }

   #[test]
   fn test_scoped_filter() {
      assert!(scoped(Filter::new(), None).is_empty());
      assert_eq!(
         scoped(Filter::by_id("r1"), Some("acme")).conditions()[1],
         ("tenantId".to_string(), json!("acme"))
      );
   }
}
