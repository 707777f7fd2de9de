//! Lookups against the tenant records of the identity database

use std::sync::Arc;

use docstore_conn_mgr::{ConnectionPool, Driver};
use docstore_toolkit::{DocumentStore, Filter, ID_FIELD, Namespace, document_key};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{Error, Principal, Result};

pub const CLIENT_APP_FIELD: &str = "clientApp";
pub const TENANT_ID_FIELD: &str = "tenantId";
pub const API_KEY_FIELD: &str = "apiKey";

/// Tenant records keyed by client configuration id.
pub struct IdentityDirectory<D: Driver> {
   pool: Arc<ConnectionPool<D>>,
   namespace: Namespace,
}

impl<D> Clone for IdentityDirectory<D>
where
   D: Driver,
{
   fn clone(&self) -> Self {
      Self {
         pool: Arc::clone(&self.pool),
         namespace: self.namespace.clone(),
      }
   }
}

impl<D> IdentityDirectory<D>
where
   D: Driver,
   D::Handle: DocumentStore,
{
   pub fn new(pool: Arc<ConnectionPool<D>>, namespace: Namespace) -> Self {
      Self { pool, namespace }
   }

   /// Every configured client, `_id` to `clientApp`, in stored order.
   pub async fn client_keys(&self) -> Result<IndexMap<String, String>> {
      let namespace = &self.namespace;
      self
         .pool
         .with_connection(|store| async move { client_keys(&*store, namespace).await })
         .await
   }

   /// `tenantId` of the given client configuration.
   pub async fn tenant_id(&self, configuration_id: &str) -> Result<Option<String>> {
      let namespace = &self.namespace;
      self
         .pool
         .with_connection(|store| async move {
            tenant_field(&*store, namespace, configuration_id, TENANT_ID_FIELD).await
         })
         .await
   }

   /// `apiKey` of the given client.
   pub async fn api_key(&self, client_id: &str) -> Result<Option<String>> {
      let namespace = &self.namespace;
      self
         .pool
         .with_connection(|store| async move {
            tenant_field(&*store, namespace, client_id, API_KEY_FIELD).await
         })
         .await
   }
}

pub(crate) async fn client_keys<S>(store: &S, namespace: &Namespace) -> Result<IndexMap<String, String>>
where
   S: DocumentStore,
{
   let tenants = store.find(namespace, &Filter::new(), None).await?;
   let mut keys = IndexMap::with_capacity(tenants.len());

   for tenant in tenants {
      let Some(id) = tenant.get(ID_FIELD).and_then(|id| document_key(id).ok()) else {
         warn!(%namespace, "Skipping tenant record without a usable _id");
         continue;
      };
      match tenant.get(CLIENT_APP_FIELD).and_then(text) {
         Some(client_app) => {
            keys.insert(id, client_app);
         }
         None => warn!(%namespace, id = %id, "Skipping tenant record without clientApp"),
      }
   }

   debug!(%namespace, count = keys.len(), "Loaded client keys");
   Ok(keys)
}

/// Text value of one member of the tenant record with the given `_id`.
pub(crate) async fn tenant_field<S>(
   store: &S,
   namespace: &Namespace,
   id: &str,
   field: &str,
) -> Result<Option<String>>
where
   S: DocumentStore,
{
   let tenant = store.find_one(namespace, &Filter::by_id(id)).await?;
   Ok(tenant.as_ref().and_then(|t| t.get(field)).and_then(text))
}

/// Tenant id a principal is scoped to. Admins are not scoped.
pub(crate) async fn resolve_scope<S>(
   store: &S,
   namespace: &Namespace,
   principal: &Principal,
) -> Result<Option<String>>
where
   S: DocumentStore,
{
   let Some(configuration_id) = principal.configuration_id() else {
      return Ok(None);
   };

   match tenant_field(store, namespace, configuration_id, TENANT_ID_FIELD).await? {
      Some(tenant_id) => Ok(Some(tenant_id)),
      None => Err(Error::TenantNotFound(configuration_id.to_string())),
   }
}

fn text(value: &JsonValue) -> Option<String> {
   match value {
      JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
      JsonValue::Number(n) => Some(n.to_string()),
      _ => None,
   }
}
