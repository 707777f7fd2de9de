//! SQLite-backed document store driver
//!
//! Every document lives as JSON text in one `documents` table keyed by
//! database, collection and `_id`. Field filters compare `json_extract`
//! results, and updates rewrite the stored body with `json_set` in a single
//! statement, so each write is atomic on its own.

use std::str::FromStr;

use docstore_conn_mgr::{Driver, PoolConfig};
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::store::{Document, DocumentStore, Filter, ID_FIELD, Namespace, document_key};
use crate::{Error, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
   database_name TEXT NOT NULL,
   collection_name TEXT NOT NULL,
   id TEXT NOT NULL,
   body TEXT NOT NULL CHECK (json_valid(body)),
   PRIMARY KEY (database_name, collection_name, id)
);
"#;

/// Driver opening [`SqliteDocumentStore`] handles from sqlx connection strings
/// such as `sqlite://data/admin.db` or `sqlite::memory:`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
   type Handle = SqliteDocumentStore;
   type Error = Error;

   async fn connect(&self, uri: &str, config: &PoolConfig) -> Result<SqliteDocumentStore> {
      SqliteDocumentStore::open(uri, config).await
   }

   async fn close(&self, handle: &SqliteDocumentStore) -> Result<()> {
      handle.close().await;
      Ok(())
   }
}

/// Connected SQLite document store.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
   pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
   /// Open the store at `uri`, creating the file and schema when missing.
   ///
   /// In-memory stores are pinned to a single connection that never idles
   /// out, since every SQLite connection to `:memory:` is a separate database.
   pub async fn open(uri: &str, config: &PoolConfig) -> Result<Self> {
      let in_memory = is_memory_uri(uri);
      let mut options = SqliteConnectOptions::from_str(uri)?
         .create_if_missing(true)
         .busy_timeout(config.server_selection_timeout());

      if !in_memory {
         // https://www.sqlite.org/wal.html#performance_considerations
         options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
      }

      let pool_options = SqlitePoolOptions::new().acquire_timeout(config.server_selection_timeout());
      let pool_options = if in_memory {
         pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
      } else {
         pool_options
            .max_connections(config.max_pool_size.max(1))
            .min_connections(0)
            .idle_timeout(Some(config.socket_timeout()))
      };

      let pool = pool_options.connect_with(options).await?;
      sqlx::raw_sql(SCHEMA).execute(&pool).await?;
      debug!(uri, in_memory, "Opened SQLite document store");

      Ok(Self { pool })
   }

   /// Close every pooled connection.
   pub async fn close(&self) {
      self.pool.close().await;
   }

   pub fn is_closed(&self) -> bool {
      self.pool.is_closed()
   }
}

impl DocumentStore for SqliteDocumentStore {
   async fn list_databases(&self) -> Result<Vec<String>> {
      let names: Vec<String> = sqlx::query_scalar(
         "SELECT DISTINCT database_name FROM documents ORDER BY database_name",
      )
      .fetch_all(&self.pool)
      .await?;
      Ok(names)
   }

   async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
      let names: Vec<String> = sqlx::query_scalar(
         "SELECT DISTINCT collection_name FROM documents WHERE database_name = ? ORDER BY collection_name",
      )
      .bind(database)
      .fetch_all(&self.pool)
      .await?;
      Ok(names)
   }

   async fn find(
      &self,
      namespace: &Namespace,
      filter: &Filter,
      limit: Option<usize>,
   ) -> Result<Vec<Document>> {
      let mut query = select_matching(namespace, filter, "body")?;
      query.push(" ORDER BY rowid");
      if let Some(limit) = limit {
         query.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
      }

      let bodies: Vec<String> = query.build_query_scalar().fetch_all(&self.pool).await?;
      trace!(%namespace, count = bodies.len(), "Fetched documents");
      bodies.iter().map(|body| parse_document(body)).collect()
   }

   async fn find_one(&self, namespace: &Namespace, filter: &Filter) -> Result<Option<Document>> {
      let mut query = select_matching(namespace, filter, "body")?;
      query.push(" ORDER BY rowid LIMIT 1");

      let body: Option<String> = query
         .build_query_scalar()
         .fetch_optional(&self.pool)
         .await?;
      body.as_deref().map(parse_document).transpose()
   }

   async fn insert_one(&self, namespace: &Namespace, document: Document) -> Result<Document> {
      let (id, document) = with_id_first(document)?;
      let body = serde_json::to_string(&document)?;

      sqlx::query(
         "INSERT INTO documents (database_name, collection_name, id, body) VALUES (?, ?, ?, ?)",
      )
      .bind(&namespace.database)
      .bind(&namespace.collection)
      .bind(&id)
      .bind(body)
      .execute(&self.pool)
      .await?;

      debug!(%namespace, id = %id, "Inserted document");
      Ok(document)
   }

   async fn find_one_and_update(
      &self,
      namespace: &Namespace,
      filter: &Filter,
      fields: Document,
   ) -> Result<Option<Document>> {
      let assignments: Vec<(String, String)> = fields
         .iter()
         .filter(|(name, _)| name.as_str() != ID_FIELD)
         .map(|(name, value)| -> Result<(String, String)> {
            Ok((field_path(name)?, value.to_string()))
         })
         .collect::<Result<_>>()?;

      if assignments.is_empty() {
         return self.find_one(namespace, filter).await;
      }

      let mut query = QueryBuilder::<Sqlite>::new("UPDATE documents SET body = json_set(body");
      for (path, value) in assignments {
         query
            .push(", ")
            .push_bind(path)
            .push(", json(")
            .push_bind(value)
            .push(")");
      }
      query.push(") WHERE rowid = (");
      push_select(&mut query, namespace, filter, "rowid")?;
      query.push(" ORDER BY rowid LIMIT 1) RETURNING body");

      let body: Option<String> = query
         .build_query_scalar()
         .fetch_optional(&self.pool)
         .await?;

      debug!(%namespace, matched = body.is_some(), "Updated document");
      body.as_deref().map(parse_document).transpose()
   }
}

/// Whether `uri` names an in-memory database.
///
/// Its contents only live while a handle is open, so they are lost every
/// time the shared connection is closed.
pub fn is_memory_uri(uri: &str) -> bool {
   uri.contains(":memory:") || uri.contains("mode=memory")
}

/// JSON path addressing a top-level member.
fn field_path(field: &str) -> Result<String> {
   if field.is_empty() || field.contains('"') {
      return Err(Error::InvalidFieldName(field.to_string()));
   }
   Ok(format!("$.\"{field}\""))
}

fn select_matching<'args>(
   namespace: &Namespace,
   filter: &Filter,
   column: &str,
) -> Result<QueryBuilder<'args, Sqlite>> {
   let mut query = QueryBuilder::new("");
   push_select(&mut query, namespace, filter, column)?;
   Ok(query)
}

fn push_select(
   query: &mut QueryBuilder<'_, Sqlite>,
   namespace: &Namespace,
   filter: &Filter,
   column: &str,
) -> Result<()> {
   query
      .push("SELECT ")
      .push(column)
      .push(" FROM documents WHERE database_name = ")
      .push_bind(namespace.database.clone())
      .push(" AND collection_name = ")
      .push_bind(namespace.collection.clone());

   for (field, value) in filter.conditions() {
      if field == ID_FIELD {
         query.push(" AND id = ").push_bind(document_key(value)?);
      } else if value.is_null() {
         // A missing member has no json_type and counts as null
         query
            .push(" AND COALESCE(json_type(body, ")
            .push_bind(field_path(field)?)
            .push("), 'null') = 'null'");
      } else {
         // json_extract alone maps true to 1 and objects to text
         let path = field_path(field)?;
         query
            .push(" AND json_type(body, ")
            .push_bind(path.clone())
            .push(") IN (")
            .push(json_types(value))
            .push(") AND json_extract(body, ")
            .push_bind(path)
            .push(") = json_extract(")
            .push_bind(value.to_string())
            .push(", '$')");
      }
   }

   Ok(())
}

/// SQLite `json_type` names a stored member must have to equal `value`.
fn json_types(value: &JsonValue) -> &'static str {
   match value {
      JsonValue::Null => "'null'",
      JsonValue::Bool(true) => "'true'",
      JsonValue::Bool(false) => "'false'",
      JsonValue::Number(_) => "'integer', 'real'",
      JsonValue::String(_) => "'text'",
      JsonValue::Array(_) => "'array'",
      JsonValue::Object(_) => "'object'",
   }
}

/// Ensure the document has an `_id`, placed as its first member.
fn with_id_first(mut document: Document) -> Result<(String, Document)> {
   let id_value = match document.shift_remove(ID_FIELD) {
      Some(value) => value,
      None => JsonValue::String(Uuid::new_v4().simple().to_string()),
   };
   let id = document_key(&id_value)?;

   let mut ordered = Document::with_capacity(document.len() + 1);
   ordered.insert(ID_FIELD.to_string(), id_value);
   ordered.extend(document);
   Ok((id, ordered))
}

fn parse_document(body: &str) -> Result<Document> {
   match serde_json::from_str(body)? {
      JsonValue::Object(document) => Ok(document),
      other => Err(Error::NotADocument(other.to_string())),
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_field_path() {
      assert_eq!(field_path("tenantId").unwrap(), "$.\"tenantId\"");
      assert_eq!(field_path("a.b").unwrap(), "$.\"a.b\"");
      assert!(matches!(field_path("a\"b"), Err(Error::InvalidFieldName(_))));
      assert!(field_path("").is_err());
   }

   #[test]
   fn test_json_types() {
      assert_eq!(json_types(&json!(true)), "'true'");
      assert_eq!(json_types(&json!(1)), "'integer', 'real'");
      assert_eq!(json_types(&json!({"a": 1})), "'object'");
      assert_eq!(json_types(&json!("{\"a\":1}")), "'text'");
   }

   #[test]
   fn test_memory_uri_detection() {
      assert!(is_memory_uri("sqlite::memory:"));
      assert!(is_memory_uri("sqlite://shared?mode=memory&cache=shared"));
      assert!(!is_memory_uri("sqlite://data/admin.db"));
   }

   #[test]
   fn test_with_id_first_generates_id() {
      let mut document = Document::new();
      document.insert("name".into(), json!("Alice"));

      let (id, document) = with_id_first(document).unwrap();
      assert_eq!(id.len(), 32);
      assert_eq!(document.keys().next().map(String::as_str), Some("_id"));
      assert_eq!(document["_id"], json!(id));
   }

   #[test]
   fn test_with_id_first_moves_existing_id() {
      let mut document = Document::new();
      document.insert("name".into(), json!("Alice"));
      document.insert("_id".into(), json!(7));

      let (id, document) = with_id_first(document).unwrap();
      assert_eq!(id, "7");
      let keys: Vec<_> = document.keys().map(String::as_str).collect();
      assert_eq!(keys, ["_id", "name"]);
   }

   #[test]
   fn test_parse_document_rejects_non_objects() {
      assert!(parse_document(r#"{"a":1}"#).is_ok());
      assert!(matches!(parse_document("[1]"), Err(Error::NotADocument(_))));
   }
}
