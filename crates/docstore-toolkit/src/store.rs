//! Document store operations shared by every driver handle

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{Error, Result};

/// A stored record: a JSON object carrying an `_id` member.
pub type Document = Map<String, JsonValue>;

/// Name of the identity member every document carries.
pub const ID_FIELD: &str = "_id";

/// Database and collection addressing one set of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
   pub database: String,
   pub collection: String,
}

impl Namespace {
   pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
      Self {
         database: database.into(),
         collection: collection.into(),
      }
   }
}

impl fmt::Display for Namespace {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}.{}", self.database, self.collection)
   }
}

/// Conjunction of top-level field equality conditions.
///
/// A condition on `null` also matches documents where the field is missing.
///
/// # Example
///
/// ```
/// use docstore_toolkit::Filter;
/// use serde_json::json;
///
/// let filter = Filter::by_id("64f0c2").eq("tenantId", "acme");
/// assert_eq!(filter.conditions().len(), 2);
/// assert_eq!(filter.conditions()[1].1, json!("acme"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
   conditions: Vec<(String, JsonValue)>,
}

impl Filter {
   /// Filter matching every document.
   pub fn new() -> Self {
      Self::default()
   }

   /// Filter matching the document with the given `_id`.
   pub fn by_id(id: impl Into<String>) -> Self {
      Self::new().eq(ID_FIELD, JsonValue::String(id.into()))
   }

   /// Add an equality condition.
   pub fn eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
      self.conditions.push((field.into(), value.into()));
      self
   }

   pub fn conditions(&self) -> &[(String, JsonValue)] {
      &self.conditions
   }

   pub fn is_empty(&self) -> bool {
      self.conditions.is_empty()
   }
}

/// Operations a connected driver handle offers.
///
/// Writes are single-document and atomic; no multi-document transactions are
/// exposed.
pub trait DocumentStore: Send + Sync {
   /// Names of every database holding at least one document.
   fn list_databases(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

   /// Names of every collection in `database`.
   fn list_collections(&self, database: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

   /// Documents matching `filter`, in insertion order.
   fn find(
      &self,
      namespace: &Namespace,
      filter: &Filter,
      limit: Option<usize>,
   ) -> impl Future<Output = Result<Vec<Document>>> + Send;

   /// First document matching `filter`.
   fn find_one(
      &self,
      namespace: &Namespace,
      filter: &Filter,
   ) -> impl Future<Output = Result<Option<Document>>> + Send;

   /// Store a new document, generating an `_id` when it has none.
   ///
   /// Returns the document as stored.
   fn insert_one(
      &self,
      namespace: &Namespace,
      document: Document,
   ) -> impl Future<Output = Result<Document>> + Send;

   /// Set the given top-level fields on the first document matching
   /// `filter` and return it as it is after the update.
   ///
   /// An `_id` member in `fields` is ignored. Returns `None` when nothing
   /// matched.
   fn find_one_and_update(
      &self,
      namespace: &Namespace,
      filter: &Filter,
      fields: Document,
   ) -> impl Future<Output = Result<Option<Document>>> + Send;
}

/// Canonical key for an `_id` value.
///
/// Strings are used as-is and numbers by their JSON text; other values
/// cannot identify a document.
pub fn document_key(id: &JsonValue) -> Result<String> {
   match id {
      JsonValue::String(s) => Ok(s.clone()),
      JsonValue::Number(n) => Ok(n.to_string()),
      other => Err(Error::InvalidDocumentId(other.to_string())),
   }
}
