//! Form submissions posted by the record editor

use docstore_toolkit::{Document, Namespace, coerce_fields};
use indexmap::IndexMap;

use crate::{Error, Result};

pub const DB_KEY: &str = "db";
pub const TABLE_KEY: &str = "table";
pub const RECORD_ID_KEY: &str = "recordId";

/// A submitted form split into routing keys and record fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
   database: Option<String>,
   table: Option<String>,
   record_id: Option<String>,
   fields: IndexMap<String, String>,
}

impl FormSubmission {
   /// Collect `(key, value)` pairs in submission order.
   ///
   /// `db`, `table` and `recordId` are routing keys and never become record
   /// fields. A key submitted more than once keeps its last value.
   pub fn from_pairs<I, K, V>(pairs: I) -> Self
   where
      I: IntoIterator<Item = (K, V)>,
      K: Into<String>,
      V: Into<String>,
   {
      let mut submission = Self::default();
      for (key, value) in pairs {
         let key = key.into();
         let value = value.into();
         match key.as_str() {
            DB_KEY => submission.database = Some(value),
            TABLE_KEY => submission.table = Some(value),
            RECORD_ID_KEY => submission.record_id = Some(value),
            _ => {
               submission.fields.insert(key, value);
            }
         }
      }
      submission
   }

   /// Target collection; both `db` and `table` must be present.
   pub fn require_collection(&self) -> Result<Namespace> {
      let database = required(&self.database, DB_KEY)?;
      let table = required(&self.table, TABLE_KEY)?;
      Ok(Namespace::new(database, table))
   }

   /// Target collection and record id.
   pub fn require_record(&self) -> Result<(Namespace, String)> {
      let namespace = self.require_collection()?;
      let record_id = required(&self.record_id, RECORD_ID_KEY)?;
      Ok((namespace, record_id.to_string()))
   }

   /// Raw record fields, routing keys excluded.
   pub fn fields(&self) -> &IndexMap<String, String> {
      &self.fields
   }

   /// Record fields with each value coerced to its JSON type.
   pub fn coerced(&self) -> Document {
      coerce_fields(&self.fields)
   }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
   value
      .as_deref()
      .filter(|v| !v.is_empty())
      .ok_or(Error::MissingParameter(name))
}
