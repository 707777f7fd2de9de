/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] docstore_conn_mgr::Error),

   /// Document could not be serialized or a stored body could not be parsed.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// Field name that cannot be addressed inside a stored document.
   #[error("invalid field name: {0:?}")]
   InvalidFieldName(String),

   /// `_id` value that is neither a string nor a number.
   #[error("invalid document id: {0}")]
   InvalidDocumentId(String),

   /// Stored body is valid JSON but not an object.
   #[error("stored document {0} is not a JSON object")]
   NotADocument(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Json(_) => "JSON_ERROR".to_string(),
         Error::InvalidFieldName(_) => "INVALID_FIELD_NAME".to_string(),
         Error::InvalidDocumentId(_) => "INVALID_DOCUMENT_ID".to_string(),
         Error::NotADocument(_) => "NOT_A_DOCUMENT".to_string(),
      }
   }
}
