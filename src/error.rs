use serde::{Serialize, Serializer};

/// Result type alias for admin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for the HTTP layer.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the admin backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// No store connection string configured. Fatal at startup.
   #[error("store connection string is not configured (set {0})")]
   MissingConnectionString(&'static str),

   /// Configuration value that could not be parsed.
   #[error("invalid value for {name}: {value:?}")]
   InvalidConfig { name: &'static str, value: String },

   /// Routing key missing from a form submission.
   #[error("missing required parameter: {0}")]
   MissingParameter(&'static str),

   /// Operation reserved for the admin role.
   #[error("operation requires the admin role")]
   NotAuthorized,

   /// No record with the requested id is visible to the caller.
   #[error("record {id} not found in {namespace}")]
   RecordNotFound { namespace: String, id: String },

   /// Tenant principal whose configuration has no tenant id.
   #[error("no tenant found for client configuration {0}")]
   TenantNotFound(String),

   /// Error from the document store.
   #[error(transparent)]
   Toolkit(#[from] docstore_toolkit::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] docstore_conn_mgr::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// Store errors keep the toolkit's codes (`SQLITE_*`, `JSON_ERROR`, ...).
   pub fn error_code(&self) -> String {
      match self {
         Error::MissingConnectionString(_) => "MISSING_CONNECTION_STRING".to_string(),
         Error::InvalidConfig { .. } => "INVALID_CONFIG".to_string(),
         Error::MissingParameter(_) => "MISSING_PARAMETER".to_string(),
         Error::NotAuthorized => "NOT_AUTHORIZED".to_string(),
         Error::RecordNotFound { .. } => "RECORD_NOT_FOUND".to_string(),
         Error::TenantNotFound(_) => "TENANT_NOT_FOUND".to_string(),
         Error::Toolkit(e) => e.error_code(),
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
      }
   }

   /// HTTP status the route layer answers with.
   pub fn status_code(&self) -> u16 {
      match self {
         Error::MissingParameter(_) => 400,
         Error::NotAuthorized => 403,
         Error::RecordNotFound { .. } | Error::TenantNotFound(_) => 404,
         Error::MissingConnectionString(_)
         | Error::InvalidConfig { .. }
         | Error::Toolkit(_)
         | Error::ConnectionManager(_) => 500,
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_status_codes() {
      assert_eq!(Error::MissingParameter("db").status_code(), 400);
      assert_eq!(Error::NotAuthorized.status_code(), 403);
      assert_eq!(
         Error::RecordNotFound {
            namespace: "app.users".into(),
            id: "u1".into()
         }
         .status_code(),
         404
      );
      assert_eq!(Error::TenantNotFound("cfg".into()).status_code(), 404);
      assert_eq!(Error::MissingConnectionString("WIZE_STORE_URI").status_code(), 500);
   }

   #[test]
   fn test_toolkit_codes_pass_through() {
      let err = Error::from(docstore_toolkit::Error::InvalidFieldName("a\"b".into()));
      assert_eq!(err.error_code(), "INVALID_FIELD_NAME");
      assert_eq!(err.status_code(), 500);
   }

   #[test]
   fn test_serializes_code_and_message() {
      let err = Error::MissingParameter("table");
      assert_eq!(
         serde_json::to_value(&err).unwrap(),
         json!({
            "code": "MISSING_PARAMETER",
            "message": "missing required parameter: table"
         })
      );
   }

   #[test]
   fn test_connection_manager_error() {
      let err = Error::from(docstore_conn_mgr::Error::MissingConnectionString);
      assert_eq!(err.error_code(), "CONNECTION_ERROR");
   }
}
