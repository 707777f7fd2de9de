use serde::{Deserialize, Serialize};

/// Client value selecting the admin role.
pub const ADMIN_CLIENT: &str = "0";

/// Who an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum Principal {
   /// Unrestricted access to every database and collection.
   Admin,
   /// Access scoped to one tenant's records.
   #[serde(rename_all = "camelCase")]
   Tenant { configuration_id: String },
}

impl Principal {
   /// Role for a selected client value: `"0"` is admin, anything else is the
   /// configuration id of a tenant. Returns `None` when nothing is selected.
   pub fn from_client(client: &str) -> Option<Self> {
      match client.trim() {
         "" => None,
         ADMIN_CLIENT => Some(Principal::Admin),
         id => Some(Principal::Tenant {
            configuration_id: id.to_string(),
         }),
      }
   }

   pub fn tenant(configuration_id: impl Into<String>) -> Self {
      Principal::Tenant {
         configuration_id: configuration_id.into(),
      }
   }

   pub fn is_admin(&self) -> bool {
      matches!(self, Principal::Admin)
   }

   pub fn configuration_id(&self) -> Option<&str> {
      match self {
         Principal::Admin => None,
         Principal::Tenant { configuration_id } => Some(configuration_id),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_from_client() {
      assert_eq!(Principal::from_client("0"), Some(Principal::Admin));
      assert_eq!(Principal::from_client("cfg-1"), Some(Principal::tenant("cfg-1")));
      assert_eq!(Principal::from_client(""), None);
      assert_eq!(Principal::from_client("  "), None);
   }

   #[test]
   fn test_accessors() {
      assert!(Principal::Admin.is_admin());
      assert_eq!(Principal::Admin.configuration_id(), None);
      assert_eq!(Principal::tenant("cfg").configuration_id(), Some("cfg"));
   }

   #[test]
   fn test_serialized_shape() {
      assert_eq!(serde_json::to_value(Principal::Admin).unwrap(), json!({"role": "admin"}));
      assert_eq!(
         serde_json::to_value(Principal::tenant("cfg")).unwrap(),
         json!({"role": "tenant", "configurationId": "cfg"})
      );
   }
}
