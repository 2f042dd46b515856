use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile of the logged-in user, as returned by login.
///
/// The backend has used both `users_*` and bare column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, alias = "user_uuid", alias = "uuid", skip_serializing_if = "Option::is_none")]
    pub users_uuid: Option<String>,
    #[serde(default, alias = "user_role", alias = "role", skip_serializing_if = "Option::is_none")]
    pub users_role: Option<String>,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub users_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_data_accepts_column_aliases() {
        let user: UserData =
            serde_json::from_value(json!({"uuid": "u-1", "role": "rep", "phone": "555"})).unwrap();
        assert_eq!(user.users_uuid.as_deref(), Some("u-1"));
        assert_eq!(user.users_role.as_deref(), Some("rep"));
        assert_eq!(user.extra.get("phone"), Some(&json!("555")));
    }
}
