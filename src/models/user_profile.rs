use serde::{Deserialize, Serialize};

/// Public profile stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            photo_url: None,
            email_verified: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name, falling back to the email address.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_wire_names() {
        let mut profile = UserProfile::new("u1", "a@example.com").with_display_name("Ada");
        profile.photo_url = Some("https://example.com/a.png".to_string());

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["displayName"], "Ada");
        assert_eq!(value["photoURL"], "https://example.com/a.png");
        assert_eq!(value["emailVerified"], false);
    }

    #[test]
    fn test_profile_name_fallback() {
        let profile = UserProfile::new("u1", "a@example.com");
        assert_eq!(profile.name(), "a@example.com");

        let parsed: UserProfile =
            serde_json::from_value(json!({"uid": "u2", "email": "b@example.com", "displayName": "Bo"}))
                .unwrap();
        assert_eq!(parsed.name(), "Bo");
    }
}
