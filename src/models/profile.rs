//! User profile and site user models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Properties of a user profile as returned by the people manager.
///
/// Only the commonly selected properties are typed; anything else the
/// `$select` asked for lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PersonProfile {
    /// Claims account name, e.g. `i:0#.f|membership|jane@contoso.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,

    /// Personal site URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_url: Option<String>,

    /// Job title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Every other property returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersonProfile {
    /// The profile returned for other people in development mode.
    pub fn dev_stub() -> Self {
        Self {
            display_name: Some("TEST NAME".to_string()),
            email: Some("test@example.com".to_string()),
            personal_url: Some(String::new()),
            title: Some("Staff".to_string()),
            ..Self::default()
        }
    }

    /// The profile returned for the current user in development mode.
    pub fn dev_current_user() -> Self {
        Self {
            display_name: Some("CURRENT USER".to_string()),
            ..Self::default()
        }
    }
}

/// How to identify the person in a profile lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileLookup {
    /// Full claims account name. Takes precedence over `email`.
    pub account_name: Option<String>,
    /// Email address, turned into an account name with the configured prefix.
    pub email: Option<String>,
    /// Comma-separated properties to select instead of the default set.
    pub properties: Option<String>,
}

impl ProfileLookup {
    /// Looks up by claims account name.
    pub fn by_account_name(account_name: impl Into<String>) -> Self {
        Self {
            account_name: Some(account_name.into()),
            ..Self::default()
        }
    }

    /// Looks up by email address.
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Selects specific properties.
    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = Some(properties.into());
        self
    }

    /// Resolves the account name, prefixing an email when needed.
    pub fn account(&self, account_name_prefix: &str) -> Option<String> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        non_empty(&self.account_name)
            .or_else(|| non_empty(&self.email).map(|email| format!("{}{}", account_name_prefix, email)))
    }
}

/// A user principal on the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SiteUser {
    /// Site-scoped numeric user ID.
    pub id: u64,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Claims login name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PREFIX: &str = "i:0#.f|membership|";

    #[test]
    fn test_account_name_wins_over_email() {
        let lookup = ProfileLookup {
            account_name: Some("i:0#.f|membership|a@x.com".to_string()),
            email: Some("b@x.com".to_string()),
            properties: None,
        };
        assert_eq!(
            lookup.account(PREFIX).as_deref(),
            Some("i:0#.f|membership|a@x.com")
        );
    }

    #[test]
    fn test_email_gets_prefixed() {
        assert_eq!(
            ProfileLookup::by_email("b@x.com").account(PREFIX).as_deref(),
            Some("i:0#.f|membership|b@x.com")
        );
    }

    #[test]
    fn test_blank_identifiers_resolve_to_none() {
        let lookup = ProfileLookup {
            account_name: Some("  ".to_string()),
            email: Some(String::new()),
            properties: None,
        };
        assert_eq!(lookup.account(PREFIX), None);
        assert_eq!(ProfileLookup::default().account(PREFIX), None);
    }

    #[test]
    fn test_profile_deserializes_extra_properties() {
        let profile: PersonProfile = serde_json::from_value(json!({
            "__metadata": {"type": "SP.UserProfiles.PersonProperties"},
            "DisplayName": "Jane Doe",
            "Email": "jane@contoso.com",
            "Department": "Finance"
        }))
        .unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(profile.extra["Department"], "Finance");
    }

    #[test]
    fn test_site_user_deserializes() {
        let user: SiteUser = serde_json::from_value(json!({
            "Id": 17,
            "Title": "Jane Doe",
            "LoginName": "i:0#.f|membership|jane@contoso.com"
        }))
        .unwrap();
        assert_eq!(user.id, 17);
        assert_eq!(user.email, None);
    }
}
