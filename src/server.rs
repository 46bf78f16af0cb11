//! MCP server implementation for spoint.
//!
//! This module defines the `SpointServer` struct that implements the MCP
//! `ServerHandler` trait, exposing SharePoint operations as tools.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde_json::Value;

use crate::error::SpError;
use crate::models::{ListItem, PersonProfile, ResponseEnvelope, SiteUser};
use crate::odata::query_filter;
use crate::sp_client::SpClient;
use crate::tools::{
    AddListItemInput, BuildQueryFilterInput, CamlQueryInput, DeleteListItemInput,
    GetListItemsInput, GetPeopleProfileInput, SendEmailInput, SiteUserInput,
    UpdateListItemInput,
};

/// The spoint MCP server.
///
/// This server exposes SharePoint operations as MCP tools.
#[derive(Clone)]
pub struct SpointServer {
    /// SharePoint client for API operations.
    client: SpClient,
    /// Tool router for MCP tool dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SpointServer {
    /// Creates a new server instance around `client`.
    pub fn new(client: SpClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    /// A simple ping tool to verify the server is running.
    ///
    /// Returns "pong" on success.
    #[tool(description = "Test connectivity to the spoint MCP server. Returns 'pong' if the server is running correctly.")]
    fn ping(&self) -> String {
        tracing::debug!("ping tool called");
        "pong".to_string()
    }

    /// Read items from a list with optional OData modifiers.
    #[tool(description = "Read items from a SharePoint list. Supports OData $top, $orderby, $select, $expand and $filter. Returns the items as JSON.")]
    async fn get_list_items(
        &self,
        Parameters(input): Parameters<GetListItemsInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(list_name = %input.list_name, "get_list_items tool called");

        let items = self
            .client
            .get_list(&input.list_name, &input.to_query())
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, list_name = %input.list_name, "Failed to read list");
                format!("Failed to read list '{}': {}", input.list_name, sanitized)
            })?;

        Ok(format_item_list(&input.list_name, &items))
    }

    /// Append a new item to a list.
    #[tool(description = "Add a new item to a SharePoint list. Provide the list title and the item's field values keyed by internal field name. Returns the created item and its URL.")]
    async fn add_list_item(
        &self,
        Parameters(input): Parameters<AddListItemInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(list_name = %input.list_name, "add_list_item tool called");

        let envelope = self
            .client
            .add_list_item(&input.list_name, input.item)
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, list_name = %input.list_name, "Failed to add list item");
                format!("Failed to add item to '{}': {}", input.list_name, sanitized)
            })?;

        Ok(format_add_result(&input.list_name, &envelope))
    }

    /// Update fields of an existing item.
    #[tool(description = "Update fields of an existing SharePoint list item. The item's current version is read first and the update only applies if nobody changed it since. Requires the list title and the item URL.")]
    async fn update_list_item(
        &self,
        Parameters(input): Parameters<UpdateListItemInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(item_url = %input.item_url, "update_list_item tool called");

        let written = self
            .client
            .update_list_item(&input.list_name, &input.item_url, input.item)
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, item_url = %input.item_url, "Failed to update list item");
                format!("Failed to update item {}: {}", input.item_url, sanitized)
            })?;

        Ok(format_update_result(&input.item_url, &written))
    }

    /// Delete an item.
    #[tool(description = "Delete a SharePoint list item by its URL. The delete is unconditional.")]
    async fn delete_list_item(
        &self,
        Parameters(input): Parameters<DeleteListItemInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(item_url = %input.item_url, "delete_list_item tool called");

        self.client.delete(&input.item_url).await.map_err(|e| {
            let sanitized = self.sanitize_error(&e);
            tracing::error!(error = %sanitized, item_url = %input.item_url, "Failed to delete list item");
            format!("Failed to delete item {}: {}", input.item_url, sanitized)
        })?;

        Ok(format!("Successfully deleted item {}.", input.item_url))
    }

    /// Run a CAML query against a list.
    #[tool(description = "Query a SharePoint list with CAML view XML. Use this for queries OData filters cannot express. Returns the matching items as JSON.")]
    async fn caml_query(
        &self,
        Parameters(input): Parameters<CamlQueryInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(list_name = %input.list_name, "caml_query tool called");

        let items = self
            .client
            .caml_query(
                &input.list_name,
                &input.query_xml,
                input.dev_static_data_url.as_deref(),
            )
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, list_name = %input.list_name, "CAML query failed");
                format!("Failed to query '{}': {}", input.list_name, sanitized)
            })?;

        Ok(format_item_list(&input.list_name, &items))
    }

    /// Look up someone's user profile.
    #[tool(description = "Look up a person's user profile by claims account name or email address. Returns display name, email, title and any other selected properties.")]
    async fn get_people_profile(
        &self,
        Parameters(input): Parameters<GetPeopleProfileInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(?input, "get_people_profile tool called");

        let profile = self
            .client
            .retrieve_people_profile(&input.to_lookup())
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, "Failed to retrieve profile");
                format!("Failed to retrieve profile: {}", sanitized)
            })?;

        Ok(format_profile(&profile))
    }

    /// Look up the calling user's profile.
    #[tool(description = "Get the user profile of the account the server is signed in as.")]
    async fn get_current_user_profile(&self) -> Result<String, String> {
        tracing::debug!("get_current_user_profile tool called");

        let profile = self
            .client
            .retrieve_current_user_profile()
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, "Failed to retrieve current user profile");
                format!("Failed to retrieve current user profile: {}", sanitized)
            })?;

        Ok(format_profile(&profile))
    }

    /// Make sure an account is a site user.
    #[tool(description = "Ensure an account exists as a user of the site, adding it if needed. Returns the numeric site user ID used by person fields.")]
    async fn ensure_site_user(
        &self,
        Parameters(input): Parameters<SiteUserInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(account_name = %input.account_name, "ensure_site_user tool called");

        let id = self
            .client
            .ensure_site_user_id(&input.account_name)
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, account_name = %input.account_name, "Failed to ensure site user");
                format!("Failed to ensure site user {}: {}", input.account_name, sanitized)
            })?;

        Ok(format!("Site user ID for {}: {}", input.account_name, id))
    }

    /// Read an existing site user.
    #[tool(description = "Get an existing site user by claims login name. Returns the site user ID, name and email.")]
    async fn get_site_user(
        &self,
        Parameters(input): Parameters<SiteUserInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(account_name = %input.account_name, "get_site_user tool called");

        let user = self
            .client
            .site_user(&input.account_name)
            .await
            .map_err(|e| {
                let sanitized = self.sanitize_error(&e);
                tracing::error!(error = %sanitized, account_name = %input.account_name, "Failed to get site user");
                format!("Failed to get site user {}: {}", input.account_name, sanitized)
            })?;

        Ok(format_site_user(&user))
    }

    /// Send an HTML email through the site.
    #[tool(description = "Send an HTML email through SharePoint. Recipients must be users the site can resolve. At least one recipient is required.")]
    async fn send_email(
        &self,
        Parameters(input): Parameters<SendEmailInput>,
    ) -> Result<String, String> {
        let message = input.sanitize().into_message();
        tracing::debug!(recipients = message.to.len(), "send_email tool called");

        self.client.send_email(&message).await.map_err(|e| {
            let sanitized = self.sanitize_error(&e);
            tracing::error!(error = %sanitized, "Failed to send email");
            format!("Failed to send email: {}", sanitized)
        })?;

        Ok(format!(
            "Successfully sent '{}' to {}.",
            message.subject,
            message.to.join(", ")
        ))
    }

    /// Build an OData filter matching any of several values.
    #[tool(description = "Build an OData $filter expression that matches a field against any of several values, for use with get_list_items.")]
    fn build_query_filter(
        &self,
        Parameters(input): Parameters<BuildQueryFilterInput>,
    ) -> Result<String, String> {
        let input = input.sanitize();
        tracing::debug!(field = %input.field, values = input.values.len(), "build_query_filter tool called");

        if input.field.is_empty() {
            return Err("Field is required and cannot be empty.".to_string());
        }

        let filter = query_filter(&input.values, &input.field);
        if filter.is_empty() {
            return Err("At least one non-empty value is required.".to_string());
        }
        Ok(filter)
    }

    /// Sanitizes an error message to remove any configured secret.
    fn sanitize_error(&self, error: &SpError) -> String {
        self.client.sanitize_error(error)
    }
}

#[tool_handler]
impl ServerHandler for SpointServer {
    /// Returns server information for the MCP initialize handshake.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "spoint provides access to a SharePoint site. \
                 Use get_list_items or caml_query to read lists, build_query_filter \
                 to construct filters, and add_list_item, update_list_item and \
                 delete_list_item to change them. Look people up with get_people_profile, \
                 get_current_user_profile, ensure_site_user and get_site_user, and send \
                 mail with send_email. Start with 'ping' to verify connectivity."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Response formatting helpers
// ============================================================================

/// Maximum length of a single rendered item before truncation.
const MAX_ITEM_LENGTH: usize = 2000;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Truncates a string if it exceeds the maximum length in bytes.
///
/// Breaks at a word boundary when possible and never splits a character.
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let mut end = max_length.saturating_sub(TRUNCATION_MARKER.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    if let Some(space_pos) = text[..end].rfind(char::is_whitespace) {
        end = space_pos;
    }
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Formats list items as numbered JSON blocks.
fn format_item_list(list_name: &str, items: &[Value]) -> String {
    if items.is_empty() {
        return format!("No items found in '{}'.", list_name);
    }

    let mut output = format!("Found {} item(s) in '{}':\n\n", items.len(), list_name);
    for (index, item) in items.iter().enumerate() {
        output.push_str(&format!("[{}]\n", index + 1));
        output.push_str(&truncate_text(&pretty(item), MAX_ITEM_LENGTH));
        output.push_str("\n\n");
    }

    output
}

/// Formats the result of an add operation.
fn format_add_result(list_name: &str, envelope: &ResponseEnvelope) -> String {
    let mut output = format!("Successfully added item to '{}'.\n", list_name);

    if let Some(uri) = envelope.uri() {
        output.push_str(&format!("Item URL: {}\n", uri));
    }
    if let Some(etag) = envelope.etag() {
        output.push_str(&format!("Version: {}\n", etag));
    }
    if let ResponseEnvelope::Entity { data, .. } = envelope {
        output.push_str("\n--- Item ---\n");
        output.push_str(&truncate_text(&pretty(data), MAX_ITEM_LENGTH));
        output.push('\n');
    }

    if envelope.uri().is_some() {
        output.push_str("\nNext steps:\n");
        output.push_str("  - Change it: use update_list_item with this item URL\n");
        output.push_str("  - Remove it: use delete_list_item with this item URL\n");
    }

    output
}

/// Formats the result of an update operation.
fn format_update_result(item_url: &str, written: &ListItem) -> String {
    let mut output = format!("Successfully updated item {}.\n\nFields written:\n", item_url);
    for (field, value) in written {
        output.push_str(&format!("  {}: {}\n", field, value));
    }
    output
}

/// Formats a user profile.
fn format_profile(profile: &PersonProfile) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{}\n",
        profile.display_name.as_deref().unwrap_or("(no display name)")
    ));
    output.push_str(&"=".repeat(40));
    output.push('\n');

    let fields = [
        ("Account", &profile.account_name),
        ("Email", &profile.email),
        ("Title", &profile.title),
        ("Picture", &profile.picture_url),
        ("Personal site", &profile.personal_url),
    ];
    for (label, value) in fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            output.push_str(&format!("{}: {}\n", label, value));
        }
    }

    let extra: Vec<_> = profile
        .extra
        .iter()
        .filter(|(key, _)| !key.starts_with("__"))
        .collect();
    if !extra.is_empty() {
        output.push_str("\n--- Other properties ---\n");
        for (key, value) in extra {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            output.push_str(&format!("{}: {}\n", key, truncate_text(&rendered, 500)));
        }
    }

    output
}

/// Formats a site user.
fn format_site_user(user: &SiteUser) -> String {
    let mut output = format!("Site user ID: {}\n", user.id);
    if let Some(title) = &user.title {
        output.push_str(&format!("Name: {}\n", title));
    }
    if let Some(email) = &user.email {
        output.push_str(&format!("Email: {}\n", email));
    }
    if let Some(login_name) = &user.login_name {
        output.push_str(&format!("Login: {}\n", login_name));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sp_client::DEV_ITEM_URL;
    use serde_json::json;
    use std::time::Duration;

    // ========================================================================
    // Truncation tests
    // ========================================================================

    #[test]
    fn test_truncate_text_short_text() {
        let text = "Short text";
        assert_eq!(truncate_text(text, 100), text);
    }

    #[test]
    fn test_truncate_text_exact_length() {
        let text = "x".repeat(100);
        assert_eq!(truncate_text(&text, 100), text);
    }

    #[test]
    fn test_truncate_text_long_text() {
        let text = "word ".repeat(500);
        let result = truncate_text(&text, 100);
        assert!(result.len() <= 100);
        assert!(result.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_text_multibyte() {
        let text = "é".repeat(100);
        let result = truncate_text(&text, 50);
        assert!(result.ends_with(TRUNCATION_MARKER));
        assert!(result.len() <= 50);
    }

    // ========================================================================
    // Server tests (development mode, no network)
    // ========================================================================

    fn test_server() -> SpointServer {
        let config = Config::new("http://localhost:8080/sites/Team/")
            .with_dev_load_delay(Duration::ZERO);
        SpointServer::new(SpClient::new(&config).expect("Failed to create test client"))
    }

    fn item(fields: Value) -> ListItem {
        match fields {
            Value::Object(map) => map,
            _ => panic!("test item must be an object"),
        }
    }

    #[test]
    fn test_server_info_has_tools_capability() {
        let info = test_server().get_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_ping_tool_returns_pong() {
        assert_eq!(test_server().ping(), "pong");
    }

    #[tokio::test]
    async fn test_add_list_item_in_dev() {
        let server = test_server();
        let result = server
            .add_list_item(Parameters(AddListItemInput {
                list_name: " Tasks ".to_string(),
                item: item(json!({"Title": "Hello"})),
            }))
            .await
            .unwrap();
        assert!(result.contains("Successfully added item to 'Tasks'"));
        assert!(result.contains(DEV_ITEM_URL));
        assert!(result.contains("SP.Data.TasksListItem"));
    }

    #[tokio::test]
    async fn test_get_list_items_without_static_data() {
        let server = test_server();
        let err = server
            .get_list_items(Parameters(GetListItemsInput {
                list_name: "Tasks".to_string(),
                top: None,
                orderby: None,
                select: None,
                expand: None,
                filter: None,
                site_url: None,
                dev_static_data_url: None,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("No static data in dev"));
    }

    #[tokio::test]
    async fn test_people_profile_requires_identifier() {
        let server = test_server();
        let err = server
            .get_people_profile(Parameters(GetPeopleProfileInput {
                account_name: None,
                email: Some("  ".to_string()),
                properties: None,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("No account name provided"));
    }

    #[tokio::test]
    async fn test_people_profile_dev_stub() {
        let server = test_server();
        let result = server
            .get_people_profile(Parameters(GetPeopleProfileInput {
                account_name: None,
                email: Some("jane@contoso.com".to_string()),
                properties: None,
            }))
            .await
            .unwrap();
        assert!(result.contains("TEST NAME"));
        assert!(result.contains("Title: Staff"));
    }

    #[tokio::test]
    async fn test_ensure_site_user_in_dev() {
        let server = test_server();
        let result = server
            .ensure_site_user(Parameters(SiteUserInput {
                account_name: "i:0#.f|membership|jane@contoso.com".to_string(),
            }))
            .await
            .unwrap();
        assert!(result.ends_with(": 1234"));
    }

    #[tokio::test]
    async fn test_send_email_requires_recipient() {
        let server = test_server();
        let err = server
            .send_email(Parameters(SendEmailInput {
                from: "a@contoso.com".to_string(),
                to: vec![" ".to_string()],
                subject: "Hi".to_string(),
                body_html: String::new(),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("recipient"));
    }

    #[test]
    fn test_build_query_filter_tool() {
        let server = test_server();
        let filter = server
            .build_query_filter(Parameters(BuildQueryFilterInput {
                field: "Area".to_string(),
                values: vec!["Americas".to_string(), "EMEIA".to_string()],
            }))
            .unwrap();
        assert_eq!(filter, "(Area eq 'Americas' or Area eq 'EMEIA')");

        let err = server
            .build_query_filter(Parameters(BuildQueryFilterInput {
                field: "Area".to_string(),
                values: vec![],
            }))
            .unwrap_err();
        assert!(err.contains("value"));
    }

    // ========================================================================
    // Formatting tests
    // ========================================================================

    #[test]
    fn test_format_item_list_empty() {
        assert_eq!(format_item_list("Tasks", &[]), "No items found in 'Tasks'.");
    }

    #[test]
    fn test_format_item_list_with_items() {
        let result = format_item_list("Tasks", &[json!({"Title": "One"}), json!({"Title": "Two"})]);
        assert!(result.contains("Found 2 item(s) in 'Tasks'"));
        assert!(result.contains("[2]"));
        assert!(result.contains("\"Title\": \"Two\""));
    }

    #[test]
    fn test_format_add_result_raw_body() {
        let result = format_add_result("Tasks", &ResponseEnvelope::Raw(json!({"ok": true})));
        assert!(result.contains("Successfully added item"));
        assert!(!result.contains("Next steps"));
    }

    #[test]
    fn test_format_update_result() {
        let result = format_update_result("https://x/items(1)", &item(json!({"Status": "Done"})));
        assert!(result.contains("Successfully updated item https://x/items(1)"));
        assert!(result.contains("Status: \"Done\""));
    }

    #[test]
    fn test_format_profile_skips_metadata() {
        let profile: PersonProfile = serde_json::from_value(json!({
            "__metadata": {"type": "SP.UserProfiles.PersonProperties"},
            "DisplayName": "Jane Doe",
            "Email": "jane@contoso.com",
            "Department": "Finance"
        }))
        .unwrap();
        let result = format_profile(&profile);
        assert!(result.starts_with("Jane Doe\n"));
        assert!(result.contains("Email: jane@contoso.com"));
        assert!(result.contains("Department: Finance"));
        assert!(!result.contains("__metadata"));
    }

    #[test]
    fn test_format_site_user() {
        let user = SiteUser {
            id: 17,
            title: Some("Jane Doe".to_string()),
            ..SiteUser::default()
        };
        let result = format_site_user(&user);
        assert!(result.contains("Site user ID: 17"));
        assert!(result.contains("Name: Jane Doe"));
        assert!(!result.contains("Email"));
    }
}
