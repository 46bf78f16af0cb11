//! Tool input parameter structs for MCP tools.
//!
//! This module defines the input types for each MCP tool, with
//! JSON Schema derivation for MCP tool discovery.
//!
//! # Input Sanitization
//!
//! All input structs implement `sanitize()` which trims whitespace
//! from string fields. This should be called before processing input.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;

use crate::models::{EmailMessage, ListItem, ListQuery, ProfileLookup};

/// Helper function to trim an optional string.
fn trim_option(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Trims every entry and drops the empty ones.
fn trim_all(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Input parameters for the get_list_items tool.
///
/// Only the list name is required.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetListItemsInput {
    /// Title of the list (e.g., "Tasks", "Issue Tracking").
    pub list_name: String,

    /// Maximum number of items to return.
    #[serde(default)]
    pub top: Option<u32>,

    /// Sort order (e.g., "Modified desc").
    #[serde(default)]
    pub orderby: Option<String>,

    /// Comma-separated fields to return (e.g., "Id,Title,Status").
    #[serde(default)]
    pub select: Option<String>,

    /// Comma-separated lookup fields to expand (e.g., "Author").
    #[serde(default)]
    pub expand: Option<String>,

    /// OData filter expression (e.g., "Status eq 'Open'"). See build_query_filter.
    #[serde(default)]
    pub filter: Option<String>,

    /// Read from this site instead of the configured one.
    #[serde(default)]
    pub site_url: Option<String>,

    /// JSON document returned instead of the list in development mode.
    #[serde(default)]
    pub dev_static_data_url: Option<String>,
}

impl GetListItemsInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            list_name: self.list_name.trim().to_string(),
            top: self.top,
            orderby: trim_option(&self.orderby),
            select: trim_option(&self.select),
            expand: trim_option(&self.expand),
            filter: trim_option(&self.filter),
            site_url: trim_option(&self.site_url),
            dev_static_data_url: trim_option(&self.dev_static_data_url),
        }
    }

    /// Builds the list query from the modifiers.
    pub fn to_query(&self) -> ListQuery {
        ListQuery {
            top: self.top,
            orderby: self.orderby.clone(),
            select: self.select.clone(),
            expand: self.expand.clone(),
            filter: self.filter.clone(),
            site_url: self.site_url.clone(),
            dev_static_data_url: self.dev_static_data_url.clone(),
        }
    }
}

/// Input parameters for the add_list_item tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddListItemInput {
    /// Title of the list to add to.
    pub list_name: String,

    /// Field values of the new item, keyed by internal field name
    /// (e.g., {"Title": "Printer jammed", "Status": "Open"}).
    pub item: ListItem,
}

impl AddListItemInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            list_name: self.list_name.trim().to_string(),
            item: self.item,
        }
    }
}

/// Input parameters for the update_list_item tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateListItemInput {
    /// Title of the list the item belongs to.
    pub list_name: String,

    /// URL of the item, as returned in the item's __metadata.uri.
    pub item_url: String,

    /// Fields to change. Fields not listed keep their values.
    pub item: ListItem,
}

impl UpdateListItemInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            list_name: self.list_name.trim().to_string(),
            item_url: self.item_url.trim().to_string(),
            item: self.item,
        }
    }
}

/// Input parameters for the delete_list_item tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteListItemInput {
    /// URL of the item to delete.
    pub item_url: String,
}

impl DeleteListItemInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            item_url: self.item_url.trim().to_string(),
        }
    }
}

/// Input parameters for the caml_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CamlQueryInput {
    /// Title of the list to query.
    pub list_name: String,

    /// CAML view XML (e.g., "<View><Query>...</Query><RowLimit>10</RowLimit></View>").
    pub query_xml: String,

    /// JSON document returned instead of the query in development mode.
    #[serde(default)]
    pub dev_static_data_url: Option<String>,
}

impl CamlQueryInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            list_name: self.list_name.trim().to_string(),
            query_xml: self.query_xml.trim().to_string(),
            dev_static_data_url: trim_option(&self.dev_static_data_url),
        }
    }
}

/// Input parameters for the get_people_profile tool.
///
/// One of account_name or email is required.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPeopleProfileInput {
    /// Claims account name (e.g., "i:0#.f|membership|jane@contoso.com").
    #[serde(default)]
    pub account_name: Option<String>,

    /// Email address, used when account_name is not given.
    #[serde(default)]
    pub email: Option<String>,

    /// Comma-separated profile properties to return instead of the default set.
    #[serde(default)]
    pub properties: Option<String>,
}

impl GetPeopleProfileInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            account_name: trim_option(&self.account_name),
            email: trim_option(&self.email),
            properties: trim_option(&self.properties),
        }
    }

    /// Builds the profile lookup.
    pub fn to_lookup(&self) -> ProfileLookup {
        ProfileLookup {
            account_name: self.account_name.clone(),
            email: self.email.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// Input parameters for the ensure_site_user and get_site_user tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SiteUserInput {
    /// Claims login name (e.g., "i:0#.f|membership|jane@contoso.com").
    pub account_name: String,
}

impl SiteUserInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            account_name: self.account_name.trim().to_string(),
        }
    }
}

/// Input parameters for the send_email tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendEmailInput {
    /// Sender address.
    pub from: String,

    /// Recipient addresses (at least one).
    pub to: Vec<String>,

    /// Subject line.
    #[serde(default)]
    pub subject: String,

    /// HTML body.
    #[serde(default)]
    pub body_html: String,
}

impl SendEmailInput {
    /// Sanitizes input by trimming whitespace from addresses and subject.
    ///
    /// The body is left untouched.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            from: self.from.trim().to_string(),
            to: trim_all(self.to),
            subject: self.subject.trim().to_string(),
            body_html: self.body_html,
        }
    }

    /// Converts into the email payload model.
    pub fn into_message(self) -> EmailMessage {
        EmailMessage {
            from: self.from,
            to: self.to,
            subject: self.subject,
            body_html: self.body_html,
        }
    }
}

/// Input parameters for the build_query_filter tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BuildQueryFilterInput {
    /// Internal name of the field to compare (e.g., "Area").
    pub field: String,

    /// Values the field may equal; the filter matches any of them.
    pub values: Vec<String>,
}

impl BuildQueryFilterInput {
    /// Sanitizes input by trimming whitespace from all string fields.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            field: self.field.trim().to_string(),
            values: trim_all(self.values),
        }
    }
}
