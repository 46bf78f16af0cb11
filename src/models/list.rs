//! Request descriptors for list reads and generic reads/writes.

use serde_json::Value;

use crate::error::SpError;

/// OData query modifiers for a list read.
///
/// Use the builder methods to construct the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// `$top`
    pub top: Option<u32>,
    /// `$orderby`, e.g. `Modified desc`.
    pub orderby: Option<String>,
    /// `$select`, comma-separated field names.
    pub select: Option<String>,
    /// `$expand`, comma-separated lookup fields.
    pub expand: Option<String>,
    /// `$filter`, an OData filter expression.
    pub filter: Option<String>,
    /// Read from this site instead of the client's base URL.
    pub site_url: Option<String>,
    /// JSON document served instead of the list in development mode.
    pub dev_static_data_url: Option<String>,
}

impl ListQuery {
    /// Creates an empty query (all items, server default page size).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of items to return.
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Sets the sort order.
    pub fn with_orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    /// Sets the fields to return.
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Sets the lookup fields to expand.
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Reads from another site.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// Sets the development-mode substitute document.
    pub fn with_dev_static_data(mut self, url: impl Into<String>) -> Self {
        self.dev_static_data_url = Some(url.into());
        self
    }

    /// Builds the query string: `$top`, `$orderby`, `$select`, `$expand`,
    /// `$filter`, in that order, skipping unset or empty modifiers.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(top) = self.top.filter(|top| *top > 0) {
            parts.push(format!("$top={}", top));
        }
        if let Some(orderby) = text(&self.orderby) {
            parts.push(format!("$orderby={}", orderby));
        }
        if let Some(select) = text(&self.select) {
            parts.push(format!("$select={}", select));
        }
        if let Some(expand) = text(&self.expand) {
            parts.push(format!("$expand={}", expand));
        }
        if let Some(filter) = text(&self.filter) {
            parts.push(format!("$filter={}", filter));
        }

        parts.join("&")
    }
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A generic read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// Path relative to the base URL (or absolute).
    pub path: String,
    /// Resolve `path` against this root instead of the client's base URL.
    pub base_url: Option<String>,
    /// JSON document served instead of the read in development mode.
    pub dev_static_data_url: Option<String>,
}

impl ReadRequest {
    /// Creates a read of `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Resolves the path against another root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the development-mode substitute document.
    pub fn with_dev_static_data(mut self, url: impl Into<String>) -> Self {
        self.dev_static_data_url = Some(url.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SpError> {
        if self.path.trim().is_empty() {
            return Err(SpError::validation("path is required"));
        }
        Ok(())
    }
}

/// A generic write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Path relative to the base URL (or absolute).
    pub path: String,
    /// JSON payload.
    pub data: Value,
}

impl WriteRequest {
    /// Creates a write of `data` to `path`.
    pub fn new(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SpError> {
        if self.path.trim().is_empty() {
            return Err(SpError::validation("path is required"));
        }
        if self.data.is_null() {
            return Err(SpError::validation("data is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_query_default_is_empty() {
        assert_eq!(ListQuery::new().to_query_string(), "");
    }

    #[test]
    fn test_list_query_fixed_order() {
        let query = ListQuery::new()
            .with_filter("Status eq 'Open'")
            .with_select("Title,Status")
            .with_top(5)
            .with_expand("Author")
            .with_orderby("Modified desc");
        assert_eq!(
            query.to_query_string(),
            "$top=5&$orderby=Modified desc&$select=Title,Status&$expand=Author&$filter=Status eq 'Open'"
        );
    }

    #[test]
    fn test_list_query_skips_empty_modifiers() {
        let query = ListQuery::new().with_top(0).with_select("").with_filter("Id gt 3");
        assert_eq!(query.to_query_string(), "$filter=Id gt 3");
    }

    #[test]
    fn test_write_request_validation() {
        assert!(WriteRequest::new("", json!({"a": 1})).validate().is_err());
        assert!(WriteRequest::new("_api/x", Value::Null).validate().is_err());
        assert!(WriteRequest::new("_api/x", json!({})).validate().is_ok());
    }

    #[test]
    fn test_read_request_validation() {
        assert!(ReadRequest::new("  ").validate().is_err());
        assert!(ReadRequest::new("_api/web").validate().is_ok());
    }
}
