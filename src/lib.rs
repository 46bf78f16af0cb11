//! # spoint
//!
//! spoint is a client for the SharePoint REST/OData API, shipped with an MCP
//! (Model Context Protocol) server that exposes the client's operations as
//! tools.
//!
//! ## Features
//!
//! - **Lists**: read with OData modifiers or CAML, add, update and delete items
//! - **Concurrency**: updates re-read the item's etag and write conditionally
//! - **People**: user profiles, the current user, and site user IDs
//! - **Email**: HTML email through the site's send-email utility
//! - **Development mode**: sites outside the production hosts never receive
//!   writes; reads come from static JSON documents and profiles are stubbed
//! - **Security**: cookies and tokens are never logged or exposed in error messages
//!
//! ## Architecture
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with security-conscious message sanitization
//! - [`transport`] - The HTTP seam and its `reqwest` implementation
//! - [`sp_client`] - The SharePoint client and form digest lifecycle
//! - [`odata`] - Pure helpers for OData filters, entity types and lookups
//! - [`models`] - Request descriptors, response envelope and profile models
//! - [`server`] - MCP server implementation with tool routing
//! - [`tools`] - Tool input parameter structs
//!
//! ## Usage
//!
//! ```bash
//! export SP_SITE_URL=https://contoso.sharepoint.com/sites/Team/
//! export SP_PRODUCTION_HOSTS=contoso.sharepoint.com
//! export SP_ACCESS_TOKEN=your-token
//!
//! ./spoint
//! ```
//!
//! Optional:
//! - `SP_BASE_URL`: API root when it differs from the site URL
//! - `SP_COOKIE`: `Cookie` header for cookie-authenticated sites
//! - `RUST_LOG`: Log level (e.g., `spoint=debug`)
//!
//! ## Example
//!
//! Using the [`SpClient`](sp_client::SpClient) directly:
//!
//! ```ignore
//! use spoint::config::Config;
//! use spoint::models::ListQuery;
//! use spoint::odata::query_filter;
//! use spoint::sp_client::SpClient;
//!
//! async fn example() -> Result<(), spoint::error::SpError> {
//!     let config = Config::from_env()?;
//!     let client = SpClient::new(&config)?;
//!     client.get_form_digest().await?;
//!
//!     let query = ListQuery::new()
//!         .with_select("Title,Area")
//!         .with_filter(query_filter(&["Americas", "EMEIA"], "Area"))
//!         .with_top(10);
//!
//!     for item in client.get_list("Regions", &query).await? {
//!         println!("{}", item["Title"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod models;
pub mod odata;
pub mod server;
pub mod sp_client;
pub mod tools;
pub mod transport;
