//! MCP tool implementations for spoint.
//!
//! This module contains the input types and helper functions for
//! MCP tools that expose SharePoint operations.

mod inputs;

pub use inputs::*;
