//! Data models for the SharePoint REST API.
//!
//! This module contains the response envelope, request descriptors for list
//! reads and generic reads/writes, profile and site user models, and the
//! email payload.

mod common;
mod email;
mod list;
mod profile;

pub use common::*;
pub use email::*;
pub use list::*;
pub use profile::*;
