//! URL handling module for News-Harvester
//!
//! This module provides URL normalization, link resolution, host extraction and
//! allowed-domain matching.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, origin_key};
pub use matcher::{is_allowed_host, matches_domain};
pub use normalize::{normalize_url, resolve_link};
