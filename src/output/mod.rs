//! Output module for run artifacts and reports
//!
//! This module handles:
//! - The per-run JSON export log of committed records
//! - Rendering query results as JSON
//! - Printing run statistics

mod export;
pub mod stats;

pub use export::{render_records, ExportError, ExportLog};
pub use stats::{format_report, print_report};
