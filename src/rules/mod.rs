//! Rule compilation
//!
//! This module turns the declarative rule file into:
//! - an ordered list of [`CrawlRule`]s (allow/deny regexes, scope selectors,
//!   follow flag, handler)
//! - one [`SelectorChain`] per logical record field
//!
//! Both are built once at startup and shared read-only by every crawl task.

mod compiler;
mod rule;
mod selector;

pub use compiler::{compile, CompiledRules};
pub use rule::{CrawlRule, Handler};
pub use selector::{collapse_whitespace, parse_css, FieldSelector, RecordField, SelectorChain};
