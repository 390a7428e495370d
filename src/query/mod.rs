//! Query system for topic graphs
//!
//! Parses search strings into a [`QuerySpec`] and runs scoped searches
//! against the closure index.

mod matcher;
mod parse;
mod search;
mod types;

pub use matcher::{wildcard_contains, TextMatcher};
pub use parse::{parse, parse_topic_reference, scope_token};
pub use search::SearchQuery;
pub use types::{QuerySpec, SearchResults};
