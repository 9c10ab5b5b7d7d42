//! Content Blocking Filter List Compiler
//!
//! This crate turns Adblock Plus filter list text into a [`cb_core::RuleSet`].

pub mod builder;
pub mod header;
pub mod optimizer;
pub mod parser;

pub use builder::{build_rule_set, build_rule_set_from_reader, RuleSetBuilder};
pub use header::{is_list_header, HeaderError, ListHeader};
pub use optimizer::Deduplicator;
pub use parser::{parse_rule_line, CosmeticEntry, ParseError, ParsedLine};
