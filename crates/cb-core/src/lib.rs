//! Content Blocking Core Library
//!
//! This crate provides the matching engine for Adblock Plus style filter
//! lists.
//!
//! # Architecture
//!
//! Network rules are stored in a per-byte trie keyed by their literal text.
//! A request URL is walked from every offset; each rule reached on the way is
//! handed to the evaluator, which applies anchors, `||` domain boundaries,
//! `domain=` scoping, third-party status and resource-type options.
//!
//! # Modules
//!
//! - `types`: Rule, option flags, resource types, results
//! - `url`: URL normalization and host helpers
//! - `trie`: The match trie
//! - `evaluator`: Per-rule block/allow decision
//! - `ruleset`: Trie plus cosmetic tables for one filter list

pub mod evaluator;
pub mod ruleset;
pub mod trie;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use evaluator::{RequestContext, RuleEvaluator, Verdict};
pub use ruleset::RuleSet;
pub use trie::MatchTrie;
pub use types::{CheckResult, MatchMode, ResourceType, Rule, RuleOptions, RuleSetStats};
pub use url::create_subdomain_list;
