//! Rule Set
//!
//! One loaded filter list: the match trie for network rules plus the
//! cosmetic (element hiding) tables.

use std::collections::HashMap;

use crate::evaluator::{RequestContext, RuleEvaluator, Verdict};
use crate::trie::MatchTrie;
use crate::types::{ResourceType, Rule, RuleSetStats};

/// In-memory form of a parsed filter list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    trie: MatchTrie,
    style_sheet: Vec<String>,
    black_list: HashMap<String, Vec<String>>,
    white_list: HashMap<String, Vec<String>>,
    dropped_lines: usize,
    duplicate_rules: usize,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Add a network rule under its literal key.
    pub fn add_rule(&mut self, key: &str, rule: Rule) {
        self.trie.insert(key, rule);
    }

    /// Add a selector hidden on every page.
    pub fn add_style_sheet(&mut self, selector: &str) {
        self.style_sheet.push(selector.to_string());
    }

    /// Add a selector hidden on `domain`.
    pub fn add_black_list(&mut self, domain: &str, selector: &str) {
        self.black_list
            .entry(domain.to_string())
            .or_default()
            .push(selector.to_string());
    }

    /// Add a selector that must not be hidden on `domain`.
    pub fn add_white_list(&mut self, domain: &str, selector: &str) {
        self.white_list
            .entry(domain.to_string())
            .or_default()
            .push(selector.to_string());
    }

    pub fn record_dropped_line(&mut self) {
        self.dropped_lines += 1;
    }

    pub fn record_duplicate_rule(&mut self) {
        self.duplicate_rules += 1;
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Check a request; returns the blocking rule, if any.
    pub fn check_url(&self, base_url: &str, request_url: &str, resource_type: ResourceType) -> Option<&Rule> {
        let ctx = RequestContext::new(base_url, request_url, resource_type);
        self.check(&ctx)
    }

    /// Check a prepared request.
    ///
    /// Every suffix of the URL is walked until a blocking rule is found. A
    /// block stands only if no exception rule applies to the same request.
    pub fn check(&self, ctx: &RequestContext) -> Option<&Rule> {
        let evaluator = RuleEvaluator::new(ctx);

        let blocking = self.scan(ctx, &mut |rule: &Rule, start, end| {
            !rule.is_exception && evaluator.evaluate(rule, start, end) == Verdict::Block
        })?;

        if self.trie.has_exceptions() {
            let exception = self.scan(ctx, &mut |rule: &Rule, start, end| {
                rule.is_exception && evaluator.evaluate(rule, start, end) == Verdict::Allow
            });
            if let Some(exception) = exception {
                log::trace!("'{}' allowed by '{}'", ctx.url(), exception.text);
                return None;
            }
        }

        Some(blocking)
    }

    fn scan<F>(&self, ctx: &RequestContext, accept: &mut F) -> Option<&Rule>
    where
        F: FnMut(&Rule, usize, usize) -> bool,
    {
        let input = ctx.url().as_bytes();
        for offset in 0..input.len() {
            if let Some(rule_id) = self.trie.match_at(input, offset, accept) {
                return Some(self.trie.rule(rule_id));
            }
        }
        None
    }

    // =========================================================================
    // Cosmetic Tables
    // =========================================================================

    pub fn style_sheet(&self) -> &[String] {
        &self.style_sheet
    }

    /// Selectors registered for exactly `domain`.
    pub fn style_sheet_black_list(&self, domain: &str) -> &[String] {
        self.black_list.get(domain).map_or(&[], Vec::as_slice)
    }

    /// Whitelisted selectors registered for exactly `domain`.
    pub fn style_sheet_white_list(&self, domain: &str) -> &[String] {
        self.white_list.get(domain).map_or(&[], Vec::as_slice)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn trie(&self) -> &MatchTrie {
        &self.trie
    }

    pub fn is_empty(&self) -> bool {
        self.trie.rule_count() == 0
            && self.style_sheet.is_empty()
            && self.black_list.is_empty()
            && self.white_list.is_empty()
    }

    pub fn stats(&self) -> RuleSetStats {
        RuleSetStats {
            network_rules: self.trie.rule_count(),
            exception_rules: self.trie.exception_count(),
            trie_nodes: self.trie.node_count(),
            global_selectors: self.style_sheet.len(),
            black_list_entries: self.black_list.values().map(Vec::len).sum(),
            white_list_entries: self.white_list.values().map(Vec::len).sum(),
            dropped_lines: self.dropped_lines,
            duplicate_rules: self.duplicate_rules,
        }
    }
}
