use std::collections::HashSet;

use cb_core::types::{MatchMode, Rule, RuleOptions};

/// Tracks network rules already added to a rule set so that repeated
/// filters (common when lists are concatenated) are inserted once.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<RuleKey>,
    duplicates: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if an equivalent rule was seen before.
    pub fn is_duplicate(&mut self, key: &str, rule: &Rule) -> bool {
        let duplicate = !self.seen.insert(RuleKey::new(key, rule));
        if duplicate {
            self.duplicates += 1;
        }
        duplicate
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Everything that affects how a rule matches; the source text does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    key: String,
    match_mode: MatchMode,
    is_exception: bool,
    needs_domain_check: bool,
    scheme: Option<String>,
    blocked_domains: Vec<String>,
    allowed_domains: Vec<String>,
    options: RuleOptions,
    exception_options: RuleOptions,
}

impl RuleKey {
    fn new(key: &str, rule: &Rule) -> Self {
        Self {
            key: key.to_string(),
            match_mode: rule.match_mode,
            is_exception: rule.is_exception,
            needs_domain_check: rule.needs_domain_check,
            scheme: rule.scheme.clone(),
            blocked_domains: rule.blocked_domains.clone(),
            allowed_domains: rule.allowed_domains.clone(),
            options: rule.options,
            exception_options: rule.exception_options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rule_with_different_text_is_duplicate() {
        let mut dedupe = Deduplicator::new();
        let rule = Rule {
            options: RuleOptions::SCRIPT,
            text: "||ads.example.com^$script".to_string(),
            ..Rule::default()
        };
        let respelled = Rule {
            text: "||ADS.example.com^$Script".to_string(),
            ..rule.clone()
        };

        assert!(!dedupe.is_duplicate("ads.example.com^", &rule));
        assert!(dedupe.is_duplicate("ads.example.com^", &respelled));
        assert_eq!(dedupe.duplicates(), 1);
    }

    #[test]
    fn differing_options_are_kept() {
        let mut dedupe = Deduplicator::new();
        let rule = Rule::default();
        let scoped = Rule {
            options: RuleOptions::IMAGE,
            ..Rule::default()
        };

        assert!(!dedupe.is_duplicate("/ads/", &rule));
        assert!(!dedupe.is_duplicate("/ads/", &scoped));
    }
}
