use std::io::{self, BufRead};

use cb_core::RuleSet;

use crate::optimizer::Deduplicator;
use crate::parser::{parse_rule_line, CosmeticEntry, ParseError, ParsedLine};

/// Builds a [`RuleSet`] line by line.
///
/// Lines that fail to parse are dropped and counted; they never stop the
/// build.
pub struct RuleSetBuilder {
    rule_set: RuleSet,
    dedupe: Deduplicator,
    enable_wildcards: bool,
}

impl RuleSetBuilder {
    pub fn new(enable_wildcards: bool) -> Self {
        Self {
            rule_set: RuleSet::new(),
            dedupe: Deduplicator::new(),
            enable_wildcards,
        }
    }

    pub fn add_line(&mut self, line: &str) {
        match parse_rule_line(line, self.enable_wildcards) {
            Ok(ParsedLine::Network { key, rule }) => {
                if self.dedupe.is_duplicate(&key, &rule) {
                    self.rule_set.record_duplicate_rule();
                } else {
                    self.rule_set.add_rule(&key, rule);
                }
            }
            Ok(ParsedLine::Cosmetic(entries)) => {
                for entry in entries {
                    match entry {
                        CosmeticEntry::Global(selector) => self.rule_set.add_style_sheet(&selector),
                        CosmeticEntry::Hide { domain, selector } => self.rule_set.add_black_list(&domain, &selector),
                        CosmeticEntry::Unhide { domain, selector } => self.rule_set.add_white_list(&domain, &selector),
                    }
                }
            }
            Err(ParseError::Comment) => {}
            Err(err) => {
                log::debug!("Dropped filter '{}': {}", line.trim(), err);
                self.rule_set.record_dropped_line();
            }
        }
    }

    pub fn finish(self) -> RuleSet {
        self.rule_set
    }
}

/// Parse a whole filter list.
pub fn build_rule_set(text: &str, enable_wildcards: bool) -> RuleSet {
    let mut builder = RuleSetBuilder::new(enable_wildcards);
    for line in text.lines() {
        builder.add_line(line);
    }
    builder.finish()
}

/// Parse a filter list from a reader.
pub fn build_rule_set_from_reader<R: BufRead>(reader: R, enable_wildcards: bool) -> io::Result<RuleSet> {
    let mut builder = RuleSetBuilder::new(enable_wildcards);
    for line in reader.lines() {
        builder.add_line(&line?);
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use cb_core::types::ResourceType;
    use cb_core::RuleSet;

    use super::build_rule_set;

    fn blocked(set: &RuleSet, base: &str, request: &str, resource_type: ResourceType) -> bool {
        set.check_url(base, request, resource_type).is_some()
    }

    #[test]
    fn comment_lines_add_nothing() {
        let set = build_rule_set("[Adblock Plus 2.0]\n! Title: Test\n!||ads.example.com^\n!##.ad\n", true);
        assert!(set.is_empty());
        assert_eq!(set.stats().dropped_lines, 0);
        assert_eq!(set.trie().node_count(), 1);
    }

    #[test]
    fn script_option_round_trip() {
        let set = build_rule_set("||example.com^$script", true);
        let base = "http://example.com";
        let request = "http://example.com/app.js";
        assert!(blocked(&set, base, request, ResourceType::Script));
        assert!(!blocked(&set, base, request, ResourceType::Image));
    }

    #[test]
    fn exception_precedence() {
        let set = build_rule_set("||ads.example.com^\n@@||ads.example.com/safe.js|", true);
        let base = "http://news.example.org/";
        assert!(!blocked(&set, base, "http://ads.example.com/safe.js", ResourceType::Script));
        assert!(blocked(&set, base, "http://ads.example.com/tracker.js", ResourceType::Script));
    }

    #[test]
    fn domain_scoping() {
        let set = build_rule_set("||tracker.example^$domain=good.com|~bad.com", true);
        let request = "http://tracker.example/pixel.gif";
        assert!(blocked(&set, "http://good.com/", request, ResourceType::Image));
        assert!(!blocked(&set, "http://bad.com/", request, ResourceType::Image));
        assert!(blocked(&set, "http://elsewhere.net/", request, ResourceType::Image));
    }

    #[test]
    fn wildcard_rules_respect_switch() {
        let disabled = build_rule_set("ad*.example.com", false);
        assert_eq!(disabled.stats().network_rules, 0);
        assert_eq!(disabled.stats().dropped_lines, 1);
        assert_eq!(disabled.trie().node_count(), 1);

        let enabled = build_rule_set("ad*.example.com", true);
        assert!(blocked(&enabled, "", "http://adserver.example.com/", ResourceType::Other));
        assert!(!blocked(&enabled, "", "http://cdn.example.com/", ResourceType::Other));
    }

    #[test]
    fn separator_rules() {
        let set = build_rule_set("||example.com^", true);
        assert!(blocked(&set, "", "https://example.com", ResourceType::Other));
        assert!(blocked(&set, "", "https://example.com:8443/x", ResourceType::Other));
        assert!(blocked(&set, "", "https://www.example.com/x", ResourceType::Other));
        assert!(!blocked(&set, "", "https://example.company/x", ResourceType::Other));
        assert!(!blocked(&set, "", "https://myexample.com/x", ResourceType::Other));
    }

    #[test]
    fn separator_does_not_match_non_ascii() {
        let set = build_rule_set("/ad^\n||example.com/ad^", true);
        assert!(!blocked(&set, "", "http://example.com/ad広.png", ResourceType::Image));
        assert!(!blocked(&set, "", "http://example.com/ad広告.png", ResourceType::Image));
        assert!(blocked(&set, "", "http://example.com/ad/広.png", ResourceType::Image));
    }

    #[test]
    fn start_anchored_scheme_rules() {
        let set = build_rule_set("|https://ads.", true);
        assert!(blocked(&set, "", "https://ads.example.com/", ResourceType::Other));
        assert!(!blocked(&set, "", "http://ads.example.com/", ResourceType::Other));
        assert!(!blocked(&set, "", "https://cdn.example.com/ads.js", ResourceType::Other));
    }

    #[test]
    fn cosmetic_rules_fill_tables() {
        let set = build_rule_set("##.ad\nexample.com,example.org##.banner\nexample.com#@#.ad", true);
        assert_eq!(set.style_sheet(), [".ad".to_string()]);
        assert_eq!(set.style_sheet_black_list("example.org"), [".banner".to_string()]);
        assert_eq!(set.style_sheet_white_list("example.com"), [".ad".to_string()]);

        let ids = build_rule_set("example.com###ad_top\nexample.com#@##ad_banner", true);
        assert_eq!(ids.style_sheet_black_list("example.com"), ["#ad_top".to_string()]);
        assert_eq!(ids.style_sheet_white_list("example.com"), ["#ad_banner".to_string()]);
    }

    #[test]
    fn duplicates_are_inserted_once() {
        let set = build_rule_set("||ads.example.com^\n||ads.example.com^\n||ADS.example.com^", true);
        let stats = set.stats();
        assert_eq!(stats.network_rules, 1);
        assert_eq!(stats.duplicate_rules, 2);
    }

    #[test]
    fn bad_lines_do_not_abort_loading() {
        let set = build_rule_set("||a.com^$popup\n/regex\\d/\n||b.com^$document\n||c.com^", true);
        let stats = set.stats();
        assert_eq!(stats.dropped_lines, 3);
        assert_eq!(stats.network_rules, 1);
        assert!(blocked(&set, "", "http://c.com/", ResourceType::Other));
    }

    #[test]
    fn reload_is_idempotent() {
        let text = "||ads.example.com^\n@@||ads.example.com/ok.js|\n/banner/*$image,third-party\n||t.example^$domain=a.com|~b.com";
        let requests = [
            ("http://a.com/", "http://ads.example.com/x.js", ResourceType::Script),
            ("http://a.com/", "http://ads.example.com/ok.js", ResourceType::Script),
            ("http://site.com/", "http://img.net/banner/1.png", ResourceType::Image),
            ("http://img.net/", "http://img.net/banner/1.png", ResourceType::Image),
            ("http://b.com/", "http://t.example/p", ResourceType::Other),
            ("http://a.com/", "http://t.example/p", ResourceType::Other),
        ];

        let first = build_rule_set(text, true);
        let second = build_rule_set(text, true);
        for (base, request, resource_type) in requests {
            assert_eq!(
                blocked(&first, base, request, resource_type),
                blocked(&second, base, request, resource_type),
                "{request} from {base}"
            );
        }
    }
}
