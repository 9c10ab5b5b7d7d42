//! Rule Evaluator
//!
//! Decides whether one candidate rule, whose literal the trie matched at a
//! given span of the request URL, blocks the request.

use crate::types::{MatchMode, ResourceType, Rule, RuleOptions, RESOURCE_OPTIONS};
use crate::url::{create_subdomain_list, extract_host, is_host_char, NormalizedUrl};

// =============================================================================
// Request Context
// =============================================================================

/// Everything about a request that rule evaluation looks at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Normalized request URL (lowercase, no scheme).
    pub request: NormalizedUrl,
    /// Host of the page that issued the request, lowercase.
    pub base_host: String,
    pub resource_type: ResourceType,
}

impl RequestContext {
    pub fn new(base_url: &str, request_url: &str, resource_type: ResourceType) -> Self {
        Self {
            request: NormalizedUrl::new(request_url),
            base_host: extract_host(base_url.trim())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default(),
            resource_type,
        }
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.request.url
    }

    #[inline]
    pub fn request_host(&self) -> &str {
        self.request.host()
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of evaluating one rule against one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A blocking rule applies.
    Block,
    /// An exception rule applies; the request is explicitly allowed.
    Allow,
    /// The rule does not apply; keep scanning.
    NoMatch,
}

impl Verdict {
    #[inline]
    pub fn is_blocked(self) -> bool {
        self == Self::Block
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluates candidate rules for a single request.
pub struct RuleEvaluator<'a> {
    ctx: &'a RequestContext,
    request_subdomains: Vec<&'a str>,
    base_subdomains: Vec<&'a str>,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self {
            ctx,
            request_subdomains: create_subdomain_list(ctx.request_host()),
            base_subdomains: create_subdomain_list(&ctx.base_host),
        }
    }

    /// Evaluate `rule` for a literal that covered `url[start..end]`.
    ///
    /// The steps run in a fixed order; each later step only narrows or
    /// flips the decision reached by the earlier ones.
    pub fn evaluate(&self, rule: &Rule, start: usize, end: usize) -> Verdict {
        let url = self.ctx.url();

        if !self.matches_mode(rule, start, end) {
            return Verdict::NoMatch;
        }

        if rule.needs_domain_check && !self.matches_domain_boundary(&url.as_bytes()[start..end], start) {
            return Verdict::NoMatch;
        }

        let base_host = self.ctx.base_host.as_str();
        let has_blocked_domains = !rule.blocked_domains.is_empty();
        let has_allowed_domains = !rule.allowed_domains.is_empty();

        let mut is_blocked = if has_blocked_domains {
            contains_any(base_host, &rule.blocked_domains)
        } else {
            true
        };
        if has_allowed_domains {
            is_blocked = !contains_any(base_host, &rule.allowed_domains);
        }

        if rule.options.contains(RuleOptions::THIRD_PARTY) {
            let excepted = rule.exception_options.contains(RuleOptions::THIRD_PARTY);
            if self.is_first_party() {
                is_blocked = excepted;
            } else if !has_blocked_domains && !has_allowed_domains {
                is_blocked = !excepted;
            }
        }

        for (option, resource_type) in RESOURCE_OPTIONS {
            if !rule.options.contains(option) {
                continue;
            }
            let excepted = rule.exception_options.contains(option);
            if self.ctx.resource_type == resource_type {
                is_blocked = is_blocked && !excepted;
            } else {
                is_blocked = is_blocked && excepted;
            }
        }

        match (is_blocked, rule.is_exception) {
            (true, false) => Verdict::Block,
            (true, true) => Verdict::Allow,
            (false, _) => Verdict::NoMatch,
        }
    }

    /// Anchors are verified against the span the trie matched.
    fn matches_mode(&self, rule: &Rule, start: usize, end: usize) -> bool {
        let at_start = start == 0
            && rule
                .scheme
                .as_deref()
                .map_or(true, |scheme| scheme == self.ctx.request.scheme);
        let at_end = end == self.ctx.url().len();

        match rule.match_mode {
            MatchMode::Contains => true,
            MatchMode::StartAnchored => at_start,
            MatchMode::EndAnchored => at_end,
            MatchMode::Exact => at_start && at_end,
        }
    }

    /// `||` rules must start on a label of the request host, and the host
    /// part of the literal must be one of the host's subdomain suffixes.
    fn matches_domain_boundary(&self, literal: &[u8], start: usize) -> bool {
        let request = &self.ctx.request;
        if start < request.host_start || start >= request.host_end {
            return false;
        }
        if start > request.host_start && request.url.as_bytes()[start - 1] != b'.' {
            return false;
        }

        let host_part_len = literal.iter().take_while(|&&b| is_host_char(b)).count();
        let host_part = &literal[..host_part_len];
        self.request_subdomains.iter().any(|domain| domain.as_bytes() == host_part)
    }

    /// A request is first-party when either host is a subdomain suffix of
    /// the other. Requests without a base page count as first-party.
    fn is_first_party(&self) -> bool {
        let base_host = self.ctx.base_host.as_str();
        let request_host = self.ctx.request_host();
        base_host.is_empty()
            || self.request_subdomains.contains(&base_host)
            || self.base_subdomains.contains(&request_host)
    }
}

fn contains_any(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|domain| host.contains(domain.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> Rule {
        Rule::default()
    }

    fn span(ctx: &RequestContext, literal: &str) -> (usize, usize) {
        let start = ctx.url().find(literal).expect("literal should occur in url");
        (start, start + literal.len())
    }

    fn verdict(rule: &Rule, base: &str, request: &str, resource_type: ResourceType, literal: &str) -> Verdict {
        let ctx = RequestContext::new(base, request, resource_type);
        let (start, end) = span(&ctx, literal);
        RuleEvaluator::new(&ctx).evaluate(rule, start, end)
    }

    #[test]
    fn plain_rule_blocks() {
        let r = rule();
        let v = verdict(&r, "http://site.com/", "http://ads.net/banner.gif", ResourceType::Image, "banner");
        assert_eq!(v, Verdict::Block);
    }

    #[test]
    fn exception_rule_allows() {
        let r = Rule {
            is_exception: true,
            ..rule()
        };
        let v = verdict(&r, "http://site.com/", "http://ads.net/banner.gif", ResourceType::Image, "banner");
        assert_eq!(v, Verdict::Allow);
    }

    #[test]
    fn anchors_use_match_offsets() {
        let start = Rule {
            match_mode: MatchMode::StartAnchored,
            ..rule()
        };
        assert_eq!(
            verdict(&start, "", "http://ads.net/x", ResourceType::Other, "ads.net"),
            Verdict::Block
        );
        assert_eq!(
            verdict(&start, "", "http://cdn.ads.net/x", ResourceType::Other, "ads.net"),
            Verdict::NoMatch
        );

        let end = Rule {
            match_mode: MatchMode::EndAnchored,
            ..rule()
        };
        assert_eq!(
            verdict(&end, "", "http://ads.net/x.swf", ResourceType::Other, ".swf"),
            Verdict::Block
        );
        assert_eq!(
            verdict(&end, "", "http://ads.net/x.swf?y", ResourceType::Other, ".swf"),
            Verdict::NoMatch
        );
    }

    #[test]
    fn start_anchor_checks_scheme() {
        let r = Rule {
            match_mode: MatchMode::StartAnchored,
            scheme: Some("https".to_string()),
            ..rule()
        };
        assert_eq!(
            verdict(&r, "", "https://ads.net/", ResourceType::Other, "ads.net"),
            Verdict::Block
        );
        assert_eq!(
            verdict(&r, "", "http://ads.net/", ResourceType::Other, "ads.net"),
            Verdict::NoMatch
        );
    }

    #[test]
    fn domain_anchor_requires_label_boundary() {
        let r = Rule {
            needs_domain_check: true,
            ..rule()
        };
        assert_eq!(
            verdict(&r, "", "http://ads.example.com/", ResourceType::Other, "example.com/"),
            Verdict::Block
        );
        assert_eq!(
            verdict(&r, "", "http://badexample.com/", ResourceType::Other, "example.com/"),
            Verdict::NoMatch
        );
        assert_eq!(
            verdict(&r, "", "http://site.com/?u=example.com", ResourceType::Other, "example.com"),
            Verdict::NoMatch
        );
        assert_eq!(
            verdict(&r, "", "http://example.com.evil.net/", ResourceType::Other, "example.com"),
            Verdict::NoMatch
        );
    }

    #[test]
    fn domain_anchor_span_may_end_inside_a_character() {
        let r = Rule {
            needs_domain_check: true,
            ..rule()
        };
        let ctx = RequestContext::new("", "http://example.com/ad広告.png", ResourceType::Image);
        let start = ctx.url().find("example.com").expect("host should occur in url");
        let end = ctx.url().find("広").expect("character should occur in url") + 1;
        assert!(!ctx.url().is_char_boundary(end));
        assert_eq!(RuleEvaluator::new(&ctx).evaluate(&r, start, end), Verdict::Block);
    }

    #[test]
    fn domain_option_scopes_base_host() {
        let r = Rule {
            blocked_domains: vec!["good.com".to_string()],
            allowed_domains: vec!["bad.com".to_string()],
            ..rule()
        };
        let request = "http://tracker.example/t.js";
        assert_eq!(verdict(&r, "http://good.com/", request, ResourceType::Script, "tracker"), Verdict::Block);
        assert_eq!(verdict(&r, "http://bad.com/", request, ResourceType::Script, "tracker"), Verdict::NoMatch);
        assert_eq!(verdict(&r, "http://other.org/", request, ResourceType::Script, "tracker"), Verdict::Block);

        let only_blocked = Rule {
            blocked_domains: vec!["good.com".to_string()],
            ..rule()
        };
        assert_eq!(
            verdict(&only_blocked, "http://other.org/", request, ResourceType::Script, "tracker"),
            Verdict::NoMatch
        );
    }

    #[test]
    fn third_party_option() {
        let r = Rule {
            options: RuleOptions::THIRD_PARTY,
            ..rule()
        };
        let request = "http://cdn.example.com/ad.js";
        assert_eq!(verdict(&r, "http://other.org/", request, ResourceType::Script, "ad.js"), Verdict::Block);
        assert_eq!(verdict(&r, "http://example.com/", request, ResourceType::Script, "ad.js"), Verdict::NoMatch);
        assert_eq!(verdict(&r, "", request, ResourceType::Script, "ad.js"), Verdict::NoMatch);

        let first_party_only = Rule {
            options: RuleOptions::THIRD_PARTY,
            exception_options: RuleOptions::THIRD_PARTY,
            ..rule()
        };
        assert_eq!(
            verdict(&first_party_only, "http://example.com/", request, ResourceType::Script, "ad.js"),
            Verdict::Block
        );
        assert_eq!(
            verdict(&first_party_only, "http://other.org/", request, ResourceType::Script, "ad.js"),
            Verdict::NoMatch
        );
    }

    #[test]
    fn resource_type_options() {
        let script_only = Rule {
            options: RuleOptions::SCRIPT,
            ..rule()
        };
        let request = "http://ads.net/x";
        assert_eq!(verdict(&script_only, "", request, ResourceType::Script, "ads"), Verdict::Block);
        assert_eq!(verdict(&script_only, "", request, ResourceType::Image, "ads"), Verdict::NoMatch);

        let not_image = Rule {
            options: RuleOptions::IMAGE,
            exception_options: RuleOptions::IMAGE,
            ..rule()
        };
        assert_eq!(verdict(&not_image, "", request, ResourceType::Image, "ads"), Verdict::NoMatch);
        assert_eq!(verdict(&not_image, "", request, ResourceType::Script, "ads"), Verdict::Block);
    }
}
