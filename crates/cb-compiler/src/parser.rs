use cb_core::types::{MatchMode, Rule, RuleOptions};

/// Why a filter line produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Comment or empty line")]
    Comment,
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Wildcards are disabled")]
    WildcardsDisabled,
    #[error("Regular expression rules are not supported")]
    RegexUnsupported,
    #[error("Empty pattern")]
    EmptyPattern,
    #[error("Unsupported filter syntax")]
    UnsupportedSyntax,
}

/// A single element hiding entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmeticEntry {
    /// `##selector`: hidden everywhere.
    Global(String),
    /// `domain##selector`: hidden on `domain`.
    Hide { domain: String, selector: String },
    /// `domain#@#selector`: not hidden on `domain`.
    Unhide { domain: String, selector: String },
}

/// Result of parsing one filter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Network rule with its trie key.
    Network { key: String, rule: Rule },
    Cosmetic(Vec<CosmeticEntry>),
}

/// Options that name a real ABP feature this engine does not interpret.
const UNSUPPORTED_OPTIONS: &[&str] = &["document", "elemhide", "generichide", "genericblock"];

/// Cosmetic syntaxes from other blockers.
const EXTENDED_COSMETIC_MARKERS: &[&str] = &["#?#", "#$#", "#@$#", "#@?#"];

pub fn parse_rule_line(raw_line: &str, enable_wildcards: bool) -> Result<ParsedLine, ParseError> {
    let line = raw_line.trim();
    if line.is_empty() || is_comment_line(line) {
        return Err(ParseError::Comment);
    }

    if EXTENDED_COSMETIC_MARKERS.iter().any(|marker| line.contains(marker)) {
        return Err(ParseError::UnsupportedSyntax);
    }

    if let Some(selector) = line.strip_prefix("##") {
        return Ok(ParsedLine::Cosmetic(vec![CosmeticEntry::Global(selector.to_string())]));
    }

    // `#@##id` contains `##`, so the earlier separator decides.
    match (line.find("##"), line.find("#@#")) {
        (Some(hide), Some(unhide)) if unhide < hide => {
            return parse_cosmetic_rule(&line[..unhide], &line[unhide + 3..], true);
        }
        (Some(hide), _) => return parse_cosmetic_rule(&line[..hide], &line[hide + 2..], false),
        (None, Some(unhide)) => return parse_cosmetic_rule(&line[..unhide], &line[unhide + 3..], true),
        (None, None) => {}
    }

    parse_network_rule(line, enable_wildcards)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

// =============================================================================
// Cosmetic Rules
// =============================================================================

fn parse_cosmetic_rule(domains: &str, selector: &str, is_white_list: bool) -> Result<ParsedLine, ParseError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(ParseError::EmptyPattern);
    }

    let mut entries = Vec::new();
    for raw in domains.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (negated, domain) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let domain = domain.to_ascii_lowercase();

        let entry = match (is_white_list, negated) {
            (false, false) => CosmeticEntry::Hide {
                domain,
                selector: selector.to_string(),
            },
            (false, true) | (true, false) => CosmeticEntry::Unhide {
                domain,
                selector: selector.to_string(),
            },
            // `~domain#@#` has no meaning.
            (true, true) => continue,
        };
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(ParseError::EmptyPattern);
    }

    Ok(ParsedLine::Cosmetic(entries))
}

// =============================================================================
// Network Rules
// =============================================================================

fn parse_network_rule(line: &str, enable_wildcards: bool) -> Result<ParsedLine, ParseError> {
    let (pattern_part, options_text) = split_rule_options(line);
    let mut pattern = pattern_part.trim();

    let mut rule = Rule {
        text: line.to_string(),
        ..Rule::default()
    };

    if let Some(rest) = pattern.strip_prefix("@@") {
        rule.is_exception = true;
        pattern = rest;
    }

    if pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/') {
        return Err(ParseError::RegexUnsupported);
    }

    let mut start_anchor = false;
    if let Some(rest) = pattern.strip_prefix("||") {
        rule.needs_domain_check = true;
        pattern = rest;
    } else if let Some(rest) = pattern.strip_prefix('|') {
        start_anchor = true;
        pattern = rest;
    }

    let mut end_anchor = false;
    if let Some(rest) = pattern.strip_suffix('|') {
        end_anchor = true;
        pattern = rest;
    }

    // A bare leading or trailing `*` matches nothing extra; it also voids
    // the anchor on that side.
    if pattern.starts_with('*') {
        pattern = pattern.trim_start_matches('*');
        start_anchor = false;
    }
    if pattern.ends_with('*') {
        pattern = pattern.trim_end_matches('*');
        end_anchor = false;
    }

    if !enable_wildcards && pattern.contains('*') {
        return Err(ParseError::WildcardsDisabled);
    }

    if let Some(options_text) = options_text {
        parse_options(options_text, &mut rule)?;
    }

    if start_anchor {
        if let Some((scheme, rest)) = split_pattern_scheme(pattern) {
            rule.scheme = Some(scheme.to_ascii_lowercase());
            pattern = rest;
        }
    }

    rule.match_mode = MatchMode::from_anchors(start_anchor, end_anchor);

    let has_constraints = !rule.options.is_empty()
        || !rule.blocked_domains.is_empty()
        || !rule.allowed_domains.is_empty();
    if pattern.is_empty() && !has_constraints {
        return Err(ParseError::EmptyPattern);
    }

    Ok(ParsedLine::Network {
        key: pattern.to_ascii_lowercase(),
        rule,
    })
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// `http://rest` → `("http", "rest")`
fn split_pattern_scheme(pattern: &str) -> Option<(&str, &str)> {
    let pos = pattern.find("://")?;
    let scheme = &pattern[..pos];
    if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.') {
        return None;
    }
    Some((scheme, &pattern[pos + 3..]))
}

fn parse_options(text: &str, rule: &mut Rule) -> Result<(), ParseError> {
    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            parse_domain_option(domain_value, rule);
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        if UNSUPPORTED_OPTIONS.contains(&name) {
            return Err(ParseError::UnsupportedOption(name.to_string()));
        }

        // `first-party` is `~third-party` spelled the other way round.
        let (option, excepted) = match name {
            "first-party" => (RuleOptions::THIRD_PARTY, !negated),
            _ => match RuleOptions::from_option_name(name) {
                Some(option) => (option, negated),
                None => return Err(ParseError::UnknownOption(raw.to_string())),
            },
        };

        rule.options |= option;
        if excepted {
            rule.exception_options |= option;
        }
    }

    Ok(())
}

fn parse_domain_option(value: &str, rule: &mut Rule) {
    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match raw.strip_prefix('~') {
            Some(domain) if !domain.is_empty() => rule.allowed_domains.push(domain.to_string()),
            Some(_) => {}
            None => rule.blocked_domains.push(raw.to_string()),
        }
    }
}
