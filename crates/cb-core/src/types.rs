//! Core type definitions for the content blocking engine
//!
//! These types are shared by the parser, the match trie and the
//! profile layer.

// =============================================================================
// Rule Options (bit flags over the supported `$option` keywords)
// =============================================================================

bitflags::bitflags! {
    /// Options attached to a network rule.
    ///
    /// A rule carries two of these: the options it names, and the subset of
    /// those that were written with a leading `~`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleOptions: u16 {
        const THIRD_PARTY = 1 << 0;
        const STYLESHEET = 1 << 1;
        const SCRIPT = 1 << 2;
        const IMAGE = 1 << 3;
        const OBJECT = 1 << 4;
        const OBJECT_SUBREQUEST = 1 << 5;
        const SUBDOCUMENT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
    }
}

impl RuleOptions {
    /// Map an option keyword (without `~`) to its flag.
    pub fn from_option_name(name: &str) -> Option<Self> {
        match name {
            "third-party" => Some(Self::THIRD_PARTY),
            "stylesheet" => Some(Self::STYLESHEET),
            "script" => Some(Self::SCRIPT),
            "image" => Some(Self::IMAGE),
            "object" => Some(Self::OBJECT),
            "object-subrequest" | "object_subrequest" => Some(Self::OBJECT_SUBREQUEST),
            "subdocument" => Some(Self::SUBDOCUMENT),
            "xmlhttprequest" => Some(Self::XMLHTTPREQUEST),
            _ => None,
        }
    }
}

/// Resource-type options paired with the request type they gate.
///
/// Evaluation walks this table in order.
pub const RESOURCE_OPTIONS: [(RuleOptions, ResourceType); 7] = [
    (RuleOptions::IMAGE, ResourceType::Image),
    (RuleOptions::SCRIPT, ResourceType::Script),
    (RuleOptions::STYLESHEET, ResourceType::StyleSheet),
    (RuleOptions::OBJECT, ResourceType::Object),
    (RuleOptions::XMLHTTPREQUEST, ResourceType::XmlHttpRequest),
    (RuleOptions::SUBDOCUMENT, ResourceType::SubFrame),
    (RuleOptions::OBJECT_SUBREQUEST, ResourceType::ObjectSubrequest),
];

// =============================================================================
// Resource Types
// =============================================================================

/// Type of the resource a request is fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    Image,
    Script,
    StyleSheet,
    Object,
    ObjectSubrequest,
    SubFrame,
    XmlHttpRequest,
    #[default]
    Other,
}

impl ResourceType {
    /// Parse from a request type name. Unknown names map to `Other`.
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "script" => Self::Script,
            "stylesheet" => Self::StyleSheet,
            "object" => Self::Object,
            "object-subrequest" | "object_subrequest" => Self::ObjectSubrequest,
            "subdocument" | "sub_frame" | "subframe" => Self::SubFrame,
            "xmlhttprequest" | "xhr" => Self::XmlHttpRequest,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// How the literal of a rule must sit inside the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchMode {
    /// Anywhere in the URL.
    #[default]
    Contains,
    /// `|literal`: at the start of the URL.
    StartAnchored,
    /// `literal|`: at the end of the URL.
    EndAnchored,
    /// `|literal|`: the whole URL.
    Exact,
}

impl MatchMode {
    pub fn from_anchors(start: bool, end: bool) -> Self {
        match (start, end) {
            (true, true) => Self::Exact,
            (true, false) => Self::StartAnchored,
            (false, true) => Self::EndAnchored,
            (false, false) => Self::Contains,
        }
    }
}

/// A parsed network filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rule {
    pub match_mode: MatchMode,
    /// `@@` rule.
    pub is_exception: bool,
    /// `||` rule.
    pub needs_domain_check: bool,
    /// Scheme required by a start-anchored rule written as `|scheme://...`.
    pub scheme: Option<String>,
    /// `domain=` entries without `~`.
    pub blocked_domains: Vec<String>,
    /// `domain=` entries written with `~`, tilde stripped.
    pub allowed_domains: Vec<String>,
    pub options: RuleOptions,
    pub exception_options: RuleOptions,
    /// The filter line this rule was parsed from.
    pub text: String,
}

// =============================================================================
// Check Result
// =============================================================================

/// Result of checking a request against one or more profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// Name of the profile that blocked the request, empty if none did.
    pub profile: String,
    pub is_blocked: bool,
}

impl CheckResult {
    pub fn blocked_by(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            is_blocked: true,
        }
    }
}

/// Counters describing a loaded rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleSetStats {
    pub network_rules: usize,
    pub exception_rules: usize,
    pub trie_nodes: usize,
    pub global_selectors: usize,
    pub black_list_entries: usize,
    pub white_list_entries: usize,
    pub dropped_lines: usize,
    pub duplicate_rules: usize,
}
