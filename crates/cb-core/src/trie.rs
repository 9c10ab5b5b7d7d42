//! Match Trie
//!
//! A per-byte trie over rule literals. Nodes live in one arena and address
//! their children by index, so dropping the trie frees everything at once.
//!
//! Two edge labels are not literal bytes:
//!
//! - `*` matches any run of bytes, including an empty one.
//! - `^` matches one ABP separator byte, or the end of the input.

use crate::types::Rule;
use crate::url::is_separator_char;

/// Index of a node in the arena.
pub type NodeId = u32;

/// Index of a rule in the rule table.
pub type RuleId = u32;

const ROOT: NodeId = 0;

/// Label on the edge leading into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Byte(u8),
    Wildcard,
    Separator,
}

impl Edge {
    #[inline]
    fn from_key_byte(b: u8) -> Self {
        match b {
            b'*' => Self::Wildcard,
            b'^' => Self::Separator,
            _ => Self::Byte(b.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    edge: Edge,
    children: Vec<NodeId>,
    rules: Vec<RuleId>,
}

impl Node {
    fn new(edge: Edge) -> Self {
        Self {
            edge,
            children: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Character trie holding every network rule of a rule set.
#[derive(Debug, Clone)]
pub struct MatchTrie {
    nodes: Vec<Node>,
    rules: Vec<Rule>,
    exception_count: usize,
}

impl Default for MatchTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTrie {
    pub fn new() -> Self {
        Self {
            // The root edge label is never read.
            nodes: vec![Node::new(Edge::Byte(0))],
            rules: Vec::new(),
            exception_count: 0,
        }
    }

    /// Insert `rule` at the path spelled by `key`.
    ///
    /// Shared prefixes reuse existing nodes; a rule whose key is already
    /// present is appended next to the rules stored there.
    pub fn insert(&mut self, key: &str, rule: Rule) -> RuleId {
        let mut node = ROOT;

        for b in key.bytes() {
            let edge = Edge::from_key_byte(b);
            node = match self.find_child(node, edge) {
                Some(child) => child,
                None => {
                    let child = self.nodes.len() as NodeId;
                    self.nodes.push(Node::new(edge));
                    self.nodes[node as usize].children.push(child);
                    child
                }
            };
        }

        if rule.is_exception {
            self.exception_count += 1;
        }

        let rule_id = self.rules.len() as RuleId;
        self.rules.push(rule);
        self.nodes[node as usize].rules.push(rule_id);
        rule_id
    }

    fn find_child(&self, node: NodeId, edge: Edge) -> Option<NodeId> {
        self.nodes[node as usize]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child as usize].edge == edge)
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id as usize]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn has_exceptions(&self) -> bool {
        self.exception_count > 0
    }

    pub fn exception_count(&self) -> usize {
        self.exception_count
    }

    /// Find a rule whose literal matches `input` starting at `offset`.
    ///
    /// `accept` is called with each candidate rule and the byte span
    /// `[start, end)` of `input` its literal covered. The first candidate it
    /// accepts ends the walk.
    pub fn match_at<F>(&self, input: &[u8], offset: usize, accept: &mut F) -> Option<RuleId>
    where
        F: FnMut(&Rule, usize, usize) -> bool,
    {
        self.walk(ROOT, input, offset, offset, accept)
    }

    fn walk<F>(&self, mut node: NodeId, input: &[u8], start: usize, mut pos: usize, accept: &mut F) -> Option<RuleId>
    where
        F: FnMut(&Rule, usize, usize) -> bool,
    {
        loop {
            let current = &self.nodes[node as usize];

            for &rule_id in &current.rules {
                if accept(&self.rules[rule_id as usize], start, pos) {
                    return Some(rule_id);
                }
            }

            let mut next = None;
            for &child in &current.children {
                match self.nodes[child as usize].edge {
                    Edge::Wildcard => {
                        for split in pos..=input.len() {
                            if let Some(found) = self.walk(child, input, start, split, accept) {
                                return Some(found);
                            }
                        }
                    }
                    Edge::Separator => {
                        let found = if pos == input.len() {
                            self.walk(child, input, start, pos, accept)
                        } else if is_separator_char(input[pos]) {
                            self.walk(child, input, start, pos + 1, accept)
                        } else {
                            None
                        };
                        if found.is_some() {
                            return found;
                        }
                    }
                    Edge::Byte(b) => {
                        if pos < input.len() && input[pos] == b {
                            next = Some(child);
                        }
                    }
                }
            }

            match next {
                Some(child) => {
                    node = child;
                    pos += 1;
                }
                None => return None,
            }
        }
    }
}
