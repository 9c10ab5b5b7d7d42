//! `! Checksum:` verification
//!
//! The checksum is the base64 MD5 of the list with the checksum line
//! removed, carriage returns dropped and runs of newlines collapsed to one.
//! Base64 padding is ignored on both sides.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

use crate::error::UpdateError;

const CHECKSUM_KEY: &str = "checksum";

/// A downloaded list split around its checksum line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitList<'a> {
    /// Declared checksum, padding stripped.
    pub checksum: Option<&'a str>,
    /// Everything except the checksum line.
    pub content: String,
}

/// Find the checksum line in the leading comment block and cut it out.
pub fn split_checksum(text: &str) -> SplitList<'_> {
    let mut checksum = None;
    let mut content = String::with_capacity(text.len());

    let mut in_header = true;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        let trimmed = line.trim();
        if in_header && index > 0 && !trimmed.is_empty() && !trimmed.starts_with('!') {
            in_header = false;
        }

        if in_header && checksum.is_none() {
            if let Some(value) = checksum_value(trimmed) {
                checksum = Some(value.trim_end_matches('='));
                continue;
            }
        }
        content.push_str(line);
    }

    SplitList { checksum, content }
}

/// Value of a `!checksum<sep>value` line. The separator is any run of
/// whitespace, `:` and `-`; the value is base64 text.
fn checksum_value(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('!')?.trim_start();
    if !rest.get(..CHECKSUM_KEY.len())?.eq_ignore_ascii_case(CHECKSUM_KEY) {
        return None;
    }

    let rest = &rest[CHECKSUM_KEY.len()..];
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '-');
    if value.len() == rest.len() {
        return None;
    }

    let end = value
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '/' | '=')))
        .unwrap_or(value.len());
    Some(&value[..end]).filter(|value| !value.is_empty())
}

/// Unpadded base64 MD5 of the normalized content.
pub fn compute_checksum(content: &str) -> String {
    let mut normalized = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\r' => {}
            '\n' if normalized.ends_with('\n') => {}
            _ => normalized.push(c),
        }
    }

    let digest = md5::compute(normalized.as_bytes());
    STANDARD_NO_PAD.encode(digest.0)
}

/// Check a downloaded list. Lists without a checksum line pass.
pub fn verify(text: &str) -> Result<(), UpdateError> {
    let split = split_checksum(text);
    let Some(expected) = split.checksum else {
        return Ok(());
    };

    let computed = compute_checksum(&split.content);
    if computed != expected {
        return Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            computed,
        });
    }
    Ok(())
}

/// Prepend a checksum line after the header line of `content`.
pub fn sign(content: &str) -> String {
    let checksum = compute_checksum(content);
    match content.split_once('\n') {
        Some((header, rest)) => format!("{header}\n! Checksum: {checksum}\n{rest}"),
        None => format!("{content}\n! Checksum: {checksum}\n"),
    }
}
