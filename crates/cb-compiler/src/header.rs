//! Filter list header
//!
//! A list starts with an `[Adblock Plus x.y]` line followed by a block of
//! `! Key: value` comment lines. Only that leading block is read here.

use std::io::{self, BufRead};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("Missing [Adblock Plus] header line")]
    InvalidHeader,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata from the leading comment block of a filter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListHeader {
    /// The `[Adblock Plus ...]` line.
    pub version: String,
    pub title: Option<String>,
    pub update_url: Option<String>,
    pub checksum: Option<String>,
    pub expires: Option<Duration>,
    /// Whether anything but comments follows the header.
    pub has_body: bool,
}

/// Check for the `[Adblock Plus` marker, ignoring case.
pub fn is_list_header(line: &str) -> bool {
    line.trim_start()
        .get(..13)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("[adblock plus"))
}

impl ListHeader {
    /// Read the header block, stopping at the first rule line.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, HeaderError> {
        let mut lines = reader.lines();

        let first = match lines.next() {
            Some(line) => line?,
            None => return Err(HeaderError::InvalidHeader),
        };
        if !is_list_header(&first) {
            return Err(HeaderError::InvalidHeader);
        }

        let mut header = ListHeader {
            version: first.trim().to_string(),
            ..ListHeader::default()
        };

        for line in lines {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(comment) = line.strip_prefix('!') else {
                header.has_body = true;
                break;
            };

            if let Some((key, value)) = comment.split_once(':') {
                header.apply_field(key.trim(), value.trim());
            }
        }

        Ok(header)
    }

    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        Self::read(text.as_bytes())
    }

    fn apply_field(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }

        match key.to_ascii_lowercase().as_str() {
            "title" => self.title = Some(value.to_string()),
            "url" => self.update_url = Some(value.replace(' ', "")),
            "checksum" => self.checksum = Some(value.to_string()),
            "expires" => self.expires = parse_expires(value),
            _ => {}
        }
    }

    /// Expiry rounded up to whole days.
    pub fn expires_days(&self) -> Option<u32> {
        let secs = self.expires?.as_secs();
        u32::try_from(secs.div_ceil(86_400).max(1)).ok()
    }
}

/// `4 days`, `12 hours`, `1 day (update frequency)`
fn parse_expires(value: &str) -> Option<Duration> {
    let mut parts = value.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;
    if amount == 0 {
        return None;
    }

    let unit = parts.next().unwrap_or("days").to_ascii_lowercase();
    let secs = if unit.starts_with("hour") {
        amount.checked_mul(3_600)?
    } else if unit.starts_with("day") {
        amount.checked_mul(86_400)?
    } else {
        return None;
    };

    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "[Adblock Plus 2.0]
! Checksum: 3mDQz1BoGEaGMv8LBq2mSQ
! Title: EasyList
! Expires: 4 days (update frequency)
! URL: https://easylist.to/ easylist/easylist.txt
!
||ads.example.com^
";

    #[test]
    fn reads_metadata_block() {
        let header = ListHeader::parse(LIST).expect("header should parse");
        assert_eq!(header.version, "[Adblock Plus 2.0]");
        assert_eq!(header.title.as_deref(), Some("EasyList"));
        assert_eq!(header.update_url.as_deref(), Some("https://easylist.to/easylist/easylist.txt"));
        assert_eq!(header.checksum.as_deref(), Some("3mDQz1BoGEaGMv8LBq2mSQ"));
        assert_eq!(header.expires_days(), Some(4));
        assert!(header.has_body);
    }

    #[test]
    fn header_only_list_has_no_body() {
        let header = ListHeader::parse("[Adblock Plus 1.1]\n! Title: Empty\n\n").expect("header should parse");
        assert!(!header.has_body);
        assert_eq!(header.title.as_deref(), Some("Empty"));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(matches!(ListHeader::parse("||ads.example.com^"), Err(HeaderError::InvalidHeader)));
        assert!(matches!(ListHeader::parse(""), Err(HeaderError::InvalidHeader)));
        assert!(is_list_header("[adblock plus 2.0]"));
    }

    #[test]
    fn expiry_in_hours_rounds_up() {
        let header = ListHeader::parse("[Adblock Plus 2.0]\n! Expires: 12 hours\n").expect("header should parse");
        assert_eq!(header.expires_days(), Some(1));
    }

    #[test]
    fn oversized_expiry_is_ignored() {
        let header = ListHeader::parse("[Adblock Plus 2.0]\n! Expires: 18446744073709551615 days\n! Title: Huge\n")
            .expect("header should parse");
        assert_eq!(header.expires, None);
        assert_eq!(header.title.as_deref(), Some("Huge"));

        let header = ListHeader::parse("[Adblock Plus 2.0]\n! Expires: 999999999999 hours\n").expect("header should parse");
        assert!(header.expires.is_some());
        assert_eq!(header.expires_days(), None);
    }
}
