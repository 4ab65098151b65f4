//! Patch index parsing.
//!
//! A patch index is a line-oriented text feed published by a remote source.
//! Each meaningful line carries a numeric patch id immediately followed by a
//! filename:
//!
//! ```text
//! // lines starting with two slashes are comments
//! 1011 2009-01-01data.gpf
//! 1012    sprite update.grf
//! ```
//!
//! Parsing is tolerant. Comments, blank lines, lines without a leading id and
//! lines without a filename are dropped silently; no input makes the whole
//! feed fail to parse.
//!
//! # Example
//!
//! ```
//! use patchsync::index::{parse_index, select_pending};
//!
//! let feed = "// comment\n\n12  file.thm\n  15 another.grf  \nbadline\n";
//! let entries: Vec<_> = parse_index(feed).collect();
//!
//! assert_eq!(entries.len(), 2);
//! assert_eq!(entries[0].id, 12);
//! assert_eq!(entries[1].filename, "another.grf");
//!
//! let pending = select_pending(entries, 12);
//! assert_eq!(pending.len(), 1);
//! assert_eq!(pending[0].id, 15);
//! ```

use std::fmt;
use std::iter::FusedIterator;

use serde::Serialize;

/// A single versioned file offered by a remote source.
///
/// Entries are immutable once parsed and only live for one synchronization
/// pass; the list is rebuilt from the feed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PatchEntry {
    /// Patch id, non-decreasing in feed order.
    pub id: u64,

    /// Filename relative to the source's patch directory. Never empty.
    pub filename: String,
}

impl PatchEntry {
    /// Create a new patch entry.
    pub fn new(id: u64, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
        }
    }
}

impl fmt::Display for PatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.filename)
    }
}

/// Parse a raw index feed into its entries, lazily.
///
/// The line terminator is detected once: if the feed contains `\r\n`
/// anywhere, both `\r` and `\n` split lines; otherwise only `\n` does.
pub fn parse_index(text: &str) -> PatchEntries<'_> {
    PatchEntries {
        rest: Some(text),
        crlf: text.contains("\r\n"),
    }
}

/// Lazy iterator over the entries of a patch index.
///
/// Finite and single-pass: once exhausted it keeps returning `None`.
#[derive(Debug, Clone)]
pub struct PatchEntries<'a> {
    rest: Option<&'a str>,
    crlf: bool,
}

impl<'a> PatchEntries<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        let crlf = self.crlf;
        let split = rest.find(|c: char| c == '\n' || (crlf && c == '\r'));

        match split {
            Some(pos) => {
                // Both terminators are single-byte, so `pos + 1` is a char boundary.
                self.rest = Some(&rest[pos + 1..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

impl Iterator for PatchEntries<'_> {
    type Item = PatchEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.next_line()?;
            if let Some(entry) = parse_line(line) {
                return Some(entry);
            }
        }
    }
}

impl FusedIterator for PatchEntries<'_> {}

/// Parse a single index line.
///
/// Returns `None` for comments, blank lines, lines without a leading id and
/// lines whose filename would be empty.
pub fn parse_line(line: &str) -> Option<PatchEntry> {
    let line = line.trim_matches(is_feed_whitespace);

    if line.starts_with("//") {
        return None;
    }

    let digits_end = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    if digits_end == 0 {
        return None;
    }

    let id = parse_id(&line[..digits_end]);

    let filename: String = line[digits_end..]
        .chars()
        .filter(|c| !is_feed_whitespace(*c))
        .collect();
    if filename.is_empty() {
        return None;
    }

    Some(PatchEntry { id, filename })
}

/// Select the pending suffix of an index.
///
/// Scans for the first entry whose id is greater than `last_applied` and
/// returns it together with every entry after it, in feed order. Later
/// entries are not filtered again; the feed is trusted to be ordered.
pub fn select_pending<I>(entries: I, last_applied: u64) -> Vec<PatchEntry>
where
    I: IntoIterator<Item = PatchEntry>,
{
    entries
        .into_iter()
        .skip_while(|entry| entry.id <= last_applied)
        .collect()
}

/// Whitespace as understood by the feed format (ASCII only).
pub(crate) fn is_feed_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C' | '\0')
}

/// Digit runs too long for `u64` saturate instead of wrapping.
fn parse_id(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(feed: &str) -> Vec<u64> {
        parse_index(feed).map(|e| e.id).collect()
    }

    #[test]
    fn test_parse_tolerant_feed() {
        let feed = "// comment\n\n12  file.thm\n  15 another.grf  \nbadline\n";
        let entries: Vec<_> = parse_index(feed).collect();

        assert_eq!(
            entries,
            vec![
                PatchEntry::new(12, "file.thm"),
                PatchEntry::new(15, "another.grf"),
            ]
        );
    }

    #[test]
    fn test_parse_crlf_feed() {
        let feed = "1 a.gpf\r\n2 b.gpf\r\n\r\n3 c.gpf";
        assert_eq!(ids(feed), vec![1, 2, 3]);
    }

    #[test]
    fn test_mixed_terminators_in_crlf_feed() {
        let feed = "1 a.gpf\r\n2 b.gpf\n3 c.gpf\r4 d.gpf";
        assert_eq!(ids(feed), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_lone_carriage_return_in_lf_feed_is_trimmed() {
        let feed = "1 a.gpf \r \n2 b.gpf\n";
        let entries: Vec<_> = parse_index(feed).collect();
        assert_eq!(
            entries,
            vec![PatchEntry::new(1, "a.gpf"), PatchEntry::new(2, "b.gpf")]
        );
    }

    #[test]
    fn test_carriage_return_kept_as_filename_char_without_crlf() {
        // No "\r\n" in the feed, so '\r' does not split lines; it is still
        // whitespace and is dropped from the filename.
        let feed = "1 a\rb.gpf\n";
        let entries: Vec<_> = parse_index(feed).collect();
        assert_eq!(entries, vec![PatchEntry::new(1, "ab.gpf")]);
    }

    #[test]
    fn test_embedded_whitespace_is_removed() {
        let entry = parse_line("  42\tmy  patch file.grf ").unwrap();
        assert_eq!(entry.id, 42);
        assert_eq!(entry.filename, "mypatchfile.grf");
    }

    #[test]
    fn test_id_directly_followed_by_filename() {
        let entry = parse_line("1011 2009-01-01data.gpf").unwrap();
        assert_eq!(entry.id, 1011);
        assert_eq!(entry.filename, "2009-01-01data.gpf");

        let entry = parse_line("7abc.gpf").unwrap();
        assert_eq!(entry.id, 7);
        assert_eq!(entry.filename, "abc.gpf");
    }

    #[test]
    fn test_skipped_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("// 12 commented.gpf"), None);
        assert_eq!(parse_line("   //12 indented-comment.gpf"), None);
        assert_eq!(parse_line("12"), None);
        assert_eq!(parse_line("12   \t"), None);
        assert_eq!(parse_line("file.gpf 12"), None);
        assert_eq!(parse_line("-12 negative.gpf"), None);
    }

    #[test]
    fn test_single_slash_is_not_a_comment() {
        assert_eq!(parse_line("/12 x.gpf"), None);
        assert_eq!(parse_line("12 /x.gpf").unwrap().filename, "/x.gpf");
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(parse_line("007 bond.gpf").unwrap().id, 7);
    }

    #[test]
    fn test_oversized_id_saturates() {
        let entry = parse_line("99999999999999999999999 big.gpf").unwrap();
        assert_eq!(entry.id, u64::MAX);
    }

    #[test]
    fn test_iterator_is_single_pass() {
        let mut entries = parse_index("1 a.gpf\n2 b.gpf\n");
        assert!(entries.next().is_some());
        assert!(entries.next().is_some());
        assert!(entries.next().is_none());
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_select_pending_resumes_after_last_applied() {
        let entries = parse_index("1 a\n2 b\n3 c\n4 d\n5 e\n");
        let pending = select_pending(entries, 3);

        let pending_ids: Vec<_> = pending.iter().map(|e| e.id).collect();
        assert_eq!(pending_ids, vec![4, 5]);
    }

    #[test]
    fn test_select_pending_up_to_date() {
        let entries = parse_index("1 a\n2 b\n");
        assert!(select_pending(entries, 2).is_empty());

        let entries = parse_index("1 a\n2 b\n");
        assert!(select_pending(entries, 100).is_empty());
    }

    #[test]
    fn test_select_pending_from_zero_takes_everything() {
        let entries = parse_index("0 zero\n1 a\n2 b\n");
        let pending = select_pending(entries, 0);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, 1);
    }

    #[test]
    fn test_select_pending_keeps_suffix_after_first_match() {
        // Only the first newer entry is searched for; everything after it
        // stays pending in feed order.
        let entries = vec![
            PatchEntry::new(1, "a"),
            PatchEntry::new(5, "b"),
            PatchEntry::new(3, "c"),
        ];
        let pending = select_pending(entries, 2);
        let pending_ids: Vec<_> = pending.iter().map(|e| e.id).collect();
        assert_eq!(pending_ids, vec![5, 3]);
    }

    #[test]
    fn test_display() {
        assert_eq!(PatchEntry::new(3, "x.gpf").to_string(), "3 - x.gpf");
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(feed in "\\PC*") {
            let _ = parse_index(&feed).count();
        }

        #[test]
        fn prop_entries_have_clean_filenames(feed in "[0-9a-z /\t\r\n.]{0,200}") {
            for entry in parse_index(&feed) {
                prop_assert!(!entry.filename.is_empty());
                prop_assert!(!entry.filename.chars().any(is_feed_whitespace));
            }
        }

        #[test]
        fn prop_well_formed_lines_round_trip(
            lines in proptest::collection::vec((0u64..1_000_000, "[a-z][a-z0-9._-]{0,12}"), 0..20)
        ) {
            let feed: String = lines
                .iter()
                .map(|(id, name)| format!("{} {}\n", id, name))
                .collect();
            let parsed: Vec<_> = parse_index(&feed).collect();

            prop_assert_eq!(parsed.len(), lines.len());
            for (entry, (id, name)) in parsed.iter().zip(lines.iter()) {
                prop_assert_eq!(entry.id, *id);
                prop_assert_eq!(&entry.filename, name);
            }
        }
    }
}
