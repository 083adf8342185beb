//! Revision table format.
//!
//! Newline-delimited text, one revision per non-empty line:
//! `git_sha,human_version,kconfig_hash`. No header row, and fields cannot
//! contain commas (a known limitation of the producer).

use serde::{Deserialize, Serialize};

/// One recorded version of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Source identifier of the revision.
    pub git_sha: String,
    /// Display version, treated as unique for lookup.
    pub human_version: String,
    /// Content hash naming the revision's kconfig bundle archive.
    pub kconfig_hash: String,
}

impl Revision {
    /// Parse one table row. Missing trailing fields default to empty
    /// strings, but a row without an identifier is unaddressable and is
    /// dropped entirely.
    fn from_table_row(line: &str) -> Option<Revision> {
        let mut fields = line.split(',');
        let git_sha = fields.next().unwrap_or_default();
        if git_sha.is_empty() {
            return None;
        }
        Some(Revision {
            git_sha: git_sha.to_owned(),
            human_version: fields.next().unwrap_or_default().to_owned(),
            kconfig_hash: fields.next().unwrap_or_default().to_owned(),
        })
    }
}

/// Parse a whole table, preserving row order.
pub fn parse_table(text: &str) -> Vec<Revision> {
    text.lines()
        .filter(|line| !line.is_empty())
        .filter_map(Revision::from_table_row)
        .collect()
}
