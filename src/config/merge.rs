//! Inline override parsing and merging
//!
//! The override string is a `;`-separated list of `path=value` assignments.
//! Each assignment is applied on its own; a bad one is reported and skipped.

use super::tree::ConfigTree;
use crate::error::LoghubError;

/// Parse an override string into a tree.
///
/// Returns the tree built from every assignment that applied, plus the errors
/// of the ones that did not. An entry without `=` sets the path to `""`.
pub fn parse_override(content: &str) -> (ConfigTree, Vec<LoghubError>) {
    let mut tree = ConfigTree::new();
    let mut errors = Vec::new();

    for entry in content.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (path, value) = match entry.split_once('=') {
            Some((path, value)) => (path.trim(), value.trim()),
            None => (entry, ""),
        };

        if let Err(e) = tree.set_str(path, -1, value) {
            errors.push(e);
        }
    }

    (tree, errors)
}

/// Merge an override string over `primary`, returning the merged tree and
/// the assignments that were skipped.
///
/// An assignment that would turn a list of the primary into a mapping, or
/// the reverse, is skipped as well and the primary value is kept.
pub fn merge_override(primary: &ConfigTree, content: &str) -> (ConfigTree, Vec<LoghubError>) {
    let (overlay, mut errors) = parse_override(content);
    let mut merged = primary.clone();
    errors.extend(merged.merge(&overlay));
    (merged, errors)
}
