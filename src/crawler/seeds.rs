//! Seed list loading

use std::fs;
use std::io;
use std::path::Path;

/// Reads seed URLs from a file, one per line
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
/// Order is kept and repeats are not removed.
pub fn load_seeds(path: &Path) -> io::Result<Vec<String>> {
    Ok(parse_seeds(&fs::read_to_string(path)?))
}

pub fn parse_seeds(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
