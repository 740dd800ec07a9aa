//! Newline-delimited input lists.

use std::path::Path;

use crate::probe::InputError;

/// Reads `path` as one entry per line, trimming whitespace and skipping blank
/// lines.
pub fn load_lines(path: impl AsRef<Path>) -> Result<Vec<String>, InputError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_lines(&text))
}

/// Addresses to probe. An empty list is allowed.
pub fn load_addresses(path: impl AsRef<Path>) -> Result<Vec<String>, InputError> {
    load_lines(path)
}

/// Domains usable for `MAIL FROM`; at least one is required.
pub fn load_sender_domains(path: impl AsRef<Path>) -> Result<Vec<String>, InputError> {
    let path = path.as_ref();
    let domains = load_lines(path)?;
    if domains.is_empty() {
        return Err(InputError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(domains)
}

fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
