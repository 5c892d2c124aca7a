//! Parsing of analyzer output lines into findings.
//!
//! The analyzer is asked to print one finding per line using [`TEMPLATE`].
//! Anything else it prints (progress, checker chatter) is discarded.

use globset::GlobSet;

use super::Finding;

/// Output template handed to the analyzer.
pub const TEMPLATE: &str = "[{file}],[{line}],[{severity}],[{id}],[{message}]";

/// Separator between bracketed fields.
pub const SEPARATOR: &str = "],[";

/// file, line, severity, id and at least one message token.
const MIN_TOKENS: usize = 5;

/// Parse one output line. Returns `None` for lines that are not findings.
///
/// The message may itself contain the separator, so every token after the
/// fourth is rejoined before the closing bracket is trimmed.
pub fn parse_line(line: &str) -> Option<Finding> {
    let line = line.trim_end();
    let tokens: Vec<&str> = line.split(SEPARATOR).collect();
    if tokens.len() < MIN_TOKENS {
        return None;
    }

    let file = tokens[0].strip_prefix('[').unwrap_or(tokens[0]);
    let joined = tokens[4..].join(SEPARATOR);
    let message = joined.strip_suffix(']').unwrap_or(&joined);

    Some(Finding::new(
        normalize_path(file),
        tokens[1],
        tokens[2],
        tokens[3],
        message,
    ))
}

/// Parse every line, dropping non-findings and ignored files.
pub fn parse_output<S: AsRef<str>>(lines: &[S], ignore: &GlobSet) -> Vec<Finding> {
    lines
        .iter()
        .filter_map(|l| parse_line(l.as_ref()))
        .filter(|f| ignore.is_empty() || !ignore.is_match(&f.file))
        .collect()
}

fn normalize_path(file: &str) -> String {
    let mut file = file;
    while let Some(rest) = file.strip_prefix("./") {
        file = rest;
    }
    file.to_string()
}
