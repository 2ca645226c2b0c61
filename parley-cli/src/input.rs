//! Input assembly for a user turn
//!
//! Merges three sources into one user message: command-line text, piped
//! standard input (fenced as a code block), and `![file <path>]` embedding
//! directives replaced by the referenced file's contents.

use crate::error::CliError;
use regex::Regex;
use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::sync::OnceLock;

fn file_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"!\[file\s+([^\]]+)\]") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern is valid"),
    })
}

/// Read standard input when it is a redirected stream.
///
/// An interactive terminal yields `None` without blocking. Piped input is
/// consumed to end-of-stream and fenced between triple-backtick lines.
pub fn read_stdin_if_piped() -> io::Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        lines.push(line?);
    }
    if lines.is_empty() {
        return Ok(None);
    }

    let mut fenced = Vec::with_capacity(lines.len() + 2);
    fenced.push("```".to_string());
    fenced.extend(lines);
    fenced.push("```".to_string());
    Ok(Some(fenced.join("\n")))
}

/// Merge command-line text with fenced stdin content, CLI text first.
///
/// Both empty yields empty; the caller decides whether that is fatal.
pub fn merge_input(cli_text: &str, stdin_fenced: &str) -> String {
    match (cli_text.is_empty(), stdin_fenced.is_empty()) {
        (false, false) => format!("{cli_text}\n{stdin_fenced}"),
        (false, true) => cli_text.to_string(),
        (true, _) => stdin_fenced.to_string(),
    }
}

/// Replace every `![file <path>]` directive with the named file's contents,
/// announced and fenced.
///
/// All replacements are collected up front and applied in reverse span order
/// so earlier splices never shift the not-yet-applied spans. Any unreadable
/// file aborts the whole patch; nothing partial escapes to the caller.
pub fn patch_input(input: &str) -> Result<String, CliError> {
    let mut replacements = Vec::new();

    for captures in file_directive_regex().captures_iter(input) {
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let path = path.as_str().trim();
        let content = fs::read_to_string(path).map_err(|source| CliError::FileRead {
            path: path.to_string(),
            source,
        })?;

        let replacement = format!("\nContent of file '{path}' is:\n```{content}\n```");
        replacements.push((whole.range(), replacement));
    }

    let mut result = input.to_string();
    for (span, replacement) in replacements.into_iter().rev() {
        result.replace_range(span, &replacement);
    }

    Ok(result)
}
