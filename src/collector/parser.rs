//! Parsers for Slurm command output.
//!
//! Two dialects are supported:
//! - block format: `key=value` tokens as printed by `scontrol show ... --oneliner`
//! - delimited format: a header line followed by delimited rows, as printed by
//!   `sacct --parsable2` and `sacctmgr --parsable2`
//!
//! Both are pure functions over strings so they can be tested without a cluster.

use std::collections::HashMap;

use tracing::trace;

/// One parsed entity: field name to raw value.
pub type Record = HashMap<String, String>;

/// Delimiter used by `--parsable2` output.
pub const PARSABLE_DELIMITER: char = '|';

/// Keys whose values are free text and may contain whitespace.
pub const DEFAULT_FREE_TEXT_KEYS: &[&str] = &["Reason", "Comment", "AdminComment", "Command"];

/// Returns the value of `key`, or an empty string when the record lacks it.
pub fn field<'a>(record: &'a Record, key: &str) -> &'a str {
    record.get(key).map(String::as_str).unwrap_or("")
}

/// Parses block output using [`DEFAULT_FREE_TEXT_KEYS`].
pub fn parse_block_output(prefix: &str, output: &str) -> Vec<Record> {
    parse_block_output_with(prefix, output, DEFAULT_FREE_TEXT_KEYS)
}

/// Parses block `key=value` output into records.
///
/// A line starting with `prefix` (e.g. `NodeName=`) opens a new record; other
/// lines extend the current one. With an empty prefix every line opens a record.
/// Records without any field are discarded.
pub fn parse_block_output_with(prefix: &str, output: &str, free_text_keys: &[&str]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(prefix) && !current.is_empty() {
            records.push(std::mem::take(&mut current));
        }

        parse_block_line(line, free_text_keys, &mut current);
    }

    if !current.is_empty() {
        records.push(current);
    }

    records
}

/// Splits one physical line into `key=value` pairs.
fn parse_block_line(line: &str, free_text_keys: &[&str], record: &mut Record) {
    let tokens = tokens_with_offsets(line);
    let mut i = 0;

    while i < tokens.len() {
        let (start, token) = tokens[i];
        i += 1;

        let Some(eq) = token.find('=').filter(|&idx| idx > 0) else {
            continue;
        };
        let key = &token[..eq];

        if free_text_keys.contains(&key) {
            let value_start = start + eq + 1;
            let next_key = tokens[i..]
                .iter()
                .position(|(_, t)| looks_like_key_token(t))
                .map(|pos| i + pos);

            let value = match next_key {
                Some(next) => {
                    let value_end = tokens[next].0;
                    i = next;
                    &line[value_start..value_end]
                }
                None => {
                    i = tokens.len();
                    &line[value_start..]
                }
            };
            record.insert(key.to_string(), value.trim().to_string());
            continue;
        }

        record.insert(key.to_string(), token[eq + 1..].to_string());
    }
}

/// Whitespace-separated tokens with their byte offsets into `line`.
fn tokens_with_offsets(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (idx, ch) in line.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &line[s..idx]));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &line[s..]));
    }

    tokens
}

/// Slurm field names are CamelCase identifiers such as `NodeName`,
/// `AllocNode:Sid` or `CPUs/Task`. Lowercase words followed by `=` inside free
/// text (`gres=gpu:2`) do not start a new field.
fn looks_like_key_token(token: &str) -> bool {
    let Some(eq) = token.find('=') else {
        return false;
    };
    let key = &token[..eq];
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '/'))
        }
        _ => false,
    }
}

/// Parses header-plus-rows delimited output into records.
///
/// Rows whose field count differs from the header are dropped; partial or
/// garbled output never aborts the rest of the parse.
pub fn parse_delimited_output(output: &str, delimiter: char) -> Vec<Record> {
    let mut lines = output
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = header_line.split(delimiter).map(str::trim).collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields.len() != headers.len() {
            skipped += 1;
            continue;
        }
        records.push(
            headers
                .iter()
                .zip(fields)
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }

    if skipped > 0 {
        trace!(skipped, kept = records.len(), "dropped rows with mismatched field count");
    }

    records
}
