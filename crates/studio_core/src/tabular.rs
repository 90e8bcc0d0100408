//! Delimited-text tokenizer and the fixed-column mapping from rows to jobs.
//!
//! The tokenizer is deliberately small: it is not RFC 4180. Rows are lines,
//! fields are comma separated, and a field whose first non-blank character is
//! `"` or `'` is wrapped until the matching quote (a doubled quote inside the
//! wrapper is a literal quote). Blanks before the opening quote are dropped.
//! Quotes anywhere else are literal text.

use serde::{Deserialize, Serialize};
use studio_logging::studio_debug;
use url::Url;

use crate::batch::{ReferenceSlots, REFERENCE_SLOTS};

const DELIMITER: char = ',';

/// Column positions of the job sheet, zero based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub name: usize,
    pub prompt: usize,
    pub prompt_fallback: usize,
    pub references: [usize; REFERENCE_SLOTS],
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            name: 0,
            prompt: 11,
            prompt_fallback: 1,
            references: [15, 16, 17, 18, 19],
        }
    }
}

/// A mapped row whose reference URLs have not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRow {
    pub name: String,
    pub custom_prompt: Option<String>,
    pub reference_urls: [Option<Url>; REFERENCE_SLOTS],
}

/// A fully ingested row, ready to become a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub name: String,
    pub custom_prompt: Option<String>,
    pub references: ReferenceSlots,
}

/// Split raw text into rows of fields. Blank lines are dropped.
pub fn parse_delimited(text: &str) -> Vec<Vec<String>> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect()
}

fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        let mut field = String::new();
        while let Some(&(c @ (' ' | '\t'))) = chars.peek() {
            field.push(c);
            chars.next();
        }
        if let Some(quote @ ('"' | '\'')) = chars.peek().copied() {
            chars.next();
            field.clear();
            while let Some(c) = chars.next() {
                if c != quote {
                    field.push(c);
                } else if chars.peek() == Some(&quote) {
                    chars.next();
                    field.push(quote);
                } else {
                    break;
                }
            }
        }
        // Unquoted text, or trailing text after a closing quote.
        while let Some(&c) = chars.peek() {
            if c == DELIMITER {
                break;
            }
            field.push(c);
            chars.next();
        }
        fields.push(field);
        if chars.next().is_none() {
            break;
        }
    }
    fields
}

/// Map tokenized rows to jobs. The first row is the header and is discarded.
pub fn map_rows(rows: &[Vec<String>], columns: &ColumnMap) -> Vec<PendingRow> {
    let mut mapped = Vec::new();
    for (line, row) in rows.iter().enumerate().skip(1) {
        let name = cell(row, columns.name);
        if name.is_empty() {
            studio_debug!("Skipping row {}: empty name", line + 1);
            continue;
        }
        let custom_prompt = Some(cell(row, columns.prompt))
            .filter(|prompt| !prompt.is_empty())
            .or_else(|| Some(cell(row, columns.prompt_fallback)).filter(|p| !p.is_empty()))
            .map(str::to_string);
        let reference_urls = columns
            .references
            .map(|column| parse_reference_url(cell(row, column)));
        mapped.push(PendingRow {
            name: name.to_string(),
            custom_prompt,
            reference_urls,
        });
    }
    mapped
}

fn cell(row: &[String], column: usize) -> &str {
    row.get(column).map(|value| value.trim()).unwrap_or("")
}

/// Accept only absolute http(s) URLs; anything else leaves the slot empty.
pub fn parse_reference_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = Url::parse(trimmed).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url),
        _ => None,
    }
}
