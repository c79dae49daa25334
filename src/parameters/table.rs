//! The labelled parameter table format.
//!
//! ```text
//! // simulation days
//! 120
//! // age bands
//! 0 20 40 60 80
//! // interventions
//! 30 school 0.0
//! 45 workplace 0.5
//! ```
//!
//! A line starting with `//` names the parameter defined by the value lines that follow it.
//! Labels are compared case-insensitively with whitespace collapsed. Every label must have at
//! least one value line, and no label may appear twice.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::error::AbmError;

#[derive(Debug)]
struct Entry {
    line: usize,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct ParameterTable {
    entries: BTreeMap<String, Entry>,
}

fn normalize(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl ParameterTable {
    pub fn parse(text: &str) -> Result<ParameterTable, AbmError> {
        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (number, line) in text.lines().enumerate() {
            let number = number + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = line.strip_prefix("//") {
                let label = normalize(label);
                if label.is_empty() {
                    return Err(AbmError::config(format!("line {number}: empty label")));
                }
                if let Some(previous) = current.take() {
                    check_has_values(&entries, &previous)?;
                }
                if let Some(existing) = entries.get(&label) {
                    return Err(AbmError::config(format!(
                        "line {number}: parameter '{label}' already defined on line {}",
                        existing.line
                    )));
                }
                entries.insert(
                    label.clone(),
                    Entry {
                        line: number,
                        rows: Vec::new(),
                    },
                );
                current = Some(label);
            } else {
                let label = current.as_ref().ok_or_else(|| {
                    AbmError::config(format!("line {number}: value before any label"))
                })?;
                let tokens = line.split_whitespace().map(str::to_string).collect();
                if let Some(entry) = entries.get_mut(label) {
                    entry.rows.push(tokens);
                }
            }
        }
        if let Some(previous) = current {
            check_has_values(&entries, &previous)?;
        }
        Ok(ParameterTable { entries })
    }

    #[must_use]
    pub fn reader(&self) -> TableReader<'_> {
        TableReader {
            table: self,
            consumed: BTreeSet::new(),
        }
    }
}

fn check_has_values(entries: &BTreeMap<String, Entry>, label: &str) -> Result<(), AbmError> {
    match entries.get(label) {
        Some(entry) if entry.rows.is_empty() => Err(AbmError::config(format!(
            "line {}: parameter '{label}' has no value",
            entry.line
        ))),
        _ => Ok(()),
    }
}

/// Typed access to a table. Tracks which labels were read so that leftover (unknown) labels
/// can be reported.
pub struct TableReader<'a> {
    table: &'a ParameterTable,
    consumed: BTreeSet<String>,
}

fn parse_token<T: FromStr>(label: &str, token: &str) -> Result<T, AbmError> {
    token.parse::<T>().map_err(|_| {
        AbmError::ParseError(format!("parameter '{label}': cannot parse '{token}'"))
    })
}

impl<'a> TableReader<'a> {
    /// The value rows of a label, if present.
    pub fn optional_rows(&mut self, label: &str) -> Option<&'a [Vec<String>]> {
        let label = normalize(label);
        let entry = self.table.entries.get(&label)?;
        self.consumed.insert(label);
        Some(&entry.rows)
    }

    pub fn rows(&mut self, label: &str) -> Result<&'a [Vec<String>], AbmError> {
        self.optional_rows(label)
            .ok_or_else(|| AbmError::config(format!("missing parameter '{label}'")))
    }

    /// A single value.
    pub fn value<T: FromStr>(&mut self, label: &str) -> Result<T, AbmError> {
        let rows = self.rows(label)?;
        match rows {
            [row] if row.len() == 1 => parse_token(label, &row[0]),
            _ => Err(AbmError::config(format!(
                "parameter '{label}' must be a single value"
            ))),
        }
    }

    pub fn optional_value<T: FromStr>(&mut self, label: &str) -> Result<Option<T>, AbmError> {
        if self.contains(label) {
            self.value(label).map(Some)
        } else {
            Ok(None)
        }
    }

    /// All tokens of a label, across its value lines.
    pub fn values<T: FromStr>(&mut self, label: &str) -> Result<Vec<T>, AbmError> {
        self.rows(label)?
            .iter()
            .flatten()
            .map(|token| parse_token(label, token))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.table.entries.contains_key(&normalize(label))
    }

    /// Fails if the table holds labels that were never read.
    pub fn finish(self) -> Result<(), AbmError> {
        let unknown: Vec<&str> = self
            .table
            .entries
            .keys()
            .filter(|label| !self.consumed.contains(*label))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AbmError::config(format!(
                "unknown parameter(s): {}",
                unknown.join(", ")
            )))
        }
    }
}
