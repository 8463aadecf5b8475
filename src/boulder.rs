//! Parser for the `key=value` (Boulder-IO) text that primer3 writes.
//!
//! Records are newline separated. Values may contain `=`, only the first one
//! separates key from value. A line consisting of `=` alone terminates a
//! primer3 record and carries no data.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::ParseError;

/// Parsed design-stage output, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoulderRecord {
    fields: BTreeMap<String, String>,
}

/// One forward/reverse primer pair, named for the primersearch input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimerPair {
    pub name: String,
    pub forward: String,
    pub reverse: String,
}

/// Parse `key=value` lines into a record.
///
/// A single trailing newline is ignored, as are blank lines. Lines with an
/// empty key, including the bare `=` record terminator, are accepted and
/// skipped. Any other line without `=` is a [`ParseError::MissingSeparator`].
/// Later duplicates of a key replace earlier ones.
pub fn parse_key_values(text: &str) -> Result<BoulderRecord, ParseError> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut fields = BTreeMap::new();

    for (index, raw_line) in body.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.trim().is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ParseError::MissingSeparator {
                line_number: index + 1,
                line: line.to_string(),
            });
        };

        // Record terminator.
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_string(), value.to_string());
    }

    Ok(BoulderRecord { fields })
}

impl BoulderRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Primer pairs in the order primer3 ranked them.
    ///
    /// Reads `PRIMER_LEFT_<i>_SEQUENCE` / `PRIMER_RIGHT_<i>_SEQUENCE` for
    /// `i = 0, 1, ...` until either is missing. If there is no indexed pair,
    /// the un-indexed `PRIMER_LEFT` / `PRIMER_RIGHT` keys are used.
    pub fn primer_pairs(&self) -> Vec<PrimerPair> {
        let base = self
            .get("SEQUENCE_ID")
            .filter(|id| !id.trim().is_empty())
            .unwrap_or("primer");

        let mut pairs = Vec::new();
        for i in 0.. {
            let left = self.get(&format!("PRIMER_LEFT_{}_SEQUENCE", i));
            let right = self.get(&format!("PRIMER_RIGHT_{}_SEQUENCE", i));
            match (left, right) {
                (Some(forward), Some(reverse)) => pairs.push(PrimerPair {
                    name: format!("{}_{}", base, i),
                    forward: forward.to_string(),
                    reverse: reverse.to_string(),
                }),
                _ => break,
            }
        }

        if pairs.is_empty()
            && let (Some(forward), Some(reverse)) = (self.get("PRIMER_LEFT"), self.get("PRIMER_RIGHT"))
        {
            pairs.push(PrimerPair {
                name: format!("{}_0", base),
                forward: forward.to_string(),
                reverse: reverse.to_string(),
            });
        }

        pairs
    }
}
