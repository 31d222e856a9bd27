//! Active-roster (in-herd animal list) loading.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use dhi_common::parse_i64;
use dhi_model::{DhiError, HerdConfig, Result, keys};

use crate::archive::{is_archive, open_archive};
use crate::reader::{RawTable, read_raw_table};

/// Ear tags of the animals currently in the herd.
///
/// Tags are stored in comparison form: trimmed and, when configured, without
/// leading zeros. The normalized herd data itself keeps its zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveRoster {
    entries: BTreeMap<String, Option<i64>>,
    strip_leading_zeros: bool,
}

impl ActiveRoster {
    /// Builds a roster from bare ids.
    pub fn from_ids<I, S>(ids: I, strip_leading_zeros: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = Self {
            entries: BTreeMap::new(),
            strip_leading_zeros,
        };
        for id in ids {
            roster.insert(id.as_ref(), None);
        }
        roster
    }

    /// Reads the roster from a file (csv/tsv/txt or a zip holding one).
    pub fn load(path: &Path, config: &HerdConfig) -> Result<Self> {
        let table = if is_archive(path) {
            let extracted = open_archive(path, &config.archive)?;
            read_raw_table(&extracted.target)?
        } else {
            read_raw_table(path)?
        };
        let roster = Self::from_table(&table, config)?;
        info!(file = %path.display(), animals = roster.len(), "loaded active roster");
        Ok(roster)
    }

    /// Reads the roster from a raw table.
    ///
    /// The header is the first row (within `header.max_rows`) holding one of
    /// the candidate ear-tag columns; the first candidate present wins.
    pub fn from_table(table: &RawTable, config: &HerdConfig) -> Result<Self> {
        let probe = config.header.max_rows.min(table.rows.len());
        let located = table.rows[..probe].iter().enumerate().find_map(|(row_idx, row)| {
            config.roster.columns.iter().find_map(|candidate| {
                row.iter()
                    .position(|h| h.trim() == candidate.as_str())
                    .map(|col| (row_idx, col))
            })
        });
        let Some((header_row, tag_col)) = located else {
            return Err(DhiError::MissingColumn {
                columns: config.roster.columns.clone(),
                missing_farm_id: false,
            });
        };

        let headers = &table.rows[header_row];
        let parity_col = config.fields.get(keys::PARITY).and_then(|field| {
            headers
                .iter()
                .position(|h| field.matches_exact(h))
                .or_else(|| headers.iter().position(|h| h.contains(field.label.as_str())))
        });

        let mut roster = Self {
            entries: BTreeMap::new(),
            strip_leading_zeros: config.roster.strip_leading_zeros,
        };
        for row in &table.rows[header_row + 1..] {
            let Some(tag) = row.get(tag_col) else { continue };
            if config.is_null_literal(tag) {
                continue;
            }
            let parity = parity_col.and_then(|idx| row.get(idx)).and_then(|cell| parse_i64(cell));
            roster.insert(tag, parity);
        }
        if roster.entries.is_empty() {
            warn!(column = %headers[tag_col], "active roster has no ids");
        }
        Ok(roster)
    }

    fn insert(&mut self, id: &str, parity: Option<i64>) {
        let key = self.normalize_id(id);
        if key.is_empty() {
            return;
        }
        let entry = self.entries.entry(key).or_insert(None);
        if parity.is_some() {
            *entry = parity;
        }
    }

    /// Comparison form of an id. An all-zero id keeps a single `0`.
    pub fn normalize_id(&self, id: &str) -> String {
        let trimmed = id.trim();
        if !self.strip_leading_zeros {
            return trimmed.to_string();
        }
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() && !trimmed.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&self.normalize_id(id))
    }

    /// Parity recorded on the roster for `id`, when the roster has one.
    pub fn parity_of(&self, id: &str) -> Option<i64> {
        self.entries.get(&self.normalize_id(id)).copied().flatten()
    }

    /// Sorted, de-duplicated ids in comparison form.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
