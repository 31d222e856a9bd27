//! Header-row detection.
//!
//! Lab exports often carry title and note rows above the real header, and
//! the header wording changed between export versions. Each candidate row is
//! scored against the indicator sets of both versions.

use tracing::{debug, warn};

use dhi_model::HeaderConfig;

/// Which indicator set qualified the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSchema {
    New,
    Old,
    Core,
    /// Nothing qualified; row 0 was assumed.
    Fallback,
}

/// Outcome of header detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDetection {
    pub row: usize,
    pub schema: HeaderSchema,
    /// Indicator matches of the winning row against its set.
    pub matches: usize,
}

impl HeaderDetection {
    pub fn is_fallback(&self) -> bool {
        self.schema == HeaderSchema::Fallback
    }
}

/// Counts indicators that appear (case-sensitive substring) in any label.
fn count_matches(labels: &[String], indicators: &[String]) -> usize {
    indicators
        .iter()
        .filter(|indicator| labels.iter().any(|label| label.contains(indicator.as_str())))
        .count()
}

/// Finds the first row, within `config.max_rows`, that looks like a header.
///
/// A row qualifies when it matches at least `min_matches` indicators of the
/// new or old schema, or every core indicator. Without a qualifying row the
/// result falls back to row 0.
pub fn detect_header_row(rows: &[Vec<String>], config: &HeaderConfig) -> HeaderDetection {
    for (idx, row) in rows.iter().take(config.max_rows).enumerate() {
        let new_matches = count_matches(row, &config.new_schema);
        let old_matches = count_matches(row, &config.old_schema);
        let core_matches = count_matches(row, &config.core);
        debug!(row = idx, new_matches, old_matches, core_matches, "header candidate");

        let detection = if new_matches >= config.min_matches {
            Some((HeaderSchema::New, new_matches))
        } else if old_matches >= config.min_matches {
            Some((HeaderSchema::Old, old_matches))
        } else if !config.core.is_empty() && core_matches == config.core.len() {
            Some((HeaderSchema::Core, core_matches))
        } else {
            None
        };
        if let Some((schema, matches)) = detection {
            return HeaderDetection {
                row: idx,
                schema,
                matches,
            };
        }
    }
    warn!(
        probed = rows.len().min(config.max_rows),
        "no header row matched the indicators; using row 0"
    );
    HeaderDetection {
        row: 0,
        schema: HeaderSchema::Fallback,
        matches: 0,
    }
}
