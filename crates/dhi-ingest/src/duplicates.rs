//! Duplicate-upload detection.
//!
//! Two uploads are compared on their row counts and on how much their key
//! fields overlap: identity value sets, sample-date coverage and the
//! distribution of protein values. A combined score above the threshold
//! marks the pair as the same data uploaded twice.
//!
//! Grouping is single-link: once a file joins a group it is not compared
//! again, so a file similar to a grouped member but not to the group's first
//! file is not merged into that group.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use dhi_common::{mean, sample_std};
use dhi_model::{HerdDataset, Result, keys};

/// Default score above which two uploads count as duplicates.
pub const DEFAULT_THRESHOLD: f64 = 0.85;

const ROW_WEIGHT: f64 = 0.2;
const FIELD_WEIGHT: f64 = 0.8;

/// Compared fields and their weights inside the field score.
const FIELD_WEIGHTS: [(&str, f64); 4] = [
    (keys::FARM_ID, 0.15),
    (keys::MANAGEMENT_ID, 0.25),
    (keys::SAMPLE_DATE, 0.25),
    (keys::PROTEIN_PCT, 0.15),
];

/// Per-factor detail of one pairwise comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityBreakdown {
    pub left_rows: usize,
    pub right_rows: usize,
    pub row_similarity: f64,
    /// Similarity of each compared field present in both datasets.
    pub fields: BTreeMap<String, f64>,
    /// Weighted field score; `None` when no field is shared.
    pub field_score: Option<f64>,
    pub score: f64,
    pub is_duplicate: bool,
}

/// A file inside a duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMember {
    pub index: usize,
    pub filename: String,
    /// Comparison against the group's first member; absent for that member.
    pub similarity: Option<SimilarityBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub members: Vec<DuplicateMember>,
}

impl DuplicateGroup {
    pub fn filenames(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.filename.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub has_duplicates: bool,
    pub groups: Vec<DuplicateGroup>,
    pub total_files: usize,
    /// Sum of group sizes.
    pub duplicate_files_count: usize,
}

/// Pairwise duplicate detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateDetector {
    pub threshold: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Scores how likely `left` and `right` are the same upload.
    ///
    /// An empty dataset is never a duplicate.
    pub fn similarity(&self, left: &HerdDataset, right: &HerdDataset) -> Result<SimilarityBreakdown> {
        let left_rows = left.height();
        let right_rows = right.height();
        if left.is_empty() || right.is_empty() {
            return Ok(SimilarityBreakdown {
                left_rows,
                right_rows,
                row_similarity: 0.0,
                fields: BTreeMap::new(),
                field_score: None,
                score: 0.0,
                is_duplicate: false,
            });
        }

        let row_similarity = 1.0 - left_rows.abs_diff(right_rows) as f64 / left_rows.max(right_rows) as f64;

        let mut fields = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for (field, weight) in FIELD_WEIGHTS {
            if !left.has_column(field) || !right.has_column(field) {
                continue;
            }
            let similarity = match field {
                keys::FARM_ID | keys::MANAGEMENT_ID => {
                    jaccard(&left.distinct_text(field)?, &right.distinct_text(field)?)
                }
                keys::SAMPLE_DATE => date_overlap(
                    &left.sample_dates()?.into_iter().flatten().collect::<Vec<_>>(),
                    &right.sample_dates()?.into_iter().flatten().collect::<Vec<_>>(),
                ),
                _ => distribution_similarity(
                    &left.f64_values(field)?.into_iter().flatten().collect::<Vec<_>>(),
                    &right.f64_values(field)?.into_iter().flatten().collect::<Vec<_>>(),
                ),
            };
            weighted_sum += similarity * weight;
            total_weight += weight;
            fields.insert(field.to_string(), similarity);
        }

        let field_score = (total_weight > 0.0).then(|| weighted_sum / total_weight);
        let score = ROW_WEIGHT * row_similarity + field_score.map_or(0.0, |s| FIELD_WEIGHT * s);
        Ok(SimilarityBreakdown {
            left_rows,
            right_rows,
            row_similarity,
            fields,
            field_score,
            score,
            is_duplicate: score > self.threshold,
        })
    }

    /// Groups uploads that look like the same data.
    pub fn detect(&self, datasets: &[HerdDataset]) -> Result<DuplicateReport> {
        let mut processed = vec![false; datasets.len()];
        let mut groups = Vec::new();

        for (i, first) in datasets.iter().enumerate() {
            if processed[i] || first.is_empty() {
                continue;
            }
            let mut members = vec![DuplicateMember {
                index: i,
                filename: first.source_file.clone(),
                similarity: None,
            }];
            for (j, other) in datasets.iter().enumerate().skip(i + 1) {
                if processed[j] || other.is_empty() {
                    continue;
                }
                let breakdown = self.similarity(first, other)?;
                debug!(left = %first.source_file, right = %other.source_file, score = breakdown.score, "compared uploads");
                if breakdown.is_duplicate {
                    processed[j] = true;
                    members.push(DuplicateMember {
                        index: j,
                        filename: other.source_file.clone(),
                        similarity: Some(breakdown),
                    });
                }
            }
            if members.len() > 1 {
                processed[i] = true;
                groups.push(DuplicateGroup { members });
            }
        }

        let duplicate_files_count = groups.iter().map(|g| g.members.len()).sum();
        info!(
            groups = groups.len(),
            files = duplicate_files_count,
            total = datasets.len(),
            "duplicate detection finished"
        );
        Ok(DuplicateReport {
            has_duplicates: !groups.is_empty(),
            groups,
            total_files: datasets.len(),
            duplicate_files_count,
        })
    }
}

fn jaccard(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let overlap = left.intersection(right).count();
    let union = left.union(right).count();
    overlap as f64 / union as f64
}

fn date_overlap(left: &[NaiveDate], right: &[NaiveDate]) -> f64 {
    let (Some(l_start), Some(l_end)) = (left.iter().min(), left.iter().max()) else {
        return 0.0;
    };
    let (Some(r_start), Some(r_end)) = (right.iter().min(), right.iter().max()) else {
        return 0.0;
    };
    let start = l_start.max(r_start);
    let end = l_end.min(r_end);
    if start > end {
        return 0.0;
    }
    let overlap_days = (*end - *start).num_days() + 1;
    let span = ((*l_end - *l_start).num_days() + 1).max((*r_end - *r_start).num_days() + 1);
    overlap_days as f64 / span as f64
}

fn distribution_similarity(left: &[f64], right: &[f64]) -> f64 {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }
    let stats = |values: &[f64]| {
        [
            mean(values),
            sample_std(values),
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ]
    };
    let components: Vec<f64> = stats(left)
        .into_iter()
        .zip(stats(right))
        .map(|pair| match pair {
            (Some(a), Some(b)) => {
                let scale = a.abs().max(b.abs());
                if scale > 0.0 {
                    1.0 - ((a - b).abs() / scale).min(1.0)
                } else {
                    1.0
                }
            }
            (None, None) => 1.0,
            _ => 0.0,
        })
        .collect();
    components.iter().sum::<f64>() / components.len() as f64
}
