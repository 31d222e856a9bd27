//! Canonical field registry.
//!
//! Every column the workspace understands is described once here: its
//! canonical key, display label, the locale-specific header names that map to
//! it, and how its cells are typed. Incoming headers are resolved against the
//! registry in a single pass.

use serde::{Deserialize, Serialize};

/// Canonical column keys used throughout the workspace.
pub mod keys {
    pub const FARM_ID: &str = "farm_id";
    pub const MANAGEMENT_ID: &str = "management_id";
    pub const PARITY: &str = "parity";
    pub const SAMPLE_DATE: &str = "sample_date";
    pub const PROTEIN_PCT: &str = "protein_pct";
    pub const FAT_PCT: &str = "fat_pct";
    pub const LACTOSE_PCT: &str = "lactose_pct";
    pub const MILK_YIELD: &str = "milk_yield";
    pub const LACTATION_DAYS: &str = "lactation_days";
    pub const SOMATIC_CELL_COUNT: &str = "somatic_cell_count";
    pub const UREA_NITROGEN: &str = "urea_nitrogen";

    /// Name of the file each record was ingested from.
    pub const SOURCE_FILE: &str = "source_file";
}

/// Storage type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Identity-like text; leading zeros are significant.
    Text,
    #[default]
    Number,
    Integer,
    /// Calendar date, stored as ISO `YYYY-MM-DD` text.
    Date,
}

/// Substring fallback used when no synonym matches a header exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristic {
    pub keywords: Vec<String>,
    pub exclude: Vec<String>,
}

impl Heuristic {
    /// True when `header` contains a keyword and none of the exclusions.
    pub fn matches(&self, header: &str) -> bool {
        self.keywords.iter().any(|k| header.contains(k.as_str()))
            && !self.exclude.iter().any(|e| header.contains(e.as_str()))
    }
}

/// One entry of the field registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDef {
    pub key: String,
    /// Display and export header.
    pub label: String,
    pub synonyms: Vec<String>,
    pub value_type: ValueType,
    pub required: bool,
    pub heuristic: Option<Heuristic>,
    /// Averaged with milk yield as the weight in reports.
    pub weighted_by_yield: bool,
    /// Decimal places for report averages.
    pub decimals: u32,
}

impl FieldDef {
    fn new(key: &str, label: &str, value_type: ValueType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            synonyms: vec![label.to_string()],
            value_type,
            decimals: 2,
            ..Self::default()
        }
    }

    fn synonyms(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.synonyms.iter().any(|s| s == name) {
                self.synonyms.push((*name).to_string());
            }
        }
        self
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn heuristic(mut self, keywords: &[&str], exclude: &[&str]) -> Self {
        self.heuristic = Some(Heuristic {
            keywords: keywords.iter().map(|s| (*s).to_string()).collect(),
            exclude: exclude.iter().map(|s| (*s).to_string()).collect(),
        });
        self
    }

    fn weighted(mut self) -> Self {
        self.weighted_by_yield = true;
        self
    }

    fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    /// True when `header` names this field exactly.
    ///
    /// The canonical key is always accepted, compared case-insensitively.
    pub fn matches_exact(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(&self.key) || self.synonyms.iter().any(|s| s.trim() == header)
    }
}

/// How a header was matched to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Synonym,
    Heuristic,
}

/// A source header bound to a canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub key: String,
    pub source_index: usize,
    pub source_name: String,
    pub via: MatchKind,
}

/// Result of resolving a header row against the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnResolution {
    /// Resolved columns in registry order.
    pub columns: Vec<ResolvedColumn>,
}

impl ColumnResolution {
    pub fn get(&self, key: &str) -> Option<&ResolvedColumn> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// The canonical field registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRegistry {
    fields: Vec<FieldDef>,
}

impl FieldRegistry {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    pub fn get(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Display label for `key`, falling back to the key itself.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map_or(key, |f| f.label.as_str())
    }

    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        self.get(key).map(|f| f.value_type)
    }

    /// Keys of required fields in registry order.
    pub fn required_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.key.as_str())
            .collect()
    }

    /// Numeric (number or integer) field keys in registry order.
    pub fn numeric_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| matches!(f.value_type, ValueType::Number | ValueType::Integer))
            .map(|f| f.key.as_str())
            .collect()
    }

    /// Resolves `headers` against the registry.
    ///
    /// Exact synonym matches are taken first; fields that remain unmatched
    /// and carry a heuristic then claim the first unused header containing
    /// one of their keywords. A header is bound to at most one field.
    pub fn resolve(&self, headers: &[String]) -> ColumnResolution {
        let mut used = vec![false; headers.len()];
        let mut matched: Vec<Option<ResolvedColumn>> = vec![None; self.fields.len()];

        for (field_idx, field) in self.fields.iter().enumerate() {
            let hit = headers
                .iter()
                .enumerate()
                .find(|(idx, header)| !used[*idx] && field.matches_exact(header));
            if let Some((idx, header)) = hit {
                used[idx] = true;
                matched[field_idx] = Some(ResolvedColumn {
                    key: field.key.clone(),
                    source_index: idx,
                    source_name: header.trim().to_string(),
                    via: MatchKind::Synonym,
                });
            }
        }

        for (field_idx, field) in self.fields.iter().enumerate() {
            if matched[field_idx].is_some() {
                continue;
            }
            let Some(heuristic) = &field.heuristic else {
                continue;
            };
            let hit = headers
                .iter()
                .enumerate()
                .find(|(idx, header)| !used[*idx] && heuristic.matches(header));
            if let Some((idx, header)) = hit {
                used[idx] = true;
                matched[field_idx] = Some(ResolvedColumn {
                    key: field.key.clone(),
                    source_index: idx,
                    source_name: header.trim().to_string(),
                    via: MatchKind::Heuristic,
                });
            }
        }

        ColumnResolution {
            columns: matched.into_iter().flatten().collect(),
        }
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        use ValueType::{Date, Integer, Number, Text};
        Self::new(vec![
            FieldDef::new(keys::FARM_ID, "牛场编号", Text)
                .synonyms(&["牧场编号", "牛场号"])
                .decimals(0),
            FieldDef::new(keys::MANAGEMENT_ID, "管理号", Text)
                .synonyms(&["牛号", "奶牛号", "牛编号"])
                .required()
                .heuristic(&["牛号", "管理号", "编号"], &["牧场", "牛场"])
                .decimals(0),
            FieldDef::new(keys::PARITY, "胎次", Integer)
                .synonyms(&["胎次(胎)", "胎数", "产犊胎次"])
                .required()
                .heuristic(&["胎次"], &[])
                .decimals(1),
            FieldDef::new(keys::SAMPLE_DATE, "采样日期", Date)
                .synonyms(&["样品日期", "测定日期", "检测日期"])
                .required()
                .heuristic(&["日期"], &["产犊", "出生", "干奶", "配种", "分娩"])
                .decimals(0),
            FieldDef::new(keys::PROTEIN_PCT, "蛋白率(%)", Number)
                .synonyms(&["蛋白率", "蛋白质率", "蛋白含量"])
                .heuristic(&["蛋白"], &["量"])
                .weighted(),
            FieldDef::new(keys::FAT_PCT, "乳脂率(%)", Number)
                .synonyms(&["乳脂率", "脂肪率"])
                .weighted(),
            FieldDef::new(keys::LACTOSE_PCT, "乳糖率", Number)
                .synonyms(&["乳糖率(%)"])
                .weighted(),
            FieldDef::new(keys::MILK_YIELD, "产奶量(Kg)", Number)
                .synonyms(&["产奶量", "日产奶量"])
                .decimals(1),
            FieldDef::new(keys::LACTATION_DAYS, "泌乳天数(天)", Integer)
                .synonyms(&["泌乳天数", "泌乳日"])
                .decimals(1),
            FieldDef::new(keys::SOMATIC_CELL_COUNT, "体细胞数(万/ml)", Number)
                .synonyms(&["体细胞数", "体细胞(万/ml)"])
                .decimals(1),
            FieldDef::new("somatic_cell_score", "体细胞分", Number).synonyms(&["体细胞评分", "SCS"]),
            FieldDef::new(keys::UREA_NITROGEN, "尿素氮(mg/dl)", Number)
                .synonyms(&["尿素氮", "MUN"])
                .decimals(1),
            FieldDef::new("fat_protein_ratio", "脂蛋比", Number),
            FieldDef::new("solids_pct", "固形物(%)", Number).synonyms(&["固形物", "总固形物"]),
            FieldDef::new("corrected_milk", "校正奶(Kg)", Number).synonyms(&["校正奶"]),
            FieldDef::new("persistency", "持续力", Number),
            FieldDef::new("peak_milk_yield", "高峰奶(Kg)", Number).synonyms(&["高峰奶"]),
            FieldDef::new("peak_days", "高峰日(天)", Integer).synonyms(&["高峰日"]),
            FieldDef::new("milk_305", "305奶量(Kg)", Number).synonyms(&["305奶量"]),
            FieldDef::new("total_milk_yield", "总奶量(Kg)", Number).synonyms(&["总奶量"]),
            FieldDef::new("mature_equivalent", "成年当量(Kg)", Number).synonyms(&["成年当量"]),
        ])
    }
}
