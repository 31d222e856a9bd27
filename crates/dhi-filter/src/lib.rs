pub mod base;
pub mod history;
pub mod multi;
pub mod ranges;
pub mod roster;

pub use base::{apply_filters, apply_spec, row_mask};
pub use history::{filled_flag_column, history_fill};
pub use multi::{MERGED_SOURCE, apply_multi_filter, known_months, passing_animals, run_multi_filter};
pub use ranges::{DataRanges, FieldRange, data_ranges, suggested_defaults};
pub use roster::apply_roster_filter;
