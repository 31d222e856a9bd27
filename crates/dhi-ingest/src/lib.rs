pub mod archive;
pub mod batch;
pub mod coerce;
pub mod duplicates;
pub mod farm;
pub mod header;
pub mod normalize;
pub mod ranges;
pub mod reader;
pub mod roster;
pub mod scratch;

pub use archive::{ExtractedArchive, extract_zip, is_archive, open_archive, select_target};
pub use batch::{BatchReport, FileFailure, ingest_batch};
pub use coerce::{Coerced, coerce_column, identity_text};
pub use duplicates::{
    DEFAULT_THRESHOLD, DuplicateDetector, DuplicateGroup, DuplicateMember, DuplicateReport,
    SimilarityBreakdown,
};
pub use farm::{FarmIdConsistency, assign_farm_id, check_farm_ids, unify_farm_ids};
pub use header::{HeaderDetection, HeaderSchema, detect_header_row};
pub use normalize::{Normalizer, display_name, normalize};
pub use ranges::{DateRange, date_range, overall_date_range};
pub use reader::{RawTable, decode_bytes, is_readable, parse_delimited, read_raw_table, read_workbook};
pub use roster::ActiveRoster;
pub use scratch::ScratchStore;
