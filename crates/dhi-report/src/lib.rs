pub mod builder;
pub mod projection;
pub mod table;
pub mod weighted;
pub mod writer;

pub use builder::MonthlyReportBuilder;
pub use projection::{project_lactation_days, projection_within};
pub use table::{CohortSummary, ColumnKind, MonthAverage, ReportColumn, ReportTable};
pub use weighted::{WeightedMean, weighted_average};
pub use writer::{write_dataset_csv, write_report_csv};
