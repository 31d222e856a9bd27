use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use dhi_filter::DataRanges;
use dhi_ingest::{DateRange, DuplicateReport, FarmIdConsistency, FileFailure};
use dhi_model::FieldRegistry;

use dhi_cli::pipeline::{FileSummary, ReportRun};

pub fn print_ingest_summary(files: &[FileSummary], failures: &[FileFailure], consistency: &FarmIdConsistency) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Rows"),
        header_cell("Farm"),
        header_cell("From"),
        header_cell("To"),
        header_cell("Months"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    let mut total_rows = 0usize;
    for file in files {
        total_rows += file.rows;
        let farm = if file.missing_farm_id {
            Cell::new("missing").fg(Color::Yellow)
        } else {
            Cell::new(file.farm_ids.join(", "))
        };
        let (from, to, months) = range_cells(file.date_range.as_ref());
        table.add_row(vec![Cell::new(&file.file), Cell::new(file.rows), farm, from, to, months]);
    }
    table.add_row(vec![
        Cell::new("TOTAL").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    println!("{table}");
    print_failures(failures);
    if !consistency.consistent {
        eprintln!(
            "warning: files come from several farms ({}); reports need --unify-farm-id",
            consistency.farm_ids.join(", ")
        );
    }
}

pub fn print_duplicates(report: &DuplicateReport) {
    if !report.has_duplicates {
        println!("No duplicates among {} files.", report.total_files);
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Group"),
        header_cell("File"),
        header_cell("Score"),
        header_cell("Rows"),
        header_cell("Row similarity"),
        header_cell("Field score"),
    ]);
    apply_table_style(&mut table);
    for column in 2..6 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for (group_idx, group) in report.groups.iter().enumerate() {
        for member in &group.members {
            let group_cell = Cell::new(group_idx + 1).fg(Color::Blue).add_attribute(Attribute::Bold);
            match &member.similarity {
                Some(breakdown) => table.add_row(vec![
                    group_cell,
                    Cell::new(&member.filename),
                    Cell::new(format!("{:.3}", breakdown.score)).fg(Color::Yellow),
                    Cell::new(breakdown.right_rows),
                    Cell::new(format!("{:.3}", breakdown.row_similarity)),
                    optional_score(breakdown.field_score),
                ]),
                None => table.add_row(vec![
                    group_cell,
                    Cell::new(&member.filename).add_attribute(Attribute::Bold),
                    dim_cell("reference"),
                    dim_cell("-"),
                    dim_cell("-"),
                    dim_cell("-"),
                ]),
            };
        }
    }
    println!("{table}");
    println!(
        "{} of {} files are duplicates.",
        report.duplicate_files_count, report.total_files
    );
}

pub fn print_ranges(ranges: &DataRanges, overall: Option<&DateRange>, registry: &FieldRegistry) {
    if let Some(range) = overall {
        println!("Dates: {} to {} ({} months)", range.start, range.end, range.months.len());
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Min"),
        header_cell("Max"),
        header_cell("Mean"),
        header_cell("Count"),
        header_cell("Suggested min"),
        header_cell("Suggested max"),
    ]);
    apply_table_style(&mut table);
    for column in 1..7 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for (field, range) in &ranges.fields {
        table.add_row(vec![
            Cell::new(registry.label(field)),
            Cell::new(range.min),
            Cell::new(range.max),
            Cell::new(range.mean),
            Cell::new(range.count),
            Cell::new(range.suggested_min).fg(Color::Green),
            Cell::new(range.suggested_max).fg(Color::Green),
        ]);
    }
    println!("{table}");
}

pub fn print_report_summary(run: &ReportRun, registry: &FieldRegistry) {
    println!("Report: {}", run.output.display());
    let mut table = Table::new();
    table.set_header(vec![header_cell("Measure"), header_cell("Value")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Files"), Cell::new(run.files.len())]);
    table.add_row(vec![Cell::new("Filtered records"), Cell::new(run.filtered_rows)]);
    table.add_row(vec![
        Cell::new("Animals").add_attribute(Attribute::Bold),
        Cell::new(run.animals).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Months"), Cell::new(run.months.join(", "))]);
    table.add_row(vec![Cell::new("Mean parity"), optional_value(run.summary.mean_parity)]);
    for (field, value) in &run.summary.weighted_averages {
        table.add_row(vec![
            Cell::new(format!("Weighted {}", registry.label(field))),
            optional_value(*value),
        ]);
    }
    println!("{table}");
    print_failures(&run.failures);
}

fn print_failures(failures: &[FileFailure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("Failed files:");
    for failure in failures {
        let hint = if failure.recoverable { " (assign a farm id)" } else { "" };
        eprintln!("- {}: {}{hint}", failure.filename, failure.message);
    }
}

fn range_cells(range: Option<&DateRange>) -> (Cell, Cell, Cell) {
    match range {
        Some(range) => (
            Cell::new(range.start),
            Cell::new(range.end),
            Cell::new(range.months.len()),
        ),
        None => (dim_cell("-"), dim_cell("-"), dim_cell("-")),
    }
}

fn optional_score(score: Option<f64>) -> Cell {
    match score {
        Some(value) => Cell::new(format!("{value:.3}")),
        None => dim_cell("-"),
    }
}

fn optional_value(value: Option<f64>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
