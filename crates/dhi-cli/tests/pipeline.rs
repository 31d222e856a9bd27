//! Integration tests for the pipeline module.

use std::fs;
use std::path::{Path, PathBuf};

use dhi_cli::pipeline::{ReportRequest, load_batch, load_filters, run_report, summarize_files};
use dhi_model::{FilterKind, HerdConfig, RunHooks, keys};

const HEADER: &str = "牛场编号,管理号,胎次,采样日期,蛋白率(%),产奶量(Kg),泌乳天数(天)";

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write");
    path
}

fn herd_files(dir: &Path, feb_farm: &str) -> Vec<PathBuf> {
    vec![
        write_file(dir, "jan.csv", &format!("{HEADER}\nF1,007,2,2024-01-05,3.4,30,60\n")),
        write_file(
            dir,
            "feb.csv",
            &format!("{HEADER}\n{feb_farm},007,2,2024-02-05,3.5,31,91\n{feb_farm},8,1,2024-02-06,2.5,22,40\n"),
        ),
    ]
}

fn protein_filter(dir: &Path) -> PathBuf {
    write_file(
        dir,
        "filters.toml",
        "[[filters]]\nfield = \"protein_pct\"\nkind = \"numeric_range\"\nmin = 3.0\nmax = 4.0\n",
    )
}

#[test]
fn filters_file_is_parsed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let specs = load_filters(&protein_filter(dir.path())).expect("filters");
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].field, keys::PROTEIN_PCT);
    assert!(specs[0].enabled);
    assert_eq!(
        specs[0].kind,
        FilterKind::NumericRange {
            min: Some(3.0),
            max: Some(4.0)
        }
    );
}

#[test]
fn loaded_files_are_summarised() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = herd_files(dir.path(), "F1");
    let config = HerdConfig::default();
    let batch = load_batch(&files, &config, RunHooks::none()).expect("batch");
    let summaries = summarize_files(&batch.datasets).expect("summaries");
    assert_eq!(summaries.len(), 2);
    let feb = summaries.iter().find(|s| s.file == "feb.csv").expect("feb");
    assert_eq!(feb.rows, 2);
    assert!(!feb.missing_farm_id);
    assert_eq!(feb.farm_ids, vec!["F1".to_string()]);
    assert_eq!(feb.date_range.as_ref().map(|r| r.months.len()), Some(1));
}

#[test]
fn unreadable_batch_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.csv");
    let error = load_batch(&[missing], &HerdConfig::default(), RunHooks::none()).expect_err("nothing loaded");
    assert!(error.to_string().contains("could be loaded"));
}

#[test]
fn report_is_written_for_filtered_herd() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = HerdConfig::default();
    let output = dir.path().join("report.csv");
    let rows_output = dir.path().join("rows.csv");
    let request = ReportRequest {
        files: herd_files(dir.path(), "F1"),
        specs: load_filters(&protein_filter(dir.path())).expect("filters"),
        fields: vec![
            keys::PROTEIN_PCT.to_string(),
            keys::MILK_YIELD.to_string(),
            keys::LACTATION_DAYS.to_string(),
        ],
        output: output.clone(),
        rows_output: Some(rows_output.clone()),
        ..ReportRequest::default()
    };
    let run = run_report(&config, &request, RunHooks::none()).expect("report");
    assert_eq!(run.files.len(), 2);
    assert!(run.failures.is_empty());
    assert!(run.farm_ids.consistent);
    assert_eq!(run.filtered_rows, 2);
    assert_eq!(run.animals, 1);
    assert_eq!(run.months, vec!["2024年01月".to_string(), "2024年02月".to_string()]);

    let written = fs::read_to_string(&output).expect("read report");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "牛场编号,管理号,胎次,\
         2024年01月蛋白率(%),2024年01月产奶量(Kg),2024年01月泌乳天数(天),\
         2024年02月蛋白率(%),2024年02月产奶量(Kg),2024年02月泌乳天数(天),\
         平均蛋白率(%),最后一个月泌乳天数(天),最后一次采样日"
    );
    assert!(lines[1].starts_with("F1,007,2,"));
    assert!(lines[1].ends_with(",2024-02-05"));

    let rows = fs::read_to_string(&rows_output).expect("read rows");
    assert_eq!(rows.lines().count(), 3);
}

#[test]
fn several_farms_need_unification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = HerdConfig::default();
    let request = ReportRequest {
        files: herd_files(dir.path(), "F2"),
        fields: vec![keys::PROTEIN_PCT.to_string()],
        output: dir.path().join("report.csv"),
        ..ReportRequest::default()
    };
    let error = run_report(&config, &request, RunHooks::none()).expect_err("refused");
    assert!(error.to_string().contains("several farms"));
    assert!(!request.output.exists());

    let unified = ReportRequest {
        unify_farm_id: Some("F9".to_string()),
        ..request
    };
    let run = run_report(&config, &unified, RunHooks::none()).expect("report");
    assert!(!run.farm_ids.consistent);
    assert_eq!(run.animals, 2);
    let written = fs::read_to_string(&unified.output).expect("read report");
    assert!(written.lines().skip(1).all(|line| line.starts_with("F9,")));
}
