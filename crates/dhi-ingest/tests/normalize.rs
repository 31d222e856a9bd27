//! End-to-end normalization of lab exports.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use zip::write::SimpleFileOptions;

use dhi_ingest::{RawTable, detect_header_row, ingest_batch, normalize};
use dhi_model::{HerdConfig, HerdDataset, HeaderConfig, Outcome, RunHooks, keys};

const HEADER: &str = "牛场编号,管理号,胎次,采样日期,蛋白率(%),产奶量(Kg),泌乳天数(天)";

fn write_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).expect("write csv");
    path
}

fn loaded(outcome: Outcome<HerdDataset>) -> HerdDataset {
    match outcome {
        Outcome::Success { payload, .. } => payload,
        other => panic!("expected success, got {}", other.message()),
    }
}

#[test]
fn title_rows_summary_rows_and_leading_zeros() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(
        dir.path(),
        "2024-03.csv",
        &[
            "DHI 综合测定结果表",
            "测定日期: 2024-03",
            HEADER,
            "F1,007,2,2024-03-05,3.41,30.5,120",
            "F1,0100,1,2024-03-05,nan,28,15",
            "F1,合计,,,3.41,58.5,",
            "F1,平均与总计,,,3.41,29.25,",
        ],
    );
    let dataset = loaded(normalize(&path, &HerdConfig::default()));
    assert_eq!(dataset.height(), 2);
    assert_eq!(
        dataset.text_values(keys::MANAGEMENT_ID).expect("ids"),
        vec![Some("007".to_string()), Some("0100".to_string())]
    );
    assert_eq!(dataset.f64_values(keys::PROTEIN_PCT).expect("protein"), vec![Some(3.41), None]);
    assert_eq!(
        dataset.i64_values(keys::LACTATION_DAYS).expect("days"),
        vec![Some(120), Some(15)]
    );
    assert_eq!(
        dataset.text_values(keys::SOURCE_FILE).expect("source")[0].as_deref(),
        Some("2024-03.csv")
    );
}

#[test]
fn identity_groups_across_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jan = write_csv(dir.path(), "jan.csv", &[HEADER, "F1,007,2,2024-01-05,3.4,30,60"]);
    let feb = write_csv(dir.path(), "feb.csv", &[HEADER, "F1,007,2,2024-02-05,3.5,31,91"]);
    let report = ingest_batch(&[jan, feb], &HerdConfig::default(), RunHooks::none());
    assert!(report.failures.is_empty());

    let animals: Vec<_> = report
        .datasets
        .iter()
        .flat_map(|d| d.animal_keys().expect("keys"))
        .flatten()
        .collect();
    assert_eq!(animals.len(), 2);
    assert_eq!(animals[0], animals[1]);
    assert_eq!(animals[0].management_id, "007");
}

#[test]
fn gbk_encoded_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = format!("{HEADER}\nF1,12,1,2024-01-05,3.4,30,60\n");
    let (bytes, _, _) = encoding_rs::GBK.encode(&text);
    let path = dir.path().join("gbk.csv");
    fs::write(&path, &bytes).expect("write");
    let dataset = loaded(normalize(&path, &HerdConfig::default()));
    assert_eq!(dataset.height(), 1);
    assert!(dataset.has_column(keys::PROTEIN_PCT));
}

#[test]
fn zip_archive_uses_target_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let zip_path = dir.path().join("march.zip");
    let mut writer = zip::ZipWriter::new(File::create(&zip_path).expect("create zip"));
    let options = SimpleFileOptions::default();
    writer.start_file("readme.txt", options).expect("start");
    writer.write_all(b"notes").expect("write");
    writer
        .start_file("export/04-2综合测定结果表.csv", options)
        .expect("start");
    writer
        .write_all(format!("{HEADER}\nF1,007,2,2024-03-05,3.41,30.5,120\n").as_bytes())
        .expect("write");
    writer.finish().expect("finish");

    let dataset = loaded(normalize(&zip_path, &HerdConfig::default()));
    assert_eq!(dataset.source_file, "march.zip");
    assert_eq!(dataset.height(), 1);
}

#[test]
fn unsupported_format_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("march.pdf");
    fs::write(&path, b"%PDF-1.7").expect("write");
    let outcome = normalize(&path, &HerdConfig::default());
    assert!(matches!(outcome, Outcome::Fatal { .. }));
}

#[test]
fn frame_round_trip_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_csv(dir.path(), "jan.csv", &[HEADER, "F1,007,2,2024-01-05,3.4,,60"]);
    let config = HerdConfig::default();
    let first = loaded(normalize(&path, &config));
    let again = dhi_ingest::Normalizer::new(&config)
        .normalize_frame(&first.data, "jan.csv")
        .expect("renormalize");
    assert!(first.data.equals_missing(&again.data));
}

fn table_with_header_at(k: usize) -> RawTable {
    let mut rows: Vec<Vec<String>> = (0..k).map(|i| vec![format!("说明第{i}行"), String::new()]).collect();
    rows.push(HEADER.split(',').map(String::from).collect());
    rows.push(vec!["F1".into(), "1".into(), "1".into(), "2024-01-01".into(), "3.2".into()]);
    RawTable::new(rows)
}

proptest! {
    #[test]
    fn header_is_found_at_any_row(k in 0usize..15) {
        let table = table_with_header_at(k);
        let detection = detect_header_row(&table.rows, &HeaderConfig::default());
        prop_assert_eq!(detection.row, k);
        prop_assert!(!detection.is_fallback());
    }
}
