//! Cross-month filtering scenarios and properties.

use std::collections::BTreeSet;

use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};
use proptest::prelude::*;

use dhi_filter::{apply_multi_filter, known_months, passing_animals};
use dhi_model::{AnimalKey, FilterSpec, HerdDataset, NullPolicy, RunHooks, keys};

type Row = (String, String, Option<f64>, Option<f64>);

fn month_file(name: &str, rows: &[Row]) -> HerdDataset {
    HerdDataset::new(
        name,
        DataFrame::new(vec![
            Series::new(keys::FARM_ID.into(), vec!["F1"; rows.len()]).into_column(),
            Series::new(
                keys::MANAGEMENT_ID.into(),
                rows.iter().map(|r| r.0.clone()).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(
                keys::SAMPLE_DATE.into(),
                rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(keys::PROTEIN_PCT.into(), rows.iter().map(|r| r.2).collect::<Vec<_>>()).into_column(),
            Series::new(
                keys::SOMATIC_CELL_COUNT.into(),
                rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(keys::SOURCE_FILE.into(), vec![name; rows.len()]).into_column(),
        ])
        .expect("frame"),
    )
}

fn row(id: &str, date: &str, protein: f64) -> Row {
    (id.to_string(), date.to_string(), Some(protein), Some(10.0))
}

#[test]
fn animal_passes_only_with_enough_months() {
    let datasets = vec![
        month_file("2024-01.csv", &[row("A1", "2024-01-12", 3.5)]),
        month_file("2024-02.csv", &[row("A1", "2024-02-12", 3.9)]),
    ];
    let selected: Vec<String> = datasets.iter().map(|d| d.source_file.clone()).collect();

    let two = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 2);
    let result = apply_multi_filter(&datasets, &[two], &selected, RunHooks::none()).expect("filter");
    assert_eq!(result.height(), 2);
    assert_eq!(
        result.distinct_text(keys::MANAGEMENT_ID).expect("ids"),
        BTreeSet::from(["A1".to_string()])
    );

    let three = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 3).with_null_policy(NullPolicy::Reject);
    let result = apply_multi_filter(&datasets, &[three], &selected, RunHooks::none()).expect("filter");
    assert!(result.is_empty());
}

#[test]
fn summary_rows_never_reach_the_filter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("march.csv");
    std::fs::write(
        &path,
        "牛场编号,管理号,胎次,采样日期,蛋白率(%)\nF1,1,2,2024-03-05,3.5\nF1,合计,,2024-03-05,3.5\n",
    )
    .expect("write");
    let dataset = dhi_ingest::normalize(&path, &dhi_model::HerdConfig::default())
        .into_payload()
        .expect("loaded");
    let spec = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, 1);
    let result = apply_multi_filter(
        &[dataset],
        &[spec],
        &["march.csv".to_string()],
        RunHooks::none(),
    )
    .expect("filter");
    assert_eq!(
        result.distinct_text(keys::MANAGEMENT_ID).expect("ids"),
        BTreeSet::from(["1".to_string()])
    );
}

fn herd_strategy() -> impl Strategy<Value = Vec<Row>> {
    let record = (
        0u8..6,
        1u32..=6,
        1u32..=28,
        prop::option::weighted(0.85, 2.5f64..4.5),
        prop::option::weighted(0.85, 1.0f64..60.0),
    )
        .prop_map(|(animal, month, day, protein, scc)| {
            (
                format!("{animal:03}"),
                format!("2024-{month:02}-{day:02}"),
                protein,
                scc,
            )
        });
    prop::collection::vec(record, 1..40)
}

fn policy_strategy() -> impl Strategy<Value = NullPolicy> {
    prop_oneof![
        Just(NullPolicy::Reject),
        Just(NullPolicy::Accept),
        Just(NullPolicy::HistoryFill),
    ]
}

fn passing(dataset: &HerdDataset, spec: &FilterSpec) -> BTreeSet<AnimalKey> {
    let months = known_months(dataset).expect("months");
    passing_animals(dataset, spec, &months).expect("passing")
}

proptest! {
    #[test]
    fn raising_min_months_never_adds_animals(
        rows in herd_strategy(),
        policy in policy_strategy(),
        lower in 0usize..6,
        extra in 0usize..4,
    ) {
        let dataset = month_file("herd.csv", &rows);
        let loose = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, lower).with_null_policy(policy);
        let strict = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, lower + extra).with_null_policy(policy);
        let loose = passing(&dataset, &loose);
        let strict = passing(&dataset, &strict);
        prop_assert!(strict.is_subset(&loose));
    }

    #[test]
    fn two_specs_equal_intersection(
        rows in herd_strategy(),
        protein_months in 0usize..4,
        scc_months in 0usize..4,
    ) {
        let dataset = month_file("herd.csv", &rows);
        let protein = FilterSpec::cross_month(keys::PROTEIN_PCT, 3.0, 4.0, protein_months);
        let scc = FilterSpec::cross_month(keys::SOMATIC_CELL_COUNT, 0.0, 20.0, scc_months)
            .with_null_policy(NullPolicy::Accept);

        let combined = apply_multi_filter(
            std::slice::from_ref(&dataset),
            &[protein.clone(), scc.clone()],
            &["herd.csv".to_string()],
            RunHooks::none(),
        )
        .expect("filter");
        let combined: BTreeSet<AnimalKey> = combined
            .animal_keys()
            .expect("keys")
            .into_iter()
            .flatten()
            .collect();

        let expected: BTreeSet<AnimalKey> = passing(&dataset, &protein)
            .intersection(&passing(&dataset, &scc))
            .cloned()
            .collect();
        prop_assert_eq!(combined, expected);
    }
}
