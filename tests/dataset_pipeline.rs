// End-to-end library flow: ingest a CSV, split it by entity, read the records back.
use coltab::api::{
    Column, ColumnType, Dataset, EntityNames, ErrorKind, ReadOptions, SplitOptions, Table, Value,
};
use time::Date;
use time::macros::date;

const CSV: &str = "\
iso_code,location,date,total_cases,new_deaths
BEL,Belgium,2020-03-01,2,
BEL,Belgium,2020-03-02,,1
NLD,Netherlands,2020-03-01,7,0
BEL,Belgium,2020-03-03T00:00:00,5,
NLD,Netherlands,not-a-date,9,2
";

fn ingest(dir: &std::path::Path) -> (Table, u64) {
    let path = dir.join("covid.csv");
    std::fs::write(&path, CSV).expect("write csv");

    let mut table = Table::open(&path).expect("open");
    table.bind_value_column::<Date>("date").expect("bind");
    table
        .bind_value_columns::<f64, _, _>(["total_cases", "new_deaths"])
        .expect("bind");

    let mut progress = Vec::new();
    let mut failures = Vec::new();
    let outcome = table
        .begin_read_with(
            &ReadOptions::default(),
            |percent| progress.push(percent),
            |failure| failures.push(failure),
        )
        .expect("read");
    assert_eq!(progress.last().copied(), Some(100.0));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].column, "date");
    assert_eq!(failures[0].kind, ErrorKind::Parse);
    (table, outcome.failed)
}

#[test]
fn ingest_reconciles_header_and_types_columns() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (table, failed) = ingest(temp.path());

    assert_eq!(failed, 1);
    assert_eq!(table.row_count(), 5);
    assert_eq!(
        table.column_names(),
        vec!["iso_code", "location", "date", "total_cases", "new_deaths"]
    );
    let types: Vec<ColumnType> = table.columns().iter().map(Column::column_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Text,
            ColumnType::Text,
            ColumnType::Date,
            ColumnType::Float64,
            ColumnType::Float64,
        ]
    );
    assert_eq!(
        table.get_row(3).expect("row")[2],
        Some(Value::Date(date!(2020 - 03 - 03)))
    );
    assert_eq!(table.get_row(4).expect("row")[2], None);
    assert_eq!(
        table.column_as::<f64>("total_cases").expect("column").values(),
        &[Some(2.0), None, Some(7.0), Some(5.0), Some(9.0)]
    );
}

#[test]
fn split_dataset_reads_back_per_entity() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (table, _) = ingest(temp.path());
    let dataset = Dataset::new(temp.path().join("out"));

    let outcome = dataset
        .split(
            &table,
            &SplitOptions::new("location").with_skip_columns(["iso_code"]),
        )
        .expect("split");
    assert_eq!(outcome.entities, vec!["Belgium", "Netherlands"]);
    assert_eq!(dataset.entities().expect("entities"), vec!["Belgium", "Netherlands"]);

    assert_eq!(
        dataset.read_dates("Belgium").expect("dates"),
        vec![
            Some(date!(2020 - 03 - 01)),
            Some(date!(2020 - 03 - 02)),
            Some(date!(2020 - 03 - 03)),
        ]
    );
    assert_eq!(
        dataset.read_dates("Netherlands").expect("dates"),
        vec![Some(date!(2020 - 03 - 01)), None]
    );
    assert_eq!(
        dataset.read_time_series("Belgium", "total_cases").expect("series"),
        vec![2.0, 2.0, 5.0]
    );
    assert_eq!(
        dataset.read_time_series("Belgium", "new_deaths").expect("series"),
        vec![0.0, 1.0, 1.0]
    );
    assert_eq!(
        dataset.read_final_value("Netherlands", "new_deaths").expect("final"),
        Some(2.0)
    );

    let names = EntityNames::parse("Belgium\nLuxembourg\n");
    assert_eq!(names.missing_from(&outcome.entities), vec!["Netherlands"]);
}

#[test]
fn delimited_output_reingests() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (table, _) = ingest(temp.path());
    let copy_path = temp.path().join("copy.csv");
    std::fs::write(&copy_path, table.to_delimited_text().expect("text")).expect("write copy");

    let mut copy = Table::open(&copy_path).expect("open");
    copy.bind_value_column::<Date>("date").expect("bind");
    copy.bind_value_columns::<f64, _, _>(["total_cases", "new_deaths"])
        .expect("bind");
    let outcome = copy.begin_read(&ReadOptions::default()).expect("read");
    assert_eq!(outcome.failed, 0);
    let original: Vec<_> = table.rows().collect();
    let reread: Vec<_> = copy.rows().collect();
    assert_eq!(original, reread);
}
