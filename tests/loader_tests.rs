mod common;

use mailmerge_server::dataset::{load_dataset, normalize_record, CellValue, LoadError};

#[test]
fn test_headers_are_sanitized_and_reported() {
    let bytes = common::xlsx(&[
        &["Customer Name", "2023 Revenue", "Customer Name"],
        &["Acme", "1200", "x"],
    ]);
    let loaded = load_dataset(&bytes).unwrap();

    assert_eq!(
        loaded.dataset.columns(),
        &["Customer_Name", "_2023_Revenue", "Customer_Name_1"]
    );
    assert_eq!(loaded.renames.len(), 3);
    assert_eq!(
        loaded.renames[1].warning(),
        "Column renamed: \"2023 Revenue\" -> \"_2023_Revenue\"; use \"{{ _2023_Revenue }}\" in templates."
    );
}

#[test]
fn test_rows_keep_types_until_normalized() {
    let bytes = common::xlsx(&[
        &["name", "amount", "note"],
        &["Acme", "1200", "first"],
        &["Beta", "3.5", ""],
    ]);
    let loaded = load_dataset(&bytes).unwrap();
    let dataset = &loaded.dataset;
    assert_eq!(dataset.len(), 2);

    let second = dataset.record(1).unwrap();
    assert_eq!(second.get("name"), Some(&CellValue::Text("Beta".into())));
    assert!(second.get("note").unwrap().is_missing());

    let first = normalize_record(&dataset.record(0).unwrap());
    assert_eq!(first.get("amount"), Some("1200"));
    let second = normalize_record(&second);
    assert_eq!(second.get("amount"), Some("3.5"));
    assert_eq!(second.get("note"), Some(""));
}

#[test]
fn test_blank_rows_are_dropped() {
    let bytes = common::xlsx(&[
        &["name", "city"],
        &["Acme", "Oslo"],
        &["", ""],
        &["Beta", "Rome"],
    ]);
    let loaded = load_dataset(&bytes).unwrap();
    assert_eq!(loaded.dataset.len(), 2);
    let last = normalize_record(&loaded.dataset.record(1).unwrap());
    assert_eq!(last.get("city"), Some("Rome"));
}

#[test]
fn test_clean_headers_produce_no_renames() {
    let bytes = common::xlsx(&[&["id", "name"], &["1", "Ada"]]);
    let loaded = load_dataset(&bytes).unwrap();
    assert!(loaded.renames.is_empty());
    assert_eq!(loaded.dataset.first_column(), Some("id"));
}

#[test]
fn test_unreadable_blob_is_load_error() {
    assert!(matches!(
        load_dataset(b"id,name\n1,Ada\n"),
        Err(LoadError::Spreadsheet(_))
    ));
}
