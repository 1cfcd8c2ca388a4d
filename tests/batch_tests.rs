mod common;

use common::{FakeConverter, NEVER_CONVERTS};
use mailmerge_server::batch::{BatchOrchestrator, RunError};
use mailmerge_server::dataset::{normalize_record, CellValue, Dataset};
use mailmerge_server::generators::render_document;
use mailmerge_server::session::Session;
use parking_lot::RwLock;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use zip::ZipArchive;

fn people() -> Dataset {
    let rows = [("Ada", "Oslo"), ("Grace", "Rome"), ("Linus", "Oslo")]
        .iter()
        .map(|(name, city)| {
            vec![
                CellValue::Text(name.to_string()),
                CellValue::Text(city.to_string()),
            ]
        })
        .collect();
    Dataset::new(vec!["name".into(), "city".into()], rows).unwrap()
}

fn session_with(templates: Vec<(&str, Vec<u8>)>, selection: &[usize]) -> RwLock<Session> {
    let mut session = Session::new();
    session.replace_dataset(people());
    session
        .add_templates(
            templates
                .into_iter()
                .map(|(name, bytes)| (name.to_string(), bytes))
                .collect(),
        )
        .unwrap();
    session.set_selection(selection).unwrap();
    RwLock::new(session)
}

fn orchestrator(converter: FakeConverter) -> BatchOrchestrator {
    BatchOrchestrator::new(Arc::new(converter), 4, 2)
}

#[tokio::test]
async fn test_preview_produces_one_document_per_pair_in_order() {
    let session = session_with(
        vec![
            ("letter.docx", common::docx(&["Hello {{ name }}"])),
            ("badge.docx", common::docx(&["{{ name }} from {{ city }}"])),
        ],
        &[2, 0, 1],
    );

    let run = orchestrator(FakeConverter::default())
        .preview(&session)
        .await
        .unwrap();

    assert_eq!(run.report.generated, 6);
    assert!(run.report.failures.is_empty());
    assert_eq!(run.report.status, "Generated 6 preview(s)");
    let names: Vec<&str> = run.previews.iter().map(|p| p.filename.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "letter_Ada.pdf",
            "letter_Grace.pdf",
            "letter_Linus.pdf",
            "badge_Ada.pdf",
            "badge_Grace.pdf",
            "badge_Linus.pdf",
        ]
    );
    let first = String::from_utf8(run.previews[0].bytes.clone()).unwrap();
    assert!(first.starts_with("PDF:"));
    assert!(first.contains("Hello Ada"));
    assert!(String::from_utf8_lossy(&run.previews[4].bytes).contains("Grace from Rome"));
}

#[tokio::test]
async fn test_one_failing_conversion_skips_only_that_pair() {
    let mut session = Session::new();
    let rows = vec![
        vec![CellValue::Text("Ada".into())],
        vec![CellValue::Text(NEVER_CONVERTS.into())],
        vec![CellValue::Text("Grace".into())],
    ];
    session.replace_dataset(Dataset::new(vec!["name".into()], rows).unwrap());
    session
        .add_templates(vec![("t.docx".into(), common::docx(&["{{ name }}"]))])
        .unwrap();
    session.set_selection(&[0, 1, 2]).unwrap();
    let session = RwLock::new(session);

    let run = orchestrator(FakeConverter::default())
        .preview(&session)
        .await
        .unwrap();

    assert_eq!(run.report.generated, 2);
    assert_eq!(run.report.skipped(), 1);
    assert_eq!(run.previews[0].filename, "t_Ada.pdf");
    assert_eq!(run.previews[1].filename, "t_Grace.pdf");

    let failure = &run.report.failures[0];
    assert_eq!(failure.record_index, 1);
    assert_eq!(failure.category, "ConversionTimeoutError");
    assert_eq!(run.report.status, "Generated 2 preview(s); 1 skipped due to errors");
}

#[tokio::test]
async fn test_unresolved_placeholder_fails_its_template_only() {
    let session = session_with(
        vec![
            ("good.docx", common::docx(&["{{ name }}"])),
            ("bad.docx", common::docx(&["{{ surname }}"])),
        ],
        &[0, 1],
    );

    let run = orchestrator(FakeConverter::default())
        .package(&session)
        .await
        .unwrap();

    assert_eq!(run.report.generated, 2);
    assert_eq!(run.report.skipped(), 2);
    assert!(run
        .report
        .failures
        .iter()
        .all(|f| f.template == "bad.docx" && f.category == "TemplateResolutionError"));
    assert_eq!(run.entries, vec!["good_Ada.docx", "good_Grace.docx"]);
    assert_eq!(common::entry_names(&run.archive), run.entries);
}

#[tokio::test]
async fn test_package_entries_match_direct_render() {
    let template = common::docx(&["Dear {{ name }} of {{ city }}"]);
    let session = session_with(vec![("letter.docx", template.clone())], &[0, 1, 2]);

    let run = orchestrator(FakeConverter::default())
        .package(&session)
        .await
        .unwrap();
    assert_eq!(run.entries.len(), 3);

    let dataset = people();
    let mut archive = ZipArchive::new(Cursor::new(run.archive)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    for (index, entry) in run.entries.iter().enumerate() {
        let mut packaged = Vec::new();
        archive
            .by_name(entry)
            .unwrap()
            .read_to_end(&mut packaged)
            .unwrap();

        let record = normalize_record(&dataset.record(index).unwrap());
        let direct = dir.path().join(format!("{}.docx", index));
        render_document(&template, &record, &direct).unwrap();
        assert_eq!(packaged, std::fs::read(&direct).unwrap(), "{}", entry);
    }
}

#[tokio::test]
async fn test_duplicate_filenames_are_disambiguated() {
    let session = session_with(
        vec![("same.docx", common::docx(&["{{ city }}"]))],
        &[0, 1, 2],
    );
    session
        .write()
        .set_naming_pattern(0, "{{ city }}")
        .unwrap();

    let run = orchestrator(FakeConverter::default())
        .package(&session)
        .await
        .unwrap();
    assert_eq!(run.entries, vec!["Oslo.docx", "Rome.docx", "Oslo_1.docx"]);
}

#[tokio::test]
async fn test_missing_selection_is_precondition_error() {
    let mut session = Session::new();
    session.replace_dataset(people());
    session
        .add_templates(vec![("t.docx".into(), common::docx(&["x"]))])
        .unwrap();
    let session = RwLock::new(session);

    let err = orchestrator(FakeConverter::default())
        .preview(&session)
        .await
        .unwrap_err();
    match err {
        RunError::Precondition(message) => assert!(message.contains("No rows selected")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let session = session_with(vec![("t.docx", common::docx(&["{{ name }}"]))], &[0]);
    let orchestrator = orchestrator(FakeConverter::slow(Duration::from_millis(400)));

    let (first, second) = tokio::join!(orchestrator.preview(&session), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.package(&session).await
    });

    assert_eq!(first.unwrap().report.generated, 1);
    assert!(matches!(second, Err(RunError::RunInProgress)));
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_conversions_respect_concurrency_limit() {
    let session = session_with(
        vec![
            ("a.docx", common::docx(&["{{ name }}"])),
            ("b.docx", common::docx(&["{{ city }}"])),
        ],
        &[0, 1, 2],
    );
    let converter = FakeConverter::slow(Duration::from_millis(30));
    let orchestrator = BatchOrchestrator::new(Arc::new(converter.clone()), 4, 1);

    let run = orchestrator.preview(&session).await.unwrap();

    assert_eq!(run.report.generated, 6);
    assert_eq!(converter.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_conversions_overlap_up_to_the_limit() {
    let session = session_with(
        vec![
            ("a.docx", common::docx(&["{{ name }}"])),
            ("b.docx", common::docx(&["{{ city }}"])),
        ],
        &[0, 1, 2],
    );
    let converter = FakeConverter::slow(Duration::from_millis(200));
    let orchestrator = BatchOrchestrator::new(Arc::new(converter.clone()), 4, 2);

    let run = orchestrator.preview(&session).await.unwrap();

    assert_eq!(run.report.generated, 6);
    assert_eq!(converter.peak_in_flight(), 2);
}
