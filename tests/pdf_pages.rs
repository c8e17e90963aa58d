//! The exported PDF has exactly the pages the layout produced.

use radreport_lib::catalog::builtin_templates;
use radreport_lib::composer::merge;
use radreport_lib::export::{export_document, DocumentExporter};
use radreport_lib::layout::{layout, layout_with, wrap_text, PageGeometry, A4_WRAP_COLUMNS};
use radreport_lib::models::StudyMetadata;

fn metadata() -> StudyMetadata {
    StudyMetadata {
        patient_id: "121".into(),
        patient_name: "Karan".into(),
        date: "30/08/2023".into(),
        location: "Ward 3".into(),
        referring_physician: "#01112".into(),
        study_instance_uid: "1.2.840.1".into(),
        patient_age: Some("27".into()),
        patient_sex: Some("Male".into()),
    }
}

fn numbered(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
}

fn pdf_page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
}

#[test]
fn pdf_page_count_matches_layout() {
    let geometry = PageGeometry::a4();
    for lines in [0, 1, 49, 50, 102, 103, 400] {
        let document = layout_with(&numbered(lines), &metadata(), &geometry).unwrap();
        let bytes = DocumentExporter::a4().render(&document, "CT HEAD").unwrap();
        assert_eq!(
            pdf_page_count(&bytes),
            document.page_count(),
            "{lines} lines"
        );
    }
}

#[test]
fn two_hundred_lines_export_five_pages() {
    let document = layout(&numbered(200), &metadata(), 500.0, 10.0).unwrap();
    let sizes: Vec<usize> = document.pages.iter().map(|p| p.lines.len()).collect();
    assert_eq!(sizes, vec![40, 50, 50, 50, 10]);

    let exporter = DocumentExporter {
        page_height_mm: 500.0,
        ..DocumentExporter::a4()
    };
    let bytes = exporter.render(&document, "long report").unwrap();
    assert_eq!(pdf_page_count(&bytes), 5);
}

#[test]
fn every_builtin_template_exports_one_page() {
    for template in builtin_templates() {
        let draft = wrap_text(&merge(&template, &metadata()), A4_WRAP_COLUMNS);
        let document = layout_with(&draft, &metadata(), &PageGeometry::a4()).unwrap();
        assert_eq!(document.body_text(), draft);

        let exported = export_document(&document, &template.name).unwrap();
        assert_eq!(pdf_page_count(&exported.bytes), 1, "{}", template.name);
        assert!(!exported.file_name.contains(' '));
    }
}
