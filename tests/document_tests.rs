mod common;

use std::path::Path;

use agency_quote_server::config::RenderConfig;
use agency_quote_server::documents::projection::{project, specialty_key, AUTO_KEYS, COMMON_KEYS};
use agency_quote_server::documents::{
    residual_placeholders, substitute, DocumentOutcome, DocumentRenderer, DocumentState,
    DocxDocument, PdfConverter, PlaceholderMap, SENTINEL,
};
use agency_quote_server::quote::model::{Quote, QuoteType};
use chrono::Utc;
use common::*;

fn quote(types: &[QuoteType]) -> Quote {
    Quote::from_submission(
        "q-1".to_string(),
        "agent-1",
        "agent@example.com",
        quote_submission(types),
        Utc::now(),
    )
}

fn renderer(templates: &Path, output: &Path, converter: std::sync::Arc<FakeConverter>) -> DocumentRenderer {
    let pdf: std::sync::Arc<dyn PdfConverter> = converter;
    DocumentRenderer::with_converter(&RenderConfig::new(templates, output), pdf)
}

fn mapping(pairs: &[(&str, Option<&str>)]) -> PlaceholderMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

#[test]
fn test_substitution_is_idempotent() {
    let bytes = docx_package(&format!(
        "{}{}",
        paragraph(&["Dear {{client_", "name}}, carrier {{current_carrier}}"]),
        table(&[vec!["{{years_with_carrier}}".to_string()]])
    ));
    let mut doc = DocxDocument::from_bytes(&bytes).unwrap();
    let map = mapping(&[
        ("client_name", Some("Jane Doe")),
        ("current_carrier", None),
        ("years_with_carrier", Some("3")),
    ]);

    let first = substitute(&mut doc, &map);
    let once = doc.plain_text();
    let second = substitute(&mut doc, &map);

    assert_eq!(first.replacements, 3);
    assert_eq!(second.replacements, 0);
    assert_eq!(doc.plain_text(), once);
}

#[test]
fn test_sentinel_for_empty_values_and_untouched_unknown_keys() {
    let bytes = docx_package(&format!(
        "{}{}",
        paragraph(&["Carrier: {{current_carrier}}"]),
        paragraph(&["Limits: {{current_limits}} Agent: {{agent_code}}"])
    ));
    let mut doc = DocxDocument::from_bytes(&bytes).unwrap();
    let map = mapping(&[("current_carrier", None), ("current_limits", Some(""))]);

    substitute(&mut doc, &map);

    let text = doc.plain_text();
    assert_eq!(
        text,
        format!("Carrier: {}\nLimits: {} Agent: {{{{agent_code}}}}", SENTINEL, SENTINEL)
    );
    assert_eq!(residual_placeholders(&doc), vec!["agent_code".to_string()]);
}

#[test]
fn test_label_tab_value_lines_keep_the_tab_before_the_value() {
    let body = r#"<w:p><w:r><w:t>Name:</w:t></w:r><w:r><w:tab/><w:t>{{client_name}}</w:t></w:r></w:p>"#;
    let mut doc = DocxDocument::from_bytes(&docx_package(body)).unwrap();

    let report = substitute(&mut doc, &mapping(&[("client_name", Some("Jane Doe"))]));

    assert_eq!(report.replacements, 1);
    let saved = DocxDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(saved.plain_text(), "Name:\tJane Doe");
}

#[test]
fn test_specialty_projection_stops_at_eight_items() {
    let mut submission = quote_submission(&[QuoteType::Specialty]);
    submission.specialty_items = Some((1..=10).map(specialty_item).collect());
    let quote = Quote::from_submission(
        "q-10".to_string(),
        "agent-1",
        "agent@example.com",
        submission,
        Utc::now(),
    );

    let map = project(QuoteType::Specialty, &quote);

    assert_eq!(
        map.get(&specialty_key(8, "make")).cloned().flatten().as_deref(),
        Some("Maker8")
    );
    assert!(!map.contains_key(&specialty_key(9, "make")));
    assert!(!map.contains_key(&specialty_key(10, "type")));
    assert!(map.keys().all(|k| !k.starts_with("item9_") && !k.starts_with("item10_")));
}

#[test]
fn test_missing_template_only_fails_its_own_type() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_templates(templates.path(), &[QuoteType::Auto]);
    let converter = FakeConverter::succeeding();
    let renderer = renderer(templates.path(), output.path(), converter.clone());

    let outcomes = renderer.render(
        &quote(&[QuoteType::Auto, QuoteType::Home]),
        &[QuoteType::Auto, QuoteType::Home],
    );

    let home = &outcomes[&QuoteType::Home];
    assert_eq!(home.state(), DocumentState::Failed);
    assert!(home.error().unwrap().contains("template not found"));

    let auto = &outcomes[&QuoteType::Auto];
    assert_eq!(auto.state(), DocumentState::Succeeded);
    assert!(Path::new(auto.docx_path().unwrap()).is_file());
    assert!(Path::new(auto.pdf_path().unwrap()).is_file());
    assert_eq!(converter.calls(), 1);
}

#[test]
fn test_auto_document_has_no_residual_tokens() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_templates(templates.path(), &[QuoteType::Auto]);
    let renderer = renderer(templates.path(), output.path(), FakeConverter::succeeding());

    let outcomes = renderer.render(&quote(&[QuoteType::Auto]), &[QuoteType::Auto]);
    let docx_path = outcomes[&QuoteType::Auto].docx_path().unwrap().to_string();

    let doc = DocxDocument::open(Path::new(&docx_path)).unwrap();
    let text = doc.plain_text();
    assert!(text.contains("Prepared for Jane Doe"));
    assert!(text.contains("Acme Mutual"));
    for key in COMMON_KEYS.iter().chain(AUTO_KEYS.iter()) {
        assert!(
            !text.contains(&format!("{{{{{}}}}}", key)),
            "{} left unfilled",
            key
        );
    }
    assert!(residual_placeholders(&doc).is_empty());

    let file_name = Path::new(&docx_path).file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("auto_Jane_Doe_"));
    assert!(file_name.ends_with(".docx"));
    assert!(docx_path.contains(&format!("{}auto{}", std::path::MAIN_SEPARATOR, std::path::MAIN_SEPARATOR)));
}

#[test]
fn test_failed_conversion_keeps_the_docx() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_templates(templates.path(), &[QuoteType::Home]);
    let renderer = renderer(templates.path(), output.path(), FakeConverter::failing());

    let outcomes = renderer.render(&quote(&[QuoteType::Home]), &[QuoteType::Home]);
    let home = &outcomes[&QuoteType::Home];

    assert_eq!(home.state(), DocumentState::Partial);
    assert!(home.pdf_path().is_none());
    assert!(Path::new(home.docx_path().unwrap()).is_file());

    let doc = DocxDocument::open(Path::new(home.docx_path().unwrap())).unwrap();
    let text = doc.plain_text();
    assert!(text.contains("Frame"));
    // security_system was set, swimming_pool was not
    assert!(text.contains("Yes"));
    assert!(text.contains("No"));
}

#[test]
fn test_template_is_not_modified_by_rendering() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_templates(templates.path(), &[QuoteType::Specialty]);
    let template_path = templates.path().join(QuoteType::Specialty.template_file());
    let before = std::fs::read(&template_path).unwrap();

    let renderer = renderer(templates.path(), output.path(), FakeConverter::succeeding());
    let outcomes = renderer.render(&quote(&[QuoteType::Specialty]), &[QuoteType::Specialty]);

    assert_eq!(outcomes[&QuoteType::Specialty].state(), DocumentState::Succeeded);
    assert_eq!(std::fs::read(&template_path).unwrap(), before);

    let doc = DocxDocument::open(Path::new(
        outcomes[&QuoteType::Specialty].docx_path().unwrap(),
    ))
    .unwrap();
    let text = doc.plain_text();
    assert!(text.contains("Maker1 Model1"));
    // empty slots are sentinel-filled
    assert!(text.contains(&format!("{} {}", SENTINEL, SENTINEL)));
}

#[test]
fn test_outcome_wire_format() {
    let failed: DocumentOutcome =
        serde_json::from_str(r#"{"error": "template not found: x.docx"}"#).unwrap();
    assert_eq!(failed.state(), DocumentState::Failed);

    let partial: DocumentOutcome =
        serde_json::from_str(r#"{"docx_path": "out/auto/a.docx", "pdf_path": null}"#).unwrap();
    assert_eq!(partial.state(), DocumentState::Partial);
}
