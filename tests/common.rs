#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agency_quote_server::auth::middleware::AgentIdentity;
use agency_quote_server::config::{AppConfig, RenderConfig};
use agency_quote_server::db::store::{RecordStore, SqliteRecordStore};
use agency_quote_server::documents::projection::{AUTO_KEYS, COMMON_KEYS, HOME_KEYS};
use agency_quote_server::documents::{ConversionError, DocumentRenderer, PdfConverter};
use agency_quote_server::lead::model::LeadSubmission;
use agency_quote_server::quote::model::{
    AutoData, HomeDetails, PersonalInfo, QuoteSubmission, QuoteType, SpecialtyItem, Vehicle,
};
use agency_quote_server::AppState;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

fn run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, text)
}

/// A `<w:p>` with `text` split into one run per slice.
pub fn paragraph(runs: &[&str]) -> String {
    let runs: String = runs.iter().map(|r| run(r)).collect();
    format!("<w:p>{}</w:p>", runs)
}

/// A single table, one row per entry, one cell per string.
pub fn table(rows: &[Vec<String>]) -> String {
    let mut xml = String::from("<w:tbl>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in row {
            xml.push_str(&format!("<w:tc>{}</w:tc>", paragraph(&[cell.as_str()])));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// Zip a minimal WordprocessingML package around `body`.
pub fn docx_package(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn key_rows(keys: &[&str]) -> Vec<Vec<String>> {
    keys.iter()
        .map(|key| vec![key.to_string(), format!("{{{{{}}}}}", key)])
        .collect()
}

/// Template for `quote_type`: common keys in the body (client name split
/// across runs), type keys in a label/value table.
pub fn template_for(quote_type: QuoteType) -> Vec<u8> {
    let mut body = String::new();
    let title = format!("{} Insurance Quote", quote_type);
    body.push_str(&paragraph(&[title.as_str()]));
    body.push_str(&paragraph(&["Prepared for {{client_", "name}}"]));
    for key in COMMON_KEYS.iter().skip(1) {
        let line = format!("{}: {{{{{}}}}}", key, key);
        body.push_str(&paragraph(&[line.as_str()]));
    }

    match quote_type {
        QuoteType::Auto => body.push_str(&table(&key_rows(&AUTO_KEYS))),
        QuoteType::Home => body.push_str(&table(&key_rows(&HOME_KEYS))),
        QuoteType::Specialty => {
            let rows: Vec<Vec<String>> = (1..=8)
                .map(|slot| {
                    vec![
                        format!("{{{{item{}_type}}}}", slot),
                        format!("{{{{item{}_make}}}} {{{{item{}_model}}}}", slot, slot),
                        format!("{{{{item{}_market_value}}}}", slot),
                    ]
                })
                .collect();
            body.push_str(&table(&rows));
        }
    }
    docx_package(&body)
}

pub fn write_templates(dir: &Path, types: &[QuoteType]) {
    for &quote_type in types {
        std::fs::write(dir.join(quote_type.template_file()), template_for(quote_type)).unwrap();
    }
}

/// Stand-in for the external PDF programs.
pub struct FakeConverter {
    succeed: bool,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            succeed: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            succeed: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PdfConverter for FakeConverter {
    fn name(&self) -> &str {
        "fake"
    }

    fn convert(&self, _docx: &Path, pdf: &Path) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return Err(ConversionError::AllFailed(
                "docx2pdf: not installed; libreoffice: not installed".to_string(),
            ));
        }
        std::fs::write(pdf, b"%PDF-1.4\n%%EOF\n")?;
        Ok(())
    }
}

/// Application state over an in-memory store plus the directories it writes to.
pub struct TestEnv {
    pub state: AppState,
    pub converter: Arc<FakeConverter>,
    pub templates: TempDir,
    pub output: TempDir,
}

pub fn render_config(templates: &Path, output: &Path) -> RenderConfig {
    RenderConfig::new(templates, output)
}

pub async fn test_env_with(types: &[QuoteType], converter: Arc<FakeConverter>) -> TestEnv {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_templates(templates.path(), types);

    let render = render_config(templates.path(), output.path());
    let mut config = AppConfig::new("sqlite::memory:", render.clone());
    config.bcrypt_cost = 4;

    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
    let pdf: Arc<dyn PdfConverter> = converter.clone();
    let renderer = DocumentRenderer::with_converter(&render, pdf);
    let state = AppState::with_parts(config, store, renderer).await.unwrap();

    TestEnv {
        state,
        converter,
        templates,
        output,
    }
}

pub async fn test_env() -> TestEnv {
    test_env_with(&QuoteType::ALL, FakeConverter::succeeding()).await
}

/// Register an agent straight through the state and return its identity.
pub async fn agent_identity(state: &AppState, email: &str) -> AgentIdentity {
    let agent = state
        .create_agent(email, "Test Agent", "not-a-real-hash".to_string())
        .await
        .unwrap();
    AgentIdentity {
        id: agent.id,
        email: agent.email,
        permissions: agent.permissions,
    }
}

pub fn personal_info(first: &str, last: &str) -> PersonalInfo {
    PersonalInfo {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@example.com", first.to_lowercase()),
        phone: "555-0100".to_string(),
        address: "12 Oak Avenue".to_string(),
        city: Some("Springfield".to_string()),
        state: Some("IL".to_string()),
        zip_code: Some("62701".to_string()),
        ..Default::default()
    }
}

pub fn vehicle() -> Vehicle {
    Vehicle {
        year: "2021".to_string(),
        make: "Honda".to_string(),
        model: "Civic".to_string(),
        vin: Some("1HGCV1F30LA000001".to_string()),
        ..Default::default()
    }
}

pub fn home_details() -> HomeDetails {
    HomeDetails {
        year_built: "1998".to_string(),
        square_footage: "2100".to_string(),
        construction_type: "Frame".to_string(),
        roof_type: "Shingle".to_string(),
        security_system: Some(true),
        ..Default::default()
    }
}

pub fn specialty_item(n: usize) -> SpecialtyItem {
    SpecialtyItem {
        item_type: "boat".to_string(),
        year: "2019".to_string(),
        make: format!("Maker{}", n),
        model: format!("Model{}", n),
        market_value: format!("{}000", n),
        storage_location: "Marina".to_string(),
        ..Default::default()
    }
}

pub fn quote_submission(types: &[QuoteType]) -> QuoteSubmission {
    QuoteSubmission {
        quote_types: types.to_vec(),
        personal_info: personal_info("Jane", "Doe"),
        auto_data: Some(AutoData {
            current_carrier: Some("Acme Mutual".to_string()),
            years_with_carrier: Some(3.0),
            ..Default::default()
        }),
        vehicles: Some(vec![vehicle()]),
        home_details: Some(home_details()),
        specialty_items: Some(vec![specialty_item(1)]),
        additional_insureds: Vec::new(),
        notes: None,
        effective_date: Some("2026-11-01".to_string()),
    }
}

pub fn lead_submission(email: &str) -> LeadSubmission {
    LeadSubmission {
        first_name: "Sam".to_string(),
        last_name: "Lee".to_string(),
        email: email.to_string(),
        phone: "555-0101".to_string(),
        address: "9 Elm St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
        interested_in: vec!["AUTO".to_string()],
        notes: None,
    }
}
