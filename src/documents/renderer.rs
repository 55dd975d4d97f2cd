//! Template → filled DOCX → PDF, once per requested quote type.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::RenderConfig;
use crate::quote::model::{Quote, QuoteType};

use super::common::{output_stem, timestamp_now};
use super::convert::{FallbackConverter, PdfConverter};
use super::docx::{DocxDocument, DocxError};
use super::projection::project;
use super::substitution::{residual_placeholders, substitute};

const TEMPLATE_CACHE_CAPACITY: u64 = 16;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("failed to read template {}: {source}", .path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid template document: {0}")]
    Docx(#[from] DocxError),
    #[error("failed to write {}: {source}", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-type result of a render, as stored on the quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DocumentOutcome {
    Rendered {
        docx_path: String,
        pdf_path: Option<String>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Succeeded,
    /// DOCX written, PDF conversion failed.
    Partial,
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Succeeded => "succeeded",
            DocumentState::Partial => "partial",
            DocumentState::Failed => "failed",
        }
    }
}

impl DocumentOutcome {
    pub fn state(&self) -> DocumentState {
        match self {
            DocumentOutcome::Rendered {
                pdf_path: Some(_), ..
            } => DocumentState::Succeeded,
            DocumentOutcome::Rendered { pdf_path: None, .. } => DocumentState::Partial,
            DocumentOutcome::Failed { .. } => DocumentState::Failed,
        }
    }

    pub fn docx_path(&self) -> Option<&str> {
        match self {
            DocumentOutcome::Rendered { docx_path, .. } => Some(docx_path),
            DocumentOutcome::Failed { .. } => None,
        }
    }

    pub fn pdf_path(&self) -> Option<&str> {
        match self {
            DocumentOutcome::Rendered { pdf_path, .. } => pdf_path.as_deref(),
            DocumentOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DocumentOutcome::Failed { error } => Some(error),
            DocumentOutcome::Rendered { .. } => None,
        }
    }
}

pub struct DocumentRenderer {
    template_dir: PathBuf,
    output_dir: PathBuf,
    converter: Arc<dyn PdfConverter>,
    templates: Cache<PathBuf, Arc<Vec<u8>>>,
}

impl DocumentRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self::with_converter(config, Arc::new(FallbackConverter::from_config(config)))
    }

    pub fn with_converter(config: &RenderConfig, converter: Arc<dyn PdfConverter>) -> Self {
        let templates = Cache::builder()
            .time_to_live(config.template_cache_ttl)
            .max_capacity(TEMPLATE_CACHE_CAPACITY)
            .build();

        Self {
            template_dir: config.template_dir.clone(),
            output_dir: config.output_dir.clone(),
            converter,
            templates,
        }
    }

    pub fn template_path(&self, quote_type: QuoteType) -> PathBuf {
        self.template_dir.join(quote_type.template_file())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render every requested type. A failure in one type never stops the
    /// others; it is recorded in that type's outcome.
    pub fn render(
        &self,
        quote: &Quote,
        requested: &[QuoteType],
    ) -> BTreeMap<QuoteType, DocumentOutcome> {
        log::info!(
            "Starting document generation for quote {} ({} type(s))",
            quote.id,
            requested.len()
        );

        let mut outcomes = BTreeMap::new();
        for &quote_type in requested {
            if outcomes.contains_key(&quote_type) {
                continue;
            }
            let outcome = match self.render_one(quote, quote_type) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Error generating {} document for quote {}: {}", quote_type, quote.id, e);
                    DocumentOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.insert(quote_type, outcome);
        }

        log::info!("Document generation completed for quote {}", quote.id);
        outcomes
    }

    fn render_one(
        &self,
        quote: &Quote,
        quote_type: QuoteType,
    ) -> Result<DocumentOutcome, RenderError> {
        let template = self.load_template(quote_type)?;
        let mut document = DocxDocument::from_bytes(&template)?;

        let mapping = project(quote_type, quote);
        let report = substitute(&mut document, &mapping);
        log::debug!(
            "{} template: {} body and {} table paragraph(s) filled",
            quote_type,
            report.body_paragraphs,
            report.table_paragraphs
        );

        let residual = residual_placeholders(&document);
        if !residual.is_empty() {
            log::warn!(
                "{} template still contains unfilled placeholders: {}",
                quote_type,
                residual.join(", ")
            );
        }

        let type_dir = self.output_dir.join(quote_type.slug());
        fs::create_dir_all(&type_dir).map_err(|source| RenderError::WriteOutput {
            path: type_dir.clone(),
            source,
        })?;

        let stem = output_stem(quote_type, &quote.client_name, &timestamp_now());
        let docx_path = type_dir.join(format!("{stem}.docx"));
        let bytes = document.to_bytes()?;
        fs::write(&docx_path, bytes).map_err(|source| RenderError::WriteOutput {
            path: docx_path.clone(),
            source,
        })?;
        log::info!("Saved document to {}", docx_path.display());

        let pdf_path = docx_path.with_extension("pdf");
        let pdf_path = match self.converter.convert(&docx_path, &pdf_path) {
            Ok(()) => {
                log::info!("PDF saved to {}", pdf_path.display());
                Some(pdf_path.to_string_lossy().into_owned())
            }
            Err(e) => {
                log::warn!("PDF conversion failed for {}: {}", docx_path.display(), e);
                None
            }
        };

        Ok(DocumentOutcome::Rendered {
            docx_path: docx_path.to_string_lossy().into_owned(),
            pdf_path,
        })
    }

    fn load_template(&self, quote_type: QuoteType) -> Result<Arc<Vec<u8>>, RenderError> {
        let path = self.template_path(quote_type);
        if !path.is_file() {
            self.templates.invalidate(&path);
            return Err(RenderError::TemplateNotFound(path));
        }

        if let Some(bytes) = self.templates.get(&path) {
            return Ok(bytes);
        }

        let bytes = fs::read(&path).map_err(|source| RenderError::TemplateIo {
            path: path.clone(),
            source,
        })?;
        let bytes = Arc::new(bytes);
        self.templates.insert(path, bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_states() {
        let full = DocumentOutcome::Rendered {
            docx_path: "a.docx".into(),
            pdf_path: Some("a.pdf".into()),
        };
        let partial = DocumentOutcome::Rendered {
            docx_path: "a.docx".into(),
            pdf_path: None,
        };
        let failed = DocumentOutcome::Failed {
            error: "template not found: x".into(),
        };

        assert_eq!(full.state(), DocumentState::Succeeded);
        assert_eq!(partial.state(), DocumentState::Partial);
        assert_eq!(failed.state(), DocumentState::Failed);
        assert_eq!(failed.error(), Some("template not found: x"));
    }

    #[test]
    fn test_outcome_json_shape() {
        let partial = DocumentOutcome::Rendered {
            docx_path: "out/auto/a.docx".into(),
            pdf_path: None,
        };
        let json = serde_json::to_value(&partial).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"docx_path": "out/auto/a.docx", "pdf_path": null})
        );

        let failed: DocumentOutcome =
            serde_json::from_value(serde_json::json!({"error": "boom"})).unwrap();
        assert_eq!(failed.state(), DocumentState::Failed);
    }

    #[test]
    fn test_missing_template_message() {
        let err = RenderError::TemplateNotFound(PathBuf::from("templates/home_quote_template.docx"));
        assert_eq!(
            err.to_string(),
            "template not found: templates/home_quote_template.docx"
        );
    }
}
