//! Prometheus metrics owned by the application state.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::documents::DocumentOutcome;
use crate::quote::model::QuoteType;

pub struct RenderMetrics {
    registry: Registry,
    documents: IntCounterVec,
    submissions: IntCounterVec,
}

impl RenderMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("agency_quote_server".to_string()), None)?;

        let documents = IntCounterVec::new(
            Opts::new("documents_rendered_total", "Rendered quote documents by outcome"),
            &["quote_type", "outcome"],
        )?;
        let submissions = IntCounterVec::new(
            Opts::new("records_submitted_total", "Accepted quote and lead submissions"),
            &["kind"],
        )?;

        registry.register(Box::new(documents.clone()))?;
        registry.register(Box::new(submissions.clone()))?;

        Ok(Self {
            registry,
            documents,
            submissions,
        })
    }

    pub fn record_document(&self, quote_type: QuoteType, outcome: &DocumentOutcome) {
        self.documents
            .with_label_values(&[quote_type.as_str(), outcome.state().as_str()])
            .inc();
    }

    pub fn record_submission(&self, kind: &str) {
        self.submissions.with_label_values(&[kind]).inc();
    }

    pub fn document_count(&self, quote_type: QuoteType, state: &str) -> u64 {
        self.documents
            .with_label_values(&[quote_type.as_str(), state])
            .get()
    }

    /// Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_outcomes_are_counted() {
        let metrics = RenderMetrics::new().unwrap();
        let partial = DocumentOutcome::Rendered {
            docx_path: "a.docx".into(),
            pdf_path: None,
        };
        metrics.record_document(QuoteType::Auto, &partial);
        metrics.record_document(QuoteType::Auto, &partial);

        assert_eq!(metrics.document_count(QuoteType::Auto, "partial"), 2);
        let text = metrics.encode().unwrap();
        assert!(text.contains("agency_quote_server_documents_rendered_total"));
    }
}
