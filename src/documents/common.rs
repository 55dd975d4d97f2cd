//! Naming helpers for rendered documents.

use chrono::{Local, NaiveDateTime};

use crate::quote::model::QuoteType;

/// Keep letters, digits and spaces from a client name, turning whitespace
/// into underscores.
pub fn sanitize_client_name(name: &str, fallback: &str) -> String {
    let result: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    if result.is_empty() {
        return fallback.to_string();
    }
    result
}

pub fn timestamp_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// `{type}_{client}_{YYYYmmdd_HHMMSS}`, without extension.
pub fn output_stem(quote_type: QuoteType, client_name: &str, at: &NaiveDateTime) -> String {
    format!(
        "{}_{}_{}",
        quote_type.slug(),
        sanitize_client_name(client_name, "client"),
        at.format("%Y%m%d_%H%M%S")
    )
}
