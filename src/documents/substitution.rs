//! `{{key}}` placeholder substitution over a [`DocxDocument`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use super::docx::DocxDocument;

/// Shown wherever a mapped value is missing or empty.
pub const SENTINEL: &str = "N/A";

/// Placeholder name → value. `None` and `Some("")` both render as [`SENTINEL`].
pub type PlaceholderMap = BTreeMap<String, Option<String>>;

/// What a substitution pass touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubstitutionReport {
    pub body_paragraphs: usize,
    pub table_paragraphs: usize,
    pub replacements: usize,
}

impl SubstitutionReport {
    pub fn paragraphs_changed(&self) -> usize {
        self.body_paragraphs + self.table_paragraphs
    }
}

pub fn token(key: &str) -> String {
    format!("{{{{{}}}}}", key)
}

fn display_value(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => SENTINEL,
    }
}

/// Replace every `{{key}}` of every mapped key in `text`.
/// Returns the new text and the number of tokens replaced.
pub fn substitute_text(text: &str, mapping: &PlaceholderMap) -> (String, usize) {
    let mut result = text.to_string();
    let mut count = 0;
    for (key, value) in mapping {
        let placeholder = token(key);
        let hits = result.matches(placeholder.as_str()).count();
        if hits > 0 {
            result = result.replace(placeholder.as_str(), display_value(value));
            count += hits;
        }
    }
    (result, count)
}

/// Fill all mapped placeholders in body paragraphs and table cells.
pub fn substitute(document: &mut DocxDocument, mapping: &PlaceholderMap) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();

    for paragraph in document.paragraphs_mut() {
        let text = paragraph.text();
        if !text.contains("{{") {
            continue;
        }

        let (replaced, count) = substitute_text(&text, mapping);
        if count == 0 {
            continue;
        }

        log::debug!("Replaced {} placeholder(s) in paragraph", count);
        paragraph.set_text(&replaced);
        report.replacements += count;
        if paragraph.in_table() {
            report.table_paragraphs += 1;
        } else {
            report.body_paragraphs += 1;
        }
    }

    report
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid placeholder regex"))
}

/// Placeholder names still present in the document, in order of appearance.
pub fn residual_placeholders(document: &DocxDocument) -> Vec<String> {
    let pattern = placeholder_pattern();
    let mut names = Vec::new();
    for paragraph in document.paragraphs() {
        let text = paragraph.text();
        for capture in pattern.captures_iter(&text) {
            let name = capture[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Option<&str>)]) -> PlaceholderMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_replaces_every_occurrence_of_every_key() {
        let map = mapping(&[("a", Some("1")), ("b", Some("2"))]);
        let (text, count) = substitute_text("{{a}}-{{b}}-{{a}}", &map);
        assert_eq!(text, "1-2-1");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_missing_and_empty_values_use_sentinel() {
        let map = mapping(&[("a", None), ("b", Some(""))]);
        let (text, _) = substitute_text("{{a}} / {{b}}", &map);
        assert_eq!(text, "N/A / N/A");
    }

    #[test]
    fn test_unmapped_keys_left_verbatim() {
        let map = mapping(&[("a", Some("x"))]);
        let (text, count) = substitute_text("{{a}} {{zzz}}", &map);
        assert_eq!(text, "x {{zzz}}");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_token_format() {
        assert_eq!(token("client_name"), "{{client_name}}");
    }
}
