//! Just enough of the WordprocessingML package format to fill templates.
//!
//! A DOCX file is a zip archive; the visible text lives in
//! `word/document.xml`. The main part is kept as a stream of XML events split
//! into paragraph segments (body paragraphs and paragraphs inside table cells)
//! and opaque markup in between. Every other archive entry is carried through
//! byte for byte.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("failed to read DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("DOCX package has no {0} part")]
    MissingPart(&'static str),
    #[error("malformed document XML: {0}")]
    Xml(String),
    #[error("DOCX I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a paragraph sits in the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphLocation {
    Body,
    TableCell {
        table: usize,
        row: usize,
        cell: usize,
    },
}

/// One `<w:p>` element, kept as its raw event stream.
#[derive(Debug, Clone)]
pub struct Paragraph {
    events: Vec<Event<'static>>,
    location: ParagraphLocation,
}

impl Paragraph {
    pub fn location(&self) -> ParagraphLocation {
        self.location
    }

    pub fn in_table(&self) -> bool {
        matches!(self.location, ParagraphLocation::TableCell { .. })
    }

    /// Concatenated text of all runs. Tabs read as `\t`, breaks as `\n`.
    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut in_text = false;
        let mut run_depth = 0usize;
        for event in &self.events {
            match event {
                Event::Start(e) if e.local_name().as_ref() == b"r" => run_depth += 1,
                Event::End(e) if e.local_name().as_ref() == b"r" => {
                    run_depth = run_depth.saturating_sub(1)
                }
                Event::Start(e) if is_text_element(e.local_name().as_ref()) => in_text = true,
                Event::End(e) if is_text_element(e.local_name().as_ref()) => in_text = false,
                Event::Start(e) | Event::Empty(e) if run_depth > 0 => {
                    if let Some(c) = special_char(e.local_name().as_ref()) {
                        text.push(c);
                    }
                }
                Event::Text(t) if in_text => match t.unescape() {
                    Ok(s) => text.push_str(&s),
                    Err(_) => text.push_str(&String::from_utf8_lossy(t)),
                },
                _ => {}
            }
        }
        text
    }

    /// Replace the paragraph's text with `value`, keeping the first run's
    /// formatting and emptying the other runs. `\t` and `\n` in `value`
    /// become `<w:tab/>` and `<w:br/>` at the same positions.
    pub fn set_text(&mut self, value: &str) {
        let mut rewritten = Vec::with_capacity(self.events.len() + 3);
        let mut in_text = false;
        let mut written = false;
        let mut run_depth = 0usize;

        for event in self.events.drain(..) {
            match event {
                Event::Start(e) if e.local_name().as_ref() == b"r" => {
                    run_depth += 1;
                    rewritten.push(Event::Start(e));
                }
                Event::End(e) if e.local_name().as_ref() == b"r" => {
                    run_depth = run_depth.saturating_sub(1);
                    rewritten.push(Event::End(e));
                }
                Event::Start(e) if is_text_element(e.local_name().as_ref()) => {
                    in_text = true;
                    if written {
                        rewritten.push(Event::Start(e));
                    } else {
                        rewritten.push(Event::Start(preserve_space(&e)));
                    }
                }
                Event::Empty(e) if is_text_element(e.local_name().as_ref()) && !written => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    rewritten.push(Event::Start(preserve_space(&e)));
                    push_value(&mut rewritten, value);
                    rewritten.push(Event::End(BytesEnd::new(name)));
                    written = true;
                }
                Event::End(e) if is_text_element(e.local_name().as_ref()) => {
                    if !written {
                        push_value(&mut rewritten, value);
                        written = true;
                    }
                    in_text = false;
                    rewritten.push(Event::End(e));
                }
                Event::Text(_) if in_text => {}
                // Tabs and breaks are carried inside `value` now.
                Event::Start(e) | Event::Empty(e)
                    if run_depth > 0 && special_char(e.local_name().as_ref()).is_some() => {}
                Event::End(e)
                    if run_depth > 0 && special_char(e.local_name().as_ref()).is_some() => {}
                Event::End(e) if !written && e.local_name().as_ref() == b"p" => {
                    // No text run at all: append one before closing the paragraph.
                    if !value.is_empty() {
                        push_run(&mut rewritten, value);
                    }
                    written = true;
                    rewritten.push(Event::End(e));
                }
                other => rewritten.push(other),
            }
        }

        self.events = rewritten;
    }
}

fn is_text_element(local_name: &[u8]) -> bool {
    local_name == b"t"
}

/// Run content that stands for a character in `text()`.
fn special_char(local_name: &[u8]) -> Option<char> {
    match local_name {
        b"tab" => Some('\t'),
        b"br" | b"cr" => Some('\n'),
        _ => None,
    }
}

fn preserve_space(start: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() != b"xml:space" {
            rebuilt.push_attribute(attr);
        }
    }
    rebuilt.push_attribute(("xml:space", "preserve"));
    rebuilt.into_owned()
}

/// Emit `value` inside an open `<w:t>`, closing and reopening it around
/// each tab or break.
fn push_value(events: &mut Vec<Event<'static>>, value: &str) {
    let mut pieces = value.split(['\t', '\n']);
    let mut offset = 0;
    if let Some(first) = pieces.next() {
        events.push(Event::Text(BytesText::new(first).into_owned()));
        offset = first.len();
    }
    for piece in pieces {
        let separator = if value[offset..].starts_with('\t') {
            "w:tab"
        } else {
            "w:br"
        };
        offset += 1 + piece.len();
        events.push(Event::End(BytesEnd::new("w:t")));
        events.push(Event::Empty(BytesStart::new(separator)));
        let mut reopened = BytesStart::new("w:t");
        reopened.push_attribute(("xml:space", "preserve"));
        events.push(Event::Start(reopened));
        events.push(Event::Text(BytesText::new(piece).into_owned()));
    }
}

fn push_run(events: &mut Vec<Event<'static>>, value: &str) {
    events.push(Event::Start(BytesStart::new("w:r")));
    let mut text = BytesStart::new("w:t");
    text.push_attribute(("xml:space", "preserve"));
    events.push(Event::Start(text));
    push_value(events, value);
    events.push(Event::End(BytesEnd::new("w:t")));
    events.push(Event::End(BytesEnd::new("w:r")));
}

#[derive(Debug, Clone)]
enum Segment {
    Markup(Vec<Event<'static>>),
    Paragraph(Paragraph),
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// An opened DOCX package.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    entries: Vec<ArchiveEntry>,
    main_index: usize,
    segments: Vec<Segment>,
}

impl DocxDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut main_index = None;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            let name = file.name().to_string();
            if name == MAIN_DOCUMENT_PART {
                main_index = Some(entries.len());
            }
            entries.push(ArchiveEntry {
                name,
                data,
                is_dir: file.is_dir(),
            });
        }

        let main_index = main_index.ok_or(DocxError::MissingPart(MAIN_DOCUMENT_PART))?;
        let segments = parse_segments(&entries[main_index].data)?;

        Ok(Self {
            entries,
            main_index,
            segments,
        })
    }

    pub fn open(path: &Path) -> Result<Self, DocxError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the package, re-encoding the main document part.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let main_xml = self.write_main_part()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            writer.start_file(entry.name.as_str(), options)?;
            if i == self.main_index {
                writer.write_all(&main_xml)?;
            } else {
                writer.write_all(&entry.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), DocxError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Paragraph(p) => Some(p),
            Segment::Markup(_) => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.segments.iter_mut().filter_map(|segment| match segment {
            Segment::Paragraph(p) => Some(p),
            Segment::Markup(_) => None,
        })
    }

    /// All paragraph texts joined with newlines.
    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn write_main_part(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        for segment in &self.segments {
            let events = match segment {
                Segment::Markup(events) => events,
                Segment::Paragraph(p) => &p.events,
            };
            for event in events {
                writer
                    .write_event(event.clone())
                    .map_err(|e| DocxError::Xml(e.to_string()))?;
            }
        }
        Ok(writer.into_inner().into_inner())
    }
}

/// Tracks the table/row/cell position while walking the body.
#[derive(Default)]
struct TableCursor {
    tables_seen: usize,
    stack: Vec<(usize, usize, usize)>,
}

impl TableCursor {
    fn enter(&mut self, local: &[u8]) {
        match local {
            b"tbl" => {
                self.stack.push((self.tables_seen, 0, 0));
                self.tables_seen += 1;
            }
            b"tr" => {
                if let Some(top) = self.stack.last_mut() {
                    top.1 += 1;
                    top.2 = 0;
                }
            }
            b"tc" => {
                if let Some(top) = self.stack.last_mut() {
                    top.2 += 1;
                }
            }
            _ => {}
        }
    }

    fn leave(&mut self, local: &[u8]) {
        if local == b"tbl" {
            self.stack.pop();
        }
    }

    fn location(&self) -> ParagraphLocation {
        match self.stack.last() {
            Some(&(table, row, cell)) => ParagraphLocation::TableCell {
                table,
                row: row.saturating_sub(1),
                cell: cell.saturating_sub(1),
            },
            None => ParagraphLocation::Body,
        }
    }
}

fn parse_segments(xml: &[u8]) -> Result<Vec<Segment>, DocxError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut segments = Vec::new();
    let mut markup: Vec<Event<'static>> = Vec::new();
    let mut current: Option<Paragraph> = None;
    let mut paragraph_depth = 0usize;
    let mut tables = TableCursor::default();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DocxError::Xml(e.to_string()))?
            .into_owned();
        buf.clear();

        if let Event::Eof = event {
            break;
        }

        if current.is_none() {
            let (opens, empty) = match &event {
                Event::Start(e) if e.local_name().as_ref() == b"p" => (true, false),
                Event::Empty(e) if e.local_name().as_ref() == b"p" => (false, true),
                Event::Start(e) => {
                    tables.enter(e.local_name().as_ref());
                    (false, false)
                }
                Event::End(e) => {
                    tables.leave(e.local_name().as_ref());
                    (false, false)
                }
                _ => (false, false),
            };

            if !opens && !empty {
                markup.push(event);
                continue;
            }
            if !markup.is_empty() {
                segments.push(Segment::Markup(std::mem::take(&mut markup)));
            }

            if opens {
                paragraph_depth = 1;
                current = Some(Paragraph {
                    events: vec![event],
                    location: tables.location(),
                });
            } else if let Event::Empty(start) = event {
                // Expanded so text can be appended later.
                let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                segments.push(Segment::Paragraph(Paragraph {
                    events: vec![Event::Start(start), Event::End(end)],
                    location: tables.location(),
                }));
            }
            continue;
        }

        // Inside a paragraph: nested paragraphs (text boxes) stay part of it.
        let closes = match &event {
            Event::Start(e) if e.local_name().as_ref() == b"p" => {
                paragraph_depth += 1;
                false
            }
            Event::End(e) if e.local_name().as_ref() == b"p" => {
                paragraph_depth -= 1;
                paragraph_depth == 0
            }
            _ => false,
        };

        if let Some(paragraph) = current.as_mut() {
            paragraph.events.push(event);
        }
        if closes {
            if let Some(paragraph) = current.take() {
                segments.push(Segment::Paragraph(paragraph));
            }
        }
    }

    if let Some(paragraph) = current.take() {
        return Err(DocxError::Xml(format!(
            "unterminated paragraph ({} events)",
            paragraph.events.len()
        )));
    }
    if !markup.is_empty() {
        segments.push(Segment::Markup(markup));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(body: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file(MAIN_DOCUMENT_PART, options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_reads_body_and_table_paragraphs() {
        let bytes = package(
            "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc>\
             <w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        );
        let doc = DocxDocument::from_bytes(&bytes).unwrap();
        let paragraphs: Vec<_> = doc.paragraphs().collect();

        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].location(), ParagraphLocation::Body);
        assert_eq!(
            paragraphs[2].location(),
            ParagraphLocation::TableCell {
                table: 0,
                row: 0,
                cell: 1
            }
        );
        assert_eq!(doc.plain_text(), "Intro\nA1\nB1");
    }

    #[test]
    fn test_text_spans_runs() {
        let bytes = package(
            "<w:p><w:r><w:t>Hello {{cli</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>ent_name}}</w:t></w:r></w:p>",
        );
        let doc = DocxDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.plain_text(), "Hello {{client_name}}");
    }

    #[test]
    fn test_set_text_survives_round_trip() {
        let bytes = package(
            "<w:p><w:r><w:t>one</w:t></w:r><w:r><w:t>two</w:t></w:r></w:p><w:p/>",
        );
        let mut doc = DocxDocument::from_bytes(&bytes).unwrap();
        for paragraph in doc.paragraphs_mut() {
            paragraph.set_text("Smith & Sons <LLC>");
        }

        let reopened = DocxDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(
            reopened.plain_text(),
            "Smith & Sons <LLC>\nSmith & Sons <LLC>"
        );
    }

    #[test]
    fn test_tabs_and_breaks_keep_their_position() {
        let bytes = package(
            "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"2880\"/></w:tabs></w:pPr>\
             <w:r><w:t>Name:</w:t></w:r><w:r><w:tab/><w:t>{{client_name}}</w:t><w:br/><w:t>end</w:t></w:r></w:p>",
        );
        let mut doc = DocxDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.plain_text(), "Name:\t{{client_name}}\nend");

        for paragraph in doc.paragraphs_mut() {
            let text = paragraph.text().replace("{{client_name}}", "Jane Doe");
            paragraph.set_text(&text);
        }

        let reopened = DocxDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.plain_text(), "Name:\tJane Doe\nend");

        let xml = String::from_utf8(reopened.write_main_part().unwrap()).unwrap();
        let tab = xml.find("<w:tab/>").unwrap();
        assert!(tab < xml.find("Jane Doe").unwrap());
        assert!(xml.find("Name:").unwrap() < tab);
        assert_eq!(xml.matches("<w:tab/>").count(), 1);
        assert_eq!(xml.matches("<w:br/>").count(), 1);
        // tab stop definitions are not run content
        assert!(xml.contains("w:pos=\"2880\""));
    }

    #[test]
    fn test_missing_main_part_is_an_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            DocxDocument::from_bytes(&bytes),
            Err(DocxError::MissingPart(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(DocxDocument::from_bytes(b"not a zip").is_err());
    }
}
