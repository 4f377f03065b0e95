use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use report::Report;
use tracing::warn;

use crate::ExportError;
use crate::markdown::{Block, parse_blocks};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const BODY_SIZE: i64 = 10;
const FOOTNOTE: &str = "[Non-ASCII characters were replaced with '?'. Use the Word or JSON export for the full text.]";

/// Replace every non-ASCII character with `?`. The flag tells whether anything was replaced.
pub fn ascii_fallback(text: &str) -> (String, bool) {
    let mut replaced = false;
    let out = text
        .chars()
        .map(|c| {
            if c.is_ascii() {
                c
            } else {
                replaced = true;
                '?'
            }
        })
        .collect();
    (out, replaced)
}

/// Greedy word wrap on spaces; words longer than a line are split.
pub fn wrap_line(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let mut word = word;
        while let Some((idx, _)) = word.char_indices().nth(max_chars) {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            lines.push(word[..idx].to_string());
            word = &word[idx..];
        }

        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Collects text operations and starts a new page when the cursor reaches the bottom margin.
struct PageWriter {
    finished: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: i64,
    replaced: bool,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
            replaced: false,
        }
    }

    fn line_height(size: i64) -> i64 {
        size * 3 / 2
    }

    fn chars_per_line(size: i64) -> usize {
        // Helvetica averages about half an em per character.
        ((PAGE_WIDTH - 2 * MARGIN) * 2 / size) as usize
    }

    fn gap(&mut self, points: i64) {
        self.y -= points;
    }

    fn text(&mut self, text: &str, size: i64) {
        let (ascii, replaced) = ascii_fallback(text);
        self.replaced |= replaced;

        for line in wrap_line(&ascii, Self::chars_per_line(size)) {
            if self.y - Self::line_height(size) < MARGIN {
                self.finished.push(std::mem::take(&mut self.current));
                self.y = PAGE_HEIGHT - MARGIN;
            }
            self.y -= Self::line_height(size);

            let ops = &mut self.current;
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
            ops.push(Operation::new("Td", vec![MARGIN.into(), self.y.into()]));
            ops.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            ops.push(Operation::new("ET", vec![]));
        }
    }

    fn into_pages(mut self) -> Vec<Vec<Operation>> {
        self.finished.push(self.current);
        self.finished
    }
}

pub fn to_pdf(report: &Report) -> Result<Vec<u8>, ExportError> {
    match build_pdf(report) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!(company = %report.company_name, error = %e, "PDF export failed, writing fallback");
            fallback_pdf(&e.to_string())
        }
    }
}

fn build_pdf(report: &Report) -> Result<Vec<u8>, ExportError> {
    let mut writer = PageWriter::new();

    writer.text("Company Analysis Report", 18);
    writer.text(&format!("Company: {}", report.company_name), 11);
    writer.text(
        &format!("Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M UTC")),
        11,
    );
    writer.gap(8);

    for block in parse_blocks(&report.step2_output.text) {
        match block {
            Block::Heading { level, text } => {
                let size = match level {
                    1 => 14,
                    2 => 12,
                    _ => 11,
                };
                writer.gap(4);
                writer.text(&text, size);
            }
            Block::Paragraph(text) => writer.text(&text, BODY_SIZE),
            Block::Blank => writer.gap(4),
            Block::Table { .. } => {}
        }
    }

    if writer.replaced {
        writer.gap(8);
        writer.text(FOOTNOTE, 8);
    }

    write_document(writer.into_pages())
}

/// Single page explaining why the real export could not be produced.
fn fallback_pdf(reason: &str) -> Result<Vec<u8>, ExportError> {
    let mut writer = PageWriter::new();
    writer.text("Report Generation Error", 12);
    writer.text(
        "The PDF version of this report could not be produced. Use the Word or JSON export instead.",
        BODY_SIZE,
    );
    writer.text(&reason.chars().take(100).collect::<String>(), BODY_SIZE);
    write_document(writer.into_pages())
}

fn write_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(bytes)
}
