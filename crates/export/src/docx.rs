use std::io::Cursor;

use docx_rs::{
    AlignmentType, Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow,
};
use report::Report;

use crate::ExportError;
use crate::markdown::{Block, parse_blocks};

const HEADING_SIZES: [(u8, usize); 3] = [(1, 32), (2, 28), (3, 24)];

pub fn to_docx(report: &Report) -> Result<Vec<u8>, ExportError> {
    let title = format!("{} Company Analysis Report", report.company_name);
    let created = format!("Created: {}", report.generated_at.format("%Y-%m-%d"));

    let mut docx = Docx::new();
    for (level, size) in HEADING_SIZES {
        docx = docx.add_style(
            Style::new(format!("Heading{level}"), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .size(size)
                .bold(),
        );
    }

    docx = docx
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(title).size(40).bold())
                .align(AlignmentType::Center),
        )
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(created))
                .align(AlignmentType::Right),
        );

    for block in parse_blocks(&report.step2_output.text) {
        docx = match block {
            Block::Heading { level, text } => docx.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(text))
                    .style(&format!("Heading{level}")),
            ),
            Block::Paragraph(text) => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            }
            Block::Table { rows } => docx.add_table(table(rows)),
            Block::Blank => docx,
        };
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| ExportError::Docx(e.to_string()))?;
    Ok(buf.into_inner())
}

/// First row is the header and is set in bold.
fn table(rows: Vec<Vec<String>>) -> Table {
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(i, cells)| {
            TableRow::new(
                cells
                    .into_iter()
                    .map(|cell| {
                        let run = Run::new().add_text(cell);
                        let run = if i == 0 { run.bold() } else { run };
                        TableCell::new().add_paragraph(Paragraph::new().add_run(run))
                    })
                    .collect(),
            )
        })
        .collect();
    Table::new(rows)
}
