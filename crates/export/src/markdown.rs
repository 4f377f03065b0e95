//! Line-based reader for the small Markdown subset model output uses.
//!
//! Supported: `#`/`##`/`###` headings, pipe tables (separator rows dropped,
//! `**` removed from cells), one paragraph per non-empty line, blank lines.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Table { rows: Vec<Vec<String>> },
    Paragraph(String),
    Blank,
}

pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();

        if is_table_row(line) {
            if !is_separator_row(line) {
                table.push(split_cells(line));
            }
            continue;
        }
        if !table.is_empty() {
            blocks.push(Block::Table {
                rows: std::mem::take(&mut table),
            });
        }

        if line.is_empty() {
            blocks.push(Block::Blank);
        } else if let Some((level, heading)) = heading(line) {
            blocks.push(Block::Heading {
                level,
                text: heading.to_string(),
            });
        } else {
            blocks.push(Block::Paragraph(line.to_string()));
        }
    }

    if !table.is_empty() {
        blocks.push(Block::Table { rows: table });
    }
    blocks
}

fn heading(line: &str) -> Option<(u8, &str)> {
    [("### ", 3), ("## ", 2), ("# ", 1)]
        .iter()
        .find_map(|(marker, level)| line.strip_prefix(*marker).map(|rest| (*level, rest.trim())))
}

fn is_table_row(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn split_cells(line: &str) -> Vec<String> {
    line[1..line.len() - 1]
        .split('|')
        .map(|cell| cell.trim().replace("**", ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_paragraphs() {
        let blocks = parse_blocks("# Title\n\n## 事業概要\nFirst line\n#### not a heading");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, text: "Title".into() },
                Block::Blank,
                Block::Heading { level: 2, text: "事業概要".into() },
                Block::Paragraph("First line".into()),
                Block::Paragraph("#### not a heading".into()),
            ]
        );
    }

    #[test]
    fn test_table_rows() {
        let text = "| Category | Item |\n| :--- | :--- |\n| **Market** | Growth |\nAfter";
        let blocks = parse_blocks(text);
        assert_eq!(
            blocks,
            vec![
                Block::Table {
                    rows: vec![
                        vec!["Category".into(), "Item".into()],
                        vec!["Market".into(), "Growth".into()],
                    ]
                },
                Block::Paragraph("After".into()),
            ]
        );
    }

    #[test]
    fn test_table_at_end_of_text() {
        let blocks = parse_blocks("|a|b|\n|-|-|\n|1|2|");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::Table { rows } if rows.len() == 2));
    }
}
