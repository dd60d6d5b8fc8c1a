//! Packaging: `Block` sequence → DOCX bytes via `docx-rs`.
//!
//! The packager adds no content of its own apart from the `Heading1`–`Heading6`
//! paragraph styles. Block order, run styling and table shape pass through
//! unchanged.

use crate::error::PackagingError;
use crate::pipeline::assemble::{heading_size, Alignment, Block, TextRun};
use docx_rs::{
    AlignmentType, BreakType, Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow,
};
use std::io::Cursor;
use tracing::debug;

/// Serialise blocks into a complete `.docx` archive.
///
/// The same blocks always produce the same bytes.
pub fn pack(blocks: &[Block]) -> Result<Vec<u8>, PackagingError> {
    let mut ids = ParagraphIds::default();
    let mut docx = with_heading_styles(Docx::new());
    for block in blocks {
        docx = match block {
            Block::Table { rows } => docx.add_table(table(rows, &mut ids)),
            other => docx.add_paragraph(paragraph(other, &mut ids)),
        };
    }

    let mut buffer = Vec::new();
    docx.build()
        .pack(&mut Cursor::new(&mut buffer))
        .map_err(|e| PackagingError(e.to_string()))?;
    debug!("Packed {} blocks into {} bytes", blocks.len(), buffer.len());
    Ok(buffer)
}

/// Per-document paragraph ids.
///
/// `docx-rs` numbers paragraphs from a thread-local counter that keeps
/// running across documents, so every paragraph gets an id from here instead.
#[derive(Default)]
struct ParagraphIds(u32);

impl ParagraphIds {
    fn paragraph(&mut self) -> Paragraph {
        self.0 += 1;
        Paragraph::new().id(format!("{:08X}", self.0))
    }
}

fn with_heading_styles(mut docx: Docx) -> Docx {
    for level in 1..=6u8 {
        docx = docx.add_style(
            Style::new(format!("Heading{level}"), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .size(heading_size(level))
                .bold(),
        );
    }
    docx
}

fn paragraph(block: &Block, ids: &mut ParagraphIds) -> Paragraph {
    match block {
        Block::Heading {
            level,
            run: text,
            alignment,
        } => aligned(
            ids.paragraph()
                .style(&format!("Heading{level}"))
                .add_run(run(text)),
            *alignment,
        ),
        Block::List { runs } => runs
            .iter()
            .fold(ids.paragraph(), |para, r| para.add_run(run(r))),
        Block::ImagePlaceholder { run: text } | Block::Run(text) => {
            ids.paragraph().add_run(run(text))
        }
        Block::PageBreak => ids
            .paragraph()
            .add_run(Run::new().add_break(BreakType::Page)),
        Block::Plain { text, alignment } => {
            aligned(ids.paragraph().add_run(Run::new().add_text(text)), *alignment)
        }
        // Tables are added at document level by `pack`.
        Block::Table { .. } => ids.paragraph(),
    }
}

fn run(text: &TextRun) -> Run {
    let mut r = Run::new().add_text(&text.text);
    if text.bold {
        r = r.bold();
    }
    if text.italic {
        r = r.italic();
    }
    if let Some(ref color) = text.color {
        r = r.color(color);
    }
    if let Some(size) = text.size {
        r = r.size(size);
    }
    if text.break_after {
        r = r.add_break(BreakType::TextWrapping);
    }
    r
}

fn aligned(para: Paragraph, alignment: Option<Alignment>) -> Paragraph {
    match alignment {
        Some(a) => para.align(alignment_type(a)),
        None => para,
    }
}

fn alignment_type(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Right => AlignmentType::Right,
        Alignment::Justify => AlignmentType::Both,
    }
}

/// One row per source row, one cell per source cell; ragged rows stay ragged.
fn table(rows: &[Vec<String>], ids: &mut ParagraphIds) -> Table {
    rows.iter().fold(Table::new(vec![]), |table, row| {
        let cells = row
            .iter()
            .map(|cell| {
                // Word rejects a cell without a paragraph.
                TableCell::new().add_paragraph(ids.paragraph().add_run(Run::new().add_text(cell)))
            })
            .collect();
        table.add_row(TableRow::new(cells))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assemble::assemble;
    use crate::schema::{ContentItem, ExtractionResult, NodeKind, StructuralNode};
    use serde_json::Value;

    /// The document body as JSON, via the `docx-rs` reader.
    fn document(bytes: &[u8]) -> Value {
        let docx = docx_rs::read_docx(bytes).expect("packaged DOCX must be readable");
        serde_json::to_value(&docx.document).expect("document serialises")
    }

    fn first_run(paragraph: &Value) -> &Value {
        &paragraph["data"]["children"][0]["data"]
    }

    #[test]
    fn empty_sequence_is_a_valid_docx() {
        let bytes = pack(&[]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert!(docx_rs::read_docx(&bytes).is_ok());
    }

    #[test]
    fn packing_is_deterministic() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                run: TextRun::plain("Title"),
                alignment: None,
            },
            Block::Plain {
                text: "same".into(),
                alignment: None,
            },
            Block::Table {
                rows: vec![vec!["x".into()]],
            },
        ];
        let first = pack(&blocks).unwrap();
        // Unrelated work in between must not shift anything.
        pack(&[Block::PageBreak, Block::PageBreak]).unwrap();
        assert_eq!(first, pack(&blocks).unwrap());
    }

    #[test]
    fn block_order_and_table_shape_survive() {
        let result = ExtractionResult {
            content: vec![ContentItem::plain("Trailing run")],
            structure: vec![
                StructuralNode::new(NodeKind::Heading {
                    level: Some(2),
                    items: vec!["Quarterly".into()],
                }),
                StructuralNode::new(NodeKind::Table {
                    rows: vec![vec!["a".into(), "b".into()], vec!["c".into()]],
                }),
                StructuralNode::new(NodeKind::List {
                    items: vec!["first".into()],
                }),
                StructuralNode::new(NodeKind::PageBreak),
            ],
        };
        let doc = document(&pack(&assemble(result)).unwrap());
        let children = doc["children"].as_array().unwrap();
        let kinds: Vec<&str> = children
            .iter()
            .map(|c| c["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            ["paragraph", "table", "paragraph", "paragraph", "paragraph"]
        );

        assert_eq!(first_run(&children[0])["children"][0]["data"]["text"], "Quarterly");
        assert!(children[0].to_string().contains("Heading2"));

        let rows = children[1]["data"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["data"]["cells"].as_array().unwrap().len(), 2);
        assert_eq!(rows[1]["data"]["cells"].as_array().unwrap().len(), 1);
        let table_json = children[1].to_string();
        let (a, b, c) = (
            table_json.find("\"a\"").unwrap(),
            table_json.find("\"b\"").unwrap(),
            table_json.find("\"c\"").unwrap(),
        );
        assert!(a < b && b < c);

        assert!(children[2].to_string().contains("• first"));
        assert!(children[3].to_string().contains("\"breakType\":\"page\""));
        assert_eq!(first_run(&children[4])["children"][0]["data"]["text"], "Trailing run");
    }

    #[test]
    fn run_styling_survives() {
        let styled = TextRun {
            text: "Styled".into(),
            bold: true,
            italic: true,
            color: Some("FF0000".into()),
            size: Some(28),
            break_after: false,
        };
        let doc = document(&pack(&[Block::Run(styled), Block::Run(TextRun::plain("Bare"))]).unwrap());
        let children = doc["children"].as_array().unwrap();

        let props = &first_run(&children[0])["runProperty"];
        assert_eq!(props["bold"], true);
        assert_eq!(props["italic"], true);
        assert_eq!(props["color"], "FF0000");
        assert_eq!(props["sz"], 28);

        let bare = &first_run(&children[1])["runProperty"];
        assert!(bare.get("bold").is_none());
        assert!(bare.get("italic").is_none());
        assert!(bare.get("color").is_none());
        assert!(bare.get("sz").is_none());
    }

    #[test]
    fn heading_styles_are_declared() {
        let bytes = pack(&[]).unwrap();
        let docx = docx_rs::read_docx(&bytes).unwrap();
        let styles = serde_json::to_string(&docx.styles).unwrap();
        for level in 1..=6 {
            assert!(styles.contains(&format!("Heading{level}")), "Heading{level}");
        }
    }
}
