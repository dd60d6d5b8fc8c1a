//! Assembly: validated `ExtractionResult` → ordered `Block` sequence.
//!
//! Assembly is pure and total. Every structural kind, including ones the
//! schema does not know, maps to zero or more blocks; nothing here can fail.
//!
//! ## Ordering
//!
//! ```text
//! structure[0] … structure[n-1]   content[0] … content[m-1]
//! └──── structural blocks ────┘   └──── one run block each ──┘
//! ```
//!
//! Node `position` metadata is carried by the schema but never used to
//! interleave the two channels; a styled content run always lands after the
//! last structural block.

use crate::schema::{ContentItem, ExtractionResult, NodeKind, StructuralNode};

/// Default run size in half-points (11 pt).
pub const DEFAULT_RUN_SIZE: usize = 22;

/// Grey used for image placeholders.
pub const IMAGE_PLACEHOLDER_COLOR: &str = "666666";

/// Half-point sizes for heading levels 1–6.
const HEADING_SIZES: [usize; 6] = [32, 28, 26, 24, 22, 20];

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Parse a model-reported hint. Unknown values yield `None`.
    pub fn parse(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Alignment::Left),
            "center" | "centre" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "justify" | "justified" | "both" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// One styled run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    /// `RRGGBB`.
    pub color: Option<String>,
    /// Half-points.
    pub size: Option<usize>,
    /// Emit a line break after the text.
    pub break_after: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            color: None,
            size: None,
            break_after: false,
        }
    }
}

/// A rendering-ready element of the output document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        /// Always within 1–6.
        level: u8,
        run: TextRun,
        alignment: Option<Alignment>,
    },
    /// A bulleted block: one run per item, each followed by a line break.
    List { runs: Vec<TextRun> },
    /// Rows mirror the source exactly; ragged rows are not padded.
    Table { rows: Vec<Vec<String>> },
    ImagePlaceholder { run: TextRun },
    PageBreak,
    /// Plain text paragraph, the default for paragraphs, section breaks and
    /// kinds the schema does not know.
    Plain {
        text: String,
        alignment: Option<Alignment>,
    },
    /// One styled content run in its own paragraph.
    Run(TextRun),
}

/// Clamp a raw heading level into 1–6; anything else becomes 1.
pub fn heading_level(raw: Option<i64>) -> u8 {
    match raw {
        Some(level @ 1..=6) => level as u8,
        _ => 1,
    }
}

/// Half-point size for a normalised heading level.
pub fn heading_size(level: u8) -> usize {
    let idx = usize::from(level.clamp(1, 6)) - 1;
    HEADING_SIZES[idx]
}

/// Points → half-points, rounded.
pub fn half_points(points: f64) -> usize {
    (points * 2.0).round().max(1.0) as usize
}

/// Turn an extraction into blocks: structure first, then the content runs.
pub fn assemble(result: ExtractionResult) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(result.structure.len() + result.content.len());
    for node in result.structure {
        if let Some(block) = structural_block(node) {
            blocks.push(block);
        }
    }
    blocks.extend(result.content.into_iter().map(content_block));
    blocks
}

fn structural_block(node: StructuralNode) -> Option<Block> {
    let alignment = node.alignment.as_deref().and_then(Alignment::parse);
    match node.kind {
        NodeKind::Heading { level, items } => {
            let level = heading_level(level);
            Some(Block::Heading {
                level,
                run: TextRun {
                    bold: true,
                    size: Some(heading_size(level)),
                    ..TextRun::plain(join_items(&items))
                },
                alignment,
            })
        }
        NodeKind::List { items } => Some(Block::List {
            runs: items
                .into_iter()
                .map(|item| TextRun {
                    break_after: true,
                    ..TextRun::plain(format!("• {item}"))
                })
                .collect(),
        }),
        NodeKind::Table { rows } if rows.is_empty() => None,
        NodeKind::Table { rows } => Some(Block::Table { rows }),
        NodeKind::Image { description } => Some(Block::ImagePlaceholder {
            run: TextRun {
                italic: true,
                color: Some(IMAGE_PLACEHOLDER_COLOR.to_string()),
                ..TextRun::plain(format!(
                    "[Image: {}]",
                    description.as_deref().unwrap_or("Visual content")
                ))
            },
        }),
        NodeKind::PageBreak => Some(Block::PageBreak),
        NodeKind::Paragraph { items }
        | NodeKind::SectionBreak { items }
        | NodeKind::Other { items, .. } => Some(Block::Plain {
            text: join_items(&items),
            alignment,
        }),
    }
}

fn content_block(item: ContentItem) -> Block {
    Block::Run(TextRun {
        text: item.text,
        bold: item.bold,
        italic: item.italic,
        color: item.color,
        size: Some(item.font_size.map_or(DEFAULT_RUN_SIZE, half_points)),
        break_after: false,
    })
}

fn join_items(items: &[String]) -> String {
    items.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind) -> StructuralNode {
        StructuralNode::new(kind)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn heading_levels_are_normalised() {
        assert_eq!(heading_level(Some(0)), 1);
        assert_eq!(heading_level(Some(7)), 1);
        assert_eq!(heading_level(Some(-2)), 1);
        assert_eq!(heading_level(None), 1);
        assert_eq!(heading_level(Some(3)), 3);
        assert_eq!(heading_size(1), 32);
        assert_eq!(heading_size(6), 20);
    }

    #[test]
    fn structure_precedes_content() {
        let result = ExtractionResult {
            content: vec![ContentItem::plain("a"), ContentItem::plain("b")],
            structure: vec![
                node(NodeKind::PageBreak),
                node(NodeKind::Table { rows: vec![] }),
                node(NodeKind::Paragraph {
                    items: strings(&["p"]),
                }),
            ],
        };
        let blocks = assemble(result);
        // The empty table yields nothing.
        assert_eq!(blocks.len(), 2 + 2);
        assert_eq!(blocks[0], Block::PageBreak);
        assert!(matches!(blocks[1], Block::Plain { .. }));
        assert!(matches!(blocks[2], Block::Run(ref r) if r.text == "a"));
        assert!(matches!(blocks[3], Block::Run(ref r) if r.text == "b"));
    }

    #[test]
    fn heading_block() {
        let mut n = node(NodeKind::Heading {
            level: Some(9),
            items: strings(&["Annual", "Report"]),
        });
        n.alignment = Some("Center".into());
        let blocks = assemble(ExtractionResult {
            content: vec![],
            structure: vec![n],
        });
        match &blocks[0] {
            Block::Heading {
                level,
                run,
                alignment,
            } => {
                assert_eq!(*level, 1);
                assert_eq!(run.text, "Annual Report");
                assert!(run.bold);
                assert_eq!(run.size, Some(32));
                assert_eq!(*alignment, Some(Alignment::Center));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn list_items_are_bulleted_in_order() {
        let blocks = assemble(ExtractionResult {
            content: vec![],
            structure: vec![node(NodeKind::List {
                items: strings(&["one", "two"]),
            })],
        });
        let Block::List { runs } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "• one");
        assert_eq!(runs[1].text, "• two");
        assert!(runs.iter().all(|r| r.break_after));
    }

    #[test]
    fn ragged_table_keeps_its_shape() {
        let rows = vec![strings(&["a", "b"]), strings(&["c"])];
        let blocks = assemble(ExtractionResult {
            content: vec![],
            structure: vec![node(NodeKind::Table { rows: rows.clone() })],
        });
        let Block::Table { rows: got } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].len(), 2);
        assert_eq!(got[1].len(), 1);
        assert_eq!(*got, rows);
    }

    #[test]
    fn image_placeholder() {
        let blocks = assemble(ExtractionResult {
            content: vec![],
            structure: vec![
                node(NodeKind::Image {
                    description: Some("Bar chart".into()),
                }),
                node(NodeKind::Image { description: None }),
            ],
        });
        let Block::ImagePlaceholder { run } = &blocks[0] else {
            panic!("expected image placeholder");
        };
        assert_eq!(run.text, "[Image: Bar chart]");
        assert!(run.italic);
        assert_eq!(run.color.as_deref(), Some("666666"));
        let Block::ImagePlaceholder { run } = &blocks[1] else {
            panic!("expected image placeholder");
        };
        assert_eq!(run.text, "[Image: Visual content]");
    }

    #[test]
    fn unknown_kind_degrades_to_plain_text() {
        let blocks = assemble(ExtractionResult {
            content: vec![],
            structure: vec![
                node(NodeKind::Other {
                    kind: "footnote".into(),
                    items: strings(&["see", "page 4"]),
                }),
                node(NodeKind::Other {
                    kind: "sidebar".into(),
                    items: vec![],
                }),
                node(NodeKind::SectionBreak { items: vec![] }),
            ],
        });
        assert_eq!(
            blocks,
            vec![
                Block::Plain {
                    text: "see page 4".into(),
                    alignment: None
                },
                Block::Plain {
                    text: String::new(),
                    alignment: None
                },
                Block::Plain {
                    text: String::new(),
                    alignment: None
                },
            ]
        );
    }

    #[test]
    fn content_runs_convert_points() {
        let item = ContentItem {
            text: "x".into(),
            bold: true,
            italic: false,
            color: Some("FF0000".into()),
            font_size: Some(10.5),
        };
        let blocks = assemble(ExtractionResult {
            content: vec![item, ContentItem::plain("y")],
            structure: vec![],
        });
        let Block::Run(run) = &blocks[0] else {
            panic!("expected run");
        };
        assert_eq!(run.size, Some(21));
        assert!(run.bold);
        assert_eq!(run.color.as_deref(), Some("FF0000"));
        let Block::Run(run) = &blocks[1] else {
            panic!("expected run");
        };
        assert_eq!(run.size, Some(DEFAULT_RUN_SIZE));
    }

    #[test]
    fn alignment_parsing() {
        assert_eq!(Alignment::parse("JUSTIFY"), Some(Alignment::Justify));
        assert_eq!(Alignment::parse(" right "), Some(Alignment::Right));
        assert_eq!(Alignment::parse("diagonal"), None);
    }

    #[test]
    fn empty_result_yields_no_blocks() {
        assert!(assemble(ExtractionResult::default()).is_empty());
    }
}
