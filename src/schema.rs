//! The semantic extraction schema shared by models, orchestrator and assembler.
//!
//! A model reply is untrusted input. It is parsed into these types exactly once,
//! by [`parse_extraction`], at the orchestrator boundary. Everything downstream
//! works on the fully typed [`ExtractionResult`] and never sees raw JSON.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "content":   [{ "text": "Hello", "bold": true, "color": "#FF0000", "fontSize": 12 }],
//!   "structure": [{ "type": "heading", "level": 1, "items": ["Title"] },
//!                 { "type": "table", "rows": [["a", "b"], ["c"]] }]
//! }
//! ```
//!
//! Structural nodes are a tagged union keyed by `type`. Serde deserialises each
//! node through a flat raw record and converts it into the closed [`NodeKind`]
//! enum; discriminants outside the known set are kept as [`NodeKind::Other`]
//! so the assembler can degrade them to plain text.

use crate::error::AttemptError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A validated extraction: styled text runs plus structural blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: Vec<ContentItem>,
    pub structure: Vec<StructuralNode>,
}

impl ExtractionResult {
    /// True when the model found nothing at all.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.structure.is_empty()
    }
}

/// One styled run of literal text, independent of document structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContentItem", into = "RawContentItem")]
pub struct ContentItem {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    /// Six hex digits, upper-case, without the leading `#`.
    pub color: Option<String>,
    /// Point size; always finite and positive.
    pub font_size: Option<f64>,
}

impl ContentItem {
    /// A plain run with no styling.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            color: None,
            font_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContentItem {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font_size: Option<f64>,
}

impl TryFrom<RawContentItem> for ContentItem {
    type Error = String;

    fn try_from(raw: RawContentItem) -> Result<Self, Self::Error> {
        if let Some(size) = raw.font_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(format!("fontSize must be a positive number, got {size}"));
            }
        }
        let color = raw.color.as_deref().and_then(|c| {
            let normalised = normalise_hex_color(c);
            if normalised.is_none() {
                warn!("Dropping non-hex color {:?} on content item", c);
            }
            normalised
        });
        Ok(Self {
            text: raw.text,
            bold: raw.bold.unwrap_or(false),
            italic: raw.italic.unwrap_or(false),
            color,
            font_size: raw.font_size,
        })
    }
}

impl From<ContentItem> for RawContentItem {
    fn from(item: ContentItem) -> Self {
        Self {
            text: item.text,
            bold: item.bold.then_some(true),
            italic: item.italic.then_some(true),
            color: item.color.map(|c| format!("#{c}")),
            font_size: item.font_size,
        }
    }
}

/// Accepts `#RGB`, `RGB`, `#RRGGBB` or `RRGGBB`; returns `RRGGBB` upper-case.
fn normalise_hex_color(input: &str) -> Option<String> {
    let hex = input.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(hex.to_ascii_uppercase()),
        3 => Some(
            hex.chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_uppercase(),
        ),
        _ => None,
    }
}

/// One semantic block of document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct StructuralNode {
    pub kind: NodeKind,
    /// Raw alignment hint as reported by the model.
    pub alignment: Option<String>,
    /// Carried for fidelity; never used to reorder output.
    pub position: Option<Position>,
}

impl StructuralNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            alignment: None,
            position: None,
        }
    }
}

/// The closed set of structural kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `level` is the raw value; the assembler normalises it into 1–6.
    Heading { level: Option<i64>, items: Vec<String> },
    Paragraph { items: Vec<String> },
    List { items: Vec<String> },
    Table { rows: Vec<Vec<String>> },
    Image { description: Option<String> },
    SectionBreak { items: Vec<String> },
    PageBreak,
    /// A discriminant the schema does not know.
    Other { kind: String, items: Vec<String> },
}

impl NodeKind {
    /// The wire discriminant for this kind.
    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Heading { .. } => "heading",
            NodeKind::Paragraph { .. } => "paragraph",
            NodeKind::List { .. } => "list",
            NodeKind::Table { .. } => "table",
            NodeKind::Image { .. } => "image",
            NodeKind::SectionBreak { .. } => "section_break",
            NodeKind::PageBreak => "page_break",
            NodeKind::Other { kind, .. } => kind.as_str(),
        }
    }
}

/// Position of a node on the source page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rows: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

impl TryFrom<RawNode> for StructuralNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let items = raw.items.unwrap_or_default();
        let kind = match raw.node_type.trim().to_ascii_lowercase().as_str() {
            "" => return Err("structural node has an empty `type`".to_string()),
            "heading" => NodeKind::Heading {
                level: raw.level,
                items,
            },
            "paragraph" => NodeKind::Paragraph { items },
            "list" => NodeKind::List { items },
            "table" => NodeKind::Table {
                rows: raw.rows.unwrap_or_default(),
            },
            "image" => NodeKind::Image {
                description: raw.image_description,
            },
            "section_break" => NodeKind::SectionBreak { items },
            "page_break" => NodeKind::PageBreak,
            _ => NodeKind::Other {
                kind: raw.node_type,
                items,
            },
        };
        Ok(Self {
            kind,
            alignment: raw.alignment,
            position: raw.position,
        })
    }
}

impl From<StructuralNode> for RawNode {
    fn from(node: StructuralNode) -> Self {
        let mut raw = RawNode {
            node_type: node.kind.type_name().to_string(),
            alignment: node.alignment,
            position: node.position,
            ..Default::default()
        };
        match node.kind {
            NodeKind::Heading { level, items } => {
                raw.level = level;
                raw.items = Some(items);
            }
            NodeKind::Paragraph { items }
            | NodeKind::List { items }
            | NodeKind::SectionBreak { items }
            | NodeKind::Other { items, .. } => raw.items = Some(items),
            NodeKind::Table { rows } => raw.rows = Some(rows),
            NodeKind::Image { description } => raw.image_description = description,
            NodeKind::PageBreak => {}
        }
        raw
    }
}

/// Parse and validate a sanitised model reply.
///
/// Any mismatch with the schema is reported as
/// [`AttemptError::SchemaValidation`], which the orchestrator treats exactly
/// like a transport failure.
pub fn parse_extraction(json: &str) -> Result<ExtractionResult, AttemptError> {
    serde_json::from_str::<ExtractionResult>(json).map_err(|e| AttemptError::SchemaValidation {
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let json = r##"{
            "content": [{"text": "Hi", "bold": true, "color": "#ff0000", "fontSize": 12}],
            "structure": [
                {"type": "heading", "level": 2, "items": ["Intro"], "alignment": "center"},
                {"type": "table", "rows": [["a", "b"], ["c"]]},
                {"type": "image", "imageDescription": "A chart", "position": {"page": 1, "x": 0.5, "y": 0.25}},
                {"type": "page_break"}
            ]
        }"##;
        let result = parse_extraction(json).expect("valid payload");
        assert_eq!(result.content.len(), 1);
        assert!(result.content[0].bold);
        assert_eq!(result.content[0].color.as_deref(), Some("FF0000"));
        assert_eq!(result.content[0].font_size, Some(12.0));
        assert_eq!(
            result.structure[0].kind,
            NodeKind::Heading {
                level: Some(2),
                items: vec!["Intro".into()]
            }
        );
        assert_eq!(result.structure[0].alignment.as_deref(), Some("center"));
        assert_eq!(
            result.structure[1].kind,
            NodeKind::Table {
                rows: vec![vec!["a".into(), "b".into()], vec!["c".into()]]
            }
        );
        assert_eq!(
            result.structure[2].position.and_then(|p| p.page),
            Some(1)
        );
        assert_eq!(result.structure[3].kind, NodeKind::PageBreak);
    }

    #[test]
    fn unknown_discriminant_is_kept() {
        let json = r#"{"content": [], "structure": [{"type": "footnote", "items": ["1. See"]}]}"#;
        let result = parse_extraction(json).expect("valid payload");
        assert_eq!(
            result.structure[0].kind,
            NodeKind::Other {
                kind: "footnote".into(),
                items: vec!["1. See".into()]
            }
        );
    }

    #[test]
    fn missing_top_level_field_is_rejected() {
        let err = parse_extraction(r#"{"content": []}"#).unwrap_err();
        assert!(matches!(err, AttemptError::SchemaValidation { .. }));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let json = r#"{"content": [{"text": 42}], "structure": []}"#;
        assert!(parse_extraction(json).is_err());

        let json = r#"{"content": [], "structure": [{"type": "table", "rows": ["a", "b"]}]}"#;
        assert!(parse_extraction(json).is_err());
    }

    #[test]
    fn non_positive_font_size_is_rejected() {
        let json = r#"{"content": [{"text": "x", "fontSize": 0}], "structure": []}"#;
        let err = parse_extraction(json).unwrap_err();
        match err {
            AttemptError::SchemaValidation { detail } => {
                assert!(detail.contains("fontSize"), "got: {detail}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_node_type_is_rejected() {
        let json = r#"{"content": [], "structure": [{"items": ["x"]}]}"#;
        assert!(parse_extraction(json).is_err());
    }

    #[test]
    fn invalid_color_is_dropped_not_rejected() {
        let json = r#"{"content": [{"text": "x", "color": "red"}], "structure": []}"#;
        let result = parse_extraction(json).expect("valid payload");
        assert_eq!(result.content[0].color, None);
    }

    #[test]
    fn hex_color_normalisation() {
        assert_eq!(normalise_hex_color("#abc").as_deref(), Some("AABBCC"));
        assert_eq!(normalise_hex_color("00ff00").as_deref(), Some("00FF00"));
        assert_eq!(normalise_hex_color("#12345"), None);
        assert_eq!(normalise_hex_color("#GGGGGG"), None);
    }

    #[test]
    fn serialises_back_to_wire_shape() {
        let result = ExtractionResult {
            content: vec![ContentItem::plain("x")],
            structure: vec![StructuralNode::new(NodeKind::Image { description: None })],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["text"], "x");
        assert!(value["content"][0].get("bold").is_none());
        assert_eq!(value["structure"][0]["type"], "image");
    }
}
