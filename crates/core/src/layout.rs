use crate::models::{Block, BlockKind, Document};
use crate::normalize::{cleanup_text, split_blocks};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Layout-analysis response for one document. Exactly one of the three
/// capability levels is usually populated; the mapper degrades through
/// them in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub text: String,
    /// Pre-chunked regions carrying their own text.
    #[serde(default)]
    pub chunks: Vec<LayoutChunk>,
    /// Pages of paragraph/block regions addressed by text anchors.
    #[serde(default)]
    pub pages: Vec<LayoutPage>,
}

impl LayoutDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutChunk {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "page_ref", alias = "page_number")]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutPage {
    #[serde(default)]
    pub paragraphs: Vec<LayoutRegion>,
    #[serde(default)]
    pub blocks: Vec<LayoutRegion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutRegion {
    #[serde(default)]
    pub text_anchor: Option<TextAnchor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextAnchor {
    #[serde(default, alias = "text_segments")]
    pub segments: Vec<TextSegment>,
}

/// One byte-offset range into the document's full text. Some layout
/// backends serialize 64-bit offsets as JSON strings, so both forms are
/// accepted; anything non-numeric resolves to a skipped segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSegment {
    #[serde(default, deserialize_with = "lenient_index")]
    pub start_index: Option<usize>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub end_index: Option<usize>,
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_u64().map(|n| n as usize),
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    })
}

/// Concatenates the full-text slices an anchor points at, skipping
/// segments whose indices are missing, out of range, or not on a
/// character boundary.
pub fn resolve_anchor(full_text: &str, anchor: &TextAnchor) -> String {
    let mut resolved = String::new();
    for segment in &anchor.segments {
        let start = segment.start_index.unwrap_or(0);
        let end = segment.end_index.unwrap_or(0);
        if end <= start {
            continue;
        }
        if let Some(slice) = full_text.get(start..end) {
            resolved.push_str(slice);
        }
    }
    resolved
}

struct BlockDraft {
    text: String,
    kind: BlockKind,
    page: u32,
}

/// One named degradation level. The order of [`BLOCK_STRATEGIES`] is the
/// contract: a strategy runs only when every strategy before it produced
/// zero blocks.
pub struct BlockStrategy {
    pub name: &'static str,
    run: fn(&LayoutDocument) -> Vec<BlockDraft>,
}

pub const BLOCK_STRATEGIES: [BlockStrategy; 3] = [
    BlockStrategy {
        name: "chunked",
        run: chunked_blocks,
    },
    BlockStrategy {
        name: "pages",
        run: page_blocks,
    },
    BlockStrategy {
        name: "text",
        run: text_blocks,
    },
];

fn chunked_blocks(layout: &LayoutDocument) -> Vec<BlockDraft> {
    layout
        .chunks
        .iter()
        .filter_map(|chunk| {
            let raw = chunk
                .text
                .as_deref()
                .or(chunk.content.as_deref())
                .unwrap_or_default();
            let text = cleanup_text(raw);
            if text.is_empty() {
                return None;
            }
            Some(BlockDraft {
                text,
                kind: BlockKind::Chunk,
                page: chunk.page.unwrap_or(0),
            })
        })
        .collect()
}

fn page_blocks(layout: &LayoutDocument) -> Vec<BlockDraft> {
    let mut drafts = Vec::new();
    for (page_index, page) in layout.pages.iter().enumerate() {
        let regions = if page.paragraphs.is_empty() {
            &page.blocks
        } else {
            &page.paragraphs
        };
        for region in regions {
            let raw = region
                .text_anchor
                .as_ref()
                .map(|anchor| resolve_anchor(&layout.text, anchor))
                .unwrap_or_default();
            let text = cleanup_text(&raw);
            if text.is_empty() {
                continue;
            }
            drafts.push(BlockDraft {
                text,
                kind: BlockKind::Paragraph,
                page: page_index as u32 + 1,
            });
        }
    }
    drafts
}

fn text_blocks(layout: &LayoutDocument) -> Vec<BlockDraft> {
    split_blocks(&layout.text)
        .into_iter()
        .map(|text| BlockDraft {
            text,
            kind: BlockKind::Paragraph,
            page: 1,
        })
        .collect()
}

/// Reconstructs ordered text blocks from whichever layout capability the
/// source actually delivered. Ids are assigned 1-based across the winning
/// strategy's output.
pub fn map_to_blocks(layout: &LayoutDocument) -> Document {
    for strategy in &BLOCK_STRATEGIES {
        let drafts = (strategy.run)(layout);
        if drafts.is_empty() {
            debug!(strategy = strategy.name, "layout strategy produced no blocks");
            continue;
        }
        return assemble(&layout.text, drafts);
    }

    Document {
        full_text: layout.text.clone(),
        blocks: Vec::new(),
    }
}

/// Maps bare text with no layout information through the last-resort
/// strategy. Used for `.txt` uploads and every decode-as-text fallback.
pub fn document_from_text(text: &str) -> Document {
    map_to_blocks(&LayoutDocument::from_text(text))
}

fn assemble(full_text: &str, drafts: Vec<BlockDraft>) -> Document {
    let blocks = drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| Block {
            id: index as u32 + 1,
            text: draft.text,
            kind: draft.kind,
            page: draft.page,
        })
        .collect();

    Document {
        full_text: full_text.to_string(),
        blocks,
    }
}
