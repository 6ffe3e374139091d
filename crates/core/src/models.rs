use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Chunk,
    Paragraph,
}

/// One reconstructed unit of a contract's text. Ids are 1-based and
/// contiguous within a single extraction; `page` is 0 when the layout
/// source carried no page reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: u32,
    pub text: String,
    pub kind: BlockKind,
    pub page: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub full_text: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub session_id: String,
    pub filename: String,
    pub checksum: String,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContract {
    pub fingerprint: DocumentFingerprint,
    pub document: Document,
}

/// One section of the contract outline. The type is recursive and
/// unbounded even though extractions rarely nest past one level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSection {
    pub title: String,
    pub content_summary: String,
    #[serde(default)]
    pub subsections: Vec<DocumentSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub date_description: String,
    pub event: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMap {
    pub structure: Vec<DocumentSection>,
    pub timeline: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub max_chunk_chars: usize,
    pub overlap_chars: usize,
    pub temperature: f32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 8_000,
            overlap_chars: 200,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteMeta {
    pub model: String,
    pub latency_ms: u64,
    pub input_len: usize,
    pub output_len: usize,
    pub chunks: usize,
    pub chunked: bool,
    pub overlap: usize,
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskAnswer {
    pub answer: String,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordFlag {
    pub term: String,
    pub predefined_explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextualFlag {
    pub term: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub clause: String,
    pub keyword_flags: Vec<KeywordFlag>,
    pub contextual_flags: Vec<ContextualFlag>,
    pub risk_summary: String,
}
