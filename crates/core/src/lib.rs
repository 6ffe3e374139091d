pub mod analysis;
pub mod chunking;
pub mod error;
pub mod extract;
pub mod genai;
pub mod hints;
pub mod layout;
pub mod models;
pub mod normalize;
pub mod qa;
pub mod rewrite;
pub mod risk;

pub use analysis::{dedupe_structure, dedupe_timeline, ExtractionKind, MapPipeline};
pub use chunking::{split_with_overlap, Separator, SEPARATORS};
pub use error::{AiError, ExtractError};
pub use extract::{
    discover_contract_files, extract_folder_best_effort, layout_analyzer_from_config,
    resolve_mime, ContractExtractor, ExtractionReport, LayoutAnalyzer, LocalPdfAnalyzer,
    RemoteLayoutAnalyzer, SkippedFile,
};
pub use genai::{
    parse_json_array, parse_json_object, strip_code_fences, GenerativeClient,
    HttpGenerativeClient, DEFAULT_GENERATION_MODEL,
};
pub use hints::{Embedder, HintIndex, HttpEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use layout::{map_to_blocks, resolve_anchor, LayoutDocument, TextAnchor, TextSegment};
pub use models::{
    AnalysisOptions, AskAnswer, Block, BlockKind, ContextualFlag, Document, DocumentFingerprint,
    DocumentMap, DocumentSection, ExtractedContract, KeywordFlag, RewriteMeta, RiskReport,
    TimelineEvent,
};
pub use normalize::{cleanup_text, split_blocks, strip_control};
pub use qa::answer_question;
pub use rewrite::rewrite_text;
pub use risk::{find_keyword_flags, generate_risk_report, RISKY_TERMS};
