use crate::error::ExtractError;
use crate::layout::{
    document_from_text, map_to_blocks, LayoutDocument, LayoutPage, LayoutRegion, TextAnchor,
    TextSegment,
};
use crate::models::{Document, DocumentFingerprint, ExtractedContract};
use crate::normalize::strip_control;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;
use walkdir::WalkDir;

pub const PDF_MIME: &str = "application/pdf";
pub const TXT_MIME: &str = "text/plain";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const SUPPORTED_IMAGE_MIMES: [&str; 4] = ["image/jpeg", "image/png", "image/tiff", "image/gif"];

pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["pdf", "txt", "docx", "jpg", "jpeg", "png", "tif", "tiff"];

/// Resolves the MIME type primarily from the file extension, falling
/// back to whatever the caller declared.
pub fn resolve_mime(filename: &str, declared_content_type: Option<&str>) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "pdf" => PDF_MIME.to_string(),
        "txt" => TXT_MIME.to_string(),
        "docx" => DOCX_MIME.to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        _ => declared_content_type.unwrap_or_default().to_lowercase(),
    }
}

/// Seam for the external layout-analysis service: raw bytes plus a MIME
/// type in, full text plus layout in.
#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    async fn analyze_layout(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<LayoutDocument, ExtractError>;
}

#[derive(Debug, Clone, Serialize)]
struct LayoutRequest<'a> {
    content_base64: String,
    mime_type: &'a str,
}

/// HTTP client for a hosted layout-analysis endpoint.
pub struct RemoteLayoutAnalyzer {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
}

impl RemoteLayoutAnalyzer {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, ExtractError> {
        let endpoint = Url::parse(endpoint).map_err(|error| {
            ExtractError::InvalidArgument(format!("layout endpoint {endpoint}: {error}"))
        })?;
        Ok(Self {
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client: Client::new(),
        })
    }
}

#[async_trait]
impl LayoutAnalyzer for RemoteLayoutAnalyzer {
    async fn analyze_layout(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<LayoutDocument, ExtractError> {
        let payload = LayoutRequest {
            content_base64: STANDARD.encode(bytes),
            mime_type,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ExtractError::Layout(format!(
                "layout request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Offline analyzer for PDFs: per-page text via lopdf, exposed as a
/// page/anchor layout so the block mapper takes the same path it would
/// with a hosted layout service.
#[derive(Default)]
pub struct LocalPdfAnalyzer;

#[async_trait]
impl LayoutAnalyzer for LocalPdfAnalyzer {
    async fn analyze_layout(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<LayoutDocument, ExtractError> {
        if mime_type != PDF_MIME {
            return Err(ExtractError::Layout(format!(
                "local analyzer only reads pdf, got {mime_type}"
            )));
        }

        let document = lopdf::Document::load_mem(bytes)
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut full_text = String::new();
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            if !full_text.is_empty() {
                full_text.push_str("\n\n");
            }
            let start = full_text.len();
            full_text.push_str(text);
            let end = full_text.len();

            pages.push(LayoutPage {
                paragraphs: vec![LayoutRegion {
                    text_anchor: Some(TextAnchor {
                        segments: vec![TextSegment {
                            start_index: Some(start),
                            end_index: Some(end),
                        }],
                    }),
                }],
                blocks: Vec::new(),
            });
        }

        if pages.is_empty() {
            return Err(ExtractError::PdfParse(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(LayoutDocument {
            text: full_text,
            chunks: Vec::new(),
            pages,
        })
    }
}

/// Picks the remote analyzer when an endpoint is configured, else the
/// offline lopdf analyzer.
pub fn layout_analyzer_from_config(
    endpoint: Option<&str>,
    api_key: Option<String>,
) -> Result<Box<dyn LayoutAnalyzer>, ExtractError> {
    match endpoint {
        Some(endpoint) if !endpoint.trim().is_empty() => Ok(Box::new(RemoteLayoutAnalyzer::new(
            endpoint.trim(),
            api_key,
        )?)),
        _ => Ok(Box::new(LocalPdfAnalyzer)),
    }
}

/// Extraction entry point: bytes in, full text + blocks + fingerprint
/// out. Everything that can degrade does; the only fatal outcome is a
/// document with no decodable text at all.
pub struct ContractExtractor {
    layout: Box<dyn LayoutAnalyzer>,
}

impl ContractExtractor {
    pub fn new(layout: Box<dyn LayoutAnalyzer>) -> Self {
        Self { layout }
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
        declared_content_type: Option<&str>,
    ) -> Result<ExtractedContract, ExtractError> {
        if filename.trim().is_empty() {
            return Err(ExtractError::MissingFileName(
                "upload carried no filename".to_string(),
            ));
        }

        let mime = resolve_mime(filename, declared_content_type);
        let document = if mime == TXT_MIME {
            decode_text_document(bytes, filename)?
        } else if mime == DOCX_MIME {
            self.extract_docx(bytes, filename).await?
        } else if mime == PDF_MIME || SUPPORTED_IMAGE_MIMES.contains(&mime.as_str()) {
            self.extract_with_layout(bytes, &mime, filename).await?
        } else {
            // Unknown type: attempt pdf layout analysis, which itself
            // degrades to raw-text decoding.
            self.extract_with_layout(bytes, PDF_MIME, filename).await?
        };

        if document.full_text.trim().is_empty() && document.blocks.is_empty() {
            return Err(ExtractError::EmptyDocument(filename.to_string()));
        }

        Ok(ExtractedContract {
            fingerprint: fingerprint(bytes, filename),
            document,
        })
    }

    async fn extract_with_layout(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<Document, ExtractError> {
        match self.layout.analyze_layout(bytes, mime_type).await {
            Ok(layout) => Ok(map_to_blocks(&layout)),
            Err(error) => {
                warn!(file = filename, %error, "layout analysis failed, decoding raw bytes as text");
                decode_text_document(bytes, filename)
            }
        }
    }

    async fn extract_docx(&self, bytes: &[u8], filename: &str) -> Result<Document, ExtractError> {
        match docx_to_pdf(bytes).await {
            Ok(pdf_bytes) => match self.layout.analyze_layout(&pdf_bytes, PDF_MIME).await {
                Ok(layout) => return Ok(map_to_blocks(&layout)),
                Err(error) => {
                    warn!(file = filename, %error, "layout analysis of converted docx failed");
                }
            },
            Err(error) => {
                warn!(file = filename, %error, "docx conversion failed, using text fallback");
            }
        }

        let text = docx_text_fallback(bytes).await?;
        Ok(document_from_text(&text))
    }
}

fn decode_text_document(bytes: &[u8], filename: &str) -> Result<Document, ExtractError> {
    let text = String::from_utf8_lossy(bytes);
    if strip_control(&text).is_empty() {
        return Err(ExtractError::EmptyDocument(filename.to_string()));
    }
    Ok(document_from_text(&text))
}

fn fingerprint(bytes: &[u8], filename: &str) -> DocumentFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);

    DocumentFingerprint {
        session_id: Uuid::new_v4().to_string(),
        filename: filename.to_string(),
        checksum: format!("{:x}", hasher.finalize()),
        extracted_at: Utc::now(),
    }
}

/// Converter programs tried in order for `.docx` uploads. Both take the
/// same headless-conversion arguments; the first one that produces a pdf
/// wins.
const DOCX_CONVERTERS: [&str; 2] = ["soffice", "libreoffice"];

async fn docx_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let workdir = std::env::temp_dir().join(format!("contract-docx-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&workdir).await?;
    let input = workdir.join("input.docx");
    let expected = workdir.join("input.pdf");
    tokio::fs::write(&input, bytes).await?;

    let mut last_failure = String::from("no converter available");
    for program in DOCX_CONVERTERS {
        let run = Command::new(program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&workdir)
            .arg(&input)
            .output()
            .await;

        match run {
            Ok(output) if output.status.success() => match tokio::fs::read(&expected).await {
                Ok(pdf_bytes) => {
                    let _ = tokio::fs::remove_dir_all(&workdir).await;
                    return Ok(pdf_bytes);
                }
                Err(error) => {
                    last_failure = format!("{program} produced no pdf output: {error}");
                }
            },
            Ok(output) => {
                last_failure = format!("{program} exited with {}", output.status);
            }
            Err(error) => {
                last_failure = format!("{program} could not run: {error}");
            }
        }
        debug!(converter = program, failure = %last_failure, "docx converter failed");
    }

    let _ = tokio::fs::remove_dir_all(&workdir).await;
    Err(ExtractError::DocxConvert(last_failure))
}

/// Last resort for `.docx`: read the paragraph text straight out of the
/// package's `word/document.xml`, losing layout but keeping the words.
async fn docx_text_fallback(bytes: &[u8]) -> Result<String, ExtractError> {
    let workdir = std::env::temp_dir().join(format!("contract-docx-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&workdir).await?;
    let input = workdir.join("input.docx");
    tokio::fs::write(&input, bytes).await?;

    let run = Command::new("unzip")
        .arg("-p")
        .arg(&input)
        .arg("word/document.xml")
        .output()
        .await;
    let _ = tokio::fs::remove_dir_all(&workdir).await;

    let output = run.map_err(|error| {
        ExtractError::DocxConvert(format!("unzip could not run: {error}"))
    })?;
    if !output.status.success() {
        return Err(ExtractError::DocxConvert(format!(
            "unzip exited with {}",
            output.status
        )));
    }

    let xml = String::from_utf8_lossy(&output.stdout);
    let text = paragraphs_from_docx_xml(&xml);
    if text.trim().is_empty() {
        return Err(ExtractError::DocxConvert(
            "document.xml contained no paragraph text".to_string(),
        ));
    }
    Ok(text)
}

fn paragraphs_from_docx_xml(xml: &str) -> String {
    let text_run = Regex::new(r"<w:t[^>]*>([^<]*)</w:t>").expect("docx run pattern is valid");

    let mut paragraphs = Vec::new();
    for paragraph in xml.split("</w:p>") {
        let mut line = String::new();
        for capture in text_run.captures_iter(paragraph) {
            line.push_str(&unescape_xml(&capture[1]));
        }
        let line = line.trim().to_string();
        if !line.is_empty() {
            paragraphs.push(line);
        }
    }
    paragraphs.join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn discover_contract_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            });

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct ExtractionReport {
    pub contracts: Vec<ExtractedContract>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Extracts every supported file under `folder`, collecting failures
/// into a report instead of aborting the batch.
pub async fn extract_folder_best_effort(
    extractor: &ContractExtractor,
    folder: &Path,
) -> Result<ExtractionReport, ExtractError> {
    let files = discover_contract_files(folder);
    if files.is_empty() {
        return Err(ExtractError::InvalidArgument(format!(
            "no supported contract files found in {}",
            folder.display()
        )));
    }

    let mut contracts = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let result = async {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    ExtractError::MissingFileName(format!(
                        "path missing filename: {}",
                        path.display()
                    ))
                })?;
            let bytes = tokio::fs::read(&path).await?;
            extractor.extract(&bytes, filename, None).await
        }
        .await;

        match result {
            Ok(contract) => contracts.push(contract),
            Err(error) => skipped_files.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(ExtractionReport {
        contracts,
        skipped_files,
    })
}
