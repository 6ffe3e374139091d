use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("layout analysis failed: {0}")]
    Layout(String),

    #[error("docx conversion failed: {0}")]
    DocxConvert(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("document has no readable text: {0}")]
    EmptyDocument(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("service is not configured: {0}")]
    NotConfigured(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("empty input: {0}")]
    EmptyInput(String),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
