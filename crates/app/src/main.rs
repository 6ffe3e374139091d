use chrono::Utc;
use clap::{Parser, Subcommand};
use contract_analysis_core::{
    answer_question, extract_folder_best_effort, generate_risk_report,
    layout_analyzer_from_config, rewrite_text, ContractExtractor, ExtractedContract,
    HttpGenerativeClient, MapPipeline,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "contract-analysis", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Text-generation endpoint URL
    #[arg(long, env = "GENAI_ENDPOINT")]
    genai_endpoint: Option<String>,

    /// Text-generation API key
    #[arg(long, env = "GENAI_API_KEY")]
    genai_api_key: Option<String>,

    /// Text-generation model id
    #[arg(long, env = "GENAI_MODEL")]
    genai_model: Option<String>,

    /// Layout-analysis endpoint URL (offline pdf extraction when unset)
    #[arg(long, env = "LAYOUT_ENDPOINT")]
    layout_endpoint: Option<String>,

    /// Layout-analysis API key
    #[arg(long, env = "LAYOUT_API_KEY")]
    layout_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract full text and blocks from one contract file.
    Extract {
        /// Path to a .pdf/.txt/.docx/image contract file.
        #[arg(long)]
        file: String,
        /// Print the full document as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Extract every supported file under a folder, best effort.
    Batch {
        /// Folder searched recursively for contract files.
        #[arg(long)]
        folder: String,
    },
    /// Extract a contract and map its structure and timeline.
    Map {
        #[arg(long)]
        file: String,
    },
    /// Rewrite a contract into plain language.
    Rewrite {
        #[arg(long)]
        file: String,
        /// Sampling temperature for the rewrite calls.
        #[arg(long, default_value = "0.3")]
        temperature: f32,
    },
    /// Answer a question grounded on one contract.
    Ask {
        #[arg(long)]
        file: String,
        #[arg(long)]
        question: String,
    },
    /// Flag risky terms in a single clause.
    Risk {
        /// Clause text to inspect.
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let Cli {
        command,
        genai_endpoint,
        genai_api_key,
        genai_model,
        layout_endpoint,
        layout_api_key,
    } = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "contract-analysis boot"
    );

    let layout = layout_analyzer_from_config(layout_endpoint.as_deref(), layout_api_key)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let extractor = ContractExtractor::new(layout);

    let generative_client = || -> anyhow::Result<HttpGenerativeClient> {
        let endpoint = genai_endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GENAI_ENDPOINT is not configured"))?;
        HttpGenerativeClient::new(endpoint, genai_api_key.clone(), genai_model.clone())
            .map_err(|error| anyhow::anyhow!(error.to_string()))
    };

    match command {
        Command::Extract { file, json } => {
            let contract = extract_file(&extractor, &file).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&contract)?);
            } else {
                print_contract_summary(&contract);
            }
        }
        Command::Batch { folder } => {
            let report = extract_folder_best_effort(&extractor, Path::new(&folder))
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
            for contract in &report.contracts {
                println!(
                    "{}: {} blocks, checksum {}",
                    contract.fingerprint.filename,
                    contract.document.blocks.len(),
                    &contract.fingerprint.checksum[..12]
                );
            }
            println!(
                "{} extracted, {} skipped at {}",
                report.contracts.len(),
                report.skipped_files.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Map { file } => {
            let client = generative_client()?;
            let contract = extract_file(&extractor, &file).await?;
            let pipeline = MapPipeline::new(&client);
            let map = pipeline.generate_map(&contract.document.full_text).await;
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Command::Rewrite { file, temperature } => {
            let client = generative_client()?;
            let contract = extract_file(&extractor, &file).await?;
            let (rewritten, meta) =
                rewrite_text(&client, &contract.document.full_text, temperature)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{rewritten}");
            info!(
                model = %meta.model,
                latency_ms = meta.latency_ms,
                chunks = meta.chunks,
                input_len = meta.input_len,
                output_len = meta.output_len,
                "rewrite complete"
            );
        }
        Command::Ask { file, question } => {
            let client = generative_client()?;
            let contract = extract_file(&extractor, &file).await?;
            let answer = answer_question(&client, &question, &contract.document.full_text, 0.2)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{}", answer.answer);
        }
        Command::Risk { text } => {
            let client = generative_client()?;
            let report = generate_risk_report(&client, &text).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn extract_file(
    extractor: &ContractExtractor,
    file: &str,
) -> anyhow::Result<ExtractedContract> {
    let path = Path::new(file);
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {file}"))?;
    let bytes = tokio::fs::read(path).await?;

    extractor
        .extract(&bytes, filename, None)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}

fn print_contract_summary(contract: &ExtractedContract) {
    println!(
        "session={} file={} checksum={} extracted_at={}",
        contract.fingerprint.session_id,
        contract.fingerprint.filename,
        &contract.fingerprint.checksum[..12],
        contract.fingerprint.extracted_at.to_rfc3339()
    );
    println!(
        "{} chars of text, {} blocks",
        contract.document.full_text.chars().count(),
        contract.document.blocks.len()
    );
    for block in &contract.document.blocks {
        let preview: String = block.text.chars().take(96).collect();
        println!(
            "[{:>3}] page={} {:?} {}",
            block.id, block.page, block.kind, preview
        );
    }
}
