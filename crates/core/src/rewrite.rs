use crate::chunking::split_with_overlap;
use crate::error::AiError;
use crate::genai::GenerativeClient;
use crate::models::{AnalysisOptions, RewriteMeta};
use crate::normalize::strip_control;
use std::time::Instant;
use tracing::warn;

const LAYMAN_SYSTEM: &str = "You are an expert plain-language editor specializing in legal and \
    technical documents. Rewrite the input into clear, everyday English while strictly \
    preserving the original meaning, parties, obligations, conditions, dates, and numbers. \
    Do not add or infer facts or change defined terms. Avoid legalese and jargon; keep the \
    tone professional, neutral, and precise. If a technical/defined term must remain, keep \
    it and add a brief parenthetical clarification. If simplification would change meaning, \
    keep wording close to the original. Prioritize accuracy.";

const EMPTY_SEGMENT_PLACEHOLDER: &str = "(No rewrite produced for this segment.)";

fn build_prompt(clean: &str) -> String {
    format!(
        "{LAYMAN_SYSTEM}\n\n\
         Task: Rewrite the following text for a general audience using plain English. \
         Preserve all parties, rights, obligations, amounts, conditions, deadlines, and \
         numbers. If a technical/legal term is critical, keep it and add a short \
         clarification in parentheses. Favor precision over oversimplification. Limit the \
         output to 1-3 concise sentences unless the input is inherently a list.\n\n\
         <text>\n{clean}\n</text>"
    )
}

/// Rewrites contract text into plain language, one bounded chunk at a
/// time, joining the per-chunk rewrites with blank lines so chunk
/// boundaries stay visible to the reader.
pub async fn rewrite_text<C: GenerativeClient>(
    client: &C,
    text: &str,
    temperature: f32,
) -> Result<(String, RewriteMeta), AiError> {
    let started = Instant::now();
    let options = AnalysisOptions::default();
    let cleaned = strip_control(text);

    if cleaned.is_empty() {
        return Ok((
            String::new(),
            RewriteMeta {
                model: client.model_id().to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
                input_len: 0,
                output_len: 0,
                chunks: 0,
                chunked: false,
                overlap: options.overlap_chars,
                max_chars: options.max_chunk_chars,
            },
        ));
    }

    let chunks = split_with_overlap(&cleaned, options.max_chunk_chars, options.overlap_chars);
    let mut outputs = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let prompt = build_prompt(chunk);
        let rewritten = match client.generate(&prompt, temperature).await {
            Ok(output) if !output.trim().is_empty() => output.trim().to_string(),
            Ok(_) => EMPTY_SEGMENT_PLACEHOLDER.to_string(),
            Err(error) => {
                warn!(chunk = index, %error, "rewrite call failed for segment");
                EMPTY_SEGMENT_PLACEHOLDER.to_string()
            }
        };
        outputs.push(rewritten);
    }

    let joined = outputs.join("\n\n").trim().to_string();
    let meta = RewriteMeta {
        model: client.model_id().to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
        input_len: cleaned.chars().count(),
        output_len: joined.chars().count(),
        chunks: chunks.len(),
        chunked: chunks.len() > 1,
        overlap: options.overlap_chars,
        max_chars: options.max_chunk_chars,
    };

    Ok((joined, meta))
}
