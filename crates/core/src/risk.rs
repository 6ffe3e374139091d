use crate::genai::{parse_json_object, GenerativeClient};
use crate::models::{ContextualFlag, KeywordFlag, RiskReport};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Static lookup of risky contract terms and their canned explanations.
/// Matching is keyword-based on normalized text; anything subtler is the
/// contextual pass's job.
pub const RISKY_TERMS: [(&str, &str); 56] = [
    ("indemnify", "Potential liability concern"),
    ("penalty", "May indicate financial risk"),
    ("late fee", "Additional charges if payment is delayed"),
    ("breach", "Violation of contract terms"),
    ("terminate", "Contract termination risk"),
    ("liability", "Potential responsibility for loss or damage"),
    ("damages", "Risk of financial penalty"),
    ("dispute resolution", "May require arbitration or litigation"),
    ("arbitration", "Binding dispute resolution mechanism"),
    ("waiver", "Possible loss of rights"),
    ("default", "Failure to fulfill obligations"),
    ("deposit forfeiture", "Loss of security deposit"),
    ("cancellation", "Termination rights and penalties"),
    ("force majeure", "Excused non-performance due to extraordinary events"),
    ("confidentiality breach", "Risk of exposing sensitive information"),
    ("extension denial", "No right to extend contract"),
    ("renewal obligation", "Mandatory contract renewal terms"),
    ("limitation of liability", "Caps on damages recoverable"),
    ("damages cap", "Limit on financial liability"),
    ("governing law", "Jurisdiction controlling contract interpretation"),
    ("jurisdiction", "Legal authority over disputes"),
    ("subrogation", "Rights to claim from third parties"),
    ("hold harmless", "Agreement to assume liability"),
    ("insurance requirements", "Required insurance coverage to mitigate risk"),
    ("non-compete", "Restricts certain business activities"),
    ("exclusivity", "Limits parties to a single agreement or supplier"),
    ("termination for convenience", "Allows termination without cause"),
    ("assignment restriction", "Limits transfer of contractual rights"),
    ("security deposit", "Funds held to secure obligations"),
    ("rent escalation", "Terms for increasing rent"),
    ("renewal period", "Length and conditions of contract renewal"),
    ("notice requirements", "Formal communication obligations"),
    ("proprietary", "May restrict use or sharing of confidential or owned information"),
    ("best efforts", "Vague obligation, unclear standard of performance"),
    ("reasonable efforts", "Ambiguous level of obligation, may differ by context"),
    ("commercially reasonable", "Subjective and open to interpretation"),
    ("material adverse change", "Broad clause, often undefined, triggering major rights"),
    ("time is of the essence", "Strict deadlines with serious consequences if missed"),
    ("without prejudice", "Statement made without affecting legal rights"),
    ("to the fullest extent permitted by law", "Very broad liability-shifting clause"),
    ("successors and assigns", "Extends obligations to future parties"),
    ("severability", "Allows remainder of contract to survive if part is invalid"),
    ("injunctive relief", "Court order requiring or preventing an action"),
    ("equitable remedies", "Non-monetary remedies such as injunctions or specific performance"),
    ("notwithstanding", "Overrides other contract provisions (can cause confusion)"),
    ("hereto", "Old-fashioned legal term meaning 'to this document'"),
    ("hereinafter", "Means 'from this point forward in the document'"),
    ("thereof", "Refers back to something previously stated (often vague)"),
    ("whereas", "Introductory recital, may affect interpretation"),
    ("forthwith", "Means immediately, but not always strictly defined"),
    ("per diem", "Daily rate or penalty"),
    ("liquidated damages", "Pre-set damages amount, sometimes unenforceable if excessive"),
    ("sole discretion", "Gives one party complete decision-making power"),
    ("good faith", "Ambiguous standard, hard to enforce"),
    ("as is", "No warranties or guarantees about condition"),
    ("successor liability", "Obligations may follow a change of ownership"),
];

/// Lowercases and removes punctuation so multi-word terms match across
/// formatting differences. Dictionary terms go through the same
/// normalization before matching, so hyphenated terms still hit the
/// punctuation-stripped clause text.
fn normalize_clause(text: &str) -> String {
    let punctuation = Regex::new(r"[^\w\s]").expect("punctuation pattern is valid");
    punctuation.replace_all(&text.to_lowercase(), "").to_string()
}

pub fn find_keyword_flags(clause_text: &str) -> Vec<KeywordFlag> {
    let normalized = normalize_clause(clause_text);

    let mut flags = Vec::new();
    for (term, explanation) in RISKY_TERMS {
        let needle = normalize_clause(term);
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&needle)))
            .expect("term pattern is valid");
        if pattern.is_match(&normalized) {
            flags.push(KeywordFlag {
                term: term.to_string(),
                predefined_explanation: explanation.to_string(),
            });
        }
    }
    flags
}

fn contextual_flags_from_value(value: Option<Value>) -> Vec<ContextualFlag> {
    let Some(value) = value else {
        return Vec::new();
    };

    value
        .get("flags")
        .and_then(Value::as_array)
        .map(|flags| {
            flags
                .iter()
                .filter_map(|flag| {
                    let term = flag.get("term").and_then(Value::as_str)?.trim();
                    if term.is_empty() {
                        return None;
                    }
                    Some(ContextualFlag {
                        term: term.to_string(),
                        explanation: flag
                            .get("explanation")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn call_for_contextual_flags<C: GenerativeClient>(
    client: &C,
    clause_text: &str,
) -> Vec<ContextualFlag> {
    let prompt = format!(
        "Highlight potential high-risk terms in this clause and return JSON only.\n\
         Format: {{\"flags\":[{{\"term\":\"...\",\"explanation\":\"...\"}}]}}\n\
         Clause: \"{clause_text}\""
    );

    match client.generate(&prompt, 0.2).await {
        Ok(response) => contextual_flags_from_value(parse_json_object(&response)),
        Err(error) => {
            warn!(%error, "contextual risk call failed, keeping keyword flags only");
            Vec::new()
        }
    }
}

/// Combines dictionary keyword matches with model-suggested contextual
/// flags into one report for a clause.
pub async fn generate_risk_report<C: GenerativeClient>(
    client: &C,
    clause_text: &str,
) -> RiskReport {
    let keyword_flags = find_keyword_flags(clause_text);
    let contextual_flags = call_for_contextual_flags(client, clause_text).await;
    let risk_count = keyword_flags.len() + contextual_flags.len();

    RiskReport {
        clause: clause_text.to_string(),
        risk_summary: format!(
            "{} high-risk terms detected: {} keyword-based, {} contextual.",
            risk_count,
            keyword_flags.len(),
            contextual_flags.len()
        ),
        keyword_flags,
        contextual_flags,
    }
}
