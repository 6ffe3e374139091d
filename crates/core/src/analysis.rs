use crate::chunking::split_with_overlap;
use crate::genai::{parse_json_array, GenerativeClient};
use crate::models::{AnalysisOptions, DocumentMap, DocumentSection, TimelineEvent};
use crate::normalize::strip_control;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    Structure,
    Timeline,
}

impl ExtractionKind {
    fn instruction(&self) -> &'static str {
        match self {
            ExtractionKind::Structure => {
                "Analyze the contract text and extract its hierarchical structure. \
                 Return JSON array: [{\"title\": str, \"content_summary\": str, \
                 \"subsections\": [{\"title\": str, \"content_summary\": str}]}]."
            }
            ExtractionKind::Timeline => {
                "Extract all key dates, deadlines, and time-based obligations from the text. \
                 Return JSON array: [{\"date_description\": str, \"event\": str}]."
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ExtractionKind::Structure => "structure",
            ExtractionKind::Timeline => "timeline",
        }
    }
}

/// Drives chunked structure/timeline extraction over one contract and
/// merges the per-chunk results into a single deduplicated map.
pub struct MapPipeline<'a, C: GenerativeClient> {
    client: &'a C,
    options: AnalysisOptions,
}

impl<'a, C: GenerativeClient> MapPipeline<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(client: &'a C, options: AnalysisOptions) -> Self {
        Self { client, options }
    }

    pub async fn generate_map(&self, full_text: &str) -> DocumentMap {
        self.generate_for_kinds(
            full_text,
            &[ExtractionKind::Structure, ExtractionKind::Timeline],
        )
        .await
    }

    /// Chunks are processed in ascending order and, within a chunk, the
    /// requested kinds run in the order given; first-seen-wins dedup is
    /// defined against that total order, so reruns over the same
    /// responses are deterministic.
    pub async fn generate_for_kinds(
        &self,
        full_text: &str,
        kinds: &[ExtractionKind],
    ) -> DocumentMap {
        let text = strip_control(full_text);
        if text.is_empty() {
            return DocumentMap::default();
        }

        let chunks = split_with_overlap(
            &text,
            self.options.max_chunk_chars,
            self.options.overlap_chars,
        );

        let mut raw_structure = Vec::new();
        let mut raw_timeline = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            for kind in kinds {
                let records = self.collect(*kind, index, chunk).await;
                match kind {
                    ExtractionKind::Structure => raw_structure.extend(records),
                    ExtractionKind::Timeline => raw_timeline.extend(records),
                }
            }
        }

        DocumentMap {
            structure: dedupe_structure(&raw_structure),
            timeline: dedupe_timeline(&raw_timeline),
        }
    }

    /// One extraction call for one chunk. Every failure mode here is
    /// degradable: the chunk simply contributes no records of this kind.
    async fn collect(&self, kind: ExtractionKind, chunk_index: usize, chunk: &str) -> Vec<Value> {
        let prompt = format!(
            "{}\n\nReturn only a valid JSON array, no prose.\n\n<text>\n{}\n</text>",
            kind.instruction(),
            chunk
        );

        match self.client.generate(&prompt, self.options.temperature).await {
            Ok(response) => parse_json_array(&response),
            Err(error) => {
                warn!(
                    chunk = chunk_index,
                    kind = kind.label(),
                    %error,
                    "extraction call failed, treating chunk as empty"
                );
                Vec::new()
            }
        }
    }
}

fn text_field(value: &Value, field: &str) -> String {
    strip_control(value.get(field).and_then(Value::as_str).unwrap_or_default())
}

/// Coerces one model-produced section object, with no dedup. Entries
/// with an empty title are dropped at every level; subsections are
/// cleaned recursively.
fn section_from_value(value: &Value) -> Option<DocumentSection> {
    let title = text_field(value, "title");
    if title.is_empty() {
        return None;
    }

    let subsections = value
        .get("subsections")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(section_from_value).collect())
        .unwrap_or_default();

    Some(DocumentSection {
        title,
        content_summary: text_field(value, "content_summary"),
        subsections,
    })
}

fn event_from_value(value: &Value) -> Option<TimelineEvent> {
    let event = text_field(value, "event");
    if event.is_empty() {
        return None;
    }
    Some(TimelineEvent {
        date_description: text_field(value, "date_description"),
        event,
    })
}

/// First-seen-wins merge of per-chunk section lists. Dedup is on the
/// case-insensitive trimmed title and applies to the top level only;
/// subsections are cleaned but deliberately left as-is otherwise.
pub fn dedupe_structure(items: &[Value]) -> Vec<DocumentSection> {
    let mut seen = HashSet::new();
    let mut sections = Vec::new();

    for item in items {
        let Some(section) = section_from_value(item) else {
            continue;
        };
        if !seen.insert(section.title.to_lowercase()) {
            continue;
        }
        sections.push(section);
    }

    sections
}

/// First-seen-wins merge of per-chunk event lists, keyed on the
/// case-insensitive (date_description, event) pair. Events with an empty
/// description are dropped regardless of their date.
pub fn dedupe_timeline(items: &[Value]) -> Vec<TimelineEvent> {
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for item in items {
        let Some(event) = event_from_value(item) else {
            continue;
        };
        let key = (
            event.date_description.to_lowercase(),
            event.event.to_lowercase(),
        );
        if !seen.insert(key) {
            continue;
        }
        events.push(event);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        responses: Vec<String>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, AiError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(index) {
                Some(response) if response == "<error>" => Err(AiError::NotConfigured(
                    "scripted failure".to_string(),
                )),
                Some(response) => Ok(response.clone()),
                None => Ok("[]".to_string()),
            }
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn empty_input_makes_no_external_calls() {
        let client = ScriptedClient::new(Vec::new());
        let pipeline = MapPipeline::new(&client);

        let map = pipeline.generate_map("  \x00\x1f  ").await;

        assert!(map.structure.is_empty());
        assert!(map.timeline.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn short_text_issues_one_call_per_kind() {
        let structure = json!([{
            "title": "Section 1: Definitions",
            "content_summary": "Defines key terms.",
            "subsections": [{"title": "Scope", "content_summary": ""}]
        }])
        .to_string();
        let timeline = json!([{
            "date_description": "Within 30 days",
            "event": "Party B delivers report"
        }])
        .to_string();

        let client = ScriptedClient::new(vec![structure, timeline]);
        let pipeline = MapPipeline::new(&client);

        let map = pipeline.generate_map("A short contract.").await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(map.structure.len(), 1);
        assert_eq!(map.structure[0].title, "Section 1: Definitions");
        assert_eq!(map.structure[0].subsections.len(), 1);
        assert_eq!(map.timeline.len(), 1);
        assert_eq!(map.timeline[0].event, "Party B delivers report");
    }

    #[tokio::test]
    async fn single_kind_requests_skip_the_other_kind() {
        let timeline = json!([{
            "date_description": "upon signing",
            "event": "deposit is paid"
        }])
        .to_string();
        let client = ScriptedClient::new(vec![timeline]);
        let pipeline = MapPipeline::new(&client);

        let map = pipeline
            .generate_for_kinds("Short text.", &[ExtractionKind::Timeline])
            .await;

        assert_eq!(client.call_count(), 1);
        assert!(map.structure.is_empty());
        assert_eq!(map.timeline.len(), 1);
    }

    #[tokio::test]
    async fn failed_chunk_degrades_to_empty_not_fatal() {
        let timeline = json!([{
            "date_description": "on termination",
            "event": "deposit is returned"
        }])
        .to_string();
        let client = ScriptedClient::new(vec!["<error>".to_string(), timeline]);
        let pipeline = MapPipeline::new(&client);

        let map = pipeline.generate_map("Some contract text.").await;

        assert!(map.structure.is_empty());
        assert_eq!(map.timeline.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_response_degrades_to_empty() {
        let client = ScriptedClient::new(vec![
            "Sorry, I cannot help with that.".to_string(),
            "{\"not\": \"an array\"}".to_string(),
        ]);
        let pipeline = MapPipeline::new(&client);

        let map = pipeline.generate_map("Some contract text.").await;

        assert!(map.structure.is_empty());
        assert!(map.timeline.is_empty());
    }

    #[test]
    fn structure_dedup_is_case_insensitive_first_seen_wins() {
        let items = vec![
            json!({"title": "Termination", "content_summary": "First phrasing."}),
            json!({"title": "  termination  ", "content_summary": "Duplicate phrasing."}),
            json!({"title": "", "content_summary": "No title."}),
            json!({"title": "Payment", "content_summary": "Kept."}),
        ];

        let sections = dedupe_structure(&items);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Termination");
        assert_eq!(sections[0].content_summary, "First phrasing.");
        assert_eq!(sections[1].title, "Payment");
    }

    #[test]
    fn subsections_are_cleaned_but_not_deduped() {
        let items = vec![json!({
            "title": "Obligations",
            "content_summary": "",
            "subsections": [
                {"title": "Delivery", "content_summary": "a"},
                {"title": "Delivery", "content_summary": "b"},
                {"title": "", "content_summary": "dropped"},
            ]
        })];

        let sections = dedupe_structure(&items);
        assert_eq!(sections[0].subsections.len(), 2);
        assert_eq!(sections[0].subsections[0].content_summary, "a");
        assert_eq!(sections[0].subsections[1].content_summary, "b");
    }

    #[test]
    fn timeline_dedup_keys_on_both_fields_case_insensitively() {
        let items = vec![
            json!({"date_description": "Within 30 Days", "event": "Party B delivers report"}),
            json!({"date_description": "within 30 days", "event": "PARTY B DELIVERS REPORT"}),
            json!({"date_description": "within 30 days", "event": "Party A pays the fee"}),
            json!({"date_description": "irrelevant", "event": ""}),
        ];

        let events = dedupe_timeline(&items);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].date_description, "Within 30 Days");
        assert_eq!(events[1].event, "Party A pays the fee");
    }

    #[test]
    fn same_event_with_different_dates_is_kept_twice() {
        let items = vec![
            json!({"date_description": "January 1", "event": "rent is due"}),
            json!({"date_description": "February 1", "event": "rent is due"}),
        ];
        assert_eq!(dedupe_timeline(&items).len(), 2);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let items = vec![
            json!("just a string"),
            json!(42),
            json!({"title": 7, "content_summary": "numeric title"}),
            json!({"title": "Valid", "content_summary": "ok", "subsections": "not a list"}),
        ];

        let sections = dedupe_structure(&items);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Valid");
        assert!(sections[0].subsections.is_empty());
    }
}
