use crate::error::AiError;
use crate::genai::GenerativeClient;
use crate::models::AskAnswer;
use crate::normalize::strip_control;

const SYSTEM_INSTRUCTIONS: &str = "You are a helpful legal assistant. Answer ONLY using the \
    provided contract text. If the answer is not in the text, reply exactly: 'The answer is \
    not found in the document.' After the answer, include 1 to 3 short quotes from the text \
    that support it. Return a single concise sentence; do not repeat lines or include quoted \
    echoes.";

/// Single-turn question answering grounded on the given contract text.
pub async fn answer_question<C: GenerativeClient>(
    client: &C,
    question: &str,
    context: &str,
    temperature: f32,
) -> Result<AskAnswer, AiError> {
    let question = strip_control(question);
    if question.is_empty() {
        return Err(AiError::EmptyInput("question is empty".to_string()));
    }

    let prompt = format!(
        "{SYSTEM_INSTRUCTIONS}\n\nContract Text:\n---\n{context}\n---\n\nQuestion: {question}\n\nAnswer:"
    );

    let answer = client.generate(&prompt, temperature).await?;
    Ok(AskAnswer {
        answer: answer.trim().to_string(),
        references: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedClient;

    #[async_trait]
    impl GenerativeClient for CannedClient {
        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, AiError> {
            assert!(prompt.contains("Contract Text:"));
            assert!(prompt.contains("Question: Who pays the deposit?"));
            Ok("  Party A pays the deposit.  ".to_string())
        }

        fn model_id(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn answers_are_trimmed_and_wrapped() {
        let answer = answer_question(
            &CannedClient,
            "Who pays the deposit?",
            "Party A shall pay the deposit.",
            0.2,
        )
        .await
        .expect("answer succeeds");

        assert_eq!(answer.answer, "Party A pays the deposit.");
        assert!(answer.references.is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let result = answer_question(&CannedClient, "  \x1f ", "context", 0.2).await;
        assert!(matches!(result, Err(AiError::EmptyInput(_))));
    }
}
