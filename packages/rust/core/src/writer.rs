//! Answer synthesis with citation rendering.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use researcher_providers::{LanguageModel, Prompt, PromptKind};
use researcher_shared::{PipelineState, Source, Stage, StageError};

use crate::analyst::truncate_content;

/// Prefix carried by any answer that was not fully grounded in model output
/// and search results.
pub const DEGRADED_MARKER: &str = "[degraded]";

const SYSTEM_PROMPT: &str = "You are an expert writer. Create a comprehensive, well-structured \
answer based on the original question, the key findings, the analyst's notes, and the source \
materials.\n\
Your answer should:\n\
- Address the question directly\n\
- Build on the key findings\n\
- Be clear, accurate, balanced, and objective\n\
- Cite sources inline using their bracketed numbers, e.g. [1], [2]";

/// Produces `state.answer` and `state.sources`.
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    excerpt_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f32, excerpt_chars: usize) -> Self {
        Self {
            model,
            temperature,
            excerpt_chars,
        }
    }

    /// `state.sources` always lists every aggregated result once, in citation
    /// order, whatever the prose cites. On model failure the answer is the
    /// findings verbatim behind [`DEGRADED_MARKER`] and a `write` error is recorded.
    #[instrument(skip_all, fields(run_id = %state.run_id, sources = state.search_results.len()))]
    pub async fn write(&self, state: &mut PipelineState) {
        let mut sources: Vec<Source> = state.search_results.iter().map(Source::from).collect();
        sources.sort_by_key(|s| s.citation_index);
        state.sources = sources;

        let prompt = Prompt {
            kind: PromptKind::WriteAnswer,
            system: SYSTEM_PROMPT.to_string(),
            user: self.user_prompt(state),
            temperature: self.temperature,
        };

        let failure = match self.model.invoke(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim();
                state.answer = if state.search_results.is_empty() {
                    format!(
                        "{DEGRADED_MARKER} No web sources were available; this answer is not \
                         grounded in search results.\n\n{text}"
                    )
                } else {
                    text.to_string()
                };
                info!(chars = state.answer.len(), "answer written");
                return;
            }
            Ok(_) => "answer call returned no text".to_string(),
            Err(e) => format!("answer call failed: {e}"),
        };

        warn!(reason = %failure, "emitting degraded answer from findings");
        state.answer = degraded_answer(&state.findings);
        state.record_error(StageError::new(Stage::Write, failure));
    }

    fn user_prompt(&self, state: &PipelineState) -> String {
        let findings = state
            .findings
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");

        let results = if state.search_results.is_empty() {
            "(no search results)".to_string()
        } else {
            state
                .search_results
                .iter()
                .map(|r| {
                    format!(
                        "[{}] {}\n    {}",
                        r.citation_index,
                        r.title,
                        truncate_content(&r.content_excerpt, self.excerpt_chars)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        format!(
            "Question: {}\n\nKey Findings:\n{findings}\n\nAnalyst's Notes:\n{}\n\n\
             Search Results:\n{results}\n\nWrite a comprehensive answer:",
            state.question, state.analysis
        )
    }
}

/// Fallback answer: the findings verbatim, marked as degraded.
pub fn degraded_answer(findings: &[String]) -> String {
    let mut answer =
        format!("{DEGRADED_MARKER} A full answer could not be synthesized. Key findings:");
    for finding in findings {
        answer.push_str("\n- ");
        answer.push_str(finding);
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use researcher_shared::{Question, ResultItem};

    fn state(results: usize) -> PipelineState {
        let mut state = PipelineState::new(Question::parse("Why is Rust memory safe?").unwrap());
        state.search_results = (1..=results)
            .map(|i| ResultItem {
                query: "rust safety".into(),
                title: format!("Doc {i}"),
                url: format!("https://docs.example/{i}"),
                content_excerpt: format!("Excerpt {i}"),
                citation_index: i,
            })
            .collect();
        state.findings = vec![
            "Ownership prevents aliasing bugs".into(),
            "Borrowck runs at compile time".into(),
        ];
        state.analysis = "Both sources agree.".into();
        state
    }

    #[tokio::test]
    async fn sources_are_complete_even_when_prose_cites_one() {
        let model = Arc::new(ScriptedModel::new().reply(
            PromptKind::WriteAnswer,
            "Ownership rules [1] make it safe.",
        ));
        let mut state = state(3);

        AnswerSynthesizer::new(model.clone(), 0.3, 200).write(&mut state).await;

        assert_eq!(state.answer, "Ownership rules [1] make it safe.");
        let indices: Vec<usize> = state.sources.iter().map(|s| s.citation_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(state.sources[1].to_string(), "[2] Doc 2 - https://docs.example/2");
        assert!(state.errors.is_empty());

        let user = &model.calls()[0].user;
        assert!(user.contains("- Ownership prevents aliasing bugs"));
        assert!(user.contains("[3] Doc 3"));
        assert!(user.contains("Both sources agree."));
    }

    #[tokio::test]
    async fn model_failure_emits_findings_verbatim() {
        let model = Arc::new(ScriptedModel::new().fail(PromptKind::WriteAnswer, "timeout"));
        let mut state = state(2);

        AnswerSynthesizer::new(model, 0.3, 200).write(&mut state).await;

        assert!(state.answer.starts_with(DEGRADED_MARKER));
        assert!(state.answer.contains("Ownership prevents aliasing bugs"));
        assert!(state.answer.contains("Borrowck runs at compile time"));
        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].stage, Stage::Write);
    }

    #[tokio::test]
    async fn blank_reply_counts_as_failure() {
        let model = Arc::new(ScriptedModel::new().reply(PromptKind::WriteAnswer, "   \n"));
        let mut state = state(1);

        AnswerSynthesizer::new(model, 0.3, 200).write(&mut state).await;

        assert!(state.answer.starts_with(DEGRADED_MARKER));
        assert_eq!(state.errors.len(), 1);
    }

    #[tokio::test]
    async fn no_sources_marks_answer_degraded_without_error() {
        let model = Arc::new(
            ScriptedModel::new().reply(PromptKind::WriteAnswer, "General knowledge answer."),
        );
        let mut state = state(0);

        AnswerSynthesizer::new(model, 0.3, 200).write(&mut state).await;

        assert!(state.answer.starts_with(DEGRADED_MARKER));
        assert!(state.answer.ends_with("General knowledge answer."));
        assert!(state.sources.is_empty());
        assert!(state.errors.is_empty());
    }
}
