//! Findings extraction: analyze aggregated results, then distill 1..=5 findings.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use researcher_providers::{LanguageModel, Prompt, PromptKind};
use researcher_shared::{PipelineState, ResultItem, Stage, StageError};

use crate::validator::{self, FINDINGS_SCHEMA};

/// The synthetic finding used whenever no real findings are available.
pub const NO_FINDINGS: &str = "No reliable findings could be extracted from the available sources.";

const NO_RESULTS_ANALYSIS: &str = "No search results available for analysis.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert analyst. Review the search results and:\n\
1. Identify key findings and themes\n\
2. Evaluate source credibility and consistency\n\
3. Note any conflicting information\n\
4. Highlight the most relevant insights for answering the question\n\
Refer to sources by their bracketed number. Be thorough and critical.";

const FINDINGS_SYSTEM_PROMPT: &str = "Extract between 1 and 5 key findings from this analysis. \
Each finding is one self-contained sentence.\n\
Respond with a JSON array of strings and nothing else.";

/// Produces `state.analysis` and `state.findings`.
pub struct FindingsExtractor {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    excerpt_chars: usize,
}

impl FindingsExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f32, excerpt_chars: usize) -> Self {
        Self {
            model,
            temperature,
            excerpt_chars,
        }
    }

    /// Never leaves `state.findings` empty: with no results, a failed call, or a
    /// rejected reply, it holds exactly [`NO_FINDINGS`] and an `analyze` error
    /// is recorded.
    #[instrument(skip_all, fields(run_id = %state.run_id, results = state.search_results.len()))]
    pub async fn extract(&self, state: &mut PipelineState) {
        if state.search_results.is_empty() {
            state.analysis = NO_RESULTS_ANALYSIS.to_string();
            fall_back(state, "no search results to analyze".to_string());
            return;
        }

        let analysis_prompt = Prompt {
            kind: PromptKind::Analyze,
            system: ANALYSIS_SYSTEM_PROMPT.to_string(),
            user: format!(
                "Question: {}\n\nSearch Results:\n{}\n\nProvide your analysis:",
                state.question,
                format_results(&state.search_results, self.excerpt_chars)
            ),
            temperature: self.temperature,
        };

        let analysis = match self.model.invoke(&analysis_prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => return fall_back(state, "analysis call returned no text".to_string()),
            Err(e) => return fall_back(state, format!("analysis call failed: {e}")),
        };
        state.analysis = analysis;

        let findings_prompt = Prompt {
            kind: PromptKind::ExtractFindings,
            system: FINDINGS_SYSTEM_PROMPT.to_string(),
            user: format!("Analysis:\n{}", state.analysis),
            temperature: self.temperature,
        };

        match self.model.invoke(&findings_prompt).await {
            Ok(reply) => match validator::parse_list(&reply, FINDINGS_SCHEMA) {
                Ok(findings) => {
                    info!(count = findings.len(), "extracted key findings");
                    state.findings = findings;
                }
                Err(violation) => fall_back(state, format!("findings reply rejected: {violation}")),
            },
            Err(e) => fall_back(state, format!("findings extraction call failed: {e}")),
        }
    }
}

fn fall_back(state: &mut PipelineState, reason: String) {
    warn!(%reason, "using synthetic finding");
    state.findings = vec![NO_FINDINGS.to_string()];
    state.record_error(StageError::new(Stage::Analyze, reason));
}

/// Numbered result list for the analysis prompt.
fn format_results(results: &[ResultItem], excerpt_chars: usize) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "[{}] {}\n    URL: {}\n    Content: {}",
                r.citation_index,
                r.title,
                r.url,
                truncate_content(&r.content_excerpt, excerpt_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Keep the first `max_chars` characters, marking the cut with `...`.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-codepoint.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
    }
}
