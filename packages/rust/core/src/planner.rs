//! Query planning: question → 2..=5 web-search queries.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use researcher_providers::{LanguageModel, Prompt, PromptKind};
use researcher_shared::{PipelineState, Question, Stage, StageError};

use crate::validator::{self, QUERY_SCHEMA};

const SYSTEM_PROMPT: &str = "You are a research assistant. Generate between 2 and 5 specific, \
diverse web-search queries that together cover the question comprehensively.\n\
Respond with a JSON array of strings and nothing else, for example: \
[\"first query\", \"second query\"]";

/// Turns the question into an ordered list of search queries.
pub struct QueryPlanner {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl QueryPlanner {
    pub fn new(model: Arc<dyn LanguageModel>, temperature: f32) -> Self {
        Self { model, temperature }
    }

    /// Set `state.queries`. Never fails: a model error or an out-of-bounds
    /// reply switches to [`fallback_queries`] and records a `plan` error.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn plan(&self, state: &mut PipelineState) {
        let prompt = Prompt {
            kind: PromptKind::PlanQueries,
            system: SYSTEM_PROMPT.to_string(),
            user: format!("Question: {}", state.question),
            temperature: self.temperature,
        };

        let failure = match self.model.invoke(&prompt).await {
            Ok(reply) => match validator::parse_list(&reply, QUERY_SCHEMA) {
                Ok(queries) => {
                    info!(count = queries.len(), "planned search queries");
                    state.queries = queries;
                    return;
                }
                Err(violation) => format!("query plan rejected: {violation}"),
            },
            Err(e) => format!("query planning call failed: {e}"),
        };

        warn!(reason = %failure, "falling back to the question as search query");
        state.queries = fallback_queries(&state.question);
        state.record_error(StageError::new(Stage::Plan, failure));
    }
}

/// Degraded plan: the question itself, padded with one deterministic variant
/// so the plan still meets the minimum query count.
pub fn fallback_queries(question: &Question) -> Vec<String> {
    let mut queries = vec![question.to_string()];
    while queries.len() < QUERY_SCHEMA.min {
        queries.push(format!("{question} overview"));
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    fn state() -> PipelineState {
        PipelineState::new(Question::parse("How do surface codes work?").unwrap())
    }

    #[tokio::test]
    async fn uses_validated_model_queries() {
        let model = Arc::new(ScriptedModel::new().reply(
            PromptKind::PlanQueries,
            r#"["surface code basics", "surface code threshold 2024", "logical qubit overhead"]"#,
        ));
        let planner = QueryPlanner::new(model.clone(), 0.0);
        let mut state = state();

        planner.plan(&mut state).await;

        assert_eq!(state.queries.len(), 3);
        assert_eq!(state.queries[0], "surface code basics");
        assert!(state.errors.is_empty());
        assert!(model.calls()[0].user.contains("How do surface codes work?"));
    }

    #[tokio::test]
    async fn too_many_queries_are_truncated() {
        let model = Arc::new(ScriptedModel::new().reply(
            PromptKind::PlanQueries,
            "1. a\n2. b\n3. c\n4. d\n5. e\n6. f\n7. g",
        ));
        let mut state = state();

        QueryPlanner::new(model, 0.0).plan(&mut state).await;

        assert_eq!(state.queries, vec!["a", "b", "c", "d", "e"]);
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn fenced_reply_with_preamble_is_parsed() {
        let model = Arc::new(ScriptedModel::new().reply(
            PromptKind::PlanQueries,
            "Here are the queries:\n```json\n[\"surface code basics\", \"decoder latency\"]\n```",
        ));
        let mut state = state();

        QueryPlanner::new(model, 0.0).plan(&mut state).await;

        assert_eq!(state.queries, vec!["surface code basics", "decoder latency"]);
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn single_query_reply_falls_back() {
        let model = Arc::new(
            ScriptedModel::new().reply(PromptKind::PlanQueries, "surface codes explained"),
        );
        let mut state = state();

        QueryPlanner::new(model, 0.0).plan(&mut state).await;

        assert_eq!(state.queries[0], "How do surface codes work?");
        assert_eq!(state.queries.len(), 2);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].stage, Stage::Plan);
        assert!(state.errors[0].message.contains("at least 2"));
    }

    #[tokio::test]
    async fn model_failure_falls_back() {
        let model = Arc::new(ScriptedModel::new().fail(PromptKind::PlanQueries, "HTTP 503"));
        let mut state = state();

        QueryPlanner::new(model, 0.0).plan(&mut state).await;

        assert_eq!(state.queries, fallback_queries(&state.question));
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].message.contains("HTTP 503"));
    }
}
