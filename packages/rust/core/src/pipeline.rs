//! End-to-end research pipeline: question → plan → search → aggregate → analyze → write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use researcher_providers::{LanguageModel, OpenAiChatModel, SearchProvider, TavilySearch};
use researcher_shared::{
    AppConfig, Phase, PipelineState, Question, Result, RunOutput, validate_api_keys,
};

use crate::aggregate;
use crate::analyst::FindingsExtractor;
use crate::planner::QueryPlanner;
use crate::search::SearchExecutor;
use crate::writer::AnswerSynthesizer;

/// Tunables for one [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub planner_temperature: f32,
    pub analyst_temperature: f32,
    pub writer_temperature: f32,
    pub max_results_per_query: usize,
    /// Per-query search timeout.
    pub search_timeout: Duration,
    /// Worker pool size for search.
    pub search_concurrency: usize,
    /// Excerpt length in the analysis prompt.
    pub content_truncate_length: usize,
    /// Excerpt length in the answer prompt.
    pub answer_truncate_length: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            planner_temperature: config.llm.planner_temperature,
            analyst_temperature: config.llm.analyst_temperature,
            writer_temperature: config.llm.writer_temperature,
            max_results_per_query: config.search.max_results_per_query,
            search_timeout: Duration::from_secs(config.search.timeout_secs),
            search_concurrency: config.search.concurrency,
            content_truncate_length: config.pipeline.content_truncate_length,
            answer_truncate_length: config.pipeline.answer_truncate_length,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: Phase);
    /// Called as each search query settles, in completion order.
    fn query_finished(&self, query: &str, ok: bool, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, output: &RunOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: Phase) {}
    fn query_finished(&self, _query: &str, _ok: bool, _current: usize, _total: usize) {}
    fn done(&self, _output: &RunOutput) {}
}

/// Drives the fixed stage sequence over one [`PipelineState`].
///
/// Stages never abort the run: each either produces its output or a
/// documented fallback plus a recorded error, so every run ends in `Done`.
pub struct Orchestrator {
    planner: QueryPlanner,
    executor: SearchExecutor,
    extractor: FindingsExtractor,
    writer: AnswerSynthesizer,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            planner: QueryPlanner::new(Arc::clone(&model), settings.planner_temperature),
            executor: SearchExecutor::new(
                search,
                settings.max_results_per_query,
                settings.search_timeout,
                settings.search_concurrency,
            ),
            extractor: FindingsExtractor::new(
                Arc::clone(&model),
                settings.analyst_temperature,
                settings.content_truncate_length,
            ),
            writer: AnswerSynthesizer::new(
                model,
                settings.writer_temperature,
                settings.answer_truncate_length,
            ),
        }
    }

    /// Build the production pipeline. Fails before any stage runs if a
    /// required API key is missing.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        validate_api_keys(config)?;
        let model = OpenAiChatModel::from_config(&config.llm)?;
        let search = TavilySearch::from_config(&config.search)?;
        Ok(Self::new(
            Arc::new(model),
            Arc::new(search),
            PipelineSettings::from(config),
        ))
    }

    /// Run every stage and return the final state.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn run_state(
        &self,
        question: &Question,
        progress: &dyn ProgressReporter,
    ) -> PipelineState {
        let mut state = PipelineState::new(question.clone());
        info!(run_id = %state.run_id, "starting research run");

        let mut phase = Phase::Planning;
        loop {
            state.phases.push(phase);
            progress.phase(phase);
            debug!(phase = phase.label(), "entering phase");

            match phase {
                Phase::Planning => self.planner.plan(&mut state).await,
                Phase::Searching => self.executor.run(&mut state, progress).await,
                Phase::Aggregating => aggregate::run(&mut state),
                Phase::Analyzing => self.extractor.extract(&mut state).await,
                Phase::Writing => self.writer.write(&mut state).await,
                Phase::Done => break,
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        state
    }

    /// Answer `question`. Always returns an output; degradation shows up in
    /// `errors` and in the answer text, never as an `Err`.
    pub async fn run(&self, question: &Question, progress: &dyn ProgressReporter) -> RunOutput {
        let start = Instant::now();
        let state = self.run_state(question, progress).await;

        let output = RunOutput {
            run_id: state.run_id,
            question: state.question.to_string(),
            queries: state.queries,
            findings: state.findings,
            answer: state.answer,
            sources: state.sources,
            errors: state.errors,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %output.run_id,
            sources = output.sources.len(),
            errors = output.errors.len(),
            elapsed_ms = output.elapsed_ms,
            "research run complete"
        );
        progress.done(&output);
        output
    }
}
