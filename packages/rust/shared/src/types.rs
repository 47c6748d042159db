//! Core domain types for a research run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ResearcherError, Result};

/// Minimum accepted question length, in characters, after trimming.
pub const MIN_QUESTION_CHARS: usize = 3;

/// Maximum accepted question length, in characters, after trimming.
pub const MAX_QUESTION_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// A validated, trimmed, non-empty question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Trim and validate raw user input.
    pub fn parse(raw: &str) -> Result<Self> {
        let text = raw.trim();
        let chars = text.chars().count();

        if chars == 0 {
            return Err(ResearcherError::validation(
                "question cannot be empty or whitespace only",
            ));
        }
        if chars < MIN_QUESTION_CHARS {
            return Err(ResearcherError::validation(format!(
                "question must be at least {MIN_QUESTION_CHARS} characters long"
            )));
        }
        if chars > MAX_QUESTION_CHARS {
            return Err(ResearcherError::validation(format!(
                "question must be at most {MAX_QUESTION_CHARS} characters long (got {chars})"
            )));
        }

        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Stages and errors
// ---------------------------------------------------------------------------

/// Pipeline stage that recorded an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Search,
    Analyze,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Search => "search",
            Self::Analyze => "analyze",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered failure. Recording one never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
    /// The search query that failed, for per-query search errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            query: None,
        }
    }

    pub fn for_query(stage: Stage, query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            query: Some(query.into()),
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.query {
            Some(q) => write!(f, "[{}] {} (query: {q})", self.stage, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// State-machine position of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Searching,
    Aggregating,
    Analyzing,
    Writing,
    Done,
}

impl Phase {
    /// The fixed successor of this phase. `Done` is terminal.
    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Planning => Some(Self::Searching),
            Self::Searching => Some(Self::Aggregating),
            Self::Aggregating => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Writing),
            Self::Writing => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Planning => "Planning search queries",
            Self::Searching => "Searching the web",
            Self::Aggregating => "Aggregating results",
            Self::Analyzing => "Analyzing findings",
            Self::Writing => "Writing answer",
            Self::Done => "Done",
        }
    }
}

// ---------------------------------------------------------------------------
// Search data
// ---------------------------------------------------------------------------

/// One raw hit returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Raw provider results for a single query, in provider order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// A deduplicated search result with its stable citation index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    /// The query that produced this result.
    pub query: String,
    pub title: String,
    pub url: String,
    pub content_excerpt: String,
    /// 1-based, contiguous over the aggregated list.
    pub citation_index: usize,
}

/// A rendered citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub citation_index: usize,
    pub title: String,
    pub url: String,
}

impl From<&ResultItem> for Source {
    fn from(item: &ResultItem) -> Self {
        Self {
            citation_index: item.citation_index,
            title: item.title.clone(),
            url: item.url.clone(),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} - {}", self.citation_index, self.title, self.url)
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The single record threaded through every stage of one run.
///
/// Each stage reads earlier fields and writes only its own.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub run_id: RunId,
    pub question: Question,
    pub queries: Vec<String>,
    /// Per-query raw groups, in query submission order.
    pub search_groups: Vec<QueryResults>,
    pub search_results: Vec<ResultItem>,
    pub analysis: String,
    pub findings: Vec<String>,
    pub answer: String,
    pub sources: Vec<Source>,
    pub errors: Vec<StageError>,
    /// Phases entered so far, in order.
    pub phases: Vec<Phase>,
}

impl PipelineState {
    pub fn new(question: Question) -> Self {
        Self {
            run_id: RunId::new(),
            question,
            queries: Vec::new(),
            search_groups: Vec::new(),
            search_results: Vec::new(),
            analysis: String::new(),
            findings: Vec::new(),
            answer: String::new(),
            sources: Vec::new(),
            errors: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub fn record_error(&mut self, error: StageError) {
        self.errors.push(error);
    }
}

/// What a caller gets back from a run.
///
/// A non-empty `errors` list means the run completed in degraded mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: RunId,
    pub question: String,
    pub queries: Vec<String>,
    pub findings: Vec<String>,
    pub answer: String,
    pub sources: Vec<Source>,
    pub errors: Vec<StageError>,
    pub elapsed_ms: u64,
}

impl RunOutput {
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}
