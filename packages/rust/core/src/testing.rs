//! Scripted collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use researcher_providers::{LanguageModel, Prompt, PromptKind, SearchProvider};
use researcher_shared::{ResearcherError, Result, SearchHit};

pub(crate) fn hit(title: &str, url: &str) -> SearchHit {
    SearchHit {
        title: title.into(),
        url: url.into(),
        content: format!("Content about {title}."),
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

enum Reply {
    Text(String),
    Fail(String),
}

/// Answers each prompt kind with a fixed reply; unscripted kinds fail.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    replies: HashMap<PromptKind, Reply>,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, kind: PromptKind, text: &str) -> Self {
        self.replies.insert(kind, Reply::Text(text.into()));
        self
    }

    pub(crate) fn fail(mut self, kind: PromptKind, message: &str) -> Self {
        self.replies.insert(kind, Reply::Fail(message.into()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_of(&self, kind: PromptKind) -> usize {
        self.calls().iter().filter(|p| p.kind == kind).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &Prompt) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.clone());
        match self.replies.get(&prompt.kind) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(ResearcherError::Model(message.clone())),
            None => Err(ResearcherError::Model(format!(
                "no scripted reply for {}",
                prompt.kind.as_str()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

enum Outcome {
    Hits(Vec<SearchHit>, Duration),
    Fail(String),
    Hang,
}

/// Answers each query from a script; unknown queries return no hits.
/// Tracks how many calls were in flight at once.
#[derive(Default)]
pub(crate) struct ScriptedSearch {
    outcomes: HashMap<String, Outcome>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
    latency: Duration,
}

impl ScriptedSearch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps at least this long.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.outcomes
            .insert(query.into(), Outcome::Hits(hits, Duration::ZERO));
        self
    }

    pub(crate) fn delayed(mut self, query: &str, delay: Duration, hits: Vec<SearchHit>) -> Self {
        self.outcomes.insert(query.into(), Outcome::Hits(hits, delay));
        self
    }

    pub(crate) fn fail(mut self, query: &str, message: &str) -> Self {
        self.outcomes
            .insert(query.into(), Outcome::Fail(message.into()));
        self
    }

    pub(crate) fn hang(mut self, query: &str) -> Self {
        self.outcomes.insert(query.into(), Outcome::Hang);
        self
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion rather than being cancelled.
    pub(crate) fn completed_calls(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = match self.outcomes.get(query) {
            Some(Outcome::Hits(hits, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(hits.clone())
            }
            Some(Outcome::Fail(message)) => Err(ResearcherError::Search(message.clone())),
            Some(Outcome::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
