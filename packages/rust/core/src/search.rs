//! Concurrent search execution with per-query failure isolation.
//!
//! Each query runs on its own task behind a bounded worker pool and its own
//! timeout. A worker owns its result slot exclusively; slots are merged only
//! after every worker has returned (join barrier), in submission order, so
//! completion timing never affects what comes out. Progress is reported as
//! workers finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use researcher_providers::SearchProvider;
use researcher_shared::{
    PipelineState, QueryResults, ResearcherError, Result, SearchHit, Stage, StageError,
};

use crate::pipeline::ProgressReporter;

/// Collected per-query results and the errors of failed queries.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Successful queries, in submission order.
    pub groups: Vec<QueryResults>,
    pub errors: Vec<StageError>,
}

/// Runs a list of queries against a [`SearchProvider`] in parallel.
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    timeout: Duration,
    concurrency: usize,
}

impl SearchExecutor {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        max_results: usize,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            max_results,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Search `state.queries` and store the raw groups on the state.
    pub async fn run(&self, state: &mut PipelineState, progress: &dyn ProgressReporter) {
        let outcome = self.execute(&state.queries, progress).await;
        state.search_groups = outcome.groups;
        state.errors.extend(outcome.errors);
    }

    /// Execute every query concurrently.
    ///
    /// A failed, timed-out, or panicked query is excluded from `groups` and
    /// recorded as a `search` error carrying the query. If every query fails,
    /// the per-query errors collapse into a single summary error. Dropping the
    /// returned future aborts any workers still running.
    #[instrument(skip_all, fields(queries = queries.len(), concurrency = self.concurrency))]
    pub async fn execute(
        &self,
        queries: &[String],
        progress: &dyn ProgressReporter,
    ) -> SearchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        for (slot, query) in queries.iter().enumerate() {
            let worker = run_worker(
                Arc::clone(&semaphore),
                Arc::clone(&self.provider),
                query.clone(),
                self.max_results,
                self.timeout,
            );
            workers.spawn(async move { (slot, worker.await) });
        }

        // Join barrier: every worker fills only its own slot.
        let total = queries.len();
        let mut slots: Vec<Option<Result<Vec<SearchHit>>>> = (0..total).map(|_| None).collect();
        let mut finished = 0;

        while let Some(joined) = workers.join_next().await {
            finished += 1;
            match joined {
                Ok((slot, result)) => {
                    progress.query_finished(&queries[slot], result.is_ok(), finished, total);
                    slots[slot] = Some(result);
                }
                Err(e) => warn!(error = %e, "search task aborted"),
            }
        }

        let mut groups = Vec::with_capacity(total);
        let mut failures: Vec<(String, String)> = Vec::new();

        for (query, slot) in queries.iter().zip(slots) {
            let result = slot.unwrap_or_else(|| {
                Err(ResearcherError::Search("search task aborted".to_string()))
            });

            match result {
                Ok(hits) => {
                    info!(%query, results = hits.len(), "search succeeded");
                    groups.push(QueryResults {
                        query: query.clone(),
                        hits,
                    });
                }
                Err(e) => {
                    warn!(%query, error = %e, "search failed");
                    failures.push((query.clone(), e.to_string()));
                }
            }
        }

        let errors = if groups.is_empty() && !failures.is_empty() {
            let detail: Vec<String> = failures
                .iter()
                .map(|(query, error)| format!("'{query}': {error}"))
                .collect();
            vec![StageError::new(
                Stage::Search,
                format!("all {} search queries failed: {}", failures.len(), detail.join("; ")),
            )]
        } else {
            failures
                .into_iter()
                .map(|(query, error)| StageError::for_query(Stage::Search, query, error))
                .collect()
        };

        SearchOutcome { groups, errors }
    }
}

/// One worker: wait for a pool slot, then make one provider call under its
/// own timeout. Queue time does not count against the timeout.
async fn run_worker(
    pool: Arc<Semaphore>,
    provider: Arc<dyn SearchProvider>,
    query: String,
    max_results: usize,
    timeout: Duration,
) -> Result<Vec<SearchHit>> {
    let _permit = pool
        .acquire_owned()
        .await
        .map_err(|e| ResearcherError::Search(format!("worker pool closed: {e}")))?;

    match tokio::time::timeout(timeout, provider.search(&query, max_results)).await {
        Ok(result) => result,
        Err(_) => Err(ResearcherError::timeout(format!("search '{query}'"), timeout)),
    }
}
