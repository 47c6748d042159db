//! Flatten, deduplicate, and number search results.

use std::collections::HashSet;

use tracing::{debug, info};
use url::Url;

use researcher_shared::{PipelineState, QueryResults, ResultItem};

/// Aggregate `state.search_groups` into `state.search_results`.
pub fn run(state: &mut PipelineState) {
    state.search_results = aggregate(&state.search_groups);
    info!(
        groups = state.search_groups.len(),
        results = state.search_results.len(),
        "aggregated search results"
    );
}

/// Flatten groups in query order, keeping provider order within a group.
///
/// The first occurrence of a URL wins; later duplicates are dropped.
/// Citation indices are assigned 1..=N over the surviving items.
/// Hits without a URL cannot be cited and are skipped.
pub fn aggregate(groups: &[QueryResults]) -> Vec<ResultItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for group in groups {
        for hit in &group.hits {
            if hit.url.trim().is_empty() {
                debug!(title = %hit.title, "skipping result without URL");
                continue;
            }
            if !seen.insert(normalize_url(&hit.url)) {
                debug!(url = %hit.url, "duplicate result dropped");
                continue;
            }

            items.push(ResultItem {
                query: group.query.clone(),
                title: hit.title.clone(),
                url: hit.url.clone(),
                content_excerpt: hit.content.clone(),
                citation_index: items.len() + 1,
            });
        }
    }

    items
}

/// Dedup key for a URL: fragment removed, lowercased, trailing slashes removed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let base = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    };
    base.to_lowercase().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::hit;

    fn group(query: &str, hits: Vec<researcher_shared::SearchHit>) -> QueryResults {
        QueryResults {
            query: query.into(),
            hits,
        }
    }

    #[test]
    fn trailing_slash_duplicates_collapse_keeping_first_title() {
        let groups = vec![
            group("q1", vec![hit("First", "http://x.com/a")]),
            group("q2", vec![hit("Second", "http://x.com/a/")]),
        ];

        let items = aggregate(&groups);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].query, "q1");
    }

    #[test]
    fn case_and_fragment_insensitive() {
        assert_eq!(
            normalize_url("HTTPS://Example.com/Docs/#intro"),
            normalize_url("https://example.com/docs")
        );
    }

    #[test]
    fn indices_are_contiguous_in_query_then_provider_order() {
        let groups = vec![
            group(
                "q1",
                vec![hit("A", "https://a.example/"), hit("B", "https://b.example/")],
            ),
            group("q2", vec![]),
            group(
                "q3",
                vec![
                    hit("B again", "https://B.example"),
                    hit("C", "https://c.example/"),
                    hit("D", "https://d.example/"),
                ],
            ),
        ];

        let items = aggregate(&groups);

        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
        let indices: Vec<usize> = items.iter().map(|i| i.citation_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(aggregate(&[]).is_empty());
        assert!(aggregate(&[group("q", vec![]), group("r", vec![])]).is_empty());
    }

    #[test]
    fn urlless_hits_are_skipped_without_gaps() {
        let groups = vec![group(
            "q",
            vec![hit("none", "  "), hit("real", "https://r.example/")],
        )];
        let items = aggregate(&groups);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].citation_index, 1);
    }
}
