//! Adaptive retrieval width.
//!
//! Binary-searches the number of documents `k` to request so that the
//! joined context plus the question stays inside a token budget. The
//! search assumes more documents never means fewer tokens; a store whose
//! ranking breaks that assumption just gets a slightly suboptimal `k`.

use pitchscout_core::retrieval::{MetadataFilter, RetrievalQuery, VectorStore, join_documents};
use pitchscout_core::token::estimate_tokens;
use tracing::{debug, info, warn};

/// Budget and search range for the bisection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalBounds {
    pub max_tokens: usize,
    pub max_k: usize,
    pub min_k: usize,
}

impl Default for RetrievalBounds {
    fn default() -> Self {
        Self {
            max_tokens: 125_000,
            max_k: 20,
            min_k: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    /// Every probe came back empty or over budget.
    #[error("No retrieval width in [{min_k}, {max_k}] fits {max_tokens} tokens")]
    NoFeasibleWidth {
        min_k: usize,
        max_k: usize,
        max_tokens: usize,
    },
}

/// The chosen width and what the search saw at that width.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    pub k: usize,
    pub filter: Option<MetadataFilter>,
    /// Context assembled during the search. Diagnostics only; the answer
    /// re-queries at `k`.
    pub context: String,
    pub estimated_tokens: usize,
    /// Store queries issued by the search.
    pub probes: usize,
}

/// Upper bound on `k`: the width is shared between the named players.
pub fn cap_per_player(max_k: usize, player_count: usize) -> usize {
    if player_count == 0 {
        max_k
    } else {
        (max_k / player_count).max(1)
    }
}

pub struct AdaptiveRetriever {
    bounds: RetrievalBounds,
}

impl AdaptiveRetriever {
    pub fn new(bounds: RetrievalBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> RetrievalBounds {
        self.bounds
    }

    /// Find the largest feasible `k` for `question`, filtered to `players`
    /// when any are given.
    pub async fn plan(
        &self,
        store: &dyn VectorStore,
        question: &str,
        players: &[String],
    ) -> Result<RetrievalPlan, RetrievalError> {
        let cap = cap_per_player(self.bounds.max_k, players.len());
        let filter = MetadataFilter::players(players);
        let question_tokens = estimate_tokens(question);

        info!(
            players = ?players,
            cap,
            max_tokens = self.bounds.max_tokens,
            "Searching retrieval width"
        );

        let mut low = self.bounds.min_k;
        let mut high = cap;
        let mut best: Option<(usize, String, usize)> = None;
        let mut probes = 0usize;

        while low <= high {
            let mid = low + (high - low) / 2;
            probes += 1;

            let query = RetrievalQuery {
                text: question.to_string(),
                k: mid,
                filter: filter.clone(),
            };
            let docs = match store.query(&query).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(k = mid, error = %e, "Retrieval probe failed, treating as empty");
                    Vec::new()
                }
            };

            if docs.is_empty() {
                debug!(k = mid, "No documents, trying wider");
                low = mid + 1;
                continue;
            }

            let context = join_documents(&docs);
            let tokens = estimate_tokens(&context) + question_tokens;
            if tokens <= self.bounds.max_tokens {
                debug!(k = mid, tokens, "Within budget, trying wider");
                best = Some((mid, context, tokens));
                low = mid + 1;
            } else {
                debug!(k = mid, tokens, "Over budget, trying narrower");
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            }
        }

        let Some((k, context, estimated_tokens)) = best else {
            warn!(probes, "No feasible retrieval width");
            return Err(RetrievalError::NoFeasibleWidth {
                min_k: self.bounds.min_k,
                max_k: cap,
                max_tokens: self.bounds.max_tokens,
            });
        };

        info!(k, estimated_tokens, probes, "Retrieval width chosen");
        Ok(RetrievalPlan {
            k,
            filter,
            context,
            estimated_tokens,
            probes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::LinearStore;

    fn players(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn retriever(max_tokens: usize) -> AdaptiveRetriever {
        AdaptiveRetriever::new(RetrievalBounds {
            max_tokens,
            ..RetrievalBounds::default()
        })
    }

    #[test]
    fn cap_divides_width_between_players() {
        assert_eq!(cap_per_player(20, 0), 20);
        assert_eq!(cap_per_player(20, 1), 20);
        assert_eq!(cap_per_player(20, 3), 6);
        assert_eq!(cap_per_player(20, 25), 1);
    }

    #[tokio::test]
    async fn generous_budget_reaches_the_cap() {
        let store = LinearStore::new(100, 40);
        let plan = retriever(125_000).plan(&store, "q", &[]).await.unwrap();
        assert_eq!(plan.k, 20);
        assert!(plan.filter.is_none());
        assert!(plan.probes <= 5);
    }

    #[tokio::test]
    async fn finds_maximal_feasible_k() {
        // Each document is 40 ASCII chars = 30 tokens; the separators add
        // 1 token per gap (2 chars * 0.75, floored across the whole text).
        let store = LinearStore::new(100, 40);
        for budget in [30, 61, 95, 200, 333] {
            let plan = retriever(budget).plan(&store, "", &[]).await.unwrap();
            let fits = |k: usize| store.tokens_for(k) <= budget;
            assert!(fits(plan.k), "budget {budget}: k={} does not fit", plan.k);
            assert!(
                plan.k == 20 || !fits(plan.k + 1),
                "budget {budget}: k={} is not maximal",
                plan.k
            );
            assert_eq!(plan.estimated_tokens, store.tokens_for(plan.k));
        }
    }

    #[tokio::test]
    async fn availability_limits_k() {
        // Only 7 documents: every k >= 7 returns the same 7 documents.
        let store = LinearStore::new(7, 40);
        let plan = retriever(125_000).plan(&store, "q", &[]).await.unwrap();
        assert_eq!(plan.k, 20);
        assert_eq!(plan.context.matches("\n\n").count(), 6);
    }

    #[tokio::test]
    async fn empty_store_has_no_feasible_width() {
        let store = LinearStore::new(0, 40);
        let err = retriever(125_000).plan(&store, "q", &[]).await.unwrap_err();
        assert_eq!(
            err,
            RetrievalError::NoFeasibleWidth {
                min_k: 1,
                max_k: 20,
                max_tokens: 125_000
            }
        );
        // Empty probes only ever move low upward.
        assert_eq!(store.probed_ks(), [10, 15, 18, 19, 20]);
    }

    #[tokio::test]
    async fn tiny_budget_has_no_feasible_width() {
        let store = LinearStore::new(100, 40);
        let result = retriever(10).plan(&store, "q", &[]).await;
        assert!(matches!(result, Err(RetrievalError::NoFeasibleWidth { .. })));
    }

    #[tokio::test]
    async fn players_set_filter_and_cap() {
        let store = LinearStore::new(100, 40);
        let plan = retriever(125_000)
            .plan(&store, "q", &players(&["Lance Lynn", "Brady Singer"]))
            .await
            .unwrap();
        assert_eq!(plan.k, 10);
        let filter = plan.filter.unwrap();
        assert_eq!(filter.values, players(&["Lance Lynn", "Brady Singer"]));
        assert!(store.probed_ks().iter().all(|&k| k <= 10));
        assert!(store.saw_filter());
    }

    #[tokio::test]
    async fn failed_probe_counts_as_empty() {
        let store = LinearStore::new(100, 40).failing_below(5);
        let plan = retriever(125_000).plan(&store, "q", &[]).await.unwrap();
        assert_eq!(plan.k, 20);
    }

    #[tokio::test]
    async fn question_tokens_count_against_budget() {
        let store = LinearStore::new(100, 40);
        // 40-char question costs 30 tokens, leaving room for one document only.
        let question = "x".repeat(40);
        let plan = retriever(61).plan(&store, &question, &[]).await.unwrap();
        assert_eq!(plan.k, 1);
        assert_eq!(plan.estimated_tokens, 60);
    }
}
