//! Two-phase planned research.
//!
//! Phase 1 plans a few focused queries, runs the aggregation pipeline for each
//! and extracts learnings from relevant records. Phase 2 runs the pipeline for
//! follow-up questions taken from phase-1 learnings only, then stops.
use crate::pipeline::AggregationPipeline;
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use sift_common::model::{EvaluatedResult, Learning, Phase, ResearchData};
use sift_common::{Result, SiftError};
use sift_llm::generate_structured;
use sift_llm::traits::LlmClient;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const MAX_PLANNED_QUERIES: usize = 3;
const LEARNING_CONCURRENCY: usize = 4;
const LEARNING_EXCERPT_CHARS: usize = 2000;

/// Research capability the loop controller prefers over a single pipeline pass.
#[async_trait]
pub trait DeepResearch: Send + Sync {
    async fn research(&self, query: &str) -> Result<ResearchData>;
}

#[derive(Debug, Deserialize)]
struct QueryPlan {
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearningReply {
    #[serde(default)]
    learning: Option<String>,
    #[serde(default)]
    follow_up_questions: Vec<String>,
}

pub struct PlannedDeepResearch {
    llm: Arc<dyn LlmClient>,
    pipeline: Arc<AggregationPipeline>,
    max_follow_ups: usize,
    timeout: Duration,
}

impl PlannedDeepResearch {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        pipeline: Arc<AggregationPipeline>,
        max_follow_ups: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            pipeline,
            max_follow_ups,
            timeout,
        }
    }

    async fn plan(&self, query: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Break the research topic below into 2-3 specific, focused web search queries. \
             Avoid overly general queries.\n\n\
             Topic: \"{query}\"\n\n\
             Respond with ONLY a JSON object: {{\"queries\": [\"...\", \"...\"]}}"
        );
        let plan: QueryPlan = tokio::time::timeout(
            self.timeout,
            generate_structured::<QueryPlan>(self.llm.as_ref(), &prompt, None, Some(300)),
        )
        .await
        .map_err(|_| SiftError::Timeout)??;

        let mut seen = HashSet::new();
        let queries: Vec<String> = plan
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .take(MAX_PLANNED_QUERIES)
            .collect();
        if queries.is_empty() {
            return Err(SiftError::Parse("research plan contained no queries".into()));
        }
        Ok(queries)
    }

    async fn extract_learning(&self, query: &str, record: &EvaluatedResult) -> Option<Learning> {
        let excerpt: String = record.result.content.chars().take(LEARNING_EXCERPT_CHARS).collect();
        let prompt = format!(
            "The user is researching \"{query}\".\n\n\
             Extract the single most important learning from this search result and up to two \
             follow-up questions worth researching next.\n\n\
             Title: {title}\nURL: {url}\nContent: {excerpt}\n\n\
             Respond with ONLY a JSON object: {{\"learning\": \"...\", \"followUpQuestions\": [\"...\"]}}",
            title = record.result.title.as_deref().unwrap_or(""),
            url = record.url(),
        );
        let reply = tokio::time::timeout(
            self.timeout,
            generate_structured::<LearningReply>(self.llm.as_ref(), &prompt, None, Some(300)),
        )
        .await;
        match reply {
            Ok(Ok(reply)) => Some(Learning {
                learning: reply.learning.filter(|l| !l.trim().is_empty()),
                follow_up_questions: reply
                    .follow_up_questions
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect(),
                source: Some(record.url().to_string()),
            }),
            Ok(Err(e)) => {
                tracing::debug!(url = record.url(), error = %e, "deep.learning.skipped");
                None
            }
            Err(_) => {
                tracing::debug!(url = record.url(), "deep.learning.timeout");
                None
            }
        }
    }

    /// Pipeline results for each query plus learnings from the relevant ones.
    async fn run_round(&self, queries: &[String]) -> (Vec<EvaluatedResult>, Vec<Learning>) {
        let per_query = join_all(queries.iter().map(|q| self.pipeline.evaluate_query(q))).await;

        let mut jobs = Vec::new();
        let mut results = Vec::new();
        for (query, evaluated) in queries.iter().zip(per_query) {
            for record in evaluated {
                if record.is_relevant {
                    jobs.push((query.clone(), record.clone()));
                }
                results.push(record);
            }
        }

        let learnings: Vec<Learning> = stream::iter(jobs)
            .map(|(query, record)| async move { self.extract_learning(&query, &record).await })
            .buffered(LEARNING_CONCURRENCY)
            .filter_map(|l| async move { l })
            .collect()
            .await;
        (results, learnings)
    }
}

/// Keep the first record per URL.
fn dedup_by_url(results: Vec<EvaluatedResult>) -> Vec<EvaluatedResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.url().to_string()))
        .collect()
}

fn follow_up_queries(learnings: &[Learning], completed: &[String], max: usize) -> Vec<String> {
    let mut seen: HashSet<String> = completed.iter().map(|q| q.to_lowercase()).collect();
    learnings
        .iter()
        .flat_map(|l| &l.follow_up_questions)
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(max)
        .cloned()
        .collect()
}

#[async_trait]
impl DeepResearch for PlannedDeepResearch {
    async fn research(&self, query: &str) -> Result<ResearchData> {
        let planned = self.plan(query).await?;
        tracing::info!(%query, planned = ?planned, "deep.plan.done");

        let (mut results, mut learnings) = self.run_round(&planned).await;
        let mut queries = planned.clone();
        let mut phase = Phase::Initial;

        let follow_ups = follow_up_queries(&learnings, &queries, self.max_follow_ups);
        if !follow_ups.is_empty() {
            tracing::info!(%query, follow_ups = ?follow_ups, "deep.follow_up.start");
            let (more_results, more_learnings) = self.run_round(&follow_ups).await;
            results.extend(more_results);
            learnings.extend(more_learnings);
            queries.extend(follow_ups);
            phase = Phase::FollowUp;
        }

        let search_results = dedup_by_url(results);
        tracing::info!(
            %query,
            queries = queries.len(),
            records = search_results.len(),
            learnings = learnings.len(),
            "deep.research.done"
        );
        Ok(ResearchData {
            completed_queries: queries.clone(),
            queries,
            search_results,
            learnings,
            phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_common::model::MergedResult;

    #[test]
    fn follow_ups_skip_completed_and_repeat_questions() {
        let learnings = vec![
            Learning {
                learning: Some("a".into()),
                follow_up_questions: vec!["Rust async runtimes".into(), "tokio vs smol".into()],
                source: None,
            },
            Learning {
                learning: None,
                follow_up_questions: vec!["TOKIO VS SMOL".into(), "io_uring support".into()],
                source: None,
            },
        ];
        let completed = vec!["rust async runtimes".to_string()];
        assert_eq!(
            follow_up_queries(&learnings, &completed, 3),
            vec!["tokio vs smol".to_string(), "io_uring support".to_string()]
        );
        assert_eq!(follow_up_queries(&learnings, &completed, 1).len(), 1);
    }

    #[test]
    fn dedup_keeps_first_record() {
        let a1 = EvaluatedResult::new(MergedResult::new("https://a.dev", "first"), true, "");
        let a2 = EvaluatedResult::new(MergedResult::new("https://a.dev", "second"), false, "");
        let b = EvaluatedResult::new(MergedResult::new("https://b.dev", "b"), false, "");
        let out = dedup_by_url(vec![a1, b, a2]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].result.content, "first");
    }
}
