//! Approval-gated research loop.
//!
//! The loop is an explicit state machine whose whole state lives in a
//! serializable [`RunSnapshot`]:
//!
//! ```text
//! AwaitingQuery -> Researching -> AwaitingApproval -> Researching | Completed
//! ```
//!
//! [`ResearchLoop::advance`] runs until the next suspension point (a missing
//! query or the approval gate) or completion. The snapshot is only updated at
//! those points, so a cancelled or failed research pass leaves the last
//! committed state intact and the run can be resumed from it.
use crate::deep::DeepResearch;
use crate::pipeline::AggregationPipeline;
use crate::synthesize::CitationSynthesizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_common::model::{ResearchData, SourceRef};
use sift_common::{Result, SiftError};
use sift_config::{LoopMode, ResearchStrategy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const QUERY_PROMPT: &str = "What would you like to research?";
pub const APPROVAL_PROMPT: &str = "Is this research sufficient? [y/n] ";

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub report: String,
    pub citations: Vec<usize>,
    pub sources: Vec<SourceRef>,
    pub research_data: ResearchData,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LoopState {
    AwaitingQuery,
    Researching {
        query: String,
    },
    AwaitingApproval {
        query: String,
        research_data: ResearchData,
        summary: String,
    },
    Completed {
        output: PipelineOutput,
    },
}

/// Persistable state of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Uuid,
    /// Completed research passes.
    pub iteration: u32,
    pub mode: LoopMode,
    pub strategy: ResearchStrategy,
    pub created_at: DateTime<Utc>,
    pub state: LoopState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Payload presented to the caller at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Suspension {
    /// `{ "message": { "query": "What would you like to research?" } }`
    Query { message: QueryRequest },
    /// `{ "message": "Is this research sufficient? [y/n] ", "summary": "..." }`
    Approval { message: String, summary: String },
}

impl Suspension {
    fn query() -> Self {
        Suspension::Query {
            message: QueryRequest {
                query: QUERY_PROMPT.to_string(),
            },
        }
    }

    fn approval(summary: &str) -> Self {
        Suspension::Approval {
            message: APPROVAL_PROMPT.to_string(),
            summary: summary.to_string(),
        }
    }
}

/// Payload supplied when resuming a suspended run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resume {
    Query { query: String },
    Approval { approved: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Suspended(Suspension),
    Completed(PipelineOutput),
}

/// Collaborators the loop drives.
pub struct ResearchServices {
    pub pipeline: Arc<AggregationPipeline>,
    pub deep: Option<Arc<dyn DeepResearch>>,
    pub synthesizer: Arc<CitationSynthesizer>,
}

/// Text shown at the approval gate.
pub fn research_summary(query: &str, data: &ResearchData) -> String {
    let json = serde_json::to_string_pretty(data).unwrap_or_default();
    format!("Research completed on \"{query}\"\n\n{json}")
}

pub struct ResearchLoop {
    services: Arc<ResearchServices>,
    snapshot: RunSnapshot,
}

impl ResearchLoop {
    /// New run; a blank query starts at the query prompt.
    pub fn start(
        services: Arc<ResearchServices>,
        mode: LoopMode,
        strategy: ResearchStrategy,
        query: Option<&str>,
    ) -> Self {
        let state = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => LoopState::Researching { query: q.to_string() },
            None => LoopState::AwaitingQuery,
        };
        let snapshot = RunSnapshot {
            run_id: Uuid::new_v4(),
            iteration: 0,
            mode,
            strategy,
            created_at: Utc::now(),
            state,
        };
        tracing::info!(run_id = %snapshot.run_id, ?mode, ?strategy, "loop.start");
        Self { services, snapshot }
    }

    pub fn from_snapshot(services: Arc<ResearchServices>, snapshot: RunSnapshot) -> Self {
        Self { services, snapshot }
    }

    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> RunSnapshot {
        self.snapshot
    }

    fn commit(&mut self, state: LoopState, iteration: u32) {
        self.snapshot.state = state;
        self.snapshot.iteration = iteration;
    }

    /// Run until the next suspension or completion.
    ///
    /// `resume` must match the current suspension: a query for
    /// `AwaitingQuery`, an approval for `AwaitingApproval`. Passing `None` at a
    /// suspension point re-emits its payload.
    pub async fn advance(
        &mut self,
        resume: Option<Resume>,
        cancel: &CancellationToken,
    ) -> Result<Advance> {
        let mut state = self.snapshot.state.clone();
        let mut iteration = self.snapshot.iteration;
        let mut resume = resume;
        let run_id = self.snapshot.run_id;

        loop {
            state = match state {
                LoopState::AwaitingQuery => match resume.take() {
                    Some(Resume::Query { query }) if !query.trim().is_empty() => {
                        LoopState::Researching {
                            query: query.trim().to_string(),
                        }
                    }
                    Some(Resume::Query { .. }) | None => {
                        self.commit(LoopState::AwaitingQuery, iteration);
                        return Ok(Advance::Suspended(Suspension::query()));
                    }
                    Some(Resume::Approval { .. }) => {
                        return Err(SiftError::Agent(
                            "run is waiting for a query, not an approval".into(),
                        ));
                    }
                },

                LoopState::Researching { query } => {
                    if resume.is_some() {
                        return Err(SiftError::Agent("run is not suspended".into()));
                    }
                    tracing::info!(
                        %run_id,
                        %query,
                        iteration = iteration + 1,
                        "loop.research.start"
                    );
                    let research_data = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::warn!(%run_id, %query, "loop.research.cancelled");
                            return Err(SiftError::Cancelled);
                        }
                        data = self.research(&query) => data,
                    };
                    iteration += 1;
                    tracing::info!(
                        %run_id,
                        iteration,
                        records = research_data.search_results.len(),
                        relevant = research_data.relevant_count(),
                        "loop.research.done"
                    );

                    if self.snapshot.mode == LoopMode::Direct {
                        return self.finish(&query, research_data, iteration, cancel).await;
                    }
                    let summary = research_summary(&query, &research_data);
                    let suspension = Suspension::approval(&summary);
                    self.commit(
                        LoopState::AwaitingApproval {
                            query,
                            research_data,
                            summary,
                        },
                        iteration,
                    );
                    return Ok(Advance::Suspended(suspension));
                }

                LoopState::AwaitingApproval {
                    query,
                    research_data,
                    summary,
                } => match resume.take() {
                    Some(Resume::Approval { approved: true }) => {
                        tracing::info!(%run_id, iteration, "loop.approval.accepted");
                        return self.finish(&query, research_data, iteration, cancel).await;
                    }
                    Some(Resume::Approval { approved: false }) => {
                        tracing::info!(%run_id, iteration, "loop.approval.rejected");
                        LoopState::Researching { query }
                    }
                    None => return Ok(Advance::Suspended(Suspension::approval(&summary))),
                    Some(Resume::Query { .. }) => {
                        return Err(SiftError::Agent(
                            "run is waiting for approval, not a query".into(),
                        ));
                    }
                },

                LoopState::Completed { output } => return Ok(Advance::Completed(output)),
            };
        }
    }

    async fn research(&self, query: &str) -> ResearchData {
        if self.snapshot.strategy == ResearchStrategy::Deep {
            if let Some(deep) = &self.services.deep {
                match deep.research(query).await {
                    Ok(data) => return data,
                    Err(e) => tracing::warn!(
                        %query,
                        error = %e,
                        "loop.deep_research.fallback"
                    ),
                }
            }
        }
        self.services.pipeline.collect(query).await
    }

    async fn finish(
        &mut self,
        query: &str,
        research_data: ResearchData,
        iteration: u32,
        cancel: &CancellationToken,
    ) -> Result<Advance> {
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SiftError::Cancelled),
            r = self.services.synthesizer.synthesize(query, &research_data.search_results) => r,
        };
        let output = PipelineOutput {
            report: report.report,
            citations: report.citations,
            sources: report.sources,
            research_data,
            approved: true,
        };
        self.commit(LoopState::Completed { output: output.clone() }, iteration);
        tracing::info!(
            run_id = %self.snapshot.run_id,
            iteration,
            citations = output.citations.len(),
            "loop.completed"
        );
        Ok(Advance::Completed(output))
    }
}
