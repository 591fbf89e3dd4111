//! Research orchestration: fan-out search, merging, hydration, relevance
//! evaluation, cited synthesis, and the approval-gated loop that drives them.
pub mod controller;
pub mod deep;
pub mod evaluate;
pub mod fanout;
pub mod hydrate;
pub mod merge;
pub mod pipeline;
pub mod synthesize;

pub use controller::{
    Advance, LoopState, PipelineOutput, ResearchLoop, ResearchServices, Resume, RunSnapshot,
    Suspension,
};
pub use deep::{DeepResearch, PlannedDeepResearch};
pub use evaluate::{Judge, Judgment, LlmJudge, RelevanceEvaluator};
pub use pipeline::AggregationPipeline;
pub use synthesize::{CitationSynthesizer, Report};
