//! The deliberation engine: round-loop orchestration, the vote and tool
//! subprotocols, convergence detection, summarization, transcript writing,
//! and graph persistence, plus the RPC-surface operations that drive all of
//! it (§4.8, §6).

pub mod api;
pub mod context;
pub mod convergence;
pub mod error;
pub mod orchestrator;
pub mod persist;
pub mod summarizer;
pub mod tools;
pub mod transcript;
pub mod vote;

pub use api::{
    analyze_decisions, deliberate, query_decisions, AnalyzeDecisionsRequest, AnalyzeDecisionsResponse,
    ContradictionPair, DeliberateRequest, QueryDecisionsRequest, QueryDecisionsResponse, SimilarDecisionSummary,
    VotingPattern,
};
pub use convergence::{ConvergenceDetector, RoundConvergence};
pub use error::{EngineError, EngineResult};
pub use orchestrator::DeliberationEngine;
