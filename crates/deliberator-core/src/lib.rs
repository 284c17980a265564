//! Shared identifiers and data-model types for the deliberator workspace.

pub mod id;
pub mod types;

pub use id::{DecisionId, IdParseError, OperationId};
pub use types::{
    ConvergenceInfo, ConvergenceStatus, DeliberationResult, DeliberationStatus, Mode, Participant,
    RoundResponse, Stance, Summary, Vote, VotingResult,
};
