//! The decision-graph memory: persistent store of past decisions,
//! participant stances, and pairwise similarity edges, plus a retriever that
//! turns a new question into budget-bounded markdown context. See §4.5/§4.6.

pub mod cache;
pub mod entities;
pub mod error;
mod migration_runner;
mod migration_types;
pub mod path;
mod pool;
pub mod retriever;
pub mod store;

pub use entities::{DecisionNode, DecisionSimilarity, ParticipantStance};
pub use error::{GraphError, GraphResult};
pub use retriever::{DecisionRetriever, RetrievedContext, Tier, TierDistribution};
pub use store::{DecisionGraphStore, GraphHealth};
