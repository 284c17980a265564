//! Errors surfaced by the decision-graph store and retriever.

use crate::migration_types::MigrationError;
use crate::pool::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("decision not found: {id}")]
    NotFound { id: String },

    #[error("invalid graph write: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
