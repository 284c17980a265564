//! Configuration loading for the deliberation engine: backends, convergence
//! and early-stopping tuning, the decision-graph store, and transcripts.

pub mod env;
pub mod loader;
pub mod types;

pub use env::{ApiKeys, EnvError, Environment};
pub use loader::{ConfigError, ConfigLoader};
pub use types::{
    BackendConfig, Config, ConvergenceDetectionConfig, DecisionGraphConfig, DeliberationConfig,
    EarlyStoppingConfig, TierBoundariesConfig, TranscriptsConfig,
};
