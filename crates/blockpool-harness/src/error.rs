//! Errors surfaced by scenario runs.

use blockpool_core::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("pool construction failed: {0}")]
    Pool(#[from] PoolError),
    #[error("invalid seed {0:?}")]
    InvalidSeed(String),
    #[error("scenario {name} failed: {reason}")]
    ScenarioFailed { name: &'static str, reason: String },
}
