use thiserror::Error;

use crate::contract::{RenderError, StoreError};

/// Failures of planner operations that must reach the caller.
///
/// Remote failures are absent on purpose: the sync adapter turns them into sentinels.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("{kind} {id} belongs to another agency")]
    WrongAgency { kind: &'static str, id: u64 },

    #[error("PDF rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        PlannerError::NotFound { kind, id }
    }
}
