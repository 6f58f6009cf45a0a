//! Error types the controller itself can produce.
//!
//! External collaborators (the cluster API, the cloud provider, ...) surface
//! their own errors as `anyhow::Error` -- their concrete shape belongs to a
//! client this crate doesn't own. `GuardianError` covers only the few
//! failure paths internal to the guardian.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}
